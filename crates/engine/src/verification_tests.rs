// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    explicit_done = {"DONE\n", Verified::True},
    explicit_not_done = {"NOT DONE\n", Verified::False},
    explicit_incomplete = {"still incomplete, need more tests", Verified::False},
    explicit_didnt = {"I didn't finish the migration", Verified::False},
    explicit_pass = {"tests pass", Verified::True},
    negative_wins_over_positive = {"not done, but the build did complete", Verified::False},
    empty_is_unknown = {"", Verified::Unknown},
    unrelated_text_is_unknown = {"here is a summary of changes", Verified::Unknown},
)]
fn parses_verification_reply_by_precedence(text: &str, expected: Verified) {
    assert_eq!(parse_verification_reply(text), expected);
}

#[test]
fn review_verdict_absent_without_a_verdict_line() {
    assert!(parse_review_verdict("just some narrative output\n").is_none());
}

#[test]
fn review_verdict_parses_pass() {
    let log = "doing work\nREVIEW_VERDICT: pass\n";
    assert_eq!(
        parse_review_verdict(log),
        Some(ReviewVerdict {
            pass: true,
            feedback: None
        })
    );
}

#[test]
fn review_verdict_last_match_wins() {
    let log = "REVIEW_VERDICT: fail\nmore work\nREVIEW_VERDICT:   pass  \n";
    let verdict = parse_review_verdict(log).unwrap();
    assert!(verdict.pass);
}

#[test]
fn review_verdict_fail_captures_last_feedback_line() {
    let log = "REVIEW_FEEDBACK: first draft\nREVIEW_VERDICT: fail\nREVIEW_FAIL_FEEDBACK: missing tests\n";
    let verdict = parse_review_verdict(log).unwrap();
    assert!(!verdict.pass);
    assert_eq!(verdict.feedback.as_deref(), Some("missing tests"));
}

#[test]
fn review_verdict_pass_does_not_capture_feedback() {
    let log = "REVIEW_FEEDBACK: irrelevant\nREVIEW_VERDICT: pass\n";
    let verdict = parse_review_verdict(log).unwrap();
    assert!(verdict.feedback.is_none());
}
