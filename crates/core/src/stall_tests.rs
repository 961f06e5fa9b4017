// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    permission_service = { "INFO service=permission permission=ask sessionID=ses_perm", StallCategory::Permission },
    permission_doom_loop = { "permission=doom_loop observed", StallCategory::Permission },
    question_service = { "INFO service=question sessionID=ses_q", StallCategory::Question },
    question_permission = { "permission=question asked", StallCategory::Question },
    idle_transport_open = {
        "session.prompt loop exiting loop\nbus type=session.idle publishing",
        StallCategory::IdleTransportOpen
    },
    no_output_default = { "nothing interesting happened", StallCategory::NoOutput },
)]
fn classify_matches_priority_order(tail: &str, expected: StallCategory) {
    assert_eq!(StallCategory::classify(tail), expected);
}

#[test]
fn permission_wins_over_question_when_both_present() {
    let tail = "service=permission\nservice=question";
    assert_eq!(StallCategory::classify(tail), StallCategory::Permission);
}

#[test]
fn extracts_session_id_from_camel_case_marker() {
    let tail = "INFO service=permission permission=ask sessionID=ses_perm extra";
    assert_eq!(extract_session_id(tail).as_deref(), Some("ses_perm"));
}

#[test]
fn extracts_session_id_from_spaced_marker_up_to_comma() {
    let tail = "session id=ses_abc, more=stuff";
    assert_eq!(extract_session_id(tail).as_deref(), Some("ses_abc"));
}

#[test]
fn missing_session_id_returns_none() {
    assert_eq!(extract_session_id("no markers here"), None);
}
