// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use runner_protocol::{PermissionOption, ToolCallInfo};

struct DenyAllHandler;
impl PermissionHandler for DenyAllHandler {
    fn decide(&self, _params: &RequestPermissionParams) -> PermissionDecision {
        PermissionDecision::Deny
    }
}

fn params(kind: &str, title: &str, options: Vec<PermissionOption>) -> RequestPermissionParams {
    RequestPermissionParams {
        tool_call: ToolCallInfo {
            id: "tc_1".to_string(),
            title: title.to_string(),
            kind: kind.to_string(),
        },
        options,
    }
}

#[test]
fn question_kind_is_cancelled_and_re_queued() {
    let req = params("question", "Need input", vec![]);
    let result = arbitrate(&req, &AllowAllHandler, "T1");
    assert!(matches!(result.outcome, PermissionOutcome::Cancelled));
    assert_eq!(result.enqueue_question.as_deref(), Some("decide yourself"));
    assert_eq!(result.audit.request_type, "question");
    assert_eq!(result.audit.decision, "decide yourself");
}

#[test]
fn title_containing_question_substring_is_treated_as_a_question() {
    let req = params("ask", "Clarifying question about scope", vec![]);
    let result = arbitrate(&req, &AllowAllHandler, "T1");
    assert_eq!(result.audit.request_type, "question");
}

#[test]
fn non_question_allow_selects_first_allow_once_option() {
    let req = params(
        "fs_write",
        "Write file",
        vec![
            PermissionOption { option_id: "deny".to_string(), kind: "reject_once".to_string() },
            PermissionOption { option_id: "allow".to_string(), kind: "allow_once".to_string() },
            PermissionOption { option_id: "always".to_string(), kind: "allow_always".to_string() },
        ],
    );
    let result = arbitrate(&req, &AllowAllHandler, "T1");
    assert!(matches!(
        result.outcome,
        PermissionOutcome::Selected { ref option_id } if option_id == "allow"
    ));
    assert!(result.enqueue_question.is_none());
    assert_eq!(result.audit.request_type, "permission");
}

#[test]
fn non_question_allow_with_no_matching_option_is_cancelled() {
    let req = params(
        "fs_write",
        "Write file",
        vec![PermissionOption { option_id: "deny".to_string(), kind: "reject_once".to_string() }],
    );
    let result = arbitrate(&req, &AllowAllHandler, "T1");
    assert!(matches!(result.outcome, PermissionOutcome::Cancelled));
}

#[test]
fn deny_handler_cancels_regardless_of_options() {
    let req = params(
        "fs_write",
        "Write file",
        vec![PermissionOption { option_id: "allow".to_string(), kind: "allow_once".to_string() }],
    );
    let result = arbitrate(&req, &DenyAllHandler, "T1");
    assert!(matches!(result.outcome, PermissionOutcome::Cancelled));
    assert_eq!(result.audit.decision, "cancelled");
}
