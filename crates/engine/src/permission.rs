// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Permission/question arbitration for inbound `session/request_permission`
//! calls, plus the ACP audit record persisted alongside the decision.

use serde::Serialize;

use runner_protocol::{PermissionOutcome, RequestPermissionParams};

use crate::event_log::now_rfc3339;

/// What the Session Driver should answer a non-question permission request
/// with, before option selection is applied. Implementers supply a handler
/// to make this decision; the default (used when none is wired) always
/// allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionDecision {
    Allow,
    Deny,
}

/// Consulted for every non-question permission request. Injected so tests
/// can exercise the deny path without a real policy engine.
pub trait PermissionHandler: Send + Sync {
    fn decide(&self, params: &RequestPermissionParams) -> PermissionDecision;
}

/// The default handler: always allows, matching the deterministic
/// `OPENCODE_PERMISSION` policy the env shaping already sets.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllHandler;

impl PermissionHandler for AllowAllHandler {
    fn decide(&self, _params: &RequestPermissionParams) -> PermissionDecision {
        PermissionDecision::Allow
    }
}

/// One `{timestamp, issue_id, request_type, decision, message}` line
/// appended to the per-task log's ACP audit trail.
#[derive(Debug, Clone, Serialize)]
pub struct PermissionAuditRecord {
    pub timestamp: String,
    pub issue_id: String,
    pub request_type: String,
    pub decision: String,
    pub message: String,
}

/// The Session Driver's reaction to one arbitrated permission request.
#[derive(Debug, Clone)]
pub struct Arbitration {
    pub outcome: PermissionOutcome,
    /// Set when the request was a question; the Driver enqueues this text
    /// onto the session's question queue.
    pub enqueue_question: Option<String>,
    pub audit: PermissionAuditRecord,
}

const QUESTION_REPLY: &str = "decide yourself";

fn is_question(params: &RequestPermissionParams) -> bool {
    params.tool_call.kind.eq_ignore_ascii_case("question")
        || params.tool_call.title.to_lowercase().contains("question")
}

/// Arbitrates one `session/request_permission` call: questions are always
/// cancelled and re-queued as "decide yourself"; everything else consults
/// `handler` and, if allowed, picks the first `allow_once`/`allow_always`
/// option.
pub fn arbitrate(
    params: &RequestPermissionParams,
    handler: &dyn PermissionHandler,
    task_id: &str,
) -> Arbitration {
    if is_question(params) {
        return Arbitration {
            outcome: PermissionOutcome::Cancelled,
            enqueue_question: Some(QUESTION_REPLY.to_string()),
            audit: PermissionAuditRecord {
                timestamp: now_rfc3339(),
                issue_id: task_id.to_string(),
                request_type: "question".to_string(),
                decision: QUESTION_REPLY.to_string(),
                message: params.tool_call.title.clone(),
            },
        };
    }

    match handler.decide(params) {
        PermissionDecision::Allow => match find_allow_option(params) {
            Some(option_id) => Arbitration {
                outcome: PermissionOutcome::Selected {
                    option_id: option_id.clone(),
                },
                enqueue_question: None,
                audit: PermissionAuditRecord {
                    timestamp: now_rfc3339(),
                    issue_id: task_id.to_string(),
                    request_type: "permission".to_string(),
                    decision: format!("allow:{option_id}"),
                    message: params.tool_call.title.clone(),
                },
            },
            None => cancelled_audit(params, task_id, "no allow option offered"),
        },
        PermissionDecision::Deny => cancelled_audit(params, task_id, "denied"),
    }
}

fn find_allow_option(params: &RequestPermissionParams) -> Option<&String> {
    params
        .options
        .iter()
        .find(|opt| opt.kind == "allow_once" || opt.kind == "allow_always")
        .map(|opt| &opt.option_id)
}

fn cancelled_audit(params: &RequestPermissionParams, task_id: &str, reason: &str) -> Arbitration {
    Arbitration {
        outcome: PermissionOutcome::Cancelled,
        enqueue_question: None,
        audit: PermissionAuditRecord {
            timestamp: now_rfc3339(),
            issue_id: task_id.to_string(),
            request_type: "permission".to_string(),
            decision: "cancelled".to_string(),
            message: format!("{}: {reason}", params.tool_call.title),
        },
    }
}

#[cfg(test)]
#[path = "permission_tests.rs"]
mod tests;
