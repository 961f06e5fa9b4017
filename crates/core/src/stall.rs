// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stall classification: the Watchdog's verdict on why a session's log
//! stopped growing, derived from the agent's own log tail.

use thiserror::Error;

use crate::session::SessionId;

/// Cause of a declared stall, ordered by the priority the Watchdog checks
/// them in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StallCategory {
    Permission,
    Question,
    IdleTransportOpen,
    NoOutput,
    Other,
}

impl StallCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Permission => "permission",
            Self::Question => "question",
            Self::IdleTransportOpen => "idle_transport_open",
            Self::NoOutput => "no_output",
            Self::Other => "other",
        }
    }

    /// Classifies a log tail by substring priority match, per the Watchdog's
    /// classification rules: permission, then question, then
    /// idle-transport-open, else no_output.
    pub fn classify(tail: &str) -> Self {
        if tail.contains("service=permission") || tail.contains("permission=doom_loop") {
            return Self::Permission;
        }
        if tail.contains("service=question") || tail.contains("permission=question") {
            return Self::Question;
        }
        let has_exiting_loop = tail.contains("session.prompt") && tail.contains("exiting loop");
        let has_idle_publish = tail.contains("session.idle publishing");
        if has_exiting_loop && has_idle_publish {
            return Self::IdleTransportOpen;
        }
        Self::NoOutput
    }
}

/// Scans `tail` for `sessionID=` or `session id=` and returns the token up to
/// the next whitespace or comma.
pub fn extract_session_id(tail: &str) -> Option<String> {
    for marker in ["sessionID=", "session id="] {
        if let Some(pos) = tail.find(marker) {
            let rest = &tail[pos + marker.len()..];
            let token: String = rest
                .chars()
                .take_while(|c| !c.is_whitespace() && *c != ',')
                .collect();
            if !token.is_empty() {
                return Some(token);
            }
        }
    }
    None
}

/// Produced only by the Watchdog; immutable.
#[derive(Debug, Clone, Error)]
#[error("opencode stall category={category:?}")]
pub struct StallError {
    pub category: StallCategory,
    pub session_id: Option<SessionId>,
    pub runner_log_path: std::path::PathBuf,
    pub agent_log_path: std::path::PathBuf,
    pub last_output_age: std::time::Duration,
    pub tail: Vec<String>,
}

#[cfg(test)]
#[path = "stall_tests.rs"]
mod tests;
