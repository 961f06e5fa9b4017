// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent-protocol session state and the normalized update stream the Session
//! Driver emits to its progress sink.

use std::collections::VecDeque;

use indexmap::IndexMap;

crate::define_id! {
    /// Opaque session identifier handed back by the agent on `session/new`.
    pub struct SessionId;
}

/// Status of one tool-call lifecycle update.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// A single entry in an agent-advertised plan.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PlanEntry {
    pub content: String,
    pub status: ToolCallStatus,
}

/// One normalized notification arriving on `session/update`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentUpdate {
    UserMessageChunk { text: String },
    AgentMessageChunk { text: String },
    AgentThoughtChunk { text: String },
    ToolCall { id: String, title: String, kind: String, status: ToolCallStatus },
    ToolCallUpdate { id: String, status: ToolCallStatus },
    Plan { entries: Vec<PlanEntry> },
    AvailableCommands { commands: Vec<String> },
    CurrentMode { mode_id: String },
}

/// Session-scoped state for one `Run` invocation. Lives from `session/new`
/// to shutdown; never persisted across runs.
#[derive(Debug, Default)]
pub struct SessionState {
    pub session_id: Option<SessionId>,
    pub mode_id: Option<String>,
    /// Mode ids/names the agent advertised at handshake, case-preserved.
    pub capabilities: Vec<String>,
    /// Correlation id -> still-pending (no waiter payload kept here; the
    /// Bridge owns delivery, this just tracks membership for diagnostics).
    pub pending_requests: IndexMap<u64, &'static str>,
    /// Ordered follow-up prompts queued by permission arbitration, drained
    /// FIFO after the main prompt completes. Closed exactly once.
    question_queue: VecDeque<String>,
    questions_closed: bool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues `text` unless the queue has already been closed for this
    /// turn, in which case the enqueue is silently dropped.
    pub fn enqueue_question(&mut self, text: impl Into<String>) {
        if !self.questions_closed {
            self.question_queue.push_back(text.into());
        }
    }

    /// Closes the queue so further enqueues are dropped. Idempotent.
    pub fn close_questions(&mut self) {
        self.questions_closed = true;
    }

    /// Drains queued questions FIFO, regardless of closed state (closing
    /// only blocks new enqueues, not drainage of what's already queued).
    pub fn drain_questions(&mut self) -> Vec<String> {
        self.question_queue.drain(..).collect()
    }

    pub fn has_pending_questions(&self) -> bool {
        !self.question_queue.is_empty()
    }
}
