// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

crate::define_id! {
    /// Identifies a task within a [`crate::graph::TaskGraph`].
    pub struct TaskId;
}

crate::define_id! {
    /// Identifies one invocation of the run loop.
    pub struct RunId;
}

/// Lifecycle state of a [`Task`] within a [`crate::graph::TaskGraph`].
///
/// Transitions: `pending -> running` via `reserve`, `running -> {succeeded,
/// failed, canceled}` via `set_state`. No transition is permitted out of a
/// terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Canceled,
}

impl TaskState {
    /// True once no further transition is permitted.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }
}

/// One node of the task graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub state: TaskState,
    pub depends_on: Vec<TaskId>,
}

impl Task {
    pub fn new(id: impl Into<TaskId>, depends_on: Vec<TaskId>) -> Self {
        Self {
            id: id.into(),
            state: TaskState::Pending,
            depends_on,
        }
    }
}

/// Snapshot returned by `TaskGraph::inspect`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub state: TaskState,
    pub ready: bool,
    pub terminal: bool,
    pub depends_on: Vec<TaskId>,
    pub dependents: Vec<TaskId>,
}
