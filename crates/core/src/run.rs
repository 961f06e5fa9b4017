// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The value types that cross the Coordinator <-> Session Driver boundary.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::session::AgentUpdate;
use crate::task::TaskId;

/// How the Session Driver should treat the main prompt's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Implement,
    Review,
}

/// One normalized progress line forwarded to the Coordinator's emitter.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub task_id: TaskId,
    pub update: AgentUpdate,
}

/// Callback invoked for every progress line the Session Driver produces.
/// Must be safe for concurrent emission across Drivers.
pub type ProgressSink = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Immutable once dispatched to a Session Driver.
#[derive(Clone)]
pub struct RunRequest {
    pub task_id: TaskId,
    pub repo_root: std::path::PathBuf,
    pub prompt: String,
    pub model: Option<String>,
    pub mode: RunMode,
    pub timeout: Option<Duration>,
    pub metadata: BTreeMap<String, String>,
    pub on_progress: ProgressSink,
}

impl std::fmt::Debug for RunRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunRequest")
            .field("task_id", &self.task_id)
            .field("repo_root", &self.repo_root)
            .field("prompt", &self.prompt)
            .field("model", &self.model)
            .field("mode", &self.mode)
            .field("timeout", &self.timeout)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Terminal disposition of a run, as reported to the Coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Blocked,
    Failed,
}

/// Produced by the Session Driver, consumed by the Coordinator.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RunResult {
    pub status: RunStatus,
    pub reason: String,
    pub started_at: String,
    pub finished_at: String,
    pub log_path: std::path::PathBuf,
    pub review_ready: bool,
    pub artifacts: BTreeMap<String, String>,
}

impl RunResult {
    pub fn artifact(&self, key: &str) -> Option<&str> {
        self.artifacts.get(key).map(|s| s.as_str())
    }
}
