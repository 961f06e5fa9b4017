// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-task and per-run log path builders, shared by the Session Driver,
//! the Watchdog's config construction, and the Coordinator so all three
//! agree on one location without string duplication.
//!
//! Layout: `<repo_root>/runner-logs/opencode/<task-id>.jsonl` (protocol
//! stdout, also the ACP audit log) and the matching `.stderr.log`;
//! `<repo_root>/runner-logs/agent.events.jsonl` (the NDJSON event log).
//! Clone runs mirror the same tree under
//! `<repo_root>/.yolo-runner/clones/<task-id>/runner-logs/...`.

use std::path::{Path, PathBuf};

use runner_core::TaskId;

const RUNNER_LOGS_DIR: &str = "runner-logs";
const OPENCODE_LOG_SUBDIR: &str = "opencode";
const EVENT_LOG_FILE: &str = "agent.events.jsonl";
const CLONES_DIR: &str = ".yolo-runner/clones";

/// The two per-task log paths the Session Driver writes and the Watchdog
/// reads back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskLogPaths {
    /// `<task-id>.jsonl` — protocol stdout, also the ACP permission/question
    /// audit log (see [`crate::permission`]).
    pub stdout_jsonl: PathBuf,
    /// `<task-id>.stderr.log` — the agent's own diagnostic stream, and the
    /// tail the Watchdog classifies a stall from.
    pub stderr_log: PathBuf,
}

fn runner_logs_dir(repo_root: &Path) -> PathBuf {
    repo_root.join(RUNNER_LOGS_DIR)
}

/// Resolves both per-task log paths under `repo_root`.
pub fn task_log_paths(repo_root: &Path, task_id: &TaskId) -> TaskLogPaths {
    let dir = runner_logs_dir(repo_root).join(OPENCODE_LOG_SUBDIR);
    TaskLogPaths {
        stdout_jsonl: dir.join(format!("{}.jsonl", task_id.as_str())),
        stderr_log: dir.join(format!("{}.stderr.log", task_id.as_str())),
    }
}

/// Resolves the same pair, but rooted under the clone workspace the
/// Coordinator uses for a task run against an isolated checkout.
pub fn clone_task_log_paths(repo_root: &Path, task_id: &TaskId) -> TaskLogPaths {
    let clone_root = repo_root
        .join(CLONES_DIR)
        .join(task_id.as_str())
        .join(RUNNER_LOGS_DIR)
        .join(OPENCODE_LOG_SUBDIR);
    TaskLogPaths {
        stdout_jsonl: clone_root.join(format!("{}.jsonl", task_id.as_str())),
        stderr_log: clone_root.join(format!("{}.stderr.log", task_id.as_str())),
    }
}

/// Resolves the NDJSON runner event log path.
pub fn event_log_path(repo_root: &Path) -> PathBuf {
    runner_logs_dir(repo_root).join(EVENT_LOG_FILE)
}

#[cfg(test)]
#[path = "log_paths_tests.rs"]
mod tests;
