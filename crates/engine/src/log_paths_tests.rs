// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::path::Path;

#[test]
fn task_log_paths_resolve_under_runner_logs_opencode() {
    let paths = task_log_paths(Path::new("/repo"), &TaskId::new("T1"));
    assert_eq!(
        paths.stdout_jsonl,
        Path::new("/repo/runner-logs/opencode/T1.jsonl")
    );
    assert_eq!(
        paths.stderr_log,
        Path::new("/repo/runner-logs/opencode/T1.stderr.log")
    );
}

#[test]
fn clone_task_log_paths_nest_under_clone_workspace() {
    let paths = clone_task_log_paths(Path::new("/repo"), &TaskId::new("T1"));
    assert_eq!(
        paths.stdout_jsonl,
        Path::new("/repo/.yolo-runner/clones/T1/runner-logs/opencode/T1.jsonl")
    );
}

#[test]
fn event_log_path_resolves_under_runner_logs() {
    assert_eq!(
        event_log_path(Path::new("/repo")),
        Path::new("/repo/runner-logs/agent.events.jsonl")
    );
}
