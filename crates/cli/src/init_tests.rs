// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn scaffolds_agent_file_with_permission_allow_line() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (path, outcome) = scaffold(dir.path()).expect("scaffold");
    assert_eq!(outcome, InitOutcome::Created);
    assert!(path.ends_with(".opencode/agent/yolo.md"));

    let content = std::fs::read_to_string(&path).expect("read");
    assert!(
        content.lines().any(|line| line == "permission: allow"),
        "expected a standalone `permission: allow` line, got:\n{content}"
    );
}

#[test]
fn does_not_overwrite_existing_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join(".opencode/agent/yolo.md");
    std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    std::fs::write(&path, "custom content").expect("write");

    let (returned_path, outcome) = scaffold(dir.path()).expect("scaffold");
    assert_eq!(outcome, InitOutcome::AlreadyPresent);
    assert_eq!(returned_path, path);
    assert_eq!(std::fs::read_to_string(&path).expect("read"), "custom content");
}

#[test]
fn idempotent_across_repeated_calls() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (_, first) = scaffold(dir.path()).expect("scaffold");
    let (_, second) = scaffold(dir.path()).expect("scaffold");
    assert_eq!(first, InitOutcome::Created);
    assert_eq!(second, InitOutcome::AlreadyPresent);
}
