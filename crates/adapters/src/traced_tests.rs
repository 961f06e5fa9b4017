// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::subprocess::{FakeSpawnedProcess, FakeSpawner, SpawnSpec};

#[tokio::test]
async fn traced_spawner_forwards_to_inner_and_returns_its_result() {
    let fake = FakeSpawner::new();
    fake.on_start(|| FakeSpawnedProcess::new().0);
    let traced = TracedSpawner::new(fake.clone());

    let dir = tempfile::tempdir().unwrap();
    let spec = SpawnSpec {
        program: "acp".to_string(),
        args: vec!["--print-logs".to_string()],
        env: vec![],
        cwd: dir.path().to_path_buf(),
        stdout_log_path: dir.path().join("task-1.jsonl"),
    };

    let mut process = traced.start(spec).await.unwrap();
    assert!(process.take_stdin().is_some());
    assert_eq!(fake.calls().len(), 1);
}

#[tokio::test]
async fn traced_spawner_propagates_errors() {
    let fake = FakeSpawner::new();
    // no factory installed -> every start() call errors.
    let traced = TracedSpawner::new(fake);

    let dir = tempfile::tempdir().unwrap();
    let spec = SpawnSpec {
        program: "acp".to_string(),
        args: vec![],
        env: vec![],
        cwd: dir.path().to_path_buf(),
        stdout_log_path: dir.path().join("task-1.jsonl"),
    };

    let err = traced.start(spec).await.unwrap_err();
    assert!(matches!(err, SpawnError::Spawn { .. }));
}
