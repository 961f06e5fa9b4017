// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use runner_adapters::{FakeSpawnedProcess, ProcessSpawner, SpawnSpec, TokioProcessSpawner};
use runner_core::SystemClock;
use tempfile::tempdir;

use super::*;

fn config(log_path: PathBuf, agent_log_dir: PathBuf) -> WatchdogConfig {
    WatchdogConfig {
        log_path,
        agent_log_dir,
        timeout: Duration::from_millis(40),
        interval: Duration::from_millis(5),
        tail_lines: 20,
        clock: Arc::new(SystemClock),
    }
}

#[tokio::test]
async fn natural_exit_is_reported_without_a_stall() {
    let dir = tempdir().unwrap();
    let log_path = dir.path().join("task.jsonl");
    std::fs::write(&log_path, b"hello\n").unwrap();
    let agent_dir = dir.path().join("agent-logs");
    std::fs::create_dir_all(&agent_dir).unwrap();

    let spawner = TokioProcessSpawner;
    let mut process = spawner
        .start(SpawnSpec {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "exit 0".to_string()],
            env: vec![],
            cwd: dir.path().to_path_buf(),
            stdout_log_path: log_path.clone(),
        })
        .await
        .unwrap();

    let watchdog = Watchdog::new(config(log_path, agent_dir));
    let outcome = tokio::time::timeout(Duration::from_secs(5), watchdog.monitor(process.as_mut()))
        .await
        .unwrap();
    assert!(matches!(outcome, WatchdogOutcome::Exited(status) if status.success()));
}

#[tokio::test]
async fn stall_is_declared_after_timeout_with_no_growth_and_process_is_killed() {
    let dir = tempdir().unwrap();
    let log_path = dir.path().join("task.jsonl");
    std::fs::write(&log_path, b"hello\n").unwrap();
    let agent_dir = dir.path().join("agent-logs");
    std::fs::create_dir_all(&agent_dir).unwrap();
    std::fs::write(
        agent_dir.join("agent.log"),
        "INFO service=permission permission=ask sessionID=ses_perm\n",
    )
    .unwrap();

    let (mut process, _agent_stdin, _agent_stdout) = FakeSpawnedProcess::new();
    let killed = process.killed.clone();

    let watchdog = Watchdog::new(config(log_path.clone(), agent_dir));
    let outcome = tokio::time::timeout(Duration::from_secs(5), watchdog.monitor(&mut process))
        .await
        .unwrap();

    match outcome {
        WatchdogOutcome::Stalled(err) => {
            assert_eq!(err.category, runner_core::StallCategory::Permission);
            assert_eq!(err.session_id.as_ref().map(|s| s.as_str()), Some("ses_perm"));
            assert_eq!(err.runner_log_path, log_path);
        }
        other => panic!("expected a stall, got {other:?}"),
    }
    assert!(*killed.lock());
}

#[tokio::test]
async fn log_growth_delays_the_stall_past_the_timeout_window() {
    let dir = tempdir().unwrap();
    let log_path = dir.path().join("task.jsonl");
    std::fs::write(&log_path, b"a").unwrap();
    let agent_dir = dir.path().join("agent-logs");
    std::fs::create_dir_all(&agent_dir).unwrap();

    let (mut process, _agent_stdin, _agent_stdout) = FakeSpawnedProcess::new();

    let log_path_writer = log_path.clone();
    let grower = tokio::spawn(async move {
        for _ in 0..8 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let mut current = tokio::fs::read(&log_path_writer).await.unwrap_or_default();
            current.push(b'x');
            let _ = tokio::fs::write(&log_path_writer, current).await;
        }
    });

    let watchdog_config = WatchdogConfig {
        log_path: log_path.clone(),
        agent_log_dir: agent_dir,
        timeout: Duration::from_millis(30),
        interval: Duration::from_millis(5),
        tail_lines: 10,
        clock: Arc::new(SystemClock),
    };
    let watchdog = Watchdog::new(watchdog_config);

    // While the grower is still writing (roughly the first 80ms), the
    // watchdog must not have declared a stall yet.
    let result = tokio::time::timeout(Duration::from_millis(70), watchdog.monitor(&mut process)).await;
    assert!(result.is_err(), "growth should have prevented a stall so far");
    grower.abort();
}
