// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use tempfile::tempdir;

use super::*;

#[test]
fn plain_marker_line_qualifies() {
    assert!(contains_init_failure(
        "ERROR language server manager is not initialized\n"
    ));
}

#[test]
fn line_with_acp_agent_service_tag_is_excluded() {
    assert!(!contains_init_failure(
        "INFO service=acp-agent msg=\"language server manager is not initialized\"\n"
    ));
}

#[test]
fn json_object_line_is_excluded() {
    assert!(!contains_init_failure(
        "{\"message\":\"language server manager is not initialized\"}\n"
    ));
}

#[test]
fn text_without_marker_does_not_qualify() {
    assert!(!contains_init_failure("everything is fine\n"));
}

#[tokio::test]
async fn watcher_returns_once_marker_appears() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("task.stderr.log");
    tokio::fs::write(&path, b"starting up\n").await.unwrap();

    let watch_path = path.clone();
    let handle = tokio::spawn(async move {
        watch_for_init_failure(watch_path, Duration::from_millis(5)).await;
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    tokio::fs::write(&path, "starting up\nlanguage server manager is not initialized\n")
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("watcher should notice the marker")
        .unwrap();
}
