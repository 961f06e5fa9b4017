// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Watches a task's `.stderr.log` for the literal marker the agent emits
//! when its language-server manager never finished initializing, so the
//! Session Driver can fail fast instead of riding out the full stall
//! timeout. Lines that are agent-protocol tool output (narrative text that
//! can legitimately contain the marker as a quoted string) are excluded.

use std::path::PathBuf;
use std::time::Duration;

const MARKER: &str = "language server manager is not initialized";
const EXCLUDE_MARKERS: &[&str] = &["service=acp-agent"];

/// Polls `stderr_log_path` until the marker is observed on a qualifying
/// line. Never returns otherwise; the caller races this against the rest
/// of the Driver's state machine and drops it once the race is won.
pub async fn watch_for_init_failure(stderr_log_path: PathBuf, poll_interval: Duration) {
    let mut last_offset: u64 = 0;
    loop {
        tokio::time::sleep(poll_interval).await;
        let Ok(content) = tokio::fs::read_to_string(&stderr_log_path).await else {
            continue;
        };
        if content.len() as u64 <= last_offset {
            continue;
        }
        let fresh = &content[last_offset as usize..];
        if contains_init_failure(fresh) {
            return;
        }
        last_offset = content.len() as u64;
    }
}

/// True if any qualifying line in `text` contains the init-failure marker.
/// A line is excluded from consideration if it looks like serialized
/// agent-protocol tool output (contains `service=acp-agent`) or is itself a
/// JSON object — both can carry the marker as narrative text rather than a
/// genuine failure.
pub fn contains_init_failure(text: &str) -> bool {
    text.lines().any(is_qualifying_failure_line)
}

fn is_qualifying_failure_line(line: &str) -> bool {
    if !line.contains(MARKER) {
        return false;
    }
    if EXCLUDE_MARKERS.iter().any(|marker| line.contains(marker)) {
        return false;
    }
    !line.trim_start().starts_with('{')
}

#[cfg(test)]
#[path = "init_sniffer_tests.rs"]
mod tests;
