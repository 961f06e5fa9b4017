// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Liveness watchdog: polls a runner log file for growth, and once it stops
//! growing for longer than `timeout`, classifies the cause from the tail of
//! the agent's own diagnostic log and force-kills the subprocess.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::instrument;

use runner_adapters::SpawnedProcess;
use runner_core::{extract_session_id, Clock, SessionId, StallCategory, StallError};

/// Everything the Watchdog needs to monitor one session.
#[derive(Clone)]
pub struct WatchdogConfig {
    /// The runner's own stdout log file for this task; its growth is the
    /// liveness signal.
    pub log_path: PathBuf,
    /// Directory the agent writes its own diagnostic logs into; the newest
    /// file there is what a stall is classified from.
    pub agent_log_dir: PathBuf,
    /// Max interval with no log growth before a stall is declared.
    pub timeout: Duration,
    /// Poll period.
    pub interval: Duration,
    /// Lines captured from the agent log tail on stall.
    pub tail_lines: usize,
    pub clock: Arc<dyn Clock>,
}

/// Result of one `monitor` call.
#[derive(Debug)]
pub enum WatchdogOutcome {
    /// The process exited on its own; the Watchdog never declared a stall.
    Exited(ExitStatus),
    /// A stall was declared, the process was killed, and the classification
    /// evidence was collected.
    Stalled(StallError),
}

/// Polls `config.log_path`'s growth against `config.timeout`. Construct once
/// per Session Driver run and call [`Watchdog::monitor`].
pub struct Watchdog {
    config: WatchdogConfig,
}

impl Watchdog {
    pub fn new(config: WatchdogConfig) -> Self {
        Self { config }
    }

    /// Blocks until `process` exits or a stall is declared. On stall, kills
    /// `process` before returning. The `wait()` future is held across the
    /// whole poll loop (not re-created per tick) so a natural exit is never
    /// missed between ticks.
    #[instrument(skip_all, fields(log_path = %self.config.log_path.display()))]
    pub async fn monitor(&self, process: &mut dyn SpawnedProcess) -> WatchdogOutcome {
        let mut progress = LogProgress::read(&self.config.log_path);
        let mut last_progress_at = self.config.clock.now();

        let wait_fut = process.wait();
        tokio::pin!(wait_fut);

        loop {
            tokio::select! {
                biased;
                status = &mut wait_fut => {
                    return match status {
                        Ok(status) => WatchdogOutcome::Exited(status),
                        Err(err) => {
                            tracing::warn!(error = %err, "watchdog: wait() failed, treating process as gone");
                            WatchdogOutcome::Exited(unknown_exit_status())
                        }
                    };
                }
                _ = tokio::time::sleep(self.config.interval) => {
                    let current = LogProgress::read(&self.config.log_path);
                    if current.progressed_since(&progress) {
                        progress = current;
                        last_progress_at = self.config.clock.now();
                        continue;
                    }

                    let now = self.config.clock.now();
                    if now.saturating_duration_since(last_progress_at) <= self.config.timeout {
                        continue;
                    }

                    // Race window: the process may exit between this decision
                    // and the kill below. Give the already-pinned wait future
                    // one more immediate chance to resolve before committing
                    // to a stall.
                    tokio::select! {
                        biased;
                        status = &mut wait_fut => {
                            return WatchdogOutcome::Exited(status.unwrap_or_else(|_| unknown_exit_status()));
                        }
                        _ = tokio::time::sleep(Duration::ZERO) => {}
                    }

                    let last_output_age = now.saturating_duration_since(last_progress_at);
                    let stall = self.declare_stall(last_output_age);
                    tracing::warn!(category = ?stall.category, session_id = ?stall.session_id, "watchdog: stall declared, killing process");
                    if let Err(err) = process.kill().await {
                        tracing::warn!(error = %err, "watchdog: kill failed");
                    }
                    return WatchdogOutcome::Stalled(stall);
                }
            }
        }
    }

    fn declare_stall(&self, last_output_age: Duration) -> StallError {
        let tail = read_tail(&self.config.agent_log_dir, self.config.tail_lines);
        let joined = tail.join("\n");
        let category = StallCategory::classify(&joined);
        let session_id = extract_session_id(&joined).map(SessionId::new);
        StallError {
            category,
            session_id,
            runner_log_path: self.config.log_path.clone(),
            agent_log_path: newest_file(&self.config.agent_log_dir)
                .unwrap_or_else(|| self.config.agent_log_dir.clone()),
            last_output_age,
            tail,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct LogProgress {
    len: u64,
    mtime: Option<SystemTime>,
}

impl LogProgress {
    fn read(path: &Path) -> Self {
        match fs::metadata(path) {
            Ok(meta) => Self {
                len: meta.len(),
                mtime: meta.modified().ok(),
            },
            Err(_) => Self::default(),
        }
    }

    /// True if byte size strictly increased, or mtime moved strictly
    /// forward.
    fn progressed_since(&self, prior: &Self) -> bool {
        if self.len > prior.len {
            return true;
        }
        match (self.mtime, prior.mtime) {
            (Some(now), Some(before)) => now > before,
            (Some(_), None) => true,
            _ => false,
        }
    }
}

fn newest_file(dir: &Path) -> Option<PathBuf> {
    fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .max_by_key(|entry| {
            entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(UNIX_EPOCH)
        })
        .map(|entry| entry.path())
}

/// Reads the last `n` lines of the newest file in `dir`. Returns an empty
/// vec if the directory is missing or empty.
fn read_tail(dir: &Path, n: usize) -> Vec<String> {
    let Some(path) = newest_file(dir) else {
        return Vec::new();
    };
    let Ok(content) = fs::read_to_string(&path) else {
        return Vec::new();
    };
    let lines: Vec<&str> = content.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].iter().map(|s| s.to_string()).collect()
}

fn unknown_exit_status() -> ExitStatus {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        ExitStatus::from_raw(-1)
    }
    #[cfg(not(unix))]
    {
        Default::default()
    }
}

#[cfg(test)]
#[path = "watchdog_tests.rs"]
mod tests;
