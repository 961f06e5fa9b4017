// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! NDJSON runner event log: one append-only JSON line per event, written to
//! `runner-logs/agent.events.jsonl`. Used by the Coordinator to record
//! `run_started`, `task_started`, `runner_output`, `task_finished`, and the
//! rest of the event kinds below.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventLogError {
    #[error("failed to open event log {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write event log {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The runner event kinds; serialized as their `snake_case` wire form into
/// the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    RunStarted,
    TaskStarted,
    RunnerStarted,
    RunnerOutput,
    RunnerWarning,
    RunnerCmdStarted,
    RunnerCmdFinished,
    RunnerFinished,
    TaskFinished,
}

/// One NDJSON line. `ts` is RFC 3339; the optional fields are omitted from
/// the serialized line when absent rather than written as `null`.
#[derive(Debug, Clone, Serialize)]
pub struct RunnerEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub ts: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_pos: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub metadata: BTreeMap<String, String>,
}

impl RunnerEvent {
    /// Builds an event of `kind` stamped with the current wall-clock time;
    /// every other field starts empty and is filled in with the builder
    /// methods below.
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            ts: now_rfc3339(),
            task_id: None,
            task_title: None,
            worker_id: None,
            queue_pos: None,
            message: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_task_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn with_task_title(mut self, title: impl Into<String>) -> Self {
        self.task_title = Some(title.into());
        self
    }

    pub fn with_worker_id(mut self, worker_id: usize) -> Self {
        self.worker_id = Some(worker_id);
        self
    }

    pub fn with_queue_pos(mut self, queue_pos: usize) -> Self {
        self.queue_pos = Some(queue_pos);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Append-only writer for the NDJSON runner event log. Each `append()` call
/// opens, writes, and closes the file — acceptable at the event volumes a
/// single runner produces.
pub struct RunnerEventLog {
    path: PathBuf,
}

impl RunnerEventLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Appends one NDJSON line. Failures are logged via tracing but do not
    /// propagate — the event log is diagnostic, not load-bearing.
    pub fn append(&self, event: &RunnerEvent) {
        if let Err(err) = self.write_line(event) {
            tracing::warn!(error = %err, path = %self.path.display(), "failed to write runner event log");
        }
    }

    fn write_line(&self, event: &RunnerEvent) -> Result<(), EventLogError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| EventLogError::Open {
                path: self.path.clone(),
                source,
            })?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| EventLogError::Open {
                path: self.path.clone(),
                source,
            })?;
        let line = serde_json::to_string(event).map_err(|err| EventLogError::Write {
            path: self.path.clone(),
            source: std::io::Error::other(err),
        })?;
        writeln!(file, "{line}").map_err(|source| EventLogError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

/// Formats the current UTC time as `YYYY-MM-DDTHH:MM:SSZ`. Shared by the
/// event log and the permission-audit log so every NDJSON timestamp in the
/// tree renders the same way.
pub(crate) fn now_rfc3339() -> String {
    format_rfc3339(SystemTime::now())
}

fn format_rfc3339(time: SystemTime) -> String {
    let since_epoch = time
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default();
    let secs = since_epoch.as_secs();

    let days = secs / 86400;
    let time_of_day = secs % 86400;
    let hours = time_of_day / 3600;
    let minutes = (time_of_day % 3600) / 60;
    let seconds = time_of_day % 60;

    let (year, month, day) = days_to_civil(days);

    format!("{year:04}-{month:02}-{day:02}T{hours:02}:{minutes:02}:{seconds:02}Z")
}

/// Converts days since the Unix epoch to `(year, month, day)`.
/// Algorithm from Howard Hinnant's `civil_from_days`.
fn days_to_civil(days: u64) -> (i64, u32, u32) {
    let z = days as i64 + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y, m as u32, d as u32)
}

#[cfg(test)]
#[path = "event_log_tests.rs"]
mod tests;
