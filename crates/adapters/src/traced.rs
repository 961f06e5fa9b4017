// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrapper for consistent observability around subprocess
//! spawn/kill boundaries.

use async_trait::async_trait;
use tracing::Instrument;

use crate::subprocess::{ProcessSpawner, SpawnError, SpawnSpec, SpawnedProcess};

/// Wraps any [`ProcessSpawner`] with `tracing` spans around spawn: structured
/// fields instead of formatted strings, one span per boundary call.
#[derive(Clone)]
pub struct TracedSpawner<S> {
    inner: S,
}

impl<S> TracedSpawner<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S: ProcessSpawner> ProcessSpawner for TracedSpawner<S> {
    async fn start(&self, spec: SpawnSpec) -> Result<Box<dyn SpawnedProcess>, SpawnError> {
        let cwd = spec.cwd.clone();
        let stdout_log_path = spec.stdout_log_path.clone();
        let span = tracing::info_span!(
            "process.spawn",
            program = %spec.program,
            cwd = %cwd.display(),
            log_path = %stdout_log_path.display(),
        );
        async {
            tracing::info!(args = ?spec.args, "starting");
            let start = std::time::Instant::now();
            let result = self.inner.start(spec).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(_) => tracing::info!(elapsed_ms, "process spawned"),
                Err(err) => tracing::error!(elapsed_ms, error = %err, "spawn failed"),
            }
            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
