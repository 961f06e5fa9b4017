// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy for the Session Driver and Runner Coordinator.

use std::time::Duration;

use thiserror::Error;

use runner_adapters::SpawnError;
use runner_core::{GraphError, StallError};
use runner_protocol::ProtocolError;

/// Errors the Session Driver can fail a run with. The Driver catches all of
/// these locally and packs them into a `RunResult`; only cancellation
/// propagates past `run()` itself (see `SessionDriver::run`).
#[derive(Debug, Error)]
pub enum SessionDriverError {
    #[error("failed to spawn agent: {0}")]
    Spawn(#[from] SpawnError),

    #[error("i/o error preparing agent run: {0}")]
    Io(#[from] std::io::Error),

    #[error("agent protocol failure: {0}")]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Stall(#[from] StallError),

    #[error("verification failed: verification did not confirm completion")]
    VerificationNotConfirmed,

    #[error("runner timeout after {0:?}")]
    Timeout(Duration),

    #[error("serena initialization failed: {0}")]
    InitializationFailure(String),

    #[error("acp client did not finish after agent exit")]
    BridgeDidNotFinish,

    #[error("run cancelled")]
    Cancelled,
}

impl SessionDriverError {
    /// The stable `stall_category` artifact key, when applicable.
    pub fn stall_category(&self) -> Option<&'static str> {
        match self {
            Self::Stall(err) => Some(err.category.as_str()),
            _ => None,
        }
    }

    /// True for errors that map to `RunStatus::Blocked` rather than
    /// `RunStatus::Failed`.
    pub fn is_blocked(&self) -> bool {
        matches!(
            self,
            Self::Stall(_) | Self::VerificationNotConfirmed | Self::Timeout(_)
        )
    }
}

/// Joined shutdown-path errors, ordered by precedence (outermost wins on
/// join): `serena init` > context cancellation > run error > shutdown
/// errors. [`ShutdownOutcome::primary`] applies that ordering.
#[derive(Debug, Default)]
pub struct ShutdownOutcome {
    pub serena_init: Option<SessionDriverError>,
    pub cancelled: Option<SessionDriverError>,
    pub run_err: Option<SessionDriverError>,
    pub shutdown_err: Option<SessionDriverError>,
}

impl ShutdownOutcome {
    /// Picks the error that dominates the reason string, by precedence.
    pub fn primary(self) -> Option<SessionDriverError> {
        self.serena_init
            .or(self.cancelled)
            .or(self.run_err)
            .or(self.shutdown_err)
    }
}

/// Errors surfaced by the Runner Coordinator's run loop. Per-task failures
/// never appear here — they're recorded on the graph and in `RunResult`;
/// this is reserved for conditions fatal to the whole run.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("task graph error: {0}")]
    Graph(#[from] GraphError),
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
