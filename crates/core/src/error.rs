// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

use crate::task::TaskState;

/// Fatal errors raised while constructing or mutating a [`crate::graph::TaskGraph`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("task id must not be empty")]
    EmptyId,

    #[error("duplicate task id: {0}")]
    DuplicateId(String),

    #[error("task {task} depends on unknown task {dependency}")]
    UnknownDependency { task: String, dependency: String },

    #[error("circular dependency detected: {0}")]
    Cycle(String),

    #[error("unknown task id: {0}")]
    UnknownTask(String),

    #[error("cannot transition task {id} from terminal state {from:?} to {to:?}")]
    TerminalTransition {
        id: String,
        from: TaskState,
        to: TaskState,
    },
}
