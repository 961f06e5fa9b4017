// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Outcome of a dispatcher handling one inbound request, distinguishing an
/// unrecognized method (-32601) from a handler that ran and failed
/// (-32603).
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("method not found: {0}")]
    UnknownMethod(String),

    #[error("{0}")]
    Failed(String),
}

/// Handles methods the remote peer invokes on us. Implemented once per role
/// (the agent-protocol client implements the `fs/*`/`session/update`
/// handlers it must serve; a symmetric receiver would implement the rest).
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Handles an inbound request (`id` + `method`); the returned value is
    /// marshalled into a response envelope.
    async fn handle_request(&self, method: &str, params: Value) -> Result<Value, DispatchError>;

    /// Handles an inbound notification (`method`, no `id`). The result is
    /// discarded.
    async fn handle_notification(&self, method: &str, params: Value);
}

/// A dispatcher that answers every request with method-not-found and
/// ignores every notification. Used by roles that only ever initiate calls.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDispatcher;

#[async_trait]
impl Dispatcher for NullDispatcher {
    async fn handle_request(&self, method: &str, _params: Value) -> Result<Value, DispatchError> {
        Err(DispatchError::UnknownMethod(method.to_string()))
    }

    async fn handle_notification(&self, _method: &str, _params: Value) {}
}
