// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

use crate::envelope::JsonRpcError;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed envelope on the wire: {0}")]
    MalformedEnvelope(String),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("bridge was closed")]
    Cancelled,

    #[error("bridge already started")]
    AlreadyStarted,

    #[error("remote returned an error: {0}")]
    Remote(#[from] JsonRpcError),
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}) {}", self.code, self.message)
    }
}

impl std::error::Error for JsonRpcError {}
