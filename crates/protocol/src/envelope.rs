// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The JSON-RPC 2.0 message envelope and its three shapes: request,
//! notification, response.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

/// Wire-level error object carried in a response envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INTERNAL_ERROR: i64 = -32603;

    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: Self::METHOD_NOT_FOUND,
            message: format!("method not found: {method}"),
            data: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: Self::INTERNAL_ERROR,
            message: message.into(),
            data: None,
        }
    }
}

/// One line on the wire. Exactly one of (`id`+`method`), (`method`, no
/// `id`), (`id`, exactly one of `result`/`error`) is populated; see
/// [`Envelope::classify`].
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Envelope {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// The classified shape of an inbound envelope.
#[derive(Debug, Clone)]
pub enum InboundMessage {
    Request {
        id: u64,
        method: String,
        params: Value,
    },
    Notification {
        method: String,
        params: Value,
    },
    Response {
        id: u64,
        result: Result<Value, JsonRpcError>,
    },
}

impl Envelope {
    pub fn request(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id),
            method: Some(method.into()),
            params: Some(params),
            result: None,
            error: None,
        }
    }

    pub fn notification(method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: None,
            method: Some(method.into()),
            params: Some(params),
            result: None,
            error: None,
        }
    }

    pub fn response_ok(id: u64, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id),
            method: None,
            params: None,
            result: Some(result),
            error: None,
        }
    }

    pub fn response_err(id: u64, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id),
            method: None,
            params: None,
            result: None,
            error: Some(error),
        }
    }

    /// Classifies this envelope into one of the three dispatch shapes.
    /// Malformed envelopes (none of the recognized shapes) return `None`.
    pub fn classify(self) -> Option<InboundMessage> {
        match (self.id, self.method, self.result, self.error) {
            (Some(id), Some(method), None, None) => Some(InboundMessage::Request {
                id,
                method,
                params: self.params.unwrap_or(Value::Null),
            }),
            (None, Some(method), None, None) => Some(InboundMessage::Notification {
                method,
                params: self.params.unwrap_or(Value::Null),
            }),
            (Some(id), None, Some(result), None) => Some(InboundMessage::Response {
                id,
                result: Ok(result),
            }),
            (Some(id), None, None, Some(error)) => Some(InboundMessage::Response {
                id,
                result: Err(error),
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
