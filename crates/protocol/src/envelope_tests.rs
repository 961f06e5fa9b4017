// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn request_classifies_with_id_and_method() {
    let env = Envelope::request(1, "initialize", json!({}));
    match env.classify().unwrap() {
        InboundMessage::Request { id, method, .. } => {
            assert_eq!(id, 1);
            assert_eq!(method, "initialize");
        }
        other => panic!("expected request, got {other:?}"),
    }
}

#[test]
fn notification_classifies_without_id() {
    let env = Envelope::notification("session/update", json!({"kind": "agent_message_chunk"}));
    match env.classify().unwrap() {
        InboundMessage::Notification { method, .. } => assert_eq!(method, "session/update"),
        other => panic!("expected notification, got {other:?}"),
    }
}

#[test]
fn response_ok_classifies_with_result() {
    let env = Envelope::response_ok(7, json!({"ok": true}));
    match env.classify().unwrap() {
        InboundMessage::Response { id, result } => {
            assert_eq!(id, 7);
            assert!(result.is_ok());
        }
        other => panic!("expected response, got {other:?}"),
    }
}

#[test]
fn response_err_classifies_with_error() {
    let env = Envelope::response_err(7, JsonRpcError::method_not_found("bogus"));
    match env.classify().unwrap() {
        InboundMessage::Response { id, result } => {
            assert_eq!(id, 7);
            assert_eq!(result.unwrap_err().code, JsonRpcError::METHOD_NOT_FOUND);
        }
        other => panic!("expected response, got {other:?}"),
    }
}

#[test]
fn malformed_envelope_is_not_classified() {
    let env = Envelope {
        jsonrpc: JSONRPC_VERSION.to_string(),
        id: None,
        method: None,
        params: None,
        result: None,
        error: None,
    };
    assert!(env.classify().is_none());
}

#[test]
fn round_trips_through_json() {
    let env = Envelope::request(3, "session/prompt", json!({"text": "hi"}));
    let line = serde_json::to_string(&env).unwrap();
    assert!(!line.contains('\n'));
    let back: Envelope = serde_json::from_str(&line).unwrap();
    assert_eq!(back.id, Some(3));
    assert_eq!(back.method.as_deref(), Some("session/prompt"));
}
