// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! runner-protocol: the bidirectional JSON-RPC 2.0 layer the Session Driver
//! speaks over an agent subprocess's stdio — one JSON object per line,
//! request/response correlation by id, typed method dispatch.

pub mod bridge;
pub mod client;
pub mod dispatch;
pub mod envelope;
pub mod error;

pub use bridge::Bridge;
pub use client::{
    find_yolo_mode, AcpClient, PermissionOption, PermissionOutcome, RequestPermissionParams,
    SessionMode, SessionNewResult, ToolCallInfo, METHOD_FS_READ_TEXT_FILE,
    METHOD_FS_WRITE_TEXT_FILE, METHOD_REQUEST_PERMISSION, METHOD_SESSION_UPDATE,
};
pub use dispatch::{DispatchError, Dispatcher, NullDispatcher};
pub use envelope::{Envelope, InboundMessage, JsonRpcError, JSONRPC_VERSION};
pub use error::ProtocolError;

/// The agent protocol's fixed version constant (see external interfaces).
pub const PROTOCOL_VERSION: u64 = 1;
