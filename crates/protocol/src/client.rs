// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed agent-protocol methods layered over the raw [`Bridge`]: the
//! specific JSON-RPC calls the Session Driver makes as the initiator
//! (`initialize`, `session/new`, `session/set_mode`, `session/prompt`,
//! `session/cancel`) plus the wire shapes for the methods the agent calls
//! on us (`session/update`, `session/request_permission`).

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::bridge::Bridge;
use crate::error::ProtocolError;
use crate::PROTOCOL_VERSION;

/// Method name the agent calls to stream session progress.
pub const METHOD_SESSION_UPDATE: &str = "session/update";
/// Method name the agent calls to ask for tool-call permission.
pub const METHOD_REQUEST_PERMISSION: &str = "session/request_permission";
/// Method names the agent calls to read/write files through us.
pub const METHOD_FS_READ_TEXT_FILE: &str = "fs/read_text_file";
pub const METHOD_FS_WRITE_TEXT_FILE: &str = "fs/write_text_file";

#[derive(Debug, Clone, Serialize)]
struct FsCapabilities {
    #[serde(rename = "readTextFile")]
    read_text_file: bool,
    #[serde(rename = "writeTextFile")]
    write_text_file: bool,
}

impl Default for FsCapabilities {
    fn default() -> Self {
        Self {
            read_text_file: true,
            write_text_file: true,
        }
    }
}

/// One session mode the agent advertised at handshake or session open.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SessionMode {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

impl SessionMode {
    /// True if either the mode's id or name case-insensitively equals
    /// `"yolo"`.
    pub fn is_yolo(&self) -> bool {
        self.id.eq_ignore_ascii_case("yolo") || self.name.eq_ignore_ascii_case("yolo")
    }
}

/// Result of `session/new`.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionNewResult {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(default, rename = "modes")]
    pub modes: Vec<SessionMode>,
}

/// Finds the mode the Session Driver should switch into, if the agent
/// advertised one named/identified `yolo`.
pub fn find_yolo_mode(modes: &[SessionMode]) -> Option<&SessionMode> {
    modes.iter().find(|m| m.is_yolo())
}

/// Typed ACP method calls, built over a shared [`Bridge`].
#[derive(Clone)]
pub struct AcpClient {
    bridge: Arc<Bridge>,
}

impl AcpClient {
    pub fn new(bridge: Arc<Bridge>) -> Self {
        Self { bridge }
    }

    /// `initialize` — our fixed protocol version and declared fs
    /// capabilities. The agent's capability reply is discarded except for
    /// whatever the caller chooses to extract from the raw `Value`.
    pub async fn initialize(&self) -> Result<Value, ProtocolError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "clientCapabilities": { "fs": FsCapabilities::default() },
        });
        self.bridge.send_request("initialize", params, None).await
    }

    /// `session/new` with the repo root as cwd.
    pub async fn session_new(&self, cwd: &Path) -> Result<SessionNewResult, ProtocolError> {
        let params = json!({ "cwd": cwd.display().to_string() });
        let result = self.bridge.send_request("session/new", params, None).await?;
        serde_json::from_value(result)
            .map_err(|err| ProtocolError::MalformedEnvelope(err.to_string()))
    }

    /// `session/set_mode` — selects a mode by id.
    pub async fn session_set_mode(
        &self,
        session_id: &str,
        mode_id: &str,
    ) -> Result<(), ProtocolError> {
        let params = json!({ "sessionId": session_id, "modeId": mode_id });
        self.bridge
            .send_request("session/set_mode", params, None)
            .await?;
        Ok(())
    }

    /// `session/prompt` with a single text content block.
    pub async fn session_prompt(
        &self,
        session_id: &str,
        text: &str,
    ) -> Result<Value, ProtocolError> {
        let params = json!({
            "sessionId": session_id,
            "prompt": [{ "type": "text", "text": text }],
        });
        self.bridge.send_request("session/prompt", params, None).await
    }

    /// `session/cancel` — fire-and-forget, releases the agent's turn.
    pub async fn session_cancel(&self, session_id: &str) -> Result<(), ProtocolError> {
        self.bridge
            .send_notification("session/cancel", json!({ "sessionId": session_id }))
            .await
    }
}

/// Wire shape of a `session/request_permission` request's tool-call info.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub kind: String,
}

/// One option the agent offers for a permission decision.
#[derive(Debug, Clone, Deserialize)]
pub struct PermissionOption {
    #[serde(rename = "optionId")]
    pub option_id: String,
    pub kind: String,
}

/// Decoded `session/request_permission` params.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestPermissionParams {
    #[serde(rename = "toolCall")]
    pub tool_call: ToolCallInfo,
    #[serde(default)]
    pub options: Vec<PermissionOption>,
}

/// The outcome the Session Driver replies with to `session/request_permission`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PermissionOutcome {
    Cancelled,
    Selected { option_id: String },
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
