// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plain-text progress rendering. The terminal UI renderer proper is out of
//! scope (spec §1); this is the minimal line-oriented fallback the CLI
//! needs to be usable without one — one line per [`ProgressEvent`], tagged
//! by role, matching the normalized update kinds the Session Driver emits.

use runner_core::{AgentUpdate, ProgressEvent};

/// Builds a [`ProgressSink`](runner_core::ProgressSink) that writes one
/// tagged line per event to stdout. `headless` only affects whether the
/// task id prefix is included — both modes are plain text, since rendering
/// a richer view is the out-of-scope terminal UI's job.
pub fn stdout_sink(headless: bool) -> runner_core::ProgressSink {
    std::sync::Arc::new(move |event: ProgressEvent| {
        if let Some(line) = render(&event) {
            if headless {
                println!("[{}] {line}", event.task_id);
            } else {
                println!("{line}");
            }
        }
    })
}

fn render(event: &ProgressEvent) -> Option<String> {
    match &event.update {
        AgentUpdate::UserMessageChunk { text } => Some(format!("user_message {text:?}")),
        AgentUpdate::AgentMessageChunk { text } => Some(format!("agent_message {text:?}")),
        AgentUpdate::AgentThoughtChunk { text } => Some(format!("agent_thought {text:?}")),
        AgentUpdate::ToolCall { title, status, .. } => {
            Some(format!("runner_cmd_started {title:?} status={status:?}"))
        }
        AgentUpdate::ToolCallUpdate { id, status } => {
            Some(format!("runner_cmd_finished {id} status={status:?}"))
        }
        AgentUpdate::Plan { .. } | AgentUpdate::AvailableCommands { .. } | AgentUpdate::CurrentMode { .. } => None,
    }
}

#[cfg(test)]
#[path = "progress_tests.rs"]
mod tests;
