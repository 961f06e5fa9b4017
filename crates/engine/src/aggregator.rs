// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Line aggregation for the three streamed-chunk `session/update` variants:
//! buffer per role, flush whole lines in arrival order, no partial-line
//! emission. Thought chunks additionally get `\r\n`/`\r`/`\n` replaced with
//! spaces in the flushed payload (TUI safety — a thought line must never
//! itself contain a newline once flushed).

use runner_core::AgentUpdate;

#[derive(Debug, Default)]
struct LineBuffer {
    buf: String,
}

impl LineBuffer {
    /// Appends `chunk`, returning every newline-terminated line now
    /// complete, in order; an un-terminated remainder stays buffered for
    /// the next call.
    fn push(&mut self, chunk: &str) -> Vec<String> {
        self.buf.push_str(chunk);
        let mut flushed = Vec::new();
        while let Some(pos) = self.buf.find('\n') {
            flushed.push(self.buf.drain(..=pos).collect());
        }
        flushed
    }
}

/// Per-session buffers for `user_message_chunk`, `agent_message_chunk`, and
/// `agent_thought_chunk`. One instance per Session Driver run; reset is
/// implicit since a new run gets a fresh `ChunkAggregator`.
#[derive(Debug, Default)]
pub struct ChunkAggregator {
    user: LineBuffer,
    agent_message: LineBuffer,
    agent_thought: LineBuffer,
}

impl ChunkAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user_message_chunk(&mut self, text: &str) -> Vec<AgentUpdate> {
        self.user
            .push(text)
            .into_iter()
            .map(|line| AgentUpdate::UserMessageChunk { text: line })
            .collect()
    }

    pub fn push_agent_message_chunk(&mut self, text: &str) -> Vec<AgentUpdate> {
        self.agent_message
            .push(text)
            .into_iter()
            .map(|line| AgentUpdate::AgentMessageChunk { text: line })
            .collect()
    }

    pub fn push_agent_thought_chunk(&mut self, text: &str) -> Vec<AgentUpdate> {
        self.agent_thought
            .push(text)
            .into_iter()
            .map(|line| AgentUpdate::AgentThoughtChunk {
                text: scrub_newlines(&line),
            })
            .collect()
    }
}

fn scrub_newlines(line: &str) -> String {
    line.replace("\r\n", " ").replace('\r', " ").replace('\n', " ")
}

#[cfg(test)]
#[path = "aggregator_tests.rs"]
mod tests;
