// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `runner init`: scaffolds the agent definition file the spawned agent
//! reads its `yolo` mode from (`<repo>/.opencode/agent/yolo.md`). Thin and
//! standalone — it writes one file and wires nothing to a tracker or VCS
//! collaborator.

use std::path::{Path, PathBuf};

use thiserror::Error;

const AGENT_RELATIVE_PATH: &str = ".opencode/agent/yolo.md";

const AGENT_TEMPLATE: &str = "---\n\
description: Autonomous implementation mode driven by the task runner.\n\
mode: primary\n\
permission: allow\n\
---\n\
\n\
You are running unattended under the task runner. Implement the requested\n\
change, run the project's tests, and reply to the verification prompt with\n\
DONE or NOT DONE.\n";

#[derive(Debug, Error)]
pub enum InitError {
    #[error("failed to create {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Outcome of one `runner init` invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    Created,
    AlreadyPresent,
}

/// Writes the agent definition file under `repo_root` unless one already
/// exists there — `init` never overwrites a file an operator may have
/// customized.
pub fn scaffold(repo_root: &Path) -> Result<(PathBuf, InitOutcome), InitError> {
    let path = repo_root.join(AGENT_RELATIVE_PATH);
    if path.exists() {
        return Ok((path, InitOutcome::AlreadyPresent));
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| InitError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    std::fs::write(&path, AGENT_TEMPLATE).map_err(|source| InitError::Write {
        path: path.clone(),
        source,
    })?;

    Ok((path, InitOutcome::Created))
}

#[cfg(test)]
#[path = "init_tests.rs"]
mod tests;
