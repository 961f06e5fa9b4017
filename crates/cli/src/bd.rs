// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The boundary onto the embedded issue tracker CLI (`bd`): materializes a
//! [`TaskGraph`] from `bd ready`/`bd show`, resolves per-task prompts, and
//! writes status updates back. The tracker's own JSON schemas are external
//! (spec §6, non-goals); this module only decodes the handful of fields the
//! runner itself needs and forwards the rest untouched.

use std::collections::BTreeMap;
use std::process::Stdio;

use runner_core::{GraphError, RunResult, TaskGraph, TaskId, TaskNode};
use runner_engine::{RunMode, TaskOutcomeHook, TaskSpec, TaskSpecResolver};
use serde::Deserialize;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum BdError {
    #[error("failed to spawn `bd {0}`: {1}")]
    Spawn(String, #[source] std::io::Error),

    #[error("`bd {0}` exited with {1}: {2}")]
    NonZero(String, std::process::ExitStatus, String),

    #[error("failed to parse `bd {0}` output: {1}")]
    Decode(String, #[source] serde_json::Error),

    #[error("task graph rejected by `bd ready`/`bd show` output: {0}")]
    InvalidGraph(#[from] GraphError),
}

/// One issue as `bd show`/`bd ready --json` represent it. Only the fields
/// the runner consumes are modeled; everything else in the tracker's
/// payload is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct BdIssue {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub status: String,
    #[serde(rename = "issue_type", default)]
    pub issue_type: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub model: Option<String>,
}

impl BdIssue {
    fn is_leaf(&self) -> bool {
        self.status == "open" && self.issue_type != "epic" && self.issue_type != "molecule"
    }
}

/// Runs `bd <args>` under `root_dir` and decodes its stdout as JSON `T`.
async fn run_bd_json<T: serde::de::DeserializeOwned>(root_dir: &std::path::Path, args: &[&str]) -> Result<T, BdError> {
    let label = args.join(" ");
    let output = Command::new("bd")
        .args(args)
        .current_dir(root_dir)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|err| BdError::Spawn(label.clone(), err))?;

    if !output.status.success() {
        return Err(BdError::NonZero(
            label,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    serde_json::from_slice(&output.stdout).map_err(|err| BdError::Decode(label, err))
}

/// Fetches one issue by id.
pub async fn show(root_dir: &std::path::Path, id: &str) -> Result<BdIssue, BdError> {
    run_bd_json(root_dir, &["show", id, "--json"]).await
}

/// Materializes a [`TaskGraph`] rooted at `root_id`: calls `bd ready
/// --parent <root> --json`; if that returns no issues, falls back to `bd
/// show <root> --json` and treats a leaf `open` issue (not an epic or
/// molecule) as the sole ready task (spec §6 fallback rule).
pub async fn materialize_graph(
    root_dir: &std::path::Path,
    root_id: &str,
) -> Result<(TaskGraph, BTreeMap<String, BdIssue>), BdError> {
    let mut issues: Vec<BdIssue> = run_bd_json(root_dir, &["ready", "--parent", root_id, "--json"]).await?;

    if issues.is_empty() {
        let root = show(root_dir, root_id).await?;
        if root.is_leaf() {
            issues.push(root);
        }
    }

    let mut by_id = BTreeMap::new();
    let mut nodes = Vec::with_capacity(issues.len());
    for issue in issues {
        let depends_on: Vec<TaskId> = issue.depends_on.iter().cloned().map(TaskId::new).collect();
        nodes.push(TaskNode::new(issue.id.clone(), depends_on));
        by_id.insert(issue.id.clone(), issue);
    }

    let graph = TaskGraph::construct(nodes)?;

    Ok((graph, by_id))
}

/// Resolves a [`TaskSpec`] from a cached [`BdIssue`] fetched at graph
/// materialization time; falls back to a live `bd show` for tasks a prior
/// `bd ready` page didn't cover.
pub struct BdTaskSpecResolver {
    pub root_dir: std::path::PathBuf,
    pub model: Option<String>,
    pub mode: RunMode,
    pub issues: BTreeMap<String, BdIssue>,
}

impl TaskSpecResolver for BdTaskSpecResolver {
    fn resolve(&self, task_id: &TaskId) -> TaskSpec {
        let mut metadata = BTreeMap::new();
        let (prompt, model) = match self.issues.get(task_id.as_str()) {
            Some(issue) => {
                metadata.insert("title".to_string(), issue.title.clone());
                (prompt_for(issue), issue.model.clone().or_else(|| self.model.clone()))
            }
            None => (format!("Implement {}.", task_id.as_str()), self.model.clone()),
        };
        TaskSpec {
            prompt,
            model,
            mode: self.mode,
            timeout: None,
            metadata,
        }
    }
}

fn prompt_for(issue: &BdIssue) -> String {
    if issue.body.trim().is_empty() {
        issue.title.clone()
    } else {
        format!("{}\n\n{}", issue.title, issue.body)
    }
}

/// Forwards each task outcome to the tracker: `bd update <id> --status <s>`
/// and, when there's a reason worth recording, `--notes <s>`. Best-effort —
/// a tracker update failure is logged, never fatal to the run (spec §7:
/// retry policy against external collaborators is bounded and non-goal
/// beyond that).
pub struct BdOutcomeHook {
    pub root_dir: std::path::PathBuf,
}

impl TaskOutcomeHook for BdOutcomeHook {
    fn on_outcome(&self, task_id: &TaskId, result: &RunResult) {
        let root_dir = self.root_dir.clone();
        let task_id = task_id.as_str().to_string();
        let status = match result.status {
            runner_core::RunStatus::Completed => "done",
            runner_core::RunStatus::Blocked => "blocked",
            runner_core::RunStatus::Failed => "failed",
        }
        .to_string();
        let notes = (!result.reason.is_empty()).then(|| result.reason.clone());

        tokio::spawn(async move {
            if let Err(err) = Command::new("bd")
                .args(["update", &task_id, "--status", &status])
                .current_dir(&root_dir)
                .status()
                .await
            {
                tracing::warn!(task_id, error = %err, "bd update --status failed");
            }
            if let Some(notes) = notes {
                if let Err(err) = Command::new("bd")
                    .args(["update", &task_id, "--notes", &notes])
                    .current_dir(&root_dir)
                    .status()
                    .await
                {
                    tracing::warn!(task_id, error = %err, "bd update --notes failed");
                }
            }
        });
    }
}

#[cfg(test)]
#[path = "bd_tests.rs"]
mod tests;
