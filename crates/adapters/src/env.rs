// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment and on-disk config shaping for the agent subprocess.
//!
//! The agent reads its permission policy and model selection from a mix of
//! environment variables and a JSON config file under `XDG_CONFIG_HOME`.
//! This module builds both in one place so the Session Driver, the
//! Watchdog's config construction, and `runner init` never disagree about
//! the shape.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};

/// Permission keys the runner always sets to `allow`. The agent otherwise
/// stops to ask for every tool call, which this runner has no human to
/// answer; arbitration happens in the Session Driver instead (see
/// `runner_engine::permission`).
pub const PERMISSION_ALLOW_KEYS: &[&str] = &[
    "*",
    "doom_loop",
    "external_directory",
    "question",
    "plan_enter",
    "plan_exit",
];

/// The deterministic `OPENCODE_PERMISSION` policy: every key above mapped
/// to `"allow"`.
pub fn permission_policy_json() -> Value {
    let mut map = serde_json::Map::new();
    for key in PERMISSION_ALLOW_KEYS {
        map.insert((*key).to_string(), Value::String("allow".to_string()));
    }
    Value::Object(map)
}

/// Environment and config produced for one agent spawn.
#[derive(Debug, Clone)]
pub struct AgentEnv {
    /// `(name, value)` pairs to set on the child process, in addition to
    /// whatever base environment the caller copies forward.
    pub vars: Vec<(String, String)>,
    /// The config directory created for this spawn (`OPENCODE_CONFIG_DIR`).
    pub config_dir: PathBuf,
    /// The config file written inside `config_dir`.
    pub config_path: PathBuf,
}

/// Builds the agent's environment and writes its config file under
/// `config_root`, creating the directory tree if absent.
///
/// `config_root` becomes `XDG_CONFIG_HOME`; the agent's own config lives at
/// `config_root/opencode/opencode.json` unless `config_dir_override` names a
/// different directory (the CLI's separate `--config-dir` flag — most
/// deployments only ever set `--config-root` and leave this `None`).
pub fn build_agent_env(
    config_root: &Path,
    config_dir_override: Option<&Path>,
    model: Option<&str>,
) -> std::io::Result<AgentEnv> {
    let config_dir = config_dir_override
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config_root.join("opencode"));
    std::fs::create_dir_all(&config_dir)?;

    let config_path = config_dir.join("opencode.json");
    let config_content = match model {
        Some(model) => json!({ "model": model }),
        None => json!({}),
    };
    std::fs::write(&config_path, serde_json::to_vec(&config_content)?)?;

    let vars = vec![
        ("OPENCODE_DISABLE_CLAUDE_CODE".to_string(), "true".to_string()),
        (
            "OPENCODE_DISABLE_CLAUDE_CODE_SKILLS".to_string(),
            "true".to_string(),
        ),
        (
            "OPENCODE_DISABLE_CLAUDE_CODE_PROMPT".to_string(),
            "true".to_string(),
        ),
        (
            "OPENCODE_DISABLE_DEFAULT_PLUGINS".to_string(),
            "true".to_string(),
        ),
        ("CI".to_string(), "true".to_string()),
        (
            "XDG_CONFIG_HOME".to_string(),
            config_root.display().to_string(),
        ),
        (
            "OPENCODE_CONFIG_DIR".to_string(),
            config_dir.display().to_string(),
        ),
        (
            "OPENCODE_CONFIG".to_string(),
            config_path.display().to_string(),
        ),
        (
            "OPENCODE_CONFIG_CONTENT".to_string(),
            config_content.to_string(),
        ),
        (
            "OPENCODE_PERMISSION".to_string(),
            permission_policy_json().to_string(),
        ),
    ];

    Ok(AgentEnv {
        vars,
        config_dir,
        config_path,
    })
}

/// Builds the argv for the agent's protocol mode: `acp --print-logs --cwd
/// <repo_root> [--model <m>]`.
pub fn agent_argv(repo_root: &Path, model: Option<&str>) -> Vec<String> {
    let mut argv = vec![
        "acp".to_string(),
        "--print-logs".to_string(),
        "--cwd".to_string(),
        repo_root.display().to_string(),
    ];
    if let Some(model) = model {
        argv.push("--model".to_string());
        argv.push(model.to_string());
    }
    argv
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
