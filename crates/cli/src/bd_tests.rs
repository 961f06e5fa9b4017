// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn issue(status: &str, issue_type: &str) -> BdIssue {
    BdIssue {
        id: "task-1".to_string(),
        title: "Fix the thing".to_string(),
        body: String::new(),
        status: status.to_string(),
        issue_type: issue_type.to_string(),
        depends_on: Vec::new(),
        model: None,
    }
}

#[test]
fn open_leaf_is_ready() {
    assert!(issue("open", "task").is_leaf());
}

#[test]
fn epic_is_never_a_leaf() {
    assert!(!issue("open", "epic").is_leaf());
}

#[test]
fn molecule_is_never_a_leaf() {
    assert!(!issue("open", "molecule").is_leaf());
}

#[test]
fn closed_issue_is_not_a_leaf() {
    assert!(!issue("closed", "task").is_leaf());
}

#[test]
fn prompt_uses_title_only_when_body_is_blank() {
    let issue = issue("open", "task");
    assert_eq!(prompt_for(&issue), "Fix the thing");
}

#[test]
fn prompt_joins_title_and_body() {
    let mut issue = issue("open", "task");
    issue.body = "Do the thing carefully.".to_string();
    assert_eq!(prompt_for(&issue), "Fix the thing\n\nDo the thing carefully.");
}

#[test]
fn resolver_falls_back_to_a_synthesized_prompt_for_unknown_tasks() {
    let resolver = BdTaskSpecResolver {
        root_dir: std::path::PathBuf::from("."),
        model: Some("claude-opus".to_string()),
        mode: RunMode::Implement,
        issues: BTreeMap::new(),
    };
    let spec = resolver.resolve(&TaskId::new("unknown-task"));
    assert_eq!(spec.prompt, "Implement unknown-task.");
    assert_eq!(spec.model.as_deref(), Some("claude-opus"));
}

#[test]
fn resolver_prefers_the_issues_own_model_over_the_cli_default() {
    let mut issues = BTreeMap::new();
    let mut task = issue("open", "task");
    task.model = Some("per-issue-model".to_string());
    issues.insert(task.id.clone(), task);

    let resolver = BdTaskSpecResolver {
        root_dir: std::path::PathBuf::from("."),
        model: Some("cli-default-model".to_string()),
        mode: RunMode::Review,
        issues,
    };
    let spec = resolver.resolve(&TaskId::new("task-1"));
    assert_eq!(spec.model.as_deref(), Some("per-issue-model"));
    assert_eq!(spec.mode, RunMode::Review);
}
