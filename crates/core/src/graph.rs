// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory DAG of work items: ready-set computation, reservation under a
//! concurrency limit, cycle rejection at construction time.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use parking_lot::RwLock;

use crate::error::GraphError;
use crate::task::{Task, TaskId, TaskSnapshot, TaskState};

/// A single input node as seen by `TaskGraph::construct`.
#[derive(Debug, Clone)]
pub struct TaskNode {
    pub id: TaskId,
    pub depends_on: Vec<TaskId>,
}

impl TaskNode {
    pub fn new(id: impl Into<TaskId>, depends_on: Vec<TaskId>) -> Self {
        Self {
            id: id.into(),
            depends_on,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    tasks: BTreeMap<TaskId, Task>,
    /// task -> its dependencies, sorted.
    deps: BTreeMap<TaskId, Vec<TaskId>>,
    /// task -> tasks that depend on it, sorted.
    dependents: BTreeMap<TaskId, Vec<TaskId>>,
}

/// The in-memory DAG of tasks. Constructed once; mutated under a single
/// writer lock so `reserve` never hands out overlapping ids to concurrent
/// callers.
pub struct TaskGraph {
    inner: RwLock<Inner>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

impl TaskGraph {
    /// Builds a graph from `nodes`, rejecting empty/duplicate ids, unknown
    /// dependencies, and cycles. Cycle detection walks ids in deterministic
    /// sorted order so the reported path is reproducible.
    pub fn construct(nodes: Vec<TaskNode>) -> Result<Self, GraphError> {
        let mut tasks: BTreeMap<TaskId, Task> = BTreeMap::new();
        let mut deps: BTreeMap<TaskId, Vec<TaskId>> = BTreeMap::new();

        for node in &nodes {
            if node.id.as_str().is_empty() {
                return Err(GraphError::EmptyId);
            }
            if tasks.contains_key(&node.id) {
                return Err(GraphError::DuplicateId(node.id.as_str().to_string()));
            }
            let mut d = node.depends_on.clone();
            d.sort();
            d.dedup();
            tasks.insert(node.id.clone(), Task::new(node.id.clone(), d.clone()));
            deps.insert(node.id.clone(), d);
        }

        for (id, ds) in &deps {
            for dep in ds {
                if !tasks.contains_key(dep) {
                    return Err(GraphError::UnknownDependency {
                        task: id.as_str().to_string(),
                        dependency: dep.as_str().to_string(),
                    });
                }
            }
        }

        if let Some(path) = find_cycle(&deps) {
            return Err(GraphError::Cycle(
                path.iter()
                    .map(|id| id.as_str())
                    .collect::<Vec<_>>()
                    .join(" -> "),
            ));
        }

        let mut dependents: BTreeMap<TaskId, Vec<TaskId>> = BTreeMap::new();
        for id in tasks.keys() {
            dependents.insert(id.clone(), Vec::new());
        }
        for (id, ds) in &deps {
            for dep in ds {
                dependents.entry(dep.clone()).or_default().push(id.clone());
            }
        }
        for v in dependents.values_mut() {
            v.sort();
        }

        Ok(Self {
            inner: RwLock::new(Inner {
                tasks,
                deps,
                dependents,
            }),
        })
    }

    /// Pending tasks whose dependencies are all `succeeded`, sorted ascending.
    pub fn ready_set(&self) -> Vec<TaskId> {
        let inner = self.inner.read();
        ready_ids(&inner)
    }

    /// Atomically takes up to `limit` ids from the ready set and transitions
    /// them pending -> running. Never returns overlapping ids across
    /// concurrent callers.
    pub fn reserve(&self, limit: usize) -> Vec<TaskId> {
        let mut inner = self.inner.write();
        let ready = ready_ids(&inner);
        let taken: Vec<TaskId> = ready.into_iter().take(limit).collect();
        for id in &taken {
            if let Some(task) = inner.tasks.get_mut(id) {
                task.state = TaskState::Running;
            }
        }
        taken
    }

    /// Transitions `id` to `state`. Fails on unknown id or a transition out
    /// of a terminal state.
    pub fn set_state(&self, id: &TaskId, state: TaskState) -> Result<(), GraphError> {
        let mut inner = self.inner.write();
        let task = inner
            .tasks
            .get_mut(id)
            .ok_or_else(|| GraphError::UnknownTask(id.as_str().to_string()))?;
        if task.state.is_terminal() {
            return Err(GraphError::TerminalTransition {
                id: id.as_str().to_string(),
                from: task.state,
                to: state,
            });
        }
        task.state = state;
        Ok(())
    }

    /// Snapshot of state, ready flag, terminal flag, deps, dependents.
    pub fn inspect(&self, id: &TaskId) -> Result<TaskSnapshot, GraphError> {
        let inner = self.inner.read();
        let task = inner
            .tasks
            .get(id)
            .ok_or_else(|| GraphError::UnknownTask(id.as_str().to_string()))?;
        let ready = is_ready(&inner, id, task);
        Ok(TaskSnapshot {
            id: id.clone(),
            state: task.state,
            ready,
            terminal: task.state.is_terminal(),
            depends_on: inner.deps.get(id).cloned().unwrap_or_default(),
            dependents: inner.dependents.get(id).cloned().unwrap_or_default(),
        })
    }

    /// BFS over dependency levels; widest layer width. Informational only.
    pub fn max_parallelism(&self) -> usize {
        let inner = self.inner.read();
        let mut indegree: BTreeMap<TaskId, usize> = BTreeMap::new();
        for (id, ds) in &inner.deps {
            indegree.insert(id.clone(), ds.len());
        }
        let mut frontier: Vec<TaskId> = indegree
            .iter()
            .filter(|(_, n)| **n == 0)
            .map(|(id, _)| id.clone())
            .collect();
        frontier.sort();
        let mut max_width = frontier.len();
        let mut remaining = indegree;
        let mut queue: VecDeque<TaskId> = frontier.into_iter().collect();
        for id in &queue {
            remaining.remove(id);
        }
        while !queue.is_empty() {
            let mut next_frontier: BTreeSet<TaskId> = BTreeSet::new();
            for id in std::mem::take(&mut queue) {
                for dependent in inner.dependents.get(&id).cloned().unwrap_or_default() {
                    if let Some(n) = remaining.get_mut(&dependent) {
                        *n -= 1;
                        if *n == 0 {
                            remaining.remove(&dependent);
                            next_frontier.insert(dependent);
                        }
                    }
                }
            }
            max_width = max_width.max(next_frontier.len());
            queue = next_frontier.into_iter().collect();
        }
        max_width
    }

    /// True once every task is terminal.
    pub fn is_complete(&self) -> bool {
        let inner = self.inner.read();
        inner.tasks.values().all(|t| t.state.is_terminal())
    }
}

fn ready_ids(inner: &Inner) -> Vec<TaskId> {
    let mut ids: Vec<TaskId> = inner
        .tasks
        .iter()
        .filter(|(id, task)| is_ready(inner, id, task))
        .map(|(id, _)| id.clone())
        .collect();
    ids.sort();
    ids
}

fn is_ready(inner: &Inner, id: &TaskId, task: &Task) -> bool {
    if task.state != TaskState::Pending {
        return false;
    }
    inner
        .deps
        .get(id)
        .map(|ds| {
            ds.iter()
                .all(|d| inner.tasks.get(d).map(|t| t.state) == Some(TaskState::Succeeded))
        })
        .unwrap_or(true)
}

/// Three-colour DFS over ids in sorted order; returns the first cycle found
/// as a path from its start back to itself.
fn find_cycle(deps: &BTreeMap<TaskId, Vec<TaskId>>) -> Option<Vec<TaskId>> {
    let mut color: BTreeMap<TaskId, Color> = deps.keys().map(|id| (id.clone(), Color::White)).collect();
    let mut stack: Vec<TaskId> = Vec::new();

    fn visit(
        id: &TaskId,
        deps: &BTreeMap<TaskId, Vec<TaskId>>,
        color: &mut BTreeMap<TaskId, Color>,
        stack: &mut Vec<TaskId>,
    ) -> Option<Vec<TaskId>> {
        color.insert(id.clone(), Color::Gray);
        stack.push(id.clone());
        if let Some(edges) = deps.get(id) {
            for dep in edges {
                match color.get(dep).copied().unwrap_or(Color::White) {
                    Color::White => {
                        if let Some(cycle) = visit(dep, deps, color, stack) {
                            return Some(cycle);
                        }
                    }
                    Color::Gray => {
                        let start = stack.iter().position(|x| x == dep).unwrap_or(0);
                        let mut path: Vec<TaskId> = stack[start..].to_vec();
                        path.push(dep.clone());
                        return Some(path);
                    }
                    Color::Black => {}
                }
            }
        }
        stack.pop();
        color.insert(id.clone(), Color::Black);
        None
    }

    let ids: Vec<TaskId> = deps.keys().cloned().collect();
    for id in ids {
        if color.get(&id).copied().unwrap_or(Color::White) == Color::White {
            if let Some(cycle) = visit(&id, deps, &mut color, &mut stack) {
                return Some(cycle);
            }
        }
    }
    None
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
