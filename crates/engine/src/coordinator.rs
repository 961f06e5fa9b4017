// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Runner Coordinator: a long-lived run loop that pulls ready ids from a
//! [`TaskGraph`], launches a Session Driver per id up to a concurrency
//! limit, records outcomes back onto the graph, and drains cleanly on
//! cancellation.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use runner_core::{
    ProgressSink, RunMode, RunRequest, RunResult, RunStatus, TaskGraph, TaskId, TaskState,
};

use crate::driver::SessionDriver;
use crate::error::{CoordinatorError, SessionDriverError};
use crate::event_log::{EventKind, RunnerEvent, RunnerEventLog};

/// What the Coordinator needs to turn a bare [`TaskId`] into the parts of a
/// `RunRequest` the Task Graph itself doesn't know (prompt text, model,
/// mode, per-task timeout, metadata). Concrete resolution (e.g. from an
/// issue tracker's ticket body) is an external collaborator's job; this is
/// the seam it plugs into.
pub struct TaskSpec {
    pub prompt: String,
    pub model: Option<String>,
    pub mode: RunMode,
    pub timeout: Option<Duration>,
    pub metadata: BTreeMap<String, String>,
}

/// Resolves a [`TaskSpec`] for a given task id. Injected so Coordinator
/// tests never depend on a real issue tracker.
pub trait TaskSpecResolver: Send + Sync {
    fn resolve(&self, task_id: &TaskId) -> TaskSpec;
}

/// Runs one `RunRequest` to a `RunResult`. Implemented by [`SessionDriver`]
/// for real use; tests substitute a scripted fake so the Coordinator's
/// scheduling logic is exercised without a real subprocess.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run(
        &self,
        request: RunRequest,
        cancel: CancellationToken,
    ) -> Result<RunResult, SessionDriverError>;
}

#[async_trait]
impl TaskRunner for SessionDriver {
    async fn run(
        &self,
        request: RunRequest,
        cancel: CancellationToken,
    ) -> Result<RunResult, SessionDriverError> {
        SessionDriver::run(self, request, cancel).await
    }
}

/// Called after each task's outcome is recorded, so the caller can forward
/// it to an issue tracker or VCS collaborator. A no-op by default.
pub trait TaskOutcomeHook: Send + Sync {
    fn on_outcome(&self, task_id: &TaskId, result: &RunResult);
}

/// The default hook: does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullOutcomeHook;

impl TaskOutcomeHook for NullOutcomeHook {
    fn on_outcome(&self, _task_id: &TaskId, _result: &RunResult) {}
}

/// Values that don't vary per run.
pub struct CoordinatorOptions {
    pub repo_root: PathBuf,
    /// Max Session Drivers active simultaneously.
    pub concurrency: usize,
    /// Hard failure policy: stop reserving new work after this many
    /// consecutive task failures. `None` disables the cap.
    pub max_consecutive_failures: Option<usize>,
}

/// Everything the Coordinator needs that isn't a bare option value.
pub struct CoordinatorDeps {
    pub graph: Arc<TaskGraph>,
    pub runner: Arc<dyn TaskRunner>,
    pub resolver: Arc<dyn TaskSpecResolver>,
    pub on_progress: ProgressSink,
    pub event_log: Arc<RunnerEventLog>,
    pub outcome_hook: Arc<dyn TaskOutcomeHook>,
}

/// What one `run_loop` call produced.
#[derive(Debug, Default, Clone)]
pub struct CoordinatorOutcome {
    pub succeeded: Vec<TaskId>,
    pub failed: Vec<TaskId>,
    pub canceled: Vec<TaskId>,
    pub reasons: BTreeMap<TaskId, String>,
    pub stall_categories: BTreeMap<TaskId, String>,
    /// True if every task in the graph reached a terminal state. False
    /// means some tasks are still pending (e.g. blocked forever behind a
    /// dependency that failed) — the run still terminated cleanly, there
    /// was just no more progress to make.
    pub graph_complete: bool,
}

/// A convenience alias for the Session Driver (or test double) the
/// Coordinator wires up per task.
pub type SessionDriverFactory = Arc<dyn TaskRunner>;

/// Drives the run loop: `reserve` from the graph, dispatch, record, repeat.
pub struct Coordinator {
    options: CoordinatorOptions,
    deps: CoordinatorDeps,
}

impl Coordinator {
    pub fn new(options: CoordinatorOptions, deps: CoordinatorDeps) -> Self {
        Self { options, deps }
    }

    /// Runs until the graph can make no further progress or `cancel` fires.
    /// Errors are reserved for conditions fatal to the whole run; per-task
    /// failures are recorded in the returned [`CoordinatorOutcome`] instead.
    pub async fn run_loop(&self, cancel: CancellationToken) -> Result<CoordinatorOutcome, CoordinatorError> {
        self.deps.event_log.append(&RunnerEvent::new(EventKind::RunStarted));

        let concurrency = self.options.concurrency.max(1);
        let mut outcome = CoordinatorOutcome::default();
        let mut in_flight: JoinSet<(TaskId, Result<RunResult, SessionDriverError>)> = JoinSet::new();
        let mut slot_of: BTreeMap<TaskId, usize> = BTreeMap::new();
        let mut worker_busy = vec![false; concurrency];
        let mut dispatched = 0usize;
        let mut consecutive_failures = 0usize;
        let mut draining = cancel.is_cancelled();

        loop {
            if !draining && cancel.is_cancelled() {
                draining = true;
            }
            if !draining {
                if let Some(cap) = self.options.max_consecutive_failures {
                    if consecutive_failures >= cap {
                        draining = true;
                    }
                }
            }

            if !draining {
                let capacity = worker_busy.iter().filter(|busy| !**busy).count();
                if capacity > 0 {
                    let reserved = self.deps.graph.reserve(capacity);
                    for task_id in reserved {
                        let worker_id = worker_busy
                            .iter()
                            .position(|busy| !busy)
                            .unwrap_or(0);
                        worker_busy[worker_id] = true;
                        slot_of.insert(task_id.clone(), worker_id);
                        let queue_pos = dispatched;
                        dispatched += 1;

                        self.deps.event_log.append(
                            &RunnerEvent::new(EventKind::TaskStarted)
                                .with_task_id(task_id.as_str())
                                .with_worker_id(worker_id)
                                .with_queue_pos(queue_pos),
                        );

                        let request = self.build_request(&task_id);
                        let runner = self.deps.runner.clone();
                        let task_cancel = cancel.clone();
                        let spawned_id = task_id.clone();
                        in_flight.spawn(async move {
                            let result = runner.run(request, task_cancel).await;
                            (spawned_id, result)
                        });
                    }
                }
            }

            if in_flight.is_empty() {
                break;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled(), if !draining => {
                    draining = true;
                }
                joined = in_flight.join_next() => {
                    let Some(joined) = joined else { continue };
                    let (task_id, result) = match joined {
                        Ok(pair) => pair,
                        Err(join_err) => (
                            // A panicking task runner has no id of its own
                            // to recover; nothing in `slot_of` will match,
                            // so the slot frees on the next loop's cleanup
                            // pass below regardless.
                            TaskId::new(""),
                            Err(SessionDriverError::Io(std::io::Error::other(join_err.to_string()))),
                        ),
                    };
                    if let Some(worker_id) = slot_of.remove(&task_id) {
                        worker_busy[worker_id] = false;
                    }
                    if !task_id.as_str().is_empty() {
                        self.record_result(&task_id, result, &mut outcome, &mut consecutive_failures);
                    }
                }
            }
        }

        outcome.graph_complete = self.deps.graph.is_complete();
        self.deps.event_log.append(&RunnerEvent::new(EventKind::RunnerFinished));
        Ok(outcome)
    }

    fn build_request(&self, task_id: &TaskId) -> RunRequest {
        let spec = self.deps.resolver.resolve(task_id);
        RunRequest {
            task_id: task_id.clone(),
            repo_root: self.options.repo_root.clone(),
            prompt: spec.prompt,
            model: spec.model,
            mode: spec.mode,
            timeout: spec.timeout,
            metadata: spec.metadata,
            on_progress: self.deps.on_progress.clone(),
        }
    }

    fn record_result(
        &self,
        task_id: &TaskId,
        result: Result<RunResult, SessionDriverError>,
        outcome: &mut CoordinatorOutcome,
        consecutive_failures: &mut usize,
    ) {
        match result {
            Ok(run_result) => {
                let message = run_result.reason.clone();
                match run_result.status {
                    RunStatus::Completed => {
                        let _ = self.deps.graph.set_state(task_id, TaskState::Succeeded);
                        outcome.succeeded.push(task_id.clone());
                        *consecutive_failures = 0;
                    }
                    RunStatus::Blocked | RunStatus::Failed => {
                        let _ = self.deps.graph.set_state(task_id, TaskState::Failed);
                        outcome.failed.push(task_id.clone());
                        outcome.reasons.insert(task_id.clone(), message.clone());
                        if let Some(category) = run_result.artifact("stall_category") {
                            outcome
                                .stall_categories
                                .insert(task_id.clone(), category.to_string());
                        }
                        *consecutive_failures += 1;
                    }
                }
                self.deps.event_log.append(
                    &RunnerEvent::new(EventKind::TaskFinished)
                        .with_task_id(task_id.as_str())
                        .with_message(message),
                );
                self.deps.outcome_hook.on_outcome(task_id, &run_result);
            }
            Err(err) => {
                let _ = self.deps.graph.set_state(task_id, TaskState::Canceled);
                outcome.canceled.push(task_id.clone());
                outcome.reasons.insert(task_id.clone(), err.to_string());
                self.deps.event_log.append(
                    &RunnerEvent::new(EventKind::TaskFinished)
                        .with_task_id(task_id.as_str())
                        .with_message(err.to_string()),
                );
            }
        }
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
