use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use runner_core::{RunMode, RunStatus, TaskGraph, TaskId, TaskNode, TaskState};

use super::*;

struct FixedResolver;

impl TaskSpecResolver for FixedResolver {
    fn resolve(&self, _task_id: &TaskId) -> TaskSpec {
        TaskSpec {
            prompt: "do the thing".to_string(),
            model: None,
            mode: RunMode::Implement,
            timeout: None,
            metadata: BTreeMap::new(),
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum Script {
    Succeed,
    Fail,
    HangUntilCancelled,
}

struct ScriptedRunner {
    scripts: BTreeMap<String, Script>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedRunner {
    fn new(scripts: BTreeMap<String, Script>) -> Self {
        Self {
            scripts,
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn max_concurrent(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

fn fake_result(status: RunStatus) -> RunResult {
    RunResult {
        status,
        reason: format!("{status:?}"),
        started_at: "2026-01-01T00:00:00Z".to_string(),
        finished_at: "2026-01-01T00:00:01Z".to_string(),
        log_path: PathBuf::from("/dev/null"),
        review_ready: false,
        artifacts: BTreeMap::new(),
    }
}

#[async_trait]
impl TaskRunner for ScriptedRunner {
    async fn run(
        &self,
        request: RunRequest,
        cancel: CancellationToken,
    ) -> Result<RunResult, SessionDriverError> {
        self.calls.lock().push(request.task_id.as_str().to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let script = self
            .scripts
            .get(request.task_id.as_str())
            .copied()
            .unwrap_or(Script::Succeed);

        let outcome = match script {
            Script::Succeed => {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok(fake_result(RunStatus::Completed))
            }
            Script::Fail => {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok(fake_result(RunStatus::Failed))
            }
            Script::HangUntilCancelled => {
                cancel.cancelled().await;
                Err(SessionDriverError::Cancelled)
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

fn make_coordinator(
    graph: Arc<TaskGraph>,
    runner: Arc<ScriptedRunner>,
    concurrency: usize,
) -> Coordinator {
    let tmp = tempfile::tempdir().expect("tempdir");
    Coordinator::new(
        CoordinatorOptions {
            repo_root: tmp.path().to_path_buf(),
            concurrency,
            max_consecutive_failures: None,
        },
        CoordinatorDeps {
            graph,
            runner,
            resolver: Arc::new(FixedResolver),
            on_progress: Arc::new(|_event| {}),
            event_log: Arc::new(RunnerEventLog::new(tmp.path().join("events.jsonl"))),
            outcome_hook: Arc::new(NullOutcomeHook),
        },
    )
}

#[tokio::test]
async fn runs_independent_tasks_to_completion() {
    let graph = Arc::new(
        TaskGraph::construct(vec![
            TaskNode::new("a", vec![]),
            TaskNode::new("b", vec![]),
            TaskNode::new("c", vec![]),
        ])
        .expect("construct"),
    );
    let runner = Arc::new(ScriptedRunner::new(BTreeMap::new()));
    let coordinator = make_coordinator(graph.clone(), runner, 3);

    let outcome = coordinator
        .run_loop(CancellationToken::new())
        .await
        .expect("run_loop");

    assert_eq!(outcome.succeeded.len(), 3);
    assert!(outcome.failed.is_empty());
    assert!(outcome.canceled.is_empty());
    assert!(outcome.graph_complete);
    for id in ["a", "b", "c"] {
        let snapshot = graph.inspect(&TaskId::new(id)).expect("inspect");
        assert_eq!(snapshot.state, TaskState::Succeeded);
    }
}

#[tokio::test]
async fn respects_concurrency_limit() {
    let mut nodes = Vec::new();
    for i in 0..6 {
        nodes.push(TaskNode::new(format!("t{i}"), vec![]));
    }
    let graph = Arc::new(TaskGraph::construct(nodes).expect("construct"));
    let runner = Arc::new(ScriptedRunner::new(BTreeMap::new()));
    let coordinator = make_coordinator(graph, runner.clone(), 2);

    coordinator
        .run_loop(CancellationToken::new())
        .await
        .expect("run_loop");

    assert!(runner.max_concurrent() <= 2);
    assert_eq!(runner.calls().len(), 6);
}

#[tokio::test]
async fn failed_dependency_leaves_dependent_pending_forever() {
    let graph = Arc::new(
        TaskGraph::construct(vec![
            TaskNode::new("base", vec![]),
            TaskNode::new("dependent", vec![TaskId::new("base")]),
        ])
        .expect("construct"),
    );
    let mut scripts = BTreeMap::new();
    scripts.insert("base".to_string(), Script::Fail);
    let runner = Arc::new(ScriptedRunner::new(scripts));
    let coordinator = make_coordinator(graph.clone(), runner, 4);

    let outcome = coordinator
        .run_loop(CancellationToken::new())
        .await
        .expect("run_loop");

    assert_eq!(outcome.failed, vec![TaskId::new("base")]);
    assert!(outcome.succeeded.is_empty());
    assert!(!outcome.graph_complete);

    let dependent = graph.inspect(&TaskId::new("dependent")).expect("inspect");
    assert_eq!(dependent.state, TaskState::Pending);
    assert!(!dependent.ready);
}

#[tokio::test]
async fn cancellation_before_dispatch_reserves_nothing() {
    let graph = Arc::new(TaskGraph::construct(vec![TaskNode::new("only", vec![])]).expect("construct"));
    let runner = Arc::new(ScriptedRunner::new(BTreeMap::new()));
    let coordinator = make_coordinator(graph.clone(), runner.clone(), 2);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let outcome = coordinator.run_loop(cancel).await.expect("run_loop");

    assert!(outcome.succeeded.is_empty());
    assert!(outcome.failed.is_empty());
    assert!(outcome.canceled.is_empty());
    assert!(runner.calls().is_empty());
    let snapshot = graph.inspect(&TaskId::new("only")).expect("inspect");
    assert_eq!(snapshot.state, TaskState::Pending);
}

#[tokio::test]
async fn cancellation_mid_run_drains_in_flight_as_canceled() {
    let graph = Arc::new(
        TaskGraph::construct(vec![
            TaskNode::new("hang1", vec![]),
            TaskNode::new("hang2", vec![]),
        ])
        .expect("construct"),
    );
    let mut scripts = BTreeMap::new();
    scripts.insert("hang1".to_string(), Script::HangUntilCancelled);
    scripts.insert("hang2".to_string(), Script::HangUntilCancelled);
    let runner = Arc::new(ScriptedRunner::new(scripts));
    let coordinator = make_coordinator(graph.clone(), runner, 2);

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    let run_fut = tokio::spawn(async move { coordinator.run_loop(cancel_clone).await });

    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();

    let outcome = run_fut
        .await
        .expect("join")
        .expect("run_loop");

    assert_eq!(outcome.canceled.len(), 2);
    for id in ["hang1", "hang2"] {
        let snapshot = graph.inspect(&TaskId::new(id)).expect("inspect");
        assert_eq!(snapshot.state, TaskState::Canceled);
    }
}

#[tokio::test]
async fn consecutive_failure_cap_stops_new_reservations() {
    let mut nodes = Vec::new();
    for i in 0..5 {
        nodes.push(TaskNode::new(format!("t{i}"), vec![]));
    }
    let graph = Arc::new(TaskGraph::construct(nodes).expect("construct"));
    let mut scripts = BTreeMap::new();
    for i in 0..5 {
        scripts.insert(format!("t{i}"), Script::Fail);
    }
    let runner = Arc::new(ScriptedRunner::new(scripts));
    let mut coordinator = make_coordinator(graph.clone(), runner.clone(), 1);
    coordinator.options.max_consecutive_failures = Some(2);

    let outcome = coordinator
        .run_loop(CancellationToken::new())
        .await
        .expect("run_loop");

    assert_eq!(outcome.failed.len(), 2);
    assert!(!outcome.graph_complete);
}
