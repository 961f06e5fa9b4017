// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Session Driver: owns exactly one agent subprocess for the lifetime of
//! one `RunRequest`, speaks the agent protocol over it via a [`Bridge`], and
//! turns whatever happens into a `RunResult`. The hardest component in this
//! crate — see the state machine in the module's design notes.

use std::collections::{BTreeMap, HashMap};
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncRead, ReadBuf};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use runner_adapters::{agent_argv, build_agent_env, ProcessSpawner, SpawnError, SpawnSpec};
use runner_core::{
    AgentUpdate, Clock, ProgressEvent, ProgressSink, RunMode, RunRequest, RunResult, RunStatus,
    SessionId, SessionState, StallCategory, TaskId, ToolCallStatus,
};
use runner_protocol::{
    find_yolo_mode, AcpClient, Bridge, DispatchError, Dispatcher, RequestPermissionParams,
    METHOD_FS_READ_TEXT_FILE, METHOD_FS_WRITE_TEXT_FILE, METHOD_REQUEST_PERMISSION,
    METHOD_SESSION_UPDATE,
};

use crate::aggregator::ChunkAggregator;
use crate::error::{SessionDriverError, ShutdownOutcome};
use crate::event_log::now_rfc3339;
use crate::init_sniffer;
use crate::log_paths::{task_log_paths, TaskLogPaths};
use crate::permission::{arbitrate, PermissionAuditRecord, PermissionHandler};
use crate::verification::{parse_review_verdict, parse_verification_reply, Verified};
use crate::watchdog::{Watchdog, WatchdogConfig, WatchdogOutcome};

const VERIFICATION_PROMPT: &str =
    "Verify task completion: run required tests if not already run, then reply with DONE or NOT DONE.";
const VERIFICATION_ATTEMPTS: u32 = 2;

/// Everything the Session Driver needs that doesn't vary per run.
pub struct SessionDriverConfig {
    pub spawner: Arc<dyn ProcessSpawner>,
    /// The agent binary (the `<agent-binary>` positional on its own command line).
    pub agent_program: String,
    /// Root written as `XDG_CONFIG_HOME` for the spawned agent.
    pub config_root: PathBuf,
    /// Explicit override for the agent's own config directory (the CLI's
    /// `--config-dir`, distinct from `--config-root`/`XDG_CONFIG_HOME`).
    /// `None` defaults to `config_root/opencode`.
    pub config_dir: Option<PathBuf>,
    pub clock: Arc<dyn Clock>,
    pub permission_handler: Arc<dyn PermissionHandler>,
    pub watchdog_timeout: Duration,
    pub watchdog_interval: Duration,
    pub watchdog_tail_lines: usize,
    /// Capture-idle threshold (~200ms per spec).
    pub idle_delay: Duration,
    /// Grace period for the process to exit after the Bridge closes (~2s).
    pub acp_shutdown_grace: Duration,
    /// Poll period for the Serena-style init-failure sniffer.
    pub init_sniff_interval: Duration,
}

/// Drives one agent subprocess through exactly one `RunRequest`.
pub struct SessionDriver {
    config: SessionDriverConfig,
}

impl SessionDriver {
    pub fn new(config: SessionDriverConfig) -> Self {
        Self { config }
    }

    /// Runs one request to completion. Only `SessionDriverError::Cancelled`
    /// propagates as an `Err`; every other failure is packed into the
    /// returned `RunResult` instead.
    #[instrument(skip_all, fields(task_id = %request.task_id))]
    pub async fn run(
        &self,
        request: RunRequest,
        cancel: CancellationToken,
    ) -> Result<RunResult, SessionDriverError> {
        let started_at = now_rfc3339();
        let log_paths = task_log_paths(&request.repo_root, &request.task_id);

        let outcome = match request.timeout {
            Some(d) => match tokio::time::timeout(d, self.drive_with_shutdown(&request, &log_paths, &cancel)).await
            {
                Ok(inner) => inner,
                Err(_elapsed) => Err(SessionDriverError::Timeout(d)),
            },
            None => self.drive_with_shutdown(&request, &log_paths, &cancel).await,
        };

        let finished_at = now_rfc3339();

        match outcome {
            Err(SessionDriverError::Cancelled) => Err(SessionDriverError::Cancelled),
            other => Ok(Self::build_result(&request, &log_paths, started_at, finished_at, other)),
        }
    }

    async fn drive_with_shutdown(
        &self,
        request: &RunRequest,
        log_paths: &TaskLogPaths,
        cancel: &CancellationToken,
    ) -> Result<DriveOutcome, SessionDriverError> {
        let agent_env = build_agent_env(
            &self.config.config_root,
            self.config.config_dir.as_deref(),
            request.model.as_deref(),
        )?;
        let argv = agent_argv(&request.repo_root, request.model.as_deref());

        let mut env: Vec<(String, String)> = std::env::vars().collect();
        env.extend(agent_env.vars.clone());

        let spawn_spec = SpawnSpec {
            program: self.config.agent_program.clone(),
            args: argv,
            env,
            cwd: request.repo_root.clone(),
            stdout_log_path: log_paths.stdout_jsonl.clone(),
        };

        let mut process = self.config.spawner.start(spawn_spec).await?;

        let stdin = process
            .take_stdin()
            .ok_or_else(|| spawn_pipe_error(&self.config.agent_program, "stdin"))?;
        let stdout = process
            .take_stdout()
            .ok_or_else(|| spawn_pipe_error(&self.config.agent_program, "stdout"))?;
        let tee = TeeReader::new(&log_paths.stdout_jsonl, stdout)?;

        let shared = Arc::new(Mutex::new(SharedState::new()));
        let dispatcher = Arc::new(DriverDispatcher {
            shared: shared.clone(),
            task_id: request.task_id.as_str().to_string(),
            permission_handler: self.config.permission_handler.clone(),
            audit_log_path: log_paths.stdout_jsonl.clone(),
        });

        let bridge = Arc::new(Bridge::new(Duration::ZERO));
        bridge.start(tee, stdin, dispatcher)?;
        let client = AcpClient::new(bridge.clone());

        let agent_log_dir = log_paths
            .stderr_log
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| request.repo_root.clone());
        let watchdog = Watchdog::new(WatchdogConfig {
            log_path: log_paths.stdout_jsonl.clone(),
            agent_log_dir,
            timeout: self.config.watchdog_timeout,
            interval: self.config.watchdog_interval,
            tail_lines: self.config.watchdog_tail_lines,
            clock: self.config.clock.clone(),
        });

        let sniffer =
            init_sniffer::watch_for_init_failure(log_paths.stderr_log.clone(), self.config.init_sniff_interval);

        let drive_fut = self.drive_protocol(&client, &shared, request);
        tokio::pin!(drive_fut);

        let mut shutdown = ShutdownOutcome::default();

        // Races the Bridge/protocol flow against cancellation, the Watchdog,
        // and the Serena init-failure sniffer. `drive_fut` is pinned so that,
        // if the Watchdog observes the process exit first, it can still be
        // polled a little longer below (shutdown case: "process finishing
        // before Bridge") instead of being dropped outright.
        let race_result: Result<DriveOutcome, ()> = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                shutdown.cancelled = Some(SessionDriverError::Cancelled);
                Err(())
            }
            outcome = watchdog.monitor(process.as_mut()) => match outcome {
                WatchdogOutcome::Stalled(stall) if stall.category == StallCategory::IdleTransportOpen => {
                    Ok(DriveOutcome::default())
                }
                WatchdogOutcome::Stalled(stall) => {
                    shutdown.run_err = Some(SessionDriverError::Stall(stall));
                    Err(())
                }
                WatchdogOutcome::Exited(_status) => {
                    // The process is gone but the Bridge may still have a
                    // final response/notification in flight; give it a
                    // grace window to conclude before declaring a failure.
                    match tokio::time::timeout(self.config.acp_shutdown_grace, &mut drive_fut).await {
                        Ok(Ok(done)) => Ok(done),
                        Ok(Err(err)) => {
                            shutdown.run_err = Some(err);
                            Err(())
                        }
                        Err(_elapsed) => {
                            shutdown.run_err = Some(SessionDriverError::BridgeDidNotFinish);
                            Err(())
                        }
                    }
                }
            },
            _ = sniffer => {
                shutdown.serena_init = Some(SessionDriverError::InitializationFailure(
                    "language server manager is not initialized".to_string(),
                ));
                Err(())
            }
            result = &mut drive_fut => match result {
                Ok(done) => Ok(done),
                Err(err) => {
                    shutdown.run_err = Some(err);
                    Err(())
                }
            },
        };

        shared.lock().session.close_questions();
        bridge.close();

        match tokio::time::timeout(self.config.acp_shutdown_grace, process.wait()).await {
            Ok(Ok(_status)) => {}
            Ok(Err(err)) => tracing::warn!(error = %err, "wait after shutdown failed"),
            Err(_elapsed) => {
                tracing::warn!("acp shutdown grace elapsed, forcing kill");
                if let Err(err) = process.kill().await {
                    shutdown.shutdown_err = Some(SessionDriverError::Spawn(err));
                }
            }
        }

        if let Some(err) = shutdown.primary() {
            return Err(err);
        }
        match race_result {
            Ok(done) => Ok(done),
            Err(()) => Err(SessionDriverError::Cancelled),
        }
    }

    async fn drive_protocol(
        &self,
        client: &AcpClient,
        shared: &Arc<Mutex<SharedState>>,
        request: &RunRequest,
    ) -> Result<DriveOutcome, SessionDriverError> {
        client.initialize().await?;

        for attempt in 1..=VERIFICATION_ATTEMPTS {
            let session = client.session_new(&request.repo_root).await?;
            {
                let mut state = shared.lock();
                state.session.session_id = Some(SessionId::new(session.session_id.clone()));
            }
            if let Some(mode) = find_yolo_mode(&session.modes) {
                client.session_set_mode(&session.session_id, &mode.id).await?;
            }

            self.run_prompt(
                client,
                shared,
                &session.session_id,
                &request.prompt,
                &request.on_progress,
                &request.task_id,
                true,
            )
            .await?;

            let verification_session = client.session_new(&request.repo_root).await?;
            if let Some(mode) = find_yolo_mode(&verification_session.modes) {
                client
                    .session_set_mode(&verification_session.session_id, &mode.id)
                    .await?;
            }

            let captured = self
                .run_prompt(
                    client,
                    shared,
                    &verification_session.session_id,
                    VERIFICATION_PROMPT,
                    &request.on_progress,
                    &request.task_id,
                    false,
                )
                .await?;

            let reply: String = captured
                .iter()
                .filter_map(|update| match update {
                    AgentUpdate::AgentMessageChunk { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n");

            if parse_verification_reply(&reply) == Verified::True {
                return Ok(self.finish(request, shared));
            }

            if attempt < VERIFICATION_ATTEMPTS {
                tracing::info!(attempt, "verification not confirmed, retrying full cycle");
            }
        }

        Err(SessionDriverError::VerificationNotConfirmed)
    }

    fn finish(&self, request: &RunRequest, shared: &Arc<Mutex<SharedState>>) -> DriveOutcome {
        if !matches!(request.mode, RunMode::Review) {
            return DriveOutcome::default();
        }
        let log = shared.lock().agent_message_log.join("\n");
        match parse_review_verdict(&log) {
            Some(verdict) => DriveOutcome {
                review_ready: verdict.pass,
                review_feedback: verdict.feedback,
            },
            None => DriveOutcome::default(),
        }
    }

    /// Begins capture, sends the prompt, waits for capture-idle, stops
    /// capture, optionally drains the
    /// question queue (main prompt only — the verification prompt has no
    /// `DRAIN_QUESTIONS` step in the state machine), then cancel the turn.
    #[allow(clippy::too_many_arguments)]
    async fn run_prompt(
        &self,
        client: &AcpClient,
        shared: &Arc<Mutex<SharedState>>,
        session_id: &str,
        text: &str,
        on_progress: &ProgressSink,
        task_id: &TaskId,
        drain_questions: bool,
    ) -> Result<Vec<AgentUpdate>, SessionDriverError> {
        shared.lock().begin_capture();

        let prompt_fut = client.session_prompt(session_id, text);
        tokio::pin!(prompt_fut);
        let prompt_started = tokio::time::Instant::now();
        let idle_delay = self.config.idle_delay;
        let poll_interval = Duration::from_millis(20).min(idle_delay.max(Duration::from_millis(1)));

        let prompt_error = loop {
            tokio::select! {
                biased;
                res = &mut prompt_fut => break res.err(),
                _ = tokio::time::sleep(poll_interval) => {
                    let idle = shared.lock().is_idle(prompt_started, idle_delay);
                    if idle {
                        break None;
                    }
                }
            }
        };

        let captured = shared.lock().stop_capture();

        if let Some(err) = prompt_error {
            return Err(err.into());
        }

        for update in &captured {
            on_progress(ProgressEvent {
                task_id: task_id.clone(),
                update: update.clone(),
            });
        }

        if drain_questions {
            let questions = shared.lock().session.drain_questions();
            for question in questions {
                let _ = client.session_prompt(session_id, &question).await;
            }
        }

        client.session_cancel(session_id).await?;

        Ok(captured)
    }

    fn build_result(
        request: &RunRequest,
        log_paths: &TaskLogPaths,
        started_at: String,
        finished_at: String,
        outcome: Result<DriveOutcome, SessionDriverError>,
    ) -> RunResult {
        let mut artifacts = BTreeMap::new();
        artifacts.insert("backend".to_string(), "opencode".to_string());
        if let Some(model) = &request.model {
            artifacts.insert("model".to_string(), model.clone());
        }
        artifacts.insert("mode".to_string(), mode_str(request.mode).to_string());
        artifacts.insert("started_at".to_string(), started_at.clone());
        artifacts.insert("finished_at".to_string(), finished_at.clone());
        artifacts.insert(
            "log_path".to_string(),
            log_paths.stdout_jsonl.display().to_string(),
        );

        let (status, reason, review_ready) = match outcome {
            Ok(done) => {
                artifacts.insert("status".to_string(), "completed".to_string());
                if matches!(request.mode, RunMode::Review) {
                    artifacts.insert(
                        "review_verdict".to_string(),
                        if done.review_ready { "pass" } else { "fail" }.to_string(),
                    );
                    if let Some(feedback) = &done.review_feedback {
                        artifacts.insert("review_fail_feedback".to_string(), feedback.clone());
                    }
                }
                (RunStatus::Completed, "completed".to_string(), done.review_ready)
            }
            Err(err) => {
                let status = if err.is_blocked() {
                    RunStatus::Blocked
                } else {
                    RunStatus::Failed
                };
                artifacts.insert("status".to_string(), status_str(status).to_string());
                if let SessionDriverError::Stall(stall) = &err {
                    artifacts.insert("stall_category".to_string(), stall.category.as_str().to_string());
                    if let Some(session_id) = &stall.session_id {
                        artifacts.insert("session_id".to_string(), session_id.as_str().to_string());
                    }
                    artifacts.insert(
                        "last_output_age".to_string(),
                        stall.last_output_age.as_secs().to_string(),
                    );
                    artifacts.insert(
                        "opencode_log".to_string(),
                        stall.runner_log_path.display().to_string(),
                    );
                    artifacts.insert(
                        "opencode_tail_path".to_string(),
                        stall.agent_log_path.display().to_string(),
                    );
                }
                let reason = err.to_string();
                artifacts.insert("reason".to_string(), reason.clone());
                (status, reason, false)
            }
        };

        RunResult {
            status,
            reason,
            started_at,
            finished_at,
            log_path: log_paths.stdout_jsonl.clone(),
            review_ready,
            artifacts,
        }
    }
}

fn mode_str(mode: RunMode) -> &'static str {
    match mode {
        RunMode::Implement => "implement",
        RunMode::Review => "review",
    }
}

fn status_str(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Completed => "completed",
        RunStatus::Blocked => "blocked",
        RunStatus::Failed => "failed",
    }
}

fn spawn_pipe_error(program: &str, pipe: &'static str) -> SessionDriverError {
    SessionDriverError::Spawn(SpawnError::Spawn {
        program: program.to_string(),
        source: std::io::Error::other(format!("{pipe} already taken")),
    })
}

/// What `drive_protocol` hands back on a confirmed-verified run.
#[derive(Debug, Default, Clone)]
struct DriveOutcome {
    review_ready: bool,
    review_feedback: Option<String>,
}

/// State shared between the driving coroutine (above) and the
/// [`DriverDispatcher`] handling inbound Bridge calls. Guarded by a
/// `parking_lot::Mutex` since both sides touch it from async contexts that
/// never hold the lock across an await point.
struct SharedState {
    aggregator: ChunkAggregator,
    session: SessionState,
    capturing: bool,
    saw_chunk: bool,
    last_chunk_at: Option<tokio::time::Instant>,
    capture_buffer: Vec<AgentUpdate>,
    tool_call_positions: HashMap<String, usize>,
    agent_message_log: Vec<String>,
}

impl SharedState {
    fn new() -> Self {
        Self {
            aggregator: ChunkAggregator::new(),
            session: SessionState::new(),
            capturing: false,
            saw_chunk: false,
            last_chunk_at: None,
            capture_buffer: Vec::new(),
            tool_call_positions: HashMap::new(),
            agent_message_log: Vec::new(),
        }
    }

    fn begin_capture(&mut self) {
        self.capturing = true;
        self.saw_chunk = false;
        self.last_chunk_at = None;
        self.capture_buffer.clear();
        self.tool_call_positions.clear();
    }

    fn stop_capture(&mut self) -> Vec<AgentUpdate> {
        self.capturing = false;
        std::mem::take(&mut self.capture_buffer)
    }

    fn is_idle(&self, prompt_started: tokio::time::Instant, idle_delay: Duration) -> bool {
        match self.last_chunk_at {
            Some(last) => self.saw_chunk && last.elapsed() >= idle_delay,
            None => prompt_started.elapsed() >= idle_delay,
        }
    }

    fn mark_chunk(&mut self) {
        self.saw_chunk = true;
        self.last_chunk_at = Some(tokio::time::Instant::now());
    }

    fn record_update(&mut self, update: AgentUpdate) {
        if let AgentUpdate::AgentMessageChunk { text } = &update {
            self.agent_message_log.push(text.clone());
        }
        if !self.capturing {
            return;
        }
        match &update {
            AgentUpdate::ToolCall { id, .. } | AgentUpdate::ToolCallUpdate { id, .. } => {
                if let Some(&pos) = self.tool_call_positions.get(id) {
                    self.capture_buffer[pos] = update;
                } else {
                    self.tool_call_positions.insert(id.clone(), self.capture_buffer.len());
                    self.capture_buffer.push(update);
                }
            }
            _ => self.capture_buffer.push(update),
        }
    }
}

fn parse_tool_status(raw: &str) -> ToolCallStatus {
    match raw {
        "in_progress" => ToolCallStatus::InProgress,
        "completed" => ToolCallStatus::Completed,
        "failed" => ToolCallStatus::Failed,
        _ => ToolCallStatus::Pending,
    }
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct WirePlanEntry {
    #[serde(default)]
    #[allow(dead_code)]
    content: String,
    #[serde(default)]
    #[allow(dead_code)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct SessionUpdateParams {
    #[serde(rename = "sessionId")]
    #[allow(dead_code)]
    session_id: String,
    update: SessionUpdateKind,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "sessionUpdate", rename_all = "snake_case")]
enum SessionUpdateKind {
    UserMessageChunk {
        content: ContentBlock,
    },
    AgentMessageChunk {
        content: ContentBlock,
    },
    AgentThoughtChunk {
        content: ContentBlock,
    },
    ToolCall {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        #[serde(default)]
        title: String,
        #[serde(default)]
        kind: String,
        #[serde(default)]
        status: String,
    },
    ToolCallUpdate {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        #[serde(default)]
        status: String,
    },
    Plan {
        #[serde(default)]
        entries: Vec<WirePlanEntry>,
    },
    AvailableCommandsUpdate {
        #[serde(default, rename = "availableCommands")]
        #[allow(dead_code)]
        available_commands: Vec<Value>,
    },
    CurrentModeUpdate {
        #[serde(rename = "currentModeId")]
        current_mode_id: String,
    },
}

/// Implements [`Dispatcher`] for the Bridge: forwards `session/update`
/// notifications into [`SharedState`], arbitrates
/// `session/request_permission`, and serves `fs/read_text_file` /
/// `fs/write_text_file` off the real filesystem.
struct DriverDispatcher {
    shared: Arc<Mutex<SharedState>>,
    task_id: String,
    permission_handler: Arc<dyn PermissionHandler>,
    audit_log_path: PathBuf,
}

impl DriverDispatcher {
    fn handle_permission(&self, params: Value) -> Result<Value, DispatchError> {
        let params: RequestPermissionParams = serde_json::from_value(params)
            .map_err(|err| DispatchError::Failed(format!("malformed request_permission params: {err}")))?;
        let arbitration = arbitrate(&params, self.permission_handler.as_ref(), &self.task_id);
        if let Some(question) = arbitration.enqueue_question.clone() {
            self.shared.lock().session.enqueue_question(question);
        }
        self.append_audit(&arbitration.audit);
        serde_json::to_value(&arbitration.outcome)
            .map_err(|err| DispatchError::Failed(format!("failed to encode permission outcome: {err}")))
    }

    fn append_audit(&self, record: &PermissionAuditRecord) {
        if let Err(err) = append_ndjson_line(&self.audit_log_path, record) {
            tracing::warn!(error = %err, path = %self.audit_log_path.display(), "failed to append ACP audit record");
        }
    }

    fn dispatch_update(&self, update: SessionUpdateKind) {
        let mut state = self.shared.lock();
        match update {
            SessionUpdateKind::UserMessageChunk { content } => {
                for line in state.aggregator.push_user_message_chunk(&content.text) {
                    state.mark_chunk();
                    state.record_update(line);
                }
            }
            SessionUpdateKind::AgentMessageChunk { content } => {
                for line in state.aggregator.push_agent_message_chunk(&content.text) {
                    state.mark_chunk();
                    state.record_update(line);
                }
            }
            SessionUpdateKind::AgentThoughtChunk { content } => {
                for line in state.aggregator.push_agent_thought_chunk(&content.text) {
                    state.mark_chunk();
                    state.record_update(line);
                }
            }
            SessionUpdateKind::ToolCall {
                tool_call_id,
                title,
                kind,
                status,
            } => {
                state.record_update(AgentUpdate::ToolCall {
                    id: tool_call_id,
                    title,
                    kind,
                    status: parse_tool_status(&status),
                });
            }
            SessionUpdateKind::ToolCallUpdate { tool_call_id, status } => {
                state.record_update(AgentUpdate::ToolCallUpdate {
                    id: tool_call_id,
                    status: parse_tool_status(&status),
                });
            }
            SessionUpdateKind::Plan { .. } => {}
            SessionUpdateKind::AvailableCommandsUpdate { .. } => {}
            SessionUpdateKind::CurrentModeUpdate { current_mode_id } => {
                state.session.mode_id = Some(current_mode_id);
            }
        }
    }

    async fn handle_fs_read(&self, params: Value) -> Result<Value, DispatchError> {
        #[derive(Deserialize)]
        struct Params {
            path: String,
        }
        let params: Params = serde_json::from_value(params)
            .map_err(|err| DispatchError::Failed(format!("malformed fs/read_text_file params: {err}")))?;
        let content = tokio::fs::read_to_string(&params.path)
            .await
            .map_err(|err| DispatchError::Failed(format!("failed to read {}: {err}", params.path)))?;
        Ok(json!({ "content": content }))
    }

    async fn handle_fs_write(&self, params: Value) -> Result<Value, DispatchError> {
        #[derive(Deserialize)]
        struct Params {
            path: String,
            content: String,
        }
        let params: Params = serde_json::from_value(params)
            .map_err(|err| DispatchError::Failed(format!("malformed fs/write_text_file params: {err}")))?;
        if let Some(parent) = Path::new(&params.path).parent() {
            let _ = tokio::fs::create_dir_all(parent).await;
        }
        tokio::fs::write(&params.path, params.content)
            .await
            .map_err(|err| DispatchError::Failed(format!("failed to write {}: {err}", params.path)))?;
        Ok(Value::Null)
    }
}

#[async_trait]
impl Dispatcher for DriverDispatcher {
    async fn handle_request(&self, method: &str, params: Value) -> Result<Value, DispatchError> {
        match method {
            METHOD_REQUEST_PERMISSION => self.handle_permission(params),
            METHOD_FS_READ_TEXT_FILE => self.handle_fs_read(params).await,
            METHOD_FS_WRITE_TEXT_FILE => self.handle_fs_write(params).await,
            other => Err(DispatchError::UnknownMethod(other.to_string())),
        }
    }

    async fn handle_notification(&self, method: &str, params: Value) {
        if method != METHOD_SESSION_UPDATE {
            return;
        }
        match serde_json::from_value::<SessionUpdateParams>(params) {
            Ok(parsed) => self.dispatch_update(parsed.update),
            Err(err) => tracing::warn!(error = %err, "malformed session/update notification, dropping"),
        }
    }
}

fn append_ndjson_line<T: Serialize>(path: &Path, value: &T) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let line = serde_json::to_string(value).map_err(std::io::Error::other)?;
    writeln!(file, "{line}")
}

/// Wraps the agent's stdout pipe, mirroring every byte read into the
/// per-task log file as it flows through to the Bridge's reader — the
/// stdout log is both the Watchdog's growth signal and the ACP audit log's
/// home file, but the spawner only gives us the stdout pipe, not a file.
struct TeeReader {
    inner: Box<dyn AsyncRead + Unpin + Send>,
    sink: std::fs::File,
}

impl TeeReader {
    fn new(path: &Path, inner: Box<dyn AsyncRead + Unpin + Send>) -> Result<Self, SessionDriverError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let sink = OpenOptions::new().create(true).write(true).truncate(true).open(path)?;
        Ok(Self { inner, sink })
    }
}

impl AsyncRead for TeeReader {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let poll = Pin::new(&mut this.inner).poll_read(cx, buf);
        if poll.is_ready() {
            let fresh = &buf.filled()[before..];
            if !fresh.is_empty() {
                if let Err(err) = this.sink.write_all(fresh) {
                    tracing::warn!(error = %err, "failed to tee agent stdout to log file");
                }
            }
        }
        poll
    }
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;
