// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The process spawner boundary: turns a [`SpawnSpec`] into a running
//! subprocess with owned stdin/stdout pipes, while stderr is redirected
//! straight to a log file at the OS level.
//!
//! A small adapter type ([`TokioSpawnedProcess`]) holds the child and its
//! taken pipes so the Session Driver can guarantee all three (subprocess,
//! stdout, stderr) are released on every exit path, including stall kill,
//! cancellation, and spawn failure after partial resource acquisition.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("failed to open stderr log {path}: {source}")]
    StderrLog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to wait on process: {0}")]
    Wait(#[source] std::io::Error),

    #[error("failed to kill process: {0}")]
    Kill(#[source] std::io::Error),
}

/// Derives the stderr log path that sits alongside a per-task stdout log:
/// `<task>.jsonl` -> `<task>.stderr.log`.
pub fn stderr_log_path_for(stdout_log_path: &Path) -> PathBuf {
    let mut path = stdout_log_path.to_path_buf();
    path.set_extension("stderr.log");
    path
}

/// Everything needed to spawn the agent subprocess: argv, environment,
/// working directory, and where its stderr should be redirected.
#[derive(Debug, Clone)]
pub struct SpawnSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub cwd: PathBuf,
    /// Per-task stdout log path; stderr is derived from this via
    /// [`stderr_log_path_for`].
    pub stdout_log_path: PathBuf,
}

/// A running subprocess. Stdin/stdout are piped and handed to the caller
/// exactly once each; stderr was redirected to a file at spawn time and is
/// not exposed here.
#[async_trait]
pub trait SpawnedProcess: Send {
    /// Takes ownership of the stdin pipe. Returns `None` if already taken.
    fn take_stdin(&mut self) -> Option<Box<dyn AsyncWrite + Unpin + Send>>;

    /// Takes ownership of the stdout pipe. Returns `None` if already taken.
    fn take_stdout(&mut self) -> Option<Box<dyn AsyncRead + Unpin + Send>>;

    /// Blocks until the process exits naturally.
    async fn wait(&mut self) -> Result<ExitStatus, SpawnError>;

    /// Sends a termination signal and reaps the process. Implementation
    /// decides how aggressively to force the kill; callers that need a
    /// bounded wait should race this against a timeout themselves.
    async fn kill(&mut self) -> Result<(), SpawnError>;
}

/// Spawns the agent subprocess. Implemented for real use by
/// [`TokioProcessSpawner`]; [`FakeSpawner`] (test-support) stands in for
/// Driver and Coordinator tests.
#[async_trait]
pub trait ProcessSpawner: Send + Sync + 'static {
    async fn start(&self, spec: SpawnSpec) -> Result<Box<dyn SpawnedProcess>, SpawnError>;
}

/// Real spawner backed by `tokio::process::Command`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessSpawner;

#[async_trait]
impl ProcessSpawner for TokioProcessSpawner {
    async fn start(&self, spec: SpawnSpec) -> Result<Box<dyn SpawnedProcess>, SpawnError> {
        let stderr_path = stderr_log_path_for(&spec.stdout_log_path);
        if let Some(parent) = stderr_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| SpawnError::StderrLog {
                path: stderr_path.clone(),
                source,
            })?;
        }
        let stderr_file =
            std::fs::File::create(&stderr_path).map_err(|source| SpawnError::StderrLog {
                path: stderr_path,
                source,
            })?;

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .current_dir(&spec.cwd)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::from(stderr_file))
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| SpawnError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();

        Ok(Box::new(TokioSpawnedProcess {
            child,
            stdin,
            stdout,
        }))
    }
}

struct TokioSpawnedProcess {
    child: Child,
    stdin: Option<tokio::process::ChildStdin>,
    stdout: Option<tokio::process::ChildStdout>,
}

#[async_trait]
impl SpawnedProcess for TokioSpawnedProcess {
    fn take_stdin(&mut self) -> Option<Box<dyn AsyncWrite + Unpin + Send>> {
        self.stdin
            .take()
            .map(|s| Box::new(s) as Box<dyn AsyncWrite + Unpin + Send>)
    }

    fn take_stdout(&mut self) -> Option<Box<dyn AsyncRead + Unpin + Send>> {
        self.stdout
            .take()
            .map(|s| Box::new(s) as Box<dyn AsyncRead + Unpin + Send>)
    }

    async fn wait(&mut self) -> Result<ExitStatus, SpawnError> {
        self.child.wait().await.map_err(SpawnError::Wait)
    }

    async fn kill(&mut self) -> Result<(), SpawnError> {
        if self.child.id().is_none() {
            // Already reaped.
            return Ok(());
        }
        self.child.start_kill().map_err(SpawnError::Kill)?;
        let _ = self.child.wait().await;
        Ok(())
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeSpawnedProcess, FakeSpawner, SpawnCall};

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::os::unix::process::ExitStatusExt;
    use std::sync::Arc;
    use tokio::io::DuplexStream;

    /// Record of one call to [`FakeSpawner::start`].
    #[derive(Debug, Clone)]
    pub struct SpawnCall {
        pub spec: SpawnSpec,
    }

    /// Test double that hands back duplex-stream pipes instead of a real
    /// subprocess, so Session Driver tests can play the agent's side of
    /// the protocol without touching a subprocess.
    #[derive(Clone)]
    pub struct FakeSpawner {
        calls: Arc<Mutex<Vec<SpawnCall>>>,
        #[allow(clippy::type_complexity)]
        next: Arc<Mutex<Option<Box<dyn FnMut() -> FakeSpawnedProcess + Send>>>>,
    }

    impl Default for FakeSpawner {
        fn default() -> Self {
            Self::new()
        }
    }

    impl FakeSpawner {
        pub fn new() -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
                next: Arc::new(Mutex::new(None)),
            }
        }

        /// Installs a factory invoked on every `start` call to build the
        /// next [`FakeSpawnedProcess`] to hand back.
        pub fn on_start<F>(&self, factory: F)
        where
            F: FnMut() -> FakeSpawnedProcess + Send + 'static,
        {
            *self.next.lock() = Some(Box::new(factory));
        }

        pub fn calls(&self) -> Vec<SpawnCall> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl ProcessSpawner for FakeSpawner {
        async fn start(&self, spec: SpawnSpec) -> Result<Box<dyn SpawnedProcess>, SpawnError> {
            self.calls.lock().push(SpawnCall {
                spec: spec.clone(),
            });
            let mut guard = self.next.lock();
            match guard.as_mut() {
                Some(factory) => Ok(Box::new(factory())),
                None => Err(SpawnError::Spawn {
                    program: spec.program,
                    source: std::io::Error::other("FakeSpawner::start called with no factory installed"),
                }),
            }
        }
    }

    /// A fake running process backed by in-memory duplex streams.
    pub struct FakeSpawnedProcess {
        pub stdin: Option<DuplexStream>,
        pub stdout: Option<DuplexStream>,
        pub exit_status: ExitStatus,
        pub killed: Arc<Mutex<bool>>,
        waited: bool,
    }

    impl FakeSpawnedProcess {
        /// Builds a fake process, returning the handle and the "agent
        /// side" of both duplex pipes for the test to drive.
        pub fn new() -> (Self, DuplexStream, DuplexStream) {
            let (runner_stdin, agent_stdin) = tokio::io::duplex(64 * 1024);
            let (agent_stdout, runner_stdout) = tokio::io::duplex(64 * 1024);
            let process = Self {
                stdin: Some(runner_stdin),
                stdout: Some(runner_stdout),
                exit_status: ExitStatus::from_raw(0),
                killed: Arc::new(Mutex::new(false)),
                waited: false,
            };
            (process, agent_stdin, agent_stdout)
        }

        pub fn was_killed(&self) -> bool {
            *self.killed.lock()
        }
    }

    #[async_trait]
    impl SpawnedProcess for FakeSpawnedProcess {
        fn take_stdin(&mut self) -> Option<Box<dyn AsyncWrite + Unpin + Send>> {
            self.stdin
                .take()
                .map(|s| Box::new(s) as Box<dyn AsyncWrite + Unpin + Send>)
        }

        fn take_stdout(&mut self) -> Option<Box<dyn AsyncRead + Unpin + Send>> {
            self.stdout
                .take()
                .map(|s| Box::new(s) as Box<dyn AsyncRead + Unpin + Send>)
        }

        async fn wait(&mut self) -> Result<ExitStatus, SpawnError> {
            if !self.waited {
                self.waited = true;
                // A fake process never exits on its own unless the test
                // closes its stdin/stdout side; approximate with a long
                // pending wait so callers rely on cancellation/kill.
                std::future::pending::<()>().await;
            }
            Ok(self.exit_status)
        }

        async fn kill(&mut self) -> Result<(), SpawnError> {
            *self.killed.lock() = true;
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
