// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `runner` — drives the task graph / session driver / watchdog core
//! against a repository, reading ready work from the embedded issue
//! tracker and forwarding outcomes back to it.

mod bd;
mod init;
mod progress;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use runner_adapters::TracedSpawner;
use runner_core::{RunMode, SystemClock, TaskId};
use runner_engine::{
    event_log_path, AllowAllHandler, Coordinator, CoordinatorDeps, CoordinatorOptions,
    RunnerEventLog, SessionDriver, SessionDriverConfig,
};

const DEFAULT_WATCHDOG_TIMEOUT: Duration = Duration::from_secs(300);
const DEFAULT_WATCHDOG_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_WATCHDOG_TAIL_LINES: usize = 200;
const DEFAULT_IDLE_DELAY: Duration = Duration::from_millis(200);
const DEFAULT_ACP_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);
const DEFAULT_INIT_SNIFF_INTERVAL: Duration = Duration::from_secs(2);
const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Parser)]
#[command(name = "runner", version, about = "Autonomous task-execution runner for AI coding agents")]
struct Cli {
    /// Repository root the agent operates in.
    #[arg(long = "repo", global = true, default_value = ".")]
    repo: PathBuf,

    /// Root issue id whose ready descendants form this run's task graph.
    #[arg(long = "root", global = true)]
    root: Option<String>,

    /// Model passed through to the agent, absent any per-issue override.
    #[arg(long = "model", global = true)]
    model: Option<String>,

    /// Print the resolved task graph and exit without spawning any agent.
    #[arg(long = "dry-run", global = true)]
    dry_run: bool,

    /// Suppress task-id-free progress formatting (used when stdout isn't a
    /// terminal a human is reading interactively).
    #[arg(long = "headless", global = true)]
    headless: bool,

    /// Base directory written as `XDG_CONFIG_HOME` for the spawned agent.
    #[arg(long = "config-root", global = true)]
    config_root: Option<PathBuf>,

    /// Explicit override for the agent's own config directory.
    #[arg(long = "config-dir", global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Scaffold the `.opencode/agent/yolo.md` agent definition file.
    Init,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let repo_root = cli
        .repo
        .canonicalize()
        .with_context(|| format!("repo root {} does not exist", cli.repo.display()))?;

    if matches!(cli.command, Some(Command::Init)) {
        let (path, outcome) = init::scaffold(&repo_root)?;
        match outcome {
            init::InitOutcome::Created => println!("created {}", path.display()),
            init::InitOutcome::AlreadyPresent => println!("already present: {}", path.display()),
        }
        return Ok(());
    }

    let root_id = cli
        .root
        .context("--root is required to select the task graph's root issue")?;

    let (graph, issues) = bd::materialize_graph(&repo_root, &root_id)
        .await
        .context("failed to materialize task graph from the issue tracker")?;

    if cli.dry_run {
        print_plan(&graph);
        return Ok(());
    }

    let config_root = cli.config_root.unwrap_or_else(default_config_root);

    let driver_config = SessionDriverConfig {
        spawner: Arc::new(TracedSpawner::new(runner_adapters::TokioProcessSpawner)),
        agent_program: "opencode".to_string(),
        config_root,
        config_dir: cli.config_dir,
        clock: Arc::new(SystemClock),
        permission_handler: Arc::new(AllowAllHandler),
        watchdog_timeout: DEFAULT_WATCHDOG_TIMEOUT,
        watchdog_interval: DEFAULT_WATCHDOG_INTERVAL,
        watchdog_tail_lines: DEFAULT_WATCHDOG_TAIL_LINES,
        idle_delay: DEFAULT_IDLE_DELAY,
        acp_shutdown_grace: DEFAULT_ACP_SHUTDOWN_GRACE,
        init_sniff_interval: DEFAULT_INIT_SNIFF_INTERVAL,
    };
    let runner = Arc::new(SessionDriver::new(driver_config));

    let resolver = Arc::new(bd::BdTaskSpecResolver {
        root_dir: repo_root.clone(),
        model: cli.model,
        mode: RunMode::Implement,
        issues,
    });

    let outcome_hook: Arc<dyn runner_engine::TaskOutcomeHook> = Arc::new(bd::BdOutcomeHook {
        root_dir: repo_root.clone(),
    });

    let event_log = Arc::new(RunnerEventLog::new(event_log_path(&repo_root)));

    let coordinator = Coordinator::new(
        CoordinatorOptions {
            repo_root: repo_root.clone(),
            concurrency: DEFAULT_CONCURRENCY,
            max_consecutive_failures: None,
        },
        CoordinatorDeps {
            graph: Arc::new(graph),
            runner,
            resolver,
            on_progress: progress::stdout_sink(cli.headless),
            event_log,
            outcome_hook,
        },
    );

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received interrupt, draining in-flight tasks");
            ctrl_c_cancel.cancel();
        }
    });

    let outcome = coordinator.run_loop(cancel).await?;

    println!(
        "succeeded={} failed={} canceled={} graph_complete={}",
        outcome.succeeded.len(),
        outcome.failed.len(),
        outcome.canceled.len(),
        outcome.graph_complete
    );
    for id in &outcome.failed {
        let reason = outcome.reasons.get(id).map(String::as_str).unwrap_or("");
        println!("failed {id}: {reason}");
    }

    if !outcome.failed.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_plan(graph: &runner_core::TaskGraph) {
    println!("ready: {}", format_ids(&graph.ready_set()));
    println!("max_parallelism: {}", graph.max_parallelism());
}

fn format_ids(ids: &[TaskId]) -> String {
    ids.iter().map(TaskId::as_str).collect::<Vec<_>>().join(", ")
}

/// Falls back to `$XDG_CONFIG_HOME/yolo-runner` (or the platform
/// equivalent `dirs` resolves) when `--config-root` is not given, so
/// repeated runs in the same environment share one agent config directory
/// rather than re-provisioning it under the repo on every invocation.
fn default_config_root() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("yolo-runner")
}
