// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! runner-adapters: the boundary between the runner core and the outside
//! world — spawning the agent subprocess, shaping its environment and
//! on-disk config, and a tracing decorator around the spawner.

pub mod env;
pub mod subprocess;
pub mod traced;

pub use env::{agent_argv, build_agent_env, permission_policy_json, AgentEnv};
pub use subprocess::{
    stderr_log_path_for, ProcessSpawner, SpawnError, SpawnSpec, SpawnedProcess,
    TokioProcessSpawner,
};
pub use traced::TracedSpawner;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use subprocess::{FakeSpawnedProcess, FakeSpawner, SpawnCall};
