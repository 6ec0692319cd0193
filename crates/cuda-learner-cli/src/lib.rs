//! Host-side driver behind the `cuda-learner` binary.
//!
//! The binary parses flags and sets up logging; everything after that lives
//! here so it can run against any executor and any writer.

use anyhow::{Context, Result};
use cuda_learner_core::{submit, BuildAndRun, LearnerConfig, Outcome, RemoteExecutor, SandboxConfig};
use std::sync::Arc;
use tokio::io::AsyncWrite;

/// Dispatch the build-and-run procedure and forward its output to `writer`.
///
/// A failed compile has already been printed and is returned as
/// `Ok(Outcome::CompileFailed)`; only executor and I/O faults are errors.
pub async fn run_learner<W>(
    executor: Arc<dyn RemoteExecutor>,
    config: &LearnerConfig,
    writer: &mut W,
) -> Result<Outcome>
where
    W: AsyncWrite + Unpin,
{
    let procedure = BuildAndRun::new(config.toolchain.clone());
    let handle = submit(executor, SandboxConfig::from(config), Arc::new(procedure));

    let outcome = handle
        .forward_to(writer)
        .await
        .context("Remote invocation failed")?;

    if let Outcome::CompileFailed { compilation } = &outcome {
        log::info!("Compiler exited with code {}", compilation.exit_code);
    }

    Ok(outcome)
}
