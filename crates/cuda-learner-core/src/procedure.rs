//! The procedure executed inside a provisioned sandbox.
//!
//! `BuildAndRun` walks a linear state machine:
//!
//! ```text
//! START -> EMIT_SOURCE -> COMPILE -> RUN -> DONE
//!                                 \-> REPORT_ERROR -> DONE
//! ```
//!
//! Its printed output goes through an `OutputSink` so the local caller sees it
//! while the invocation is still in flight.

use async_trait::async_trait;
use std::fmt;

use crate::config::ToolchainConfig;
use crate::errors::ExecutorError;
use crate::executors::Sandbox;
use crate::output::OutputSink;
use crate::source::{emit_source, CUDA_HELLO_SOURCE};
use crate::steps::{build, run, CompilationResult, ExecutionResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    EmitSource,
    Compile,
    Run,
    ReportError,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Start => "START",
            Stage::EmitSource => "EMIT_SOURCE",
            Stage::Compile => "COMPILE",
            Stage::Run => "RUN",
            Stage::ReportError => "REPORT_ERROR",
            Stage::Done => "DONE",
        };
        f.write_str(name)
    }
}

/// How an invocation ended when nothing went wrong at the I/O level
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed {
        compilation: CompilationResult,
        execution: ExecutionResult,
    },
    CompileFailed {
        compilation: CompilationResult,
    },
}

impl Outcome {
    pub fn compilation(&self) -> &CompilationResult {
        match self {
            Outcome::Completed { compilation, .. } | Outcome::CompileFailed { compilation } => {
                compilation
            }
        }
    }

    pub fn execution(&self) -> Option<&ExecutionResult> {
        match self {
            Outcome::Completed { execution, .. } => Some(execution),
            Outcome::CompileFailed { .. } => None,
        }
    }
}

/// Work that runs inside a sandbox on behalf of a remote dispatch
#[async_trait]
pub trait RemoteProcedure: Send + Sync {
    fn name(&self) -> &str;

    async fn call(&self, sandbox: &dyn Sandbox, out: &OutputSink) -> Result<Outcome, ExecutorError>;
}

/// Emit the source, compile it and, if that worked, run the binary.
#[derive(Debug, Clone)]
pub struct BuildAndRun {
    toolchain: ToolchainConfig,
    source: String,
}

impl BuildAndRun {
    pub fn new(toolchain: ToolchainConfig) -> Self {
        Self::with_source(toolchain, CUDA_HELLO_SOURCE)
    }

    pub fn with_source(toolchain: ToolchainConfig, source: impl Into<String>) -> Self {
        Self {
            toolchain,
            source: source.into(),
        }
    }
}

fn enter(stage: &mut Stage, next: Stage) {
    log::debug!("{} -> {}", stage, next);
    *stage = next;
}

#[async_trait]
impl RemoteProcedure for BuildAndRun {
    fn name(&self) -> &str {
        "run_cuda_script"
    }

    async fn call(&self, sandbox: &dyn Sandbox, out: &OutputSink) -> Result<Outcome, ExecutorError> {
        let mut stage = Stage::Start;

        enter(&mut stage, Stage::EmitSource);
        emit_source(sandbox, &self.toolchain.source_path, &self.source).await?;

        enter(&mut stage, Stage::Compile);
        out.print("--- Compiling ---");
        let compilation = build(sandbox, &self.toolchain).await?;

        if !compilation.succeeded() {
            enter(&mut stage, Stage::ReportError);
            log::warn!(
                "Compilation of {} failed with exit code {}",
                self.toolchain.source_path,
                compilation.exit_code
            );
            out.print("Compilation Failed:");
            out.print(compilation.stderr.clone());
            enter(&mut stage, Stage::Done);
            return Ok(Outcome::CompileFailed { compilation });
        }

        enter(&mut stage, Stage::Run);
        out.print("--- Running ---");
        let execution = run(sandbox, &self.toolchain).await?;

        out.print(execution.stdout.clone());
        if !execution.stderr.is_empty() {
            out.print(format!("Errors: {}", execution.stderr));
        }

        enter(&mut stage, Stage::Done);
        Ok(Outcome::Completed {
            compilation,
            execution,
        })
    }
}
