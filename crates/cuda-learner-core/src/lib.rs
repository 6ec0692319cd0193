//! Build and run a CUDA program inside an ephemeral GPU sandbox.
//!
//! One invocation provisions a sandbox from a CUDA `devel` image with an
//! accelerator attached, writes a fixed source file into it, compiles the file
//! with `nvcc`, runs the binary when compilation succeeded, and streams every
//! printed line back to the caller.
//!
//! # Architecture Overview
//!
//! - **Configuration**: YAML-backed settings whose defaults reproduce the stock demonstration
//! - **Executors**: Docker (via bollard) and local-host sandboxes behind one trait
//! - **Steps**: the source emitter, the build step and the run step
//! - **Procedure**: the linear emit/compile/run state machine
//! - **Dispatch**: binding a procedure to a sandbox configuration and awaiting it

pub mod config;
pub mod dispatch;
pub mod errors;
pub mod executors;
pub mod output;
pub mod procedure;
pub mod source;
pub mod steps;

pub use config::*;
pub use dispatch::{submit, RemoteHandle};
pub use errors::ExecutorError;
pub use executors::{create_executor, ProcessOutput, RemoteExecutor, Sandbox, SandboxConfig};
pub use output::OutputSink;
pub use procedure::{BuildAndRun, Outcome, RemoteProcedure, Stage};
pub use source::CUDA_HELLO_SOURCE;
