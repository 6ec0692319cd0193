//! Subprocess steps run inside the sandbox: compile, then execute.

pub mod build;
pub mod run;

pub use build::{build, compile_command, CompilationResult};
pub use run::{run, run_command, ExecutionResult};
