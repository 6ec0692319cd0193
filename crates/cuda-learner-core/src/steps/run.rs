use crate::config::ToolchainConfig;
use crate::errors::ExecutorError;
use crate::executors::{ProcessOutput, Sandbox};

pub type ExecutionResult = ProcessOutput;

pub fn run_command(toolchain: &ToolchainConfig) -> Vec<String> {
    vec![format!("./{}", toolchain.output_binary)]
}

/// Execute the freshly built binary with no arguments.
pub async fn run(
    sandbox: &dyn Sandbox,
    toolchain: &ToolchainConfig,
) -> Result<ExecutionResult, ExecutorError> {
    let command = run_command(toolchain);
    let result = sandbox.exec(&command).await?;

    // Not gated on: a kernel that printed anything counts as a run.
    log::debug!("{} exited with code {}", command[0], result.exit_code);
    Ok(result)
}
