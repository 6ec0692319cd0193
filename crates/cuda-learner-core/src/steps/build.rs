use crate::config::ToolchainConfig;
use crate::errors::ExecutorError;
use crate::executors::{ProcessOutput, Sandbox};

/// Exit status and compiler output; the binary exists only when `succeeded()`.
pub type CompilationResult = ProcessOutput;

/// `[compiler, "-o", output, source]`
pub fn compile_command(toolchain: &ToolchainConfig) -> Vec<String> {
    vec![
        toolchain.compiler.clone(),
        "-o".to_string(),
        toolchain.output_binary.clone(),
        toolchain.source_path.clone(),
    ]
}

/// Compile the emitted source.
///
/// A non-zero compiler exit is returned as a result, not an error. A compiler
/// that cannot be started at all is an error.
pub async fn build(
    sandbox: &dyn Sandbox,
    toolchain: &ToolchainConfig,
) -> Result<CompilationResult, ExecutorError> {
    let command = compile_command(toolchain);
    log::debug!("Compiling with {:?}", command);

    let result = sandbox.exec(&command).await?;

    log::debug!("Compiler exited with code {}", result.exit_code);
    Ok(result)
}
