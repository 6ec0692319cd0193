//! Execution environments that host a single build-and-run invocation.
//!
//! A `RemoteExecutor` turns a `SandboxConfig` into a fresh `Sandbox`: an
//! isolated filesystem plus a way to run processes inside it. The Docker
//! executor provisions a container from the configured image with the
//! requested accelerator attached; the local executor uses a temporary
//! directory on the host and is what the test suite drives.

use async_trait::async_trait;

use crate::config::{AcceleratorConfig, ExecutorKind, LearnerConfig};
use crate::errors::ExecutorError;

pub mod docker;
pub mod local;

pub use docker::DockerExecutor;
pub use local::LocalExecutor;

/// Exit status and captured streams of one sandboxed subprocess
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// Environment a procedure is bound to: where it runs and on what hardware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxConfig {
    pub app_name: String,
    pub image: String,
    pub workdir: String,
    pub accelerator: Option<AcceleratorConfig>,
}

impl From<&LearnerConfig> for SandboxConfig {
    fn from(config: &LearnerConfig) -> Self {
        Self {
            app_name: config.app.name.clone(),
            image: config.image.reference.clone(),
            workdir: config.image.workdir.clone(),
            accelerator: config.accelerator.clone(),
        }
    }
}

/// An isolated filesystem and process space for one invocation.
///
/// Relative paths and commands resolve against the sandbox working directory.
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Write `contents` to `path`, truncating any existing file.
    async fn write_file(&self, path: &str, contents: &str) -> Result<(), ExecutorError>;

    /// Run `command` to completion and capture its output.
    ///
    /// A command that cannot be started is an error; a command that starts
    /// and exits non-zero is a normal `ProcessOutput`.
    async fn exec(&self, command: &[String]) -> Result<ProcessOutput, ExecutorError>;

    /// Release the sandbox. Must not fail the invocation.
    async fn teardown(&self);
}

#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn provision(&self, config: &SandboxConfig) -> Result<Box<dyn Sandbox>, ExecutorError>;
}

/// Build the executor backend selected in configuration
pub async fn create_executor(kind: ExecutorKind) -> Result<Box<dyn RemoteExecutor>, ExecutorError> {
    match kind {
        ExecutorKind::Docker => Ok(Box::new(DockerExecutor::new().await?)),
        ExecutorKind::Local => Ok(Box::new(LocalExecutor::new())),
    }
}
