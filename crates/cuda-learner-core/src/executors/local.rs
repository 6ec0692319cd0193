// src/executors/local.rs
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::{Builder, TempDir};
use tokio::process::Command;
use tokio::sync::Mutex;

use super::{ProcessOutput, RemoteExecutor, Sandbox, SandboxConfig};
use crate::errors::ExecutorError;

/// Runs invocations on the host, one temporary directory per sandbox.
///
/// The host must already provide the toolchain. Accelerator requests cannot
/// be enforced here and are only logged.
#[derive(Debug, Default)]
pub struct LocalExecutor;

impl LocalExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RemoteExecutor for LocalExecutor {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn provision(&self, config: &SandboxConfig) -> Result<Box<dyn Sandbox>, ExecutorError> {
        let dir = Builder::new()
            .prefix(&format!("{}-", config.app_name))
            .tempdir()
            .map_err(|e| ExecutorError::Provision(format!("Could not create sandbox directory: {}", e)))?;

        if let Some(accelerator) = &config.accelerator {
            log::info!(
                "Local executor ignores accelerator request {} x{}; using host devices",
                accelerator.class,
                accelerator.count
            );
        }
        log::debug!("Provisioned local sandbox at {}", dir.path().display());

        Ok(Box::new(LocalSandbox::new(dir)))
    }
}

pub struct LocalSandbox {
    root: PathBuf,
    // Dropped on teardown, which deletes the directory.
    dir: Mutex<Option<TempDir>>,
}

impl LocalSandbox {
    fn new(dir: TempDir) -> Self {
        Self {
            root: dir.path().to_path_buf(),
            dir: Mutex::new(Some(dir)),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    // Programs named with a slash are sandbox files; bare names go through PATH.
    fn resolve_program(&self, program: &str) -> PathBuf {
        if program.contains('/') {
            self.resolve(program)
        } else {
            PathBuf::from(program)
        }
    }
}

#[async_trait]
impl Sandbox for LocalSandbox {
    async fn write_file(&self, path: &str, contents: &str) -> Result<(), ExecutorError> {
        let target = self.resolve(path);
        tokio::fs::write(&target, contents.as_bytes()).await?;
        Ok(())
    }

    async fn exec(&self, command: &[String]) -> Result<ProcessOutput, ExecutorError> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| ExecutorError::exec(command, "empty command"))?;

        let output = Command::new(self.resolve_program(program))
            .args(args)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .output()
            .await?;

        // Killed by a signal leaves no exit code.
        let exit_code = output.status.code().map(i64::from).unwrap_or(-1);

        Ok(ProcessOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn teardown(&self) {
        if let Some(dir) = self.dir.lock().await.take() {
            if let Err(e) = dir.close() {
                log::warn!("Failed to remove sandbox directory {}: {}", self.root.display(), e);
            }
        }
    }
}
