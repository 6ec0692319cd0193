//! Remote dispatch: bind a procedure to a sandbox configuration and run it.
//!
//! `submit` provisions a fresh sandbox, runs the procedure inside it and tears
//! the sandbox down again. There are no retries and no timeout: the returned
//! handle resolves once the single remote call has finished, however long
//! that takes.

use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::errors::ExecutorError;
use crate::executors::{RemoteExecutor, SandboxConfig};
use crate::output::OutputSink;
use crate::procedure::{Outcome, RemoteProcedure};

/// In-flight remote invocation
pub struct RemoteHandle {
    output: mpsc::UnboundedReceiver<String>,
    task: JoinHandle<Result<Outcome, ExecutorError>>,
}

impl RemoteHandle {
    /// Next printed message, or `None` once the procedure has finished printing.
    pub async fn next_output(&mut self) -> Option<String> {
        self.output.recv().await
    }

    /// Block until the invocation finishes. Unread output is discarded.
    pub async fn wait(self) -> Result<Outcome, ExecutorError> {
        self.task
            .await
            .map_err(|e| ExecutorError::Dispatch(e.to_string()))?
    }

    /// Copy every printed message to `writer`, one per line, then wait.
    pub async fn forward_to<W>(mut self, writer: &mut W) -> Result<Outcome, ExecutorError>
    where
        W: AsyncWrite + Unpin,
    {
        while let Some(message) = self.next_output().await {
            writer.write_all(message.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
        self.wait().await
    }
}

/// Run `procedure` in a sandbox described by `config`.
pub fn submit(
    executor: Arc<dyn RemoteExecutor>,
    config: SandboxConfig,
    procedure: Arc<dyn RemoteProcedure>,
) -> RemoteHandle {
    let (sink, output) = OutputSink::channel();

    let task = tokio::spawn(async move {
        log::info!(
            "Dispatching {} to {} executor (image {}, accelerator {})",
            procedure.name(),
            executor.name(),
            config.image,
            config
                .accelerator
                .as_ref()
                .map(|a| format!("{} x{}", a.class, a.count))
                .unwrap_or_else(|| "none".to_string())
        );

        let sandbox = executor.provision(&config).await?;
        // Teardown runs even when the procedure panics.
        let result = AssertUnwindSafe(procedure.call(sandbox.as_ref(), &sink))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(ExecutorError::Dispatch(format!(
                    "{} panicked: {}",
                    procedure.name(),
                    panic_message(panic.as_ref())
                )))
            });
        sandbox.teardown().await;

        match &result {
            Ok(Outcome::Completed { .. }) => log::info!("{} completed", procedure.name()),
            Ok(Outcome::CompileFailed { .. }) => {
                log::info!("{} finished without running: compilation failed", procedure.name())
            }
            Err(e) => log::error!("{} aborted: {}", procedure.name(), e),
        }
        result
    });

    RemoteHandle { output, task }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executors::{ProcessOutput, Sandbox};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct RecordingSandbox {
        torn_down: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Sandbox for RecordingSandbox {
        async fn write_file(&self, _path: &str, _contents: &str) -> Result<(), ExecutorError> {
            Ok(())
        }

        async fn exec(&self, _command: &[String]) -> Result<ProcessOutput, ExecutorError> {
            Ok(ProcessOutput::default())
        }

        async fn teardown(&self) {
            self.torn_down.store(true, Ordering::SeqCst);
        }
    }

    struct RecordingExecutor {
        provisioned: AtomicUsize,
        torn_down: Arc<AtomicBool>,
        fail: bool,
    }

    #[async_trait]
    impl RemoteExecutor for RecordingExecutor {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn provision(&self, _config: &SandboxConfig) -> Result<Box<dyn Sandbox>, ExecutorError> {
            self.provisioned.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ExecutorError::Provision("daemon unreachable".to_string()));
            }
            Ok(Box::new(RecordingSandbox {
                torn_down: self.torn_down.clone(),
            }))
        }
    }

    struct Greeting;

    #[async_trait]
    impl RemoteProcedure for Greeting {
        fn name(&self) -> &str {
            "greeting"
        }

        async fn call(&self, sandbox: &dyn Sandbox, out: &OutputSink) -> Result<Outcome, ExecutorError> {
            out.print("first");
            out.print("second");
            let compilation = sandbox.exec(&["true".to_string()]).await?;
            Ok(Outcome::Completed {
                compilation,
                execution: ProcessOutput::default(),
            })
        }
    }

    struct Panicking;

    #[async_trait]
    impl RemoteProcedure for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn call(&self, _sandbox: &dyn Sandbox, out: &OutputSink) -> Result<Outcome, ExecutorError> {
            out.print("before");
            panic!("procedure bug");
        }
    }

    fn executor(fail: bool) -> Arc<RecordingExecutor> {
        Arc::new(RecordingExecutor {
            provisioned: AtomicUsize::new(0),
            torn_down: Arc::new(AtomicBool::new(false)),
            fail,
        })
    }

    fn sandbox_config() -> SandboxConfig {
        SandboxConfig {
            app_name: "dispatch-test".to_string(),
            image: "nvidia/cuda:12.4.0-devel-ubuntu22.04".to_string(),
            workdir: "/workspace".to_string(),
            accelerator: None,
        }
    }

    #[tokio::test]
    async fn test_forwards_output_in_order_and_tears_down() {
        let executor = executor(false);
        let handle = submit(executor.clone(), sandbox_config(), Arc::new(Greeting));

        let mut forwarded = Vec::new();
        let outcome = handle.forward_to(&mut forwarded).await.unwrap();

        assert!(matches!(outcome, Outcome::Completed { .. }));
        assert_eq!(String::from_utf8(forwarded).unwrap(), "first\nsecond\n");
        assert_eq!(executor.provisioned.load(Ordering::SeqCst), 1);
        assert!(executor.torn_down.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_provision_failure_propagates() {
        let executor = executor(true);
        let handle = submit(executor.clone(), sandbox_config(), Arc::new(Greeting));

        let result = handle.wait().await;
        assert!(matches!(result, Err(ExecutorError::Provision(_))));
        assert!(!executor.torn_down.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_panicking_procedure_still_tears_down() {
        let executor = executor(false);
        let handle = submit(executor.clone(), sandbox_config(), Arc::new(Panicking));

        let mut forwarded = Vec::new();
        let result = handle.forward_to(&mut forwarded).await;

        match result {
            Err(ExecutorError::Dispatch(message)) => {
                assert_eq!(message, "panicking panicked: procedure bug")
            }
            other => panic!("expected a dispatch error, got {:?}", other.map(|_| ())),
        }
        assert_eq!(String::from_utf8(forwarded).unwrap(), "before\n");
        assert!(executor.torn_down.load(Ordering::SeqCst));
    }
}
