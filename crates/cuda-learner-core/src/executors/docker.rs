// src/executors/docker.rs
use async_trait::async_trait;
use bollard::container::LogOutput; // For LogOutput::StdOut, LogOutput::StdErr
#[allow(deprecated)]
use bollard::exec::{StartExecOptions, StartExecResults};
use bollard::models::{ContainerCreateBody, DeviceRequest, ExecConfig, HostConfig};
use bollard::query_parameters::{
    CreateContainerOptions as BollardCreateContainerOptionsQuery,
    CreateImageOptions as BollardCreateImageOptionsQuery,
    RemoveContainerOptions as BollardRemoveContainerOptionsQuery,
    StartContainerOptions as BollardStartContainerOptionsQuery,
    StopContainerOptions as BollardStopContainerOptionsQuery,
    UploadToContainerOptionsBuilder,
};
use bollard::Docker;
use futures_util::stream::StreamExt;
use std::collections::HashMap;
use std::default::Default;
use std::path::Path;
use uuid::Uuid;

use super::{ProcessOutput, RemoteExecutor, Sandbox, SandboxConfig};
use crate::config::AcceleratorConfig;
use crate::errors::ExecutorError;

pub const ACCELERATOR_LABEL: &str = "cuda-learner.accelerator";

/// Provisions one container per invocation on a Docker daemon.
pub struct DockerExecutor {
    docker: Docker,
}

impl DockerExecutor {
    pub async fn new() -> Result<Self, ExecutorError> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self { docker })
    }

    pub async fn is_available(&self) -> bool {
        self.docker.ping().await.is_ok()
    }

    /// Pull `image` unless the daemon already has it
    async fn ensure_image(&self, image: &str) -> Result<(), ExecutorError> {
        match self.docker.inspect_image(image).await {
            Ok(_) => {
                log::debug!("Image {} already present", image);
                return Ok(());
            }
            Err(e) if is_not_found(&e) => {}
            Err(e) => return Err(e.into()),
        }

        log::info!("Pulling image {}", image);
        let options = Some(BollardCreateImageOptionsQuery {
            from_image: Some(image.to_string()),
            ..Default::default()
        });

        let mut pull_stream = self.docker.create_image(options, None, None);
        while let Some(result) = pull_stream.next().await {
            match result {
                Ok(info) => {
                    if let Some(status) = info.status {
                        log::debug!("Pulling {}: {}", image, status);
                    }
                }
                Err(e) => {
                    return Err(ExecutorError::ImageUnavailable {
                        image: image.to_string(),
                        reason: e.to_string(),
                    })
                }
            }
        }

        Ok(())
    }
}

fn is_not_found(err: &bollard::errors::Error) -> bool {
    matches!(
        err,
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            ..
        }
    )
}

/// Directory to extract into and the archive entry name for `path`.
/// Relative paths resolve against the container workdir.
fn upload_target(workdir: &str, path: &str) -> Option<(String, String)> {
    let target = Path::new(path);
    if !target.is_absolute() {
        return Some((workdir.to_string(), path.to_string()));
    }
    let name = target.file_name()?.to_string_lossy().into_owned();
    let dir = target.parent()?.to_string_lossy().into_owned();
    Some((dir, name))
}

/// Single-entry tar archive holding `contents` under `name`.
fn archive_file(name: &str, contents: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut tar_data = Vec::new();
    {
        let mut tar = tar::Builder::new(&mut tar_data);
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        tar.append_data(&mut header, name, contents)?;
        tar.finish()?;
    }
    Ok(tar_data)
}

fn device_requests(accelerator: Option<&AcceleratorConfig>) -> Option<Vec<DeviceRequest>> {
    accelerator.map(|accelerator| {
        vec![DeviceRequest {
            driver: Some("nvidia".to_string()),
            count: Some(i64::from(accelerator.count)),
            capabilities: Some(vec![vec!["gpu".to_string()]]),
            ..Default::default()
        }]
    })
}

fn container_body(config: &SandboxConfig) -> ContainerCreateBody {
    let mut labels = HashMap::new();
    if let Some(accelerator) = &config.accelerator {
        labels.insert(ACCELERATOR_LABEL.to_string(), accelerator.class.clone());
    }

    ContainerCreateBody {
        image: Some(config.image.clone()),
        // Keep the container alive between execs; init reaps and forwards SIGTERM.
        cmd: Some(vec!["sleep".to_string(), "infinity".to_string()]),
        working_dir: Some(config.workdir.clone()),
        labels: Some(labels),
        host_config: Some(HostConfig {
            init: Some(true),
            device_requests: device_requests(config.accelerator.as_ref()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[async_trait]
impl RemoteExecutor for DockerExecutor {
    fn name(&self) -> &'static str {
        "docker"
    }

    async fn provision(&self, config: &SandboxConfig) -> Result<Box<dyn Sandbox>, ExecutorError> {
        self.ensure_image(&config.image).await?;

        let options = Some(BollardCreateContainerOptionsQuery {
            name: Some(format!("{}-{}", config.app_name, Uuid::new_v4())),
            ..Default::default()
        });

        let container = self
            .docker
            .create_container(options, container_body(config))
            .await?;

        let sandbox = DockerSandbox {
            docker: self.docker.clone(),
            container_id: container.id,
            workdir: config.workdir.clone(),
        };

        if let Err(e) = self
            .docker
            .start_container(&sandbox.container_id, None::<BollardStartContainerOptionsQuery>)
            .await
        {
            sandbox.teardown().await;
            return Err(ExecutorError::Provision(format!(
                "Failed to start container from {}: {}",
                config.image, e
            )));
        }

        log::debug!("Started container {} from {}", sandbox.container_id, config.image);
        Ok(Box::new(sandbox))
    }
}

pub struct DockerSandbox {
    docker: Docker,
    container_id: String,
    workdir: String,
}

impl DockerSandbox {
    async fn run_exec(&self, command: &[String]) -> Result<ProcessOutput, ExecutorError> {
        if command.is_empty() {
            return Err(ExecutorError::exec(command, "empty command"));
        }

        let exec = self
            .docker
            .create_exec(
                &self.container_id,
                ExecConfig {
                    cmd: Some(command.to_vec()),
                    working_dir: Some(self.workdir.clone()),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    ..Default::default()
                },
            )
            .await?;

        let mut stdout = String::new();
        let mut stderr = String::new();
        match self
            .docker
            .start_exec(&exec.id, None::<StartExecOptions>)
            .await?
        {
            StartExecResults::Attached { mut output, .. } => {
                while let Some(log_result) = output.next().await {
                    match log_result? {
                        LogOutput::StdOut { message } => {
                            stdout.push_str(&String::from_utf8_lossy(&message))
                        }
                        LogOutput::StdErr { message } => {
                            stderr.push_str(&String::from_utf8_lossy(&message))
                        }
                        _ => {}
                    }
                }
            }
            StartExecResults::Detached => {
                return Err(ExecutorError::exec(command, "exec started detached"));
            }
        }

        // The output stream can close a moment before the daemon records the exit code.
        let exit_code = loop {
            let inspect = self.docker.inspect_exec(&exec.id).await?;
            if inspect.running != Some(true) {
                break inspect.exit_code;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        };

        let exit_code = exit_code.ok_or_else(|| ExecutorError::exec(command, "no exit code reported"))?;

        // The runtime answers 126/127 itself when the program cannot be started.
        if (exit_code == 126 || exit_code == 127) && is_runtime_exec_failure(&stdout, &stderr) {
            return Err(ExecutorError::exec(command, format!("{}{}", stdout, stderr).trim()));
        }

        Ok(ProcessOutput {
            exit_code,
            stdout,
            stderr,
        })
    }
}

fn is_runtime_exec_failure(stdout: &str, stderr: &str) -> bool {
    [stdout, stderr].iter().any(|stream| {
        stream.contains("OCI runtime exec failed") || stream.contains("executable file not found")
    })
}

#[async_trait]
impl Sandbox for DockerSandbox {
    async fn write_file(&self, path: &str, contents: &str) -> Result<(), ExecutorError> {
        let (dir, name) = upload_target(&self.workdir, path).ok_or_else(|| {
            ExecutorError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("Not a file path: {}", path),
            ))
        })?;

        // Extraction replaces an existing entry, so repeated writes keep one copy.
        let archive = archive_file(&name, contents.as_bytes())?;
        let options = UploadToContainerOptionsBuilder::default().path(&dir).build();
        self.docker
            .upload_to_container(
                &self.container_id,
                Some(options),
                bollard::body_full(archive.into()),
            )
            .await?;

        log::debug!("Wrote {} bytes to {}/{} in {}", contents.len(), dir, name, self.container_id);
        Ok(())
    }

    async fn exec(&self, command: &[String]) -> Result<ProcessOutput, ExecutorError> {
        self.run_exec(command).await
    }

    async fn teardown(&self) {
        if let Err(e) = self
            .docker
            .stop_container(&self.container_id, None::<BollardStopContainerOptionsQuery>)
            .await
        {
            log::warn!("Failed to stop container {}: {}", self.container_id, e);
        }
        if let Err(e) = self
            .docker
            .remove_container(&self.container_id, None::<BollardRemoveContainerOptionsQuery>)
            .await
        {
            log::warn!("Failed to remove container {}: {}", self.container_id, e);
        }
    }
}
