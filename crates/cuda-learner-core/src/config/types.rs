//! Configuration type definitions
//!
//! Every field has a default, so an empty YAML document (or no file at all)
//! describes the stock demonstration: the CUDA 12.4 devel image on a single
//! T4, compiling `hello.cu` with `nvcc`.

use serde::{Deserialize, Serialize};

use crate::errors::ExecutorError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerConfig {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub image: ImageConfig,
    /// `accelerator: null` runs without a GPU
    #[serde(default = "default_accelerator")]
    pub accelerator: Option<AcceleratorConfig>,
    #[serde(default)]
    pub toolchain: ToolchainConfig,
    #[serde(default)]
    pub executor: ExecutorKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_name")]
    pub name: String,
}

/// Container image the sandbox is created from.
///
/// A `devel` CUDA tag is required; `runtime` images ship without `nvcc`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    #[serde(default = "default_image_reference")]
    pub reference: String,
    #[serde(default = "default_workdir")]
    pub workdir: String,
}

/// Hardware tier requested for one invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceleratorConfig {
    #[serde(default = "default_accelerator_class")]
    pub class: String,
    #[serde(default = "default_accelerator_count")]
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolchainConfig {
    #[serde(default = "default_compiler")]
    pub compiler: String,
    #[serde(default = "default_source_path")]
    pub source_path: String,
    #[serde(default = "default_output_binary")]
    pub output_binary: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorKind {
    #[default]
    Docker,
    Local,
}

impl std::str::FromStr for ExecutorKind {
    type Err = ExecutorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "docker" => Ok(ExecutorKind::Docker),
            "local" => Ok(ExecutorKind::Local),
            other => Err(ExecutorError::Config(format!(
                "Unknown executor '{}', expected 'docker' or 'local'",
                other
            ))),
        }
    }
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            app: AppConfig::default(),
            image: ImageConfig::default(),
            accelerator: default_accelerator(),
            toolchain: ToolchainConfig::default(),
            executor: ExecutorKind::default(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            reference: default_image_reference(),
            workdir: default_workdir(),
        }
    }
}

impl Default for AcceleratorConfig {
    fn default() -> Self {
        Self {
            class: default_accelerator_class(),
            count: default_accelerator_count(),
        }
    }
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            compiler: default_compiler(),
            source_path: default_source_path(),
            output_binary: default_output_binary(),
        }
    }
}

fn default_app_name() -> String {
    "cuda-learner".to_string()
}

fn default_image_reference() -> String {
    "nvidia/cuda:12.4.0-devel-ubuntu22.04".to_string()
}

fn default_workdir() -> String {
    "/workspace".to_string()
}

fn default_accelerator() -> Option<AcceleratorConfig> {
    Some(AcceleratorConfig::default())
}

fn default_accelerator_class() -> String {
    "T4".to_string()
}

fn default_accelerator_count() -> u32 { 1 }

fn default_compiler() -> String {
    "nvcc".to_string()
}

fn default_source_path() -> String {
    "hello.cu".to_string()
}

fn default_output_binary() -> String {
    "hello".to_string()
}

impl LearnerConfig {
    pub fn validate(&self) -> Result<(), ExecutorError> {
        if self.app.name.is_empty() {
            return Err(ExecutorError::Config("App name cannot be empty".to_string()));
        }

        if self.image.reference.trim().is_empty() {
            return Err(ExecutorError::Config("Image reference cannot be empty".to_string()));
        }

        if self.image.workdir.is_empty() {
            return Err(ExecutorError::Config("Image workdir cannot be empty".to_string()));
        }

        if let Some(accelerator) = &self.accelerator {
            if accelerator.class.is_empty() {
                return Err(ExecutorError::Config("Accelerator class cannot be empty".to_string()));
            }
            if accelerator.count == 0 {
                return Err(ExecutorError::Config(
                    "Accelerator count must be greater than 0".to_string(),
                ));
            }
        }

        if self.toolchain.compiler.is_empty() {
            return Err(ExecutorError::Config("Compiler cannot be empty".to_string()));
        }

        if self.toolchain.source_path.is_empty() || self.toolchain.output_binary.is_empty() {
            return Err(ExecutorError::Config(
                "Toolchain source_path and output_binary cannot be empty".to_string(),
            ));
        }

        // The run step invokes `./<output_binary>`, which only resolves for a bare name.
        if self.toolchain.output_binary.contains('/') {
            return Err(ExecutorError::Config(format!(
                "Output binary '{}' must be a file name, not a path",
                self.toolchain.output_binary
            )));
        }

        Ok(())
    }
}
