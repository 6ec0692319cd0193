//! Configuration loader for YAML files

use crate::config::types::LearnerConfig;
use crate::errors::ExecutorError;
use std::path::Path;
use tokio::fs;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a YAML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<LearnerConfig, ExecutorError> {
        let path = path.as_ref();

        let content = fs::read_to_string(path).await.map_err(|e| {
            ExecutorError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        log::debug!("Loaded configuration file {}", path.display());
        Self::from_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_str(content: &str) -> Result<LearnerConfig, ExecutorError> {
        // An empty document deserializes to unit, not to a mapping.
        let config: LearnerConfig = if content.trim().is_empty() {
            LearnerConfig::default()
        } else {
            serde_yaml::from_str(content)
                .map_err(|e| ExecutorError::Config(format!("Failed to parse YAML config: {}", e)))?
        };

        config.validate()?;

        Ok(config)
    }
}
