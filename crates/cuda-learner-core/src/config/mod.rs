//! Configuration for the sandbox, the toolchain and the executor backend
//!
//! Configuration is optional: the built-in defaults reproduce the stock
//! demonstration, and a YAML file only needs the keys it changes.

pub mod types;
pub mod loader;

pub use types::*;
pub use loader::*;


use crate::errors::ExecutorError;
use std::path::Path;

/// Load a configuration from a YAML file
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<LearnerConfig, ExecutorError> {
    ConfigLoader::from_file(path).await
}
