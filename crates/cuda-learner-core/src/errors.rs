//! Error types for sandbox provisioning and in-sandbox execution
//!
//! Only faults that abort an invocation live here. A compiler rejecting the
//! source is an ordinary outcome of the build step and is reported through
//! `Outcome::CompileFailed` instead.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Bollard (Docker client) error: {0}")]
    Bollard(#[from] bollard::errors::Error),
    #[error("I/O error inside sandbox: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image '{image}' is not available: {reason}")]
    ImageUnavailable { image: String, reason: String },
    #[error("Failed to provision sandbox: {0}")]
    Provision(String),
    #[error("Command {command:?} could not be executed: {reason}")]
    Exec { command: Vec<String>, reason: String },
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Remote dispatch failed: {0}")]
    Dispatch(String),
}

impl ExecutorError {
    pub fn exec(command: &[String], reason: impl Into<String>) -> Self {
        ExecutorError::Exec {
            command: command.to_vec(),
            reason: reason.into(),
        }
    }
}
