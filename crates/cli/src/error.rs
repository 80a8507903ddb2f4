//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[allow(dead_code)]
#[derive(Error, Debug)]
pub enum CliError {
    /// Blueprint file not found
    #[error("Blueprint file not found: {path}")]
    ConfigNotFound { path: String },

    /// Blueprint parsing error
    #[error("Failed to parse blueprint: {message}")]
    ConfigParse { message: String },

    /// Blueprint validation error
    #[error("Blueprint validation failed: {message}")]
    ConfigValidation { message: String },

    /// Session could not be opened
    #[error("Failed to open session at {path}: {message}")]
    SessionOpen { path: String, message: String },

    /// Camera never reached the online state
    #[error("Camera did not come online within {waited_secs}s")]
    CameraOffline { waited_secs: u64 },

    /// Pipeline execution error
    #[error("Pipeline execution failed: {message}")]
    PipelineExecution { message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error wrapper
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

#[allow(dead_code)]
impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn session_open(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SessionOpen {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn pipeline_execution(message: impl Into<String>) -> Self {
        Self::PipelineExecution {
            message: message.into(),
        }
    }
}

/// Result type alias for CLI operations
#[allow(dead_code)]
pub type Result<T> = std::result::Result<T, CliError>;
