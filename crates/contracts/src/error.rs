//! Layered error definitions
//!
//! Categorized by source: session / processing / acquisition / export / config

use std::path::PathBuf;

use thiserror::Error;

use crate::{HardwareState, ProcessingMode, ReferenceType};

/// Unified error type
#[derive(Debug, Error)]
pub enum PipelineError {
    // ===== Session Errors =====
    /// Session container missing at the given path
    #[error("session not found: {}", path.display())]
    SessionNotFound { path: PathBuf },

    /// Session container exists but cannot be read
    #[error("session corrupt at '{}': {message}", path.display())]
    SessionCorrupt { path: PathBuf, message: String },

    /// Measurement index exceeds stored count
    #[error("measurement index {index} out of range (session holds {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// Calibration directory unreadable or inconsistent
    #[error("calibration invalid at '{}': {message}", path.display())]
    CalibrationInvalid { path: PathBuf, message: String },

    // ===== Processing Errors =====
    /// Apply was called while the context is not capable of the configured mode
    #[error("not capable of mode {mode:?}: missing references {missing:?}")]
    IncapableMode {
        mode: ProcessingMode,
        missing: Vec<ReferenceType>,
    },

    /// A required data plane is absent from the measurement
    #[error("measurement has no '{key}' data plane")]
    MissingPlane { key: String },

    /// Cube geometry does not line up (e.g. reference vs measurement)
    #[error("buffer geometry error: {message}")]
    BufferGeometry { message: String },

    // ===== Acquisition Errors =====
    /// Operation requires hardware that is not (fully) online
    #[error("camera not ready: hardware state {state:?}")]
    CameraNotReady { state: HardwareState },

    /// Synchronous capture did not complete within the wait
    #[error("capture timed out after {timeout_ms} ms")]
    CaptureTimeout { timeout_ms: u64 },

    // ===== Export Errors =====
    /// The measurement's current mode cannot be serialized by this exporter
    #[error("exporter '{exporter}' does not support mode {mode:?}")]
    UnsupportedMode {
        exporter: String,
        mode: ProcessingMode,
    },

    /// Write to the output path failed
    #[error("exporter '{exporter}' write error: {message}")]
    ExportWrite { exporter: String, message: String },

    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl PipelineError {
    /// Create session corrupt error
    pub fn session_corrupt(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::SessionCorrupt {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create calibration invalid error
    pub fn calibration_invalid(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::CalibrationInvalid {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create buffer geometry error
    pub fn buffer_geometry(message: impl Into<String>) -> Self {
        Self::BufferGeometry {
            message: message.into(),
        }
    }

    /// Create missing plane error
    pub fn missing_plane(key: impl Into<String>) -> Self {
        Self::MissingPlane { key: key.into() }
    }

    /// Create unsupported mode error
    pub fn unsupported_mode(exporter: impl Into<String>, mode: ProcessingMode) -> Self {
        Self::UnsupportedMode {
            exporter: exporter.into(),
            mode,
        }
    }

    /// Create export write error
    pub fn export_write(exporter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExportWrite {
            exporter: exporter.into(),
            message: message.into(),
        }
    }

    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Result alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
