//! PipelineBlueprint - Config Loader output
//!
//! Describes a complete capture pipeline: measurement source, acquisition
//! parameters, processing configuration, exporter routing and worker limits.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{OperationMode, ProcessingMode, ReferenceType};

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete pipeline configuration blueprint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Where measurements come from
    pub source: SourceConfig,

    /// Capture parameters applied to the acquisition context
    #[serde(default)]
    pub acquisition: AcquisitionSettings,

    /// Processing mode and reference assignments
    #[serde(default)]
    pub processing: ProcessingSettings,

    /// Exporter routing
    #[serde(default)]
    pub exporters: Vec<ExporterConfig>,

    /// Worker queue limits
    #[serde(default)]
    pub worker: WorkerLimits,
}

/// Measurement source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SourceConfig {
    /// Replay a stored session as if it were a live camera
    Session {
        path: PathBuf,
        /// Restart from the first frame after the last one
        #[serde(default)]
        loop_playback: bool,
    },
    /// Synthetic camera, no hardware required
    Simulated {
        #[serde(default = "default_cube_width")]
        width: u32,
        #[serde(default = "default_cube_height")]
        height: u32,
        #[serde(default = "default_cube_channels")]
        channels: u32,
        /// First channel center wavelength, nanometres
        #[serde(default = "default_wavelength_start")]
        wavelength_start_nm: u32,
        /// Channel-to-channel wavelength spacing, nanometres
        #[serde(default = "default_wavelength_step")]
        wavelength_step_nm: u32,
        /// Simulated boot time before the camera reports Online
        #[serde(default)]
        warmup_ms: u64,
    },
}

fn default_cube_width() -> u32 {
    64
}

fn default_cube_height() -> u32 {
    64
}

fn default_cube_channels() -> u32 {
    32
}

fn default_wavelength_start() -> u32 {
    450
}

fn default_wavelength_step() -> u32 {
    8
}

/// Capture parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionSettings {
    /// Exposure per frame, milliseconds
    #[serde(default = "default_integration_time")]
    pub integration_time_ms: f64,

    /// Target frame rate in continuous mode
    #[serde(default = "default_fps")]
    pub fps: f64,

    /// Trigger source
    #[serde(default)]
    pub operation_mode: OperationMode,

    /// Sensor frames averaged per measurement
    #[serde(default = "default_average")]
    pub average: u32,

    /// Acquisition output queue capacity
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,

    /// Let the camera pick the exposure
    #[serde(default)]
    pub auto_exposure: bool,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            integration_time_ms: default_integration_time(),
            fps: default_fps(),
            operation_mode: OperationMode::default(),
            average: default_average(),
            queue_size: default_queue_size(),
            auto_exposure: false,
        }
    }
}

fn default_integration_time() -> f64 {
    100.0
}

fn default_fps() -> f64 {
    2.0
}

fn default_average() -> u32 {
    1
}

fn default_queue_size() -> usize {
    10
}

/// Processing configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingSettings {
    /// Target mode measurements are processed to
    #[serde(default)]
    pub mode: ProcessingMode,

    /// Allow on-the-fly recalibration during apply
    #[serde(default)]
    pub allow_recalib: bool,

    /// Object distance for distance adjustment, millimetres
    #[serde(default)]
    pub distance_mm: Option<f64>,

    /// Reference sessions loaded into the context before the run
    #[serde(default)]
    pub references: Vec<ReferenceEntry>,
}

/// One reference assignment: which correction a session supplies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceEntry {
    pub kind: ReferenceType,
    /// Session containing the reference measurement (first frame is used)
    pub path: PathBuf,
}

/// Exporter routing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Exporter name (used for logging/metrics)
    pub name: String,

    /// Exporter kind
    pub kind: ExporterKind,

    /// Output directory
    pub export_dir: PathBuf,

    /// Kind-specific parameters (e.g. tiff `format`, view `plugin`)
    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// Exporter kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExporterKind {
    /// ENVI header + band-sequential raw
    Envi,
    /// TIFF (single / multi-channel / multi-page)
    Tiff,
    /// Rendered RGB view image
    View,
    /// Session container (re-recordable)
    Cube,
}

/// Worker queue limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerLimits {
    /// Idle poll interval, milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Queue depth at which the caller is considered to be falling behind
    #[serde(default = "default_soft_limit")]
    pub soft_limit: usize,

    /// Queue depth past which results are dropped (when `can_drop`)
    #[serde(default = "default_hard_limit")]
    pub hard_limit: usize,

    /// Permit dropping oldest results past the hard limit
    #[serde(default = "default_can_drop")]
    pub can_drop: bool,
}

impl Default for WorkerLimits {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            soft_limit: default_soft_limit(),
            hard_limit: default_hard_limit(),
            can_drop: default_can_drop(),
        }
    }
}

fn default_poll_interval() -> u64 {
    10
}

fn default_soft_limit() -> usize {
    20
}

fn default_hard_limit() -> usize {
    100
}

fn default_can_drop() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_in() {
        let json = r#"{ "source": { "kind": "simulated" } }"#;
        let bp: PipelineBlueprint = serde_json::from_str(json).unwrap();

        assert_eq!(bp.acquisition.integration_time_ms, 100.0);
        assert_eq!(bp.acquisition.queue_size, 10);
        assert_eq!(bp.processing.mode, ProcessingMode::Raw);
        assert!(bp.exporters.is_empty());
        assert_eq!(bp.worker.hard_limit, 100);

        match bp.source {
            SourceConfig::Simulated { width, channels, .. } => {
                assert_eq!(width, 64);
                assert_eq!(channels, 32);
            }
            _ => panic!("expected simulated source"),
        }
    }

    #[test]
    fn session_source_parses() {
        let json = r#"{
            "source": { "kind": "session", "path": "/data/run1" },
            "processing": {
                "mode": "reflectance",
                "references": [
                    { "kind": "dark", "path": "/data/dark" },
                    { "kind": "white", "path": "/data/white" }
                ]
            }
        }"#;
        let bp: PipelineBlueprint = serde_json::from_str(json).unwrap();
        assert_eq!(bp.processing.mode, ProcessingMode::Reflectance);
        assert_eq!(bp.processing.references.len(), 2);
        assert_eq!(bp.processing.references[0].kind, ReferenceType::Dark);
    }
}
