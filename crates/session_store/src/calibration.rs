//! Calibration directory loading.
//!
//! A calibration describes the factory state of a camera: identity, cube
//! geometry and the per-channel wavelength table. Live acquisition and
//! processing contexts are bootstrapped from it when no session is at hand.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use contracts::{PipelineError, Result};

/// Calibration file name inside a calibration directory.
pub const CALIBRATION_FILE: &str = "calibration.json";

/// Factory calibration of a camera.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Calibration {
    /// Calibration identity (stamped onto processing contexts)
    pub id: String,
    pub serial_number: String,
    pub product_name: String,
    /// Cube geometry produced by this camera
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    /// Center wavelength per channel, nanometres
    pub wavelengths_nm: Vec<u32>,
}

impl Calibration {
    /// Load a calibration directory.
    ///
    /// # Errors
    /// [`PipelineError::CalibrationInvalid`] when the directory or file is
    /// missing, unparsable, or inconsistent.
    pub fn from_path(dir: impl AsRef<Path>) -> Result<Self> {
        let dir: PathBuf = dir.as_ref().to_path_buf();
        let file = dir.join(CALIBRATION_FILE);
        if !file.is_file() {
            return Err(PipelineError::calibration_invalid(
                &dir,
                format!("missing {CALIBRATION_FILE}"),
            ));
        }

        let content = fs::read_to_string(&file)
            .map_err(|e| PipelineError::calibration_invalid(&dir, e.to_string()))?;
        let calibration: Calibration = serde_json::from_str(&content)
            .map_err(|e| PipelineError::calibration_invalid(&dir, e.to_string()))?;

        if calibration.wavelengths_nm.len() != calibration.channels as usize {
            return Err(PipelineError::calibration_invalid(
                &dir,
                format!(
                    "wavelength table has {} entries for {} channels",
                    calibration.wavelengths_nm.len(),
                    calibration.channels
                ),
            ));
        }

        Ok(calibration)
    }

    /// Persist into a calibration directory (test and tooling helper).
    pub fn write_to(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| PipelineError::calibration_invalid(dir, e.to_string()))?;
        fs::write(dir.join(CALIBRATION_FILE), content)?;
        Ok(())
    }
}
