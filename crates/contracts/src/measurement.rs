//! Measurement - a capture record with named data planes and metadata.
//!
//! Mutated in place by the processing context; released by dropping (or
//! `clear_cube` for eager release of the large cube plane inside loops).

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ImageBuffer, ProcessingMode};

/// Key of the primary spectral cube data plane.
pub const CUBE_PLANE: &str = "cube";

/// Key of the decimated preview plane.
pub const VIEW_PLANE: &str = "view";

/// Key of the pristine raw cube retained across re-processing.
pub const RAW_PLANE: &str = "raw";

/// Quality flag bits stamped onto a measurement by processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeasurementFlags(u32);

impl MeasurementFlags {
    pub const POOR_REFERENCE: u32 = 1 << 0;
    pub const OVERILLUMINATED: u32 = 1 << 1;
    pub const POOR_WHITE_BALANCING: u32 = 1 << 2;
    pub const DARK_INTTIME: u32 = 1 << 3;
    pub const DARK_TEMP: u32 = 1 << 4;
    pub const WHITE_INTTIME: u32 = 1 << 5;
    pub const WHITE_TEMP: u32 = 1 << 6;
    pub const WHITEDARK_INTTIME: u32 = 1 << 7;
    pub const WHITEDARK_TEMP: u32 = 1 << 8;

    const NAMES: [(u32, &'static str); 9] = [
        (Self::POOR_REFERENCE, "POOR_REFERENCE"),
        (Self::OVERILLUMINATED, "OVERILLUMINATED"),
        (Self::POOR_WHITE_BALANCING, "POOR_WHITE_BALANCING"),
        (Self::DARK_INTTIME, "DARK_INTTIME"),
        (Self::DARK_TEMP, "DARK_TEMP"),
        (Self::WHITE_INTTIME, "WHITE_INTTIME"),
        (Self::WHITE_TEMP, "WHITE_TEMP"),
        (Self::WHITEDARK_INTTIME, "WHITEDARK_INTTIME"),
        (Self::WHITEDARK_TEMP, "WHITEDARK_TEMP"),
    ];

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn contains(&self, flag: u32) -> bool {
        self.0 & flag != 0
    }

    pub fn insert(&mut self, flag: u32) {
        self.0 |= flag;
    }

    pub fn remove(&mut self, flag: u32) {
        self.0 &= !flag;
    }

    /// Human-readable names of all set flags.
    pub fn names(&self) -> Vec<&'static str> {
        Self::NAMES
            .iter()
            .filter(|(bit, _)| self.0 & bit != 0)
            .map(|(_, name)| *name)
            .collect()
    }
}

/// GPS fix attached to a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsData {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

/// Low-level sensor readout info attached to a measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorInfo {
    pub readout_time_ms: u64,
    pub temperature_c: f64,
    pub gain: f64,
}

/// Identification of the session a measurement belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionInfo {
    pub name: String,
    pub session_no: u32,
    pub sequence_no: u32,
}

/// One value in the measurement's data-plane map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataValue {
    Image(ImageBuffer),
    Text(String),
    Gps(GpsData),
    SensorInfo(SensorInfo),
}

/// Capture metadata carried by every measurement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementMetadata {
    pub name: String,
    #[serde(default)]
    pub comment: String,
    pub capture_time: DateTime<Utc>,
    /// Exposure per frame, milliseconds
    pub integration_time_ms: f64,
    /// Number of sensor frames averaged into this measurement
    #[serde(default = "default_averages")]
    pub averages: u32,
    #[serde(default)]
    pub serial_number: String,
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub assembly: String,
    /// Origin file, if loaded from a session
    #[serde(default)]
    pub path: Option<PathBuf>,
    pub processing_mode: ProcessingMode,
    #[serde(default)]
    pub flags: MeasurementFlags,
    /// Object distance used for distance adjustment, millimetres
    #[serde(default)]
    pub distance_mm: Option<f64>,
    #[serde(default)]
    pub session: SessionInfo,
}

fn default_averages() -> u32 {
    1
}

impl MeasurementMetadata {
    /// Metadata for a freshly captured raw measurement.
    pub fn new(name: impl Into<String>, integration_time_ms: f64) -> Self {
        Self {
            name: name.into(),
            comment: String::new(),
            capture_time: Utc::now(),
            integration_time_ms,
            averages: 1,
            serial_number: String::new(),
            product_name: String::new(),
            assembly: String::new(),
            path: None,
            processing_mode: ProcessingMode::Raw,
            flags: MeasurementFlags::empty(),
            distance_mm: None,
            session: SessionInfo::default(),
        }
    }
}

/// A capture record: metadata plus named data planes.
#[derive(Debug, Clone)]
pub struct Measurement {
    pub metadata: MeasurementMetadata,
    data: HashMap<String, DataValue>,
}

impl Measurement {
    pub fn new(metadata: MeasurementMetadata) -> Self {
        Self {
            metadata,
            data: HashMap::new(),
        }
    }

    /// Convenience constructor with the cube plane populated.
    pub fn with_cube(metadata: MeasurementMetadata, cube: ImageBuffer) -> Self {
        let mut m = Self::new(metadata);
        m.set_cube(cube);
        m
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.metadata.name = name.into();
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.metadata.comment = comment.into();
    }

    pub fn processing_mode(&self) -> ProcessingMode {
        self.metadata.processing_mode
    }

    /// The primary spectral cube, if present.
    pub fn cube(&self) -> Option<&ImageBuffer> {
        match self.data.get(CUBE_PLANE) {
            Some(DataValue::Image(buf)) => Some(buf),
            _ => None,
        }
    }

    pub fn cube_mut(&mut self) -> Option<&mut ImageBuffer> {
        match self.data.get_mut(CUBE_PLANE) {
            Some(DataValue::Image(buf)) => Some(buf),
            _ => None,
        }
    }

    pub fn set_cube(&mut self, cube: ImageBuffer) {
        self.data.insert(CUBE_PLANE.to_string(), DataValue::Image(cube));
    }

    /// Release the cube plane.
    ///
    /// Acquisition loops call this once a measurement has been exported to
    /// bound memory growth; metadata and auxiliary planes are kept.
    pub fn clear_cube(&mut self) {
        self.data.remove(CUBE_PLANE);
    }

    pub fn insert_data(&mut self, key: impl Into<String>, value: DataValue) {
        self.data.insert(key.into(), value);
    }

    pub fn remove_data(&mut self, key: &str) -> Option<DataValue> {
        self.data.remove(key)
    }

    pub fn data(&self, key: &str) -> Option<&DataValue> {
        self.data.get(key)
    }

    pub fn data_count(&self) -> usize {
        self.data.len()
    }

    /// Iterate over all data planes.
    pub fn planes(&self) -> impl Iterator<Item = (&str, &DataValue)> {
        self.data.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Smallest available view plane, for display purposes.
    ///
    /// Falls back to `None` when no view plane exists; callers use the cube
    /// instead.
    pub fn thumbnail(&self) -> Option<&ImageBuffer> {
        self.data
            .iter()
            .filter(|(key, _)| key.contains(VIEW_PLANE))
            .filter_map(|(_, value)| match value {
                DataValue::Image(buf) => Some(buf),
                _ => None,
            })
            .min_by_key(|buf| buf.width() as u64 * buf.height() as u64)
    }
}
