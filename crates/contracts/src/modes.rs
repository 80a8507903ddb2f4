//! Mode and state enumerations shared across the pipeline.

use serde::{Deserialize, Serialize};

/// Target mode of a processed spectral cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMode {
    /// Decimated live view, not suitable for export
    Preview,
    /// Raw sensor counts
    #[default]
    Raw,
    /// Raw counts minus the dark reference
    DarkSubtract,
    /// (raw - dark) / (white - dark)
    Reflectance,
    /// Dark-subtracted counts scaled to spectral radiance
    SpectralRadiance,
}

impl ProcessingMode {
    /// References that must be present before a context can process to this mode.
    ///
    /// Distance adjustment is orthogonal (a configured distance value), so it
    /// does not appear here.
    pub fn required_references(&self) -> &'static [ReferenceType] {
        match self {
            ProcessingMode::Preview | ProcessingMode::Raw => &[],
            ProcessingMode::DarkSubtract => &[ReferenceType::Dark],
            ProcessingMode::Reflectance => &[ReferenceType::Dark, ReferenceType::White],
            ProcessingMode::SpectralRadiance => &[ReferenceType::Dark, ReferenceType::SpRad],
        }
    }

    /// Whether measurements in this mode may be serialized by exporters.
    pub fn is_exportable(&self) -> bool {
        !matches!(self, ProcessingMode::Preview)
    }
}

/// Kind of correction a reference measurement supplies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    Dark,
    White,
    WhiteDark,
    SpRad,
    Distance,
}

/// Aggregate hardware readiness, polled by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HardwareState {
    Offline,
    PartiallyOnline,
    Online,
}

/// Trigger source for captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationMode {
    /// External hardware trigger line
    External,
    /// Free-running at the configured FPS
    #[default]
    Internal,
    /// One frame per software trigger
    Software,
    Undefined,
}

/// Category of items stored in a session container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionItemType {
    /// All recorded frames
    #[default]
    Frames,
    /// Frames excluding gaps in the sequence numbering
    FramesNoGaps,
    /// Reference measurements (dark, white, ...) stored alongside the frames
    References,
}

/// Outcome of waiting on an asynchronous operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureStatus {
    /// Result is available
    Done,
    /// Hardware did not respond within the wait; retry or poll again
    Timeout,
    /// A newer request displaced this one
    Overwritten,
    /// Operation accepted but not started (e.g. hardware still warming up)
    Deferred,
}

/// Hardware component category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentType {
    ImageSensor,
    MiscSensor,
}

/// Descriptive info for one hardware component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentInfo {
    pub kind: ComponentType,
    pub display_name: String,
    pub sensor_info: String,
    pub user_field: String,
    pub pixel_format: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reflectance_requires_dark_and_white() {
        let refs = ProcessingMode::Reflectance.required_references();
        assert!(refs.contains(&ReferenceType::Dark));
        assert!(refs.contains(&ReferenceType::White));
        assert_eq!(refs.len(), 2);
    }

    #[test]
    fn raw_and_preview_require_nothing() {
        assert!(ProcessingMode::Raw.required_references().is_empty());
        assert!(ProcessingMode::Preview.required_references().is_empty());
    }

    #[test]
    fn preview_is_not_exportable() {
        assert!(!ProcessingMode::Preview.is_exportable());
        assert!(ProcessingMode::Reflectance.is_exportable());
    }

    #[test]
    fn mode_serde_snake_case() {
        let json = serde_json::to_string(&ProcessingMode::SpectralRadiance).unwrap();
        assert_eq!(json, "\"spectral_radiance\"");
    }
}
