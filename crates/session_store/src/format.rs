//! On-disk session container layout.
//!
//! A session is a directory:
//! - `session.json` — manifest (session info + entry index)
//! - `NNNNNN.meta.json` — measurement metadata per entry
//! - `NNNNNN.<plane>.f32` — raw little-endian f32 samples per image plane
//! - `NNNNNN.aux.json` — non-image planes (text, GPS, sensor info), optional

use serde::{Deserialize, Serialize};

use contracts::{OperationMode, ReferenceType, SampleFormat};

/// Manifest file name inside a session directory.
pub const MANIFEST_FILE: &str = "session.json";

/// Optional human-readable info file written next to the manifest.
pub const INFO_FILE: &str = "session_info.json";

/// Manifest format version.
pub const FORMAT_VERSION: u32 = 1;

/// Session manifest: identity plus the entry index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionManifest {
    pub version: u32,
    pub name: String,
    pub session_no: u32,
    /// Recording frame rate; 0 for single captures
    pub fps: f64,
    pub operation_mode: OperationMode,
    pub created_at: String,
    #[serde(default)]
    pub entries: Vec<EntryRecord>,
}

/// What an entry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Frame,
    Reference(ReferenceType),
}

/// One stored measurement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryRecord {
    pub sequence_no: u32,
    pub kind: EntryKind,
    pub meta_file: String,
    #[serde(default)]
    pub planes: Vec<PlaneRecord>,
    #[serde(default)]
    pub aux_file: Option<String>,
}

/// One raw image plane file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaneRecord {
    /// Data-plane key ("cube", "view", ...)
    pub key: String,
    pub file: String,
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub sample_format: SampleFormat,
    #[serde(default)]
    pub wavelengths_nm: Option<Vec<u32>>,
}

impl EntryRecord {
    pub fn is_frame(&self) -> bool {
        matches!(self.kind, EntryKind::Frame)
    }
}

/// File stem for entry `sequence_no` (zero-padded for stable sort order).
pub fn entry_stem(sequence_no: u32) -> String {
    format!("{sequence_no:06}")
}
