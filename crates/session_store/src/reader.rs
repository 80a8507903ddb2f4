//! SessionReader - read-only access to a stored session.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use contracts::{
    DataValue, ImageBuffer, Measurement, MeasurementMetadata, OperationMode, PipelineError,
    Result, SessionItemType,
};

use crate::format::{EntryKind, EntryRecord, PlaneRecord, SessionManifest, MANIFEST_FILE};

/// Read-only handle to a session directory.
///
/// The manifest is loaded once at open; measurements are loaded lazily per
/// [`get_measurement`](Self::get_measurement) call. The underlying storage is
/// never mutated.
pub struct SessionReader {
    path: PathBuf,
    manifest: SessionManifest,
}

impl SessionReader {
    /// Open a session directory.
    ///
    /// # Errors
    /// - [`PipelineError::SessionNotFound`] when the directory or manifest is missing
    /// - [`PipelineError::SessionCorrupt`] when the manifest cannot be parsed
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.is_dir() {
            return Err(PipelineError::SessionNotFound { path });
        }

        let manifest_path = path.join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            return Err(PipelineError::SessionNotFound { path });
        }

        let content = fs::read_to_string(&manifest_path)
            .map_err(|e| PipelineError::session_corrupt(&path, e.to_string()))?;
        let manifest: SessionManifest = serde_json::from_str(&content)
            .map_err(|e| PipelineError::session_corrupt(&path, format!("manifest: {e}")))?;

        info!(
            session = %manifest.name,
            entries = manifest.entries.len(),
            fps = manifest.fps,
            "session opened"
        );

        Ok(Self { path, manifest })
    }

    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    pub fn session_no(&self) -> u32 {
        self.manifest.session_no
    }

    /// Recording frame rate (0 for single captures).
    pub fn fps(&self) -> f64 {
        self.manifest.fps
    }

    pub fn operation_mode(&self) -> OperationMode {
        self.manifest.operation_mode
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of stored items of the given category.
    pub fn size(&self, item_type: SessionItemType) -> usize {
        self.select(item_type).len()
    }

    /// Load the measurement at `index` within the given category.
    ///
    /// # Errors
    /// [`PipelineError::IndexOutOfRange`] when `index >= size(item_type)`.
    pub fn get_measurement(
        &self,
        index: usize,
        item_type: SessionItemType,
    ) -> Result<Measurement> {
        let selected = self.select(item_type);
        let entry = selected.get(index).ok_or(PipelineError::IndexOutOfRange {
            index,
            len: selected.len(),
        })?;
        self.load_entry(entry)
    }

    /// The reference kind of an entry, if it is one.
    pub fn reference_kinds(&self) -> Vec<contracts::ReferenceType> {
        self.manifest
            .entries
            .iter()
            .filter_map(|e| match e.kind {
                EntryKind::Reference(kind) => Some(kind),
                EntryKind::Frame => None,
            })
            .collect()
    }

    fn select(&self, item_type: SessionItemType) -> Vec<&EntryRecord> {
        match item_type {
            SessionItemType::Frames => {
                self.manifest.entries.iter().filter(|e| e.is_frame()).collect()
            }
            SessionItemType::FramesNoGaps => {
                // Longest contiguous run of sequence numbers from the first frame
                let frames: Vec<&EntryRecord> =
                    self.manifest.entries.iter().filter(|e| e.is_frame()).collect();
                let Some(first) = frames.first() else {
                    return Vec::new();
                };
                let base = first.sequence_no;
                frames
                    .into_iter()
                    .enumerate()
                    .take_while(|(i, e)| e.sequence_no == base + *i as u32)
                    .map(|(_, e)| e)
                    .collect()
            }
            SessionItemType::References => self
                .manifest
                .entries
                .iter()
                .filter(|e| !e.is_frame())
                .collect(),
        }
    }

    fn load_entry(&self, entry: &EntryRecord) -> Result<Measurement> {
        let meta_path = self.path.join(&entry.meta_file);
        let meta_content = fs::read_to_string(&meta_path)
            .map_err(|e| PipelineError::session_corrupt(&self.path, e.to_string()))?;
        let mut metadata: MeasurementMetadata = serde_json::from_str(&meta_content)
            .map_err(|e| {
                PipelineError::session_corrupt(&self.path, format!("{}: {e}", entry.meta_file))
            })?;
        metadata.path = Some(meta_path);

        let mut measurement = Measurement::new(metadata);

        for plane in &entry.planes {
            let buffer = self.load_plane(plane)?;
            measurement.insert_data(plane.key.clone(), DataValue::Image(buffer));
        }

        if let Some(aux_file) = &entry.aux_file {
            let aux_content = fs::read_to_string(self.path.join(aux_file))
                .map_err(|e| PipelineError::session_corrupt(&self.path, e.to_string()))?;
            let aux: HashMap<String, DataValue> = serde_json::from_str(&aux_content)
                .map_err(|e| {
                    PipelineError::session_corrupt(&self.path, format!("{aux_file}: {e}"))
                })?;
            for (key, value) in aux {
                measurement.insert_data(key, value);
            }
        }

        debug!(
            sequence_no = entry.sequence_no,
            planes = entry.planes.len(),
            "measurement loaded"
        );

        Ok(measurement)
    }

    fn load_plane(&self, plane: &PlaneRecord) -> Result<ImageBuffer> {
        let file_path = self.path.join(&plane.file);
        let bytes = fs::read(&file_path)
            .map_err(|e| PipelineError::session_corrupt(&self.path, e.to_string()))?;

        let expected = plane.width as usize * plane.height as usize * plane.channels as usize * 4;
        if bytes.len() != expected {
            return Err(PipelineError::session_corrupt(
                &self.path,
                format!(
                    "plane '{}': {} bytes on disk, expected {expected}",
                    plane.file,
                    bytes.len()
                ),
            ));
        }

        // pod_collect_to_vec copies, which also fixes up alignment
        let samples: Vec<f32> = bytemuck::pod_collect_to_vec(&bytes);

        ImageBuffer::new(
            plane.width,
            plane.height,
            plane.channels,
            plane.sample_format,
            samples,
            plane.wavelengths_nm.clone(),
        )
    }
}
