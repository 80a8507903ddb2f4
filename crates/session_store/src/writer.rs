//! SessionWriter - appends measurements to a session container.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info};

use contracts::{
    DataValue, Measurement, OperationMode, PipelineError, Result, SessionInfo,
};

use crate::format::{
    entry_stem, EntryKind, EntryRecord, PlaneRecord, SessionManifest, FORMAT_VERSION,
    INFO_FILE, MANIFEST_FILE,
};

/// Options for creating a session.
#[derive(Debug, Clone)]
pub struct SessionWriterOptions {
    pub name: String,
    pub session_no: u32,
    /// Recording frame rate; 0 for single captures
    pub fps: f64,
    pub operation_mode: OperationMode,
    /// Replace an existing session at the same path
    pub allow_overwrite: bool,
}

impl Default for SessionWriterOptions {
    fn default() -> Self {
        Self {
            name: "session".to_string(),
            session_no: 0,
            fps: 0.0,
            operation_mode: OperationMode::Software,
            allow_overwrite: false,
        }
    }
}

/// Appends measurements to a session directory.
///
/// The manifest is rewritten after every append so a partially written
/// session stays readable.
pub struct SessionWriter {
    path: PathBuf,
    manifest: SessionManifest,
    next_sequence: u32,
}

impl SessionWriter {
    /// Create (or overwrite) a session directory.
    pub fn create(path: impl AsRef<Path>, options: SessionWriterOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let manifest_path = path.join(MANIFEST_FILE);

        if manifest_path.exists() && !options.allow_overwrite {
            return Err(PipelineError::session_corrupt(
                &path,
                "session already exists and overwrite is not allowed",
            ));
        }

        fs::create_dir_all(&path)?;

        let manifest = SessionManifest {
            version: FORMAT_VERSION,
            name: options.name,
            session_no: options.session_no,
            fps: options.fps,
            operation_mode: options.operation_mode,
            created_at: Utc::now().to_rfc3339(),
            entries: Vec::new(),
        };

        let writer = Self {
            path,
            manifest,
            next_sequence: 0,
        };
        writer.write_manifest()?;

        info!(session = %writer.manifest.name, path = %writer.path.display(), "session created");

        Ok(writer)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entry_count(&self) -> usize {
        self.manifest.entries.len()
    }

    /// Append a measurement and return its assigned sequence number.
    ///
    /// The measurement's own session info is ignored; the session identity of
    /// this container is stamped instead.
    pub fn append(&mut self, measurement: &Measurement, kind: EntryKind) -> Result<u32> {
        let sequence_no = self.next_sequence;
        let stem = entry_stem(sequence_no);

        // Metadata, with this container's session identity stamped in
        let mut metadata = measurement.metadata.clone();
        metadata.path = None;
        metadata.session = SessionInfo {
            name: self.manifest.name.clone(),
            session_no: self.manifest.session_no,
            sequence_no,
        };
        let meta_file = format!("{stem}.meta.json");
        fs::write(
            self.path.join(&meta_file),
            serde_json::to_string_pretty(&metadata)
                .map_err(|e| PipelineError::session_corrupt(&self.path, e.to_string()))?,
        )?;

        // Image planes as raw little-endian f32
        let mut planes = Vec::new();
        let mut aux: HashMap<String, DataValue> = HashMap::new();
        for (key, value) in measurement.planes() {
            match value {
                DataValue::Image(buffer) => {
                    let file = format!("{stem}.{key}.f32");
                    fs::write(self.path.join(&file), bytemuck::cast_slice(buffer.samples()))?;
                    planes.push(PlaneRecord {
                        key: key.to_string(),
                        file,
                        width: buffer.width(),
                        height: buffer.height(),
                        channels: buffer.channels(),
                        sample_format: buffer.source_format(),
                        wavelengths_nm: buffer.wavelengths_nm().map(|wl| wl.to_vec()),
                    });
                }
                other => {
                    aux.insert(key.to_string(), other.clone());
                }
            }
        }

        let aux_file = if aux.is_empty() {
            None
        } else {
            let file = format!("{stem}.aux.json");
            fs::write(
                self.path.join(&file),
                serde_json::to_string_pretty(&aux)
                    .map_err(|e| PipelineError::session_corrupt(&self.path, e.to_string()))?,
            )?;
            Some(file)
        };

        self.manifest.entries.push(EntryRecord {
            sequence_no,
            kind,
            meta_file,
            planes,
            aux_file,
        });
        self.next_sequence += 1;
        self.write_manifest()?;

        debug!(sequence_no, name = %metadata.name, "measurement appended");

        Ok(sequence_no)
    }

    /// Write the optional human-readable info file.
    pub fn write_info_file(&self) -> Result<()> {
        let info = serde_json::json!({
            "name": self.manifest.name,
            "session_no": self.manifest.session_no,
            "fps": self.manifest.fps,
            "operation_mode": self.manifest.operation_mode,
            "created_at": self.manifest.created_at,
            "entries": self.manifest.entries.len(),
        });
        fs::write(
            self.path.join(INFO_FILE),
            serde_json::to_string_pretty(&info)
                .map_err(|e| PipelineError::session_corrupt(&self.path, e.to_string()))?,
        )?;
        Ok(())
    }

    fn write_manifest(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.manifest)
            .map_err(|e| PipelineError::session_corrupt(&self.path, e.to_string()))?;
        fs::write(self.path.join(MANIFEST_FILE), content)?;
        Ok(())
    }
}
