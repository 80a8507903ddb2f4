//! CubeExporter - records measurements back into a session container.

use tracing::{debug, instrument};

use contracts::{Measurement, PipelineError, Result};
use session_store::{EntryKind, SessionWriter, SessionWriterOptions};

use crate::settings::SaveArgs;
use crate::Exporter;

/// Appends measurements to a session container per the configured save args.
///
/// With `allow_session_file` every apply extends one shared container in the
/// export directory; without it, each measurement becomes its own
/// single-entry container (legacy per-file layout).
pub struct CubeExporter {
    name: String,
    save_args: SaveArgs,
    writer: Option<SessionWriter>,
}

impl CubeExporter {
    pub fn new(save_args: SaveArgs) -> Self {
        Self {
            name: "cube".to_string(),
            save_args,
            writer: None,
        }
    }

    fn writer_options(&self, name: &str) -> SessionWriterOptions {
        SessionWriterOptions {
            name: name.to_string(),
            session_no: 0,
            fps: self.save_args.fps,
            operation_mode: self.save_args.operation_mode,
            allow_overwrite: self.save_args.allow_overwrite,
        }
    }

    fn shared_writer(&mut self, measurement: &Measurement) -> Result<&mut SessionWriter> {
        let session_name = if measurement.metadata.session.name.is_empty() {
            "session"
        } else {
            &measurement.metadata.session.name
        };
        let options = self.writer_options(session_name);
        let export_dir = self.save_args.general.export_dir.clone();

        match &mut self.writer {
            Some(writer) => Ok(writer),
            slot => Ok(slot.insert(SessionWriter::create(&export_dir, options)?)),
        }
    }
}

impl Exporter for CubeExporter {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "cube_export", skip(self, measurement), fields(mesu = %measurement.name()))]
    fn apply(&mut self, measurement: &mut Measurement) -> Result<()> {
        let mode = measurement.processing_mode();
        if !mode.is_exportable() && !self.save_args.general.permissive {
            return Err(PipelineError::unsupported_mode(&self.name, mode));
        }

        if self.save_args.allow_session_file {
            let write_info = self.save_args.allow_info_file;
            let writer = self.shared_writer(measurement)?;
            let sequence_no = writer.append(measurement, EntryKind::Frame)?;
            if write_info {
                writer.write_info_file()?;
            }
            // The stored identity becomes the measurement's identity
            measurement.metadata.session.sequence_no = sequence_no;
            debug!(sequence_no, "measurement recorded to shared session");
        } else {
            let stem = measurement.name().replace(['/', '\\'], "_");
            let dir = self.save_args.general.export_dir.join(&stem);
            let mut writer = SessionWriter::create(&dir, self.writer_options(&stem))?;
            writer.append(measurement, EntryKind::Frame)?;
            if self.save_args.allow_info_file {
                writer.write_info_file()?;
            }
            debug!(dir = %dir.display(), "measurement recorded standalone");
        }

        Ok(())
    }
}
