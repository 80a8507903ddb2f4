//! EnviExporter - ENVI header + band-sequential f32 raw.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use tracing::{debug, instrument};

use contracts::{Measurement, PipelineError, Result, CUBE_PLANE};

use crate::pan::{build_pan, to_fullscale, PanPlane};
use crate::settings::GeneralExportSettings;
use crate::Exporter;

/// Writes measurements as ENVI image pairs: a text `.hdr` describing the
/// geometry and a `.raw` holding band-sequential little-endian float32
/// samples. Standard remote-sensing tools open these directly.
pub struct EnviExporter {
    name: String,
    settings: GeneralExportSettings,
}

impl EnviExporter {
    pub fn new(settings: GeneralExportSettings) -> Self {
        Self {
            name: "envi".to_string(),
            settings,
        }
    }

    fn io_err(&self, e: impl std::fmt::Display) -> PipelineError {
        PipelineError::export_write(&self.name, e.to_string())
    }

    fn write_header(
        &self,
        path: &PathBuf,
        width: u32,
        height: u32,
        channels: &[u32],
        wavelengths: Option<Vec<u32>>,
        raw_file: &str,
    ) -> Result<()> {
        let file = File::create(path).map_err(|e| self.io_err(e))?;
        let mut w = BufWriter::new(file);

        let mut write = || -> std::io::Result<()> {
            writeln!(w, "ENVI")?;
            writeln!(w, "description = {{exported measurement, data in {raw_file}}}")?;
            writeln!(w, "samples = {width}")?;
            writeln!(w, "lines = {height}")?;
            writeln!(w, "bands = {}", channels.len())?;
            writeln!(w, "header offset = 0")?;
            writeln!(w, "file type = ENVI Standard")?;
            // data type 4 = 32-bit float
            writeln!(w, "data type = 4")?;
            writeln!(w, "interleave = bsq")?;
            writeln!(w, "byte order = 0")?;
            if let Some(wavelengths) = wavelengths {
                writeln!(w, "wavelength units = Nanometers")?;
                let list = wavelengths
                    .iter()
                    .map(|wl| wl.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                writeln!(w, "wavelength = {{{list}}}")?;
            }
            Ok(())
        };
        write().map_err(|e| self.io_err(e))
    }
}

impl Exporter for EnviExporter {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "envi_export", skip(self, measurement), fields(mesu = %measurement.name()))]
    fn apply(&mut self, measurement: &mut Measurement) -> Result<()> {
        let mode = measurement.processing_mode();
        if !mode.is_exportable() && !self.settings.permissive {
            return Err(PipelineError::unsupported_mode(&self.name, mode));
        }

        let cube = measurement
            .cube()
            .ok_or_else(|| PipelineError::missing_plane(CUBE_PLANE))?;

        let channels = self.settings.channel_selection.resolve(cube.channels());
        if channels.is_empty() {
            return Err(PipelineError::export_write(
                &self.name,
                "channel selection resolves to no channels",
            ));
        }

        fs::create_dir_all(&self.settings.export_dir).map_err(|e| self.io_err(e))?;

        let stem = measurement.name().replace(['/', '\\'], "_");
        let raw_name = format!("{stem}.raw");
        let hdr_path = self.settings.export_dir.join(format!("{stem}.hdr"));
        let raw_path = self.settings.export_dir.join(&raw_name);

        let wavelengths = channels
            .iter()
            .map(|&ch| cube.wavelength_nm(ch))
            .collect::<Option<Vec<u32>>>();

        self.write_header(
            &hdr_path,
            cube.width(),
            cube.height(),
            &channels,
            wavelengths,
            &raw_name,
        )?;

        // Band-sequential: one full plane per selected channel
        let file = File::create(&raw_path).map_err(|e| self.io_err(e))?;
        let mut w = BufWriter::new(file);
        let multiplier = self.settings.spectra_multiplier as f32;
        for &ch in &channels {
            let mut plane = match cube.channel_plane(ch) {
                Some(plane) => plane,
                None => {
                    return Err(PipelineError::export_write(
                        &self.name,
                        format!("channel {ch} vanished during export"),
                    ))
                }
            };
            if (multiplier - 1.0).abs() > f32::EPSILON {
                for sample in &mut plane {
                    *sample *= multiplier;
                }
            }
            w.write_all(bytemuck::cast_slice(&plane))
                .map_err(|e| self.io_err(e))?;
        }
        w.flush().map_err(|e| self.io_err(e))?;

        // Optional broadband pan companions
        if self.settings.add_pan || self.settings.add_fullscale_pan {
            if let Some(pan) = build_pan(cube, &channels, &self.settings) {
                if self.settings.add_pan {
                    self.write_pan(&format!("{stem}_pan"), &pan)?;
                }
                if self.settings.add_fullscale_pan {
                    self.write_pan(&format!("{stem}_pan_fullscale"), &to_fullscale(&pan))?;
                }
            }
        }

        debug!(
            hdr = %hdr_path.display(),
            raw = %raw_path.display(),
            bands = channels.len(),
            "envi export written"
        );
        Ok(())
    }
}

impl EnviExporter {
    fn write_pan(&self, stem: &str, pan: &PanPlane) -> Result<()> {
        let raw_name = format!("{stem}.raw");
        let hdr_path = self.settings.export_dir.join(format!("{stem}.hdr"));
        self.write_header(&hdr_path, pan.width, pan.height, &[0], None, &raw_name)?;

        let raw_path = self.settings.export_dir.join(&raw_name);
        let file = File::create(&raw_path).map_err(|e| self.io_err(e))?;
        let mut w = BufWriter::new(file);
        w.write_all(bytemuck::cast_slice(&pan.data))
            .map_err(|e| self.io_err(e))?;
        w.flush().map_err(|e| self.io_err(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ChannelSelection;
    use contracts::{ImageBuffer, MeasurementMetadata, ProcessingMode, SampleFormat};
    use tempfile::tempdir;

    fn reflectance_measurement() -> Measurement {
        let cube = ImageBuffer::new(
            4,
            2,
            3,
            SampleFormat::F32,
            (0..24).map(|v| v as f32 / 24.0).collect(),
            Some(vec![450, 550, 650]),
        )
        .unwrap();
        let mut metadata = MeasurementMetadata::new("mesu", 100.0);
        metadata.processing_mode = ProcessingMode::Reflectance;
        Measurement::with_cube(metadata, cube)
    }

    #[test]
    fn writes_header_and_raw_only_on_apply() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("envi");

        let mut exporter =
            EnviExporter::new(GeneralExportSettings::with_export_dir(&out));
        // Construction creates nothing
        assert!(!out.exists());

        let mut mesu = reflectance_measurement();
        exporter.apply(&mut mesu).unwrap();

        let hdr = std::fs::read_to_string(out.join("mesu.hdr")).unwrap();
        assert!(hdr.contains("samples = 4"));
        assert!(hdr.contains("lines = 2"));
        assert!(hdr.contains("bands = 3"));
        assert!(hdr.contains("data type = 4"));
        assert!(hdr.contains("wavelength = {450, 550, 650}"));

        let raw = std::fs::read(out.join("mesu.raw")).unwrap();
        assert_eq!(raw.len(), 4 * 2 * 3 * 4);
    }

    #[test]
    fn preview_mode_is_refused() {
        let dir = tempdir().unwrap();
        let mut exporter =
            EnviExporter::new(GeneralExportSettings::with_export_dir(dir.path()));

        let mut mesu = reflectance_measurement();
        mesu.metadata.processing_mode = ProcessingMode::Preview;

        let err = exporter.apply(&mut mesu).unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedMode { .. }));
    }

    #[test]
    fn permissive_allows_preview() {
        let dir = tempdir().unwrap();
        let mut settings = GeneralExportSettings::with_export_dir(dir.path());
        settings.permissive = true;
        let mut exporter = EnviExporter::new(settings);

        let mut mesu = reflectance_measurement();
        mesu.metadata.processing_mode = ProcessingMode::Preview;
        assert!(exporter.apply(&mut mesu).is_ok());
    }

    #[test]
    fn add_pan_writes_companion_pair() {
        let dir = tempdir().unwrap();
        let mut settings = GeneralExportSettings::with_export_dir(dir.path());
        settings.add_pan = true;
        let mut exporter = EnviExporter::new(settings);

        exporter.apply(&mut reflectance_measurement()).unwrap();

        assert!(dir.path().join("mesu_pan.hdr").exists());
        let pan_raw = std::fs::read(dir.path().join("mesu_pan.raw")).unwrap();
        assert_eq!(pan_raw.len(), 4 * 2 * 4);
    }

    #[test]
    fn channel_subset_shrinks_raw() {
        let dir = tempdir().unwrap();
        let mut settings = GeneralExportSettings::with_export_dir(dir.path());
        settings.channel_selection = ChannelSelection::Single(1);
        let mut exporter = EnviExporter::new(settings);

        let mut mesu = reflectance_measurement();
        exporter.apply(&mut mesu).unwrap();

        let raw = std::fs::read(dir.path().join("mesu.raw")).unwrap();
        assert_eq!(raw.len(), 4 * 2 * 4);
    }
}
