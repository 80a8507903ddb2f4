//! TiffExporter - TIFF output in three layouts.
//!
//! `Single` writes one Gray32Float file per band, `MultiPage` one file with a
//! Gray32Float page per band, `MultiChannel` one file with u16-scaled band
//! pages (the viewer-friendly variant). The tiff encoder cannot emit
//! arbitrary-N-sample interleaved images, so "multi-channel" maps to pages.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use tiff::encoder::{colortype, compression, TiffEncoder};
use tracing::{debug, instrument};

use contracts::{ImageBuffer, Measurement, PipelineError, Result, CUBE_PLANE};

use crate::pan::{build_pan, to_fullscale, PanPlane};
use crate::settings::{TiffCompression, TiffExportSettings, TiffLayout};
use crate::Exporter;

/// Writes measurements as TIFF files per the configured layout.
pub struct TiffExporter {
    name: String,
    settings: TiffExportSettings,
}

impl TiffExporter {
    pub fn new(settings: TiffExportSettings) -> Self {
        Self {
            name: "tiff".to_string(),
            settings,
        }
    }

    fn io_err(&self, e: impl std::fmt::Display) -> PipelineError {
        PipelineError::export_write(&self.name, e.to_string())
    }

    fn scaled_plane(&self, cube: &ImageBuffer, channel: u32) -> Result<Vec<f32>> {
        let mut plane = cube.channel_plane(channel).ok_or_else(|| {
            PipelineError::export_write(&self.name, format!("channel {channel} out of range"))
        })?;
        let multiplier = self.settings.general.spectra_multiplier as f32;
        if (multiplier - 1.0).abs() > f32::EPSILON {
            for sample in &mut plane {
                *sample *= multiplier;
            }
        }
        Ok(plane)
    }

    fn write_f32_pages(&self, path: &Path, cube: &ImageBuffer, channels: &[u32]) -> Result<()> {
        let file = File::create(path).map_err(|e| self.io_err(e))?;
        let mut encoder = TiffEncoder::new(BufWriter::new(file)).map_err(|e| self.io_err(e))?;

        for &ch in channels {
            let plane = self.scaled_plane(cube, ch)?;
            match self.settings.compression {
                TiffCompression::None => encoder
                    .write_image::<colortype::Gray32Float>(cube.width(), cube.height(), &plane)
                    .map_err(|e| self.io_err(e))?,
                TiffCompression::Lzw => encoder
                    .write_image_with_compression::<colortype::Gray32Float, _>(
                        cube.width(),
                        cube.height(),
                        compression::Lzw,
                        &plane,
                    )
                    .map_err(|e| self.io_err(e))?,
            }
        }
        Ok(())
    }

    fn write_u16_pages(&self, path: &Path, cube: &ImageBuffer, channels: &[u32]) -> Result<()> {
        // One normalization factor across all bands keeps them comparable
        let mut max = 0.0f32;
        for &ch in channels {
            for sample in self.scaled_plane(cube, ch)? {
                max = max.max(sample);
            }
        }
        let scale = if max > 0.0 { 65535.0 / max } else { 0.0 };

        let file = File::create(path).map_err(|e| self.io_err(e))?;
        let mut encoder = TiffEncoder::new(BufWriter::new(file)).map_err(|e| self.io_err(e))?;

        for &ch in channels {
            let plane: Vec<u16> = self
                .scaled_plane(cube, ch)?
                .into_iter()
                .map(|sample| (sample.max(0.0) * scale).round().min(65535.0) as u16)
                .collect();
            match self.settings.compression {
                TiffCompression::None => encoder
                    .write_image::<colortype::Gray16>(cube.width(), cube.height(), &plane)
                    .map_err(|e| self.io_err(e))?,
                TiffCompression::Lzw => encoder
                    .write_image_with_compression::<colortype::Gray16, _>(
                        cube.width(),
                        cube.height(),
                        compression::Lzw,
                        &plane,
                    )
                    .map_err(|e| self.io_err(e))?,
            }
        }
        Ok(())
    }
}

impl Exporter for TiffExporter {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "tiff_export", skip(self, measurement), fields(mesu = %measurement.name()))]
    fn apply(&mut self, measurement: &mut Measurement) -> Result<()> {
        let mode = measurement.processing_mode();
        if !mode.is_exportable() && !self.settings.general.permissive {
            return Err(PipelineError::unsupported_mode(&self.name, mode));
        }

        let cube = measurement
            .cube()
            .ok_or_else(|| PipelineError::missing_plane(CUBE_PLANE))?
            .clone();

        let channels = self
            .settings
            .general
            .channel_selection
            .resolve(cube.channels());
        if channels.is_empty() {
            return Err(PipelineError::export_write(
                &self.name,
                "channel selection resolves to no channels",
            ));
        }

        fs::create_dir_all(&self.settings.general.export_dir)
            .map_err(|e| self.io_err(e))?;

        let stem = measurement.name().replace(['/', '\\'], "_");
        match self.settings.format {
            TiffLayout::Single => {
                for &ch in &channels {
                    let path = self
                        .settings
                        .general
                        .export_dir
                        .join(format!("{stem}_band{ch:03}.tiff"));
                    self.write_f32_pages(&path, &cube, &[ch])?;
                }
            }
            TiffLayout::MultiPage => {
                let path = self.settings.general.export_dir.join(format!("{stem}.tiff"));
                self.write_f32_pages(&path, &cube, &channels)?;
            }
            TiffLayout::MultiChannel => {
                let path = self.settings.general.export_dir.join(format!("{stem}.tiff"));
                self.write_u16_pages(&path, &cube, &channels)?;
            }
        }

        // Optional broadband pan companions
        let general = &self.settings.general;
        if general.add_pan || general.add_fullscale_pan {
            if let Some(pan) = build_pan(&cube, &channels, general) {
                if general.add_pan {
                    self.write_pan_file(&format!("{stem}_pan"), &pan)?;
                }
                if general.add_fullscale_pan {
                    self.write_pan_file(&format!("{stem}_pan_fullscale"), &to_fullscale(&pan))?;
                }
            }
        }

        debug!(layout = ?self.settings.format, bands = channels.len(), "tiff export written");
        Ok(())
    }
}

impl TiffExporter {
    fn write_pan_file(&self, stem: &str, pan: &PanPlane) -> Result<()> {
        let path = self
            .settings
            .general
            .export_dir
            .join(format!("{stem}.tiff"));
        let file = File::create(&path).map_err(|e| self.io_err(e))?;
        let mut encoder = TiffEncoder::new(BufWriter::new(file)).map_err(|e| self.io_err(e))?;
        encoder
            .write_image::<colortype::Gray32Float>(pan.width, pan.height, &pan.data)
            .map_err(|e| self.io_err(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::GeneralExportSettings;
    use contracts::{MeasurementMetadata, ProcessingMode, SampleFormat};
    use tempfile::tempdir;

    fn measurement() -> Measurement {
        let cube = ImageBuffer::new(
            4,
            4,
            3,
            SampleFormat::F32,
            (0..48).map(|v| v as f32).collect(),
            None,
        )
        .unwrap();
        let mut metadata = MeasurementMetadata::new("shot", 100.0);
        metadata.processing_mode = ProcessingMode::Reflectance;
        Measurement::with_cube(metadata, cube)
    }

    fn settings(dir: &Path, format: TiffLayout) -> TiffExportSettings {
        TiffExportSettings {
            general: GeneralExportSettings::with_export_dir(dir),
            compression: TiffCompression::None,
            format,
        }
    }

    #[test]
    fn single_layout_writes_file_per_band() {
        let dir = tempdir().unwrap();
        let mut exporter = TiffExporter::new(settings(dir.path(), TiffLayout::Single));

        exporter.apply(&mut measurement()).unwrap();

        for ch in 0..3 {
            assert!(dir.path().join(format!("shot_band{ch:03}.tiff")).exists());
        }
    }

    #[test]
    fn multipage_layout_writes_one_file() {
        let dir = tempdir().unwrap();
        let mut exporter = TiffExporter::new(settings(dir.path(), TiffLayout::MultiPage));

        exporter.apply(&mut measurement()).unwrap();

        assert!(dir.path().join("shot.tiff").exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn multichannel_layout_with_lzw() {
        let dir = tempdir().unwrap();
        let mut s = settings(dir.path(), TiffLayout::MultiChannel);
        s.compression = TiffCompression::Lzw;
        let mut exporter = TiffExporter::new(s);

        exporter.apply(&mut measurement()).unwrap();
        assert!(dir.path().join("shot.tiff").exists());
    }

    #[test]
    fn preview_mode_is_refused() {
        let dir = tempdir().unwrap();
        let mut exporter = TiffExporter::new(settings(dir.path(), TiffLayout::MultiPage));

        let mut mesu = measurement();
        mesu.metadata.processing_mode = ProcessingMode::Preview;
        assert!(matches!(
            exporter.apply(&mut mesu),
            Err(PipelineError::UnsupportedMode { .. })
        ));
        // Nothing written on refusal
        assert!(!dir.path().join("shot.tiff").exists());
    }
}
