//! ViewExporter - rendered RGB view images.
//!
//! A user plugin XML maps three wavelengths onto the red/green/blue output
//! channels; the nearest cube channels are picked, min/max-normalized per
//! band and written as PNG. Cubes without a wavelength table fall back to
//! evenly spaced channels.

use std::fs;

use serde::Deserialize;
use tracing::{debug, instrument};

use contracts::{ImageBuffer, Measurement, PipelineError, Result, CUBE_PLANE};

use crate::settings::ViewExportSettings;
use crate::Exporter;

/// Channel mapping parsed from the user plugin.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename = "userplugin")]
struct UserPlugin {
    view: ViewMapping,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
struct ViewMapping {
    #[serde(rename = "@name", default)]
    name: String,
    /// Target wavelengths, nanometres
    red: u32,
    green: u32,
    blue: u32,
}

/// Renders an RGB view of a measurement through a plugin channel mapping.
pub struct ViewExporter {
    name: String,
    settings: ViewExportSettings,
    plugin: UserPlugin,
}

impl ViewExporter {
    /// Parse the plugin (reading it from disk when the settings hold a path).
    ///
    /// # Errors
    /// Configuration error when the plugin cannot be read or parsed. No
    /// output is written until `apply`.
    pub fn new(settings: ViewExportSettings) -> Result<Self> {
        let xml = settings.plugin_xml()?;
        let plugin: UserPlugin = quick_xml::de::from_str(&xml).map_err(|e| {
            PipelineError::config_validation("userplugin", format!("plugin parse error: {e}"))
        })?;
        Ok(Self {
            name: "view".to_string(),
            settings,
            plugin,
        })
    }

    fn io_err(&self, e: impl std::fmt::Display) -> PipelineError {
        PipelineError::export_write(&self.name, e.to_string())
    }

    /// Cube channel whose center wavelength is closest to `target_nm`.
    fn nearest_channel(cube: &ImageBuffer, target_nm: u32, fallback: u32) -> u32 {
        match cube.wavelengths_nm() {
            Some(wavelengths) => wavelengths
                .iter()
                .enumerate()
                .min_by_key(|(_, wl)| wl.abs_diff(target_nm))
                .map(|(ch, _)| ch as u32)
                .unwrap_or(fallback),
            None => fallback.min(cube.channels().saturating_sub(1)),
        }
    }

    /// Min/max-normalize a channel plane to u8.
    fn normalized_plane(cube: &ImageBuffer, channel: u32) -> Vec<u8> {
        let plane = cube.channel_plane(channel).unwrap_or_default();
        let (mut min, mut max) = (f32::INFINITY, f32::NEG_INFINITY);
        for &sample in &plane {
            min = min.min(sample);
            max = max.max(sample);
        }
        let range = max - min;
        if !range.is_finite() || range <= 0.0 {
            return vec![0; plane.len()];
        }
        plane
            .into_iter()
            .map(|sample| (((sample - min) / range) * 255.0).round() as u8)
            .collect()
    }
}

impl Exporter for ViewExporter {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "view_export", skip(self, measurement), fields(mesu = %measurement.name()))]
    fn apply(&mut self, measurement: &mut Measurement) -> Result<()> {
        let mode = measurement.processing_mode();
        if !mode.is_exportable() && !self.settings.general.permissive {
            return Err(PipelineError::unsupported_mode(&self.name, mode));
        }

        let cube = measurement
            .cube()
            .ok_or_else(|| PipelineError::missing_plane(CUBE_PLANE))?;

        let channels = cube.channels();
        let mapping = &self.plugin.view;
        // Fallback spreads R/G/B across the band range on wavelength-less cubes
        let red = Self::nearest_channel(cube, mapping.red, channels * 2 / 3);
        let green = Self::nearest_channel(cube, mapping.green, channels / 3);
        let blue = Self::nearest_channel(cube, mapping.blue, 0);

        let r = Self::normalized_plane(cube, red);
        let g = Self::normalized_plane(cube, green);
        let b = Self::normalized_plane(cube, blue);

        let mut rgb = Vec::with_capacity(r.len() * 3);
        for i in 0..r.len() {
            rgb.push(r[i]);
            rgb.push(g[i]);
            rgb.push(b[i]);
        }

        fs::create_dir_all(&self.settings.general.export_dir)
            .map_err(|e| self.io_err(e))?;
        let stem = measurement.name().replace(['/', '\\'], "_");
        let path = self.settings.general.export_dir.join(format!("{stem}.png"));

        let image = image::RgbImage::from_raw(cube.width(), cube.height(), rgb)
            .ok_or_else(|| PipelineError::export_write(&self.name, "rgb buffer size mismatch"))?;
        image.save(&path).map_err(|e| self.io_err(e))?;

        debug!(
            path = %path.display(),
            view = %mapping.name,
            red, green, blue,
            "view export written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::GeneralExportSettings;
    use contracts::{MeasurementMetadata, ProcessingMode, SampleFormat};
    use tempfile::tempdir;

    const PLUGIN: &str = r#"<userplugin xmlns="urn:view-plugin">
        <view name="truecolor">
            <red>640</red>
            <green>550</green>
            <blue>460</blue>
        </view>
    </userplugin>"#;

    fn measurement() -> Measurement {
        let cube = ImageBuffer::new(
            4,
            4,
            4,
            SampleFormat::F32,
            (0..64).map(|v| v as f32).collect(),
            Some(vec![460, 550, 640, 720]),
        )
        .unwrap();
        let mut metadata = MeasurementMetadata::new("scene", 100.0);
        metadata.processing_mode = ProcessingMode::Reflectance;
        Measurement::with_cube(metadata, cube)
    }

    #[test]
    fn plugin_parses_and_png_is_written() {
        let dir = tempdir().unwrap();
        let mut exporter = ViewExporter::new(ViewExportSettings {
            general: GeneralExportSettings::with_export_dir(dir.path()),
            userplugin: PLUGIN.into(),
        })
        .unwrap();

        exporter.apply(&mut measurement()).unwrap();
        assert!(dir.path().join("scene.png").exists());
    }

    #[test]
    fn malformed_plugin_is_rejected_at_construction() {
        let result = ViewExporter::new(ViewExportSettings {
            general: GeneralExportSettings::default(),
            userplugin: "<userplugin><not-a-view/></userplugin>".into(),
        });
        assert!(result.is_err());
    }

    #[test]
    fn nearest_channel_by_wavelength() {
        let mesu = measurement();
        let cube = mesu.cube().unwrap();
        assert_eq!(ViewExporter::nearest_channel(cube, 640, 0), 2);
        assert_eq!(ViewExporter::nearest_channel(cube, 1000, 0), 3);
    }

    #[test]
    fn preview_mode_is_refused() {
        let dir = tempdir().unwrap();
        let mut exporter = ViewExporter::new(ViewExportSettings {
            general: GeneralExportSettings::with_export_dir(dir.path()),
            userplugin: PLUGIN.into(),
        })
        .unwrap();

        let mut mesu = measurement();
        mesu.metadata.processing_mode = ProcessingMode::Preview;
        assert!(exporter.apply(&mut mesu).is_err());
    }
}
