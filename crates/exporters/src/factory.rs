//! Exporter construction from blueprint configuration.

use std::collections::HashMap;

use tracing::debug;

use contracts::{ExporterConfig, ExporterKind, Measurement, PipelineError, Result};

use crate::settings::{
    ChannelSelection, GeneralExportSettings, SaveArgs, TiffCompression, TiffExportSettings,
    TiffLayout, ViewExportSettings,
};
use crate::{CubeExporter, EnviExporter, Exporter, TiffExporter, ViewExporter};

/// Build one exporter from its blueprint entry.
pub fn build_exporter(config: &ExporterConfig) -> Result<Box<dyn Exporter + Send>> {
    let general = general_settings(config)?;
    debug!(name = %config.name, kind = ?config.kind, "building exporter");

    match config.kind {
        ExporterKind::Envi => Ok(Box::new(EnviExporter::new(general))),
        ExporterKind::Tiff => {
            let format = match param(&config.params, "format").unwrap_or("multi_channel") {
                "single" => TiffLayout::Single,
                "multi_channel" => TiffLayout::MultiChannel,
                "multi_page" => TiffLayout::MultiPage,
                other => {
                    return Err(PipelineError::config_validation(
                        format!("exporters[{}].params.format", config.name),
                        format!("unknown tiff format '{other}'"),
                    ))
                }
            };
            let compression = match param(&config.params, "compression").unwrap_or("none") {
                "none" => TiffCompression::None,
                "lzw" => TiffCompression::Lzw,
                other => {
                    return Err(PipelineError::config_validation(
                        format!("exporters[{}].params.compression", config.name),
                        format!("unknown tiff compression '{other}'"),
                    ))
                }
            };
            Ok(Box::new(TiffExporter::new(TiffExportSettings {
                general,
                compression,
                format,
            })))
        }
        ExporterKind::View => {
            let plugin = param(&config.params, "plugin").ok_or_else(|| {
                PipelineError::config_validation(
                    format!("exporters[{}].params.plugin", config.name),
                    "view exporter requires a plugin parameter",
                )
            })?;
            let exporter = ViewExporter::new(ViewExportSettings {
                general,
                userplugin: plugin.to_string(),
            })?;
            Ok(Box::new(exporter))
        }
        ExporterKind::Cube => {
            let save_args = SaveArgs {
                general,
                allow_overwrite: bool_param(&config.params, "allow_overwrite", true)?,
                allow_session_file: bool_param(&config.params, "allow_session_file", true)?,
                allow_info_file: bool_param(&config.params, "allow_info_file", true)?,
                fps: float_param(&config.params, "fps", 0.0)?,
                ..Default::default()
            };
            Ok(Box::new(CubeExporter::new(save_args)))
        }
    }
}

/// Fan-out: applies every exporter in order.
///
/// A failing exporter does not stop the others; the first error is returned
/// after all exporters ran.
pub struct ExporterStack {
    exporters: Vec<Box<dyn Exporter + Send>>,
}

impl ExporterStack {
    pub fn new(exporters: Vec<Box<dyn Exporter + Send>>) -> Self {
        Self { exporters }
    }

    /// Build the full stack from blueprint entries.
    pub fn from_configs(configs: &[ExporterConfig]) -> Result<Self> {
        let exporters = configs
            .iter()
            .map(build_exporter)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(exporters))
    }

    pub fn len(&self) -> usize {
        self.exporters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exporters.is_empty()
    }
}

impl Exporter for ExporterStack {
    fn name(&self) -> &str {
        "stack"
    }

    fn apply(&mut self, measurement: &mut Measurement) -> Result<()> {
        let mut first_error = None;
        for exporter in &mut self.exporters {
            if let Err(e) = exporter.apply(measurement) {
                tracing::error!(exporter = exporter.name(), error = %e, "exporter failed");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn param<'a>(params: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    params.get(key).map(String::as_str)
}

fn bool_param(params: &HashMap<String, String>, key: &str, default: bool) -> Result<bool> {
    match params.get(key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| {
            PipelineError::config_validation(key, format!("expected true/false, got '{raw}'"))
        }),
    }
}

fn float_param(params: &HashMap<String, String>, key: &str, default: f64) -> Result<f64> {
    match params.get(key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| {
            PipelineError::config_validation(key, format!("expected a number, got '{raw}'"))
        }),
    }
}

/// Shared parsing of the general settings params.
fn general_settings(config: &ExporterConfig) -> Result<GeneralExportSettings> {
    let mut general = GeneralExportSettings::with_export_dir(&config.export_dir);
    if let Some(selection) = param(&config.params, "channels") {
        general.channel_selection = ChannelSelection::parse(selection)?;
    }
    general.spectra_multiplier = float_param(&config.params, "spectra_multiplier", 1.0)?;
    general.permissive = bool_param(&config.params, "permissive", false)?;
    Ok(general)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config(kind: ExporterKind, params: &[(&str, &str)]) -> ExporterConfig {
        ExporterConfig {
            name: "x".into(),
            kind,
            export_dir: PathBuf::from("./out"),
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn builds_each_kind() {
        assert!(build_exporter(&config(ExporterKind::Envi, &[])).is_ok());
        assert!(build_exporter(&config(
            ExporterKind::Tiff,
            &[("format", "multi_page"), ("compression", "lzw")]
        ))
        .is_ok());
        assert!(build_exporter(&config(ExporterKind::Cube, &[("fps", "2.5")])).is_ok());
    }

    #[test]
    fn unknown_tiff_format_is_rejected() {
        let result = build_exporter(&config(ExporterKind::Tiff, &[("format", "bsq")]));
        assert!(result.is_err());
    }

    #[test]
    fn view_requires_plugin_param() {
        let result = build_exporter(&config(ExporterKind::View, &[]));
        assert!(result.is_err());
    }

    #[test]
    fn bad_bool_param_is_rejected() {
        let result = build_exporter(&config(
            ExporterKind::Cube,
            &[("allow_overwrite", "yes-please")],
        ));
        assert!(result.is_err());
    }
}
