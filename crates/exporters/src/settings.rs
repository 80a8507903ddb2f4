//! Export settings types.
//!
//! Settings are plain values: constructing them (or an exporter from them)
//! performs no writes. Output directories come into existence on the first
//! `apply`.

use std::path::PathBuf;

use contracts::{OperationMode, PipelineError, Result};

/// Which channels an exporter serializes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ChannelSelection {
    /// Every channel
    #[default]
    All,
    /// One channel by index
    Single(u32),
    /// Inclusive index range
    Range { start: u32, end: u32 },
    /// Explicit index list
    List(Vec<u32>),
}

impl ChannelSelection {
    /// Parse from the string form used in settings files:
    /// `"all"`, `"5"`, `"2-7"`, or `"1,3,5"`.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() || input.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        if let Some((start, end)) = input.split_once('-') {
            let start = start.trim().parse().map_err(|_| bad_selection(input))?;
            let end = end.trim().parse().map_err(|_| bad_selection(input))?;
            if start > end {
                return Err(bad_selection(input));
            }
            return Ok(Self::Range { start, end });
        }
        if input.contains(',') {
            let list = input
                .split(',')
                .map(|part| part.trim().parse().map_err(|_| bad_selection(input)))
                .collect::<Result<Vec<u32>>>()?;
            return Ok(Self::List(list));
        }
        Ok(Self::Single(input.parse().map_err(|_| bad_selection(input))?))
    }

    /// Concrete channel indices for a cube with `channels` bands,
    /// out-of-range selections filtered out.
    pub fn resolve(&self, channels: u32) -> Vec<u32> {
        match self {
            Self::All => (0..channels).collect(),
            Self::Single(ch) => {
                if *ch < channels {
                    vec![*ch]
                } else {
                    Vec::new()
                }
            }
            Self::Range { start, end } => (*start..=*end).filter(|ch| *ch < channels).collect(),
            Self::List(list) => list.iter().copied().filter(|ch| *ch < channels).collect(),
        }
    }
}

fn bad_selection(input: &str) -> PipelineError {
    PipelineError::config_validation(
        "channel_selection",
        format!("cannot parse channel selection '{input}'"),
    )
}

/// Pan-sharpening interpolation kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanInterpolation {
    NearestNeighbour,
    #[default]
    Linear,
    Cubic,
    Lanczos,
}

/// Pan-sharpening algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanAlgorithm {
    Noop,
    #[default]
    MacroPixel,
}

/// Settings common to every exporter.
#[derive(Debug, Clone)]
pub struct GeneralExportSettings {
    /// Output directory (created on first apply)
    pub export_dir: PathBuf,
    pub channel_selection: ChannelSelection,
    /// Factor applied to every exported sample
    pub spectra_multiplier: f64,
    /// Pan-sharpening scale; 0 disables
    pub pan_scale: f64,
    pub pan_interpolation: PanInterpolation,
    pub pan_algorithm: PanAlgorithm,
    /// Additionally write the pan channel
    pub add_pan: bool,
    /// Additionally write the full-scale pan channel
    pub add_fullscale_pan: bool,
    /// Export even measurements in modes the exporter would normally refuse
    pub permissive: bool,
}

impl Default for GeneralExportSettings {
    fn default() -> Self {
        Self {
            export_dir: PathBuf::from("."),
            channel_selection: ChannelSelection::All,
            spectra_multiplier: 1.0,
            pan_scale: 0.0,
            pan_interpolation: PanInterpolation::default(),
            pan_algorithm: PanAlgorithm::default(),
            add_pan: false,
            add_fullscale_pan: false,
            permissive: false,
        }
    }
}

impl GeneralExportSettings {
    pub fn with_export_dir(export_dir: impl Into<PathBuf>) -> Self {
        Self {
            export_dir: export_dir.into(),
            ..Default::default()
        }
    }
}

/// TIFF compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TiffCompression {
    #[default]
    None,
    Lzw,
}

/// TIFF file layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TiffLayout {
    /// One file per band (Gray32Float)
    Single,
    /// One file, u16-scaled band pages
    #[default]
    MultiChannel,
    /// One file, one Gray32Float page per band
    MultiPage,
}

/// TIFF exporter settings.
#[derive(Debug, Clone, Default)]
pub struct TiffExportSettings {
    pub general: GeneralExportSettings,
    pub compression: TiffCompression,
    pub format: TiffLayout,
}

/// View exporter settings.
#[derive(Debug, Clone)]
pub struct ViewExportSettings {
    pub general: GeneralExportSettings,
    /// User plugin: inline XML, or a path to an XML file
    pub userplugin: String,
}

impl ViewExportSettings {
    /// The plugin XML, reading it from disk when `userplugin` is a path.
    pub fn plugin_xml(&self) -> Result<String> {
        if self.userplugin.trim_start().starts_with("<userplugin") {
            return Ok(self.userplugin.clone());
        }
        std::fs::read_to_string(&self.userplugin).map_err(|e| {
            PipelineError::config_validation(
                "userplugin",
                format!("cannot read plugin from '{}': {e}", self.userplugin),
            )
        })
    }
}

/// Save args for the cube (session) exporter.
#[derive(Debug, Clone)]
pub struct SaveArgs {
    pub general: GeneralExportSettings,
    pub allow_overwrite: bool,
    pub allow_fragmentation: bool,
    pub allow_drop: bool,
    /// Record into a shared session container (one per export dir);
    /// otherwise every measurement gets its own single-entry container
    pub allow_session_file: bool,
    /// Write the human-readable info file next to the manifest
    pub allow_info_file: bool,
    pub operation_mode: OperationMode,
    /// Recording frame rate stored in the manifest; 0 for single captures
    pub fps: f64,
    pub soft_limit: usize,
    pub hard_limit: usize,
    pub max_buftime_ms: u64,
}

impl Default for SaveArgs {
    fn default() -> Self {
        Self {
            general: GeneralExportSettings::default(),
            allow_overwrite: false,
            allow_fragmentation: false,
            allow_drop: false,
            allow_session_file: true,
            allow_info_file: true,
            operation_mode: OperationMode::Software,
            fps: 0.0,
            soft_limit: 20,
            hard_limit: 100,
            max_buftime_ms: 10_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_selection_forms() {
        assert_eq!(ChannelSelection::parse("all").unwrap(), ChannelSelection::All);
        assert_eq!(ChannelSelection::parse("5").unwrap(), ChannelSelection::Single(5));
        assert_eq!(
            ChannelSelection::parse("2-4").unwrap(),
            ChannelSelection::Range { start: 2, end: 4 }
        );
        assert_eq!(
            ChannelSelection::parse("1, 3,5").unwrap(),
            ChannelSelection::List(vec![1, 3, 5])
        );
        assert!(ChannelSelection::parse("7-2").is_err());
        assert!(ChannelSelection::parse("abc").is_err());
    }

    #[test]
    fn resolve_filters_out_of_range() {
        let sel = ChannelSelection::Range { start: 2, end: 10 };
        assert_eq!(sel.resolve(5), vec![2, 3, 4]);

        assert_eq!(ChannelSelection::Single(9).resolve(5), Vec::<u32>::new());
        assert_eq!(ChannelSelection::All.resolve(3), vec![0, 1, 2]);
    }

    #[test]
    fn inline_plugin_passthrough() {
        let settings = ViewExportSettings {
            general: GeneralExportSettings::default(),
            userplugin: "<userplugin><view name=\"v\"><red>640</red><green>550</green><blue>460</blue></view></userplugin>".into(),
        };
        assert!(settings.plugin_xml().unwrap().starts_with("<userplugin"));
    }

    #[test]
    fn plugin_path_must_exist() {
        let settings = ViewExportSettings {
            general: GeneralExportSettings::default(),
            userplugin: "/nonexistent/plugin.xml".into(),
        };
        assert!(settings.plugin_xml().is_err());
    }
}
