//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// cubepipe - Hyperspectral cube acquisition and processing pipeline
#[derive(Parser, Debug)]
#[command(
    name = "cubepipe",
    author,
    version,
    about = "Hyperspectral measurement acquisition and processing pipeline",
    long_about = "Opens persisted capture sessions or a (simulated) live camera, re-processes \n\
                  spectral cubes between modes using dark/white/distance references, and \n\
                  exports measurements to ENVI, TIFF, view images or session containers."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "CUBEPIPE_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "CUBEPIPE_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a blueprint-driven acquisition pipeline
    Run(RunArgs),

    /// Validate a blueprint file without running
    Validate(ValidateArgs),

    /// Display blueprint information
    Info(InfoArgs),

    /// Load a stored measurement and print its metadata
    Load(LoadArgs),

    /// Re-process a stored measurement through several modes
    Reprocess(ReprocessArgs),

    /// Export a stored measurement to ENVI/TIFF/view formats
    Export(ExportArgs),

    /// Re-process a stored measurement with a changed object distance
    Distance(DistanceArgs),

    /// Record single software-triggered images from a (simulated) camera
    Record(RecordArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to blueprint file (TOML or JSON)
    #[arg(short, long, default_value = "pipeline.toml", env = "CUBEPIPE_CONFIG")]
    pub config: PathBuf,

    /// Maximum number of measurements to process (0 = unlimited)
    #[arg(long, default_value = "0", env = "CUBEPIPE_MAX_FRAMES")]
    pub max_frames: u64,

    /// Pipeline timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "CUBEPIPE_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration and exit without running pipeline
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "CUBEPIPE_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to blueprint file to validate
    #[arg(short, long, default_value = "pipeline.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to blueprint file
    #[arg(short, long, default_value = "pipeline.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show exporter configuration
    #[arg(long)]
    pub exporters: bool,

    /// Show reference assignments
    #[arg(long)]
    pub references: bool,
}

/// Arguments for the `load` command
#[derive(Parser, Debug)]
pub struct LoadArgs {
    /// Session directory to open
    pub session: PathBuf,

    /// Measurement index within the session
    #[arg(long, default_value = "0")]
    pub index: usize,

    /// Enumerate reference items instead of frames
    #[arg(long)]
    pub references: bool,
}

/// Arguments for the `reprocess` command
#[derive(Parser, Debug)]
pub struct ReprocessArgs {
    /// Session holding the measurement to re-process
    pub session: PathBuf,

    /// Output directory (one session container per mode)
    pub out_dir: PathBuf,

    /// Session holding the dark reference
    #[arg(long)]
    pub dark: Option<PathBuf>,

    /// Session holding the white reference
    #[arg(long)]
    pub white: Option<PathBuf>,

    /// Session holding the distance reference
    #[arg(long)]
    pub distance: Option<PathBuf>,

    /// Session holding the spectral-radiance reference
    #[arg(long)]
    pub sprad: Option<PathBuf>,
}

/// Arguments for the `export` command
#[derive(Parser, Debug)]
pub struct ExportArgs {
    /// Session holding the measurement to export
    pub session: PathBuf,

    /// Output directory (per-format subdirectories are created)
    pub out_dir: PathBuf,

    /// View plugin XML file
    #[arg(long)]
    pub plugin: Option<PathBuf>,
}

/// Arguments for the `distance` command
#[derive(Parser, Debug)]
pub struct DistanceArgs {
    /// Session holding the measurement
    pub session: PathBuf,

    /// New object distance in millimetres
    pub distance_mm: f64,

    /// Output directory
    pub out_dir: PathBuf,
}

/// Arguments for the `record` command
#[derive(Parser, Debug)]
pub struct RecordArgs {
    /// Recording output directory
    pub out_dir: PathBuf,

    /// Exposure / integration time in milliseconds
    #[arg(long, default_value = "100.0")]
    pub exposure: f64,

    /// Number of images to record
    #[arg(long, default_value = "10")]
    pub count: u32,

    /// Per-capture wait in milliseconds
    #[arg(long, default_value = "500")]
    pub capture_timeout: u64,

    /// Calibration directory for the simulated camera
    #[arg(long, conflicts_with = "session")]
    pub calibration: Option<PathBuf>,

    /// Replay this session instead of simulating a camera
    #[arg(long)]
    pub session: Option<PathBuf>,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn record_session_conflicts_with_calibration() {
        let result = Cli::try_parse_from([
            "cubepipe",
            "record",
            "out",
            "--session",
            "a",
            "--calibration",
            "b",
        ]);
        assert!(result.is_err());
    }
}
