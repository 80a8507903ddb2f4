//! # Exporters
//!
//! One-way, configuration-driven serialization of measurements: ENVI image
//! pairs, TIFF in three layouts, rendered RGB views, and session (cube)
//! recording. Constructing settings or exporters writes nothing; all output
//! happens inside [`Exporter::apply`].

mod cube;
mod envi;
mod factory;
mod pan;
mod settings;
mod tiff;
mod view;

pub use cube::CubeExporter;
pub use envi::EnviExporter;
pub use factory::{build_exporter, ExporterStack};
pub use settings::{
    ChannelSelection, GeneralExportSettings, PanAlgorithm, PanInterpolation, SaveArgs,
    TiffCompression, TiffExportSettings, TiffLayout, ViewExportSettings,
};
pub use tiff::TiffExporter;
pub use view::ViewExporter;

use contracts::{Measurement, Result};

/// One-shot side-effecting serialization of a measurement.
///
/// `apply` writes the measurement to the configured output path. It fails
/// with [`contracts::PipelineError::ExportWrite`] on IO failure and
/// [`contracts::PipelineError::UnsupportedMode`] when the measurement's
/// current processing mode cannot be serialized (Preview, unless the
/// settings are permissive).
pub trait Exporter: Send {
    /// Exporter name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Write the measurement to the configured output path
    fn apply(&mut self, measurement: &mut Measurement) -> Result<()>;
}
