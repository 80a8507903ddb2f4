//! `export` command implementation: ENVI, TIFF variants and view output.

use anyhow::Result;
use tracing::info;

use contracts::{ProcessingMode, SessionItemType};
use exporters::{
    EnviExporter, Exporter, GeneralExportSettings, TiffCompression, TiffExportSettings,
    TiffExporter, TiffLayout, ViewExportSettings, ViewExporter,
};

use crate::cli::ExportArgs;
use crate::commands::load_measurement;

/// Execute the `export` command
pub fn run_export(args: &ExportArgs) -> Result<()> {
    let mut measurement = load_measurement(&args.session, 0, SessionItemType::Frames)?;

    if measurement.processing_mode() == ProcessingMode::Preview {
        anyhow::bail!(
            "Wrong processing mode: {:?} measurements cannot be exported",
            measurement.processing_mode()
        );
    }

    info!(mesu = %measurement.name(), "Export to ENVI...");
    let mut envi = EnviExporter::new(GeneralExportSettings::with_export_dir(
        args.out_dir.join("envi"),
    ));
    envi.apply(&mut measurement)?;

    info!("Export to multi-channel TIFF...");
    let mut multi = TiffExporter::new(TiffExportSettings {
        general: GeneralExportSettings::with_export_dir(args.out_dir.join("multi")),
        compression: TiffCompression::None,
        format: TiffLayout::MultiChannel,
    });
    multi.apply(&mut measurement)?;

    info!("Export to separate TIFFs...");
    let mut single = TiffExporter::new(TiffExportSettings {
        general: GeneralExportSettings::with_export_dir(args.out_dir.join("single")),
        compression: TiffCompression::None,
        format: TiffLayout::Single,
    });
    single.apply(&mut measurement)?;

    if let Some(plugin) = &args.plugin {
        info!(plugin = %plugin.display(), "Export view to file...");
        let mut view = ViewExporter::new(ViewExportSettings {
            general: GeneralExportSettings::with_export_dir(args.out_dir.join("view")),
            userplugin: plugin.display().to_string(),
        })?;
        view.apply(&mut measurement)?;
    }

    println!("finished.");
    Ok(())
}
