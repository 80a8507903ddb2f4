//! `distance` command implementation: re-process with a changed distance.

use anyhow::{Context, Result};

use contracts::{ProcessingMode, SessionItemType};
use exporters::{CubeExporter, Exporter, GeneralExportSettings, SaveArgs};
use processing::ProcessingContext;
use session_store::SessionReader;

use crate::cli::DistanceArgs;
use crate::commands::load_measurement;

/// Execute the `distance` command
pub fn run_distance(args: &DistanceArgs) -> Result<()> {
    let reader = SessionReader::open(&args.session)
        .with_context(|| format!("Failed to open session at {}", args.session.display()))?;
    let mut measurement = load_measurement(&args.session, 0, SessionItemType::Frames)?;

    println!(
        "Measurement {} t={}ms mode={:?}",
        measurement.name(),
        measurement.metadata.integration_time_ms,
        measurement.processing_mode()
    );

    let mut context =
        ProcessingContext::from_session(&reader).context("Failed to build processing context")?;
    context
        .calc_distance(args.distance_mm)
        .context("Invalid distance")?;
    context.set_processing_mode(ProcessingMode::Raw);

    if !context.is_capable(&measurement, context.processing_args(), false) {
        anyhow::bail!("Processing context is not capable of re-processing this measurement");
    }

    println!(
        "Original distance: {}",
        match measurement.metadata.distance_mm {
            Some(distance) => format!("{distance} mm"),
            None => "unset".to_string(),
        }
    );
    context.apply(&mut measurement)?;
    println!(
        "New distance: {} mm",
        measurement.metadata.distance_mm.unwrap_or_default()
    );

    println!("Saving...");
    let mut exporter = CubeExporter::new(SaveArgs {
        general: GeneralExportSettings::with_export_dir(&args.out_dir),
        allow_overwrite: true,
        ..Default::default()
    });
    exporter.apply(&mut measurement)?;

    println!("finished.");
    Ok(())
}
