//! `reprocess` command implementation: walk a measurement through modes.

use anyhow::{Context, Result};
use tracing::info;

use contracts::{ProcessingMode, ReferenceType, SessionItemType};
use exporters::{CubeExporter, Exporter, GeneralExportSettings, SaveArgs};
use processing::{ProcessingArgs, ProcessingContext};
use session_store::SessionReader;

use crate::cli::ReprocessArgs;
use crate::commands::{load_measurement, load_reference_measurement};

const MODES: [ProcessingMode; 4] = [
    ProcessingMode::Raw,
    ProcessingMode::DarkSubtract,
    ProcessingMode::Reflectance,
    ProcessingMode::SpectralRadiance,
];

/// Execute the `reprocess` command
pub fn run_reprocess(args: &ReprocessArgs) -> Result<()> {
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

    let assignments = [
        (&args.dark, ReferenceType::Dark),
        (&args.white, ReferenceType::White),
        (&args.distance, ReferenceType::Distance),
        (&args.sprad, ReferenceType::SpRad),
    ];
    for (path, kind) in assignments {
        if let Some(path) = path {
            let reference = load_reference_measurement(path)?;
            info!(kind = ?kind, name = %reference.name(), "reference set");
            context
                .set_reference(reference, kind)
                .with_context(|| format!("Failed to set {kind:?} reference"))?;
        }
    }

    for mode in MODES {
        let proc_args = ProcessingArgs {
            processing_mode: mode,
            allow_recalib: false,
        };

        if !context.is_capable(&measurement, proc_args, false) {
            println!("Cannot process to {mode:?} mode!");
            continue;
        }

        println!("Processing to mode {mode:?}...");
        context.set_processing_args(proc_args);
        context.apply(&mut measurement)?;
        measurement.set_name(format!("{mode:?}"));

        let mut exporter = CubeExporter::new(SaveArgs {
            general: GeneralExportSettings::with_export_dir(
                args.out_dir.join(format!("{mode:?}")),
            ),
            allow_overwrite: true,
            allow_session_file: true,
            allow_info_file: false,
            ..Default::default()
        });
        exporter.apply(&mut measurement)?;
    }

    println!("finished.");
    Ok(())
}
