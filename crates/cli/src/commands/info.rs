//! `info` command implementation.

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::InfoArgs;

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Reading blueprint");

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load blueprint from {}", args.config.display()))?;

    if args.json {
        println!("{}", config_loader::ConfigLoader::to_json(&blueprint)?);
        return Ok(());
    }

    println!("Blueprint: {}", args.config.display());
    println!("  Processing mode: {:?}", blueprint.processing.mode);
    println!("  Acquisition: {} ms @ {} fps ({:?} trigger)",
        blueprint.acquisition.integration_time_ms,
        blueprint.acquisition.fps,
        blueprint.acquisition.operation_mode,
    );
    println!(
        "  Worker limits: soft {}, hard {}",
        blueprint.worker.soft_limit, blueprint.worker.hard_limit
    );

    if args.references {
        println!("\nReferences ({}):", blueprint.processing.references.len());
        for reference in &blueprint.processing.references {
            println!("  - {:?}: {}", reference.kind, reference.path.display());
        }
    }

    if args.exporters {
        println!("\nExporters ({}):", blueprint.exporters.len());
        for exporter in &blueprint.exporters {
            println!(
                "  - {} ({:?}) -> {}",
                exporter.name,
                exporter.kind,
                exporter.export_dir.display()
            );
            for (key, value) in &exporter.params {
                println!("      {key} = {value}");
            }
        }
    }

    Ok(())
}
