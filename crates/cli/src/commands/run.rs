//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading blueprint");

    if !args.config.exists() {
        anyhow::bail!("Blueprint file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load blueprint from {}", args.config.display()))?;

    info!(
        mode = ?blueprint.processing.mode,
        exporters = blueprint.exporters.len(),
        references = blueprint.processing.references.len(),
        "Blueprint loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - blueprint is valid, exiting");
        print_blueprint_summary(&blueprint);
        return Ok(());
    }

    let pipeline_config = PipelineConfig {
        blueprint,
        max_frames: if args.max_frames == 0 {
            None
        } else {
            Some(args.max_frames)
        },
        timeout: if args.timeout == 0 {
            None
        } else {
            Some(Duration::from_secs(args.timeout))
        },
        metrics_port: if args.metrics_port == 0 {
            None
        } else {
            Some(args.metrics_port)
        },
    };

    let pipeline = Pipeline::new(pipeline_config);

    // Setup graceful shutdown handler
    let shutdown_signal = setup_shutdown_signal();

    info!("Starting pipeline...");

    tokio::select! {
        result = pipeline.run() => {
            match result {
                Ok(stats) => {
                    info!(
                        frames_processed = stats.frames_processed,
                        frames_dropped = stats.frames_dropped,
                        duration_secs = stats.duration.as_secs_f64(),
                        fps = format!("{:.2}", stats.fps()),
                        "Pipeline completed successfully"
                    );
                    stats.print_summary();
                }
                Err(e) => {
                    return Err(e).context("Pipeline execution failed");
                }
            }
        }
        _ = shutdown_signal => {
            warn!("Received shutdown signal, stopping pipeline...");
        }
    }

    info!("cubepipe finished");
    Ok(())
}

/// Setup Ctrl+C and SIGTERM signal handlers
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print blueprint summary for dry-run mode
fn print_blueprint_summary(blueprint: &contracts::PipelineBlueprint) {
    use contracts::SourceConfig;

    println!("\n=== Blueprint Summary ===\n");
    match &blueprint.source {
        SourceConfig::Session { path, loop_playback } => {
            println!("Source: session replay");
            println!("  Path: {}", path.display());
            println!("  Loop: {loop_playback}");
        }
        SourceConfig::Simulated {
            width,
            height,
            channels,
            ..
        } => {
            println!("Source: simulated camera");
            println!("  Cube: {width}x{height}x{channels}");
        }
    }

    println!("\nAcquisition:");
    println!(
        "  Integration time: {} ms",
        blueprint.acquisition.integration_time_ms
    );
    println!("  FPS: {}", blueprint.acquisition.fps);
    println!("  Operation mode: {:?}", blueprint.acquisition.operation_mode);
    println!("  Queue size: {}", blueprint.acquisition.queue_size);

    println!("\nProcessing:");
    println!("  Mode: {:?}", blueprint.processing.mode);
    for reference in &blueprint.processing.references {
        println!("  - {:?} from {}", reference.kind, reference.path.display());
    }

    if !blueprint.exporters.is_empty() {
        println!("\nExporters ({}):", blueprint.exporters.len());
        for exporter in &blueprint.exporters {
            println!(
                "  - {} ({:?}) -> {}",
                exporter.name,
                exporter.kind,
                exporter.export_dir.display()
            );
        }
    }

    println!();
}
