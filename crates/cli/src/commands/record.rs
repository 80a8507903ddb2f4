//! `record` command implementation: software-triggered single captures.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::info;

use acquisition::{AcquisitionContext, ReplayOptions, SimulatedCameraConfig};
use contracts::{CaptureStatus, HardwareState, OperationMode};
use exporters::{CubeExporter, Exporter, GeneralExportSettings, SaveArgs};
use processing::ProcessingContext;
use session_store::{Calibration, SessionReader};

use crate::cli::RecordArgs;

/// How long to wait for the camera before giving up.
const ONLINE_WAIT: Duration = Duration::from_secs(30);

/// Execute the `record` command
pub fn run_record(args: &RecordArgs) -> Result<()> {
    let context = build_context(args)?;
    let processing = ProcessingContext::new();

    let mut exporter = CubeExporter::new(SaveArgs {
        general: GeneralExportSettings::with_export_dir(&args.out_dir),
        allow_overwrite: true,
        allow_session_file: true,
        ..Default::default()
    });

    info!("Waiting for camera to come online...");
    let started = Instant::now();
    while context.state() == HardwareState::Offline
        || context.state() == HardwareState::PartiallyOnline
    {
        if started.elapsed() >= ONLINE_WAIT {
            anyhow::bail!("Camera did not come online within {}s", ONLINE_WAIT.as_secs());
        }
        std::thread::sleep(Duration::from_secs(1));
    }
    println!("Camera is online");

    for index in 0..context.component_count() {
        let info = context.component_info(index)?;
        println!(
            "Component #{index} {} is {}",
            info.display_name,
            if context.component_online(index) {
                "online"
            } else {
                "offline"
            }
        );
    }

    context.set_operation_mode(OperationMode::Software);
    context.set_integration_time_ms(args.exposure);

    println!("Start recording now");
    let timeout = Duration::from_millis(args.capture_timeout);
    let mut recorded = 0u32;

    for attempt in 1..=args.count {
        println!("Record image #{attempt}/{} ... (async)", args.count);
        let handle = context.capture();
        let result = handle.get(timeout);

        match (result.status, result.measurement) {
            (CaptureStatus::Done, Some(mut measurement)) => {
                if processing.is_capable(&measurement, processing.processing_args(), false) {
                    processing.apply(&mut measurement)?;
                }
                exporter.apply(&mut measurement)?;
                recorded += 1;
                println!("done");
                // Release cube memory before the next capture
                drop(measurement);
            }
            (status, _) => {
                // Soft failure; keep recording
                println!("failed ({status:?})");
            }
        }
    }

    println!("finished: {recorded}/{} images recorded.", args.count);
    Ok(())
}

fn build_context(args: &RecordArgs) -> Result<AcquisitionContext> {
    if let Some(session) = &args.session {
        let reader = SessionReader::open(session)
            .with_context(|| format!("Failed to open session at {}", session.display()))?;
        info!(session = reader.name(), "using session replay as camera");
        return Ok(AcquisitionContext::from_session(
            reader,
            ReplayOptions::default(),
        ));
    }

    if let Some(calibration_dir) = &args.calibration {
        let calibration = Calibration::from_path(calibration_dir)
            .with_context(|| format!("Failed to load calibration from {}", calibration_dir.display()))?;
        info!(id = %calibration.id, "using calibrated simulated camera");
        return Ok(AcquisitionContext::from_calibration(&calibration));
    }

    info!("using default simulated camera");
    Ok(AcquisitionContext::simulated(SimulatedCameraConfig::default()))
}
