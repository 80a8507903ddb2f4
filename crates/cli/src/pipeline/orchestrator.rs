//! Pipeline orchestrator: blueprint -> acquisition + processing + exporters
//! + worker, plus the drain loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use acquisition::{AcquisitionContext, ReplayOptions, SimulatedCameraConfig};
use contracts::{
    HardwareState, Measurement, PipelineBlueprint, ReferenceEntry, SessionInfo,
    SessionItemType, SourceConfig,
};
use exporters::ExporterStack;
use processing::ProcessingContext;
use session_store::SessionReader;
use worker::{Worker, WorkerSettings};

use crate::error::CliError;
use crate::pipeline::PipelineStats;

/// How long to wait for the camera before giving up.
const ONLINE_WAIT: Duration = Duration::from_secs(30);

/// Pipeline run configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub blueprint: PipelineBlueprint,
    /// Stop after this many processed measurements (None = unlimited)
    pub max_frames: Option<u64>,
    /// Stop after this wall time (None = no timeout)
    pub timeout: Option<Duration>,
    /// Prometheus port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Blueprint-driven pipeline
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run the pipeline to completion (max frames, timeout, or source
    /// exhaustion via timeout).
    pub async fn run(self) -> Result<PipelineStats> {
        if let Some(port) = self.config.metrics_port {
            if let Err(e) = observability::init_metrics_only(port) {
                warn!(port, error = %e, "metrics endpoint not started");
            }
        }

        // Everything below is blocking (camera threads, condvar queues)
        tokio::task::spawn_blocking(move || run_blocking(self.config))
            .await
            .context("pipeline task panicked")?
    }
}

fn run_blocking(config: PipelineConfig) -> Result<PipelineStats> {
    let blueprint = config.blueprint;

    let acquisition = Arc::new(build_acquisition(&blueprint)?);
    wait_until_online(&acquisition)?;
    log_components(&acquisition);
    apply_acquisition_settings(&acquisition, &blueprint);

    let processing = Arc::new(build_processing(&blueprint)?);

    let stack = ExporterStack::from_configs(&blueprint.exporters)?;
    let active_exporters = stack.len();

    let mut worker = Worker::new(WorkerSettings {
        poll_interval: Duration::from_millis(blueprint.worker.poll_interval_ms.max(1)),
        soft_limit: blueprint.worker.soft_limit,
        hard_limit: blueprint.worker.hard_limit,
        can_drop: blueprint.worker.can_drop,
    });
    worker.set_acquisition_context(Arc::clone(&acquisition));
    worker.set_processing_context(Arc::clone(&processing));
    if !stack.is_empty() {
        worker.set_exporter(Box::new(stack));
    }
    worker.start().map_err(|e| CliError::pipeline_execution(e.to_string()))?;

    acquisition.set_continuous(true);
    info!(
        exporters = active_exporters,
        mode = ?blueprint.processing.mode,
        "pipeline running"
    );

    let stats = drain_loop(&acquisition, &worker, config.max_frames, config.timeout);

    acquisition.set_continuous(false);
    worker.stop();

    let mut stats = stats;
    stats.active_exporters = active_exporters;
    stats.frames_dropped = worker.metrics().dropped_count() + acquisition.queue_dropped();
    stats.failures = worker.metrics().failure_count();

    Ok(stats)
}

/// Drain worker results until a stop condition fires.
fn drain_loop(
    acquisition: &AcquisitionContext,
    worker: &Worker,
    max_frames: Option<u64>,
    timeout: Option<Duration>,
) -> PipelineStats {
    let started = Instant::now();
    let mut stats = PipelineStats::default();

    loop {
        if let Some(max) = max_frames {
            if stats.frames_processed >= max {
                info!(frames = stats.frames_processed, "frame limit reached");
                break;
            }
        }
        if let Some(timeout) = timeout {
            if started.elapsed() >= timeout {
                info!(elapsed = ?started.elapsed(), "timeout reached");
                break;
            }
        }

        // Poll-then-wait: never block without a positive check first
        if worker.has_next_result() {
            let wait_start = Instant::now();
            if let Some(measurement) = worker.get_next_result(Duration::from_millis(100)) {
                stats
                    .drain_latency_ms
                    .record(wait_start.elapsed().as_secs_f64() * 1000.0);
                stats.frames_processed += 1;
                stats.queue_peak = stats.queue_peak.max(worker.queue_used());

                debug!(
                    mesu = %measurement.name(),
                    sequence_no = measurement.metadata.session.sequence_no,
                    "result drained"
                );
                observability::record_frame_processed();
                observability::record_queue_depth("worker", worker.queue_used());
                observability::record_queue_depth("acquisition", acquisition.queue_used());

                if worker.is_falling_behind() {
                    warn!("worker queue past soft limit, drain loop cannot keep up");
                }
                if acquisition.queue_used() >= acquisition.queue_size() {
                    warn!("acquisition queue full, worker cannot keep up");
                }

                // Eagerly release the cube before the next iteration
                drop(measurement);
            }
        } else {
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    stats.duration = started.elapsed();
    stats
}

/// Build the acquisition context from the blueprint source.
fn build_acquisition(blueprint: &PipelineBlueprint) -> Result<AcquisitionContext> {
    let context = match &blueprint.source {
        SourceConfig::Session {
            path,
            loop_playback,
        } => {
            let reader = SessionReader::open(path)
                .map_err(|e| CliError::session_open(path.display().to_string(), e.to_string()))?;
            info!(
                session = reader.name(),
                frames = reader.size(SessionItemType::Frames),
                "replaying session as camera"
            );
            AcquisitionContext::from_session(
                reader,
                ReplayOptions {
                    loop_playback: *loop_playback,
                    fps_override: Some(blueprint.acquisition.fps),
                },
            )
        }
        SourceConfig::Simulated {
            width,
            height,
            channels,
            wavelength_start_nm,
            wavelength_step_nm,
            warmup_ms,
        } => AcquisitionContext::simulated(SimulatedCameraConfig {
            width: *width,
            height: *height,
            channels: *channels,
            wavelength_start_nm: *wavelength_start_nm,
            wavelength_step_nm: *wavelength_step_nm,
            warmup: Duration::from_millis(*warmup_ms),
            ..Default::default()
        }),
    };
    Ok(context)
}

/// Push blueprint capture parameters into the context.
fn apply_acquisition_settings(context: &AcquisitionContext, blueprint: &PipelineBlueprint) {
    let settings = &blueprint.acquisition;
    context.set_integration_time_ms(settings.integration_time_ms);
    context.set_fps(settings.fps);
    context.set_operation_mode(settings.operation_mode);
    context.set_average(settings.average);
    context.set_auto_exposure(settings.auto_exposure);
    context.set_queue_size(settings.queue_size);
    context.set_session_info(SessionInfo {
        name: "pipeline".to_string(),
        session_no: 0,
        sequence_no: 0,
    });
}

/// Build the processing context and load configured references.
fn build_processing(blueprint: &PipelineBlueprint) -> Result<ProcessingContext> {
    let mut context = ProcessingContext::new();
    let settings = &blueprint.processing;

    context.set_processing_mode(settings.mode);
    context.set_allow_recalib(settings.allow_recalib);
    if let Some(distance) = settings.distance_mm {
        context
            .calc_distance(distance)
            .map_err(|e| CliError::pipeline_execution(e.to_string()))?;
    }

    for reference in &settings.references {
        let measurement = load_reference(reference)?;
        info!(kind = ?reference.kind, name = %measurement.name(), "reference loaded");
        context
            .set_reference(measurement, reference.kind)
            .map_err(|e| CliError::pipeline_execution(e.to_string()))?;
    }

    Ok(context)
}

/// First reference item of the session, falling back to the first frame.
fn load_reference(entry: &ReferenceEntry) -> Result<Measurement> {
    let reader = SessionReader::open(&entry.path).map_err(|e| {
        CliError::session_open(entry.path.display().to_string(), e.to_string())
    })?;
    let measurement = if reader.size(SessionItemType::References) > 0 {
        reader.get_measurement(0, SessionItemType::References)
    } else {
        reader.get_measurement(0, SessionItemType::Frames)
    }
    .map_err(|e| CliError::session_open(entry.path.display().to_string(), e.to_string()))?;
    Ok(measurement)
}

/// Busy-poll the hardware state until Online (bounded).
fn wait_until_online(context: &AcquisitionContext) -> Result<()> {
    let started = Instant::now();
    while context.state() != HardwareState::Online {
        if started.elapsed() >= ONLINE_WAIT {
            return Err(CliError::CameraOffline {
                waited_secs: ONLINE_WAIT.as_secs(),
            }
            .into());
        }
        debug!(state = ?context.state(), "waiting for camera");
        std::thread::sleep(Duration::from_millis(200));
    }
    info!("camera is online");
    Ok(())
}

fn log_components(context: &AcquisitionContext) {
    for index in 0..context.component_count() {
        if let Ok(info) = context.component_info(index) {
            info!(
                component = index,
                name = %info.display_name,
                online = context.component_online(index),
                sensor_info = %info.sensor_info,
                "component"
            );
        }
    }
}
