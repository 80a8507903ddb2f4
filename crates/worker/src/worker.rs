//! Worker - background acquire/process/export loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use metrics::{counter, gauge};
use tracing::{debug, error, info, warn};

use acquisition::AcquisitionContext;
use contracts::{BoundedQueue, Measurement, PipelineError, Result};
use exporters::Exporter;
use processing::ProcessingContext;

use crate::metrics::WorkerMetrics;

/// Worker configuration
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Idle poll interval while the acquisition queue is empty
    pub poll_interval: Duration,
    /// Result queue depth at which the consumer is considered falling behind
    pub soft_limit: usize,
    /// Result queue capacity; pushes past it drop the oldest result
    pub hard_limit: usize,
    /// Permit dropping past the hard limit (otherwise the loop stalls until
    /// the consumer catches up)
    pub can_drop: bool,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            soft_limit: 20,
            hard_limit: 100,
            can_drop: true,
        }
    }
}

/// Background worker chaining acquisition, processing and export.
///
/// Contexts are assigned before [`start`](Self::start); results are drained
/// with [`has_next_result`](Self::has_next_result) /
/// [`get_next_result`](Self::get_next_result).
pub struct Worker {
    settings: WorkerSettings,
    acquisition: Option<Arc<AcquisitionContext>>,
    processing: Option<Arc<ProcessingContext>>,
    exporter: Option<Box<dyn Exporter + Send>>,
    results: Arc<BoundedQueue<Measurement>>,
    metrics: Arc<WorkerMetrics>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn new(settings: WorkerSettings) -> Self {
        let results = Arc::new(BoundedQueue::new(settings.hard_limit));
        Self {
            settings,
            acquisition: None,
            processing: None,
            exporter: None,
            results,
            metrics: Arc::new(WorkerMetrics::new()),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    pub fn set_acquisition_context(&mut self, context: Arc<AcquisitionContext>) {
        self.acquisition = Some(context);
    }

    pub fn set_processing_context(&mut self, context: Arc<ProcessingContext>) {
        self.processing = Some(context);
    }

    pub fn set_exporter(&mut self, exporter: Box<dyn Exporter + Send>) {
        self.exporter = Some(exporter);
    }

    /// Spawn the worker loop.
    ///
    /// # Errors
    /// Configuration error when no acquisition context was assigned or the
    /// worker is already running.
    pub fn start(&mut self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(PipelineError::config_validation(
                "worker",
                "worker is already running",
            ));
        }
        let Some(acquisition) = self.acquisition.clone() else {
            self.running.store(false, Ordering::SeqCst);
            return Err(PipelineError::config_validation(
                "worker",
                "acquisition context not set",
            ));
        };

        let processing = self.processing.clone();
        let mut exporter = self.exporter.take();
        let results = Arc::clone(&self.results);
        let metrics = Arc::clone(&self.metrics);
        let running = Arc::clone(&self.running);
        let settings = self.settings.clone();

        let handle = thread::spawn(move || {
            info!("worker started");

            while running.load(Ordering::Relaxed) {
                // Never block on the acquisition queue without a positive
                // poll first; a blocking wait here would stall the producer
                // checks
                if !acquisition.has_next_measurement() {
                    thread::sleep(settings.poll_interval);
                    continue;
                }
                let Some(mut measurement) =
                    acquisition.get_next_measurement(settings.poll_interval)
                else {
                    continue;
                };

                process_one(
                    &mut measurement,
                    processing.as_deref(),
                    exporter.as_deref_mut(),
                    &metrics,
                );

                // Respect the hard limit: stall or drop, per settings
                if !settings.can_drop {
                    while results.len() >= settings.hard_limit
                        && running.load(Ordering::Relaxed)
                    {
                        thread::sleep(settings.poll_interval);
                    }
                }
                if !results.push(measurement) {
                    metrics.inc_dropped_count();
                    counter!("cubepipe_worker_results_dropped_total").increment(1);
                    warn!("result queue full, oldest result dropped");
                }

                metrics.set_queue_len(results.len());
                metrics.inc_processed_count();
                counter!("cubepipe_worker_frames_total").increment(1);
                gauge!("cubepipe_worker_queue_depth").set(results.len() as f64);
            }

            info!("worker stopped");
        });

        self.handle = Some(handle);
        Ok(())
    }

    /// Stop the loop and wait for it to finish.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("worker thread panicked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Non-blocking check for a finished result.
    pub fn has_next_result(&self) -> bool {
        !self.results.is_empty()
    }

    /// Pop the next finished result, waiting up to `timeout`.
    pub fn get_next_result(&self, timeout: Duration) -> Option<Measurement> {
        let result = self.results.pop_timeout(timeout);
        self.metrics.set_queue_len(self.results.len());
        result
    }

    pub fn queue_used(&self) -> usize {
        self.results.len()
    }

    /// `(soft_limit, hard_limit)`
    pub fn queue_limits(&self) -> (usize, usize) {
        (self.settings.soft_limit, self.settings.hard_limit)
    }

    pub fn set_queue_limits(&mut self, soft_limit: usize, hard_limit: usize) {
        self.settings.soft_limit = soft_limit;
        self.settings.hard_limit = hard_limit;
        self.results.set_capacity(hard_limit);
    }

    /// Consumer falling-behind indicator.
    pub fn is_falling_behind(&self) -> bool {
        self.results.len() >= self.settings.soft_limit
    }

    pub fn metrics(&self) -> &Arc<WorkerMetrics> {
        &self.metrics
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Process and export a single measurement; failures are counted, not fatal.
fn process_one(
    measurement: &mut Measurement,
    processing: Option<&ProcessingContext>,
    exporter: Option<&mut (dyn Exporter + Send + '_)>,
    metrics: &WorkerMetrics,
) {
    if let Some(processing) = processing {
        if processing.is_capable(measurement, processing.processing_args(), false) {
            if let Err(e) = processing.apply(measurement) {
                metrics.inc_failure_count();
                error!(mesu = %measurement.name(), error = %e, "processing failed");
            }
        } else {
            debug!(
                mesu = %measurement.name(),
                mode = ?processing.processing_mode(),
                "skipping processing, context not capable"
            );
        }
    }

    if let Some(exporter) = exporter {
        if let Err(e) = exporter.apply(measurement) {
            metrics.inc_failure_count();
            counter!("cubepipe_worker_export_failures_total").increment(1);
            error!(
                mesu = %measurement.name(),
                exporter = exporter.name(),
                error = %e,
                "export failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acquisition::SimulatedCameraConfig;
    use contracts::{OperationMode, SessionItemType};
    use exporters::{CubeExporter, GeneralExportSettings, SaveArgs};
    use session_store::SessionReader;
    use tempfile::tempdir;

    fn running_acquisition() -> Arc<AcquisitionContext> {
        let ctx = AcquisitionContext::simulated(SimulatedCameraConfig {
            width: 4,
            height: 4,
            channels: 2,
            ..Default::default()
        });
        ctx.set_operation_mode(OperationMode::Internal);
        ctx.set_fps(100.0);
        ctx.set_continuous(true);
        Arc::new(ctx)
    }

    fn drain(worker: &Worker, want: usize, within: Duration) -> Vec<Measurement> {
        let deadline = std::time::Instant::now() + within;
        let mut out = Vec::new();
        while out.len() < want && std::time::Instant::now() < deadline {
            if worker.has_next_result() {
                if let Some(m) = worker.get_next_result(Duration::from_millis(50)) {
                    out.push(m);
                }
            } else {
                thread::sleep(Duration::from_millis(1));
            }
        }
        out
    }

    #[test]
    fn start_requires_acquisition_context() {
        let mut worker = Worker::new(WorkerSettings::default());
        assert!(worker.start().is_err());
        assert!(!worker.is_running());
    }

    #[test]
    fn worker_yields_results() {
        let mut worker = Worker::new(WorkerSettings::default());
        worker.set_acquisition_context(running_acquisition());
        worker.start().unwrap();

        let results = drain(&worker, 3, Duration::from_secs(3));
        worker.stop();

        assert_eq!(results.len(), 3);
        assert!(results[0].cube().is_some());
        assert!(worker.metrics().processed_count() >= 3);
    }

    #[test]
    fn worker_exports_along_the_way() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("rec");

        let mut worker = Worker::new(WorkerSettings::default());
        worker.set_acquisition_context(running_acquisition());
        worker.set_exporter(Box::new(CubeExporter::new(SaveArgs {
            general: GeneralExportSettings::with_export_dir(&out),
            allow_overwrite: true,
            ..Default::default()
        })));
        worker.start().unwrap();

        let results = drain(&worker, 2, Duration::from_secs(3));
        worker.stop();
        assert_eq!(results.len(), 2);

        let reader = SessionReader::open(&out).unwrap();
        assert!(reader.size(SessionItemType::Frames) >= 2);
    }

    #[test]
    fn hard_limit_drops_oldest_when_consumer_stalls() {
        let mut worker = Worker::new(WorkerSettings {
            hard_limit: 2,
            soft_limit: 1,
            can_drop: true,
            ..Default::default()
        });
        worker.set_acquisition_context(running_acquisition());
        worker.start().unwrap();

        // Nobody drains; queue must stay bounded
        thread::sleep(Duration::from_millis(300));
        assert!(worker.queue_used() <= 2);
        assert!(worker.metrics().dropped_count() > 0);
        assert!(worker.is_falling_behind());

        worker.stop();
    }

    #[test]
    fn double_start_is_refused() {
        let mut worker = Worker::new(WorkerSettings::default());
        worker.set_acquisition_context(running_acquisition());
        worker.start().unwrap();
        assert!(worker.start().is_err());
        worker.stop();
    }
}
