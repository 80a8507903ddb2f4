//! AcquisitionContext - live capture orchestration.
//!
//! Wraps a [`Camera`] and routes its frames either to a pending capture
//! handle (software-triggered single captures) or into the bounded
//! continuous-mode queue that callers drain with
//! `has_next_measurement` / `get_next_measurement`.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use tracing::{debug, instrument, trace, warn};

use contracts::{
    BoundedQueue, CaptureStatus, ComponentInfo, HardwareState, Measurement, OperationMode,
    PipelineError, Result, SessionInfo,
};
use session_store::{Calibration, SessionReader};

use crate::camera::Camera;
use crate::handle::{CaptureHandle, CaptureResult};
use crate::replay::{ReplayOptions, SessionCamera};
use crate::simulated::{SimulatedCamera, SimulatedCameraConfig};

/// Default capacity of the continuous-mode measurement queue.
pub const DEFAULT_QUEUE_SIZE: usize = 10;

/// Frame routing state shared with the camera callback.
struct Router {
    queue: Arc<BoundedQueue<Measurement>>,
    continuous: AtomicBool,
    pending: Mutex<Option<mpsc::Sender<Measurement>>>,
    session_info: Mutex<SessionInfo>,
    sequence: AtomicU32,
}

impl Router {
    fn route(&self, mut measurement: Measurement) {
        // Stamp the context's session identity and a monotonic sequence
        {
            let info = self.session_info.lock().unwrap();
            measurement.metadata.session = SessionInfo {
                name: info.name.clone(),
                session_no: info.session_no,
                sequence_no: self.sequence.fetch_add(1, Ordering::SeqCst),
            };
        }

        // A pending single capture takes priority over the continuous queue
        if let Some(tx) = self.pending.lock().unwrap().take() {
            if tx.send(measurement).is_ok() {
                return;
            }
            // Receiver vanished (handle dropped); nothing to deliver to
            return;
        }

        if self.continuous.load(Ordering::Relaxed) {
            if !self.queue.push(measurement) {
                trace!("continuous queue full, oldest measurement dropped");
            }
        }
        // Frames outside continuous mode with no pending capture are discarded
    }
}

/// Represents the live camera: hardware state polling, capture parameters,
/// and the two acquisition paths (single capture handles, continuous queue).
pub struct AcquisitionContext {
    camera: Box<dyn Camera>,
    router: Arc<Router>,
}

impl AcquisitionContext {
    /// Wrap an arbitrary camera.
    pub fn from_camera(camera: Box<dyn Camera>, queue_size: usize) -> Self {
        let router = Arc::new(Router {
            queue: Arc::new(BoundedQueue::new(queue_size)),
            continuous: AtomicBool::new(false),
            pending: Mutex::new(None),
            session_info: Mutex::new(SessionInfo::default()),
            sequence: AtomicU32::new(0),
        });

        let callback_router = Arc::clone(&router);
        camera.listen(Arc::new(move |measurement| {
            callback_router.route(measurement);
        }));

        debug!(source = %camera.source_id(), queue_size, "acquisition context created");

        Self { camera, router }
    }

    /// Simulated camera matching a factory calibration.
    pub fn from_calibration(calibration: &Calibration) -> Self {
        let camera = SimulatedCamera::from_calibration(calibration);
        Self::from_camera(Box::new(camera), DEFAULT_QUEUE_SIZE)
    }

    /// Simulated camera with explicit configuration.
    pub fn simulated(config: SimulatedCameraConfig) -> Self {
        let camera = SimulatedCamera::new("simulated", config);
        Self::from_camera(Box::new(camera), DEFAULT_QUEUE_SIZE)
    }

    /// Replay a stored session as if it were live hardware.
    pub fn from_session(reader: SessionReader, options: ReplayOptions) -> Self {
        let camera = SessionCamera::new(reader, options);
        Self::from_camera(Box::new(camera), DEFAULT_QUEUE_SIZE)
    }

    // ===== Hardware state =====

    /// Poll the aggregate hardware state.
    pub fn state(&self) -> HardwareState {
        self.camera.state()
    }

    pub fn component_count(&self) -> usize {
        self.camera.components().len()
    }

    pub fn component_info(&self, index: usize) -> Result<ComponentInfo> {
        let components = self.camera.components();
        let len = components.len();
        components
            .into_iter()
            .nth(index)
            .ok_or(PipelineError::IndexOutOfRange { index, len })
    }

    pub fn component_online(&self, index: usize) -> bool {
        self.camera.component_online(index)
    }

    // ===== Capture parameters =====

    pub fn integration_time_ms(&self) -> f64 {
        self.camera.integration_time_ms()
    }

    pub fn set_integration_time_ms(&self, value_ms: f64) {
        self.camera.set_integration_time_ms(value_ms);
    }

    pub fn fps(&self) -> f64 {
        self.camera.fps()
    }

    pub fn set_fps(&self, fps: f64) {
        self.camera.set_fps(fps);
    }

    pub fn operation_mode(&self) -> OperationMode {
        self.camera.operation_mode()
    }

    pub fn set_operation_mode(&self, mode: OperationMode) {
        self.camera.set_operation_mode(mode);
    }

    pub fn average(&self) -> u32 {
        self.camera.average()
    }

    pub fn set_average(&self, count: u32) {
        self.camera.set_average(count);
    }

    pub fn auto_exposure(&self) -> bool {
        self.camera.auto_exposure()
    }

    pub fn set_auto_exposure(&self, enabled: bool) {
        self.camera.set_auto_exposure(enabled);
    }

    /// Session identity stamped onto every produced measurement.
    pub fn set_session_info(&self, info: SessionInfo) {
        *self.router.session_info.lock().unwrap() = info;
    }

    pub fn session_info(&self) -> SessionInfo {
        self.router.session_info.lock().unwrap().clone()
    }

    // ===== Single captures =====

    /// Start a capture without blocking.
    ///
    /// The returned handle is waited on once with a timeout. When the
    /// hardware is not online the capture never starts and the handle
    /// reports [`CaptureStatus::Deferred`]. Starting a new capture while one
    /// is pending displaces the old one (its handle reports `Overwritten`).
    #[instrument(name = "acquisition_capture", skip(self))]
    pub fn capture(&self) -> CaptureHandle {
        if self.camera.state() != HardwareState::Online {
            debug!(state = ?self.camera.state(), "capture deferred, hardware not online");
            return CaptureHandle::deferred();
        }

        let (tx, rx) = mpsc::channel();
        // Dropping a previous pending sender disconnects its handle
        *self.router.pending.lock().unwrap() = Some(tx);

        if let Err(e) = self.camera.trigger() {
            warn!(error = %e, "software trigger failed");
            *self.router.pending.lock().unwrap() = None;
            return CaptureHandle::deferred();
        }

        CaptureHandle::pending(rx)
    }

    /// Synchronous capture convenience: trigger and wait.
    ///
    /// # Errors
    /// [`PipelineError::CaptureTimeout`] when no measurement arrived in time.
    pub fn capture_at(&self, timeout: Duration) -> Result<Measurement> {
        let CaptureResult {
            status,
            measurement,
        } = self.capture().get(timeout);
        match (status, measurement) {
            (CaptureStatus::Done, Some(measurement)) => Ok(measurement),
            _ => Err(PipelineError::CaptureTimeout {
                timeout_ms: timeout.as_millis() as u64,
            }),
        }
    }

    // ===== Continuous mode =====

    /// Enable or disable continuous acquisition.
    ///
    /// While disabled, frames produced by the camera are discarded instead of
    /// queued.
    pub fn set_continuous(&self, enabled: bool) {
        debug!(enabled, "continuous mode");
        self.router.continuous.store(enabled, Ordering::SeqCst);
        if !enabled {
            self.router.queue.clear();
        }
    }

    pub fn continuous(&self) -> bool {
        self.router.continuous.load(Ordering::Relaxed)
    }

    /// Non-blocking check for a queued measurement.
    ///
    /// Callers poll this before `get_next_measurement` so the blocking call
    /// cannot stall the producer.
    pub fn has_next_measurement(&self) -> bool {
        !self.router.queue.is_empty()
    }

    /// Pop the next queued measurement, waiting up to `timeout`.
    ///
    /// A `None` return is a soft timeout; the loop continues.
    pub fn get_next_measurement(&self, timeout: Duration) -> Option<Measurement> {
        self.router.queue.pop_timeout(timeout)
    }

    // ===== Queue surface =====

    pub fn queue_size(&self) -> usize {
        self.router.queue.capacity()
    }

    pub fn set_queue_size(&self, size: usize) {
        self.router.queue.set_capacity(size);
    }

    pub fn queue_used(&self) -> usize {
        self.router.queue.len()
    }

    pub fn queue_dropped(&self) -> u64 {
        self.router.queue.dropped_count()
    }
}

impl Drop for AcquisitionContext {
    fn drop(&mut self) {
        self.camera.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn context_with(config: SimulatedCameraConfig) -> AcquisitionContext {
        AcquisitionContext::simulated(config)
    }

    fn fast_sim() -> SimulatedCameraConfig {
        SimulatedCameraConfig {
            width: 4,
            height: 4,
            channels: 2,
            ..Default::default()
        }
    }

    #[test]
    fn capture_completes_with_measurement() {
        let ctx = context_with(fast_sim());
        ctx.set_operation_mode(OperationMode::Software);

        let handle = ctx.capture();
        let result = handle.get(Duration::from_millis(500));

        assert_eq!(result.status, CaptureStatus::Done);
        let mesu = result.measurement.unwrap();
        assert!(mesu.cube().is_some());
        assert_eq!(mesu.metadata.session.sequence_no, 0);

        // Sequence numbers are monotonic
        let second = ctx.capture().get(Duration::from_millis(500));
        assert_eq!(second.measurement.unwrap().metadata.session.sequence_no, 1);
    }

    #[test]
    fn capture_times_out_softly_against_unresponsive_hardware() {
        let ctx = context_with(fast_sim());
        // External trigger line that never fires
        ctx.set_operation_mode(OperationMode::External);

        let handle = ctx.capture();
        let result = handle.get(Duration::from_millis(30));

        assert_eq!(result.status, CaptureStatus::Timeout);
        assert!(result.measurement.is_none());
    }

    #[test]
    fn capture_deferred_while_warming_up() {
        let ctx = context_with(SimulatedCameraConfig {
            warmup: Duration::from_secs(5),
            ..fast_sim()
        });

        let result = ctx.capture().get(Duration::from_millis(10));
        assert_eq!(result.status, CaptureStatus::Deferred);
        assert!(result.measurement.is_none());
    }

    #[test]
    fn newer_capture_overwrites_pending_one() {
        let ctx = context_with(fast_sim());
        ctx.set_operation_mode(OperationMode::External);

        let first = ctx.capture();
        let _second = ctx.capture();

        let result = first.get(Duration::from_millis(20));
        assert_eq!(result.status, CaptureStatus::Overwritten);
    }

    #[test]
    fn continuous_mode_fills_queue() {
        let ctx = context_with(fast_sim());
        ctx.set_operation_mode(OperationMode::Internal);
        ctx.set_fps(200.0);
        ctx.set_continuous(true);

        // The polling discipline: only pop after a positive has_next check
        let mut received = 0;
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while received < 3 && std::time::Instant::now() < deadline {
            if ctx.has_next_measurement() {
                let mesu = ctx.get_next_measurement(Duration::from_millis(100));
                assert!(mesu.is_some());
                received += 1;
            } else {
                thread::sleep(Duration::from_millis(1));
            }
        }
        ctx.set_continuous(false);

        assert_eq!(received, 3);
    }

    #[test]
    fn frames_are_discarded_outside_continuous_mode() {
        let ctx = context_with(fast_sim());
        ctx.set_operation_mode(OperationMode::Internal);
        ctx.set_fps(200.0);

        thread::sleep(Duration::from_millis(50));
        assert!(!ctx.has_next_measurement());
        assert!(ctx.get_next_measurement(Duration::from_millis(5)).is_none());
    }

    #[test]
    fn queue_surface_reports_capacity_and_usage() {
        let ctx = context_with(fast_sim());
        assert_eq!(ctx.queue_size(), DEFAULT_QUEUE_SIZE);

        ctx.set_queue_size(3);
        assert_eq!(ctx.queue_size(), 3);
        assert_eq!(ctx.queue_used(), 0);
    }

    #[test]
    fn session_info_is_stamped() {
        let ctx = context_with(fast_sim());
        ctx.set_session_info(SessionInfo {
            name: "video".into(),
            session_no: 7,
            sequence_no: 0,
        });

        let mesu = ctx.capture_at(Duration::from_millis(500)).unwrap();
        assert_eq!(mesu.metadata.session.name, "video");
        assert_eq!(mesu.metadata.session.session_no, 7);
    }
}
