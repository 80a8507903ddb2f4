//! Simulated camera implementation
//!
//! Implements [`Camera`] without any hardware: synthetic spectral cubes are
//! generated on a background thread (internal trigger) or per software
//! trigger. Used for development, testing and the blueprint `simulated`
//! source.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, trace};

use contracts::{
    ComponentInfo, ComponentType, DataValue, FrameCallback, FrameSource, HardwareState,
    ImageBuffer, Measurement, MeasurementMetadata, OperationMode, PipelineError, Result,
    SampleFormat, SensorInfo,
};
use session_store::Calibration;

use crate::camera::Camera;

/// Simulated camera configuration
#[derive(Debug, Clone)]
pub struct SimulatedCameraConfig {
    /// Cube width (pixels)
    pub width: u32,
    /// Cube height (pixels)
    pub height: u32,
    /// Spectral channels
    pub channels: u32,
    /// First channel center wavelength (nm)
    pub wavelength_start_nm: u32,
    /// Channel spacing (nm)
    pub wavelength_step_nm: u32,
    /// Boot time before the camera reports Online
    pub warmup: Duration,
    /// Photon noise amplitude (counts)
    pub noise_amplitude: f32,
}

impl Default for SimulatedCameraConfig {
    fn default() -> Self {
        Self {
            width: 64,
            height: 64,
            channels: 32,
            wavelength_start_nm: 450,
            wavelength_step_nm: 8,
            warmup: Duration::ZERO,
            noise_amplitude: 4.0,
        }
    }
}

/// Mutable capture parameters, shared with the pacing thread.
#[derive(Debug, Clone)]
struct Params {
    integration_time_ms: f64,
    fps: f64,
    operation_mode: OperationMode,
    average: u32,
    auto_exposure: bool,
}

struct Shared {
    config: SimulatedCameraConfig,
    params: Mutex<Params>,
    callback: Mutex<Option<FrameCallback>>,
    listening: AtomicBool,
    frame_counter: AtomicU64,
    booted_at: Instant,
    serial_number: String,
    product_name: String,
}

/// Simulated camera
///
/// Generates synthetic cubes: a spatial gradient plus a per-channel ramp,
/// scaled by the integration time, with uniform noise on top. Behaves like
/// real hardware from the caller's perspective: it warms up through
/// Offline/PartiallyOnline before reporting Online, paces frames at the
/// configured FPS in internal trigger mode, and answers software triggers.
pub struct SimulatedCamera {
    source_id: String,
    shared: Arc<Shared>,
}

impl SimulatedCamera {
    pub fn new(source_id: impl Into<String>, config: SimulatedCameraConfig) -> Self {
        Self::with_identity(source_id, config, "SIM-0001", "simulated-hsi")
    }

    fn with_identity(
        source_id: impl Into<String>,
        config: SimulatedCameraConfig,
        serial_number: &str,
        product_name: &str,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            shared: Arc::new(Shared {
                config,
                params: Mutex::new(Params {
                    integration_time_ms: 100.0,
                    fps: 2.0,
                    operation_mode: OperationMode::Software,
                    average: 1,
                    auto_exposure: false,
                }),
                callback: Mutex::new(None),
                listening: AtomicBool::new(false),
                frame_counter: AtomicU64::new(0),
                booted_at: Instant::now(),
                serial_number: serial_number.to_string(),
                product_name: product_name.to_string(),
            }),
        }
    }

    /// Create with default configuration
    pub fn with_defaults(source_id: impl Into<String>) -> Self {
        Self::new(source_id, SimulatedCameraConfig::default())
    }

    /// Create a camera matching a factory calibration's geometry
    pub fn from_calibration(calibration: &Calibration) -> Self {
        let step = match calibration.wavelengths_nm.as_slice() {
            [first, second, ..] => second.saturating_sub(*first),
            _ => 0,
        };
        let config = SimulatedCameraConfig {
            width: calibration.width,
            height: calibration.height,
            channels: calibration.channels,
            wavelength_start_nm: calibration.wavelengths_nm.first().copied().unwrap_or(450),
            wavelength_step_nm: step.max(1),
            ..SimulatedCameraConfig::default()
        };
        Self::with_identity(
            calibration.id.clone(),
            config,
            &calibration.serial_number,
            &calibration.product_name,
        )
    }

    fn generate_frame(shared: &Shared) -> Measurement {
        let params = shared.params.lock().unwrap().clone();
        let frame_id = shared.frame_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let config = &shared.config;

        let (w, h, c) = (config.width, config.height, config.channels);
        let scale = (params.integration_time_ms / 100.0) as f32;
        let mut rng = rand::rng();

        let mut data = Vec::with_capacity((w * h * c) as usize);
        for y in 0..h {
            for x in 0..w {
                // Spatial gradient so corrections have structure to work on
                let spatial = 200.0 * (x as f32 / w.max(1) as f32)
                    + 120.0 * (y as f32 / h.max(1) as f32);
                for ch in 0..c {
                    let spectral = 900.0 + 35.0 * ch as f32;
                    let noise = if config.noise_amplitude > 0.0 {
                        rng.random_range(-config.noise_amplitude..config.noise_amplitude)
                    } else {
                        0.0
                    };
                    let counts = (spatial + spectral) * scale + noise;
                    data.push(counts.clamp(0.0, 65535.0));
                }
            }
        }

        let wavelengths = (0..c)
            .map(|ch| config.wavelength_start_nm + ch * config.wavelength_step_nm)
            .collect();

        let cube = ImageBuffer::new(w, h, c, SampleFormat::U16, data, Some(wavelengths))
            .expect("generated geometry is consistent by construction");

        let mut metadata =
            MeasurementMetadata::new(format!("frame_{frame_id:06}"), params.integration_time_ms);
        metadata.averages = params.average;
        metadata.serial_number = shared.serial_number.clone();
        metadata.product_name = shared.product_name.clone();

        let mut measurement = Measurement::with_cube(metadata, cube);
        measurement.insert_data(
            "sensor_info",
            DataValue::SensorInfo(SensorInfo {
                readout_time_ms: params.integration_time_ms.max(1.0) as u64,
                temperature_c: 32.5,
                gain: 1.0,
            }),
        );
        measurement
    }

    fn emit(shared: &Shared) {
        let callback = shared.callback.lock().unwrap().clone();
        if let Some(callback) = callback {
            let measurement = Self::generate_frame(shared);
            trace!(name = %measurement.name(), "simulated frame emitted");
            callback(measurement);
        }
    }
}

impl FrameSource for SimulatedCamera {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn listen(&self, callback: FrameCallback) {
        // Idempotent: if already listening, don't start again
        if self.shared.listening.swap(true, Ordering::SeqCst) {
            return;
        }
        *self.shared.callback.lock().unwrap() = Some(callback);

        let shared = Arc::clone(&self.shared);
        let source_id = self.source_id.clone();

        thread::spawn(move || {
            debug!(source_id = %source_id, "simulated camera started");

            while shared.listening.load(Ordering::Relaxed) {
                let (mode, fps) = {
                    let params = shared.params.lock().unwrap();
                    (params.operation_mode, params.fps)
                };

                // Only the internal trigger free-runs; software/external
                // triggers arrive through trigger()
                if mode == OperationMode::Internal && fps > 0.0 {
                    Self::emit(&shared);
                    thread::sleep(Duration::from_secs_f64(1.0 / fps));
                } else {
                    thread::sleep(Duration::from_millis(5));
                }
            }

            debug!(source_id = %source_id, "simulated camera stopped");
        });
    }

    fn stop(&self) {
        self.shared.listening.store(false, Ordering::SeqCst);
        *self.shared.callback.lock().unwrap() = None;
    }

    fn is_listening(&self) -> bool {
        self.shared.listening.load(Ordering::Relaxed)
    }
}

impl Camera for SimulatedCamera {
    fn state(&self) -> HardwareState {
        let elapsed = self.shared.booted_at.elapsed();
        let warmup = self.shared.config.warmup;
        if warmup.is_zero() || elapsed >= warmup {
            HardwareState::Online
        } else if elapsed >= warmup / 2 {
            HardwareState::PartiallyOnline
        } else {
            HardwareState::Offline
        }
    }

    fn components(&self) -> Vec<ComponentInfo> {
        vec![
            ComponentInfo {
                kind: ComponentType::ImageSensor,
                display_name: "simulated spectral sensor".to_string(),
                sensor_info: format!(
                    "{}x{}x{}",
                    self.shared.config.width, self.shared.config.height, self.shared.config.channels
                ),
                user_field: String::new(),
                pixel_format: "Mono16".to_string(),
            },
            ComponentInfo {
                kind: ComponentType::MiscSensor,
                display_name: "housing thermometer".to_string(),
                sensor_info: "temperature".to_string(),
                user_field: String::new(),
                pixel_format: String::new(),
            },
        ]
    }

    fn component_online(&self, index: usize) -> bool {
        match self.state() {
            HardwareState::Online => index < 2,
            // Warm-up brings the image sensor up first
            HardwareState::PartiallyOnline => index == 0,
            HardwareState::Offline => false,
        }
    }

    fn integration_time_ms(&self) -> f64 {
        self.shared.params.lock().unwrap().integration_time_ms
    }

    fn set_integration_time_ms(&self, value_ms: f64) {
        self.shared.params.lock().unwrap().integration_time_ms = value_ms.max(0.001);
    }

    fn fps(&self) -> f64 {
        self.shared.params.lock().unwrap().fps
    }

    fn set_fps(&self, fps: f64) {
        self.shared.params.lock().unwrap().fps = fps.max(0.0);
    }

    fn operation_mode(&self) -> OperationMode {
        self.shared.params.lock().unwrap().operation_mode
    }

    fn set_operation_mode(&self, mode: OperationMode) {
        self.shared.params.lock().unwrap().operation_mode = mode;
    }

    fn average(&self) -> u32 {
        self.shared.params.lock().unwrap().average
    }

    fn set_average(&self, count: u32) {
        self.shared.params.lock().unwrap().average = count.max(1);
    }

    fn auto_exposure(&self) -> bool {
        self.shared.params.lock().unwrap().auto_exposure
    }

    fn set_auto_exposure(&self, enabled: bool) {
        self.shared.params.lock().unwrap().auto_exposure = enabled;
    }

    fn trigger(&self) -> Result<()> {
        if self.state() != HardwareState::Online {
            return Err(PipelineError::CameraNotReady { state: self.state() });
        }
        if !self.is_listening() {
            return Err(PipelineError::CameraNotReady {
                state: HardwareState::Offline,
            });
        }
        let mode = self.operation_mode();
        if mode == OperationMode::External {
            // External trigger line: software triggers are ignored; the
            // frame arrives if and when the line fires
            return Ok(());
        }
        Self::emit(&self.shared);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;

    #[test]
    fn software_trigger_emits_one_frame() {
        let camera = SimulatedCamera::with_defaults("sim");
        let count = Arc::new(AtomicU64::new(0));
        let count_clone = Arc::clone(&count);

        camera.listen(Arc::new(move |m| {
            assert!(m.cube().is_some());
            count_clone.fetch_add(1, Ordering::Relaxed);
        }));

        camera.trigger().unwrap();
        camera.trigger().unwrap();
        camera.stop();

        assert_eq!(count.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn trigger_without_listen_fails() {
        let camera = SimulatedCamera::with_defaults("sim");
        assert!(camera.trigger().is_err());
    }

    #[test]
    fn internal_mode_paces_frames() {
        let camera = SimulatedCamera::with_defaults("sim");
        camera.set_operation_mode(OperationMode::Internal);
        camera.set_fps(100.0);

        let count = Arc::new(AtomicU64::new(0));
        let count_clone = Arc::clone(&count);
        camera.listen(Arc::new(move |_| {
            count_clone.fetch_add(1, Ordering::Relaxed);
        }));

        thread::sleep(Duration::from_millis(80));
        camera.stop();

        assert!(count.load(Ordering::Relaxed) > 0);
        assert!(!camera.is_listening());
    }

    #[test]
    fn warmup_walks_through_states() {
        let camera = SimulatedCamera::new(
            "sim",
            SimulatedCameraConfig {
                warmup: Duration::from_millis(60),
                ..Default::default()
            },
        );

        assert_eq!(camera.state(), HardwareState::Offline);
        assert!(!camera.component_online(0));

        thread::sleep(Duration::from_millis(35));
        assert_eq!(camera.state(), HardwareState::PartiallyOnline);
        assert!(camera.component_online(0));
        assert!(!camera.component_online(1));

        thread::sleep(Duration::from_millis(40));
        assert_eq!(camera.state(), HardwareState::Online);
        assert!(camera.component_online(1));
    }

    #[test]
    fn integration_time_scales_counts() {
        let camera = SimulatedCamera::new(
            "sim",
            SimulatedCameraConfig {
                noise_amplitude: 0.0,
                width: 4,
                height: 4,
                channels: 2,
                ..Default::default()
            },
        );
        camera.set_integration_time_ms(100.0);

        let frames = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&frames);
        camera.listen(Arc::new(move |m| sink.lock().unwrap().push(m)));

        camera.trigger().unwrap();
        camera.set_integration_time_ms(200.0);
        camera.trigger().unwrap();
        camera.stop();

        let frames = frames.lock().unwrap();
        let first = frames[0].cube().unwrap().at(0, 0, 0);
        let second = frames[1].cube().unwrap().at(0, 0, 0);
        assert!((second - 2.0 * first).abs() < 1.0);
    }
}
