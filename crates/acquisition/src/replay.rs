//! Session replay camera
//!
//! Implements [`Camera`] on top of a stored session, so recorded data drives
//! the same acquisition workflows as live hardware ("simulate" mode in the
//! workflow commands). Frames are replayed in stored order, paced by the
//! configured FPS in internal trigger mode.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use contracts::{
    ComponentInfo, ComponentType, FrameCallback, FrameSource, HardwareState, Measurement,
    OperationMode, PipelineError, Result, SessionItemType,
};
use session_store::SessionReader;

use crate::camera::Camera;

/// Replay configuration
#[derive(Debug, Clone, Default)]
pub struct ReplayOptions {
    /// Restart from the first frame after the last one
    pub loop_playback: bool,
    /// Override the recording's own frame rate
    pub fps_override: Option<f64>,
}

struct Shared {
    reader: SessionReader,
    options: ReplayOptions,
    cursor: AtomicUsize,
    listening: AtomicBool,
    callback: Mutex<Option<FrameCallback>>,
    fps: Mutex<f64>,
    operation_mode: Mutex<OperationMode>,
    integration_time_ms: Mutex<f64>,
    average: Mutex<u32>,
    auto_exposure: AtomicBool,
}

/// Camera backed by a stored session.
pub struct SessionCamera {
    source_id: String,
    shared: Arc<Shared>,
}

impl SessionCamera {
    pub fn new(reader: SessionReader, options: ReplayOptions) -> Self {
        let fps = options
            .fps_override
            .unwrap_or_else(|| reader.fps())
            .max(0.0);
        let source_id = format!("replay:{}", reader.name());
        let operation_mode = reader.operation_mode();

        Self {
            source_id,
            shared: Arc::new(Shared {
                reader,
                options,
                cursor: AtomicUsize::new(0),
                listening: AtomicBool::new(false),
                callback: Mutex::new(None),
                fps: Mutex::new(fps),
                operation_mode: Mutex::new(operation_mode),
                integration_time_ms: Mutex::new(100.0),
                average: Mutex::new(1),
                auto_exposure: AtomicBool::new(false),
            }),
        }
    }

    /// Advance the cursor and load the next stored frame.
    ///
    /// Returns `None` once the session is exhausted and looping is off.
    fn next_frame(shared: &Shared) -> Option<Measurement> {
        let total = shared.reader.size(SessionItemType::Frames);
        if total == 0 {
            return None;
        }

        let index = shared.cursor.fetch_add(1, Ordering::SeqCst);
        let index = if shared.options.loop_playback {
            index % total
        } else if index >= total {
            return None;
        } else {
            index
        };

        match shared.reader.get_measurement(index, SessionItemType::Frames) {
            Ok(measurement) => Some(measurement),
            Err(e) => {
                warn!(index, error = %e, "failed to load replay frame");
                None
            }
        }
    }

    fn emit(shared: &Shared) -> bool {
        let callback = shared.callback.lock().unwrap().clone();
        let Some(callback) = callback else {
            return false;
        };
        match Self::next_frame(shared) {
            Some(measurement) => {
                callback(measurement);
                true
            }
            None => false,
        }
    }
}

impl FrameSource for SessionCamera {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn listen(&self, callback: FrameCallback) {
        if self.shared.listening.swap(true, Ordering::SeqCst) {
            return;
        }
        *self.shared.callback.lock().unwrap() = Some(callback);

        let shared = Arc::clone(&self.shared);
        let source_id = self.source_id.clone();

        thread::spawn(move || {
            debug!(source_id = %source_id, "replay started");

            while shared.listening.load(Ordering::Relaxed) {
                let mode = *shared.operation_mode.lock().unwrap();
                let fps = *shared.fps.lock().unwrap();

                if mode == OperationMode::Internal && fps > 0.0 {
                    if !Self::emit(&shared) && !shared.options.loop_playback {
                        debug!(source_id = %source_id, "replay exhausted");
                        break;
                    }
                    thread::sleep(Duration::from_secs_f64(1.0 / fps));
                } else {
                    thread::sleep(Duration::from_millis(5));
                }
            }

            shared.listening.store(false, Ordering::SeqCst);
            debug!(source_id = %source_id, "replay stopped");
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

impl Camera for SessionCamera {
    fn state(&self) -> HardwareState {
        // Stored data is always ready
        HardwareState::Online
    }

    fn components(&self) -> Vec<ComponentInfo> {
        vec![ComponentInfo {
            kind: ComponentType::ImageSensor,
            display_name: format!("session '{}'", self.shared.reader.name()),
            sensor_info: format!(
                "{} stored frames",
                self.shared.reader.size(SessionItemType::Frames)
            ),
            user_field: String::new(),
            pixel_format: "f32".to_string(),
        }]
    }

    fn component_online(&self, index: usize) -> bool {
        index == 0
    }

    fn integration_time_ms(&self) -> f64 {
        *self.shared.integration_time_ms.lock().unwrap()
    }

    fn set_integration_time_ms(&self, value_ms: f64) {
        // Recorded exposures cannot change; remembered for symmetry only
        *self.shared.integration_time_ms.lock().unwrap() = value_ms;
    }

    fn fps(&self) -> f64 {
        *self.shared.fps.lock().unwrap()
    }

    fn set_fps(&self, fps: f64) {
        *self.shared.fps.lock().unwrap() = fps.max(0.0);
    }

    fn operation_mode(&self) -> OperationMode {
        *self.shared.operation_mode.lock().unwrap()
    }

    fn set_operation_mode(&self, mode: OperationMode) {
        *self.shared.operation_mode.lock().unwrap() = mode;
    }

    fn average(&self) -> u32 {
        *self.shared.average.lock().unwrap()
    }

    fn set_average(&self, count: u32) {
        *self.shared.average.lock().unwrap() = count.max(1);
    }

    fn auto_exposure(&self) -> bool {
        self.shared.auto_exposure.load(Ordering::Relaxed)
    }

    fn set_auto_exposure(&self, enabled: bool) {
        self.shared.auto_exposure.store(enabled, Ordering::Relaxed);
    }

    fn trigger(&self) -> Result<()> {
        if !self.is_listening() {
            return Err(PipelineError::CameraNotReady {
                state: HardwareState::Offline,
            });
        }
        Self::emit(&self.shared);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ImageBuffer, MeasurementMetadata, SampleFormat};
    use session_store::{EntryKind, SessionWriter, SessionWriterOptions};
    use std::sync::atomic::AtomicU64;
    use tempfile::tempdir;

    fn recorded_session(frames: usize) -> (tempfile::TempDir, SessionReader) {
        let dir = tempdir().unwrap();
        let mut writer = SessionWriter::create(
            dir.path().join("run"),
            SessionWriterOptions {
                name: "run".into(),
                fps: 50.0,
                operation_mode: OperationMode::Internal,
                ..Default::default()
            },
        )
        .unwrap();

        for i in 0..frames {
            let cube =
                ImageBuffer::new(2, 2, 1, SampleFormat::U16, vec![i as f32; 4], None).unwrap();
            let mesu = contracts::Measurement::with_cube(
                MeasurementMetadata::new(format!("f{i}"), 100.0),
                cube,
            );
            writer.append(&mesu, EntryKind::Frame).unwrap();
        }

        let reader = SessionReader::open(dir.path().join("run")).unwrap();
        (dir, reader)
    }

    #[test]
    fn trigger_walks_stored_frames_in_order() {
        let (_dir, reader) = recorded_session(3);
        let camera = SessionCamera::new(reader, ReplayOptions::default());

        let names = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&names);
        camera.listen(Arc::new(move |m| sink.lock().unwrap().push(m.name().to_string())));

        for _ in 0..5 {
            camera.trigger().unwrap();
        }
        camera.stop();

        // Exhausted after 3; extra triggers produce nothing
        assert_eq!(*names.lock().unwrap(), vec!["f0", "f1", "f2"]);
    }

    #[test]
    fn internal_mode_streams_and_stops_at_end() {
        let (_dir, reader) = recorded_session(4);
        let camera = SessionCamera::new(reader, ReplayOptions::default());
        camera.set_operation_mode(OperationMode::Internal);

        let count = Arc::new(AtomicU64::new(0));
        let sink = Arc::clone(&count);
        camera.listen(Arc::new(move |_| {
            sink.fetch_add(1, Ordering::Relaxed);
        }));

        // 4 frames at 50 fps take ~80ms
        thread::sleep(Duration::from_millis(300));
        assert_eq!(count.load(Ordering::Relaxed), 4);
        assert!(!camera.is_listening());
    }

    #[test]
    fn loop_playback_wraps_around() {
        let (_dir, reader) = recorded_session(2);
        let camera = SessionCamera::new(
            reader,
            ReplayOptions {
                loop_playback: true,
                ..Default::default()
            },
        );

        let names = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&names);
        camera.listen(Arc::new(move |m| sink.lock().unwrap().push(m.name().to_string())));

        for _ in 0..4 {
            camera.trigger().unwrap();
        }
        camera.stop();

        assert_eq!(*names.lock().unwrap(), vec!["f0", "f1", "f0", "f1"]);
    }
}
