//! # Acquisition
//!
//! Live capture: the [`Camera`] control trait, a simulated camera, session
//! replay, and the [`AcquisitionContext`] that represents camera hardware to
//! callers (state polling, capture handles with bounded waits, and the
//! continuous-mode measurement queue).
//!
//! # Example
//!
//! ```ignore
//! let ctx = AcquisitionContext::simulated(SimulatedCameraConfig::default());
//!
//! while ctx.state() == HardwareState::Offline {
//!     std::thread::sleep(Duration::from_secs(1));
//! }
//!
//! ctx.set_operation_mode(OperationMode::Software);
//! ctx.set_integration_time_ms(100.0);
//!
//! let handle = ctx.capture();
//! if let Some(mesu) = handle.get(Duration::from_millis(500)).measurement {
//!     // process / export
//! }
//! ```

mod camera;
mod context;
mod handle;
mod replay;
mod simulated;

pub use camera::Camera;
pub use context::{AcquisitionContext, DEFAULT_QUEUE_SIZE};
pub use handle::{CaptureHandle, CaptureResult};
pub use replay::{ReplayOptions, SessionCamera};
pub use simulated::{SimulatedCamera, SimulatedCameraConfig};
