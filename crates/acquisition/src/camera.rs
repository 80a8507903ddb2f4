//! Camera abstraction
//!
//! Defines the control trait for camera hardware, supporting simulated
//! implementations and session replay behind a unified interface. The data
//! plane (frame streaming) comes from [`FrameSource`]; this trait adds the
//! hardware-state machine and capture parameters.

use contracts::{ComponentInfo, FrameSource, HardwareState, OperationMode, Result};

/// Camera control trait
///
/// All setters take `&self`: implementations keep their parameters behind
/// interior mutability so a camera can be shared with its background
/// streaming thread.
pub trait Camera: FrameSource {
    /// Aggregate hardware readiness (polled by callers)
    fn state(&self) -> HardwareState;

    /// Enumerate hardware components
    fn components(&self) -> Vec<ComponentInfo>;

    /// Online flag of one component
    fn component_online(&self, index: usize) -> bool;

    /// Exposure per frame, milliseconds
    fn integration_time_ms(&self) -> f64;
    fn set_integration_time_ms(&self, value_ms: f64);

    /// Target frame rate in continuous mode
    fn fps(&self) -> f64;
    fn set_fps(&self, fps: f64);

    /// Trigger source
    fn operation_mode(&self) -> OperationMode;
    fn set_operation_mode(&self, mode: OperationMode);

    /// Sensor frames averaged per measurement
    fn average(&self) -> u32;
    fn set_average(&self, count: u32);

    /// Let the camera pick the exposure
    fn auto_exposure(&self) -> bool;
    fn set_auto_exposure(&self, enabled: bool);

    /// Request one frame through the registered callback (software trigger).
    ///
    /// # Errors
    /// [`contracts::PipelineError::CameraNotReady`] when the camera is not
    /// streaming or the operation mode does not accept software triggers.
    fn trigger(&self) -> Result<()>;
}
