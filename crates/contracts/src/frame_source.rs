//! FrameSource trait - measurement stream abstraction
//!
//! Defines a unified interface for frame producers, decoupling the
//! acquisition context from concrete camera implementations. Simulated
//! cameras and session-replay cameras are handled identically.

use std::sync::Arc;

use crate::Measurement;

/// Frame callback type
///
/// When a camera produces a frame, it sends the [`Measurement`] through this
/// callback. Uses `Arc` to allow callback sharing across multiple contexts.
pub type FrameCallback = Arc<dyn Fn(Measurement) + Send + Sync>;

/// Measurement stream trait
///
/// Abstracts the common streaming behavior of camera implementations. The
/// acquisition context drives any `FrameSource` the same way.
///
/// # Example
///
/// ```ignore
/// let camera: Box<dyn FrameSource> = build_camera();
/// camera.listen(Arc::new(|measurement| {
///     println!("frame: {}", measurement.name());
/// }));
/// // ... consume frames ...
/// camera.stop();
/// ```
pub trait FrameSource: Send + Sync {
    /// Stable identifier of this source (used for logging)
    fn source_id(&self) -> &str;

    /// Register the frame callback and start streaming
    ///
    /// Repeated calls while already listening are idempotent (the second
    /// callback is not registered).
    fn listen(&self, callback: FrameCallback);

    /// Stop streaming
    fn stop(&self);

    /// Check if currently streaming
    fn is_listening(&self) -> bool;
}
