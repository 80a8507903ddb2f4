//! CaptureHandle - bounded wait on an in-flight capture.

use std::sync::mpsc;
use std::time::Duration;

use contracts::{CaptureStatus, Measurement};

/// Outcome of waiting on a capture handle.
#[derive(Debug)]
pub struct CaptureResult {
    pub status: CaptureStatus,
    pub measurement: Option<Measurement>,
}

/// Handle to a capture started with
/// [`AcquisitionContext::capture`](crate::AcquisitionContext::capture).
///
/// The caller performs a single blocking wait with a timeout; an expired
/// timeout is a soft failure (absent measurement), never an error.
pub struct CaptureHandle {
    rx: Option<mpsc::Receiver<Measurement>>,
}

impl CaptureHandle {
    pub(crate) fn pending(rx: mpsc::Receiver<Measurement>) -> Self {
        Self { rx: Some(rx) }
    }

    /// Handle for a capture the hardware could not start (e.g. still warming
    /// up); `get` reports `Deferred`.
    pub(crate) fn deferred() -> Self {
        Self { rx: None }
    }

    /// Wait up to `timeout` for the capture to complete.
    ///
    /// - `Done` with the measurement on success
    /// - `Timeout` with no measurement when the hardware did not respond in
    ///   time
    /// - `Overwritten` when a newer capture displaced this one
    /// - `Deferred` when the capture never started
    pub fn get(self, timeout: Duration) -> CaptureResult {
        let Some(rx) = self.rx else {
            return CaptureResult {
                status: CaptureStatus::Deferred,
                measurement: None,
            };
        };

        match rx.recv_timeout(timeout) {
            Ok(measurement) => CaptureResult {
                status: CaptureStatus::Done,
                measurement: Some(measurement),
            },
            Err(mpsc::RecvTimeoutError::Timeout) => CaptureResult {
                status: CaptureStatus::Timeout,
                measurement: None,
            },
            Err(mpsc::RecvTimeoutError::Disconnected) => CaptureResult {
                status: CaptureStatus::Overwritten,
                measurement: None,
            },
        }
    }
}
