//! # Contracts
//!
//! Frozen interface contracts (ICD), defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Data Model
//! - A [`Measurement`] owns named data planes (the spectral cube, preview views,
//!   GPS fixes, sensor info) plus capture metadata.
//! - [`ImageBuffer`] is a dense `(x, y, channel)` sample volume with an optional
//!   per-channel wavelength table.
//! - Processing, acquisition and export stages communicate through the
//!   mode/reference/state enums and the unified [`PipelineError`].

mod blueprint;
mod cube;
mod error;
mod frame_source;
mod measurement;
mod modes;
mod queue;

pub use blueprint::*;
pub use cube::*;
pub use error::*;
pub use frame_source::{FrameCallback, FrameSource};
pub use measurement::*;
pub use modes::*;
pub use queue::BoundedQueue;
