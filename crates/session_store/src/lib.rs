//! # Session Store
//!
//! Read/write access to persisted capture sessions.
//!
//! A session is a directory containing a `session.json` manifest plus, per
//! stored measurement, a metadata JSON file and one raw little-endian `f32`
//! file per image plane. Frames and reference measurements (dark, white, ...)
//! live in the same container and are enumerated separately.
//!
//! # Example
//!
//! ```no_run
//! use contracts::SessionItemType;
//! use session_store::SessionReader;
//!
//! let session = SessionReader::open("recordings/run1").unwrap();
//! let mesu = session.get_measurement(0, SessionItemType::Frames).unwrap();
//! println!("{} @ {} ms", mesu.name(), mesu.metadata.integration_time_ms);
//! ```

mod calibration;
mod format;
mod reader;
mod writer;

pub use calibration::{Calibration, CALIBRATION_FILE};
pub use format::{EntryKind, EntryRecord, PlaneRecord, SessionManifest, INFO_FILE, MANIFEST_FILE};
pub use reader::SessionReader;
pub use writer::{SessionWriter, SessionWriterOptions};
