//! CLI command implementations.

mod distance;
mod export;
mod info;
mod load;
mod record;
mod reprocess;
mod run;
mod validate;

pub use distance::run_distance;
pub use export::run_export;
pub use info::run_info;
pub use load::run_load;
pub use record::run_record;
pub use reprocess::run_reprocess;
pub use run::run_pipeline;
pub use validate::run_validate;

use anyhow::{Context, Result};
use contracts::{Measurement, SessionItemType};
use session_store::SessionReader;
use std::path::Path;

/// Open a session and load one measurement (shared by the workflow commands).
pub(crate) fn load_measurement(
    session: &Path,
    index: usize,
    item_type: SessionItemType,
) -> Result<Measurement> {
    let reader = SessionReader::open(session)
        .with_context(|| format!("Failed to open session at {}", session.display()))?;
    reader
        .get_measurement(index, item_type)
        .with_context(|| format!("Failed to load measurement {index} from {}", session.display()))
}

/// First reference item of a session, falling back to the first frame.
pub(crate) fn load_reference_measurement(session: &Path) -> Result<Measurement> {
    let reader = SessionReader::open(session)
        .with_context(|| format!("Failed to open session at {}", session.display()))?;
    if reader.size(SessionItemType::References) > 0 {
        load_measurement(session, 0, SessionItemType::References)
    } else {
        load_measurement(session, 0, SessionItemType::Frames)
    }
}
