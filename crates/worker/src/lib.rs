//! # Worker
//!
//! Background chain: poll the acquisition context, apply the processing
//! context when capable, apply the exporter, queue the result. Callers drain
//! results with the same poll-then-wait discipline the acquisition queue
//! uses. Failures in a single measurement are logged and counted, never
//! fatal to the loop.

mod metrics;
mod worker;

pub use metrics::{MetricsSnapshot, WorkerMetrics};
pub use worker::{Worker, WorkerSettings};
