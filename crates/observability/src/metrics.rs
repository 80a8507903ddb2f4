//! Pipeline metrics collection.
//!
//! Thin helpers over the `metrics` facade, plus a small running-statistics
//! accumulator for end-of-run summaries.

use metrics::{counter, gauge, histogram};

/// Record a completed capture attempt.
pub fn record_capture(latency_ms: f64, ok: bool) {
    counter!("cubepipe_captures_total").increment(1);
    if !ok {
        counter!("cubepipe_capture_timeouts_total").increment(1);
    }
    histogram!("cubepipe_capture_latency_ms").record(latency_ms);
}

/// Record a measurement that finished the processing stage.
pub fn record_frame_processed() {
    counter!("cubepipe_frames_processed_total").increment(1);
}

/// Record an exporter write.
pub fn record_export(exporter: &str, ok: bool) {
    if ok {
        counter!("cubepipe_exports_total", "exporter" => exporter.to_string()).increment(1);
    } else {
        counter!("cubepipe_export_failures_total", "exporter" => exporter.to_string())
            .increment(1);
    }
}

/// Record a queue depth sample.
pub fn record_queue_depth(queue: &'static str, depth: usize) {
    gauge!("cubepipe_queue_depth", "queue" => queue).set(depth as f64);
}

/// Record dropped measurements (acquisition or worker queue overflow).
pub fn record_dropped(queue: &'static str, count: u64) {
    if count > 0 {
        counter!("cubepipe_dropped_total", "queue" => queue).increment(count);
    }
}

/// Running min/mean/max accumulator (no allocation, merge-free).
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn record(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    pub fn summary(&self) -> StatsSummary {
        StatsSummary {
            count: self.count,
            mean: self.mean(),
            min: if self.count == 0 { 0.0 } else { self.min },
            max: if self.count == 0 { 0.0 } else { self.max },
        }
    }
}

/// Snapshot of a [`RunningStats`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_stats_track_extremes() {
        let mut stats = RunningStats::default();
        assert_eq!(stats.summary().count, 0);
        assert_eq!(stats.mean(), 0.0);

        stats.record(10.0);
        stats.record(30.0);
        stats.record(20.0);

        let summary = stats.summary();
        assert_eq!(summary.count, 3);
        assert_eq!(summary.mean, 20.0);
        assert_eq!(summary.min, 10.0);
        assert_eq!(summary.max, 30.0);
    }
}
