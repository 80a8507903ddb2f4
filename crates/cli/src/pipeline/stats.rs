//! Pipeline statistics and metrics.

use std::time::Duration;

use observability::{RunningStats, StatsSummary};

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Measurements fully processed and drained from the worker
    pub frames_processed: u64,

    /// Measurements dropped by bounded queues (acquisition + worker)
    pub frames_dropped: u64,

    /// Processing or export failures (non-fatal)
    pub failures: u64,

    /// Total duration of the pipeline run
    pub duration: Duration,

    /// Number of exporters that received data
    pub active_exporters: usize,

    /// Highest observed worker queue depth
    pub queue_peak: usize,

    /// Per-result drain latency (ms)
    pub drain_latency_ms: RunningStats,
}

impl PipelineStats {
    /// Measurements per second throughput
    pub fn fps(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.frames_processed as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Drop rate as percentage
    pub fn drop_rate(&self) -> f64 {
        let total = self.frames_processed + self.frames_dropped;
        if total > 0 {
            (self.frames_dropped as f64 / total as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Pipeline Statistics ===\n");
        println!("Duration:          {:.2}s", self.duration.as_secs_f64());
        println!("Frames processed:  {}", self.frames_processed);
        println!("Frames dropped:    {} ({:.2}%)", self.frames_dropped, self.drop_rate());
        println!("Failures:          {}", self.failures);
        println!("Throughput:        {:.2} fps", self.fps());
        println!("Active exporters:  {}", self.active_exporters);
        println!("Worker queue peak: {}", self.queue_peak);

        let StatsSummary {
            count,
            mean,
            min,
            max,
        } = self.drain_latency_ms.summary();
        if count > 0 {
            println!(
                "Drain latency:     mean {mean:.2}ms, min {min:.2}ms, max {max:.2}ms"
            );
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_and_drop_rate() {
        let stats = PipelineStats {
            frames_processed: 50,
            frames_dropped: 50,
            duration: Duration::from_secs(10),
            ..Default::default()
        };
        assert_eq!(stats.fps(), 5.0);
        assert_eq!(stats.drop_rate(), 50.0);

        let empty = PipelineStats::default();
        assert_eq!(empty.fps(), 0.0);
        assert_eq!(empty.drop_rate(), 0.0);
    }
}
