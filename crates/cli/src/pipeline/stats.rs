//! Stream statistics.

use std::time::Duration;

use observability::CaptureMetricsAggregator;

/// Statistics from a stream run
#[derive(Debug, Clone, Default)]
pub struct StreamStats {
    /// Captures handed to the consumer
    pub captures: u64,

    /// Total duration of the stream
    pub duration: Duration,

    /// Capture metrics aggregator
    pub metrics: CaptureMetricsAggregator,
}

impl StreamStats {
    /// Captures per second over the whole run
    pub fn fps(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.captures as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!();
        println!("Duration: {:.2}s", self.duration.as_secs_f64());
        println!("Capture rate: {:.2}/s", self.fps());
        println!("{}", self.metrics.summary());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fps() {
        let stats = StreamStats {
            captures: 60,
            duration: Duration::from_secs(2),
            ..Default::default()
        };
        assert!((stats.fps() - 30.0).abs() < 1e-9);

        let empty = StreamStats::default();
        assert_eq!(empty.fps(), 0.0);
    }
}
