//! Metric helpers for the capture pipeline.
//!
//! Translates synchronizer counters and per-capture observations into
//! Prometheus series, and aggregates them in memory for end-of-run
//! summaries.

use capture_sync::SyncStats;
use contracts::Modality;
use metrics::{counter, gauge, histogram};

/// Record a synchronizer counter snapshot.
///
/// Call after each capture (or on a timer); gauges are set to the
/// current totals so the exporter always reflects the latest snapshot.
///
/// # Example
///
/// ```ignore
/// use observability::metrics::record_sync_stats;
///
/// let capture = session.get_capture(None)?;
/// if let Some(stats) = session.sync_stats() {
///     record_sync_stats(&stats);
/// }
/// ```
pub fn record_sync_stats(stats: &SyncStats) {
    gauge!("depth_sync_captures_matched").set(stats.matched_captures as f64);
    gauge!("depth_sync_captures_partial").set(stats.partial_captures as f64);
    gauge!("depth_sync_frames_dropped").set(stats.dropped_frames as f64);
    gauge!("depth_sync_queue_overflows").set(stats.queue_overflows as f64);
    gauge!("depth_sync_frames_out_of_order").set(stats.out_of_order_frames as f64);
    gauge!("depth_sync_frames_pending").set(stats.pending_frames as f64);
}

/// Record one frame arriving from a capture backend.
pub fn record_frame_received(modality: Modality) {
    counter!(
        "depth_frames_received_total",
        "modality" => modality.to_string()
    )
    .increment(1);
}

/// Record one capture handed to the consumer.
pub fn record_capture_emitted(complete: bool) {
    let status = if complete { "complete" } else { "partial" };
    counter!(
        "depth_captures_emitted_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record the wall-clock spacing between consecutive captures.
pub fn record_capture_interval_ms(interval_ms: f64) {
    histogram!("depth_capture_interval_ms").record(interval_ms);
}

/// Capture metrics aggregator.
///
/// Accumulates synchronizer snapshots and capture pacing in
/// memory so a run can print a summary on shutdown.
#[derive(Debug, Clone, Default)]
pub struct CaptureMetricsAggregator {
    /// Captures observed by the aggregator
    pub total_captures: u64,

    /// Captures missing at least one expected frame
    pub partial_captures: u64,

    /// Latest synchronizer counter snapshot
    pub last_stats: SyncStats,

    /// Capture interval statistics (milliseconds)
    pub interval_stats: RunningStats,
}

impl CaptureMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in one capture observation.
    pub fn update(&mut self, complete: bool, interval_ms: f64, stats: &SyncStats) {
        self.total_captures += 1;
        if !complete {
            self.partial_captures += 1;
        }
        self.interval_stats.push(interval_ms);
        self.last_stats = stats.clone();
    }

    /// Generate a summary report.
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_captures: self.total_captures,
            partial_captures: self.partial_captures,
            partial_rate: if self.total_captures > 0 {
                self.partial_captures as f64 / self.total_captures as f64 * 100.0
            } else {
                0.0
            },
            dropped_frames: self.last_stats.dropped_frames,
            queue_overflows: self.last_stats.queue_overflows,
            out_of_order_frames: self.last_stats.out_of_order_frames,
            interval_ms: StatsSummary::from(&self.interval_stats),
        }
    }

    /// Reset all accumulated state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Metrics summary
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_captures: u64,
    pub partial_captures: u64,
    pub partial_rate: f64,
    pub dropped_frames: u64,
    pub queue_overflows: u64,
    pub out_of_order_frames: u64,
    pub interval_ms: StatsSummary,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Capture Metrics Summary ===")?;
        writeln!(f, "Total captures: {}", self.total_captures)?;
        writeln!(
            f,
            "Partial captures: {} ({:.2}%)",
            self.partial_captures, self.partial_rate
        )?;
        writeln!(f, "Dropped frames: {}", self.dropped_frames)?;
        writeln!(f, "Queue overflows: {}", self.queue_overflows)?;
        writeln!(f, "Out-of-order frames: {}", self.out_of_order_frames)?;
        writeln!(f, "Capture interval (ms): {}", self.interval_ms)?;
        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count(),
            min: stats.min(),
            max: stats.max(),
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
