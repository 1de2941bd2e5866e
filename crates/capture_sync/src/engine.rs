//! Capture synchronizer implementation.

use std::sync::Mutex;
use std::time::Duration;

use capture::{Capture, Frame};
use contracts::{Error, Modality, Result, SyncConfig};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use tracing::instrument;

/// Synchronizer lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncState {
    /// Not started yet, or stopped and ready to restart
    Idle,
    /// Accepting frames and emitting captures
    Running,
}

/// Which modalities form a matched pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PairMode {
    /// Color paired with depth; IR rides along on the depth timestamp
    ColorDepth,
    /// Color paired with IR (passive IR, no depth stream)
    ColorIr,
    /// Depth paired with IR by identical timestamp, no color stream
    DepthIr,
    /// Single modality, every frame becomes its own capture
    Passthrough,
}

#[derive(Debug, Default, Clone)]
struct Counters {
    matched_captures: u64,
    partial_captures: u64,
    dropped_frames: u64,
    queue_overflows: u64,
}

/// Snapshot of synchronizer counters
#[derive(Debug, Default, Clone)]
pub struct SyncStats {
    /// Captures emitted with a complete matched pair
    pub matched_captures: u64,
    /// Captures emitted with only one side of a pair
    pub partial_captures: u64,
    /// Frames discarded without being emitted
    pub dropped_frames: u64,
    /// Captures evicted from a full output queue
    pub queue_overflows: u64,
    /// Frames that arrived with a timestamp older than their predecessor
    pub out_of_order_frames: u64,
    /// Frames currently waiting for a partner, per modality
    pub pending_frames: usize,
}

struct Inner {
    state: SyncState,
    color: crate::pending::PendingQueue,
    depth: crate::pending::PendingQueue,
    ir: crate::pending::PendingQueue,
    tx: Option<Sender<Capture>>,
    rx: Option<Receiver<Capture>>,
    counters: Counters,
}

/// Pairs frames from camera producer threads into captures.
///
/// All methods take `&self`; producers and consumers share one instance
/// across threads (typically behind an `Arc`).
pub struct CaptureSync {
    config: SyncConfig,
    pair_mode: PairMode,
    inner: Mutex<Inner>,
}

impl CaptureSync {
    /// Create an idle synchronizer. Call [`CaptureSync::start`] before
    /// pushing frames.
    pub fn new(config: SyncConfig) -> Self {
        let pair_mode = match (config.expect_color, config.expect_depth, config.expect_ir) {
            (true, true, _) => PairMode::ColorDepth,
            (true, false, true) => PairMode::ColorIr,
            (false, true, true) => PairMode::DepthIr,
            _ => PairMode::Passthrough,
        };
        let pending_depth = config.queue_capacity.max(4);
        Self {
            config,
            pair_mode,
            inner: Mutex::new(Inner {
                state: SyncState::Idle,
                color: crate::pending::PendingQueue::new(pending_depth),
                depth: crate::pending::PendingQueue::new(pending_depth),
                ir: crate::pending::PendingQueue::new(pending_depth),
                counters: Counters::default(),
                tx: None,
                rx: None,
            }),
        }
    }

    /// Begin accepting frames.
    ///
    /// Fails with `InvalidOperation` when already running. Restarting a
    /// stopped synchronizer discards any captures left from the previous
    /// run.
    #[instrument(name = "capture_sync_start", skip(self))]
    pub fn start(&self) -> Result<()> {
        let mut inner = self.lock();
        if inner.state == SyncState::Running {
            return Err(Error::invalid_operation("synchronizer already running"));
        }
        let (tx, rx) = bounded(self.config.queue_capacity.max(1));
        inner.tx = Some(tx);
        inner.rx = Some(rx);
        inner.color = crate::pending::PendingQueue::new(self.config.queue_capacity.max(4));
        inner.depth = crate::pending::PendingQueue::new(self.config.queue_capacity.max(4));
        inner.ir = crate::pending::PendingQueue::new(self.config.queue_capacity.max(4));
        inner.state = SyncState::Running;
        Ok(())
    }

    /// Stop accepting frames and wake every blocked consumer.
    ///
    /// Captures already queued remain readable; once drained, consumers get
    /// `Error::Stopped`. Pending unpaired frames are flushed as partial
    /// captures unless `synchronized_only` is set. Idempotent.
    #[instrument(name = "capture_sync_stop", skip(self))]
    pub fn stop(&self) {
        let mut inner = self.lock();
        if inner.state != SyncState::Running {
            return;
        }
        // Flush leftovers across all modalities in timestamp order; the
        // non-decreasing output ordering holds through the final captures.
        let mut leftover: Vec<(Modality, Frame)> = Vec::new();
        for modality in Modality::ALL {
            for frame in inner.queue_mut(modality).drain() {
                leftover.push((modality, frame));
            }
        }
        leftover.sort_by_key(|(_, frame)| frame.device_timestamp_usec());
        for (modality, frame) in leftover {
            self.handle_unmatched(&mut inner, modality, frame);
        }
        // Dropping the sender disconnects the channel; blocked receivers
        // wake after the queue drains.
        inner.tx = None;
        inner.state = SyncState::Idle;
    }

    /// Whether the synchronizer is accepting frames
    pub fn is_running(&self) -> bool {
        self.lock().state == SyncState::Running
    }

    /// Offer a timestamped frame from a producer.
    ///
    /// Frames arriving while the synchronizer is not running are silently
    /// discarded, so producers need no shutdown coordination.
    #[instrument(
        name = "capture_sync_push",
        level = "trace",
        skip(self, frame),
        fields(modality = %modality, timestamp_usec = frame.device_timestamp_usec())
    )]
    pub fn push_frame(&self, modality: Modality, frame: Frame) -> Result<()> {
        if !self.expects(modality) {
            return Err(Error::invalid_argument(format!(
                "no {modality} producer configured"
            )));
        }
        let mut inner = self.lock();
        if inner.state != SyncState::Running {
            tracing::trace!(%modality, "frame discarded, synchronizer not running");
            return Ok(());
        }

        if self.pair_mode == PairMode::Passthrough {
            let capture = Capture::new();
            capture.set_frame(modality, Some(frame));
            self.emit(&mut inner, capture, false);
            return Ok(());
        }

        if let Some(evicted) = inner.queue_mut(modality).push(frame) {
            tracing::warn!(%modality, "pending queue full, evicting oldest frame");
            self.handle_unmatched(&mut inner, modality, evicted);
        }
        self.match_pending(&mut inner);
        Ok(())
    }

    /// Block until the next capture is available.
    ///
    /// `None` waits forever. Returns `Error::Timeout` when the deadline
    /// passes and `Error::Stopped` once the synchronizer is stopped and the
    /// queue is drained. Calling before the first `start` is an error.
    #[instrument(name = "capture_sync_get", level = "trace", skip(self))]
    pub fn get_capture(&self, timeout: Option<Duration>) -> Result<Capture> {
        let rx = {
            let inner = self.lock();
            inner
                .rx
                .clone()
                .ok_or_else(|| Error::invalid_operation("synchronizer was never started"))?
        };
        match timeout {
            Some(timeout) => rx.recv_timeout(timeout).map_err(|e| match e {
                RecvTimeoutError::Timeout => Error::Timeout,
                RecvTimeoutError::Disconnected => Error::Stopped,
            }),
            None => rx.recv().map_err(|_| Error::Stopped),
        }
    }

    /// Snapshot of the synchronizer counters
    pub fn stats(&self) -> SyncStats {
        let inner = self.lock();
        SyncStats {
            matched_captures: inner.counters.matched_captures,
            partial_captures: inner.counters.partial_captures,
            dropped_frames: inner.counters.dropped_frames,
            queue_overflows: inner.counters.queue_overflows,
            out_of_order_frames: inner.color.out_of_order_count()
                + inner.depth.out_of_order_count()
                + inner.ir.out_of_order_count(),
            pending_frames: inner.color.len() + inner.depth.len() + inner.ir.len(),
        }
    }

    fn expects(&self, modality: Modality) -> bool {
        match modality {
            Modality::Color => self.config.expect_color,
            Modality::Depth => self.config.expect_depth,
            Modality::Ir => self.config.expect_ir,
        }
    }

    /// Pair queue fronts until one side runs dry.
    ///
    /// A front is provably unmatched once the opposite stream has advanced
    /// past its matching window; timestamps within one stream only grow, so
    /// no later frame can pair with it.
    fn match_pending(&self, inner: &mut Inner) {
        let tolerance = self.config.tolerance_usec() as i64;
        let delay = match self.pair_mode {
            PairMode::ColorDepth | PairMode::ColorIr => self.config.depth_delay_off_color_usec,
            PairMode::DepthIr | PairMode::Passthrough => 0,
        };
        let (primary, secondary) = match self.pair_mode {
            PairMode::ColorDepth => (Modality::Depth, Modality::Color),
            PairMode::ColorIr => (Modality::Ir, Modality::Color),
            PairMode::DepthIr => (Modality::Depth, Modality::Ir),
            PairMode::Passthrough => return,
        };

        loop {
            let (Some(primary_ts), Some(secondary_ts)) = (
                inner.queue_mut(primary).front_timestamp(),
                inner.queue_mut(secondary).front_timestamp(),
            ) else {
                break;
            };
            // For color pairs: how far the depth/IR timestamp deviates from
            // the color timestamp plus the configured exposure delay.
            let deviation = primary_ts as i64 - secondary_ts as i64 - delay;
            if deviation.unsigned_abs() < tolerance.unsigned_abs() {
                let primary_frame = inner.queue_mut(primary).pop_front();
                let secondary_frame = inner.queue_mut(secondary).pop_front();
                let capture = Capture::new();
                capture.set_frame(primary, primary_frame);
                capture.set_frame(secondary, secondary_frame);
                // A depth frame and its IR sibling come from the same
                // exposure and share one timestamp.
                if self.pair_mode == PairMode::ColorDepth && self.config.expect_ir {
                    if let Some(ir) = inner.queue_mut(Modality::Ir).take_at(primary_ts) {
                        capture.set_ir_frame(Some(ir));
                    }
                    for stale in inner.queue_mut(Modality::Ir).drain_older_than(primary_ts) {
                        self.handle_unmatched(inner, Modality::Ir, stale);
                    }
                }
                self.emit(inner, capture, true);
            } else if deviation > 0 {
                // Primary stream has advanced past this secondary frame.
                if let Some(stale) = inner.queue_mut(secondary).pop_front() {
                    self.handle_unmatched(inner, secondary, stale);
                }
            } else if let Some(stale) = inner.queue_mut(primary).pop_front() {
                self.handle_unmatched(inner, primary, stale);
            }
        }
    }

    /// A frame whose partner will never arrive: drop it in strict mode,
    /// emit it as a partial capture otherwise.
    fn handle_unmatched(&self, inner: &mut Inner, modality: Modality, frame: Frame) {
        if self.config.synchronized_only {
            tracing::warn!(
                %modality,
                timestamp_usec = frame.device_timestamp_usec(),
                "dropping unmatched frame"
            );
            metrics::counter!("sync_frames_dropped_total", "modality" => modality.to_string())
                .increment(1);
            inner.counters.dropped_frames += 1;
        } else {
            let capture = Capture::new();
            capture.set_frame(modality, Some(frame));
            self.emit(inner, capture, false);
        }
    }

    /// Put a capture on the output queue, evicting the oldest queued
    /// capture when the consumer has fallen behind.
    fn emit(&self, inner: &mut Inner, capture: Capture, matched: bool) {
        let Some(tx) = inner.tx.clone() else {
            return;
        };
        let rx = inner.rx.clone();
        let mut outgoing = capture;
        loop {
            match tx.try_send(outgoing) {
                Ok(()) => break,
                Err(TrySendError::Full(capture)) => {
                    outgoing = capture;
                    if let Some(rx) = &rx {
                        if rx.try_recv().is_ok() {
                            inner.counters.queue_overflows += 1;
                            metrics::counter!("sync_queue_overflow_total").increment(1);
                        }
                    }
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
        if matched {
            inner.counters.matched_captures += 1;
            metrics::counter!("sync_captures_total", "status" => "matched").increment(1);
        } else {
            inner.counters.partial_captures += 1;
            metrics::counter!("sync_captures_total", "status" => "partial").increment(1);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Inner {
    fn queue_mut(&mut self, modality: Modality) -> &mut crate::pending::PendingQueue {
        match modality {
            Modality::Color => &mut self.color,
            Modality::Depth => &mut self.depth,
            Modality::Ir => &mut self.ir,
        }
    }
}

impl std::fmt::Debug for CaptureSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSync")
            .field("pair_mode", &self.pair_mode)
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::ImageFormat;
    use std::sync::Arc;
    use std::thread;

    fn config() -> SyncConfig {
        SyncConfig {
            synchronized_only: false,
            depth_delay_off_color_usec: 0,
            frame_period_usec: 33_333,
            tolerance_usec: None,
            queue_capacity: 32,
            expect_color: true,
            expect_depth: true,
            expect_ir: false,
        }
    }

    fn frame(format: ImageFormat, timestamp_usec: u64) -> Frame {
        let stride = match format {
            ImageFormat::ColorBgra32 => 8,
            _ => 4,
        };
        let frame = Frame::create(format, 2, 2, stride).unwrap();
        frame.set_device_timestamp_usec(timestamp_usec);
        frame
    }

    fn color(ts: u64) -> Frame {
        frame(ImageFormat::ColorBgra32, ts)
    }

    fn depth(ts: u64) -> Frame {
        frame(ImageFormat::Depth16, ts)
    }

    fn ir(ts: u64) -> Frame {
        frame(ImageFormat::Ir16, ts)
    }

    #[test]
    fn test_matches_within_tolerance() {
        let sync = CaptureSync::new(config());
        sync.start().unwrap();

        sync.push_frame(Modality::Color, color(1_000)).unwrap();
        sync.push_frame(Modality::Depth, depth(2_000)).unwrap();

        let capture = sync.get_capture(Some(Duration::from_millis(10))).unwrap();
        assert!(capture.color_frame().is_some());
        assert!(capture.depth_frame().is_some());
        assert_eq!(sync.stats().matched_captures, 1);
    }

    #[test]
    fn test_three_capture_ordering() {
        let sync = CaptureSync::new(SyncConfig {
            synchronized_only: true,
            ..config()
        });
        sync.start().unwrap();

        for ts in [0u64, 33_000, 66_000] {
            sync.push_frame(Modality::Depth, depth(ts)).unwrap();
        }
        for ts in [1_000u64, 34_000, 67_000] {
            sync.push_frame(Modality::Color, color(ts)).unwrap();
        }

        let mut last = 0;
        for _ in 0..3 {
            let capture = sync.get_capture(Some(Duration::from_millis(10))).unwrap();
            assert!(capture.color_frame().is_some());
            assert!(capture.depth_frame().is_some());
            let ts = capture.device_timestamp_usec().unwrap();
            assert!(ts >= last);
            last = ts;
        }
        assert_eq!(sync.stats().matched_captures, 3);
        assert_eq!(sync.stats().dropped_frames, 0);
    }

    #[test]
    fn test_stop_flushes_pending_in_timestamp_order() {
        let sync = CaptureSync::new(SyncConfig {
            expect_ir: true,
            ..config()
        });
        sync.start().unwrap();

        // An old IR frame and a much newer color frame are both still
        // unpaired when the synchronizer stops.
        sync.push_frame(Modality::Ir, ir(100)).unwrap();
        sync.push_frame(Modality::Color, color(200_000)).unwrap();
        sync.stop();

        let first = sync.get_capture(Some(Duration::from_millis(5))).unwrap();
        let second = sync.get_capture(Some(Duration::from_millis(5))).unwrap();
        assert_eq!(first.device_timestamp_usec(), Some(100));
        assert_eq!(second.device_timestamp_usec(), Some(200_000));
        assert_eq!(sync.stats().partial_captures, 2);
    }

    #[test]
    fn test_ir_rides_on_depth_timestamp() {
        let sync = CaptureSync::new(SyncConfig {
            expect_ir: true,
            ..config()
        });
        sync.start().unwrap();

        sync.push_frame(Modality::Ir, ir(5_000)).unwrap();
        sync.push_frame(Modality::Depth, depth(5_000)).unwrap();
        sync.push_frame(Modality::Color, color(6_000)).unwrap();

        let capture = sync.get_capture(Some(Duration::from_millis(10))).unwrap();
        assert!(capture.depth_frame().is_some());
        assert!(capture.ir_frame().is_some());
        assert!(capture.color_frame().is_some());
    }

    #[test]
    fn test_synchronized_only_drops_unmatched() {
        let sync = CaptureSync::new(SyncConfig {
            synchronized_only: true,
            ..config()
        });
        sync.start().unwrap();

        // No depth partner within tolerance ever arrives for ts=0.
        sync.push_frame(Modality::Color, color(0)).unwrap();
        sync.push_frame(Modality::Depth, depth(100_000)).unwrap();
        sync.push_frame(Modality::Color, color(101_000)).unwrap();

        let capture = sync.get_capture(Some(Duration::from_millis(10))).unwrap();
        assert_eq!(capture.device_timestamp_usec(), Some(100_000));
        assert_eq!(sync.stats().dropped_frames, 1);
        assert_eq!(sync.stats().matched_captures, 1);
    }

    #[test]
    fn test_partial_capture_when_not_strict() {
        let sync = CaptureSync::new(config());
        sync.start().unwrap();

        sync.push_frame(Modality::Color, color(0)).unwrap();
        sync.push_frame(Modality::Depth, depth(100_000)).unwrap();
        sync.push_frame(Modality::Color, color(101_000)).unwrap();

        let partial = sync.get_capture(Some(Duration::from_millis(10))).unwrap();
        assert!(partial.color_frame().is_some());
        assert!(partial.depth_frame().is_none());

        let matched = sync.get_capture(Some(Duration::from_millis(10))).unwrap();
        assert!(matched.color_frame().is_some());
        assert!(matched.depth_frame().is_some());
        assert_eq!(sync.stats().partial_captures, 1);
    }

    #[test]
    fn test_negative_delay_matching() {
        // Depth exposure 10 ms before color.
        let sync = CaptureSync::new(SyncConfig {
            depth_delay_off_color_usec: -10_000,
            tolerance_usec: Some(1_000),
            ..config()
        });
        sync.start().unwrap();

        sync.push_frame(Modality::Depth, depth(40_000)).unwrap();
        sync.push_frame(Modality::Color, color(50_000)).unwrap();

        let capture = sync.get_capture(Some(Duration::from_millis(10))).unwrap();
        assert!(capture.depth_frame().is_some());
        assert!(capture.color_frame().is_some());
    }

    #[test]
    fn test_timeout_and_stop_semantics() {
        let sync = Arc::new(CaptureSync::new(config()));
        sync.start().unwrap();

        let err = sync
            .get_capture(Some(Duration::from_millis(5)))
            .unwrap_err();
        assert!(matches!(err, Error::Timeout));

        let consumer = {
            let sync = Arc::clone(&sync);
            thread::spawn(move || sync.get_capture(None))
        };
        thread::sleep(Duration::from_millis(20));
        sync.stop();
        let err = consumer.join().unwrap().unwrap_err();
        assert!(matches!(err, Error::Stopped));

        // Idempotent.
        sync.stop();
    }

    #[test]
    fn test_stop_drains_queued_captures_first() {
        let sync = CaptureSync::new(config());
        sync.start().unwrap();
        sync.push_frame(Modality::Color, color(1_000)).unwrap();
        sync.push_frame(Modality::Depth, depth(1_500)).unwrap();
        sync.stop();

        let capture = sync.get_capture(Some(Duration::from_millis(5))).unwrap();
        assert!(capture.depth_frame().is_some());
        let err = sync.get_capture(Some(Duration::from_millis(5))).unwrap_err();
        assert!(matches!(err, Error::Stopped));
    }

    #[test]
    fn test_start_twice_fails() {
        let sync = CaptureSync::new(config());
        sync.start().unwrap();
        assert!(matches!(
            sync.start().unwrap_err(),
            Error::InvalidOperation(_)
        ));
    }

    #[test]
    fn test_get_before_start_fails() {
        let sync = CaptureSync::new(config());
        assert!(matches!(
            sync.get_capture(Some(Duration::from_millis(1))).unwrap_err(),
            Error::InvalidOperation(_)
        ));
    }

    #[test]
    fn test_push_after_stop_is_discarded() {
        let sync = CaptureSync::new(config());
        sync.start().unwrap();
        sync.stop();
        sync.push_frame(Modality::Depth, depth(1)).unwrap();
        assert_eq!(sync.stats().pending_frames, 0);
    }

    #[test]
    fn test_passthrough_single_modality() {
        let sync = CaptureSync::new(SyncConfig {
            expect_color: false,
            expect_depth: true,
            expect_ir: false,
            ..config()
        });
        sync.start().unwrap();
        sync.push_frame(Modality::Depth, depth(7)).unwrap();
        let capture = sync.get_capture(Some(Duration::from_millis(5))).unwrap();
        assert_eq!(capture.device_timestamp_usec(), Some(7));
    }

    #[test]
    fn test_unexpected_modality_rejected() {
        let sync = CaptureSync::new(SyncConfig {
            expect_ir: false,
            ..config()
        });
        sync.start().unwrap();
        assert!(sync.push_frame(Modality::Ir, ir(1)).is_err());
    }

    #[test]
    fn test_queue_overflow_drops_oldest() {
        let sync = CaptureSync::new(SyncConfig {
            expect_color: false,
            queue_capacity: 2,
            ..config()
        });
        sync.start().unwrap();
        for ts in [1u64, 2, 3] {
            sync.push_frame(Modality::Depth, depth(ts)).unwrap();
        }
        // Oldest capture was evicted to make room.
        let capture = sync.get_capture(Some(Duration::from_millis(5))).unwrap();
        assert_eq!(capture.device_timestamp_usec(), Some(2));
        assert_eq!(sync.stats().queue_overflows, 1);
    }
}
