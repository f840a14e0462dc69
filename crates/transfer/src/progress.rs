use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Default progress notification interval.
const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);

/// Point-in-time view of an upload's progress.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub total_bytes: u64,
    pub transferred_bytes: u64,
    pub bytes_per_second: f64,
    pub eta: Option<Duration>,
}

impl ProgressSnapshot {
    /// Completed fraction in `[0.0, 1.0]`; an empty upload counts as done.
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            return 1.0;
        }
        (self.transferred_bytes as f64 / self.total_bytes as f64).min(1.0)
    }
}

/// Callback invoked with periodic progress snapshots.
pub type ProgressCallback = Box<dyn Fn(ProgressSnapshot) + Send + Sync>;

/// Aggregates acknowledged bytes across all streams of one upload.
///
/// Streams report independently; counters are lock-free so recording never
/// contends with other streams.
pub struct ProgressTracker {
    inner: Arc<TrackerInner>,
    stop: Mutex<Option<tokio::sync::oneshot::Sender<()>>>,
}

struct TrackerInner {
    total_bytes: u64,
    streams: Vec<AtomicU64>,
    speed: SpeedCalculator,
}

impl TrackerInner {
    fn snapshot(&self) -> ProgressSnapshot {
        let transferred_bytes = self
            .streams
            .iter()
            .map(|s| s.load(Ordering::Relaxed))
            .sum::<u64>();
        ProgressSnapshot {
            total_bytes: self.total_bytes,
            transferred_bytes,
            bytes_per_second: self.speed.bytes_per_second(),
            eta: self
                .speed
                .eta(self.total_bytes.saturating_sub(transferred_bytes)),
        }
    }
}

impl ProgressTracker {
    /// Creates a tracker for `stream_count` streams uploading `total_bytes`.
    pub fn new(total_bytes: u64, stream_count: u32) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                total_bytes,
                streams: (0..stream_count).map(|_| AtomicU64::new(0)).collect(),
                speed: SpeedCalculator::new(None, None),
            }),
            stop: Mutex::new(None),
        }
    }

    /// Records `bytes` acknowledged on `stream_index`.
    ///
    /// Unknown stream indices are ignored.
    pub fn record(&self, stream_index: u32, bytes: u64) {
        if let Some(counter) = self.inner.streams.get(stream_index as usize) {
            counter.fetch_add(bytes, Ordering::Relaxed);
            self.inner.speed.add_sample(bytes);
        }
    }

    /// Bytes acknowledged so far on one stream.
    pub fn stream_bytes(&self, stream_index: u32) -> u64 {
        self.inner
            .streams
            .get(stream_index as usize)
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.inner.snapshot()
    }

    /// Starts periodic notifications in a background tokio task.
    ///
    /// If `interval` is `None`, defaults to 500 ms. Call
    /// [`stop`](Self::stop) to cancel.
    pub fn start(&self, interval: Option<Duration>, callback: ProgressCallback) {
        let (tx, mut rx) = tokio::sync::oneshot::channel();
        if let Ok(mut stop) = self.stop.lock() {
            // Replacing the sender ends any previous task.
            *stop = Some(tx);
        }

        let inner = Arc::clone(&self.inner);
        let period = interval.unwrap_or(DEFAULT_INTERVAL);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => callback(inner.snapshot()),
                    _ = &mut rx => break,
                }
            }
        });
    }

    /// Stops the periodic notification task.
    pub fn stop(&self) {
        if let Ok(mut stop) = self.stop.lock() {
            // Dropping the sender signals the task to exit.
            drop(stop.take());
        }
    }
}

// ---------------------------------------------------------------------------
// SpeedCalculator
// ---------------------------------------------------------------------------

struct SpeedSample {
    bytes: u64,
    timestamp: Instant,
}

/// Calculates transfer speed using a sliding window of samples.
pub struct SpeedCalculator {
    inner: Mutex<SpeedInner>,
}

struct SpeedInner {
    samples: Vec<SpeedSample>,
    max_samples: usize,
    window_size: Duration,
}

impl SpeedCalculator {
    /// Creates a new calculator.
    ///
    /// - `window_size`: time window for speed calculation (default 5 s).
    /// - `max_samples`: maximum retained samples (default 100).
    pub fn new(window_size: Option<Duration>, max_samples: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(SpeedInner {
                samples: Vec::new(),
                max_samples: max_samples.unwrap_or(100),
                window_size: window_size.unwrap_or(Duration::from_secs(5)),
            }),
        }
    }

    /// Records a sample of `bytes` transferred at the current instant.
    pub fn add_sample(&self, bytes: u64) {
        let Ok(mut s) = self.inner.lock() else {
            return;
        };
        let now = Instant::now();
        s.samples.push(SpeedSample {
            bytes,
            timestamp: now,
        });

        if let Some(cutoff) = now.checked_sub(s.window_size) {
            s.samples.retain(|sample| sample.timestamp >= cutoff);
        }

        if s.samples.len() > s.max_samples {
            let excess = s.samples.len() - s.max_samples;
            s.samples.drain(..excess);
        }
    }

    /// Returns the average speed in bytes/second within the window.
    ///
    /// Returns 0.0 if fewer than 2 samples.
    pub fn bytes_per_second(&self) -> f64 {
        let Ok(s) = self.inner.lock() else {
            return 0.0;
        };
        let (Some(first), Some(last)) = (s.samples.first(), s.samples.last()) else {
            return 0.0;
        };
        if s.samples.len() < 2 {
            return 0.0;
        }

        let elapsed = last.timestamp.duration_since(first.timestamp);
        if elapsed.is_zero() {
            return 0.0;
        }

        let total_bytes: u64 = s.samples.iter().map(|sample| sample.bytes).sum();
        total_bytes as f64 / elapsed.as_secs_f64()
    }

    /// Estimates time remaining to transfer `remaining_bytes`.
    ///
    /// Returns `None` if speed is zero.
    pub fn eta(&self, remaining_bytes: u64) -> Option<Duration> {
        let speed = self.bytes_per_second();
        if speed <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(remaining_bytes as f64 / speed))
    }

    /// Clears all recorded samples.
    pub fn reset(&self) {
        if let Ok(mut s) = self.inner.lock() {
            s.samples.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_sums_streams() {
        let tracker = ProgressTracker::new(100, 4);
        tracker.record(0, 25);
        tracker.record(3, 10);
        tracker.record(3, 17);

        let snap = tracker.snapshot();
        assert_eq!(snap.total_bytes, 100);
        assert_eq!(snap.transferred_bytes, 52);
        assert_eq!(tracker.stream_bytes(3), 27);
        assert!((snap.fraction() - 0.52).abs() < 1e-9);
    }

    #[test]
    fn tracker_ignores_unknown_stream() {
        let tracker = ProgressTracker::new(10, 1);
        tracker.record(5, 10);
        assert_eq!(tracker.snapshot().transferred_bytes, 0);
        assert_eq!(tracker.stream_bytes(5), 0);
    }

    #[test]
    fn empty_upload_is_complete() {
        let tracker = ProgressTracker::new(0, 2);
        assert_eq!(tracker.snapshot().fraction(), 1.0);
    }

    #[test]
    fn tracker_concurrent_records() {
        use std::thread;

        let tracker = Arc::new(ProgressTracker::new(4000, 4));
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let t = Arc::clone(&tracker);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        t.record(i, 1);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(tracker.snapshot().transferred_bytes, 4000);
    }

    #[tokio::test(start_paused = true)]
    async fn tracker_periodic_notifications() {
        let tracker = ProgressTracker::new(10, 1);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        tracker.start(
            Some(Duration::from_millis(100)),
            Box::new(move |snap| s.lock().unwrap().push(snap.transferred_bytes)),
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        tracker.record(0, 4);
        tokio::time::sleep(Duration::from_millis(100)).await;
        tracker.stop();
        tokio::time::sleep(Duration::from_millis(500)).await;

        let seen = seen.lock().unwrap();
        assert!(seen.len() >= 2, "expected at least two ticks, got {seen:?}");
        assert_eq!(seen.last().copied(), Some(4));
        assert!(seen.len() <= 3, "ticks continued after stop: {seen:?}");
    }

    #[test]
    fn speed_calculator_no_samples() {
        let calc = SpeedCalculator::new(None, None);
        assert_eq!(calc.bytes_per_second(), 0.0);
        assert!(calc.eta(1000).is_none());
    }

    #[test]
    fn speed_calculator_single_sample() {
        let calc = SpeedCalculator::new(None, None);
        calc.add_sample(100);
        assert_eq!(calc.bytes_per_second(), 0.0);
    }

    #[test]
    fn speed_calculator_multiple_samples() {
        let calc = SpeedCalculator::new(Some(Duration::from_secs(10)), None);
        calc.add_sample(500);
        std::thread::sleep(Duration::from_millis(50));
        calc.add_sample(500);

        assert!(calc.bytes_per_second() > 0.0);
        let eta = calc.eta(10_000);
        assert!(eta.is_some_and(|d| d.as_secs_f64() > 0.0));
    }

    #[test]
    fn speed_calculator_reset() {
        let calc = SpeedCalculator::new(None, None);
        calc.add_sample(100);
        calc.add_sample(200);
        calc.reset();
        assert_eq!(calc.bytes_per_second(), 0.0);
    }

    #[test]
    fn speed_calculator_max_samples() {
        let calc = SpeedCalculator::new(Some(Duration::from_secs(60)), Some(5));
        for i in 0..20 {
            calc.add_sample(i * 10);
        }
        let s = calc.inner.lock().unwrap();
        assert!(s.samples.len() <= 5);
    }
}
