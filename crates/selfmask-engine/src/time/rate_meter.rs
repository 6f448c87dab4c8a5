use std::time::{Duration, Instant};

/// Average processing rate over one reporting window.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RateReport {
    /// Frames counted in the window.
    pub frames: u32,

    /// Length of the window.
    pub elapsed: Duration,
}

impl RateReport {
    /// Frames per second over the window. Zero for an empty window.
    pub fn hz(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        f64::from(self.frames) / secs
    }
}

/// Frame-rate meter producing a `RateReport` every `frames_per_report` frames or
/// every `max_window`, whichever comes first.
#[derive(Debug, Clone)]
pub struct RateMeter {
    window_start: Instant,
    count: u32,
    frames_per_report: u32,
    max_window: Duration,
}

impl RateMeter {
    /// Creates a meter reporting every 30 frames or 5 seconds.
    pub fn new() -> Self {
        Self::with_window(30, Duration::from_secs(5))
    }

    /// Creates a meter with a custom reporting window.
    pub fn with_window(frames_per_report: u32, max_window: Duration) -> Self {
        debug_assert!(frames_per_report > 0);
        Self {
            window_start: Instant::now(),
            count: 0,
            frames_per_report: frames_per_report.max(1),
            max_window,
        }
    }

    /// Resets the window baseline.
    ///
    /// Called after a pipeline reinitialization so setup time is not counted.
    pub fn reset(&mut self) {
        self.window_start = Instant::now();
        self.count = 0;
    }

    /// Counts one frame at the current instant.
    pub fn tick(&mut self) -> Option<RateReport> {
        self.tick_at(Instant::now())
    }

    /// Counts one frame at `now`. Split out so tests can drive the clock.
    pub fn tick_at(&mut self, now: Instant) -> Option<RateReport> {
        self.count += 1;
        let elapsed = now.saturating_duration_since(self.window_start);

        if self.count < self.frames_per_report && elapsed <= self.max_window {
            return None;
        }

        let report = RateReport {
            frames: self.count,
            elapsed,
        };
        self.count = 0;
        self.window_start = now;
        Some(report)
    }
}

impl Default for RateMeter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_after_frame_budget() {
        let start = Instant::now();
        let mut meter = RateMeter::with_window(3, Duration::from_secs(60));
        meter.window_start = start;

        assert!(meter.tick_at(start + Duration::from_millis(10)).is_none());
        assert!(meter.tick_at(start + Duration::from_millis(20)).is_none());
        let report = meter.tick_at(start + Duration::from_millis(30)).unwrap();
        assert_eq!(report.frames, 3);
        assert!((report.hz() - 100.0).abs() < 1e-6);
    }

    #[test]
    fn reports_after_time_window() {
        let start = Instant::now();
        let mut meter = RateMeter::with_window(30, Duration::from_secs(5));
        meter.window_start = start;

        let report = meter.tick_at(start + Duration::from_secs(6)).unwrap();
        assert_eq!(report.frames, 1);
    }

    #[test]
    fn window_restarts_after_report() {
        let start = Instant::now();
        let mut meter = RateMeter::with_window(2, Duration::from_secs(60));
        meter.window_start = start;

        meter.tick_at(start);
        assert!(meter.tick_at(start + Duration::from_millis(5)).is_some());
        assert!(meter.tick_at(start + Duration::from_millis(6)).is_none());
    }

    #[test]
    fn reset_drops_counted_frames() {
        let mut meter = RateMeter::with_window(2, Duration::from_secs(60));
        assert!(meter.tick().is_none());
        meter.reset();
        // The frame counted before the reset no longer completes the window.
        assert!(meter.tick().is_none());
        assert_eq!(meter.tick().map(|r| r.frames), Some(2));
    }

    #[test]
    fn empty_window_has_zero_rate() {
        let report = RateReport { frames: 0, elapsed: Duration::ZERO };
        assert_eq!(report.hz(), 0.0);
    }
}
