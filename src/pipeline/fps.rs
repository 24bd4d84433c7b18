use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(1);

/// Counts processed frames and commits a frames-per-second value once per
/// wall-clock second.
///
/// The value is quantized to whole seconds and can lag by up to one window.
#[derive(Debug, Default)]
pub struct FrameRateTracker {
    frames: u32,
    window_start: Option<Instant>,
    fps: u32,
}

impl FrameRateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one processed frame. Returns the newly committed value when
    /// this frame closed the window; the closing frame counts toward it.
    pub fn tick(&mut self, now: Instant) -> Option<u32> {
        if self.window_start.is_none() {
            self.window_start = Some(now);
        }
        self.frames += 1;
        self.poll(now)
    }

    /// Closes the current window if a full second has passed, without
    /// counting a frame.
    pub fn poll(&mut self, now: Instant) -> Option<u32> {
        let start = self.window_start?;
        if now.saturating_duration_since(start) < WINDOW {
            return None;
        }
        self.fps = self.frames;
        self.frames = 0;
        self.window_start = Some(now);
        log::trace!("fps committed: {}", self.fps);
        Some(self.fps)
    }

    pub fn current_fps(&self) -> u32 {
        self.fps
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn commits_frame_count_once_per_window() {
        let t0 = Instant::now();
        let mut tracker = FrameRateTracker::new();

        for i in 0..12 {
            assert_eq!(tracker.tick(t0 + ms(i * 75)), None);
        }
        assert_eq!(tracker.current_fps(), 0);

        // Silence until the window closes.
        assert_eq!(tracker.poll(t0 + ms(999)), None);
        assert_eq!(tracker.poll(t0 + ms(1_000)), Some(12));
        assert_eq!(tracker.current_fps(), 12);

        // No further commit of the same value.
        assert_eq!(tracker.poll(t0 + ms(1_500)), None);
        assert_eq!(tracker.current_fps(), 12);
    }

    #[test]
    fn closing_tick_counts_toward_its_window() {
        let t0 = Instant::now();
        let mut tracker = FrameRateTracker::new();
        for i in 0..10 {
            assert_eq!(tracker.tick(t0 + ms(i * 100)), None);
        }

        assert_eq!(tracker.tick(t0 + ms(1_000)), Some(11));
        assert_eq!(tracker.current_fps(), 11);

        // The next window starts empty at the closing tick.
        assert_eq!(tracker.tick(t0 + ms(1_500)), None);
        assert_eq!(tracker.poll(t0 + ms(2_000)), Some(1));
        assert_eq!(tracker.poll(t0 + ms(3_000)), Some(0));
    }

    #[test]
    fn idle_tracker_never_commits() {
        let mut tracker = FrameRateTracker::new();
        assert_eq!(tracker.poll(Instant::now() + ms(5_000)), None);
        assert_eq!(tracker.current_fps(), 0);
    }

    #[test]
    fn reset_clears_window() {
        let t0 = Instant::now();
        let mut tracker = FrameRateTracker::new();
        tracker.tick(t0);
        tracker.poll(t0 + ms(1_000));
        tracker.reset();
        assert_eq!(tracker.current_fps(), 0);
        assert_eq!(tracker.poll(t0 + ms(9_000)), None);
    }
}
