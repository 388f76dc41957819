//! Frame timing

use std::time::{Duration, Instant};

/// Wall-clock time between frames
#[derive(Debug, Clone)]
pub struct Time {
    start: Instant,
    last_frame: Instant,
    delta: Duration,
    frame_count: u64,
}

impl Time {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_frame: now,
            delta: Duration::ZERO,
            frame_count: 0,
        }
    }

    /// Start a new frame, measuring the time since the previous one
    pub fn update(&mut self) {
        let now = Instant::now();
        self.delta = now - self.last_frame;
        self.last_frame = now;
        self.frame_count += 1;
    }

    /// Time the last frame took
    pub const fn delta(&self) -> Duration {
        self.delta
    }

    pub fn delta_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    /// Time since the clock was created
    pub fn elapsed(&self) -> Duration {
        self.last_frame - self.start
    }

    pub const fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

impl Default for Time {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_measures_delta() {
        let mut time = Time::new();
        assert_eq!(time.delta(), Duration::ZERO);

        std::thread::sleep(Duration::from_millis(5));
        time.update();
        assert!(time.delta() >= Duration::from_millis(5));
        assert_eq!(time.frame_count(), 1);
        assert_eq!(time.elapsed(), time.delta());
    }
}
