//! Frame statistics

use std::collections::VecDeque;
use std::time::Duration;

/// Frames kept for the rolling averages
const MAX_SAMPLES: usize = 120;
/// How often the stats line is logged
pub const REPORT_INTERVAL: Duration = Duration::from_secs(5);

/// Frame statistics tracker
#[derive(Debug)]
pub struct FrameStats {
    /// Frame time history for averaging
    frame_times: VecDeque<Duration>,
    /// Current FPS
    fps: f32,
    /// Average frame time in milliseconds
    avg_frame_time_ms: f32,
    /// Minimum frame time in milliseconds
    min_frame_time_ms: f32,
    /// Maximum frame time in milliseconds
    max_frame_time_ms: f32,
    /// Total frames rendered
    total_frames: u64,
    since_report: Duration,
    report_interval: Duration,
}

impl FrameStats {
    /// Create a new frame stats tracker
    pub fn new() -> Self {
        Self::with_report_interval(REPORT_INTERVAL)
    }

    pub fn with_report_interval(report_interval: Duration) -> Self {
        Self {
            frame_times: VecDeque::with_capacity(MAX_SAMPLES),
            fps: 0.0,
            avg_frame_time_ms: 0.0,
            min_frame_time_ms: 0.0,
            max_frame_time_ms: 0.0,
            total_frames: 0,
            since_report: Duration::ZERO,
            report_interval,
        }
    }

    /// Record a frame with the given delta time
    ///
    /// Logs the stats line once per report interval and returns whether it
    /// did.
    pub fn record_frame(&mut self, delta: Duration) -> bool {
        self.total_frames += 1;

        if self.frame_times.len() >= MAX_SAMPLES {
            self.frame_times.pop_front();
        }
        self.frame_times.push_back(delta);
        self.update_stats();

        self.since_report += delta;
        if self.since_report < self.report_interval {
            return false;
        }
        self.since_report = Duration::ZERO;
        log::info!("{}", self.format_stats());
        true
    }

    fn update_stats(&mut self) {
        let mut total = Duration::ZERO;
        let mut min = Duration::MAX;
        let mut max = Duration::ZERO;

        for &dt in &self.frame_times {
            total += dt;
            min = min.min(dt);
            max = max.max(dt);
        }

        let count = self.frame_times.len() as f32;
        let total_secs = total.as_secs_f32();

        // Guard against division by zero
        if total_secs > 0.0 {
            self.avg_frame_time_ms = (total_secs / count) * 1000.0;
            self.fps = count / total_secs;
        } else {
            self.avg_frame_time_ms = 0.0;
            self.fps = 0.0;
        }

        self.min_frame_time_ms = min.as_secs_f32() * 1000.0;
        self.max_frame_time_ms = max.as_secs_f32() * 1000.0;
    }

    /// Get current FPS
    pub fn fps(&self) -> f32 {
        self.fps
    }

    /// Get average frame time in milliseconds
    pub fn avg_frame_time_ms(&self) -> f32 {
        self.avg_frame_time_ms
    }

    pub fn min_frame_time_ms(&self) -> f32 {
        self.min_frame_time_ms
    }

    pub fn max_frame_time_ms(&self) -> f32 {
        self.max_frame_time_ms
    }

    /// Get total frames rendered
    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// Get a formatted stats string
    pub fn format_stats(&self) -> String {
        format!(
            "FPS: {:.1} | Frame: {:.2}ms (min: {:.2}, max: {:.2})",
            self.fps, self.avg_frame_time_ms, self.min_frame_time_ms, self.max_frame_time_ms
        )
    }
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_averages() {
        let mut stats = FrameStats::new();
        stats.record_frame(Duration::from_millis(10));
        stats.record_frame(Duration::from_millis(30));

        assert_eq!(stats.total_frames(), 2);
        assert!((stats.avg_frame_time_ms() - 20.0).abs() < 1e-3);
        assert!((stats.fps() - 50.0).abs() < 1e-2);
        assert!((stats.min_frame_time_ms() - 10.0).abs() < 1e-3);
        assert!((stats.max_frame_time_ms() - 30.0).abs() < 1e-3);
    }

    #[test]
    fn test_window_is_bounded() {
        let mut stats = FrameStats::new();
        stats.record_frame(Duration::from_millis(100));
        for _ in 0..MAX_SAMPLES {
            stats.record_frame(Duration::from_millis(10));
        }
        // The slow first frame has rolled out of the window
        assert!((stats.max_frame_time_ms() - 10.0).abs() < 1e-3);
        assert_eq!(stats.total_frames(), MAX_SAMPLES as u64 + 1);
    }

    #[test]
    fn test_reports_once_per_interval() {
        let mut stats = FrameStats::with_report_interval(Duration::from_millis(100));
        let reports = (0..25)
            .filter(|_| stats.record_frame(Duration::from_millis(10)))
            .count();
        assert_eq!(reports, 2);
    }

    #[test]
    fn test_zero_delta() {
        let mut stats = FrameStats::new();
        stats.record_frame(Duration::ZERO);
        assert_eq!(stats.fps(), 0.0);
    }
}
