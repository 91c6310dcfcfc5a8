//! Adaptive frame pacing and rolling FPS.

use std::collections::VecDeque;
use std::time::Duration;

/// Highest accepted target frame rate.
pub const MAX_TARGET_FPS: u32 = 120;

/// Interval between frames at `fps`; zero is treated as one frame per second.
pub fn target_interval(fps: u32) -> Duration {
    Duration::from_secs(1) / fps.max(1)
}

/// Next render interval: the larger of 90% of the last end-to-end frame
/// time and the target-rate interval.
///
/// The pipeline slows down to whatever the slowest stage sustains but never
/// runs faster than the requested rate.
pub fn next_interval(last_frame_time: Option<Duration>, target_fps: u32) -> Duration {
    let floor = target_interval(target_fps);
    match last_frame_time {
        Some(t) => (t * 9 / 10).max(floor),
        None => floor,
    }
}

/// Pacing state for one render loop.
#[derive(Debug, Clone)]
pub struct Pacer {
    target_fps: u32,
    last_frame_time: Option<Duration>,
}

impl Pacer {
    pub fn new(target_fps: u32) -> Self {
        Self {
            target_fps,
            last_frame_time: None,
        }
    }

    pub fn target_fps(&self) -> u32 {
        self.target_fps
    }

    pub fn set_target_fps(&mut self, fps: u32) {
        self.target_fps = fps;
    }

    pub fn observe(&mut self, frame_time: Duration) {
        self.last_frame_time = Some(frame_time);
    }

    pub fn interval(&self) -> Duration {
        next_interval(self.last_frame_time, self.target_fps)
    }
}

/// Rolling frame rate over the last `capacity` frame intervals.
#[derive(Debug, Clone)]
pub struct FpsCounter {
    window: VecDeque<Duration>,
    capacity: usize,
    total: Duration,
}

impl FpsCounter {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
            total: Duration::ZERO,
        }
    }

    pub fn record(&mut self, interval: Duration) {
        if self.window.len() == self.capacity {
            if let Some(old) = self.window.pop_front() {
                self.total = self.total.saturating_sub(old);
            }
        }
        self.window.push_back(interval);
        self.total += interval;
    }

    /// Frames per second over the window; `0.0` before the first frame.
    pub fn fps(&self) -> f64 {
        let secs = self.total.as_secs_f64();
        if self.window.is_empty() || secs <= 0.0 {
            return 0.0;
        }
        self.window.len() as f64 / secs
    }

    /// Mean interval over the window.
    pub fn average(&self) -> Duration {
        match u32::try_from(self.window.len()) {
            Ok(n) if n > 0 => self.total / n,
            _ => Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slow_device_stretches_interval() {
        assert_eq!(
            next_interval(Some(Duration::from_millis(50)), 30),
            Duration::from_millis(45)
        );
    }

    #[test]
    fn fast_device_capped_by_target_rate() {
        let interval = next_interval(Some(Duration::from_millis(5)), 30);
        assert_eq!(interval, target_interval(30));
        assert!(interval > Duration::from_millis(33));
        assert!(interval < Duration::from_millis(34));
    }

    #[test]
    fn no_history_uses_target_rate() {
        assert_eq!(next_interval(None, 10), Duration::from_millis(100));
    }

    #[test]
    fn pacer_follows_rate_changes() {
        let mut pacer = Pacer::new(10);
        pacer.observe(Duration::from_millis(20));
        assert_eq!(pacer.interval(), Duration::from_millis(100));
        pacer.set_target_fps(50);
        assert_eq!(pacer.interval(), Duration::from_millis(20));
    }

    #[test]
    fn fps_counter_rolls() {
        let mut fps = FpsCounter::new(4);
        assert!(fps.fps().abs() < f64::EPSILON);
        for _ in 0..4 {
            fps.record(Duration::from_millis(100));
        }
        assert!((fps.fps() - 10.0).abs() < 1e-9);
        for _ in 0..4 {
            fps.record(Duration::from_millis(50));
        }
        assert!((fps.fps() - 20.0).abs() < 1e-9);
        assert_eq!(fps.average(), Duration::from_millis(50));
    }
}
