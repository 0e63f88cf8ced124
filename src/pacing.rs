//! Frame pacing for the display loop.

use std::collections::VecDeque;
use std::time::Duration;

/// FPS reported for a frame that took no measurable time.
const INSTANT_FPS: f64 = 100.0;

/// Timing handed to the renderer with each frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pacing {
    /// How long the display may wait for input before the next frame
    pub wait: Duration,
    /// Rolling mean FPS, `None` on the first frame
    pub fps: Option<f64>,
    /// Time spent processing the current frame
    pub processing: Duration,
}

/// Tracks recent frame durations and decides how long the display
/// should wait before the next frame.
#[derive(Debug, Clone)]
pub struct FramePacer {
    budget: Duration,
    window: usize,
    samples: VecDeque<f64>,
    last_elapsed: Duration,
}

impl FramePacer {
    pub const DEFAULT_WINDOW: usize = 10;

    pub fn new(budget: Duration) -> Self {
        Self::with_window(budget, Self::DEFAULT_WINDOW)
    }

    pub fn with_window(budget: Duration, window: usize) -> Self {
        let window = window.max(1);
        Self {
            budget,
            window,
            samples: VecDeque::with_capacity(window),
            last_elapsed: Duration::ZERO,
        }
    }

    /// Record how long the last frame took to process.
    pub fn record(&mut self, elapsed: Duration) {
        self.last_elapsed = elapsed;
        let secs = elapsed.as_secs_f64();
        let fps = if secs > 0.0 { 1.0 / secs } else { INSTANT_FPS };
        if self.samples.len() == self.window {
            self.samples.pop_front();
        }
        self.samples.push_back(fps);
    }

    /// Rolling mean FPS over the window, `None` before the first sample.
    pub fn fps(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().sum::<f64>() / self.samples.len() as f64)
    }

    /// Remaining budget rounded up to whole milliseconds, or 1 ms when the
    /// last frame already used it up.
    pub fn wait(&self) -> Duration {
        match self.budget.checked_sub(self.last_elapsed) {
            Some(rest) if !rest.is_zero() => {
                let millis = rest.as_nanos().div_ceil(1_000_000);
                Duration::from_millis(millis as u64)
            }
            _ => Duration::from_millis(1),
        }
    }
}
