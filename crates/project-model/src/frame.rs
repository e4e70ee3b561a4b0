//! Frame geometry and time windows.

use serde::{Deserialize, Serialize};

/// Pixel dimensions of a video frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width divided by height; zero for degenerate frames.
    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f64 / self.height as f64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn is_portrait(&self) -> bool {
        self.height > self.width
    }
}

impl std::fmt::Display for FrameSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A half-open interval `[start, start + duration)` on the output timeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start_secs: f64,
    pub duration_secs: f64,
}

impl TimeWindow {
    pub fn new(start_secs: f64, duration_secs: f64) -> Self {
        Self {
            start_secs,
            duration_secs,
        }
    }

    pub fn end_secs(&self) -> f64 {
        self.start_secs + self.duration_secs
    }

    /// Whether `t` falls inside the window (end exclusive).
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start_secs && t < self.end_secs()
    }

    /// Intersect with `[0, limit)`. Returns `None` if nothing remains.
    pub fn clamp_to(&self, limit_secs: f64) -> Option<TimeWindow> {
        if self.start_secs >= limit_secs {
            return None;
        }
        let end = self.end_secs().min(limit_secs);
        Some(TimeWindow::new(self.start_secs, end - self.start_secs))
    }
}
