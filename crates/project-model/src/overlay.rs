//! Caption overlay layers.
//!
//! An overlay is a translucent background box plus a block of wrapped
//! text, both placed in output pixel coordinates and bounded in time.

use serde::{Deserialize, Serialize};

use crate::frame::TimeWindow;

/// An opaque RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0 };
    pub const WHITE: Color = Color {
        r: 255,
        g: 255,
        b: 255,
    };

    /// `0xRRGGBB` form accepted by ffmpeg color options.
    pub fn to_hex(self) -> String {
        format!("0x{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// Where an overlay is pinned on the frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Anchor {
    /// Horizontally centered; box top at `offset_ratio * frame height`,
    /// pulled up if the box would cross the bottom edge.
    BottomCenter { offset_ratio: f64 },
}

/// Translucent box drawn behind caption text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub color: Color,
    /// Alpha in `[0.0, 1.0]`.
    pub opacity: f64,
}

/// Wrapped caption text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    /// Caption text as written.
    pub content: String,
    /// Content broken into lines that fit `wrap_width`.
    pub lines: Vec<String>,
    pub font_size: u32,
    pub color: Color,
    pub wrap_width: u32,
    /// Top of the first line.
    pub y: u32,
    /// Vertical distance between consecutive line tops.
    pub line_height: u32,
}

impl TextBlock {
    pub fn height(&self) -> u32 {
        self.line_height * self.lines.len() as u32
    }
}

/// A caption background + text pair visible for one time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayLayer {
    /// Index of the caption this overlay renders.
    pub caption_index: usize,
    pub background: BackgroundBox,
    pub text: TextBlock,
    pub anchor: Anchor,
    pub window: TimeWindow,
}

impl OverlayLayer {
    pub fn is_visible_at(&self, t: f64) -> bool {
        self.window.contains(t)
    }
}
