//! Caption specs derived from narration text.
//!
//! Narration is split into sentences on `.`; each sentence becomes one
//! caption shown for a fixed three-second slot in sentence order.

use serde::{Deserialize, Serialize};

use crate::frame::TimeWindow;

/// How long each caption stays on screen.
pub const CAPTION_DURATION_SECS: f64 = 3.0;

/// Sentence terminator used to split narration.
pub const SENTENCE_TERMINATOR: char = '.';

/// One caption: a sentence and its slot on the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionSpec {
    /// Zero-based sentence index.
    pub index: usize,
    /// Trimmed sentence text (without the terminator).
    pub text: String,
    pub start_secs: f64,
    pub duration_secs: f64,
}

impl CaptionSpec {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
            start_secs: index as f64 * CAPTION_DURATION_SECS,
            duration_secs: CAPTION_DURATION_SECS,
        }
    }

    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start_secs, self.duration_secs)
    }
}

/// Split narration into captions, dropping empty sentences.
pub fn split_captions(text: &str) -> Vec<CaptionSpec> {
    text.split(SENTENCE_TERMINATOR)
        .map(str::trim)
        .filter(|sentence| !sentence.is_empty())
        .enumerate()
        .map(|(index, sentence)| CaptionSpec::new(index, sentence))
        .collect()
}
