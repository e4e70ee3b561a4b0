//! Caption layout engine.
//!
//! Turns narration into overlay layers: one translucent full-width box and
//! one block of word-wrapped text per sentence, each shown for its fixed
//! three-second slot. A caption that cannot be laid out is skipped and
//! recorded; the remaining captions keep their original slots.

use reelsmith_common::error::{Diagnostic, ReelsmithError, ReelsmithResult};
use reelsmith_project_model::{
    split_captions, Anchor, BackgroundBox, CaptionSpec, Color, FrameSize, Orientation,
    OverlayLayer, TextBlock,
};
use serde::{Deserialize, Serialize};

/// Width available to caption text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum WrapWidth {
    /// A fraction of the frame width.
    Fraction(f64),
    /// Frame width minus a fixed pixel inset.
    Inset(u32),
}

impl Default for WrapWidth {
    fn default() -> Self {
        Self::Fraction(0.8)
    }
}

impl WrapWidth {
    pub fn resolve(self, frame_width: u32) -> u32 {
        match self {
            Self::Fraction(fraction) => {
                (frame_width as f64 * fraction.clamp(0.0, 1.0)).round() as u32
            }
            Self::Inset(inset) => frame_width.saturating_sub(inset),
        }
    }
}

/// Styling knobs for caption overlays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionLayoutConfig {
    pub wrap_width: WrapWidth,
    /// Average glyph advance as a fraction of font size, used for wrapping.
    pub glyph_advance: f64,
    /// Line height as a multiple of font size.
    pub line_spacing: f64,
    pub background_color: Color,
    pub background_opacity: f64,
    pub text_color: Color,
}

impl Default for CaptionLayoutConfig {
    fn default() -> Self {
        Self {
            wrap_width: WrapWidth::default(),
            glyph_advance: 0.55,
            line_spacing: 1.2,
            background_color: Color::BLACK,
            background_opacity: 0.5,
            text_color: Color::WHITE,
        }
    }
}

/// A caption that was left out of the render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedCaption {
    pub index: usize,
    pub text: String,
    pub reason: String,
}

/// Overlays for a narration, plus the captions that were skipped.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CaptionLayout {
    pub overlays: Vec<OverlayLayer>,
    pub skipped: Vec<SkippedCaption>,
    /// Non-empty sentences found in the narration.
    pub captions_total: usize,
}

impl CaptionLayout {
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.skipped
            .iter()
            .map(|skip| Diagnostic::from(&ReelsmithError::overlay(skip.index, &skip.reason)))
            .collect()
    }
}

/// Lays out caption overlays for a frame and orientation.
#[derive(Debug, Clone, Default)]
pub struct CaptionLayoutEngine {
    config: CaptionLayoutConfig,
}

impl CaptionLayoutEngine {
    pub fn new(config: CaptionLayoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CaptionLayoutConfig {
        &self.config
    }

    /// Split `text` into sentences and lay out one overlay per sentence.
    pub fn layout(&self, text: &str, frame: FrameSize, orientation: Orientation) -> CaptionLayout {
        let captions = split_captions(text);
        let mut layout = CaptionLayout {
            overlays: Vec::with_capacity(captions.len()),
            skipped: Vec::new(),
            captions_total: captions.len(),
        };

        for caption in &captions {
            match self.build_overlay(caption, frame, orientation) {
                Ok(overlay) => layout.overlays.push(overlay),
                Err(err) => {
                    tracing::warn!(
                        index = caption.index,
                        error = %err,
                        "Skipping caption overlay"
                    );
                    layout.skipped.push(SkippedCaption {
                        index: caption.index,
                        text: caption.text.clone(),
                        reason: match err {
                            ReelsmithError::OverlayConstructionFailed { message, .. } => message,
                            other => other.to_string(),
                        },
                    });
                }
            }
        }

        tracing::debug!(
            captions = layout.captions_total,
            overlays = layout.overlays.len(),
            skipped = layout.skipped.len(),
            frame = %frame,
            "Caption layout complete"
        );
        layout
    }

    /// Build the background + text pair for one caption.
    pub fn build_overlay(
        &self,
        caption: &CaptionSpec,
        frame: FrameSize,
        orientation: Orientation,
    ) -> ReelsmithResult<OverlayLayer> {
        if frame.is_empty() {
            return Err(ReelsmithError::overlay(
                caption.index,
                format!("cannot place caption on empty frame {frame}"),
            ));
        }

        if let Some(glyph) = find_unsupported_glyph(&caption.text) {
            return Err(ReelsmithError::overlay(
                caption.index,
                format!("unsupported glyph U+{:04X}", glyph as u32),
            ));
        }

        let font_size = orientation.caption_font_size();
        let wrap_width = self.config.wrap_width.resolve(frame.width);
        let glyph_width = font_size as f64 * self.config.glyph_advance;
        let max_chars = (wrap_width as f64 / glyph_width).floor() as usize;
        if max_chars == 0 {
            return Err(ReelsmithError::overlay(
                caption.index,
                format!("wrap width {wrap_width}px is narrower than one glyph"),
            ));
        }

        let offset_ratio = orientation.caption_offset_ratio();
        let box_height = orientation.caption_box_height().min(frame.height);
        let box_y = ((frame.height as f64 * offset_ratio).round() as u32)
            .min(frame.height - box_height);

        let lines = wrap_text(&caption.text, max_chars);
        let line_height = (font_size as f64 * self.config.line_spacing).round() as u32;
        let text_height = line_height * lines.len() as u32;
        // Text that overflows the box grows upward from the box bottom.
        let text_y = if text_height <= box_height {
            box_y + (box_height - text_height) / 2
        } else {
            (box_y + box_height).saturating_sub(text_height)
        };

        Ok(OverlayLayer {
            caption_index: caption.index,
            background: BackgroundBox {
                x: 0,
                y: box_y,
                width: frame.width,
                height: box_height,
                color: self.config.background_color,
                opacity: self.config.background_opacity,
            },
            text: TextBlock {
                content: caption.text.clone(),
                lines,
                font_size,
                color: self.config.text_color,
                wrap_width,
                y: text_y,
                line_height,
            },
            anchor: Anchor::BottomCenter { offset_ratio },
            window: caption.window(),
        })
    }
}

/// Lay out captions with the default style.
pub fn layout_captions(text: &str, frame: FrameSize, orientation: Orientation) -> CaptionLayout {
    CaptionLayoutEngine::default().layout(text, frame, orientation)
}

/// Greedy word wrap to at most `max_chars` characters per line.
/// Words longer than a line are split across lines.
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let chars: Vec<char> = word.chars().collect();
        for chunk in chars.chunks(max_chars) {
            let piece: String = chunk.iter().collect();
            let needed = if current_len == 0 {
                chunk.len()
            } else {
                current_len + 1 + chunk.len()
            };

            if needed > max_chars && current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if current_len > 0 {
                current.push(' ');
                current_len += 1;
            }
            current.push_str(&piece);
            current_len += chunk.len();
        }
    }

    if current_len > 0 {
        lines.push(current);
    }
    lines
}

/// Characters the text renderer cannot draw.
fn find_unsupported_glyph(text: &str) -> Option<char> {
    text.chars().find(|&c| {
        (c.is_control() && !c.is_whitespace())
            || c == char::REPLACEMENT_CHARACTER
            || ('\u{E000}'..='\u{F8FF}').contains(&c)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelsmith_common::error::ErrorKind;

    const LANDSCAPE: FrameSize = FrameSize::new(1280, 720);
    const PORTRAIT: FrameSize = FrameSize::new(720, 1280);

    #[test]
    fn test_one_overlay_per_sentence_in_order() {
        let layout = layout_captions(
            "Nature is beautiful. Skies are wide. Rivers flow free.",
            LANDSCAPE,
            Orientation::Landscape,
        );
        assert_eq!(layout.captions_total, 3);
        assert_eq!(layout.overlays.len(), 3);
        assert!(layout.skipped.is_empty());

        for (i, overlay) in layout.overlays.iter().enumerate() {
            assert_eq!(overlay.caption_index, i);
            assert_eq!(overlay.window.start_secs, 3.0 * i as f64);
            assert_eq!(overlay.window.duration_secs, 3.0);
        }
        assert_eq!(layout.overlays[1].text.content, "Skies are wide");
    }

    #[test]
    fn test_landscape_geometry() {
        let layout = layout_captions("Nature is beautiful.", LANDSCAPE, Orientation::Landscape);
        let overlay = &layout.overlays[0];

        assert_eq!(overlay.background.width, 1280);
        assert_eq!(overlay.background.height, 80);
        assert_eq!(overlay.background.y, 576);
        assert_eq!(overlay.background.color, Color::BLACK);
        assert_eq!(overlay.background.opacity, 0.5);

        assert_eq!(overlay.text.font_size, 30);
        assert_eq!(overlay.text.wrap_width, 1024);
        assert_eq!(overlay.text.color, Color::WHITE);
        assert_eq!(overlay.text.lines, vec!["Nature is beautiful"]);
        assert_eq!(overlay.text.line_height, 36);
        assert_eq!(overlay.text.y, 576 + (80 - 36) / 2);
        assert_eq!(overlay.anchor, Anchor::BottomCenter { offset_ratio: 0.8 });
    }

    #[test]
    fn test_portrait_geometry() {
        let layout = layout_captions("Skies are wide.", PORTRAIT, Orientation::Portrait);
        let overlay = &layout.overlays[0];

        assert_eq!(overlay.background.width, 720);
        assert_eq!(overlay.background.height, 100);
        assert_eq!(overlay.background.y, 1152);
        assert_eq!(overlay.text.font_size, 25);
        assert_eq!(overlay.text.wrap_width, 576);
        assert_eq!(overlay.anchor, Anchor::BottomCenter { offset_ratio: 0.9 });
    }

    #[test]
    fn test_box_stays_inside_short_frame() {
        let frame = FrameSize::new(400, 90);
        let layout = layout_captions("Tiny frame.", frame, Orientation::Portrait);
        let overlay = &layout.overlays[0];
        assert_eq!(overlay.background.height, 90);
        assert_eq!(overlay.background.y, 0);
    }

    #[test]
    fn test_inset_wrap_width() {
        let engine = CaptionLayoutEngine::new(CaptionLayoutConfig {
            wrap_width: WrapWidth::Inset(40),
            ..CaptionLayoutConfig::default()
        });
        let layout = engine.layout("Rivers flow free.", LANDSCAPE, Orientation::Landscape);
        assert_eq!(layout.overlays[0].text.wrap_width, 1240);
    }

    #[test]
    fn test_long_caption_wraps_and_grows_upward() {
        let text = "The quiet valley holds a river that winds past ancient stones and \
                    whispering pines toward a distant and endless sea";
        let layout = layout_captions(text, PORTRAIT, Orientation::Portrait);
        let overlay = &layout.overlays[0];

        assert!(overlay.text.lines.len() > 1);
        let max_chars = (576.0 / (25.0 * 0.55)) as usize;
        assert!(overlay
            .text
            .lines
            .iter()
            .all(|line| line.chars().count() <= max_chars));

        let box_bottom = overlay.background.y + overlay.background.height;
        if overlay.text.height() > overlay.background.height {
            assert_eq!(overlay.text.y + overlay.text.height(), box_bottom);
        }
    }

    #[test]
    fn test_bad_caption_is_skipped_others_kept() {
        let layout = layout_captions(
            "First line. Broken \u{7} bell. Third line.",
            LANDSCAPE,
            Orientation::Landscape,
        );

        assert_eq!(layout.captions_total, 3);
        assert_eq!(layout.overlays.len(), 2);
        assert_eq!(layout.overlays[0].caption_index, 0);
        assert_eq!(layout.overlays[1].caption_index, 2);
        // The survivor keeps its original slot.
        assert_eq!(layout.overlays[1].window.start_secs, 6.0);

        assert_eq!(layout.skipped.len(), 1);
        assert_eq!(layout.skipped[0].index, 1);
        assert!(layout.skipped[0].reason.contains("U+0007"));

        let diagnostics = layout.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, ErrorKind::OverlayConstructionFailed);
    }

    #[test]
    fn test_empty_frame_fails_every_caption() {
        let layout = layout_captions("One. Two.", FrameSize::new(0, 0), Orientation::Landscape);
        assert!(layout.overlays.is_empty());
        assert_eq!(layout.skipped.len(), 2);
    }

    #[test]
    fn test_wrap_text() {
        assert_eq!(
            wrap_text("Rivers flow free", 11),
            vec!["Rivers flow", "free"]
        );
        assert_eq!(wrap_text("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        assert_eq!(wrap_text("a bcdefgh", 4), vec!["a", "bcde", "fgh"]);
        assert!(wrap_text("   ", 10).is_empty());
    }

    #[test]
    fn test_unsupported_glyphs() {
        assert_eq!(find_unsupported_glyph("plain text, with tab\t"), None);
        assert_eq!(find_unsupported_glyph("café déjà vu"), None);
        assert_eq!(find_unsupported_glyph("bell\u{7}"), Some('\u{7}'));
        assert_eq!(find_unsupported_glyph("lost \u{FFFD}"), Some('\u{FFFD}'));
        assert_eq!(find_unsupported_glyph("icon \u{E001}"), Some('\u{E001}'));
    }
}
