//! Timeline compositor: stacks caption overlays over the base video and
//! aligns them with the final audio.
//!
//! Composition is declarative. Nothing here touches the filesystem; the
//! resulting [`Timeline`] is the render plan handed to the encoder.

use std::path::PathBuf;

use reelsmith_common::error::{ReelsmithError, ReelsmithResult};
use reelsmith_media::MediaResource;
use reelsmith_project_model::{FitConstraint, FrameSize, Orientation, OverlayLayer, TimeWindow};
use serde::Serialize;

use crate::mixer::AudioStream;

/// The base video track, scaled to the output frame.
#[derive(Debug, Clone, Serialize)]
pub struct VideoLayer {
    pub path: PathBuf,
    /// Native frame size of the source.
    pub source: FrameSize,
    /// Frame size after fitting.
    pub output: FrameSize,
    pub duration_secs: f64,
}

/// Video, overlays and audio aligned on one clock.
#[derive(Debug, Clone, Serialize)]
pub struct Timeline {
    pub base: VideoLayer,
    /// Caption overlays in caption order, bottom to top.
    pub overlays: Vec<OverlayLayer>,
    pub audio: AudioStream,
    /// `min(video, audio)`; never extrapolated past either input.
    pub output_duration_secs: f64,
}

impl Timeline {
    pub fn frame(&self) -> FrameSize {
        self.base.output
    }

    /// Overlays visible at output time `t`.
    pub fn visible_overlays_at(&self, t: f64) -> impl Iterator<Item = &OverlayLayer> + '_ {
        let in_range = t >= 0.0 && t < self.output_duration_secs;
        self.overlays
            .iter()
            .filter(move |overlay| in_range && overlay.is_visible_at(t))
    }

    /// The part of an overlay's window that survives duration clamping.
    pub fn effective_window(&self, overlay: &OverlayLayer) -> Option<TimeWindow> {
        overlay.window.clamp_to(self.output_duration_secs)
    }

    /// Overlays that are shown for at least part of the output.
    pub fn playable_overlays(&self) -> impl Iterator<Item = &OverlayLayer> + '_ {
        self.overlays
            .iter()
            .filter(|overlay| self.effective_window(overlay).is_some())
    }

    pub fn total_frames(&self, fps: u32) -> u64 {
        (self.output_duration_secs * fps.max(1) as f64).ceil() as u64
    }
}

/// Output frame for `source` under the orientation's fit rule.
///
/// Landscape pins height to 720, portrait pins width to 720; the other edge
/// follows the source aspect ratio, rounded to an even pixel count for
/// yuv420p.
pub fn fit_frame(source: FrameSize, orientation: Orientation) -> ReelsmithResult<FrameSize> {
    if source.is_empty() {
        return Err(ReelsmithError::invalid_options(format!(
            "cannot fit empty source frame {source}"
        )));
    }

    let frame = match orientation.fit_constraint() {
        FitConstraint::Height(height) => {
            let width = source.width as f64 * height as f64 / source.height as f64;
            FrameSize::new(round_even(width), height)
        }
        FitConstraint::Width(width) => {
            let height = source.height as f64 * width as f64 / source.width as f64;
            FrameSize::new(width, round_even(height))
        }
    };
    Ok(frame)
}

fn round_even(value: f64) -> u32 {
    (((value / 2.0).round() as u32) * 2).max(2)
}

/// Merge the base video, caption overlays and final audio into a timeline.
pub fn compose(
    video: &MediaResource,
    mut overlays: Vec<OverlayLayer>,
    audio: AudioStream,
    output: FrameSize,
) -> ReelsmithResult<Timeline> {
    let source = video.dimensions().ok_or_else(|| {
        ReelsmithError::unsupported_format(video.path(), "base layer has no video stream")
    })?;
    if output.is_empty() {
        return Err(ReelsmithError::invalid_options(format!(
            "output frame {output} is empty"
        )));
    }

    let output_duration_secs = video.duration_secs().min(audio.duration_secs());
    if !output_duration_secs.is_finite() || output_duration_secs <= 0.0 {
        return Err(ReelsmithError::encode_failed(format!(
            "timeline has no playable duration ({output_duration_secs}s)"
        )));
    }

    overlays.sort_by_key(|overlay| overlay.caption_index);

    let timeline = Timeline {
        base: VideoLayer {
            path: video.path().to_path_buf(),
            source,
            output,
            duration_secs: video.duration_secs(),
        },
        overlays,
        audio,
        output_duration_secs,
    };

    tracing::debug!(
        video_secs = video.duration_secs(),
        audio_secs = timeline.audio.duration_secs(),
        output_secs = output_duration_secs,
        overlays = timeline.overlays.len(),
        playable = timeline.playable_overlays().count(),
        frame = %output,
        "Timeline composed"
    );
    Ok(timeline)
}
