//! Audio mixer: voiceover plus optional looped background music.
//!
//! The voiceover (primary) always defines the output length. Music
//! (secondary) is repeated and cut to that length, scaled by a linear gain,
//! and summed sample-for-sample with saturation at the `i16` range.
//! Any failure on the music side degrades to voiceover-only output.

use std::path::PathBuf;

use reelsmith_common::error::{Diagnostic, ReelsmithError, ReelsmithResult};
use reelsmith_media::{MediaResource, MediaToolkit, PcmBuffer, PcmFormat};
use serde::Serialize;

/// Working format for mixed audio.
pub const MIX_FORMAT: PcmFormat = PcmFormat::new(44_100, 2);

/// How a secondary track is stretched to the primary's length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LoopPlan {
    /// Times the secondary is played back to back before truncation.
    pub repeats: usize,
    /// Length the repeated track is cut to.
    pub target_secs: f64,
}

/// `ceil(primary / secondary)` repeats when the secondary is shorter,
/// a single pass otherwise.
pub fn loop_plan(primary_secs: f64, secondary_secs: f64) -> LoopPlan {
    let repeats = if secondary_secs <= 0.0 {
        0
    } else if secondary_secs < primary_secs {
        (primary_secs / secondary_secs).ceil() as usize
    } else {
        1
    };
    LoopPlan {
        repeats,
        target_secs: primary_secs,
    }
}

/// Final audio for a render.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum AudioStream {
    /// The voiceover file, untouched.
    Passthrough { path: PathBuf, duration_secs: f64 },
    /// Voiceover and music summed in memory.
    Mixed {
        pcm: PcmBuffer,
        duration_secs: f64,
        loop_plan: LoopPlan,
        gain: f64,
    },
}

impl AudioStream {
    pub fn duration_secs(&self) -> f64 {
        match self {
            Self::Passthrough { duration_secs, .. } | Self::Mixed { duration_secs, .. } => {
                *duration_secs
            }
        }
    }

    pub fn is_mixed(&self) -> bool {
        matches!(self, Self::Mixed { .. })
    }
}

/// Result of a mix: the stream plus the reason for any fallback.
#[derive(Debug)]
pub struct MixOutcome {
    pub stream: AudioStream,
    pub diagnostic: Option<Diagnostic>,
}

/// Repeat `track` back to back and cut it to exactly `frames` frames.
pub fn repeat_to_frames(track: &PcmBuffer, frames: usize) -> PcmBuffer {
    let channels = track.format.channels.max(1) as usize;
    let wanted = frames * channels;
    let source = track.samples();
    if source.is_empty() {
        return PcmBuffer::silence(track.format, frames);
    }

    let samples = source.iter().copied().cycle().take(wanted).collect();
    PcmBuffer::new(track.format, samples)
}

/// Cut `track` to `frames` frames, padding with silence if it is short.
pub fn fit_to_frames(track: &PcmBuffer, frames: usize) -> PcmBuffer {
    let channels = track.format.channels.max(1) as usize;
    let wanted = frames * channels;
    let mut samples: Vec<i16> = track.samples().iter().copied().take(wanted).collect();
    samples.resize(wanted, 0);
    PcmBuffer::new(track.format, samples)
}

/// Sum `primary` with `secondary * gain`, looping the secondary to the
/// primary's length. Sums saturate at the `i16` range.
pub fn mix_buffers(
    primary: &PcmBuffer,
    secondary: &PcmBuffer,
    gain: f64,
) -> ReelsmithResult<PcmBuffer> {
    if primary.format != secondary.format {
        return Err(ReelsmithError::mix_failed(format!(
            "format mismatch: primary {:?}, secondary {:?}",
            primary.format, secondary.format
        )));
    }
    if secondary.is_empty() {
        return Err(ReelsmithError::mix_failed("background track has no samples"));
    }

    let gain = gain.clamp(0.0, 1.0);
    let looped = repeat_to_frames(secondary, primary.frames());
    let samples = primary
        .samples()
        .iter()
        .zip(looped.samples())
        .map(|(&voice, &music)| {
            let scaled = (music as f64 * gain).round() as i32;
            (voice as i32 + scaled).clamp(i16::MIN as i32, i16::MAX as i32) as i16
        })
        .collect();

    Ok(PcmBuffer::new(primary.format, samples))
}

/// Mixes a voiceover with optional background music.
pub struct AudioMixer<'a> {
    toolkit: &'a dyn MediaToolkit,
    format: PcmFormat,
}

impl<'a> AudioMixer<'a> {
    pub fn new(toolkit: &'a dyn MediaToolkit) -> Self {
        Self {
            toolkit,
            format: MIX_FORMAT,
        }
    }

    pub fn with_format(mut self, format: PcmFormat) -> Self {
        self.format = format;
        self
    }

    /// Mix `secondary` under `primary` at `gain`.
    ///
    /// Never fails: without a secondary, or when mixing fails, the primary
    /// is returned unchanged and the failure is reported as a diagnostic.
    pub fn mix(
        &self,
        primary: &mut MediaResource,
        secondary: Option<&mut MediaResource>,
        gain: f64,
    ) -> MixOutcome {
        let passthrough = AudioStream::Passthrough {
            path: primary.path().to_path_buf(),
            duration_secs: primary.duration_secs(),
        };

        let Some(secondary) = secondary else {
            return MixOutcome {
                stream: passthrough,
                diagnostic: None,
            };
        };

        match self.try_mix(primary, secondary, gain) {
            Ok(stream) => {
                tracing::info!(
                    duration_secs = stream.duration_secs(),
                    gain,
                    music = %secondary.path().display(),
                    "Mixed background music under voiceover"
                );
                MixOutcome {
                    stream,
                    diagnostic: None,
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "Background music mix failed, using voiceover only");
                MixOutcome {
                    stream: passthrough,
                    diagnostic: Some(Diagnostic::from(&err)),
                }
            }
        }
    }

    fn try_mix(
        &self,
        primary: &mut MediaResource,
        secondary: &mut MediaResource,
        gain: f64,
    ) -> ReelsmithResult<AudioStream> {
        let duration_secs = primary.duration_secs();
        let target_frames = self.format.frames_for(duration_secs);
        let plan = loop_plan(duration_secs, secondary.duration_secs());

        let voice = primary
            .decode_audio(self.toolkit, self.format)
            .map(|pcm| fit_to_frames(pcm, target_frames))
            .map_err(|e| ReelsmithError::mix_failed(format!("voiceover decode: {e}")))?;
        let music = secondary
            .decode_audio(self.toolkit, self.format)
            .map_err(|e| ReelsmithError::mix_failed(format!("music decode: {e}")))?;

        tracing::debug!(
            repeats = plan.repeats,
            target_frames,
            music_frames = music.frames(),
            "Looping background music"
        );

        let pcm = mix_buffers(&voice, music, gain)?;
        Ok(AudioStream::Mixed {
            pcm,
            duration_secs,
            loop_plan: plan,
            gain: gain.clamp(0.0, 1.0),
        })
    }
}
