//! Interleaved 16-bit PCM buffers.

use std::path::Path;

use reelsmith_common::error::{ReelsmithError, ReelsmithResult};
use serde::{Deserialize, Serialize};

/// Sample rate and channel layout of a PCM stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl PcmFormat {
    pub const fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Number of frames covering `secs`, rounded to the nearest frame.
    pub fn frames_for(&self, secs: f64) -> usize {
        (secs.max(0.0) * self.sample_rate as f64).round() as usize
    }
}

/// Decoded audio held in memory as interleaved signed 16-bit samples.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PcmBuffer {
    pub format: PcmFormat,
    #[serde(skip)]
    samples: Vec<i16>,
}

impl PcmBuffer {
    /// Wrap interleaved samples. A trailing partial frame is dropped.
    pub fn new(format: PcmFormat, mut samples: Vec<i16>) -> Self {
        let channels = format.channels.max(1) as usize;
        samples.truncate(samples.len() - samples.len() % channels);
        Self { format, samples }
    }

    pub fn silence(format: PcmFormat, frames: usize) -> Self {
        Self {
            format,
            samples: vec![0; frames * format.channels.max(1) as usize],
        }
    }

    /// Decode raw `s16le` bytes as produced by `ffmpeg -f s16le`.
    pub fn from_le_bytes(format: PcmFormat, bytes: &[u8]) -> Self {
        let samples = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Self::new(format, samples)
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.format.channels.max(1) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.format.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.format.sample_rate as f64
    }

    /// Write a 16-bit PCM WAV file.
    pub fn write_wav(&self, path: &Path) -> ReelsmithResult<()> {
        let spec = hound::WavSpec {
            channels: self.format.channels,
            sample_rate: self.format.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let wav_err = |e: hound::Error| {
            ReelsmithError::encode_failed(format!("failed to write WAV {}: {e}", path.display()))
        };

        let mut writer = hound::WavWriter::create(path, spec).map_err(wav_err)?;
        for &sample in &self.samples {
            writer.write_sample(sample).map_err(wav_err)?;
        }
        writer.finalize().map_err(wav_err)
    }

    /// Read a 16-bit PCM WAV file.
    pub fn read_wav(path: &Path) -> ReelsmithResult<Self> {
        let reader = hound::WavReader::open(path).map_err(|e| {
            ReelsmithError::unsupported_format(path, format!("failed to open WAV: {e}"))
        })?;

        let spec = reader.spec();
        if spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int {
            return Err(ReelsmithError::unsupported_format(
                path,
                format!(
                    "expected 16-bit integer PCM, got {}-bit {:?}",
                    spec.bits_per_sample, spec.sample_format
                ),
            ));
        }

        let samples = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ReelsmithError::unsupported_format(path, format!("corrupt WAV: {e}")))?;

        Ok(Self::new(
            PcmFormat::new(spec.sample_rate, spec.channels),
            samples,
        ))
    }
}
