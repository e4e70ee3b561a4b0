//! The media toolkit seam: probing and decoding inputs.
//!
//! The render engine only ever talks to [`MediaToolkit`]; production code
//! uses [`FfmpegToolkit`], which shells out to `ffprobe` and `ffmpeg`.

use std::path::Path;
use std::process::{Command, Stdio};

use reelsmith_common::config::RenderDefaults;
use reelsmith_common::error::{ReelsmithError, ReelsmithResult};

use crate::pcm::{PcmBuffer, PcmFormat};
use crate::probe::{parse_probe_output, probe_args, MediaInfo};

/// Probing and decoding backend for media inputs.
pub trait MediaToolkit: Send + Sync {
    /// Inspect a file's container and first audio/video streams.
    fn probe(&self, path: &Path) -> ReelsmithResult<MediaInfo>;

    /// Decode the first audio stream, resampled to `format`.
    fn decode_audio(&self, path: &Path, format: PcmFormat) -> ReelsmithResult<PcmBuffer>;

    /// Toolkit name for logs.
    fn name(&self) -> &str;
}

/// [`MediaToolkit`] backed by the ffmpeg command-line tools.
#[derive(Debug, Clone)]
pub struct FfmpegToolkit {
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl Default for FfmpegToolkit {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl FfmpegToolkit {
    pub fn new(ffmpeg_path: impl Into<String>, ffprobe_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
        }
    }

    pub fn from_config(render: &RenderDefaults) -> Self {
        Self::new(&render.ffmpeg_path, &render.ffprobe_path)
    }

    pub fn ffmpeg_path(&self) -> &str {
        &self.ffmpeg_path
    }

    pub fn ffprobe_path(&self) -> &str {
        &self.ffprobe_path
    }

    /// Whether both binaries can be found.
    pub fn is_available(&self) -> bool {
        command_exists(&self.ffmpeg_path) && command_exists(&self.ffprobe_path)
    }
}

impl MediaToolkit for FfmpegToolkit {
    fn probe(&self, path: &Path) -> ReelsmithResult<MediaInfo> {
        let output = Command::new(&self.ffprobe_path)
            .args(probe_args(path))
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                ReelsmithError::unsupported(format!("failed to start {}: {e}", self.ffprobe_path))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ReelsmithError::unsupported_format(
                path,
                format!("ffprobe failed: {}", stderr.trim()),
            ));
        }

        parse_probe_output(path, &String::from_utf8_lossy(&output.stdout))
    }

    fn decode_audio(&self, path: &Path, format: PcmFormat) -> ReelsmithResult<PcmBuffer> {
        tracing::debug!(
            path = %path.display(),
            sample_rate = format.sample_rate,
            channels = format.channels,
            "Decoding audio"
        );

        let sample_rate = format.sample_rate.to_string();
        let channels = format.channels.to_string();
        let output = Command::new(&self.ffmpeg_path)
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(path)
            .args([
                "-vn",
                "-f",
                "s16le",
                "-acodec",
                "pcm_s16le",
                "-ar",
                sample_rate.as_str(),
                "-ac",
                channels.as_str(),
                "pipe:1",
            ])
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                ReelsmithError::unsupported(format!("failed to start {}: {e}", self.ffmpeg_path))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ReelsmithError::unsupported_format(
                path,
                format!("audio decode failed: {}", stderr.trim()),
            ));
        }

        let buffer = PcmBuffer::from_le_bytes(format, &output.stdout);
        if buffer.is_empty() {
            return Err(ReelsmithError::unsupported_format(
                path,
                "audio decode produced no samples",
            ));
        }
        Ok(buffer)
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

/// Whether `binary` resolves to an executable via the shell.
pub fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg("command -v \"$1\" >/dev/null 2>&1")
        .arg("sh")
        .arg(binary)
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toolkit_from_config() {
        let render = RenderDefaults {
            ffmpeg_path: "/opt/ffmpeg/bin/ffmpeg".to_string(),
            ffprobe_path: "/opt/ffmpeg/bin/ffprobe".to_string(),
            ..RenderDefaults::default()
        };
        let toolkit = FfmpegToolkit::from_config(&render);
        assert_eq!(toolkit.ffmpeg_path(), "/opt/ffmpeg/bin/ffmpeg");
        assert_eq!(toolkit.ffprobe_path(), "/opt/ffmpeg/bin/ffprobe");
    }

    #[test]
    fn test_missing_binary_is_not_available() {
        assert!(!command_exists("reelsmith-definitely-not-a-binary"));
        let toolkit = FfmpegToolkit::new("reelsmith-no-ffmpeg", "reelsmith-no-ffprobe");
        assert!(!toolkit.is_available());
    }

    #[cfg(unix)]
    #[test]
    fn test_command_exists_with_quote_in_path() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let bin_dir = dir.path().join("it's bin");
        std::fs::create_dir(&bin_dir).unwrap();
        let binary = bin_dir.join("ffmpeg");
        std::fs::write(&binary, "#!/bin/sh\nexit 0\n").unwrap();
        std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755)).unwrap();

        let path = binary.display().to_string();
        assert!(command_exists(&path));
        assert!(!command_exists(&format!("{path}-missing")));
    }
}
