//! ffprobe output parsing.

use std::path::Path;

use reelsmith_common::error::{ReelsmithError, ReelsmithResult};
use reelsmith_project_model::FrameSize;
use serde::{Deserialize, Serialize};

/// Container-level facts about a media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub duration_secs: f64,
    pub format_name: String,
    pub video: Option<VideoStreamInfo>,
    pub audio: Option<AudioStreamInfo>,
}

/// First video stream of a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoStreamInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub codec: String,
}

impl VideoStreamInfo {
    pub fn frame_size(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }
}

/// First audio stream of a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioStreamInfo {
    pub sample_rate: u32,
    pub channels: u16,
    pub codec: String,
}

/// Arguments for `ffprobe` producing the JSON consumed by [`parse_probe_output`].
pub fn probe_args(path: &Path) -> Vec<String> {
    vec![
        "-v".to_string(),
        "error".to_string(),
        "-print_format".to_string(),
        "json".to_string(),
        "-show_format".to_string(),
        "-show_streams".to_string(),
        path.display().to_string(),
    ]
}

/// Parse `ffprobe -print_format json -show_format -show_streams` output.
///
/// A missing container duration falls back to the longest stream duration.
pub fn parse_probe_output(path: &Path, json_str: &str) -> ReelsmithResult<MediaInfo> {
    let json: serde_json::Value = serde_json::from_str(json_str).map_err(|e| {
        ReelsmithError::unsupported_format(path, format!("unreadable probe output: {e}"))
    })?;

    let format = json
        .get("format")
        .ok_or_else(|| ReelsmithError::unsupported_format(path, "probe output has no format"))?;

    let format_name = format
        .get("format_name")
        .and_then(|f| f.as_str())
        .unwrap_or("unknown")
        .to_string();

    let streams = json
        .get("streams")
        .and_then(|s| s.as_array())
        .cloned()
        .unwrap_or_default();

    let mut video = None;
    let mut audio = None;
    let mut longest_stream_secs = 0.0f64;

    for stream in &streams {
        if let Some(secs) = parse_f64_field(stream, "duration") {
            longest_stream_secs = longest_stream_secs.max(secs);
        }
        match stream.get("codec_type").and_then(|c| c.as_str()) {
            Some("video") if video.is_none() => video = Some(parse_video_stream(stream)),
            Some("audio") if audio.is_none() => audio = Some(parse_audio_stream(stream)),
            _ => {}
        }
    }

    let duration_secs = parse_f64_field(format, "duration").unwrap_or(longest_stream_secs);

    Ok(MediaInfo {
        duration_secs,
        format_name,
        video,
        audio,
    })
}

fn parse_f64_field(value: &serde_json::Value, key: &str) -> Option<f64> {
    value
        .get(key)
        .and_then(|d| d.as_str())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|d| d.is_finite())
}

fn parse_video_stream(stream: &serde_json::Value) -> VideoStreamInfo {
    let width = stream.get("width").and_then(|w| w.as_u64()).unwrap_or(0) as u32;
    let height = stream.get("height").and_then(|h| h.as_u64()).unwrap_or(0) as u32;

    // r_frame_rate is a rational such as "30/1" or "30000/1001".
    let fps = stream
        .get("r_frame_rate")
        .and_then(|f| f.as_str())
        .and_then(parse_rational)
        .unwrap_or(30.0);

    let codec = stream
        .get("codec_name")
        .and_then(|c| c.as_str())
        .unwrap_or("unknown")
        .to_string();

    VideoStreamInfo {
        width,
        height,
        fps,
        codec,
    }
}

fn parse_audio_stream(stream: &serde_json::Value) -> AudioStreamInfo {
    let sample_rate = stream
        .get("sample_rate")
        .and_then(|s| s.as_str())
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(44_100);

    let channels = stream.get("channels").and_then(|c| c.as_u64()).unwrap_or(2) as u16;

    let codec = stream
        .get("codec_name")
        .and_then(|c| c.as_str())
        .unwrap_or("unknown")
        .to_string();

    AudioStreamInfo {
        sample_rate,
        channels,
        codec,
    }
}

fn parse_rational(raw: &str) -> Option<f64> {
    match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            (den > 0.0).then(|| num / den)
        }
        None => raw.parse().ok(),
    }
}
