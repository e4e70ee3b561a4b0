//! Opened media inputs.
//!
//! A [`MediaResource`] is validated at open time (the file exists, probes
//! cleanly, and has the stream its kind requires). Decoded audio is cached
//! on the handle and released by [`MediaResource::close`], which also runs
//! on drop so every exit path of a render frees it.

use std::path::{Path, PathBuf};

use reelsmith_common::error::{ReelsmithError, ReelsmithResult};
use reelsmith_project_model::FrameSize;
use serde::{Deserialize, Serialize};

use crate::pcm::{PcmBuffer, PcmFormat};
use crate::probe::MediaInfo;
use crate::toolkit::MediaToolkit;

/// What a resource is opened as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

/// An opened video or audio input.
#[derive(Debug)]
pub struct MediaResource {
    kind: MediaKind,
    path: PathBuf,
    info: MediaInfo,
    decoded: Option<PcmBuffer>,
    closed: bool,
}

impl MediaResource {
    /// Open and validate `path` as `kind`.
    pub fn open(
        toolkit: &dyn MediaToolkit,
        path: impl AsRef<Path>,
        kind: MediaKind,
    ) -> ReelsmithResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ReelsmithError::not_found(path));
        }

        let info = toolkit.probe(path)?;
        let resource = Self::from_info(path, kind, info)?;

        tracing::debug!(
            path = %path.display(),
            kind = kind.as_str(),
            duration_secs = resource.duration_secs(),
            toolkit = toolkit.name(),
            "Opened media resource"
        );
        Ok(resource)
    }

    /// Build a handle from already-probed metadata.
    pub fn from_info(
        path: impl Into<PathBuf>,
        kind: MediaKind,
        info: MediaInfo,
    ) -> ReelsmithResult<Self> {
        let path = path.into();

        if !info.duration_secs.is_finite() || info.duration_secs <= 0.0 {
            return Err(ReelsmithError::unsupported_format(
                &path,
                format!("unusable duration {}", info.duration_secs),
            ));
        }

        match kind {
            MediaKind::Video => match &info.video {
                Some(video) if !video.frame_size().is_empty() => {}
                Some(video) => {
                    return Err(ReelsmithError::unsupported_format(
                        &path,
                        format!("video stream has empty frame {}", video.frame_size()),
                    ))
                }
                None => {
                    return Err(ReelsmithError::unsupported_format(
                        &path,
                        "no video stream",
                    ))
                }
            },
            MediaKind::Audio => {
                if info.audio.is_none() {
                    return Err(ReelsmithError::unsupported_format(
                        &path,
                        "no audio stream",
                    ));
                }
            }
        }

        Ok(Self {
            kind,
            path,
            info,
            decoded: None,
            closed: false,
        })
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self) -> &MediaInfo {
        &self.info
    }

    pub fn duration_secs(&self) -> f64 {
        self.info.duration_secs
    }

    /// Frame size of a video resource.
    pub fn dimensions(&self) -> Option<FrameSize> {
        match self.kind {
            MediaKind::Video => self.info.video.as_ref().map(|v| v.frame_size()),
            MediaKind::Audio => None,
        }
    }

    /// Native sample rate of an audio resource.
    pub fn sample_rate(&self) -> Option<u32> {
        match self.kind {
            MediaKind::Audio => self.info.audio.as_ref().map(|a| a.sample_rate),
            MediaKind::Video => None,
        }
    }

    /// Decode (once per format) and borrow the audio samples.
    pub fn decode_audio(
        &mut self,
        toolkit: &dyn MediaToolkit,
        format: PcmFormat,
    ) -> ReelsmithResult<&PcmBuffer> {
        if self.closed {
            return Err(ReelsmithError::unsupported(format!(
                "{} was already closed",
                self.path.display()
            )));
        }

        let cached = matches!(&self.decoded, Some(buffer) if buffer.format == format);
        if !cached {
            self.decoded = Some(toolkit.decode_audio(&self.path, format)?);
        }

        self.decoded
            .as_ref()
            .ok_or_else(|| ReelsmithError::unsupported("decoded audio missing after decode"))
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Release decode state. Safe to call any number of times.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.decoded = None;
        self.closed = true;
        tracing::debug!(path = %self.path.display(), kind = self.kind.as_str(), "Closed media resource");
    }
}

impl Drop for MediaResource {
    fn drop(&mut self) {
        self.close();
    }
}
