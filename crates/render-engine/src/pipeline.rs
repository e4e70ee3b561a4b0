//! End-to-end render: open inputs, mix audio, lay out captions, compose,
//! encode.

use std::path::{Path, PathBuf};

use reelsmith_common::config::AppConfig;
use reelsmith_common::error::{Diagnostic, ReelsmithError, ReelsmithResult};
use reelsmith_media::{FfmpegToolkit, MediaKind, MediaResource, MediaToolkit};
use reelsmith_project_model::{FrameSize, Orientation, RenderOptions};
use serde::Serialize;

use crate::captions::{CaptionLayoutConfig, CaptionLayoutEngine, SkippedCaption, WrapWidth};
use crate::compositor::{compose, fit_frame, Timeline};
use crate::export::{
    export_timeline, EncoderSettings, ExportJob, FfmpegBackend, ProgressCallback, RenderBackend,
};
use crate::mixer::{AudioMixer, AudioStream};

/// Inputs for one render.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub video_path: PathBuf,
    pub voiceover_path: PathBuf,
    pub narration: String,
    pub options: RenderOptions,
    pub output_path: PathBuf,
}

impl RenderRequest {
    pub fn new(
        video_path: impl Into<PathBuf>,
        voiceover_path: impl Into<PathBuf>,
        narration: impl Into<String>,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            video_path: video_path.into(),
            voiceover_path: voiceover_path.into(),
            narration: narration.into(),
            options: RenderOptions::default(),
            output_path: output_path.into(),
        }
    }

    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }
}

/// Summary of a successful render.
#[derive(Debug, Clone, Serialize)]
pub struct RenderReport {
    pub output_path: PathBuf,
    pub duration_secs: f64,
    pub frame: FrameSize,
    pub orientation: Orientation,
    /// Overlays shown for at least part of the output.
    pub overlays_rendered: usize,
    pub captions_total: usize,
    pub music_mixed: bool,
    /// Non-fatal failures that were worked around.
    pub diagnostics: Vec<Diagnostic>,
}

/// A composed timeline that has not been encoded.
#[derive(Debug, Clone, Serialize)]
pub struct RenderPlan {
    pub timeline: Timeline,
    pub captions_total: usize,
    pub skipped: Vec<SkippedCaption>,
    /// Music that a full render would mix in, if any.
    pub music_path: Option<PathBuf>,
    pub encoder: EncoderSettings,
}

/// Renders narrated videos. One renderer may serve many requests; each
/// request opens and releases its own media handles.
pub struct VideoRenderer {
    toolkit: Box<dyn MediaToolkit>,
    backend: Box<dyn RenderBackend>,
    music_path: Option<PathBuf>,
    settings: EncoderSettings,
    layout: CaptionLayoutEngine,
}

impl VideoRenderer {
    pub fn new(toolkit: Box<dyn MediaToolkit>, backend: Box<dyn RenderBackend>) -> Self {
        Self {
            toolkit,
            backend,
            music_path: None,
            settings: EncoderSettings::default(),
            layout: CaptionLayoutEngine::default(),
        }
    }

    /// ffmpeg-backed renderer using the configured binaries, music track,
    /// caption font and wrap width.
    pub fn from_config(config: &AppConfig) -> Self {
        let settings = EncoderSettings {
            font_file: config.render.font_file.clone(),
            ..EncoderSettings::default()
        };
        let wrap_width = config
            .render
            .caption_inset
            .map_or_else(WrapWidth::default, WrapWidth::Inset);
        let layout = CaptionLayoutEngine::new(CaptionLayoutConfig {
            wrap_width,
            ..CaptionLayoutConfig::default()
        });

        Self::new(
            Box::new(FfmpegToolkit::from_config(&config.render)),
            Box::new(FfmpegBackend::new(&config.render.ffmpeg_path)),
        )
        .with_music_path(config.music_path())
        .with_encoder_settings(settings)
        .with_layout(layout)
    }

    pub fn with_music_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.music_path = Some(path.into());
        self
    }

    pub fn with_encoder_settings(mut self, settings: EncoderSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_layout(mut self, layout: CaptionLayoutEngine) -> Self {
        self.layout = layout;
        self
    }

    pub fn music_path(&self) -> Option<&Path> {
        self.music_path.as_deref()
    }

    /// Render `request` to its output path.
    pub fn render(
        &mut self,
        request: &RenderRequest,
        progress: Option<ProgressCallback>,
    ) -> ReelsmithResult<RenderReport> {
        let options = &request.options;
        options.validate()?;
        tracing::info!(
            video = %request.video_path.display(),
            voiceover = %request.voiceover_path.display(),
            orientation = options.orientation.as_str(),
            background_music = options.use_background_music,
            "Starting render"
        );

        let toolkit = self.toolkit.as_ref();
        let mut video = MediaResource::open(toolkit, &request.video_path, MediaKind::Video)?;
        let mut voiceover =
            MediaResource::open(toolkit, &request.voiceover_path, MediaKind::Audio)?;

        let mut diagnostics = Vec::new();
        let mut music = if options.use_background_music {
            self.open_music(&mut diagnostics)
        } else {
            None
        };

        let mix = AudioMixer::new(toolkit).mix(
            &mut voiceover,
            music.as_mut(),
            options.background_volume,
        );
        diagnostics.extend(mix.diagnostic);
        let music_mixed = mix.stream.is_mixed();

        let frame = fit_frame(source_frame(&video)?, options.orientation)?;
        let layout = self
            .layout
            .layout(&request.narration, frame, options.orientation);
        diagnostics.extend(layout.diagnostics());
        let captions_total = layout.captions_total;

        let timeline = compose(&video, layout.overlays, mix.stream, frame)?;
        let job = ExportJob {
            output_path: request.output_path.clone(),
            settings: self.settings.clone(),
        };
        let output_path = export_timeline(&timeline, &job, self.backend.as_mut(), progress)?;

        video.close();
        voiceover.close();
        if let Some(music) = music.as_mut() {
            music.close();
        }

        let report = RenderReport {
            output_path,
            duration_secs: timeline.output_duration_secs,
            frame,
            orientation: options.orientation,
            overlays_rendered: timeline.playable_overlays().count(),
            captions_total,
            music_mixed,
            diagnostics,
        };
        tracing::info!(
            output = %report.output_path.display(),
            duration_secs = report.duration_secs,
            overlays = report.overlays_rendered,
            diagnostics = report.diagnostics.len(),
            "Render complete"
        );
        Ok(report)
    }

    /// Probe inputs and compose the timeline without decoding or encoding.
    pub fn plan(&self, request: &RenderRequest) -> ReelsmithResult<RenderPlan> {
        let options = &request.options;
        options.validate()?;

        let toolkit = self.toolkit.as_ref();
        let video = MediaResource::open(toolkit, &request.video_path, MediaKind::Video)?;
        let voiceover = MediaResource::open(toolkit, &request.voiceover_path, MediaKind::Audio)?;

        let frame = fit_frame(source_frame(&video)?, options.orientation)?;
        let layout = self
            .layout
            .layout(&request.narration, frame, options.orientation);
        let audio = AudioStream::Passthrough {
            path: voiceover.path().to_path_buf(),
            duration_secs: voiceover.duration_secs(),
        };
        let timeline = compose(&video, layout.overlays, audio, frame)?;

        let music_path = self
            .music_path
            .as_ref()
            .filter(|path| options.use_background_music && path.is_file())
            .cloned();

        Ok(RenderPlan {
            timeline,
            captions_total: layout.captions_total,
            skipped: layout.skipped,
            music_path,
            encoder: self.settings.clone(),
        })
    }

    /// Open the configured music track. A missing file means no music; a
    /// file that fails to open is recorded and also means no music.
    fn open_music(&self, diagnostics: &mut Vec<Diagnostic>) -> Option<MediaResource> {
        let Some(path) = self.music_path.as_deref() else {
            tracing::info!("No background music configured");
            return None;
        };
        if !path.is_file() {
            tracing::info!(path = %path.display(), "Background music unavailable");
            return None;
        }

        match MediaResource::open(self.toolkit.as_ref(), path, MediaKind::Audio) {
            Ok(music) => Some(music),
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "Failed to open background music, using voiceover only"
                );
                let err =
                    ReelsmithError::mix_failed(format!("background music {}: {err}", path.display()));
                diagnostics.push(Diagnostic::from(&err));
                None
            }
        }
    }
}

fn source_frame(video: &MediaResource) -> ReelsmithResult<FrameSize> {
    video
        .dimensions()
        .ok_or_else(|| ReelsmithError::unsupported_format(video.path(), "no video stream"))
}

/// Render with the ffmpeg toolchain from `config`, off the async runtime.
pub async fn create_video(
    request: RenderRequest,
    config: &AppConfig,
    progress: Option<ProgressCallback>,
) -> ReelsmithResult<RenderReport> {
    let mut renderer = VideoRenderer::from_config(config);
    tokio::task::spawn_blocking(move || renderer.render(&request, progress))
        .await
        .map_err(|e| ReelsmithError::encode_failed(format!("render task failed: {e}")))?
}
