//! Render a captioned video.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use reelsmith_common::config::AppConfig;
use reelsmith_common::error::FailureReport;
use reelsmith_project_model::RawRenderOptions;
use reelsmith_render_engine::{create_video, ExportProgress, ProgressCallback, RenderRequest};

/// Inputs shared by `render` and `plan`.
#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Stock video file
    pub video: PathBuf,

    /// Voiceover audio file
    pub audio: PathBuf,

    /// Narration text; each sentence becomes one caption
    #[arg(long, required_unless_present = "text_file", conflicts_with = "text_file")]
    pub text: Option<String>,

    /// Read narration text from a file
    #[arg(long)]
    pub text_file: Option<PathBuf>,

    /// Output orientation: landscape|portrait
    #[arg(long, default_value = "landscape")]
    pub orientation: String,

    /// Mix background music under the voiceover: yes|no
    #[arg(long, default_value = "no")]
    pub background_music: String,

    /// Background music volume [0.0, 1.0] (defaults to the configured volume)
    #[arg(long)]
    pub background_volume: Option<f64>,

    /// Music track name inside the music directory (e.g. upbeat, relaxing)
    #[arg(long)]
    pub music_track: Option<String>,
}

impl RenderArgs {
    /// Build a request, applying the music track override to `config`.
    pub fn into_request(
        self,
        config: &mut AppConfig,
        output: PathBuf,
    ) -> anyhow::Result<RenderRequest> {
        let narration = match (self.text, &self.text_file) {
            (Some(text), _) => text,
            (None, Some(path)) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read narration from {}", path.display()))?,
            (None, None) => anyhow::bail!("Provide narration with --text or --text-file"),
        };

        let options = RawRenderOptions {
            orientation: Some(self.orientation),
            background_music: Some(self.background_music),
            background_volume: Some(
                self.background_volume
                    .unwrap_or(config.render.background_volume),
            ),
        }
        .into_options()?;

        if let Some(track) = self.music_track {
            config.render.music_track = track;
        }

        Ok(RenderRequest::new(self.video, self.audio, narration, output).with_options(options))
    }
}

/// `<output_dir>/final_video-<timestamp>.mp4`
pub fn default_output_path(config: &AppConfig) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S%.3f");
    config.output_dir.join(format!("final_video-{stamp}.mp4"))
}

pub async fn run(
    args: RenderArgs,
    output: Option<PathBuf>,
    json: bool,
    mut config: AppConfig,
) -> anyhow::Result<()> {
    let output_path = output.unwrap_or_else(|| default_output_path(&config));
    let request = args.into_request(&mut config, output_path)?;

    if !json {
        println!("Rendering: {}", request.video_path.display());
        println!("  Voiceover: {}", request.voiceover_path.display());
        println!("  Orientation: {}", request.options.orientation);
        if request.options.use_background_music {
            println!(
                "  Music: {} @ {:.2}",
                config.music_path().display(),
                request.options.background_volume
            );
        }
        println!("  Output: {}", request.output_path.display());
    }

    let progress_cb: Option<ProgressCallback> = if json {
        None
    } else {
        let cb: ProgressCallback = Box::new(|p: ExportProgress| {
            print!(
                "\r  Progress: {:.1}% ({}/{} frames, ETA: {:.0}s)  ",
                p.progress * 100.0,
                p.frames_rendered,
                p.total_frames,
                p.eta_secs,
            );
            std::io::stdout().flush().ok();
        });
        Some(cb)
    };

    match create_video(request, &config, progress_cb).await {
        Ok(report) => {
            if json {
                let mut value = serde_json::to_value(&report)?;
                value["success"] = serde_json::Value::Bool(true);
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("\nRender complete: {}", report.output_path.display());
                println!(
                    "  {:.2}s, {} ({} of {} captions shown)",
                    report.duration_secs,
                    report.frame,
                    report.overlays_rendered,
                    report.captions_total
                );
                for diagnostic in &report.diagnostics {
                    println!("  [WARN] {}: {}", diagnostic.kind, diagnostic.message);
                }
            }
            Ok(())
        }
        Err(e) => {
            let failure = FailureReport::from(&e);
            if json {
                let mut value = serde_json::to_value(&failure)?;
                value["success"] = serde_json::Value::Bool(false);
                println!("{}", serde_json::to_string_pretty(&value)?);
                std::process::exit(1);
            }
            Err(anyhow::anyhow!("Render failed ({}): {}", failure.kind, failure.message))
        }
    }
}
