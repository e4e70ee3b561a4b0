//! Encoder sink: turns a composed timeline into an ffmpeg invocation and
//! runs it.
//!
//! Output is encoded into a staging file beside the destination and only
//! moved into place once the encoder reports success, so a file at the
//! output path is always a complete render.

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use reelsmith_common::error::{ReelsmithError, ReelsmithResult};
use reelsmith_media::command_exists;
use serde::{Deserialize, Serialize};

use crate::compositor::Timeline;
use crate::mixer::AudioStream;

/// Fixed export frame rate.
pub const EXPORT_FPS: u32 = 24;

/// Codec and container parameters for the encoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderSettings {
    pub fps: u32,
    pub video_codec: String,
    pub audio_codec: String,
    pub preset: String,
    pub threads: u32,
    pub pixel_format: String,
    pub audio_bitrate_kbps: u32,
    /// Font for caption text. `None` lets ffmpeg pick through fontconfig.
    pub font_file: Option<PathBuf>,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            fps: EXPORT_FPS,
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            preset: "ultrafast".to_string(),
            threads: 2,
            pixel_format: "yuv420p".to_string(),
            audio_bitrate_kbps: 192,
            font_file: None,
        }
    }
}

/// Where and how to write an export.
#[derive(Debug, Clone)]
pub struct ExportJob {
    /// Final output file path.
    pub output_path: PathBuf,

    /// Encoder configuration.
    pub settings: EncoderSettings,
}

impl ExportJob {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
            settings: EncoderSettings::default(),
        }
    }
}

/// Progress callback for export rendering.
pub type ProgressCallback = Box<dyn Fn(ExportProgress) + Send>;

/// Export progress report.
#[derive(Debug, Clone, Serialize)]
pub struct ExportProgress {
    /// Current progress [0.0, 1.0].
    pub progress: f64,

    /// Frames rendered so far.
    pub frames_rendered: u64,

    /// Total frames to render.
    pub total_frames: u64,

    /// Estimated time remaining in seconds.
    pub eta_secs: f64,

    /// Current stage.
    pub stage: ExportStage,
}

impl ExportProgress {
    fn at_stage(stage: ExportStage, progress: f64, total_frames: u64) -> Self {
        Self {
            progress,
            frames_rendered: (progress * total_frames as f64).round() as u64,
            total_frames,
            eta_secs: 0.0,
            stage,
        }
    }
}

/// Stages of the export process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportStage {
    Preparing,
    Encoding,
    Finalizing,
    Complete,
}

/// A fully resolved encoder invocation.
#[derive(Debug, Clone)]
pub struct EncodePlan {
    /// Arguments passed to ffmpeg, excluding the binary.
    pub args: Vec<String>,
    pub filter_graph: String,
    /// File the encoder writes.
    pub output_path: PathBuf,
    pub total_frames: u64,
    pub duration_secs: f64,
}

/// Trait for render backends.
pub trait RenderBackend: Send {
    /// Execute the plan, writing `plan.output_path`.
    fn render(&mut self, plan: &EncodePlan, progress: Option<ProgressCallback>)
        -> ReelsmithResult<()>;

    /// Check if this backend is available on the system.
    fn is_available(&self) -> bool;

    /// Backend name.
    fn name(&self) -> &str;
}

/// Build the ffmpeg arguments for `timeline`.
///
/// Input 0 is the base video, input 1 the final audio. Overlays that never
/// play inside the output window are left out of the filter graph; `-t`
/// truncates everything else at the output duration.
pub fn build_encode_plan(
    timeline: &Timeline,
    audio_input: &Path,
    output_path: &Path,
    settings: &EncoderSettings,
) -> EncodePlan {
    let fps = settings.fps.max(1);
    let filter_graph = build_filter_graph(timeline, settings);

    let mut args = vec![
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-nostats".to_string(),
        "-progress".to_string(),
        "pipe:1".to_string(),
        "-i".to_string(),
        timeline.base.path.display().to_string(),
        "-i".to_string(),
        audio_input.display().to_string(),
        "-filter_complex".to_string(),
        filter_graph.clone(),
        "-map".to_string(),
        "[vout]".to_string(),
        "-map".to_string(),
        "1:a:0".to_string(),
        "-r".to_string(),
        fps.to_string(),
        "-t".to_string(),
        format!("{:.6}", timeline.output_duration_secs),
    ];
    args.append(&mut codec_args(settings));
    args.push("-f".to_string());
    args.push("mp4".to_string());
    args.push(output_path.display().to_string());

    EncodePlan {
        args,
        filter_graph,
        output_path: output_path.to_path_buf(),
        total_frames: timeline.total_frames(fps),
        duration_secs: timeline.output_duration_secs,
    }
}

fn build_filter_graph(timeline: &Timeline, settings: &EncoderSettings) -> String {
    let frame = timeline.frame();
    let mut graph = format!(
        "[0:v]scale={w}:{h}:flags=lanczos,setsar=1,fps={fps},format={pix}",
        w = frame.width,
        h = frame.height,
        fps = settings.fps.max(1),
        pix = settings.pixel_format,
    );

    for overlay in timeline.playable_overlays() {
        let window = &overlay.window;
        let enable = format!(
            "gte(t,{:.3})*lt(t,{:.3})",
            window.start_secs,
            window.end_secs()
        );

        let bg = &overlay.background;
        graph.push_str(&format!(
            ",drawbox=x={x}:y={y}:w={w}:h={h}:color={color}@{alpha:.2}:t=fill:enable='{enable}'",
            x = bg.x,
            y = bg.y,
            w = bg.width,
            h = bg.height,
            color = bg.color.to_hex(),
            alpha = bg.opacity,
        ));

        let text = &overlay.text;
        let font = settings
            .font_file
            .as_ref()
            .map(|path| format!("fontfile={}:", escape_drawtext_path(path)))
            .unwrap_or_default();
        for (line_index, line) in text.lines.iter().enumerate() {
            graph.push_str(&format!(
                ",drawtext={font}text={line}:fontsize={size}:fontcolor={color}:x=(w-text_w)/2:y={y}:enable='{enable}'",
                line = escape_drawtext(line),
                size = text.font_size,
                color = text.color.to_hex(),
                y = text.y + text.line_height * line_index as u32,
            ));
        }
    }

    graph.push_str("[vout]");
    graph
}

/// Escape caption text for a `drawtext` `text=` value inside the filter graph.
///
/// ffmpeg unescapes the value three times: once while splitting the graph
/// into filters, once while splitting the filter's `key=value` options, and
/// once more when `drawtext` expands `%{...}` sequences.
pub fn escape_drawtext(text: &str) -> String {
    escape_graph_value(&escape_option_value(&escape_expansion(text)))
}

/// Escape a path for a `drawtext` `fontfile=` value inside the filter graph.
pub fn escape_drawtext_path(path: &Path) -> String {
    escape_graph_value(&escape_option_value(&path.display().to_string()))
}

fn escape_expansion(text: &str) -> String {
    escape_chars(text, &['\\', '%'])
}

fn escape_option_value(value: &str) -> String {
    escape_chars(value, &['\\', '\'', ':'])
}

fn escape_graph_value(value: &str) -> String {
    escape_chars(value, &['\\', '\'', '[', ']', ',', ';'])
}

fn escape_chars(value: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if special.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn codec_args(settings: &EncoderSettings) -> Vec<String> {
    vec![
        "-c:v".to_string(),
        settings.video_codec.clone(),
        "-preset".to_string(),
        settings.preset.clone(),
        "-pix_fmt".to_string(),
        settings.pixel_format.clone(),
        "-threads".to_string(),
        settings.threads.to_string(),
        "-c:a".to_string(),
        settings.audio_codec.clone(),
        "-b:a".to_string(),
        format!("{}k", settings.audio_bitrate_kbps.max(64)),
        "-movflags".to_string(),
        "+faststart".to_string(),
    ]
}

/// Encode `timeline` to `job.output_path`.
///
/// Mixed audio is written to a scoped WAV file for the encoder; the video
/// is encoded to a staging file in the output directory and renamed into
/// place on success. Both temporaries are removed on every exit path.
pub fn export_timeline(
    timeline: &Timeline,
    job: &ExportJob,
    backend: &mut dyn RenderBackend,
    progress: Option<ProgressCallback>,
) -> ReelsmithResult<PathBuf> {
    tracing::info!(
        output = %job.output_path.display(),
        duration_secs = timeline.output_duration_secs,
        frame = %timeline.frame(),
        backend = backend.name(),
        "Starting export"
    );

    if !backend.is_available() {
        return Err(ReelsmithError::unsupported(format!(
            "render backend '{}' is not available (expected ffmpeg in PATH)",
            backend.name()
        )));
    }

    let output_dir = match job.output_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&output_dir).map_err(|e| {
        ReelsmithError::encode_failed(format!(
            "failed to create output directory {}: {e}",
            output_dir.display()
        ))
    })?;

    let staging = tempfile::Builder::new()
        .prefix(".reelsmith-")
        .suffix(".mp4")
        .tempfile_in(&output_dir)
        .map_err(|e| ReelsmithError::encode_failed(format!("failed to create staging file: {e}")))?
        .into_temp_path();

    // Held until the encoder finishes; dropping it deletes the WAV.
    let mut mixed_audio: Option<tempfile::TempPath> = None;
    let audio_input = match &timeline.audio {
        AudioStream::Passthrough { path, .. } => path.clone(),
        AudioStream::Mixed { pcm, .. } => {
            let wav = tempfile::Builder::new()
                .prefix("reelsmith-mix-")
                .suffix(".wav")
                .tempfile()
                .map_err(|e| {
                    ReelsmithError::encode_failed(format!("failed to create audio temp file: {e}"))
                })?
                .into_temp_path();
            pcm.write_wav(&wav)?;
            let path = wav.to_path_buf();
            mixed_audio = Some(wav);
            path
        }
    };

    let plan = build_encode_plan(timeline, &audio_input, &staging, &job.settings);
    tracing::debug!(args = ?plan.args, "Encode plan built");

    if let Some(cb) = &progress {
        cb(ExportProgress::at_stage(
            ExportStage::Preparing,
            0.0,
            plan.total_frames,
        ));
    }

    backend.render(&plan, progress)?;
    drop(mixed_audio);

    let written = std::fs::metadata(&staging).map(|m| m.len()).unwrap_or(0);
    if written == 0 {
        return Err(ReelsmithError::encode_failed(format!(
            "{} produced no output",
            backend.name()
        )));
    }

    staging.persist(&job.output_path).map_err(|e| {
        ReelsmithError::encode_failed(format!(
            "failed to move render into {}: {}",
            job.output_path.display(),
            e.error
        ))
    })?;

    tracing::info!(
        output = %job.output_path.display(),
        bytes = written,
        "Export finished"
    );
    Ok(job.output_path.clone())
}

/// [`RenderBackend`] that runs the ffmpeg binary.
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    ffmpeg_path: String,
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegBackend {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }
}

impl RenderBackend for FfmpegBackend {
    fn render(
        &mut self,
        plan: &EncodePlan,
        progress: Option<ProgressCallback>,
    ) -> ReelsmithResult<()> {
        let mut cmd = Command::new(&self.ffmpeg_path);
        cmd.args(&plan.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let start = std::time::Instant::now();
        let mut child = cmd.spawn().map_err(|e| {
            ReelsmithError::encode_failed(format!("failed to start {}: {e}", self.ffmpeg_path))
        })?;

        tracing::info!(
            pid = child.id(),
            args_len = plan.args.len(),
            total_frames = plan.total_frames,
            "ffmpeg process started"
        );

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ReelsmithError::encode_failed("failed to capture ffmpeg stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ReelsmithError::encode_failed("failed to capture ffmpeg stderr"))?;

        // ffmpeg blocks once the stderr pipe fills, so drain it on its own thread.
        let stderr_task = std::thread::spawn(move || -> String {
            let mut reader = BufReader::new(stderr);
            let mut output = String::new();
            match reader.read_to_string(&mut output) {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        let mut reader = BufReader::new(stdout);
        let mut line = String::new();
        let mut latest_progress = ProgressState::default();
        let mut last_progress_secs = 0.0f64;
        let mut last_progress_wall = std::time::Instant::now();
        loop {
            line.clear();
            let bytes = match reader.read_line(&mut line) {
                Ok(bytes) => bytes,
                Err(e) => {
                    child.kill().ok();
                    child.wait().ok();
                    stderr_task.join().ok();
                    return Err(ReelsmithError::encode_failed(format!(
                        "failed reading ffmpeg progress: {e}"
                    )));
                }
            };
            if bytes == 0 {
                break;
            }

            let Some((key, value)) = line.trim().split_once('=') else {
                continue;
            };
            latest_progress.update(key, value);
            if key != "progress" {
                continue;
            }

            if latest_progress.out_time_secs > last_progress_secs + 0.001 {
                last_progress_secs = latest_progress.out_time_secs;
                last_progress_wall = std::time::Instant::now();
            }
            if let Some(cb) = &progress {
                cb(progress_report(
                    &latest_progress,
                    plan.total_frames,
                    plan.duration_secs,
                    start.elapsed().as_secs_f64(),
                ));
            }
            if last_progress_wall.elapsed().as_secs() >= 10 {
                tracing::warn!(
                    out_time_secs = latest_progress.out_time_secs,
                    elapsed_secs = start.elapsed().as_secs_f64(),
                    "No ffmpeg progress advancement for 10s"
                );
                last_progress_wall = std::time::Instant::now();
            }
        }

        let status = child.wait().map_err(|e| {
            ReelsmithError::encode_failed(format!("failed to wait on ffmpeg: {e}"))
        })?;

        let stderr_output = stderr_task
            .join()
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

        if !status.success() {
            return Err(ReelsmithError::encode_failed(format!(
                "ffmpeg exited with {status}: {}",
                stderr_output.trim()
            )));
        }

        if let Some(cb) = &progress {
            cb(ExportProgress::at_stage(
                ExportStage::Complete,
                1.0,
                plan.total_frames,
            ));
        }

        tracing::info!(
            elapsed_secs = start.elapsed().as_secs_f64(),
            "ffmpeg finished"
        );
        Ok(())
    }

    fn is_available(&self) -> bool {
        command_exists(&self.ffmpeg_path)
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

#[derive(Debug, Default)]
struct ProgressState {
    out_time_secs: f64,
    complete: bool,
}

impl ProgressState {
    fn update(&mut self, key: &str, value: &str) {
        match key {
            // ffmpeg reports microseconds under both names.
            "out_time_ms" | "out_time_us" => {
                if let Ok(us) = value.parse::<f64>() {
                    self.out_time_secs = us / 1_000_000.0;
                }
            }
            "progress" => {
                self.complete = value == "end";
            }
            _ => {}
        }
    }
}

fn progress_report(
    state: &ProgressState,
    total_frames: u64,
    expected_duration_secs: f64,
    elapsed_secs: f64,
) -> ExportProgress {
    let progress = if expected_duration_secs <= 0.0 {
        0.0
    } else {
        (state.out_time_secs / expected_duration_secs).clamp(0.0, 1.0)
    };

    let frames_rendered = (progress * total_frames as f64).round() as u64;
    let eta_secs = if progress > 0.0 {
        (elapsed_secs / progress) - elapsed_secs
    } else {
        0.0
    }
    .max(0.0);

    ExportProgress {
        progress: if state.complete { 1.0 } else { progress },
        frames_rendered,
        total_frames,
        eta_secs,
        stage: if state.complete {
            ExportStage::Finalizing
        } else {
            ExportStage::Encoding
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::captions::layout_captions;
    use crate::compositor::{Timeline, VideoLayer};
    use crate::mixer::LoopPlan;
    use reelsmith_common::error::ErrorKind;
    use reelsmith_media::{PcmBuffer, PcmFormat};
    use reelsmith_project_model::{FrameSize, Orientation};
    use std::sync::{Arc, Mutex};

    fn timeline(video_secs: f64, audio_secs: f64, narration: &str) -> Timeline {
        let frame = FrameSize::new(1280, 720);
        Timeline {
            base: VideoLayer {
                path: PathBuf::from("/media/stock.mp4"),
                source: FrameSize::new(1920, 1080),
                output: frame,
                duration_secs: video_secs,
            },
            overlays: layout_captions(narration, frame, Orientation::Landscape).overlays,
            audio: AudioStream::Passthrough {
                path: PathBuf::from("/media/voice.mp3"),
                duration_secs: audio_secs,
            },
            output_duration_secs: video_secs.min(audio_secs),
        }
    }

    /// Writes a fixed payload to the plan output, or fails after a partial write.
    struct StubBackend {
        fail: bool,
        plans: Vec<EncodePlan>,
    }

    impl RenderBackend for StubBackend {
        fn render(
            &mut self,
            plan: &EncodePlan,
            progress: Option<ProgressCallback>,
        ) -> ReelsmithResult<()> {
            self.plans.push(plan.clone());
            std::fs::write(&plan.output_path, b"partial mp4").unwrap();
            if self.fail {
                return Err(ReelsmithError::encode_failed("encoder crashed"));
            }
            if let Some(cb) = progress {
                cb(ExportProgress::at_stage(ExportStage::Complete, 1.0, plan.total_frames));
            }
            Ok(())
        }

        fn is_available(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    #[test]
    fn test_plan_uses_fixed_export_parameters() {
        let timeline = timeline(9.0, 9.0, "Nature is beautiful. Skies are wide.");
        let plan = build_encode_plan(
            &timeline,
            Path::new("/media/voice.mp3"),
            Path::new("/out/final.mp4"),
            &EncoderSettings::default(),
        );

        let args = plan.args.join(" ");
        assert!(args.contains("-i /media/stock.mp4 -i /media/voice.mp3"));
        assert!(args.contains("-map [vout] -map 1:a:0"));
        assert!(args.contains("-r 24"));
        assert!(args.contains("-t 9.000000"));
        assert!(args.contains("-c:v libx264"));
        assert!(args.contains("-preset ultrafast"));
        assert!(args.contains("-threads 2"));
        assert!(args.contains("-c:a aac"));
        assert_eq!(plan.args.last().unwrap(), "/out/final.mp4");
        assert_eq!(plan.total_frames, 216);
    }

    #[test]
    fn test_filter_graph_draws_each_overlay_in_its_window() {
        let timeline = timeline(9.0, 9.0, "Nature is beautiful. Skies are wide.");
        let plan = build_encode_plan(
            &timeline,
            Path::new("voice.mp3"),
            Path::new("out.mp4"),
            &EncoderSettings::default(),
        );
        let graph = &plan.filter_graph;

        assert!(graph.starts_with("[0:v]scale=1280:720:flags=lanczos,setsar=1,fps=24"));
        assert!(graph.ends_with("[vout]"));
        assert_eq!(graph.matches("drawbox=").count(), 2);
        assert!(graph.contains(
            "drawbox=x=0:y=576:w=1280:h=80:color=0x000000@0.50:t=fill:enable='gte(t,0.000)*lt(t,3.000)'"
        ));
        assert!(graph.contains("text=Skies are wide:fontsize=30:fontcolor=0xFFFFFF"));
        assert!(graph.contains("enable='gte(t,3.000)*lt(t,6.000)'"));
    }

    #[test]
    fn test_filter_graph_skips_overlays_past_duration() {
        let timeline = timeline(
            5.0,
            8.0,
            "Nature is beautiful. Skies are wide. Rivers flow free.",
        );
        let plan = build_encode_plan(
            &timeline,
            Path::new("voice.mp3"),
            Path::new("out.mp4"),
            &EncoderSettings::default(),
        );
        assert_eq!(plan.filter_graph.matches("drawbox=").count(), 2);
        assert!(!plan.filter_graph.contains("Rivers flow free"));
        assert!(plan.args.join(" ").contains("-t 5.000000"));
    }

    #[test]
    fn test_font_file_is_passed_to_drawtext() {
        let timeline = timeline(3.0, 3.0, "Hello.");
        let settings = EncoderSettings {
            font_file: Some(PathBuf::from("/fonts/Arial.ttf")),
            ..EncoderSettings::default()
        };
        let plan = build_encode_plan(&timeline, Path::new("a.wav"), Path::new("o.mp4"), &settings);
        assert!(plan
            .filter_graph
            .contains("drawtext=fontfile=/fonts/Arial.ttf:text=Hello:"));
    }

    /// Splits one token off `input` the way ffmpeg tokenizes graphs and
    /// options: `\` escapes the next character, `'...'` is verbatim, and an
    /// unescaped character from `terms` ends the token.
    fn next_token<'a>(input: &'a str, terms: &str) -> (String, &'a str) {
        let mut token = String::new();
        let mut chars = input.char_indices().peekable();
        while let Some(&(i, c)) = chars.peek() {
            if terms.contains(c) {
                return (token, &input[i..]);
            }
            chars.next();
            match c {
                '\\' => {
                    if let Some((_, next)) = chars.next() {
                        token.push(next);
                    }
                }
                '\'' => {
                    for (_, quoted) in chars.by_ref() {
                        if quoted == '\'' {
                            break;
                        }
                        token.push(quoted);
                    }
                }
                _ => token.push(c),
            }
        }
        (token, "")
    }

    /// `(filter name, unescaped argument string)` for each filter in the chain.
    fn parse_chain(graph: &str) -> Vec<(String, String)> {
        let mut rest = graph
            .strip_prefix("[0:v]")
            .and_then(|g| g.strip_suffix("[vout]"))
            .unwrap();
        let mut filters = Vec::new();
        while !rest.is_empty() {
            let name_end = rest.find(['=', ',']).unwrap_or(rest.len());
            let name = rest[..name_end].to_string();
            rest = &rest[name_end..];
            let mut args = String::new();
            if let Some(after) = rest.strip_prefix('=') {
                let (token, remaining) = next_token(after, "[],;");
                args = token;
                rest = remaining;
            }
            rest = rest.strip_prefix(',').unwrap_or(rest);
            filters.push((name, args));
        }
        filters
    }

    fn parse_options(args: &str) -> Vec<(String, String)> {
        let mut rest = args;
        let mut options = Vec::new();
        while !rest.is_empty() {
            let (key, after_key) = next_token(rest, "=:");
            let (value, after_value) = match after_key.strip_prefix('=') {
                Some(value) => next_token(value, ":"),
                None => (String::new(), after_key),
            };
            options.push((key, value));
            rest = after_value.strip_prefix(':').unwrap_or(after_value);
        }
        options
    }

    /// drawtext's own expansion pass; `None` if a bare `%` would start an expansion.
    fn expand_literal(text: &str) -> Option<String> {
        let mut out = String::new();
        let mut chars = text.chars();
        while let Some(c) = chars.next() {
            match c {
                '\\' => out.push(chars.next()?),
                '%' => return None,
                _ => out.push(c),
            }
        }
        Some(out)
    }

    #[test]
    fn test_escape_drawtext_layers() {
        assert_eq!(escape_drawtext("Sunny"), "Sunny");
        assert_eq!(escape_drawtext("it's"), r"it\\\'s");
        assert_eq!(escape_drawtext("time: 10, ok"), r"time\\: 10\, ok");
        assert_eq!(escape_drawtext("100%"), r"100\\\\%");
        assert_eq!(escape_drawtext(r"a\b"), r"a\\\\\\\\b");
    }

    #[test]
    fn test_drawtext_values_survive_ffmpeg_unescaping() {
        let timeline = timeline(
            12.0,
            12.0,
            r"It's a river. Time: noon. 100% sure, [really]; \o/.",
        );
        let settings = EncoderSettings {
            font_file: Some(PathBuf::from("/fonts/It's:here.ttf")),
            ..EncoderSettings::default()
        };
        let plan = build_encode_plan(&timeline, Path::new("a.wav"), Path::new("o.mp4"), &settings);

        let filters = parse_chain(&plan.filter_graph);
        assert_eq!(filters[0].0, "scale");
        assert_eq!(filters.iter().filter(|(name, _)| name == "drawbox").count(), 3);

        let drawtexts: Vec<Vec<(String, String)>> = filters
            .iter()
            .filter(|(name, _)| name == "drawtext")
            .map(|(_, args)| parse_options(args))
            .collect();
        assert_eq!(drawtexts.len(), 3);

        let value = |options: &[(String, String)], key: &str| {
            options
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        };

        let texts: Vec<String> = drawtexts
            .iter()
            .map(|options| expand_literal(&value(options, "text").unwrap()).unwrap())
            .collect();
        assert_eq!(
            texts,
            vec![
                "It's a river".to_string(),
                "Time: noon".to_string(),
                r"100% sure, [really]; \o/".to_string(),
            ]
        );

        for (i, options) in drawtexts.iter().enumerate() {
            let keys: Vec<&str> = options.iter().map(|(k, _)| k.as_str()).collect();
            assert_eq!(
                keys,
                vec!["fontfile", "text", "fontsize", "fontcolor", "x", "y", "enable"]
            );
            assert_eq!(value(options, "fontfile").unwrap(), "/fonts/It's:here.ttf");
            assert_eq!(value(options, "fontsize").unwrap(), "30");
            assert_eq!(
                value(options, "enable").unwrap(),
                format!("gte(t,{:.3})*lt(t,{:.3})", 3.0 * i as f64, 3.0 * (i + 1) as f64)
            );
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_progress_kills_encoder() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-ffmpeg");
        std::fs::write(&script, "#!/bin/sh\nprintf '\\377\\376\\n'\nexec sleep 30\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let timeline = timeline(3.0, 3.0, "Hello.");
        let plan = build_encode_plan(
            &timeline,
            Path::new("a.wav"),
            &dir.path().join("o.mp4"),
            &EncoderSettings::default(),
        );

        let started = std::time::Instant::now();
        let err = FfmpegBackend::new(script.display().to_string())
            .render(&plan, None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EncodeFailed);
        assert!(err.to_string().contains("failed reading ffmpeg progress"));
        assert!(started.elapsed() < std::time::Duration::from_secs(20));
    }

    #[test]
    fn test_progress_state_and_report() {
        let mut state = ProgressState::default();
        state.update("out_time_us", "4500000");
        state.update("progress", "continue");
        let report = progress_report(&state, 216, 9.0, 2.0);
        assert!((report.progress - 0.5).abs() < 1e-9);
        assert_eq!(report.frames_rendered, 108);
        assert!((report.eta_secs - 2.0).abs() < 1e-9);
        assert_eq!(report.stage, ExportStage::Encoding);

        state.update("progress", "end");
        let report = progress_report(&state, 216, 9.0, 4.0);
        assert_eq!(report.progress, 1.0);
        assert_eq!(report.stage, ExportStage::Finalizing);
    }

    #[test]
    fn test_export_moves_staging_file_into_place() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("renders").join("final.mp4");
        let timeline = timeline(9.0, 9.0, "One. Two. Three.");
        let mut backend = StubBackend {
            fail: false,
            plans: Vec::new(),
        };

        let stages = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&stages);
        let progress: ProgressCallback = Box::new(move |p| sink.lock().unwrap().push(p.stage));

        let path =
            export_timeline(&timeline, &ExportJob::new(&output), &mut backend, Some(progress))
                .unwrap();
        assert_eq!(path, output);
        assert_eq!(std::fs::read(&output).unwrap(), b"partial mp4");

        // Only the final file remains in the output directory.
        let entries: Vec<_> = std::fs::read_dir(output.parent().unwrap())
            .unwrap()
            .collect();
        assert_eq!(entries.len(), 1);
        assert_ne!(backend.plans[0].output_path, output);
        assert_eq!(
            *stages.lock().unwrap(),
            vec![ExportStage::Preparing, ExportStage::Complete]
        );
    }

    #[test]
    fn test_failed_export_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("final.mp4");
        let mut backend = StubBackend {
            fail: true,
            plans: Vec::new(),
        };

        let err = export_timeline(
            &timeline(3.0, 3.0, "One."),
            &ExportJob::new(&output),
            &mut backend,
            None,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EncodeFailed);
        assert!(!output.exists());
        assert!(!backend.plans[0].output_path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_mixed_audio_goes_through_scoped_wav() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("final.mp4");
        let mut timeline = timeline(2.0, 2.0, "Mixed.");
        let format = PcmFormat::new(8_000, 2);
        timeline.audio = AudioStream::Mixed {
            pcm: PcmBuffer::silence(format, format.frames_for(2.0)),
            duration_secs: 2.0,
            loop_plan: LoopPlan {
                repeats: 1,
                target_secs: 2.0,
            },
            gain: 0.3,
        };
        let mut backend = StubBackend {
            fail: false,
            plans: Vec::new(),
        };

        export_timeline(&timeline, &ExportJob::new(&output), &mut backend, None).unwrap();

        let plan = &backend.plans[0];
        let wav = plan
            .args
            .iter()
            .find(|arg| arg.ends_with(".wav"))
            .map(PathBuf::from)
            .unwrap();
        assert!(plan.args.contains(&wav.display().to_string()));
        assert!(!wav.exists());
    }

    #[test]
    fn test_unavailable_backend_is_reported() {
        struct Missing;
        impl RenderBackend for Missing {
            fn render(&mut self, _: &EncodePlan, _: Option<ProgressCallback>) -> ReelsmithResult<()> {
                unreachable!("render called on unavailable backend")
            }
            fn is_available(&self) -> bool {
                false
            }
            fn name(&self) -> &str {
                "missing"
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let err = export_timeline(
            &timeline(1.0, 1.0, "x."),
            &ExportJob::new(dir.path().join("o.mp4")),
            &mut Missing,
            None,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EncodeFailed);
    }
}
