//! Reelsmith CLI — render narrated videos from stock footage and a voiceover.
//!
//! Usage:
//!   reelsmith render <VIDEO> <AUDIO> --text ...   Render a captioned video
//!   reelsmith plan <VIDEO> <AUDIO> --text ...     Print the composed timeline
//!   reelsmith probe <PATH>                        Show media information
//!   reelsmith check                               Check system capabilities

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reelsmith_common::config::AppConfig;

mod commands;

use commands::render::RenderArgs;

#[derive(Parser)]
#[command(
    name = "reelsmith",
    about = "Compose narrated, captioned videos",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/reelsmith/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a video with captions and mixed audio
    Render {
        #[command(flatten)]
        args: RenderArgs,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Probe inputs and print the composed timeline without encoding
    Plan {
        #[command(flatten)]
        args: RenderArgs,
    },

    /// Show container and stream information for a media file
    Probe {
        /// Path to the media file
        path: PathBuf,
    },

    /// Check system capabilities
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load(),
    };
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    reelsmith_common::logging::init_logging(&config.logging);
    tracing::debug!(config = ?cli.config, output_dir = %config.output_dir.display(), "Configuration loaded");

    match cli.command {
        Commands::Render { args, output, json } => {
            commands::render::run(args, output, json, config).await
        }
        Commands::Plan { args } => commands::plan::run(args, config),
        Commands::Probe { path } => commands::probe::run(path, &config),
        Commands::Check => commands::check::run(&config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_args_parse() {
        let cli = Cli::try_parse_from([
            "reelsmith",
            "render",
            "stock.mp4",
            "voice.mp3",
            "--text",
            "Nature is beautiful.",
            "--orientation",
            "portrait",
            "--background-music",
            "yes",
            "--music-track",
            "upbeat",
        ])
        .unwrap();

        let Commands::Render { args, output, json } = cli.command else {
            panic!("expected render command");
        };
        assert!(output.is_none());
        assert!(!json);

        let mut config = AppConfig::default();
        let request = args.into_request(&mut config, PathBuf::from("out.mp4")).unwrap();
        assert_eq!(request.options.orientation.as_str(), "portrait");
        assert!(request.options.use_background_music);
        assert_eq!(request.options.background_volume, 0.3);
        assert_eq!(config.music_path(), PathBuf::from("static/music/upbeat.mp3"));
    }

    #[test]
    fn test_narration_source_is_required() {
        assert!(Cli::try_parse_from(["reelsmith", "plan", "a.mp4", "b.mp3"]).is_err());
        assert!(Cli::try_parse_from([
            "reelsmith", "plan", "a.mp4", "b.mp3", "--text", "x", "--text-file", "n.txt",
        ])
        .is_err());
    }

    #[test]
    fn test_invalid_orientation_is_rejected() {
        let cli = Cli::try_parse_from([
            "reelsmith", "plan", "a.mp4", "b.mp3", "--text", "x.", "--orientation", "square",
        ])
        .unwrap();
        let Commands::Plan { args } = cli.command else {
            panic!("expected plan command");
        };
        assert!(args
            .into_request(&mut AppConfig::default(), PathBuf::from("o.mp4"))
            .is_err());
    }
}
