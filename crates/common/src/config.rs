//! Application configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ReelsmithError, ReelsmithResult};

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory where rendered videos land when no output path is given.
    pub output_dir: PathBuf,

    /// Directory holding background music tracks (`<track>.mp3`).
    pub music_dir: PathBuf,

    /// Default render settings.
    pub render: RenderDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default render parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderDefaults {
    /// Background music gain in `[0.0, 1.0]`.
    pub background_volume: f64,

    /// Music track name, resolved against `music_dir`.
    pub music_track: String,

    /// ffmpeg binary used for decoding and encoding.
    pub ffmpeg_path: String,

    /// ffprobe binary used for media inspection.
    pub ffprobe_path: String,

    /// Font file for caption text; ffmpeg's default font when unset.
    pub font_file: Option<PathBuf>,

    /// Fixed horizontal caption inset in pixels. Captions wrap at 80% of
    /// the frame width when unset.
    pub caption_inset: Option<u32>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "reelsmith=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            music_dir: PathBuf::from("static").join("music"),
            render: RenderDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for RenderDefaults {
    fn default() -> Self {
        Self {
            background_volume: 0.3,
            music_track: "background".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            font_file: None,
            caption_inset: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if !config_path.exists() {
            return Self::default();
        }
        match Self::load_from(&config_path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config at {:?}: {}", config_path, e);
                Self::default()
            }
        }
    }

    /// Load config from an explicit file.
    pub fn load_from(path: &Path) -> ReelsmithResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ReelsmithError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&content)
            .map_err(|e| ReelsmithError::config(format!("cannot parse {}: {e}", path.display())))
    }

    /// Save config to an explicit file.
    pub fn save_to(&self, path: &Path) -> ReelsmithResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Path of the configured background music track.
    pub fn music_path(&self) -> PathBuf {
        self.music_track_path(&self.render.music_track)
    }

    /// Path of a named music track inside `music_dir`.
    pub fn music_track_path(&self, track: &str) -> PathBuf {
        self.music_dir.join(format!("{track}.mp3"))
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("reelsmith").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_music_path() {
        let config = AppConfig::default();
        assert_eq!(
            config.music_path(),
            PathBuf::from("static/music/background.mp3")
        );
        assert_eq!(
            config.music_track_path("upbeat"),
            PathBuf::from("static/music/upbeat.mp3")
        );
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"render": {"background_volume": 0.5}}"#).unwrap();
        assert!((config.render.background_volume - 0.5).abs() < 1e-12);
        assert_eq!(config.render.music_track, "background");
        assert_eq!(config.output_dir, PathBuf::from("output"));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_save_and_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = AppConfig::default();
        config.render.music_track = "relaxing".to_string();
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.render.music_track, "relaxing");
    }

    #[test]
    fn test_load_from_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ReelsmithError::Config { .. }));
    }
}
