//! Render options and their wire representation.
//!
//! Callers hand the engine a loosely typed option set
//! (`{"orientation": "portrait", "background_music": "yes", ...}`);
//! [`RawRenderOptions::into_options`] validates it into [`RenderOptions`].

use std::str::FromStr;

use reelsmith_common::error::{ReelsmithError, ReelsmithResult};
use serde::{Deserialize, Serialize};

/// Long-edge target for landscape output height and portrait output width.
pub const TARGET_EDGE_PX: u32 = 720;

/// Default background music gain.
pub const DEFAULT_BACKGROUND_VOLUME: f64 = 0.3;

/// Output orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Landscape,
    Portrait,
}

/// Which output edge is pinned when resizing the source video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitConstraint {
    Height(u32),
    Width(u32),
}

impl Orientation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Landscape => "landscape",
            Self::Portrait => "portrait",
        }
    }

    /// Landscape pins height to 720; portrait pins width to 720.
    pub fn fit_constraint(self) -> FitConstraint {
        match self {
            Self::Landscape => FitConstraint::Height(TARGET_EDGE_PX),
            Self::Portrait => FitConstraint::Width(TARGET_EDGE_PX),
        }
    }

    /// Height of the caption background box in pixels.
    pub fn caption_box_height(self) -> u32 {
        match self {
            Self::Landscape => 80,
            Self::Portrait => 100,
        }
    }

    /// Caption font size in points.
    pub fn caption_font_size(self) -> u32 {
        match self {
            Self::Landscape => 30,
            Self::Portrait => 25,
        }
    }

    /// Top of the caption box as a fraction of frame height.
    pub fn caption_offset_ratio(self) -> f64 {
        match self {
            Self::Landscape => 0.8,
            Self::Portrait => 0.9,
        }
    }
}

impl FromStr for Orientation {
    type Err = ReelsmithError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "landscape" => Ok(Self::Landscape),
            "portrait" => Ok(Self::Portrait),
            other => Err(ReelsmithError::invalid_options(format!(
                "unknown orientation '{other}' (expected landscape or portrait)"
            ))),
        }
    }
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated options for a single render.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderOptions {
    pub orientation: Orientation,
    pub use_background_music: bool,
    /// Linear gain applied to the background music, in `[0.0, 1.0]`.
    pub background_volume: f64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            orientation: Orientation::Landscape,
            use_background_music: false,
            background_volume: DEFAULT_BACKGROUND_VOLUME,
        }
    }
}

impl RenderOptions {
    pub fn new(orientation: Orientation) -> Self {
        Self {
            orientation,
            ..Self::default()
        }
    }

    /// Enable background music at the given gain.
    pub fn with_background_music(mut self, volume: f64) -> Self {
        self.use_background_music = true;
        self.background_volume = volume;
        self
    }

    pub fn validate(&self) -> ReelsmithResult<()> {
        validate_volume(self.background_volume)
    }
}

fn validate_volume(volume: f64) -> ReelsmithResult<()> {
    if !volume.is_finite() || !(0.0..=1.0).contains(&volume) {
        return Err(ReelsmithError::invalid_options(format!(
            "background_volume must be within [0, 1], got {volume}"
        )));
    }
    Ok(())
}

/// Options as they arrive from a caller: strings and an optional float.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRenderOptions {
    #[serde(default)]
    pub orientation: Option<String>,
    /// `"yes"` or `"no"`.
    #[serde(default)]
    pub background_music: Option<String>,
    #[serde(default)]
    pub background_volume: Option<f64>,
}

impl RawRenderOptions {
    /// Validate and convert, applying defaults for absent fields.
    pub fn into_options(self) -> ReelsmithResult<RenderOptions> {
        let orientation = match self.orientation.as_deref() {
            Some(raw) => raw.parse()?,
            None => Orientation::default(),
        };

        let use_background_music = match self.background_music.as_deref().map(str::trim) {
            None => false,
            Some(v) if v.eq_ignore_ascii_case("yes") => true,
            Some(v) if v.eq_ignore_ascii_case("no") => false,
            Some(other) => {
                return Err(ReelsmithError::invalid_options(format!(
                    "background_music must be 'yes' or 'no', got '{other}'"
                )))
            }
        };

        let options = RenderOptions {
            orientation,
            use_background_music,
            background_volume: self.background_volume.unwrap_or(DEFAULT_BACKGROUND_VOLUME),
        };
        options.validate()?;
        Ok(options)
    }
}
