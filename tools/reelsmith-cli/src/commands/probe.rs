//! Show media information.

use std::path::PathBuf;

use reelsmith_common::config::AppConfig;
use reelsmith_media::{FfmpegToolkit, MediaToolkit};

pub fn run(path: PathBuf, config: &AppConfig) -> anyhow::Result<()> {
    let toolkit = FfmpegToolkit::from_config(&config.render);
    let info = toolkit
        .probe(&path)
        .map_err(|e| anyhow::anyhow!("Failed to probe {}: {e}", path.display()))?;

    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}
