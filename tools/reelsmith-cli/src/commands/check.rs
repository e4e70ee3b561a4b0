//! Check system capabilities.

use reelsmith_common::config::{config_file_path, AppConfig};
use reelsmith_media::command_exists;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Reelsmith System Check");
    println!("{}", "=".repeat(50));

    let mut required_ok = true;
    for binary in [&config.render.ffmpeg_path, &config.render.ffprobe_path] {
        if command_exists(binary) {
            println!("[OK] {binary} found");
        } else {
            println!("[MISSING] {binary} not found in PATH");
            required_ok = false;
        }
    }

    let music = config.music_path();
    if music.is_file() {
        println!("[OK] Background music: {}", music.display());
    } else {
        println!(
            "[WARN] Background music not found at {} (renders fall back to voiceover only)",
            music.display()
        );
    }

    let config_path = config_file_path();
    if config_path.exists() {
        println!("[OK] Config: {}", config_path.display());
    } else {
        println!("[INFO] No config at {} (using defaults)", config_path.display());
    }
    println!("     Output directory: {}", config.output_dir.display());

    println!();
    if required_ok {
        println!("All required tools are available. Reelsmith is ready.");
    } else {
        println!("Some required tools are missing. Install ffmpeg to render.");
    }

    Ok(())
}
