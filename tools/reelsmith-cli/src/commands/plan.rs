//! Print the composed timeline without encoding.

use reelsmith_common::config::AppConfig;
use reelsmith_render_engine::VideoRenderer;

use super::render::{default_output_path, RenderArgs};

pub fn run(args: RenderArgs, mut config: AppConfig) -> anyhow::Result<()> {
    let output_path = default_output_path(&config);
    let request = args.into_request(&mut config, output_path)?;

    let plan = VideoRenderer::from_config(&config).plan(&request)?;
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}
