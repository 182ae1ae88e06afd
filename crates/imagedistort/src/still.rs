//! CPU rendering of a single frame to an image file.

use anyhow::{Context, Result};
use fxconfig::AppConfig;
use renderer::scene::Scene;
use renderer::{
    ConstantProgress, FixedTimeSource, FrameDriver, SoftwareComposer, SoftwareTexture, Viewport,
};

use crate::bindings::renderer_config;
use crate::cli::StillArgs;

pub fn run_still(config: &AppConfig, args: StillArgs) -> Result<()> {
    let mut settings = renderer_config(config, &args.chain)?;
    if let Some(amount) = args.amount {
        settings.rgb_shift_amount = amount;
    }
    let chain = settings.pass_chain()?;

    let image = image::open(&args.input)
        .with_context(|| format!("failed to open {}", args.input.display()))?
        .to_rgba8();
    let source = SoftwareTexture::from_image(&image)?;
    let viewport = match args.size {
        Some((width, height)) => {
            Viewport::new(width, height).context("render size must be non-zero")?
        }
        None => source.viewport(),
    };

    tracing::info!(
        input = %args.input.display(),
        width = viewport.width,
        height = viewport.height,
        passes = ?settings.pass_order,
        time = args.time,
        progress = args.progress,
        "rendering still"
    );

    let composer = SoftwareComposer::new(chain, source, viewport)?;
    let scene = Scene::new(1, settings.mesh_spacing, viewport, settings.target_aspect);
    let mut driver = FrameDriver::new(
        composer,
        scene,
        viewport,
        settings.target_aspect,
        Box::new(FixedTimeSource::new(args.time)),
        Box::new(ConstantProgress(args.progress)),
        settings.controls,
    );
    let report = driver.tick()?;
    tracing::debug!(?report, "frame rendered");

    driver
        .compositor()
        .display()
        .to_image()
        .save(&args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    tracing::info!(output = %args.output.display(), "wrote still");
    Ok(())
}
