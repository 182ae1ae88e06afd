use anyhow::{anyhow, Result};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, warn};
use winit::dpi::PhysicalSize;

use crate::chain::{PassChain, StageOutput};
use crate::frame::Compositor;
use crate::scene::Scene;
use crate::targets::{PingPong, ResizeOutcome};
use crate::types::{PipelineError, RendererConfig, Viewport};

use super::context::GpuContext;
use super::post::PostPipeline;
use super::scene::ScenePass;
use super::targets::{allocate_target, RenderTarget, INTERMEDIATE_FORMAT};

/// Surface, pass chain, and every GPU resource the chain renders with.
///
/// Intermediate buffers live at the effective resolution; the final pass
/// writes the swapchain at its physical size.
pub(crate) struct GpuState {
    context: GpuContext,
    chain: PassChain,
    targets: PingPong<RenderTarget>,
    scene_pass: ScenePass,
    post: PostPipeline,
}

impl GpuState {
    pub(crate) fn new<T>(
        target: &T,
        physical_size: PhysicalSize<u32>,
        viewport: Viewport,
        config: &RendererConfig,
    ) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let chain = config.pass_chain()?;
        let context = GpuContext::new(target, physical_size, config.color_space)?;
        let max_dimension = context.max_texture_dimension;

        let targets = PingPong::allocate(chain.intermediate_count(), viewport, |index, viewport| {
            allocate_target(
                &context.device,
                max_dimension,
                &format!("intermediate #{index}"),
                viewport,
            )
        })?;

        let scene_format = match chain.output(0) {
            StageOutput::Display => context.surface_format,
            StageOutput::Intermediate(_) => INTERMEDIATE_FORMAT,
        };
        let sample_count = context.sample_count_for(scene_format, config.antialiasing);
        let scene_pass = ScenePass::new(
            &context.device,
            &context.queue,
            &config.images,
            scene_format,
            sample_count,
            context.color_space,
            config.clear_color,
        )?;

        let mut post = PostPipeline::new(&context.device, &chain, context.surface_format)?;
        post.rebind(&context.device, &chain, &targets);

        debug!(
            passes = chain.len(),
            width = viewport.width,
            height = viewport.height,
            sample_count,
            "initialised pass chain"
        );

        Ok(Self {
            context,
            chain,
            targets,
            scene_pass,
            post,
        })
    }

    pub(crate) fn size(&self) -> PhysicalSize<u32> {
        self.context.size
    }

    /// Reconfigures the swapchain; intermediates follow via [`Compositor::resize`].
    pub(crate) fn resize_surface(&mut self, new_size: PhysicalSize<u32>) {
        self.context.resize(new_size);
    }
}

impl Compositor for GpuState {
    fn resize(&mut self, width: u32, height: u32) -> Result<ResizeOutcome, PipelineError> {
        let device = &self.context.device;
        let max_dimension = self.context.max_texture_dimension;
        let outcome = self.targets.resize(width, height, |index, viewport| {
            allocate_target(device, max_dimension, &format!("intermediate #{index}"), viewport)
        })?;
        if outcome == ResizeOutcome::Resized {
            self.post.rebind(device, &self.chain, &self.targets);
        }
        Ok(outcome)
    }

    fn chain(&self) -> &PassChain {
        &self.chain
    }

    fn chain_mut(&mut self) -> &mut PassChain {
        &mut self.chain
    }

    fn render(&mut self, scene: &Scene) -> Result<()> {
        let frame = self
            .context
            .surface
            .get_current_texture()
            .map_err(anyhow::Error::new)?;
        if frame.suboptimal {
            warn!("surface is suboptimal; it will be reconfigured on the next resize");
        }
        let display = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("frame encoder"),
                });

        let (scene_view, scene_size) = match self.chain.output(0) {
            StageOutput::Display => (&display, (self.context.size.width, self.context.size.height)),
            StageOutput::Intermediate(write) => {
                let target = self
                    .targets
                    .get(write)
                    .ok_or_else(|| anyhow!("intermediate buffer {write} missing"))?;
                (
                    &target.view,
                    (target.viewport.width, target.viewport.height),
                )
            }
        };
        self.scene_pass.encode(
            &self.context.device,
            &self.context.queue,
            &mut encoder,
            scene,
            scene_view,
            scene_size,
        );
        self.post.encode(
            &self.context.queue,
            &mut encoder,
            &self.chain,
            &self.targets,
            &display,
        )?;

        self.context.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }
}
