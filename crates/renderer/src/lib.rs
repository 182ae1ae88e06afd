//! Renderer crate for imagedistort.
//!
//! Image planes are drawn by a scene pass, then pushed through an ordered
//! chain of full-screen post effects before reaching the window surface:
//!
//! ```text
//!   CLI / config
//!        │ RendererConfig
//!        ▼
//!   Renderer::run ──▶ winit event loop ──▶ FrameDriver::tick()
//!                                               │ time / scale / progress
//!                                               ▼
//!            scene ─▶ buffer 0 ─▶ distortion ─▶ buffer 1 ─▶ rgb shift ─▶ surface
//! ```
//!
//! [`frame::FrameDriver`] owns the per-frame sequencing and talks to a
//! [`frame::Compositor`]. Two compositors exist: the wgpu one behind the
//! preview window, and [`software::SoftwareComposer`], a CPU reference used
//! for still exports and tests.

pub mod aspect;
pub mod chain;
mod compile;
pub mod effects;
pub mod frame;
mod gpu;
pub mod params;
pub mod runtime;
pub mod scene;
pub mod software;
pub mod targets;
pub mod types;
mod window;

use anyhow::Result;

pub use chain::{PassChain, Stage, StageOutput};
pub use effects::{EffectKind, PassUniforms, ShaderPass, UniformError, UniformValue};
pub use frame::{Compositor, FrameDriver, FrameReport};
pub use params::{FloatParam, ParamError, ParamSet};
pub use runtime::{
    ChannelProgress, ConstantProgress, FixedTimeSource, ProgressSender, ProgressSource,
    SystemTimeSource, TimeSample, TimeSource,
};
pub use software::{SoftwareComposer, SoftwareTexture};
pub use targets::ResizeOutcome;
pub use types::{Antialiasing, ColorSpaceMode, PipelineError, RendererConfig, Viewport};

/// Entry point for the interactive preview.
pub struct Renderer {
    config: RendererConfig,
    progress: Box<dyn ProgressSource>,
}

impl Renderer {
    /// Creates a renderer whose animation progress stays at zero until a
    /// source is attached.
    pub fn new(config: RendererConfig) -> Self {
        Self {
            config,
            progress: Box::new(ConstantProgress(0.0)),
        }
    }

    pub fn with_progress_source<P>(mut self, source: P) -> Self
    where
        P: ProgressSource + 'static,
    {
        self.progress = Box::new(source);
        self
    }

    /// Blocks on the window event loop until the window closes.
    pub fn run(self) -> Result<()> {
        tracing::info!(
            images = self.config.images.len(),
            passes = ?self.config.pass_order,
            "starting preview"
        );
        window::run_window(self.config, self.progress)
    }
}
