use std::path::PathBuf;

use crate::chain::PassChain;
use crate::effects::{EffectKind, UniformError, RGB_SHIFT_AMOUNT};
use crate::params::ParamSet;

/// Effective render resolution in physical pixels.
///
/// A `Viewport` can only be built from positive dimensions, so anything that
/// holds one never has to re-check for zero-sized buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        Some(Self { width, height })
    }

    /// Accepts host-provided signed sizes; zero or negative extents yield `None`.
    pub fn from_signed(width: i64, height: i64) -> Option<Self> {
        let width = u32::try_from(width).ok()?;
        let height = u32::try_from(height).ok()?;
        Self::new(width, height)
    }

    /// Converts a physical surface size into the effective render size.
    ///
    /// The device pixel ratio is clamped to `max_pixel_ratio`, so a 3x display
    /// with a cap of 2 renders at two thirds of its physical resolution.
    pub fn effective(
        physical_width: u32,
        physical_height: u32,
        scale_factor: f64,
        max_pixel_ratio: f64,
    ) -> Option<Self> {
        let scale = if scale_factor.is_finite() && scale_factor > 0.0 {
            scale_factor
        } else {
            1.0
        };
        let ratio = if max_pixel_ratio.is_finite() && max_pixel_ratio > 0.0 {
            scale.min(max_pixel_ratio)
        } else {
            scale
        };
        let factor = ratio / scale;
        let width = (physical_width as f64 * factor).round() as i64;
        let height = (physical_height as f64 * factor).round() as i64;
        Self::from_signed(width, height)
    }
}

/// Output color handling for the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorSpaceMode {
    /// Gamma-encoded swapchain, the usual choice for image viewers.
    #[default]
    Auto,
    /// Treat shader outputs/textures as gamma-encoded; use non-sRGB surfaces.
    Gamma,
    /// Treat shader outputs as linear and use sRGB swapchains/textures for conversion.
    Linear,
}

/// Anti-aliasing policy for the scene pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Antialiasing {
    /// Pick the highest sample count supported by the target format.
    Auto,
    /// Disable MSAA and render the scene straight into its target.
    Off,
    /// Request a specific MSAA sample count (clamped to what the device supports).
    Samples(u32),
}

impl Default for Antialiasing {
    fn default() -> Self {
        Self::Auto
    }
}

/// Failures raised while building or resizing the pass chain.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("failed to compile shader `{label}`: {message}")]
    ShaderCompilation { label: String, message: String },
    #[error("failed to allocate {label} at {width}x{height}: {reason}")]
    BufferAllocation {
        label: String,
        width: u32,
        height: u32,
        reason: String,
    },
    #[error("invalid pass chain: {0}")]
    InvalidChain(String),
    #[error("pass `{pass}` has inconsistent uniforms: {source}")]
    Uniform {
        pass: String,
        #[source]
        source: UniformError,
    },
}

/// Immutable configuration passed to the renderer at start-up.
///
/// `RendererConfig` mirrors the CLI and config file: which images become
/// planes, which post passes run in which order, and how the window and
/// swapchain should be set up.
#[derive(Clone, Debug)]
pub struct RendererConfig {
    /// Window title.
    pub title: String,
    /// Initial window size in logical pixels.
    pub window_size: (u32, u32),
    /// One plane is created per image, in order.
    pub images: Vec<PathBuf>,
    /// Aspect ratio (height / width) the image textures are fitted to.
    pub target_aspect: f32,
    /// Distance between neighbouring plane centres.
    pub mesh_spacing: f32,
    /// Post passes that run after the scene pass.
    pub pass_order: Vec<EffectKind>,
    /// Channel offset magnitude for the color-fringe pass.
    pub rgb_shift_amount: f32,
    /// Debug controls (`scale`, `progress`, ...).
    pub controls: ParamSet,
    /// Anti-aliasing mode requested by the caller.
    pub antialiasing: Antialiasing,
    /// Desired color handling for swapchain/textures.
    pub color_space: ColorSpaceMode,
    /// Upper bound on the device pixel ratio used for the render resolution.
    pub max_pixel_ratio: f32,
    /// Clear color of the scene pass.
    pub clear_color: [f32; 4],
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            title: "Image Distort".to_string(),
            window_size: (1280, 800),
            images: Vec::new(),
            target_aspect: crate::aspect::DEFAULT_TARGET_ASPECT,
            mesh_spacing: crate::scene::DEFAULT_MESH_SPACING,
            pass_order: vec![EffectKind::Distortion, EffectKind::RgbShift],
            rgb_shift_amount: RGB_SHIFT_AMOUNT,
            controls: ParamSet::debug_controls(),
            antialiasing: Antialiasing::default(),
            color_space: ColorSpaceMode::default(),
            max_pixel_ratio: 2.0,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl RendererConfig {
    /// Builds the pass chain described by `pass_order`, seeding the fringe amount.
    pub fn pass_chain(&self) -> Result<PassChain, PipelineError> {
        let mut chain = PassChain::scene_then(self.pass_order.iter().copied())?;
        for pass in chain.effects_mut() {
            if pass.kind() == EffectKind::RgbShift {
                pass.set_float("amount", self.rgb_shift_amount)
                    .map_err(|source| PipelineError::Uniform {
                        pass: pass.kind().name().to_string(),
                        source,
                    })?;
            }
        }
        Ok(chain)
    }
}
