//! CPU reference implementation of the post chain.
//!
//! Mirrors the GPU composer pass for pass: the same [`PassChain`] routing, the
//! same ping-pong resize rules, clamp-to-edge bilinear sampling at texel
//! centres. The scene stage does not rasterise meshes; it resamples a source
//! image to the viewport, which is what the `still` export renders.

use anyhow::Result;
use glam::Vec2;
use image::RgbaImage;

use crate::chain::{PassChain, Stage, StageOutput};
use crate::effects::TextureSampler;
use crate::frame::Compositor;
use crate::scene::Scene;
use crate::targets::{PingPong, ResizeOutcome};
use crate::types::{PipelineError, Viewport};

/// Linear float RGBA texture, rows stored top first.
#[derive(Debug, Clone, PartialEq)]
pub struct SoftwareTexture {
    width: u32,
    height: u32,
    texels: Vec<[f32; 4]>,
}

/// Largest edge the CPU composer will allocate.
pub const MAX_SOFTWARE_DIMENSION: u32 = 16_384;

impl SoftwareTexture {
    /// Allocates a cleared texture, failing with `BufferAllocation` instead of
    /// aborting when the size is out of reach.
    pub fn new(viewport: Viewport) -> Result<Self, PipelineError> {
        let Viewport { width, height } = viewport;
        let failed = |reason: String| PipelineError::BufferAllocation {
            label: "software texture".into(),
            width,
            height,
            reason,
        };
        if width > MAX_SOFTWARE_DIMENSION || height > MAX_SOFTWARE_DIMENSION {
            return Err(failed(format!(
                "exceeds software texture limit of {MAX_SOFTWARE_DIMENSION}"
            )));
        }
        let count = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| failed("texel count overflows".into()))?;
        let mut texels = Vec::new();
        texels
            .try_reserve_exact(count)
            .map_err(|err| failed(err.to_string()))?;
        texels.resize(count, [0.0; 4]);
        Ok(Self {
            width,
            height,
            texels,
        })
    }

    /// Builds a texture by evaluating `f` at every texel's GL-style uv.
    pub fn from_fn<F>(viewport: Viewport, mut f: F) -> Result<Self, PipelineError>
    where
        F: FnMut(Vec2) -> [f32; 4],
    {
        let mut texture = Self::new(viewport)?;
        texture.fill(|uv| f(uv));
        Ok(texture)
    }

    pub fn from_image(image: &RgbaImage) -> Result<Self, PipelineError> {
        let (width, height) = image.dimensions();
        let viewport =
            Viewport::new(width, height).ok_or_else(|| PipelineError::BufferAllocation {
                label: "source image".into(),
                width,
                height,
                reason: "image has no pixels".into(),
            })?;
        let texels = image
            .pixels()
            .map(|pixel| pixel.0.map(|channel| channel as f32 / 255.0))
            .collect();
        Ok(Self {
            width: viewport.width,
            height: viewport.height,
            texels,
        })
    }

    pub fn to_image(&self) -> RgbaImage {
        RgbaImage::from_fn(self.width, self.height, |x, y| {
            let texel = self.texel(x, y);
            image::Rgba(texel.map(|channel| (channel.clamp(0.0, 1.0) * 255.0).round() as u8))
        })
    }

    pub fn viewport(&self) -> Viewport {
        Viewport {
            width: self.width,
            height: self.height,
        }
    }

    pub fn texel(&self, x: u32, y: u32) -> [f32; 4] {
        let x = x.min(self.width - 1) as usize;
        let y = y.min(self.height - 1) as usize;
        self.texels[y * self.width as usize + x]
    }

    /// Writes `shade(uv)` into every texel, uv taken at texel centres.
    fn fill<F>(&mut self, mut shade: F)
    where
        F: FnMut(Vec2) -> [f32; 4],
    {
        let width = self.width as usize;
        let (w, h) = (self.width as f32, self.height as f32);
        for (index, texel) in self.texels.iter_mut().enumerate() {
            let x = (index % width) as f32;
            let y = (index / width) as f32;
            let uv = Vec2::new((x + 0.5) / w, 1.0 - (y + 0.5) / h);
            *texel = shade(uv);
        }
    }

    /// Largest per-channel difference to another texture of the same size.
    pub fn max_difference(&self, other: &SoftwareTexture) -> Option<f32> {
        if self.viewport() != other.viewport() {
            return None;
        }
        let diff = self
            .texels
            .iter()
            .zip(&other.texels)
            .flat_map(|(a, b)| a.iter().zip(b).map(|(x, y)| (x - y).abs()))
            .fold(0.0_f32, f32::max);
        Some(diff)
    }
}

impl TextureSampler for SoftwareTexture {
    fn sample(&self, uv: Vec2) -> [f32; 4] {
        let x = uv.x * self.width as f32 - 0.5;
        let y = (1.0 - uv.y) * self.height as f32 - 0.5;
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;

        let clamp_x = |value: f32| value.clamp(0.0, (self.width - 1) as f32) as u32;
        let clamp_y = |value: f32| value.clamp(0.0, (self.height - 1) as f32) as u32;
        let (ix0, ix1) = (clamp_x(x0), clamp_x(x0 + 1.0));
        let (iy0, iy1) = (clamp_y(y0), clamp_y(y0 + 1.0));

        let top = lerp4(self.texel(ix0, iy0), self.texel(ix1, iy0), fx);
        let bottom = lerp4(self.texel(ix0, iy1), self.texel(ix1, iy1), fx);
        lerp4(top, bottom, fy)
    }
}

fn lerp4(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
    std::array::from_fn(|i| a[i] * (1.0 - t) + b[i] * t)
}

pub struct SoftwareComposer {
    chain: PassChain,
    source: SoftwareTexture,
    targets: PingPong<SoftwareTexture>,
    display: SoftwareTexture,
}

impl SoftwareComposer {
    pub fn new(
        chain: PassChain,
        source: SoftwareTexture,
        viewport: Viewport,
    ) -> Result<Self, PipelineError> {
        let targets = PingPong::allocate(chain.intermediate_count(), viewport, |_, viewport| {
            SoftwareTexture::new(viewport)
        })?;
        let display = SoftwareTexture::new(viewport)?;
        // surface the uniform errors a render would hit
        for pass in chain.effects() {
            pass.prepare().map_err(|source| PipelineError::Uniform {
                pass: pass.kind().name().to_string(),
                source,
            })?;
        }
        Ok(Self {
            chain,
            source,
            targets,
            display,
        })
    }

    pub fn viewport(&self) -> Viewport {
        self.targets.viewport()
    }

    pub fn display(&self) -> &SoftwareTexture {
        &self.display
    }

    pub fn intermediate(&self, index: usize) -> Option<&SoftwareTexture> {
        self.targets.get(index)
    }

    /// Runs the chain once and returns the display image.
    pub fn render_frame(&mut self) -> Result<&SoftwareTexture, PipelineError> {
        for index in 0..self.chain.len() {
            let output = self.chain.output(index);
            match &self.chain.stages()[index] {
                Stage::Scene => {
                    let source = &self.source;
                    match output {
                        StageOutput::Display => self.display.fill(|uv| source.sample(uv)),
                        StageOutput::Intermediate(slot) => {
                            if let Some(target) = self.targets.get_mut(slot) {
                                target.fill(|uv| source.sample(uv));
                            }
                        }
                    }
                }
                Stage::Effect(pass) => {
                    let params = pass.prepare().map_err(|source| PipelineError::Uniform {
                        pass: pass.kind().name().to_string(),
                        source,
                    })?;
                    let read = self.chain.input(index).ok_or_else(|| {
                        PipelineError::InvalidChain(format!("pass {index} has no input"))
                    })?;
                    match output {
                        StageOutput::Display => {
                            let input = self.targets.get(read).ok_or_else(|| {
                                PipelineError::InvalidChain(format!("buffer {read} missing"))
                            })?;
                            self.display.fill(|uv| params.shade(input, uv));
                        }
                        StageOutput::Intermediate(write) => {
                            let (input, target) =
                                self.targets.pair_mut(read, write).ok_or_else(|| {
                                    PipelineError::InvalidChain(format!(
                                        "pass {index} reads and writes buffer {write}"
                                    ))
                                })?;
                            target.fill(|uv| params.shade(input, uv));
                        }
                    }
                }
            }
        }
        Ok(&self.display)
    }
}

impl Compositor for SoftwareComposer {
    fn resize(&mut self, width: u32, height: u32) -> Result<ResizeOutcome, PipelineError> {
        // display first, so a failed allocation leaves every buffer untouched
        let display = match Viewport::new(width, height) {
            Some(viewport) if viewport != self.targets.viewport() => {
                Some(SoftwareTexture::new(viewport)?)
            }
            _ => None,
        };
        let outcome = self
            .targets
            .resize(width, height, |_, viewport| SoftwareTexture::new(viewport))?;
        if let Some(display) = display {
            self.display = display;
        }
        Ok(outcome)
    }

    fn chain(&self) -> &PassChain {
        &self.chain
    }

    fn chain_mut(&mut self) -> &mut PassChain {
        &mut self.chain
    }

    fn render(&mut self, _scene: &Scene) -> Result<()> {
        self.render_frame()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::EffectKind;

    fn viewport(width: u32, height: u32) -> Viewport {
        Viewport::new(width, height).expect("viewport")
    }

    /// Checkerboard with a colour ramp so both warps and channel shifts show.
    fn synthetic(viewport: Viewport) -> SoftwareTexture {
        SoftwareTexture::from_fn(viewport, |uv| {
            let checker = ((uv.x * 8.0).floor() + (uv.y * 8.0).floor()) as i32 % 2 == 0;
            let base = if checker { 1.0 } else { 0.0 };
            [base, uv.x, 1.0 - base, 1.0]
        })
        .expect("synthetic texture")
    }

    fn composer(order: [EffectKind; 2], amount: f32) -> SoftwareComposer {
        let mut chain = PassChain::scene_then(order).expect("chain");
        let distortion = chain.effect_mut(EffectKind::Distortion).expect("distortion");
        distortion.set_float("time", 1.3).expect("time");
        distortion.set_float("progress", 0.35).expect("progress");
        chain
            .effect_mut(EffectKind::RgbShift)
            .expect("fringe")
            .set_float("amount", amount)
            .expect("amount");
        SoftwareComposer::new(chain, synthetic(viewport(64, 64)), viewport(64, 64))
            .expect("composer")
    }

    #[test]
    fn sampling_texel_centres_is_exact() {
        let texture = synthetic(viewport(8, 8));
        let uv = Vec2::new(2.5 / 8.0, 1.0 - 5.5 / 8.0);
        assert_eq!(texture.sample(uv), texture.texel(2, 5));
    }

    #[test]
    fn sampling_clamps_outside_the_texture() {
        let texture = synthetic(viewport(8, 8));
        assert_eq!(texture.sample(Vec2::new(-3.0, 5.0)), texture.texel(0, 0));
        assert_eq!(texture.sample(Vec2::new(4.0, -1.0)), texture.texel(7, 7));
    }

    #[test]
    fn pass_order_changes_the_output() {
        let mut forward = composer([EffectKind::Distortion, EffectKind::RgbShift], 0.05);
        let mut reversed = composer([EffectKind::RgbShift, EffectKind::Distortion], 0.05);
        let a = forward.render_frame().expect("render").clone();
        let b = reversed.render_frame().expect("render").clone();
        let diff = a.max_difference(&b).expect("same size");
        assert!(diff > 0.05, "expected order to matter, max difference {diff}");
    }

    #[test]
    fn identity_uniforms_reproduce_the_source() {
        let chain = PassChain::scene_then([EffectKind::Distortion, EffectKind::RgbShift])
            .map(|mut chain| {
                if let Some(fringe) = chain.effect_mut(EffectKind::RgbShift) {
                    fringe.set_float("amount", 0.0).expect("amount");
                }
                chain
            })
            .expect("chain");
        let source = synthetic(viewport(16, 16));
        let mut composer =
            SoftwareComposer::new(chain, source.clone(), viewport(16, 16)).expect("composer");
        let output = composer.render_frame().expect("render");
        let diff = output.max_difference(&source).expect("same size");
        assert!(diff < 1e-5, "max difference {diff}");
    }

    #[test]
    fn resize_follows_ping_pong_rules() {
        let mut composer = composer([EffectKind::Distortion, EffectKind::RgbShift], 0.01);
        assert_eq!(composer.resize(32, 16).ok(), Some(ResizeOutcome::Resized));
        assert_eq!(composer.resize(32, 16).ok(), Some(ResizeOutcome::Unchanged));
        assert_eq!(composer.resize(0, 16).ok(), Some(ResizeOutcome::Rejected));
        assert_eq!(composer.viewport(), viewport(32, 16));
        let output = composer.render_frame().expect("render");
        assert_eq!(output.viewport(), viewport(32, 16));
        assert_eq!(
            composer.intermediate(1).map(SoftwareTexture::viewport),
            Some(viewport(32, 16))
        );
    }

    #[test]
    fn oversized_viewport_reports_allocation_failure() {
        let chain = PassChain::scene_then([EffectKind::Distortion, EffectKind::RgbShift])
            .expect("chain");
        let err = SoftwareComposer::new(
            chain,
            synthetic(viewport(4, 4)),
            viewport(u32::MAX, u32::MAX),
        )
        .err()
        .expect("allocation should fail");
        assert!(matches!(
            err,
            PipelineError::BufferAllocation {
                width: u32::MAX,
                height: u32::MAX,
                ..
            }
        ));
    }

    #[test]
    fn failed_resize_keeps_previous_buffers() {
        let mut composer = composer([EffectKind::Distortion, EffectKind::RgbShift], 0.01);
        let err = composer
            .resize(MAX_SOFTWARE_DIMENSION + 1, 8)
            .err()
            .expect("resize should fail");
        assert!(matches!(err, PipelineError::BufferAllocation { .. }));
        assert_eq!(composer.viewport(), viewport(64, 64));
        assert_eq!(composer.display().viewport(), viewport(64, 64));
        assert!(composer.render_frame().is_ok());
    }

    #[test]
    fn image_round_trip_preserves_bytes() {
        let image = RgbaImage::from_fn(3, 2, |x, y| image::Rgba([x as u8 * 40, y as u8 * 90, 7, 255]));
        let texture = SoftwareTexture::from_image(&image).expect("texture");
        assert_eq!(texture.to_image(), image);
    }
}
