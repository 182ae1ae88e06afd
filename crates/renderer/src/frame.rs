//! Per-frame sequencing: resize, time, uniforms, mesh rotation, render.

use std::f32::consts::FRAC_PI_2;

use anyhow::{Context, Result};

use crate::chain::PassChain;
use crate::effects::EffectKind;
use crate::params::{ParamSet, DEFAULT_SCALE, PROGRESS, SCALE};
use crate::runtime::{clamp_progress, BoxedProgressSource, BoxedTimeSource};
use crate::scene::Scene;
use crate::targets::ResizeOutcome;
use crate::types::{PipelineError, Viewport};

/// Executes a [`PassChain`] against a scene.
///
/// Implemented by the GPU composer and the software reference renderer.
pub trait Compositor {
    /// Reallocates intermediate buffers for a new effective resolution.
    fn resize(&mut self, width: u32, height: u32) -> Result<ResizeOutcome, PipelineError>;
    fn chain(&self) -> &PassChain;
    fn chain_mut(&mut self) -> &mut PassChain;
    /// Runs every stage in order, the last one writing the display.
    fn render(&mut self, scene: &Scene) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    pub frame_index: u64,
    pub time: f32,
    pub scale: f32,
    pub progress: f32,
    pub rotation: f32,
    pub viewport: Viewport,
    pub resize: Option<ResizeOutcome>,
}

pub struct FrameDriver<C> {
    compositor: C,
    scene: Scene,
    clock: BoxedTimeSource,
    progress: BoxedProgressSource,
    controls: ParamSet,
    target_aspect: f32,
    viewport: Viewport,
    pending_viewport: Option<Viewport>,
}

impl<C: Compositor> FrameDriver<C> {
    pub fn new(
        compositor: C,
        scene: Scene,
        viewport: Viewport,
        target_aspect: f32,
        clock: BoxedTimeSource,
        progress: BoxedProgressSource,
        controls: ParamSet,
    ) -> Self {
        Self {
            compositor,
            scene,
            clock,
            progress,
            controls,
            target_aspect,
            viewport,
            pending_viewport: None,
        }
    }

    /// Records a host resize; it takes effect at the start of the next tick.
    /// Zero-sized requests are dropped and leave the viewport untouched.
    pub fn queue_resize(&mut self, width: u32, height: u32) -> bool {
        match Viewport::new(width, height) {
            Some(viewport) => {
                self.pending_viewport = Some(viewport);
                true
            }
            None => {
                tracing::debug!(width, height, "dropping zero-sized resize request");
                false
            }
        }
    }

    pub fn tick(&mut self) -> Result<FrameReport> {
        let resize = match self.pending_viewport.take() {
            Some(viewport) => Some(self.apply_viewport(viewport)?),
            None => None,
        };

        let sample = self.clock.sample();
        let progress = clamp_progress(self.progress.progress());
        let scale = self.controls.get(SCALE).unwrap_or(DEFAULT_SCALE);

        let distortions = self
            .compositor
            .chain_mut()
            .effects_mut()
            .filter(|pass| pass.kind() == EffectKind::Distortion);
        for pass in distortions {
            for (name, value) in [
                ("time", sample.seconds),
                ("scale", scale),
                ("progress", progress),
            ] {
                pass.set_float(name, value)
                    .with_context(|| format!("failed to update distortion `{name}`"))?;
            }
        }

        let rotation = self.controls.get(PROGRESS).unwrap_or(0.0) * FRAC_PI_2;
        self.scene.set_rotation(rotation);
        self.scene.time = sample.seconds;
        self.scene.progress = progress;

        self.compositor.render(&self.scene)?;

        Ok(FrameReport {
            frame_index: sample.frame_index,
            time: sample.seconds,
            scale,
            progress,
            rotation,
            viewport: self.viewport,
            resize,
        })
    }

    fn apply_viewport(&mut self, viewport: Viewport) -> Result<ResizeOutcome> {
        let outcome = self
            .compositor
            .resize(viewport.width, viewport.height)
            .context("failed to resize render targets")?;
        if outcome != ResizeOutcome::Rejected {
            self.viewport = viewport;
            self.scene.set_viewport(viewport, self.target_aspect);
        }
        Ok(outcome)
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn controls_mut(&mut self) -> &mut ParamSet {
        &mut self.controls
    }

    pub fn compositor(&self) -> &C {
        &self.compositor
    }

    pub fn compositor_mut(&mut self) -> &mut C {
        &mut self.compositor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{ConstantProgress, FixedTimeSource};
    use crate::targets::PingPong;

    /// Records what the driver asked for without touching any pixels.
    struct Recorder {
        chain: PassChain,
        targets: PingPong<Viewport>,
        log: Vec<String>,
        rendered_rotation: Vec<f32>,
    }

    impl Recorder {
        fn new(viewport: Viewport) -> Self {
            Self::with_passes(viewport, [EffectKind::Distortion, EffectKind::RgbShift])
        }

        fn with_passes<const N: usize>(viewport: Viewport, passes: [EffectKind; N]) -> Self {
            let chain = PassChain::scene_then(passes).expect("chain");
            let targets = PingPong::allocate(2, viewport, |_, viewport| Ok(viewport))
                .expect("allocate");
            Self {
                chain,
                targets,
                log: Vec::new(),
                rendered_rotation: Vec::new(),
            }
        }
    }

    impl Compositor for Recorder {
        fn resize(&mut self, width: u32, height: u32) -> Result<ResizeOutcome, PipelineError> {
            self.log.push(format!("resize {width}x{height}"));
            self.targets.resize(width, height, |_, viewport| Ok(viewport))
        }

        fn chain(&self) -> &PassChain {
            &self.chain
        }

        fn chain_mut(&mut self) -> &mut PassChain {
            &mut self.chain
        }

        fn render(&mut self, scene: &Scene) -> Result<()> {
            let viewport = self.targets.viewport();
            self.log.push(format!(
                "render {}x{} correction {:.4}",
                viewport.width, viewport.height, scene.resolution.correction_y
            ));
            self.rendered_rotation.push(scene.meshes[0].rotation_z);
            Ok(())
        }
    }

    fn driver(progress: f32) -> FrameDriver<Recorder> {
        let viewport = Viewport::new(800, 800).expect("viewport");
        FrameDriver::new(
            Recorder::new(viewport),
            Scene::new(3, 2.0, viewport, 1.0),
            viewport,
            1.0,
            Box::new(FixedTimeSource::new(2.5)),
            Box::new(ConstantProgress(progress)),
            ParamSet::debug_controls(),
        )
    }

    fn distortion_float(driver: &FrameDriver<Recorder>, name: &str) -> Option<f32> {
        driver
            .compositor()
            .chain()
            .effect(EffectKind::Distortion)
            .and_then(|pass| pass.uniforms().float(name).ok())
    }

    #[test]
    fn tick_pushes_time_scale_and_progress() {
        let mut driver = driver(0.4);
        driver.controls_mut().set(SCALE, 3.0).expect("scale");
        let report = driver.tick().expect("tick");
        assert_eq!(report.time, 2.5);
        assert_eq!(distortion_float(&driver, "time"), Some(2.5));
        assert_eq!(distortion_float(&driver, "progress"), Some(0.4));
        let scale = distortion_float(&driver, "scale").unwrap_or_default();
        assert!((scale - 3.0).abs() < 1e-5);
    }

    #[test]
    fn repeated_distortion_passes_all_animate() {
        let viewport = Viewport::new(64, 64).expect("viewport");
        let mut driver = FrameDriver::new(
            Recorder::with_passes(viewport, [EffectKind::Distortion, EffectKind::Distortion]),
            Scene::new(1, 2.0, viewport, 1.0),
            viewport,
            1.0,
            Box::new(FixedTimeSource::new(2.5)),
            Box::new(ConstantProgress(0.7)),
            ParamSet::debug_controls(),
        );
        driver.tick().expect("tick");

        let pushed: Vec<(f32, f32)> = driver
            .compositor()
            .chain()
            .effects()
            .map(|pass| {
                let uniforms = pass.uniforms();
                (
                    uniforms.float("time").unwrap_or_default(),
                    uniforms.float("progress").unwrap_or_default(),
                )
            })
            .collect();
        assert_eq!(pushed, vec![(2.5, 0.7), (2.5, 0.7)]);
    }

    #[test]
    fn rotation_follows_control_progress_not_animation() {
        let mut driver = driver(0.9);
        driver.controls_mut().set(PROGRESS, 1.0).expect("progress");
        let report = driver.tick().expect("tick");
        assert!((report.rotation - FRAC_PI_2).abs() < 1e-6);
        assert_eq!(driver.compositor().rendered_rotation, vec![report.rotation]);
    }

    #[test]
    fn out_of_range_progress_is_clamped() {
        let mut driver = driver(3.0);
        let report = driver.tick().expect("tick");
        assert_eq!(report.progress, 1.0);
    }

    #[test]
    fn resize_is_applied_before_render() {
        let mut driver = driver(0.0);
        assert!(driver.queue_resize(1920, 1080));
        let report = driver.tick().expect("tick");
        assert_eq!(report.resize, Some(ResizeOutcome::Resized));
        assert_eq!(
            driver.compositor().log,
            vec![
                "resize 1920x1080".to_string(),
                "render 1920x1080 correction 0.5625".to_string(),
            ]
        );
        assert_eq!(driver.viewport(), Viewport::new(1920, 1080).expect("viewport"));
    }

    #[test]
    fn latest_queued_resize_wins() {
        let mut driver = driver(0.0);
        driver.queue_resize(1024, 768);
        driver.queue_resize(640, 480);
        driver.tick().expect("tick");
        assert_eq!(driver.compositor().log[0], "resize 640x480");
    }

    #[test]
    fn zero_resize_is_ignored() {
        let mut driver = driver(0.0);
        assert!(!driver.queue_resize(0, 600));
        let report = driver.tick().expect("tick");
        assert_eq!(report.resize, None);
        assert_eq!(driver.viewport(), Viewport::new(800, 800).expect("viewport"));
        assert_eq!(driver.scene().resolution.correction_y, 1.0);
    }
}
