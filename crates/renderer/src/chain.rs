//! Ordered pass chain and its ping-pong routing plan.
//!
//! ```text
//!   stage 0 (scene) ─▶ buffer 0 ─▶ stage 1 ─▶ buffer 1 ─▶ stage 2 ─▶ display
//! ```
//!
//! Stage `i` writes buffer `i % 2` and the following stage reads it as
//! `tDiffuse`. The last stage always writes the display surface.

use crate::effects::{EffectKind, ShaderPass};
use crate::types::PipelineError;

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// Renders the meshes; must be first.
    Scene,
    Effect(ShaderPass),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutput {
    Intermediate(usize),
    Display,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PassChain {
    stages: Vec<Stage>,
}

impl PassChain {
    pub fn new(mut stages: Vec<Stage>) -> Result<Self, PipelineError> {
        match stages.first() {
            None => {
                return Err(PipelineError::InvalidChain(
                    "chain must contain at least the scene pass".into(),
                ))
            }
            Some(Stage::Effect(pass)) => {
                return Err(PipelineError::InvalidChain(format!(
                    "first pass must render the scene, found `{}`",
                    pass.kind()
                )))
            }
            Some(Stage::Scene) => {}
        }
        if stages.iter().skip(1).any(|stage| matches!(stage, Stage::Scene)) {
            return Err(PipelineError::InvalidChain(
                "the scene pass may only appear once, at the start".into(),
            ));
        }

        for (index, stage) in stages.iter_mut().enumerate().skip(1) {
            if let Stage::Effect(pass) = stage {
                let kind = pass.kind();
                let wrap = |source| PipelineError::Uniform {
                    pass: kind.name().to_string(),
                    source,
                };
                pass.uniforms_mut()
                    .bind_input(Self::buffer_for(index - 1))
                    .map_err(wrap)?;
                kind.validate(pass.uniforms()).map_err(wrap)?;
            }
        }

        Ok(Self { stages })
    }

    /// Scene pass followed by the given effects with default uniforms.
    pub fn scene_then<I>(effects: I) -> Result<Self, PipelineError>
    where
        I: IntoIterator<Item = EffectKind>,
    {
        let stages = std::iter::once(Stage::Scene)
            .chain(effects.into_iter().map(|kind| Stage::Effect(ShaderPass::new(kind))))
            .collect();
        Self::new(stages)
    }

    fn buffer_for(index: usize) -> usize {
        index % 2
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn output(&self, index: usize) -> StageOutput {
        if index + 1 >= self.stages.len() {
            StageOutput::Display
        } else {
            StageOutput::Intermediate(Self::buffer_for(index))
        }
    }

    /// Intermediate buffer stage `index` reads; `None` for the scene pass.
    pub fn input(&self, index: usize) -> Option<usize> {
        if index == 0 || index >= self.stages.len() {
            None
        } else {
            Some(Self::buffer_for(index - 1))
        }
    }

    /// Number of intermediate buffers the chain needs (0, 1, or 2).
    pub fn intermediate_count(&self) -> usize {
        self.stages.len().saturating_sub(1).min(2)
    }

    pub fn effects(&self) -> impl Iterator<Item = &ShaderPass> {
        self.stages.iter().filter_map(|stage| match stage {
            Stage::Effect(pass) => Some(pass),
            Stage::Scene => None,
        })
    }

    pub fn effects_mut(&mut self) -> impl Iterator<Item = &mut ShaderPass> {
        self.stages.iter_mut().filter_map(|stage| match stage {
            Stage::Effect(pass) => Some(pass),
            Stage::Scene => None,
        })
    }

    pub fn effect(&self, kind: EffectKind) -> Option<&ShaderPass> {
        self.effects().find(|pass| pass.kind() == kind)
    }

    pub fn effect_mut(&mut self, kind: EffectKind) -> Option<&mut ShaderPass> {
        self.effects_mut().find(|pass| pass.kind() == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{PassUniforms, TextureBinding, UniformError, UniformValue, T_DIFFUSE};

    #[test]
    fn routes_through_alternating_buffers() {
        let chain =
            PassChain::scene_then([EffectKind::Distortion, EffectKind::RgbShift]).expect("chain");
        assert_eq!(chain.len(), 3);
        assert_eq!(chain.output(0), StageOutput::Intermediate(0));
        assert_eq!(chain.output(1), StageOutput::Intermediate(1));
        assert_eq!(chain.output(2), StageOutput::Display);
        assert_eq!(chain.input(0), None);
        assert_eq!(chain.input(1), Some(0));
        assert_eq!(chain.input(2), Some(1));
        assert_eq!(chain.intermediate_count(), 2);
    }

    #[test]
    fn binds_diffuse_input_to_previous_output() {
        let chain =
            PassChain::scene_then([EffectKind::Distortion, EffectKind::RgbShift]).expect("chain");
        let bindings: Vec<_> = chain
            .effects()
            .map(|pass| pass.uniforms().texture(T_DIFFUSE).expect("texture"))
            .collect();
        assert_eq!(
            bindings,
            vec![TextureBinding::Intermediate(0), TextureBinding::Intermediate(1)]
        );
    }

    #[test]
    fn scene_only_chain_writes_display() {
        let chain = PassChain::scene_then([]).expect("chain");
        assert_eq!(chain.output(0), StageOutput::Display);
        assert_eq!(chain.intermediate_count(), 0);
    }

    #[test]
    fn rejects_empty_and_misordered_chains() {
        assert!(matches!(
            PassChain::new(Vec::new()),
            Err(PipelineError::InvalidChain(_))
        ));
        let effect_first = vec![
            Stage::Effect(ShaderPass::new(EffectKind::RgbShift)),
            Stage::Scene,
        ];
        assert!(matches!(
            PassChain::new(effect_first),
            Err(PipelineError::InvalidChain(_))
        ));
        assert!(matches!(
            PassChain::new(vec![Stage::Scene, Stage::Scene]),
            Err(PipelineError::InvalidChain(_))
        ));
    }

    #[test]
    fn reports_inconsistent_uniforms_at_build_time() {
        let mut uniforms = EffectKind::Distortion.default_uniforms();
        uniforms.insert("scale", UniformValue::Vec2([1.0, 1.0]));
        let stages = vec![
            Stage::Scene,
            Stage::Effect(ShaderPass::with_uniforms(EffectKind::Distortion, uniforms)),
        ];
        let err = PassChain::new(stages).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Uniform {
                source: UniformError::TypeMismatch { .. },
                ..
            }
        ));

        let mut missing_input = PassUniforms::new();
        missing_input.insert("amount", UniformValue::Float(0.1));
        missing_input.insert("angle", UniformValue::Float(0.0));
        let stages = vec![
            Stage::Scene,
            Stage::Effect(ShaderPass::with_uniforms(EffectKind::RgbShift, missing_input)),
        ];
        let err = PassChain::new(stages).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Uniform {
                source: UniformError::MissingInput(_),
                ..
            }
        ));
    }

    #[test]
    fn effect_mut_finds_pass_by_kind() {
        let mut chain =
            PassChain::scene_then([EffectKind::RgbShift, EffectKind::Distortion]).expect("chain");
        chain
            .effect_mut(EffectKind::Distortion)
            .expect("distortion pass")
            .set_float("progress", 0.75)
            .expect("set progress");
        let progress = chain
            .effect(EffectKind::Distortion)
            .and_then(|pass| pass.uniforms().float("progress").ok());
        assert_eq!(progress, Some(0.75));
    }
}
