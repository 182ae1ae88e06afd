//! Full-screen post effects and their uniform contracts.
//!
//! Every effect owns a [`PassUniforms`] map (name → typed value). The map is
//! what callers write into each frame; [`EffectKind::prepare`] turns it into
//! the packed uniform block the GPU pass uploads and the software renderer
//! shades with.

mod distortion;
mod rgb_shift;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use glam::Vec2;

pub use distortion::{perturb, warp_uv, DistortionParams, PERTURBATIONS};
pub use rgb_shift::{channel_offset, RgbShiftParams, RGB_SHIFT_AMOUNT};

use crate::types::PipelineError;

/// Name of the texture input every effect reads from.
pub const T_DIFFUSE: &str = "tDiffuse";

/// Anything an effect can read colors from.
///
/// `uv` follows the GL convention: origin bottom-left, `y` up.
pub trait TextureSampler {
    fn sample(&self, uv: Vec2) -> [f32; 4];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureBinding {
    Unbound,
    Intermediate(usize),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec4([f32; 4]),
    Texture(TextureBinding),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    Float,
    Vec2,
    Vec4,
    Texture,
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Vec2(_) => UniformKind::Vec2,
            UniformValue::Vec4(_) => UniformKind::Vec4,
            UniformValue::Texture(_) => UniformKind::Texture,
        }
    }

    fn is_finite(&self) -> bool {
        match self {
            UniformValue::Float(value) => value.is_finite(),
            UniformValue::Vec2(values) => values.iter().all(|v| v.is_finite()),
            UniformValue::Vec4(values) => values.iter().all(|v| v.is_finite()),
            UniformValue::Texture(_) => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UniformError {
    #[error("unknown uniform `{0}`")]
    Unknown(String),
    #[error("uniform `{name}` expects {expected:?} but holds {actual:?}")]
    TypeMismatch {
        name: String,
        expected: UniformKind,
        actual: UniformKind,
    },
    #[error("uniform `{0}` is declared but missing")]
    Missing(String),
    #[error("texture input `{0}` is not bound")]
    MissingInput(String),
    #[error("uniform `{0}` must be finite")]
    NotFinite(String),
}

/// Per-pass uniform state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassUniforms {
    values: BTreeMap<String, UniformValue>,
}

impl PassUniforms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares or replaces a uniform without any checks. Consistency is
    /// verified when the chain is built.
    pub fn insert(&mut self, name: impl Into<String>, value: UniformValue) -> &mut Self {
        self.values.insert(name.into(), value);
        self
    }

    /// Updates an already declared uniform, keeping its type.
    pub fn set(&mut self, name: &str, value: UniformValue) -> Result<(), UniformError> {
        let slot = self
            .values
            .get_mut(name)
            .ok_or_else(|| UniformError::Unknown(name.to_string()))?;
        if slot.kind() != value.kind() {
            return Err(UniformError::TypeMismatch {
                name: name.to_string(),
                expected: slot.kind(),
                actual: value.kind(),
            });
        }
        if !value.is_finite() {
            return Err(UniformError::NotFinite(name.to_string()));
        }
        *slot = value;
        Ok(())
    }

    pub fn set_float(&mut self, name: &str, value: f32) -> Result<(), UniformError> {
        self.set(name, UniformValue::Float(value))
    }

    pub fn get(&self, name: &str) -> Option<&UniformValue> {
        self.values.get(name)
    }

    pub fn float(&self, name: &str) -> Result<f32, UniformError> {
        match self.typed(name, UniformKind::Float)? {
            UniformValue::Float(value) => Ok(value),
            _ => Err(UniformError::Missing(name.to_string())),
        }
    }

    pub fn vec2(&self, name: &str) -> Result<[f32; 2], UniformError> {
        match self.typed(name, UniformKind::Vec2)? {
            UniformValue::Vec2(value) => Ok(value),
            _ => Err(UniformError::Missing(name.to_string())),
        }
    }

    pub fn texture(&self, name: &str) -> Result<TextureBinding, UniformError> {
        match self.typed(name, UniformKind::Texture)? {
            UniformValue::Texture(binding) => Ok(binding),
            _ => Err(UniformError::Missing(name.to_string())),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    fn typed(&self, name: &str, expected: UniformKind) -> Result<UniformValue, UniformError> {
        let value = *self
            .values
            .get(name)
            .ok_or_else(|| UniformError::Missing(name.to_string()))?;
        if value.kind() != expected {
            return Err(UniformError::TypeMismatch {
                name: name.to_string(),
                expected,
                actual: value.kind(),
            });
        }
        Ok(value)
    }

    /// Points the `tDiffuse` input at an intermediate buffer.
    pub(crate) fn bind_input(&mut self, index: usize) -> Result<(), UniformError> {
        match self.values.get(T_DIFFUSE) {
            None => Err(UniformError::MissingInput(T_DIFFUSE.to_string())),
            Some(_) => self.set(
                T_DIFFUSE,
                UniformValue::Texture(TextureBinding::Intermediate(index)),
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKind {
    Distortion,
    RgbShift,
}

impl EffectKind {
    pub const ALL: [EffectKind; 2] = [EffectKind::Distortion, EffectKind::RgbShift];

    pub fn name(&self) -> &'static str {
        match self {
            EffectKind::Distortion => "distortion",
            EffectKind::RgbShift => "rgb-shift",
        }
    }

    /// Uniforms the effect declares, with their starting values.
    pub fn default_uniforms(&self) -> PassUniforms {
        let mut uniforms = PassUniforms::new();
        uniforms.insert(T_DIFFUSE, UniformValue::Texture(TextureBinding::Unbound));
        match self {
            EffectKind::Distortion => {
                uniforms
                    .insert("time", UniformValue::Float(0.0))
                    .insert("progress", UniformValue::Float(0.0))
                    .insert("scale", UniformValue::Float(crate::params::DEFAULT_SCALE))
                    .insert("angle", UniformValue::Float(0.0))
                    .insert("center", UniformValue::Vec2([0.5, 0.5]));
            }
            EffectKind::RgbShift => {
                uniforms
                    .insert("amount", UniformValue::Float(RGB_SHIFT_AMOUNT))
                    .insert("angle", UniformValue::Float(0.0));
            }
        }
        uniforms
    }

    /// Checks `uniforms` against the effect's declared contract.
    pub fn validate(&self, uniforms: &PassUniforms) -> Result<(), UniformError> {
        let declared = self.default_uniforms();
        for name in uniforms.names() {
            if declared.get(name).is_none() {
                return Err(UniformError::Unknown(name.to_string()));
            }
        }
        for (name, value) in &declared.values {
            let actual = uniforms
                .get(name)
                .ok_or_else(|| UniformError::Missing(name.clone()))?;
            if actual.kind() != value.kind() {
                return Err(UniformError::TypeMismatch {
                    name: name.clone(),
                    expected: value.kind(),
                    actual: actual.kind(),
                });
            }
            if !actual.is_finite() {
                return Err(UniformError::NotFinite(name.clone()));
            }
        }
        match uniforms.texture(T_DIFFUSE)? {
            TextureBinding::Unbound => Err(UniformError::MissingInput(T_DIFFUSE.to_string())),
            TextureBinding::Intermediate(_) => Ok(()),
        }
    }

    /// Packs the current uniform values into the effect's parameter block.
    pub fn prepare(&self, uniforms: &PassUniforms) -> Result<EffectParams, UniformError> {
        match self {
            EffectKind::Distortion => Ok(EffectParams::Distortion(DistortionParams {
                time: uniforms.float("time")?,
                progress: uniforms.float("progress")?,
                scale: uniforms.float("scale")?,
                angle: uniforms.float("angle")?,
                center: uniforms.vec2("center")?,
                padding: [0.0; 2],
            })),
            EffectKind::RgbShift => Ok(EffectParams::RgbShift(RgbShiftParams {
                amount: uniforms.float("amount")?,
                angle: uniforms.float("angle")?,
                padding: [0.0; 2],
            })),
        }
    }

    pub fn fragment_wgsl(&self) -> &'static str {
        match self {
            EffectKind::Distortion => distortion::FRAGMENT_WGSL,
            EffectKind::RgbShift => rgb_shift::FRAGMENT_WGSL,
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EffectKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "distortion" | "distort" | "custom" => Ok(EffectKind::Distortion),
            "rgb-shift" | "rgbshift" | "rgb_shift" | "fringe" => Ok(EffectKind::RgbShift),
            other => Err(PipelineError::InvalidChain(format!(
                "unknown effect `{other}` (expected distortion or rgb-shift)"
            ))),
        }
    }
}

/// Packed parameters for one frame of one effect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EffectParams {
    Distortion(DistortionParams),
    RgbShift(RgbShiftParams),
}

impl EffectParams {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            EffectParams::Distortion(params) => bytemuck::bytes_of(params),
            EffectParams::RgbShift(params) => bytemuck::bytes_of(params),
        }
    }

    /// Evaluates the effect for one output pixel.
    pub fn shade<S: TextureSampler + ?Sized>(&self, input: &S, uv: Vec2) -> [f32; 4] {
        match self {
            EffectParams::Distortion(params) => params.shade(input, uv),
            EffectParams::RgbShift(params) => params.shade(input, uv),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShaderPass {
    kind: EffectKind,
    uniforms: PassUniforms,
}

impl ShaderPass {
    pub fn new(kind: EffectKind) -> Self {
        Self {
            kind,
            uniforms: kind.default_uniforms(),
        }
    }

    pub fn with_uniforms(kind: EffectKind, uniforms: PassUniforms) -> Self {
        Self { kind, uniforms }
    }

    pub fn kind(&self) -> EffectKind {
        self.kind
    }

    pub fn uniforms(&self) -> &PassUniforms {
        &self.uniforms
    }

    pub fn uniforms_mut(&mut self) -> &mut PassUniforms {
        &mut self.uniforms
    }

    pub fn set_float(&mut self, name: &str, value: f32) -> Result<(), UniformError> {
        self.uniforms.set_float(name, value)
    }

    pub fn prepare(&self) -> Result<EffectParams, UniformError> {
        self.kind.prepare(&self.uniforms)
    }
}
