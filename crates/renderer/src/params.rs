//! Named float controls with slider-style metadata.

use std::collections::BTreeMap;

pub const SCALE: &str = "scale";
pub const PROGRESS: &str = "progress";

pub const DEFAULT_SCALE: f32 = 2.0;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParamError {
    #[error("unknown parameter `{0}`")]
    Unknown(String),
    #[error("parameter `{name}` has an invalid range: {reason}")]
    InvalidRange { name: String, reason: String },
    #[error("parameter `{name}` must be a finite number")]
    NotFinite { name: String },
}

/// A float control clamped to `[min, max]` and snapped to `step`.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatParam {
    name: String,
    value: f32,
    min: f32,
    max: f32,
    step: f32,
}

impl FloatParam {
    pub fn new(
        name: impl Into<String>,
        default: f32,
        min: f32,
        max: f32,
        step: f32,
    ) -> Result<Self, ParamError> {
        let name = name.into();
        if ![default, min, max, step].iter().all(|value| value.is_finite()) {
            return Err(ParamError::NotFinite { name });
        }
        if min > max {
            return Err(ParamError::InvalidRange {
                name,
                reason: format!("min {min} exceeds max {max}"),
            });
        }
        if step <= 0.0 {
            return Err(ParamError::InvalidRange {
                name,
                reason: format!("step {step} must be positive"),
            });
        }
        let default = default.clamp(min, max);
        Ok(Self {
            name,
            value: default,
            min,
            max,
            step,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    pub fn step(&self) -> f32 {
        self.step
    }

    /// Stores `value` snapped to the step grid and clamped; returns the stored value.
    pub fn set(&mut self, value: f32) -> Result<f32, ParamError> {
        if !value.is_finite() {
            return Err(ParamError::NotFinite {
                name: self.name.clone(),
            });
        }
        let snapped = (value / self.step).round() * self.step;
        self.value = snapped.clamp(self.min, self.max);
        Ok(self.value)
    }

    /// Moves the value by a whole number of steps.
    pub fn nudge(&mut self, steps: i32) -> f32 {
        let target = self.value + steps as f32 * self.step;
        self.set(target).unwrap_or(self.value)
    }
}

/// Ordered collection of controls, looked up by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamSet {
    params: BTreeMap<String, FloatParam>,
}

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The two controls of the debug panel: `scale` and the rotation `progress`.
    pub fn debug_controls() -> Self {
        let mut set = Self::new();
        for param in [
            FloatParam::new(SCALE, DEFAULT_SCALE, 0.1, 10.0, 0.01),
            FloatParam::new(PROGRESS, 0.0, 0.0, 1.0, 0.01),
        ]
        .into_iter()
        .flatten()
        {
            set.insert(param);
        }
        set
    }

    pub fn insert(&mut self, param: FloatParam) -> Option<FloatParam> {
        self.params.insert(param.name.clone(), param)
    }

    pub fn get(&self, name: &str) -> Option<f32> {
        self.params.get(name).map(FloatParam::value)
    }

    pub fn param(&self, name: &str) -> Option<&FloatParam> {
        self.params.get(name)
    }

    pub fn set(&mut self, name: &str, value: f32) -> Result<f32, ParamError> {
        self.params
            .get_mut(name)
            .ok_or_else(|| ParamError::Unknown(name.to_string()))?
            .set(value)
    }

    pub fn nudge(&mut self, name: &str, steps: i32) -> Result<f32, ParamError> {
        self.params
            .get_mut(name)
            .map(|param| param.nudge(steps))
            .ok_or_else(|| ParamError::Unknown(name.to_string()))
    }

    /// Applies `name=value` overrides in order, stopping at the first failure.
    pub fn apply_overrides<'a, I>(&mut self, overrides: I) -> Result<(), ParamError>
    where
        I: IntoIterator<Item = (&'a str, f32)>,
    {
        for (name, value) in overrides {
            self.set(name, value)?;
        }
        Ok(())
    }
}
