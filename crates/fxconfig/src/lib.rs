use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

pub const CONFIG_VERSION: u32 = 1;

/// Names of the debug controls every configuration must provide.
pub const CONTROL_SCALE: &str = "scale";
pub const CONTROL_PROGRESS: &str = "progress";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub version: u32,
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub images: ImagesConfig,
    #[serde(default = "default_controls")]
    pub controls: BTreeMap<String, ControlConfig>,
    #[serde(default)]
    pub post: PostConfig,
    #[serde(default)]
    pub timeline: TimelineConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub max_pixel_ratio: f32,
    #[serde(
        deserialize_with = "deserialize_antialias_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub antialias: Option<AntialiasSetting>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_space: Option<ColorSpaceSetting>,
    pub clear_color: [f32; 4],
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Image Distort".to_string(),
            width: 1280,
            height: 800,
            max_pixel_ratio: 2.0,
            antialias: Some(AntialiasSetting::Auto),
            color_space: None,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ImagesConfig {
    pub paths: Vec<PathBuf>,
    pub target_aspect: f32,
    pub spacing: f32,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            paths: vec![
                PathBuf::from("images/01.png"),
                PathBuf::from("images/02.png"),
                PathBuf::from("images/03.png"),
            ],
            target_aspect: 1.0,
            spacing: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ControlConfig {
    pub default: f32,
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

fn default_controls() -> BTreeMap<String, ControlConfig> {
    let mut controls = BTreeMap::new();
    controls.insert(
        CONTROL_SCALE.to_string(),
        ControlConfig {
            default: 2.0,
            min: 0.1,
            max: 10.0,
            step: 0.01,
        },
    );
    controls.insert(
        CONTROL_PROGRESS.to_string(),
        ControlConfig {
            default: 0.0,
            min: 0.0,
            max: 1.0,
            step: 0.01,
        },
    );
    controls
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PostConfig {
    pub order: Vec<String>,
    pub rgb_shift_amount: f32,
}

impl Default for PostConfig {
    fn default() -> Self {
        Self {
            order: vec!["distortion".to_string(), "rgb-shift".to_string()],
            rgb_shift_amount: 0.0015,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepeatMode {
    Once,
    Loop,
    PingPong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EasingName {
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
    Step,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimelineConfig {
    pub enabled: bool,
    pub repeat: RepeatMode,
    pub keyframes: Vec<KeyframeConfig>,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            repeat: RepeatMode::PingPong,
            keyframes: vec![
                KeyframeConfig {
                    at: Duration::ZERO,
                    value: 0.0,
                    easing: EasingName::EaseInOut,
                },
                KeyframeConfig {
                    at: Duration::from_secs(4),
                    value: 1.0,
                    easing: EasingName::EaseInOut,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KeyframeConfig {
    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub at: Duration,
    pub value: f32,
    #[serde(default = "default_easing")]
    pub easing: EasingName,
}

fn default_easing() -> EasingName {
    EasingName::Linear
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AntialiasSetting {
    Auto,
    Off,
    #[serde(rename = "2")]
    Samples2,
    #[serde(rename = "4")]
    Samples4,
    #[serde(rename = "8")]
    Samples8,
    #[serde(rename = "16")]
    Samples16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpaceSetting {
    Auto,
    Gamma,
    Linear,
}

fn serialize_duration<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*value).to_string())
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_duration_opt(deserializer)?
        .ok_or_else(|| de::Error::custom("keyframe time must not be empty"))
}

fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs(v as u64)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Some(Duration::from_secs_f64(v)))
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(Visitor)
}

fn deserialize_antialias_opt<'de, D>(deserializer: D) -> Result<Option<AntialiasSetting>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Helper {
        Str(String),
        Num(i64),
    }

    let helper: Option<Helper> = Option::deserialize(deserializer)?;
    let result = match helper {
        None => None,
        Some(Helper::Str(raw)) => Some(parse_antialias(&raw).map_err(de::Error::custom)?),
        Some(Helper::Num(value)) => {
            if value < 0 {
                return Err(de::Error::custom("antialias value must be non-negative"));
            }
            let raw = value.to_string();
            Some(parse_antialias(&raw).map_err(de::Error::custom)?)
        }
    };
    Ok(result)
}

fn parse_antialias(raw: &str) -> Result<AntialiasSetting, String> {
    let normalized = raw.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "auto" | "max" | "default" => Ok(AntialiasSetting::Auto),
        "off" | "none" | "disable" | "disabled" | "0" | "1" => Ok(AntialiasSetting::Off),
        "2" => Ok(AntialiasSetting::Samples2),
        "4" => Ok(AntialiasSetting::Samples4),
        "8" => Ok(AntialiasSetting::Samples8),
        "16" => Ok(AntialiasSetting::Samples16),
        other => Err(format!("invalid antialias setting '{other}'")),
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            window: WindowConfig::default(),
            images: ImagesConfig::default(),
            controls: default_controls(),
            post: PostConfig::default(),
            timeline: TimelineConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: AppConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    /// Loads a configuration file, falling back to defaults when it is absent.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&contents)?;
        if let Some(base) = path.parent() {
            config.images.resolve_relative_to(base);
        }
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn control(&self, name: &str) -> Option<&ControlConfig> {
        self.controls.get(name)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != CONFIG_VERSION {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected {CONFIG_VERSION}",
                self.version
            )));
        }

        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid(
                "window width and height must be greater than zero".into(),
            ));
        }

        if !(self.window.max_pixel_ratio > 0.0) {
            return Err(ConfigError::Invalid(
                "window.max_pixel_ratio must be positive".into(),
            ));
        }

        if self.images.paths.is_empty() {
            return Err(ConfigError::Invalid(
                "images.paths must list at least one image".into(),
            ));
        }

        if !(self.images.target_aspect > 0.0) {
            return Err(ConfigError::Invalid(
                "images.target_aspect must be positive".into(),
            ));
        }

        for required in [CONTROL_SCALE, CONTROL_PROGRESS] {
            if !self.controls.contains_key(required) {
                return Err(ConfigError::Invalid(format!(
                    "controls.{required} must be defined"
                )));
            }
        }

        for (name, control) in &self.controls {
            let finite = [control.default, control.min, control.max, control.step]
                .iter()
                .all(|value| value.is_finite());
            if !finite {
                return Err(ConfigError::Invalid(format!(
                    "control '{name}' contains a non-finite value"
                )));
            }
            if control.min > control.max {
                return Err(ConfigError::Invalid(format!(
                    "control '{name}' min must not exceed max"
                )));
            }
            if control.step <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "control '{name}' step must be positive"
                )));
            }
            if control.default < control.min || control.default > control.max {
                return Err(ConfigError::Invalid(format!(
                    "control '{name}' default must lie within [{}, {}]",
                    control.min, control.max
                )));
            }
        }

        if self.post.order.is_empty() {
            return Err(ConfigError::Invalid(
                "post.order must list at least one pass".into(),
            ));
        }

        if !(self.post.rgb_shift_amount.is_finite() && self.post.rgb_shift_amount >= 0.0) {
            return Err(ConfigError::Invalid(
                "post.rgb_shift_amount must be a non-negative number".into(),
            ));
        }

        if self.timeline.enabled {
            if self.timeline.keyframes.is_empty() {
                return Err(ConfigError::Invalid(
                    "timeline must contain at least one keyframe when enabled".into(),
                ));
            }
            for keyframe in &self.timeline.keyframes {
                if !(0.0..=1.0).contains(&keyframe.value) {
                    return Err(ConfigError::Invalid(format!(
                        "timeline keyframe at {:?} has value {} outside [0, 1]",
                        keyframe.at, keyframe.value
                    )));
                }
            }
        }

        Ok(())
    }
}

impl ImagesConfig {
    fn resolve_relative_to(&mut self, base: &Path) {
        for path in &mut self.paths {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version = 1

[window]
title = "Distort"
width = 1920
height = 1080
max_pixel_ratio = 1.5
antialias = 4
color_space = "linear"

[images]
paths = ["a.png", "b.png"]
target_aspect = 1.0

[controls.scale]
default = 3.0
min = 0.1
max = 10.0
step = 0.01

[controls.progress]
default = 0.0
min = 0.0
max = 1.0
step = 0.01

[post]
order = ["rgb-shift", "distortion"]
rgb_shift_amount = 0.003

[timeline]
repeat = "loop"

[[timeline.keyframes]]
at = "0s"
value = 0.0

[[timeline.keyframes]]
at = "1500ms"
value = 1.0
easing = "ease-out"
"#;

    #[test]
    fn parses_sample_config() {
        let config = AppConfig::from_toml_str(SAMPLE).expect("parse config");
        assert_eq!(config.window.width, 1920);
        assert_eq!(config.window.antialias, Some(AntialiasSetting::Samples4));
        assert_eq!(config.window.color_space, Some(ColorSpaceSetting::Linear));
        assert_eq!(config.images.paths.len(), 2);
        assert_eq!(config.control(CONTROL_SCALE).map(|c| c.default), Some(3.0));
        assert_eq!(config.post.order, vec!["rgb-shift", "distortion"]);
        assert_eq!(config.timeline.repeat, RepeatMode::Loop);
        assert_eq!(config.timeline.keyframes[1].at, Duration::from_millis(1500));
        assert_eq!(config.timeline.keyframes[1].easing, EasingName::EaseOut);
        assert_eq!(config.timeline.keyframes[0].easing, EasingName::Linear);
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = AppConfig::from_toml_str("version = 1").expect("parse config");
        assert_eq!(config.images.paths.len(), 3);
        assert_eq!(config.control(CONTROL_SCALE).map(|c| c.default), Some(2.0));
        assert!((config.post.rgb_shift_amount - 0.0015).abs() < f32::EPSILON);
        assert_eq!(config.window.max_pixel_ratio, 2.0);
        assert!(config.timeline.enabled);
    }

    #[test]
    fn rejects_unknown_version() {
        let err = AppConfig::from_toml_str("version = 2").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_default_outside_range() {
        let config = r#"
version = 1

[controls.scale]
default = 20.0
min = 0.1
max = 10.0
step = 0.01

[controls.progress]
default = 0.0
min = 0.0
max = 1.0
step = 0.01
"#;
        let err = AppConfig::from_toml_str(config).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_missing_required_control() {
        let config = r#"
version = 1

[controls.scale]
default = 2.0
min = 0.1
max = 10.0
step = 0.01
"#;
        let err = AppConfig::from_toml_str(config).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(message) if message.contains("progress")));
    }

    #[test]
    fn rejects_keyframe_value_out_of_range() {
        let config = r#"
version = 1

[[timeline.keyframes]]
at = 0
value = 1.5
"#;
        let err = AppConfig::from_toml_str(config).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let rendered = AppConfig::default().to_toml_string().expect("serialize");
        let parsed = AppConfig::from_toml_str(&rendered).expect("parse rendered config");
        assert_eq!(parsed.timeline.keyframes.len(), 2);
        assert_eq!(parsed.timeline.keyframes[1].at, Duration::from_secs(4));
    }
}
