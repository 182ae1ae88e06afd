use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use renderer::{Antialiasing, ColorSpaceMode, EffectKind};

#[derive(Parser, Debug)]
#[command(
    name = "imagedistort",
    author,
    version,
    about = "Animated image distortion and color-fringe post-processing preview",
    arg_required_else_help = false
)]
pub struct Cli {
    /// Configuration file; defaults to `config.toml` in the config directory.
    #[arg(long, value_name = "PATH", env = "IMAGEDISTORT_CONFIG", global = true)]
    pub config: Option<PathBuf>,
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Images to lay out as planes, replacing `images.paths` from the config.
    #[arg(value_name = "IMAGE")]
    pub images: Vec<PathBuf>,

    /// Initial window size in logical pixels (e.g. `1280x800`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Anti-aliasing policy: `auto`, `off`, or an explicit MSAA sample count (e.g. `4`).
    #[arg(long, value_name = "MODE", value_parser = parse_antialias)]
    pub antialias: Option<Antialiasing>,

    /// Output color space handling: `auto`, `gamma`, or `linear`.
    #[arg(long, value_name = "MODE", value_parser = parse_color_space)]
    pub color_space: Option<ColorSpaceMode>,

    #[command(flatten)]
    pub chain: ChainArgs,

    /// Hold the distortion progress at zero instead of playing the timeline.
    #[arg(long)]
    pub no_timeline: bool,
}

/// Options shared by every command that builds a pass chain.
#[derive(Args, Debug, Default, Clone)]
pub struct ChainArgs {
    /// Post pass order, comma separated (e.g. `rgb-shift,distortion`).
    #[arg(long, value_name = "PASSES", value_delimiter = ',', value_parser = parse_effect)]
    pub order: Option<Vec<EffectKind>>,

    /// Override a control, e.g. `--set scale=3.5`. May be repeated.
    #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_override)]
    pub overrides: Vec<(String, f32)>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render one image through the post chain on the CPU and write a PNG.
    Still(StillArgs),
    /// Inspect the configuration.
    Config(ConfigCommand),
}

#[derive(Args, Debug)]
pub struct StillArgs {
    /// Source image.
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Destination image; the format follows the extension.
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Render resolution; defaults to the input image size.
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Elapsed seconds fed to the distortion.
    #[arg(long, default_value_t = 0.0)]
    pub time: f32,

    /// Distortion progress in `[0, 1]`.
    #[arg(long, default_value_t = 0.5)]
    pub progress: f32,

    /// Color-fringe amount; defaults to `post.rgb_shift_amount`.
    #[arg(long)]
    pub amount: Option<f32>,

    #[command(flatten)]
    pub chain: ChainArgs,
}

#[derive(Args, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the config directory and file in use.
    Where,
    /// Print the effective configuration as TOML.
    Show,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let trimmed = value.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("invalid size '{trimmed}'; expected WIDTHxHEIGHT"))?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width in '{trimmed}'"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height in '{trimmed}'"))?;
    if width == 0 || height == 0 {
        return Err("size must be greater than zero in both dimensions".to_string());
    }
    Ok((width, height))
}

pub fn parse_override(value: &str) -> Result<(String, f32), String> {
    let (name, raw) = value
        .split_once('=')
        .ok_or_else(|| format!("invalid override '{value}'; expected NAME=VALUE"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err("override name must not be empty".to_string());
    }
    let parsed: f32 = raw
        .trim()
        .parse()
        .map_err(|_| format!("invalid number '{}' for `{name}`", raw.trim()))?;
    if !parsed.is_finite() {
        return Err(format!("value for `{name}` must be finite"));
    }
    Ok((name.to_string(), parsed))
}

pub fn parse_effect(value: &str) -> Result<EffectKind, String> {
    value.parse().map_err(|err: renderer::PipelineError| err.to_string())
}

pub fn parse_antialias(value: &str) -> Result<Antialiasing, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("anti-alias mode must not be empty".to_string());
    }

    let normalized = trimmed.to_ascii_lowercase();
    match normalized.as_str() {
        "auto" | "max" | "default" => Ok(Antialiasing::Auto),
        "off" | "none" | "disable" | "disabled" | "0" => Ok(Antialiasing::Off),
        _ => {
            let samples: u32 = normalized.parse().map_err(|_| {
                format!("invalid anti-alias sample count '{trimmed}'; use auto/off or 2/4/8/16")
            })?;

            if samples == 1 {
                return Ok(Antialiasing::Off);
            }

            if !matches!(samples, 2 | 4 | 8 | 16) {
                return Err(format!(
                    "unsupported sample count {samples}; supported values are 2, 4, 8, or 16"
                ));
            }

            Ok(Antialiasing::Samples(samples))
        }
    }
}

pub fn parse_color_space(value: &str) -> Result<ColorSpaceMode, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("color space must not be empty".to_string());
    }

    let normalized = trimmed.to_ascii_lowercase();
    match normalized.as_str() {
        "auto" => Ok(ColorSpaceMode::Auto),
        "gamma" | "srgb-off" => Ok(ColorSpaceMode::Gamma),
        "linear" | "srgb" => Ok(ColorSpaceMode::Linear),
        other => Err(format!(
            "unknown color space '{other}'; expected auto, gamma, or linear"
        )),
    }
}
