use anyhow::{Context, Result};
use fxconfig::{AntialiasSetting, AppConfig, ColorSpaceSetting};
use renderer::{Antialiasing, ColorSpaceMode, EffectKind, FloatParam, ParamSet, RendererConfig};

use crate::cli::ChainArgs;

pub fn map_antialias(setting: Option<AntialiasSetting>) -> Antialiasing {
    match setting {
        None | Some(AntialiasSetting::Auto) => Antialiasing::Auto,
        Some(AntialiasSetting::Off) => Antialiasing::Off,
        Some(AntialiasSetting::Samples2) => Antialiasing::Samples(2),
        Some(AntialiasSetting::Samples4) => Antialiasing::Samples(4),
        Some(AntialiasSetting::Samples8) => Antialiasing::Samples(8),
        Some(AntialiasSetting::Samples16) => Antialiasing::Samples(16),
    }
}

pub fn map_color_space(setting: Option<ColorSpaceSetting>) -> ColorSpaceMode {
    match setting {
        None | Some(ColorSpaceSetting::Auto) => ColorSpaceMode::Auto,
        Some(ColorSpaceSetting::Gamma) => ColorSpaceMode::Gamma,
        Some(ColorSpaceSetting::Linear) => ColorSpaceMode::Linear,
    }
}

pub fn controls_from_config(config: &AppConfig) -> Result<ParamSet> {
    let mut controls = ParamSet::new();
    for (name, control) in &config.controls {
        let param = FloatParam::new(
            name.as_str(),
            control.default,
            control.min,
            control.max,
            control.step,
        )
        .with_context(|| format!("invalid control `{name}`"))?;
        controls.insert(param);
    }
    Ok(controls)
}

pub fn pass_order(names: &[String]) -> Result<Vec<EffectKind>> {
    names
        .iter()
        .map(|name| {
            name.parse::<EffectKind>()
                .with_context(|| format!("invalid entry `{name}` in post.order"))
        })
        .collect()
}

/// Translates the config file into renderer settings, then layers the
/// command-line chain options on top.
pub fn renderer_config(config: &AppConfig, chain: &ChainArgs) -> Result<RendererConfig> {
    let mut controls = controls_from_config(config)?;
    controls
        .apply_overrides(
            chain
                .overrides
                .iter()
                .map(|(name, value)| (name.as_str(), *value)),
        )
        .context("failed to apply --set overrides")?;

    let pass_order = match &chain.order {
        Some(order) => order.clone(),
        None => pass_order(&config.post.order)?,
    };

    Ok(RendererConfig {
        title: config.window.title.clone(),
        window_size: (config.window.width, config.window.height),
        images: config.images.paths.clone(),
        target_aspect: config.images.target_aspect,
        mesh_spacing: config.images.spacing,
        pass_order,
        rgb_shift_amount: config.post.rgb_shift_amount,
        controls,
        antialiasing: map_antialias(config.window.antialias),
        color_space: map_color_space(config.window.color_space),
        max_pixel_ratio: config.window.max_pixel_ratio,
        clear_color: config.window.clear_color,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_maps_to_two_pass_chain() {
        let config = AppConfig::default();
        let renderer = renderer_config(&config, &ChainArgs::default()).unwrap();
        assert_eq!(
            renderer.pass_order,
            vec![EffectKind::Distortion, EffectKind::RgbShift]
        );
        assert_eq!(renderer.controls.get("scale"), Some(2.0));
        assert_eq!(renderer.controls.get("progress"), Some(0.0));
        assert_eq!(renderer.antialiasing, Antialiasing::Auto);
        assert_eq!(renderer.images.len(), 3);
        assert_eq!(renderer.pass_chain().unwrap().len(), 3);
    }

    #[test]
    fn command_line_overrides_win() {
        let config = AppConfig::default();
        let chain = ChainArgs {
            order: Some(vec![EffectKind::RgbShift]),
            overrides: vec![("scale".to_string(), 4.0)],
        };
        let renderer = renderer_config(&config, &chain).unwrap();
        assert_eq!(renderer.pass_order, vec![EffectKind::RgbShift]);
        assert_eq!(renderer.controls.get("scale"), Some(4.0));
    }

    #[test]
    fn unknown_override_is_an_error() {
        let chain = ChainArgs {
            order: None,
            overrides: vec![("warp".to_string(), 1.0)],
        };
        assert!(renderer_config(&AppConfig::default(), &chain).is_err());
    }

    #[test]
    fn unknown_pass_name_is_an_error() {
        assert!(pass_order(&["bloom".to_string()]).is_err());
    }

    #[test]
    fn settings_map_onto_renderer_modes() {
        assert_eq!(
            map_antialias(Some(AntialiasSetting::Samples8)),
            Antialiasing::Samples(8)
        );
        assert_eq!(map_antialias(None), Antialiasing::Auto);
        assert_eq!(
            map_color_space(Some(ColorSpaceSetting::Gamma)),
            ColorSpaceMode::Gamma
        );
    }
}
