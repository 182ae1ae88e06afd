use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use fxconfig::AppConfig;
use renderer::{ChannelProgress, Renderer};
use timeline::{Playhead, Timeline};
use tracing_subscriber::EnvFilter;

use crate::bindings::renderer_config;
use crate::cli::{Cli, Command, ConfigAction, RunArgs};
use crate::paths::AppPaths;
use crate::still;

const TIMELINE_TICK: Duration = Duration::from_millis(16);

pub fn run(cli: Cli) -> Result<()> {
    initialise_tracing();

    let paths = AppPaths::discover()?;
    let config_path = cli.config.clone().unwrap_or_else(|| paths.config_file());
    tracing::debug!(
        config_dir = %paths.config_dir().display(),
        config = %config_path.display(),
        "resolved imagedistort paths"
    );

    match cli.command {
        Some(Command::Still(args)) => {
            let config = load_config(&config_path)?;
            still::run_still(&config, args)
        }
        Some(Command::Config(command)) => run_config(command.action, &paths, &config_path),
        None => {
            let config = load_config(&config_path)?;
            run_preview(config, cli.run)
        }
    }
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: &Path) -> Result<AppConfig> {
    let exists = path.exists();
    let config = AppConfig::load_or_default(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;
    if exists {
        tracing::debug!(path = %path.display(), "loaded configuration");
    } else {
        tracing::debug!(path = %path.display(), "no configuration file; using defaults");
    }
    Ok(config)
}

fn run_config(action: ConfigAction, paths: &AppPaths, config_path: &Path) -> Result<()> {
    match action {
        ConfigAction::Where => {
            let state = if config_path.exists() {
                "present"
            } else {
                "missing"
            };
            println!("config dir: {}", paths.config_dir().display());
            println!("config file: {} ({state})", config_path.display());
        }
        ConfigAction::Show => {
            let config = load_config(config_path)?;
            print!("{}", config.to_toml_string()?);
        }
    }
    Ok(())
}

fn run_preview(mut config: AppConfig, args: RunArgs) -> Result<()> {
    if !args.images.is_empty() {
        config.images.paths = args.images.clone();
    }
    if let Some((width, height)) = args.size {
        config.window.width = width;
        config.window.height = height;
    }

    let mut renderer_config = renderer_config(&config, &args.chain)?;
    if let Some(antialias) = args.antialias {
        renderer_config.antialiasing = antialias;
    }
    if let Some(color_space) = args.color_space {
        renderer_config.color_space = color_space;
    }

    for path in &renderer_config.images {
        if !path.is_file() {
            bail!("image not found: {}", path.display());
        }
    }

    tracing::info!(
        images = renderer_config.images.len(),
        width = renderer_config.window_size.0,
        height = renderer_config.window_size.1,
        "bootstrapping imagedistort preview"
    );

    let renderer = Renderer::new(renderer_config);
    let renderer = if config.timeline.enabled && !args.no_timeline {
        let timeline = Timeline::from_config(&config.timeline).context("invalid timeline")?;
        tracing::debug!(
            duration = ?timeline.duration(),
            repeat = ?config.timeline.repeat,
            "starting timeline"
        );
        let (sender, progress) = ChannelProgress::new(timeline.value_at(Duration::ZERO));
        let playhead = Playhead::start(timeline, Instant::now());
        thread::Builder::new()
            .name("timeline".into())
            .spawn(move || {
                while sender.publish(playhead.sample()) {
                    thread::sleep(TIMELINE_TICK);
                }
                tracing::debug!("preview closed; timeline stopped");
            })
            .context("failed to spawn timeline thread")?;
        renderer.with_progress_source(progress)
    } else {
        tracing::info!("timeline disabled; distortion progress held at zero");
        renderer
    };

    renderer.run()
}
