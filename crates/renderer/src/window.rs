use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::{debug, error, info, warn};
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::WindowBuilder;

use crate::frame::FrameDriver;
use crate::gpu::GpuState;
use crate::params::{PROGRESS, SCALE};
use crate::runtime::{BoxedProgressSource, SystemTimeSource};
use crate::scene::Scene;
use crate::types::{RendererConfig, Viewport};

/// What a key press asks the preview to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeyAction {
    Nudge { control: &'static str, steps: i32 },
    Exit,
}

pub(crate) fn key_action(key: &Key) -> Option<KeyAction> {
    let action = match key {
        Key::Named(NamedKey::ArrowUp) => KeyAction::Nudge {
            control: SCALE,
            steps: 10,
        },
        Key::Named(NamedKey::ArrowDown) => KeyAction::Nudge {
            control: SCALE,
            steps: -10,
        },
        Key::Named(NamedKey::ArrowRight) => KeyAction::Nudge {
            control: PROGRESS,
            steps: 1,
        },
        Key::Named(NamedKey::ArrowLeft) => KeyAction::Nudge {
            control: PROGRESS,
            steps: -1,
        },
        Key::Named(NamedKey::Escape) => KeyAction::Exit,
        _ => return None,
    };
    Some(action)
}

fn effective_viewport(
    size: PhysicalSize<u32>,
    scale_factor: f64,
    max_pixel_ratio: f32,
) -> Option<Viewport> {
    Viewport::effective(size.width, size.height, scale_factor, max_pixel_ratio as f64)
}

/// Opens the preview window and drives frames until it closes.
pub(crate) fn run_window(config: RendererConfig, progress: BoxedProgressSource) -> Result<()> {
    if config.images.is_empty() {
        anyhow::bail!("at least one image is required to build the scene");
    }

    let event_loop =
        EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let window = WindowBuilder::new()
        .with_title(config.title.clone())
        .with_inner_size(LogicalSize::new(config.window_size.0, config.window_size.1))
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create preview window: {err}"))?;
    let window = Arc::new(window);

    let physical_size = window.inner_size();
    let viewport = effective_viewport(physical_size, window.scale_factor(), config.max_pixel_ratio)
        .or_else(|| Viewport::new(config.window_size.0, config.window_size.1))
        .ok_or_else(|| anyhow!("window has no drawable area"))?;

    let gpu = GpuState::new(window.as_ref(), physical_size, viewport, &config)
        .map_err(|err| anyhow!("failed to initialise renderer: {err:#}"))?;
    let scene = Scene::new(
        config.images.len(),
        config.mesh_spacing,
        viewport,
        config.target_aspect,
    );
    let mut driver = FrameDriver::new(
        gpu,
        scene,
        viewport,
        config.target_aspect,
        Box::new(SystemTimeSource::new()),
        progress,
        config.controls.clone(),
    );
    info!(
        width = viewport.width,
        height = viewport.height,
        images = config.images.len(),
        "preview window ready"
    );

    let max_pixel_ratio = config.max_pixel_ratio;
    let mut result = Ok(());
    let run_result = event_loop.run(|event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                elwt.exit();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed {
                    return;
                }
                match key_action(&event.logical_key) {
                    Some(KeyAction::Exit) => elwt.exit(),
                    Some(KeyAction::Nudge { control, steps }) => {
                        match driver.controls_mut().nudge(control, steps) {
                            Ok(value) => debug!(control, value, "nudged control"),
                            Err(err) => warn!(%err, "failed to nudge control"),
                        }
                    }
                    None => {}
                }
            }
            WindowEvent::Resized(new_size) => {
                driver.compositor_mut().resize_surface(new_size);
                if let Some(viewport) =
                    effective_viewport(new_size, window.scale_factor(), max_pixel_ratio)
                {
                    driver.queue_resize(viewport.width, viewport.height);
                }
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                let size = window.inner_size();
                if let Some(viewport) = effective_viewport(size, scale_factor, max_pixel_ratio) {
                    driver.queue_resize(viewport.width, viewport.height);
                }
            }
            WindowEvent::RedrawRequested => {
                if let Err(err) = driver.tick() {
                    match err.downcast_ref::<wgpu::SurfaceError>() {
                        Some(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                            let size = driver.compositor().size();
                            driver.compositor_mut().resize_surface(size);
                        }
                        Some(wgpu::SurfaceError::OutOfMemory) => {
                            error!("surface out of memory; exiting preview");
                            result = Err(err);
                            elwt.exit();
                        }
                        Some(wgpu::SurfaceError::Timeout) => {
                            warn!("surface timeout; retrying next frame");
                        }
                        Some(other) => {
                            warn!(?other, "surface error; retrying next frame");
                        }
                        None => {
                            error!(error = %err, "failed to render frame");
                            result = Err(err);
                            elwt.exit();
                        }
                    }
                }
            }
            _ => {}
        },
        Event::AboutToWait => {
            window.request_redraw();
            elwt.set_control_flow(ControlFlow::Wait);
        }
        _ => {}
    });

    if let Err(err) = run_result {
        return Err(anyhow!("window event loop error: {err}"));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrows_map_to_control_nudges() {
        assert_eq!(
            key_action(&Key::Named(NamedKey::ArrowUp)),
            Some(KeyAction::Nudge {
                control: SCALE,
                steps: 10
            })
        );
        assert_eq!(
            key_action(&Key::Named(NamedKey::ArrowLeft)),
            Some(KeyAction::Nudge {
                control: PROGRESS,
                steps: -1
            })
        );
        assert_eq!(
            key_action(&Key::Named(NamedKey::Escape)),
            Some(KeyAction::Exit)
        );
        assert_eq!(key_action(&Key::Named(NamedKey::Space)), None);
    }

    #[test]
    fn effective_viewport_caps_ratio() {
        let viewport = effective_viewport(PhysicalSize::new(2400, 1200), 3.0, 2.0)
            .expect("viewport");
        assert_eq!((viewport.width, viewport.height), (1600, 800));
        assert!(effective_viewport(PhysicalSize::new(0, 1200), 1.0, 2.0).is_none());
    }
}
