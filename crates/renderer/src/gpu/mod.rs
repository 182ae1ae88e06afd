//! GPU side of the pass chain.
//!
//! - `context` owns the wgpu instance/device/surface wiring and rebuilds the
//!   swapchain when the window resizes.
//! - `targets` allocates the ping-pong intermediates and the scene's depth
//!   and MSAA attachments.
//! - `textures` uploads the plane images and shares the texture + sampler +
//!   uniform bind group layout every pass uses.
//! - `scene` draws one plane per image with a shared pipeline and per-mesh
//!   uniform buffers.
//! - `post` compiles one pipeline per effect stage and records them in order.
//! - `state` glues everything together behind the `Compositor` trait.

mod context;
mod post;
mod scene;
mod state;
mod targets;
mod textures;

pub(crate) use state::GpuState;
