use crate::types::{PipelineError, Viewport};

/// Format of the ping-pong buffers between passes.
pub(crate) const INTERMEDIATE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

pub(crate) struct RenderTarget {
    pub _texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub viewport: Viewport,
}

/// Creates one intermediate color target, reporting limit violations and
/// device memory exhaustion as `BufferAllocation`.
pub(crate) fn allocate_target(
    device: &wgpu::Device,
    max_dimension: u32,
    label: &str,
    viewport: Viewport,
) -> Result<RenderTarget, PipelineError> {
    let Viewport { width, height } = viewport;
    if width > max_dimension || height > max_dimension {
        return Err(PipelineError::BufferAllocation {
            label: label.to_string(),
            width,
            height,
            reason: format!("exceeds device texture limit of {max_dimension}"),
        });
    }

    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: INTERMEDIATE_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let validation = pollster::block_on(device.pop_error_scope());
    let out_of_memory = pollster::block_on(device.pop_error_scope());
    if let Some(err) = out_of_memory.or(validation) {
        return Err(PipelineError::BufferAllocation {
            label: label.to_string(),
            width,
            height,
            reason: err.to_string(),
        });
    }

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    Ok(RenderTarget {
        _texture: texture,
        view,
        viewport,
    })
}

/// Depth buffer (and optional multisampled color buffer) for the scene pass.
pub(crate) struct SceneAttachments {
    pub depth: wgpu::TextureView,
    pub msaa: Option<wgpu::TextureView>,
    pub size: (u32, u32),
}

pub(crate) const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

impl SceneAttachments {
    pub fn new(
        device: &wgpu::Device,
        size: (u32, u32),
        color_format: wgpu::TextureFormat,
        sample_count: u32,
    ) -> Self {
        let extent = wgpu::Extent3d {
            width: size.0.max(1),
            height: size.1.max(1),
            depth_or_array_layers: 1,
        };
        let depth = device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some("scene depth"),
                size: extent,
                mip_level_count: 1,
                sample_count,
                dimension: wgpu::TextureDimension::D2,
                format: DEPTH_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            })
            .create_view(&wgpu::TextureViewDescriptor::default());
        let msaa = (sample_count > 1).then(|| {
            device
                .create_texture(&wgpu::TextureDescriptor {
                    label: Some("scene msaa color"),
                    size: extent,
                    mip_level_count: 1,
                    sample_count,
                    dimension: wgpu::TextureDimension::D2,
                    format: color_format,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    view_formats: &[],
                })
                .create_view(&wgpu::TextureViewDescriptor::default())
        });
        Self { depth, msaa, size }
    }
}
