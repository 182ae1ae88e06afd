use std::path::PathBuf;

use anyhow::{Context, Result};
use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::compile::{compile_wgsl, SCENE_WGSL};
use crate::scene::{plane_geometry, PlaneVertex, Scene};

use super::context::SurfaceColorSpace;
use super::targets::{SceneAttachments, DEPTH_FORMAT};
use super::textures::{
    clamp_sampler, load_image_texture, sampled_uniform_bind_group, sampled_uniform_layout,
    ImageTexture,
};

/// `MaterialUniforms` in the scene shader.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct MaterialBlock {
    model: [[f32; 4]; 4],
    view_proj: [[f32; 4]; 4],
    resolution: [f32; 4],
    time: f32,
    progress: f32,
    padding: [f32; 2],
}

struct MeshBinding {
    uniforms: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    _image: ImageTexture,
}

/// One shared pipeline and plane; one uniform buffer + bind group per mesh.
pub(crate) struct ScenePass {
    pipeline: wgpu::RenderPipeline,
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
    meshes: Vec<MeshBinding>,
    attachments: Option<SceneAttachments>,
    color_format: wgpu::TextureFormat,
    sample_count: u32,
    clear_color: wgpu::Color,
}

impl ScenePass {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        images: &[PathBuf],
        color_format: wgpu::TextureFormat,
        sample_count: u32,
        color_space: SurfaceColorSpace,
        clear_color: [f32; 4],
    ) -> Result<Self> {
        let module = compile_wgsl(device, "scene shader", SCENE_WGSL)?;
        let layout = sampled_uniform_layout(device, "scene material layout");
        let sampler = clamp_sampler(device, "scene sampler");

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("scene pipeline layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("scene pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<PlaneVertex>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2],
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: sample_count,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        });

        let (plane_vertices, plane_indices) = plane_geometry();
        let vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("plane vertices"),
            contents: bytemuck::cast_slice(&plane_vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("plane indices"),
            contents: bytemuck::cast_slice(&plane_indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let meshes = images
            .iter()
            .enumerate()
            .map(|(index, path)| {
                let image = load_image_texture(device, queue, index, path, color_space)?;
                let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(&format!("material uniforms #{index}")),
                    size: std::mem::size_of::<MaterialBlock>() as wgpu::BufferAddress,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                let bind_group = sampled_uniform_bind_group(
                    device,
                    &format!("material bind group #{index}"),
                    &layout,
                    &image.view,
                    &sampler,
                    &uniforms,
                );
                Ok(MeshBinding {
                    uniforms,
                    bind_group,
                    _image: image,
                })
            })
            .collect::<Result<Vec<_>>>()
            .context("failed to load scene images")?;

        let [r, g, b, a] = clear_color.map(f64::from);
        Ok(Self {
            pipeline,
            vertices,
            indices,
            index_count: plane_indices.len() as u32,
            meshes,
            attachments: None,
            color_format,
            sample_count,
            clear_color: wgpu::Color { r, g, b, a },
        })
    }

    /// Writes per-mesh uniforms and records the scene pass into `target`.
    pub fn encode(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        scene: &Scene,
        target: &wgpu::TextureView,
        target_size: (u32, u32),
    ) {
        let stale = self
            .attachments
            .as_ref()
            .map_or(true, |attachments| attachments.size != target_size);
        if stale {
            tracing::debug!(
                width = target_size.0,
                height = target_size.1,
                sample_count = self.sample_count,
                "allocating scene attachments"
            );
            self.attachments = Some(SceneAttachments::new(
                device,
                target_size,
                self.color_format,
                self.sample_count,
            ));
        }
        let Some(attachments) = self.attachments.as_ref() else {
            return;
        };

        let view_proj = scene.camera.view_projection().to_cols_array_2d();
        let resolution = scene.resolution.as_vec4();
        for (binding, mesh) in self.meshes.iter().zip(&scene.meshes) {
            let block = MaterialBlock {
                model: mesh.model().to_cols_array_2d(),
                view_proj,
                resolution,
                time: scene.time,
                progress: scene.progress,
                padding: [0.0; 2],
            };
            queue.write_buffer(&binding.uniforms, 0, bytemuck::bytes_of(&block));
        }

        let (view, resolve_target) = match attachments.msaa.as_ref() {
            Some(msaa) => (msaa, Some(target)),
            None => (target, None),
        };
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("scene pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                depth_slice: None,
                resolve_target,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.clear_color),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &attachments.depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Discard,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_vertex_buffer(0, self.vertices.slice(..));
        render_pass.set_index_buffer(self.indices.slice(..), wgpu::IndexFormat::Uint16);
        for binding in self.meshes.iter().take(scene.meshes.len()) {
            render_pass.set_bind_group(0, &binding.bind_group, &[]);
            render_pass.draw_indexed(0..self.index_count, 0, 0..1);
        }
    }
}
