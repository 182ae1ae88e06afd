use anyhow::{anyhow, Context, Result};

use crate::chain::{PassChain, Stage, StageOutput};
use crate::compile::{compile_wgsl, effect_module_source};
use crate::effects::EffectKind;
use crate::targets::PingPong;
use crate::types::PipelineError;

use super::targets::{RenderTarget, INTERMEDIATE_FORMAT};
use super::textures::{clamp_sampler, sampled_uniform_bind_group, sampled_uniform_layout};

/// GPU resources of one effect stage in the chain.
struct EffectStage {
    index: usize,
    kind: EffectKind,
    pipeline: wgpu::RenderPipeline,
    uniforms: wgpu::Buffer,
    bind_group: Option<wgpu::BindGroup>,
}

/// Every post pass after the scene; bind groups point at the ping-pong
/// buffers and are rebuilt whenever those are reallocated.
pub(crate) struct PostPipeline {
    layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    stages: Vec<EffectStage>,
}

impl PostPipeline {
    pub fn new(
        device: &wgpu::Device,
        chain: &PassChain,
        surface_format: wgpu::TextureFormat,
    ) -> Result<Self, PipelineError> {
        let layout = sampled_uniform_layout(device, "post pass layout");
        let sampler = clamp_sampler(device, "post pass sampler");
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("post pipeline layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let mut stages = Vec::new();
        for (index, stage) in chain.stages().iter().enumerate() {
            let Stage::Effect(pass) = stage else {
                continue;
            };
            let kind = pass.kind();
            let params = pass.prepare().map_err(|source| PipelineError::Uniform {
                pass: kind.name().to_string(),
                source,
            })?;
            let label = format!("{kind} pass #{index}");
            let module = compile_wgsl(device, &label, &effect_module_source(kind))?;
            let format = match chain.output(index) {
                StageOutput::Display => surface_format,
                StageOutput::Intermediate(_) => INTERMEDIATE_FORMAT,
            };
            let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(&label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: Some("vs_fullscreen"),
                    buffers: &[],
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
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                multiview: None,
                cache: None,
            });
            let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&format!("{label} uniforms")),
                size: params.as_bytes().len() as wgpu::BufferAddress,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            stages.push(EffectStage {
                index,
                kind,
                pipeline,
                uniforms,
                bind_group: None,
            });
        }

        tracing::debug!(passes = stages.len(), "built post pipeline");
        Ok(Self {
            layout,
            sampler,
            stages,
        })
    }

    /// Points every stage at its input buffer.
    pub fn rebind(
        &mut self,
        device: &wgpu::Device,
        chain: &PassChain,
        targets: &PingPong<RenderTarget>,
    ) {
        for stage in &mut self.stages {
            stage.bind_group = chain
                .input(stage.index)
                .and_then(|read| targets.get(read))
                .map(|input| {
                    sampled_uniform_bind_group(
                        device,
                        &format!("{} pass #{} bind group", stage.kind, stage.index),
                        &self.layout,
                        &input.view,
                        &self.sampler,
                        &stage.uniforms,
                    )
                });
        }
    }

    /// Uploads the current uniforms and records every post pass in order.
    pub fn encode(
        &self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        chain: &PassChain,
        targets: &PingPong<RenderTarget>,
        display: &wgpu::TextureView,
    ) -> Result<()> {
        for stage in &self.stages {
            let Some(Stage::Effect(pass)) = chain.stages().get(stage.index) else {
                return Err(anyhow!("chain no longer has an effect at {}", stage.index));
            };
            let params = pass
                .prepare()
                .with_context(|| format!("failed to prepare {} uniforms", stage.kind))?;
            queue.write_buffer(&stage.uniforms, 0, params.as_bytes());

            let bind_group = stage
                .bind_group
                .as_ref()
                .ok_or_else(|| anyhow!("{} pass #{} has no input bound", stage.kind, stage.index))?;
            let view = match chain.output(stage.index) {
                StageOutput::Display => display,
                StageOutput::Intermediate(write) => {
                    &targets
                        .get(write)
                        .ok_or_else(|| anyhow!("intermediate buffer {write} missing"))?
                        .view
                }
            };

            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("post pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            render_pass.set_pipeline(&stage.pipeline);
            render_pass.set_bind_group(0, bind_group, &[]);
            render_pass.draw(0..3, 0..1);
        }
        Ok(())
    }
}
