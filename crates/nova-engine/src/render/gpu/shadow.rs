//! Cascade shadow map rendering.

use super::buffers::DynamicUniforms;
use super::geometry::Draw;
use super::mesh_cache::vertex_layout;
use super::targets::{ShadowMap, SHADOW_FORMAT};
use super::uniforms::{dynamic_offset, ShadowUniform};
use super::{uniform_entry, SharedLayouts};
use crate::config::{ShadowSettings, MAX_CASCADES};
use crate::render::cascade::Cascade;

#[derive(Debug)]
pub struct ShadowPass {
    pipeline: wgpu::RenderPipeline,
    cascade_layout: wgpu::BindGroupLayout,
    cascades: DynamicUniforms<ShadowUniform>,
}

impl ShadowPass {
    pub fn new(device: &wgpu::Device, layouts: &SharedLayouts, settings: &ShadowSettings) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("shadow_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/shadow.wgsl").into()),
        });
        let cascade_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("shadow_cascade_layout"),
            entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX, true)],
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("shadow_pipeline_layout"),
            bind_group_layouts: &[&cascade_layout, &layouts.object],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("shadow_pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[vertex_layout()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: None,
            primitive: wgpu::PrimitiveState {
                cull_mode: None,
                ..wgpu::PrimitiveState::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: SHADOW_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState {
                    constant: settings.depth_bias,
                    slope_scale: settings.slope_bias,
                    clamp: 0.0,
                },
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let cascades =
            DynamicUniforms::new(device, &cascade_layout, "shadow_cascades", MAX_CASCADES);
        Self {
            pipeline,
            cascade_layout,
            cascades,
        }
    }

    /// Upload this frame's cascade matrices.
    pub fn prepare(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, cascades: &[Cascade]) {
        let uniforms: Vec<ShadowUniform> = cascades
            .iter()
            .map(|c| ShadowUniform {
                light_view_projection: c.view_projection.to_cols_array_2d(),
            })
            .collect();
        self.cascades
            .write(device, queue, &self.cascade_layout, &uniforms);
    }

    /// Render shadow casters into one layer per cascade.
    pub fn encode(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        shadow_map: &ShadowMap,
        objects: &wgpu::BindGroup,
        cascade_count: usize,
        draws: &[Draw<'_>],
    ) {
        for (layer, view) in shadow_map.layer_views.iter().enumerate().take(cascade_count) {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("shadow_pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, self.cascades.bind_group(), &[dynamic_offset(layer)]);
            for draw in draws.iter().filter(|d| d.casts_shadow) {
                pass.set_bind_group(1, objects, &[draw.object_offset]);
                draw.mesh.draw(&mut pass);
            }
        }
    }
}
