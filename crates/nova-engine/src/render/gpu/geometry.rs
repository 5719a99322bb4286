//! G-buffer fill.

use super::buffers::DynamicUniforms;
use super::mesh_cache::{vertex_layout, GpuMesh};
use super::targets::{
    RenderTargets, ALBEDO_FORMAT, DEPTH_FORMAT, NORMAL_FORMAT, POSITION_FORMAT, SPECULAR_FORMAT,
};
use super::uniforms::ObjectUniform;
use super::SharedLayouts;

/// One indexed draw: the mesh and the dynamic offset of its object uniform.
#[derive(Debug, Clone, Copy)]
pub struct Draw<'a> {
    pub mesh: &'a GpuMesh,
    pub object_offset: u32,
    pub casts_shadow: bool,
    pub wireframe: bool,
}

/// Position `w` for pixels no geometry covers.
const BACKGROUND: wgpu::Color = wgpu::Color {
    r: 0.0,
    g: 0.0,
    b: 0.0,
    a: -1.0,
};

#[derive(Debug)]
pub struct GeometryPass {
    pipeline: wgpu::RenderPipeline,
    /// Line-mode variant, absent when the device lacks `POLYGON_MODE_LINE`.
    wireframe: Option<wgpu::RenderPipeline>,
}

impl GeometryPass {
    pub fn new(device: &wgpu::Device, layouts: &SharedLayouts) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("geometry_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/geometry.wgsl").into()),
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("geometry_pipeline_layout"),
            bind_group_layouts: &[&layouts.camera, &layouts.object],
            push_constant_ranges: &[],
        });
        let target = |format| {
            Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })
        };

        let build = |label: &str, polygon_mode: wgpu::PolygonMode, cull_mode: Option<wgpu::Face>| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &[vertex_layout()],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    targets: &[
                        target(POSITION_FORMAT),
                        target(NORMAL_FORMAT),
                        target(ALBEDO_FORMAT),
                        target(SPECULAR_FORMAT),
                    ],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode,
                    polygon_mode,
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
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };

        let pipeline = build("geometry_pipeline", wgpu::PolygonMode::Fill, Some(wgpu::Face::Back));
        let wireframe = if device.features().contains(wgpu::Features::POLYGON_MODE_LINE) {
            Some(build("geometry_wireframe_pipeline", wgpu::PolygonMode::Line, None))
        } else {
            tracing::warn!("device lacks line polygon mode, wireframe materials draw filled");
            None
        };
        Self { pipeline, wireframe }
    }

    pub fn encode(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        targets: &RenderTargets,
        camera: &wgpu::BindGroup,
        objects: &DynamicUniforms<ObjectUniform>,
        draws: &[Draw<'_>],
    ) {
        let clear = |view| {
            Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })
        };
        let mut position = clear(&targets.position.view);
        if let Some(attachment) = position.as_mut() {
            attachment.ops.load = wgpu::LoadOp::Clear(BACKGROUND);
        }

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("geometry_pass"),
            color_attachments: &[
                position,
                clear(&targets.normal.view),
                clear(&targets.albedo.view),
                clear(&targets.specular.view),
            ],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &targets.depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_bind_group(0, camera, &[]);
        let wire_pipeline = self.wireframe.as_ref().unwrap_or(&self.pipeline);
        for (pipeline, wireframe) in [(&self.pipeline, false), (wire_pipeline, true)] {
            pass.set_pipeline(pipeline);
            for draw in draws.iter().filter(|d| d.wireframe == wireframe) {
                pass.set_bind_group(1, objects.bind_group(), &[draw.object_offset]);
                draw.mesh.draw(&mut pass);
            }
        }
    }
}
