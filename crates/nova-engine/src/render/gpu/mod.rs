//! wgpu implementation of the deferred pipeline.
//!
//! # Architecture
//!
//! [`DeferredRenderer`] owns every GPU resource and implements
//! [`FrameRenderer`](crate::render::frame::FrameRenderer). Each pass lives in
//! its own module and owns its pipeline and bind groups:
//!
//! | Pass | Module | Output |
//! |------|--------|--------|
//! | Geometry | [`geometry`] | G-buffer (position + entity id, normal + unlit flag, albedo, specular) |
//! | Shadow | [`shadow`] | layered depth map, one layer per cascade |
//! | Ambient occlusion | [`occlusion`] | R8 occlusion term, optionally box-blurred |
//! | Lighting | [`lighting`] | HDR color |
//! | Tone mapping, present | [`post`] | sRGB final color, then the surface |
//!
//! The renderer does not own the event loop. The render system calls it
//! once per frame with the [`FramePacket`](crate::render::frame::FramePacket).

use std::borrow::Cow;

pub mod buffers;
pub mod context;
pub mod geometry;
pub mod lighting;
pub mod mesh_cache;
pub mod occlusion;
pub mod picking;
pub mod post;
pub mod renderer;
pub mod shadow;
pub mod targets;
pub mod uniforms;

pub use context::GpuContext;
pub use renderer::DeferredRenderer;

/// Full-screen triangle vertex stage shared by the screen-space passes.
const FULLSCREEN_WGSL: &str = include_str!("shaders/fullscreen.wgsl");

// ---------------------------------------------------------------------------
// Shared bind group layouts
// ---------------------------------------------------------------------------

/// Layouts used by more than one pass.
#[derive(Debug)]
pub struct SharedLayouts {
    /// Group 0: the per-frame camera uniform.
    pub camera: wgpu::BindGroupLayout,
    /// Per-draw object uniform, addressed with a dynamic offset.
    pub object: wgpu::BindGroupLayout,
}

impl SharedLayouts {
    pub fn new(device: &wgpu::Device) -> Self {
        let camera = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("camera_bind_group_layout"),
            entries: &[uniform_entry(
                0,
                wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                false,
            )],
        });
        let object = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("object_bind_group_layout"),
            entries: &[uniform_entry(
                0,
                wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                true,
            )],
        });
        Self { camera, object }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub(crate) fn uniform_entry(
    binding: u32,
    visibility: wgpu::ShaderStages,
    dynamic: bool,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: dynamic,
            min_binding_size: None,
        },
        count: None,
    }
}

/// A 2D texture read with `textureLoad` from the fragment stage.
pub(crate) fn texture_entry(binding: u32, filterable: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

/// Compile a screen-space shader: the full-screen vertex stage followed by
/// `source`.
pub(crate) fn fullscreen_shader(
    device: &wgpu::Device,
    label: &str,
    source: &str,
) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(Cow::Owned(format!("{FULLSCREEN_WGSL}\n{source}"))),
    })
}

/// A pipeline drawing one full-screen triangle into a single color target.
pub(crate) fn fullscreen_pipeline(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    fragment_entry: &str,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_fullscreen"),
            buffers: &[],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some(fragment_entry),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

/// Begin a pass that overwrites a single color target.
pub(crate) fn fullscreen_pass<'e>(
    encoder: &'e mut wgpu::CommandEncoder,
    label: &str,
    target: &wgpu::TextureView,
) -> wgpu::RenderPass<'e> {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    })
}
