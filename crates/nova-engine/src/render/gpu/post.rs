//! Tone mapping with fog, and the final blit to the window surface.

use super::targets::{RenderTargets, FINAL_FORMAT};
use super::uniforms::PostUniform;
use super::{
    fullscreen_pass, fullscreen_pipeline, fullscreen_shader, texture_entry, uniform_entry,
    SharedLayouts,
};

struct Blit {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    group: wgpu::BindGroup,
}

pub struct PostPass {
    tonemap: wgpu::RenderPipeline,
    tonemap_layout: wgpu::BindGroupLayout,
    uniform: wgpu::Buffer,
    tonemap_group: wgpu::BindGroup,
    /// Only with a surface to present to.
    blit: Option<Blit>,
}

impl PostPass {
    pub fn new(
        device: &wgpu::Device,
        layouts: &SharedLayouts,
        targets: &RenderTargets,
        surface_format: Option<wgpu::TextureFormat>,
    ) -> Self {
        let tonemap_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("tonemap_layout"),
            entries: &[
                texture_entry(0, false),
                texture_entry(1, false),
                uniform_entry(2, wgpu::ShaderStages::FRAGMENT, false),
            ],
        });
        let shader = fullscreen_shader(device, "tonemap_shader", include_str!("shaders/tonemap.wgsl"));
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("tonemap_pipeline_layout"),
            bind_group_layouts: &[&layouts.camera, &tonemap_layout],
            push_constant_ranges: &[],
        });
        let tonemap = fullscreen_pipeline(
            device,
            "tonemap_pipeline",
            &layout,
            &shader,
            "fs_main",
            FINAL_FORMAT,
        );
        let uniform = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("post_uniform"),
            size: std::mem::size_of::<PostUniform>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let tonemap_group = create_tonemap_group(device, &tonemap_layout, targets, &uniform);
        let blit = surface_format.map(|format| Blit::new(device, targets, format));

        Self {
            tonemap,
            tonemap_layout,
            uniform,
            tonemap_group,
            blit,
        }
    }

    pub fn rebind(&mut self, device: &wgpu::Device, targets: &RenderTargets) {
        self.tonemap_group =
            create_tonemap_group(device, &self.tonemap_layout, targets, &self.uniform);
        if let Some(blit) = self.blit.as_mut() {
            blit.group = Blit::create_group(device, &blit.layout, &blit.sampler, targets);
        }
    }

    pub fn prepare(&self, queue: &wgpu::Queue, uniform: &PostUniform) {
        queue.write_buffer(&self.uniform, 0, bytemuck::bytes_of(uniform));
    }

    pub fn encode_tonemap(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        targets: &RenderTargets,
        camera: &wgpu::BindGroup,
    ) {
        let mut pass = fullscreen_pass(encoder, "tonemap_pass", &targets.final_color.view);
        pass.set_pipeline(&self.tonemap);
        pass.set_bind_group(0, camera, &[]);
        pass.set_bind_group(1, &self.tonemap_group, &[]);
        pass.draw(0..3, 0..1);
    }

    /// Copy the final image onto `surface`. Does nothing without a surface
    /// pipeline.
    pub fn encode_present(&self, encoder: &mut wgpu::CommandEncoder, surface: &wgpu::TextureView) {
        let Some(blit) = self.blit.as_ref() else {
            return;
        };
        let mut pass = fullscreen_pass(encoder, "present_pass", surface);
        pass.set_pipeline(&blit.pipeline);
        pass.set_bind_group(0, &blit.group, &[]);
        pass.draw(0..3, 0..1);
    }
}

impl std::fmt::Debug for PostPass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostPass")
            .field("presents", &self.blit.is_some())
            .finish_non_exhaustive()
    }
}

impl Blit {
    fn new(device: &wgpu::Device, targets: &RenderTargets, format: wgpu::TextureFormat) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("blit_layout"),
            entries: &[
                texture_entry(0, true),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let shader = fullscreen_shader(device, "blit_shader", include_str!("shaders/blit.wgsl"));
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("blit_pipeline_layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline =
            fullscreen_pipeline(device, "blit_pipeline", &pipeline_layout, &shader, "fs_main", format);
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("blit_sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let group = Self::create_group(device, &layout, &sampler, targets);
        Self {
            pipeline,
            layout,
            sampler,
            group,
        }
    }

    fn create_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        targets: &RenderTargets,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("blit_input"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&targets.final_color.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        })
    }
}

fn create_tonemap_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    targets: &RenderTargets,
    uniform: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("tonemap_input"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&targets.hdr.view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&targets.position.view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: uniform.as_entire_binding(),
            },
        ],
    })
}
