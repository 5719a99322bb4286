//! Deferred lighting into the HDR target.

use super::targets::{RenderTargets, ShadowMap, HDR_FORMAT};
use super::uniforms::LightingUniform;
use super::{
    fullscreen_pass, fullscreen_pipeline, fullscreen_shader, texture_entry, uniform_entry,
    SharedLayouts,
};

#[derive(Debug)]
pub struct LightingPass {
    pipeline: wgpu::RenderPipeline,
    gbuffer_layout: wgpu::BindGroupLayout,
    shadow_layout: wgpu::BindGroupLayout,
    uniform: wgpu::Buffer,
    shadow_sampler: wgpu::Sampler,
    gbuffer: wgpu::BindGroup,
    shadow: wgpu::BindGroup,
}

impl LightingPass {
    pub fn new(
        device: &wgpu::Device,
        layouts: &SharedLayouts,
        targets: &RenderTargets,
        shadow_map: &ShadowMap,
    ) -> Self {
        let gbuffer_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lighting_gbuffer_layout"),
            entries: &[
                texture_entry(0, false),
                texture_entry(1, false),
                texture_entry(2, false),
                texture_entry(3, false),
                texture_entry(4, false),
            ],
        });
        let shadow_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lighting_shadow_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2Array,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
                uniform_entry(2, wgpu::ShaderStages::FRAGMENT, false),
            ],
        });

        let shader = fullscreen_shader(device, "lighting_shader", include_str!("shaders/lighting.wgsl"));
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("lighting_pipeline_layout"),
            bind_group_layouts: &[&layouts.camera, &gbuffer_layout, &shadow_layout],
            push_constant_ranges: &[],
        });
        let pipeline = fullscreen_pipeline(
            device,
            "lighting_pipeline",
            &layout,
            &shader,
            "fs_main",
            HDR_FORMAT,
        );

        let uniform = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("lighting_uniform"),
            size: std::mem::size_of::<LightingUniform>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let shadow_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("shadow_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });

        let gbuffer = create_gbuffer_group(device, &gbuffer_layout, targets);
        let shadow = create_shadow_group(device, &shadow_layout, shadow_map, &shadow_sampler, &uniform);
        Self {
            pipeline,
            gbuffer_layout,
            shadow_layout,
            uniform,
            shadow_sampler,
            gbuffer,
            shadow,
        }
    }

    pub fn rebind_targets(&mut self, device: &wgpu::Device, targets: &RenderTargets) {
        self.gbuffer = create_gbuffer_group(device, &self.gbuffer_layout, targets);
    }

    pub fn rebind_shadow_map(&mut self, device: &wgpu::Device, shadow_map: &ShadowMap) {
        self.shadow = create_shadow_group(
            device,
            &self.shadow_layout,
            shadow_map,
            &self.shadow_sampler,
            &self.uniform,
        );
    }

    pub fn prepare(&self, queue: &wgpu::Queue, uniform: &LightingUniform) {
        queue.write_buffer(&self.uniform, 0, bytemuck::bytes_of(uniform));
    }

    pub fn encode(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        targets: &RenderTargets,
        camera: &wgpu::BindGroup,
    ) {
        let mut pass = fullscreen_pass(encoder, "lighting_pass", &targets.hdr.view);
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, camera, &[]);
        pass.set_bind_group(1, &self.gbuffer, &[]);
        pass.set_bind_group(2, &self.shadow, &[]);
        pass.draw(0..3, 0..1);
    }
}

fn create_gbuffer_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    targets: &RenderTargets,
) -> wgpu::BindGroup {
    let views = [
        &targets.position.view,
        &targets.normal.view,
        &targets.albedo.view,
        &targets.specular.view,
        &targets.occlusion.view,
    ];
    let entries: Vec<wgpu::BindGroupEntry<'_>> = views
        .into_iter()
        .enumerate()
        .map(|(binding, view)| wgpu::BindGroupEntry {
            binding: binding as u32,
            resource: wgpu::BindingResource::TextureView(view),
        })
        .collect();
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("lighting_gbuffer"),
        layout,
        entries: &entries,
    })
}

fn create_shadow_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    shadow_map: &ShadowMap,
    sampler: &wgpu::Sampler,
    uniform: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("lighting_shadow"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&shadow_map.array_view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: uniform.as_entire_binding(),
            },
        ],
    })
}
