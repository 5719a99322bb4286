//! Screen-space ambient occlusion and its blur.

use wgpu::util::DeviceExt;

use super::targets::{RenderTargets, OCCLUSION_FORMAT};
use super::uniforms::{noise_texels, OcclusionUniform};
use super::{
    fullscreen_pass, fullscreen_pipeline, fullscreen_shader, texture_entry, uniform_entry,
    SharedLayouts,
};
use crate::config::AmbientOcclusionSettings;
use crate::render::ssao::SsaoTables;

#[derive(Debug)]
pub struct OcclusionPass {
    settings: AmbientOcclusionSettings,
    pipeline: wgpu::RenderPipeline,
    horizontal: wgpu::RenderPipeline,
    vertical: wgpu::RenderPipeline,
    input_layout: wgpu::BindGroupLayout,
    blur_layout: wgpu::BindGroupLayout,
    uniform: wgpu::Buffer,
    noise: wgpu::Texture,
    noise_view: wgpu::TextureView,
    input: wgpu::BindGroup,
    /// Occlusion -> scratch, then scratch -> occlusion.
    blur_groups: [wgpu::BindGroup; 2],
}

impl OcclusionPass {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layouts: &SharedLayouts,
        targets: &RenderTargets,
        settings: &AmbientOcclusionSettings,
    ) -> Self {
        let input_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("occlusion_input_layout"),
            entries: &[
                texture_entry(0, false),
                texture_entry(1, false),
                texture_entry(2, false),
                uniform_entry(3, wgpu::ShaderStages::FRAGMENT, false),
            ],
        });
        let blur_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("occlusion_blur_layout"),
            entries: &[texture_entry(0, true)],
        });

        let shader = fullscreen_shader(device, "occlusion_shader", include_str!("shaders/occlusion.wgsl"));
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("occlusion_pipeline_layout"),
            bind_group_layouts: &[&layouts.camera, &input_layout],
            push_constant_ranges: &[],
        });
        let pipeline = fullscreen_pipeline(
            device,
            "occlusion_pipeline",
            &layout,
            &shader,
            "fs_main",
            OCCLUSION_FORMAT,
        );

        let blur_shader = fullscreen_shader(device, "blur_shader", include_str!("shaders/blur.wgsl"));
        let blur_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("blur_pipeline_layout"),
            bind_group_layouts: &[&blur_layout],
            push_constant_ranges: &[],
        });
        let horizontal = fullscreen_pipeline(
            device,
            "blur_horizontal_pipeline",
            &blur_pipeline_layout,
            &blur_shader,
            "fs_horizontal",
            OCCLUSION_FORMAT,
        );
        let vertical = fullscreen_pipeline(
            device,
            "blur_vertical_pipeline",
            &blur_pipeline_layout,
            &blur_shader,
            "fs_vertical",
            OCCLUSION_FORMAT,
        );

        let tables = SsaoTables::generate(settings);
        let uniform = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("occlusion_uniform"),
            contents: bytemuck::bytes_of(&OcclusionUniform::new(&tables, settings)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let (noise, noise_view) = create_noise(device, queue, &tables);

        let input = create_input_group(device, &input_layout, targets, &noise_view, &uniform);
        let blur_groups = create_blur_groups(device, &blur_layout, targets);
        tracing::debug!(
            samples = tables.kernel.len(),
            noise_size = tables.noise_size,
            "ambient occlusion ready"
        );

        Self {
            settings: settings.clone(),
            pipeline,
            horizontal,
            vertical,
            input_layout,
            blur_layout,
            uniform,
            noise,
            noise_view,
            input,
            blur_groups,
        }
    }

    /// Regenerate the kernel and noise tile if `settings` changed.
    pub fn update_settings(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        targets: &RenderTargets,
        settings: &AmbientOcclusionSettings,
    ) {
        if *settings == self.settings {
            return;
        }
        let tables = SsaoTables::generate(settings);
        queue.write_buffer(
            &self.uniform,
            0,
            bytemuck::bytes_of(&OcclusionUniform::new(&tables, settings)),
        );
        if settings.noise_size != self.settings.noise_size || settings.seed != self.settings.seed {
            self.noise.destroy();
            let (noise, noise_view) = create_noise(device, queue, &tables);
            self.noise = noise;
            self.noise_view = noise_view;
            self.rebind(device, targets);
        } else {
            write_noise(queue, &self.noise, &tables);
        }
        tracing::debug!("ambient occlusion settings changed");
        self.settings = settings.clone();
    }

    /// Point the bind groups at freshly created targets.
    pub fn rebind(&mut self, device: &wgpu::Device, targets: &RenderTargets) {
        self.input = create_input_group(
            device,
            &self.input_layout,
            targets,
            &self.noise_view,
            &self.uniform,
        );
        self.blur_groups = create_blur_groups(device, &self.blur_layout, targets);
    }

    pub fn encode_occlusion(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        targets: &RenderTargets,
        camera: &wgpu::BindGroup,
    ) {
        let mut pass = fullscreen_pass(encoder, "occlusion_pass", &targets.occlusion.view);
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, camera, &[]);
        pass.set_bind_group(1, &self.input, &[]);
        pass.draw(0..3, 0..1);
    }

    /// Horizontal into the scratch target, vertical back into occlusion.
    pub fn encode_blur(&self, encoder: &mut wgpu::CommandEncoder, targets: &RenderTargets) {
        {
            let mut pass =
                fullscreen_pass(encoder, "blur_horizontal_pass", &targets.occlusion_scratch.view);
            pass.set_pipeline(&self.horizontal);
            pass.set_bind_group(0, &self.blur_groups[0], &[]);
            pass.draw(0..3, 0..1);
        }
        let mut pass = fullscreen_pass(encoder, "blur_vertical_pass", &targets.occlusion.view);
        pass.set_pipeline(&self.vertical);
        pass.set_bind_group(0, &self.blur_groups[1], &[]);
        pass.draw(0..3, 0..1);
    }
}

fn create_noise(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    tables: &SsaoTables,
) -> (wgpu::Texture, wgpu::TextureView) {
    let size = tables.noise_size.max(1);
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("occlusion_noise"),
        size: wgpu::Extent3d {
            width: size,
            height: size,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba32Float,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    write_noise(queue, &texture, tables);
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

fn write_noise(queue: &wgpu::Queue, texture: &wgpu::Texture, tables: &SsaoTables) {
    let size = tables.noise_size.max(1);
    let texels = noise_texels(tables);
    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        bytemuck::cast_slice(&texels),
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(size * 16),
            rows_per_image: Some(size),
        },
        wgpu::Extent3d {
            width: size,
            height: size,
            depth_or_array_layers: 1,
        },
    );
}

fn create_input_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    targets: &RenderTargets,
    noise: &wgpu::TextureView,
    uniform: &wgpu::Buffer,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("occlusion_input"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&targets.position.view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&targets.normal.view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(noise),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: uniform.as_entire_binding(),
            },
        ],
    })
}

fn create_blur_groups(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    targets: &RenderTargets,
) -> [wgpu::BindGroup; 2] {
    let group = |label, view| {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(view),
            }],
        })
    };
    [
        group("blur_horizontal_input", &targets.occlusion.view),
        group("blur_vertical_input", &targets.occlusion_scratch.view),
    ]
}
