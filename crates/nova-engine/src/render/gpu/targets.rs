//! Size-dependent render targets and the cascade shadow map.

pub const POSITION_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;
pub const NORMAL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const ALBEDO_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub const SPECULAR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
pub const OCCLUSION_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Unorm;
pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
/// Stores apply the gamma curve, so shaders write linear color.
pub const FINAL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
pub const SHADOW_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// A texture and its default view.
#[derive(Debug)]
pub struct Target {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl Target {
    pub fn new(
        device: &wgpu::Device,
        label: &str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Self {
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
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

// ---------------------------------------------------------------------------
// RenderTargets
// ---------------------------------------------------------------------------

/// Every screen-sized target of the pipeline.
#[derive(Debug)]
pub struct RenderTargets {
    width: u32,
    height: u32,
    /// World position, entity id in `w` (-1 for background).
    pub position: Target,
    /// World normal, unlit flag in `w`.
    pub normal: Target,
    pub albedo: Target,
    /// Specular color, shininess / 256 in `a`.
    pub specular: Target,
    pub depth: Target,
    pub occlusion: Target,
    /// Intermediate for the separable blur.
    pub occlusion_scratch: Target,
    pub hdr: Target,
    pub final_color: Target,
}

impl RenderTargets {
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let sampled =
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
        let target =
            |label: &str, format, usage| Target::new(device, label, width, height, format, usage);

        Self {
            width,
            height,
            position: target(
                "gbuffer_position",
                POSITION_FORMAT,
                sampled | wgpu::TextureUsages::COPY_SRC,
            ),
            normal: target("gbuffer_normal", NORMAL_FORMAT, sampled),
            albedo: target("gbuffer_albedo", ALBEDO_FORMAT, sampled),
            specular: target("gbuffer_specular", SPECULAR_FORMAT, sampled),
            depth: target(
                "gbuffer_depth",
                DEPTH_FORMAT,
                wgpu::TextureUsages::RENDER_ATTACHMENT,
            ),
            occlusion: target("occlusion", OCCLUSION_FORMAT, sampled),
            occlusion_scratch: target("occlusion_scratch", OCCLUSION_FORMAT, sampled),
            hdr: target("hdr_color", HDR_FORMAT, sampled),
            final_color: target(
                "final_color",
                FINAL_FORMAT,
                sampled | wgpu::TextureUsages::COPY_SRC,
            ),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Release the GPU memory now instead of when the handles drop.
    pub fn destroy(&self) {
        for target in [
            &self.position,
            &self.normal,
            &self.albedo,
            &self.specular,
            &self.depth,
            &self.occlusion,
            &self.occlusion_scratch,
            &self.hdr,
            &self.final_color,
        ] {
            target.texture.destroy();
        }
    }
}

// ---------------------------------------------------------------------------
// ShadowMap
// ---------------------------------------------------------------------------

/// Layered depth texture, one square layer per cascade.
#[derive(Debug)]
pub struct ShadowMap {
    pub texture: wgpu::Texture,
    /// All layers, for sampling.
    pub array_view: wgpu::TextureView,
    /// One view per layer, for rendering.
    pub layer_views: Vec<wgpu::TextureView>,
    pub resolution: u32,
}

impl ShadowMap {
    pub fn new(device: &wgpu::Device, resolution: u32, layers: u32) -> Self {
        let resolution = resolution.max(1);
        let layers = layers.max(1);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("shadow_map"),
            size: wgpu::Extent3d {
                width: resolution,
                height: resolution,
                depth_or_array_layers: layers,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: SHADOW_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let array_view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("shadow_map_array"),
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            array_layer_count: Some(layers),
            ..Default::default()
        });
        let layer_views = (0..layers)
            .map(|layer| {
                texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some("shadow_map_layer"),
                    dimension: Some(wgpu::TextureViewDimension::D2),
                    base_array_layer: layer,
                    array_layer_count: Some(1),
                    ..Default::default()
                })
            })
            .collect();
        tracing::debug!(resolution, layers, "created shadow map");
        Self {
            texture,
            array_view,
            layer_views,
            resolution,
        }
    }

    pub fn layers(&self) -> usize {
        self.layer_views.len()
    }
}
