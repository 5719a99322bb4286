//! GPU uniform layouts and their packing from frame data.
//!
//! Every struct here is `#[repr(C)]`, built only from `f32` vectors and
//! matrices, and mirrors a WGSL struct in `shaders/`. Keeping the packing
//! pure lets it be tested without a device.

use bytemuck_derive::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use crate::camera::Camera;
use crate::config::{AmbientOcclusionSettings, GraphicsSettings, MAX_AO_SAMPLES, MAX_CASCADES};
use crate::render::frame::{FramePacket, RenderTarget, MAX_DIRECTIONAL_LIGHTS, MAX_POINT_LIGHTS};
use crate::render::ssao::SsaoTables;

/// Distance between consecutive dynamic-offset uniforms.
///
/// Matches the default `min_uniform_buffer_offset_alignment`.
pub const UNIFORM_STRIDE: u64 = 256;

type Mat4Cols = [[f32; 4]; 4];

// ---------------------------------------------------------------------------
// Camera
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct CameraUniform {
    pub view_projection: Mat4Cols,
    pub view: Mat4Cols,
    pub projection: Mat4Cols,
    /// xyz: eye position, w: near plane.
    pub position: [f32; 4],
    /// Target width, target height, far plane, unused.
    pub viewport: [f32; 4],
}

impl CameraUniform {
    pub fn new(camera: &Camera, width: u32, height: u32) -> Self {
        Self {
            view_projection: camera.view_projection().to_cols_array_2d(),
            view: camera.view().to_cols_array_2d(),
            projection: camera.projection().to_cols_array_2d(),
            position: camera.position.extend(camera.near).to_array(),
            viewport: [width as f32, height as f32, camera.far, 0.0],
        }
    }
}

// ---------------------------------------------------------------------------
// Object
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct ObjectUniform {
    pub model: Mat4Cols,
    /// Inverse transpose of `model`.
    pub normal_matrix: Mat4Cols,
    /// rgb albedo, a opacity.
    pub albedo: [f32; 4],
    /// rgb specular, a shininess / 256.
    pub specular: [f32; 4],
    /// x: entity id, y: 1.0 if unlit.
    pub params: [f32; 4],
}

impl ObjectUniform {
    pub fn new(target: &RenderTarget) -> Self {
        let material = &target.material;
        Self {
            model: target.transform.to_cols_array_2d(),
            normal_matrix: normal_matrix(target.transform).to_cols_array_2d(),
            albedo: material.albedo_rgba().to_array(),
            specular: material
                .specular
                .extend((material.shininess / 256.0).clamp(0.0, 1.0))
                .to_array(),
            params: [
                target.entity.to_raw() as f32,
                if material.unlit { 1.0 } else { 0.0 },
                0.0,
                0.0,
            ],
        }
    }
}

/// Normals go through the inverse transpose. A degenerate (zero-scale)
/// model keeps its own matrix.
pub fn normal_matrix(model: Mat4) -> Mat4 {
    if model.determinant().abs() <= f32::EPSILON {
        model
    } else {
        model.inverse().transpose()
    }
}

// ---------------------------------------------------------------------------
// Shadow
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct ShadowUniform {
    pub light_view_projection: Mat4Cols,
}

// ---------------------------------------------------------------------------
// Ambient occlusion
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct OcclusionUniform {
    pub samples: [[f32; 4]; MAX_AO_SAMPLES as usize],
    /// Radius, bias, power, sample count.
    pub params: [f32; 4],
    /// Noise tile size, unused.
    pub noise: [f32; 4],
}

impl OcclusionUniform {
    pub fn new(tables: &SsaoTables, settings: &AmbientOcclusionSettings) -> Self {
        let mut uniform: Self = bytemuck::Zeroable::zeroed();
        for (slot, sample) in uniform.samples.iter_mut().zip(&tables.kernel) {
            *slot = sample.extend(0.0).to_array();
        }
        let count = tables.kernel.len().min(MAX_AO_SAMPLES as usize);
        uniform.params = [settings.radius, settings.bias, settings.power, count as f32];
        uniform.noise = [tables.noise_size as f32, 0.0, 0.0, 0.0];
        uniform
    }
}

/// Noise tile as `Rgba32Float` texels.
pub fn noise_texels(tables: &SsaoTables) -> Vec<[f32; 4]> {
    tables.noise.iter().map(|v| v.extend(0.0).to_array()).collect()
}

// ---------------------------------------------------------------------------
// Lighting
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Pod, Zeroable)]
pub struct DirectionalLightGpu {
    /// xyz: direction toward the light.
    pub direction: [f32; 4],
    pub radiance: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Pod, Zeroable)]
pub struct PointLightGpu {
    /// xyz: position, w: radius.
    pub position: [f32; 4],
    pub radiance: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct LightingUniform {
    pub cascades: [Mat4Cols; MAX_CASCADES],
    /// View-space far bound of each cascade.
    pub cascade_far: [f32; 4],
    pub directional: [DirectionalLightGpu; MAX_DIRECTIONAL_LIGHTS],
    pub points: [PointLightGpu; MAX_POINT_LIGHTS],
    /// Directional count, point count, cascade count, shadow light index
    /// (-1 without one).
    pub counts: [f32; 4],
    /// rgb background color, a ambient factor.
    pub ambient: [f32; 4],
    /// x: shadow map texel size in uv units.
    pub shadow: [f32; 4],
}

impl LightingUniform {
    pub fn new(packet: &FramePacket, graphics: &GraphicsSettings, shadow_resolution: u32) -> Self {
        let mut uniform: Self = bytemuck::Zeroable::zeroed();

        let cascades = packet.cascades.iter().take(MAX_CASCADES);
        for (i, cascade) in cascades.enumerate() {
            uniform.cascades[i] = cascade.view_projection.to_cols_array_2d();
            uniform.cascade_far[i] = cascade.far;
        }
        for (slot, light) in uniform.directional.iter_mut().zip(&packet.directional_lights) {
            *slot = DirectionalLightGpu {
                direction: light.direction.extend(0.0).to_array(),
                radiance: light.radiance.extend(1.0).to_array(),
            };
        }
        for (slot, light) in uniform.points.iter_mut().zip(&packet.point_lights) {
            *slot = PointLightGpu {
                position: light.position.extend(light.radius).to_array(),
                radiance: light.radiance.extend(1.0).to_array(),
            };
        }

        let shadow_light = match packet.shadow_light {
            Some(index) if !packet.cascades.is_empty() => index as f32,
            _ => -1.0,
        };
        uniform.counts = [
            packet.directional_lights.len().min(MAX_DIRECTIONAL_LIGHTS) as f32,
            packet.point_lights.len().min(MAX_POINT_LIGHTS) as f32,
            packet.cascades.len().min(MAX_CASCADES) as f32,
            shadow_light,
        ];
        uniform.ambient = Vec3::from_array(graphics.clear_color)
            .extend(graphics.ambient_light)
            .to_array();
        uniform.shadow = [1.0 / shadow_resolution.max(1) as f32, 0.0, 0.0, 0.0];
        uniform
    }
}

// ---------------------------------------------------------------------------
// Post
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct PostUniform {
    /// rgb fog color, a 1.0 when fog is enabled.
    pub fog_color: [f32; 4],
    /// Fog depth, fog power, exposure, unused.
    pub params: [f32; 4],
}

impl PostUniform {
    pub fn new(graphics: &GraphicsSettings) -> Self {
        let fog = &graphics.fog;
        Self {
            fog_color: Vec3::from_array(fog.color)
                .extend(if fog.enabled { 1.0 } else { 0.0 })
                .to_array(),
            params: [fog.depth, fog.power, graphics.exposure, 0.0],
        }
    }
}

// ---------------------------------------------------------------------------
// Strided packing
// ---------------------------------------------------------------------------

/// Lay `items` out at [`UNIFORM_STRIDE`] intervals for dynamic offsets.
pub fn pack_strided<T: bytemuck::Pod>(items: &[T]) -> Vec<u8> {
    let stride = UNIFORM_STRIDE as usize;
    let mut bytes = vec![0u8; items.len() * stride];
    for (chunk, item) in bytes.chunks_exact_mut(stride).zip(items) {
        let src = bytemuck::bytes_of(item);
        chunk[..src.len()].copy_from_slice(src);
    }
    bytes
}

/// Dynamic offset of the `index`th strided uniform.
pub fn dynamic_offset(index: usize) -> u32 {
    (index as u64 * UNIFORM_STRIDE) as u32
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Material;
    use crate::mesh::MeshLibrary;
    use crate::mesh::MeshData;
    use crate::render::cascade::CascadeCalculator;
    use crate::render::frame::{DirectionalLightView, PointLightView};
    use nova_ecs::entity::EntityId;
    use std::mem::size_of;

    fn target(entity: u32, material: Material) -> RenderTarget {
        let mut meshes = MeshLibrary::new();
        RenderTarget {
            entity: EntityId::from_raw(entity),
            mesh: meshes.add(MeshData::cube(1.0)),
            material,
            transform: Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0)),
        }
    }

    #[test]
    fn sizes_follow_wgsl_alignment() {
        for size in [
            size_of::<CameraUniform>(),
            size_of::<ObjectUniform>(),
            size_of::<ShadowUniform>(),
            size_of::<OcclusionUniform>(),
            size_of::<LightingUniform>(),
            size_of::<PostUniform>(),
        ] {
            assert_eq!(size % 16, 0, "size {size} is not a multiple of 16");
        }
        assert!(size_of::<ObjectUniform>() as u64 <= UNIFORM_STRIDE);
        assert!(size_of::<ShadowUniform>() as u64 <= UNIFORM_STRIDE);
        assert_eq!(size_of::<CameraUniform>(), 224);
        assert_eq!(size_of::<LightingUniform>(), 256 + 16 + 128 + 2048 + 48);
    }

    #[test]
    fn object_carries_entity_and_unlit_flag() {
        let lit = ObjectUniform::new(&target(42, Material::default()));
        assert_eq!(lit.params[0], 42.0);
        assert_eq!(lit.params[1], 0.0);
        let unlit = ObjectUniform::new(&target(7, Material::unlit(Vec3::ONE)));
        assert_eq!(unlit.params[1], 1.0);
    }

    #[test]
    fn shininess_is_packed_into_unit_range() {
        let material = Material {
            shininess: 64.0,
            ..Material::default()
        };
        let object = ObjectUniform::new(&target(0, material));
        assert_eq!(object.specular[3], 0.25);
    }

    #[test]
    fn normal_matrix_undoes_non_uniform_scale() {
        let model = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));
        let n = normal_matrix(model);
        let normal = n.transform_vector3(Vec3::new(1.0, 1.0, 0.0)).normalize();
        assert!(normal.abs_diff_eq(Vec3::new(0.5, 1.0, 0.0).normalize(), 1e-5));
        assert_eq!(normal_matrix(Mat4::ZERO), Mat4::ZERO);
    }

    #[test]
    fn lighting_counts_and_shadow_index() {
        let light = DirectionalLightView {
            entity: EntityId::from_raw(1),
            direction: Vec3::Y,
            radiance: Vec3::ONE,
            cast_shadows: true,
        };
        let point = PointLightView {
            entity: EntityId::from_raw(2),
            position: Vec3::new(1.0, 2.0, 3.0),
            radiance: Vec3::splat(0.5),
            radius: 4.0,
        };
        let graphics = GraphicsSettings::default();
        let packet = FramePacket::assemble(
            Camera::default(),
            Vec::new(),
            vec![light],
            vec![point],
            &CascadeCalculator::default(),
            &graphics,
        )
        .unwrap();

        let uniform = LightingUniform::new(&packet, &graphics, 2048);
        assert_eq!(uniform.counts, [1.0, 1.0, 4.0, 0.0]);
        assert_eq!(uniform.points[0].position, [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(uniform.cascade_far[3], packet.cascades[3].far);
        assert_eq!(uniform.shadow[0], 1.0 / 2048.0);
    }

    #[test]
    fn no_shadow_light_is_negative() {
        let graphics = GraphicsSettings::default();
        let packet = FramePacket::assemble(
            Camera::default(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            &CascadeCalculator::default(),
            &graphics,
        )
        .unwrap();
        let uniform = LightingUniform::new(&packet, &graphics, 1024);
        assert_eq!(uniform.counts, [0.0, 0.0, 0.0, -1.0]);
    }

    #[test]
    fn occlusion_uniform_holds_kernel() {
        let settings = AmbientOcclusionSettings {
            samples: 16,
            ..AmbientOcclusionSettings::default()
        };
        let tables = SsaoTables::generate(&settings);
        let uniform = OcclusionUniform::new(&tables, &settings);
        assert_eq!(uniform.params[3], 16.0);
        assert_eq!(uniform.samples[0][..3], tables.kernel[0].to_array());
        assert_eq!(uniform.samples[16], [0.0; 4]);
        assert_eq!(noise_texels(&tables).len(), 16);
    }

    #[test]
    fn strided_packing_places_items_on_boundaries() {
        let items = [
            ShadowUniform {
                light_view_projection: Mat4::IDENTITY.to_cols_array_2d(),
            },
            ShadowUniform {
                light_view_projection: Mat4::from_scale(Vec3::splat(2.0)).to_cols_array_2d(),
            },
        ];
        let bytes = pack_strided(&items);
        assert_eq!(bytes.len(), 512);
        let second: &[f32] = bytemuck::cast_slice(&bytes[256..256 + 64]);
        assert_eq!(second[0], 2.0);
        assert_eq!(dynamic_offset(3), 768);
    }

    #[test]
    fn post_uniform_flags_fog() {
        let mut graphics = GraphicsSettings::default();
        graphics.fog.enabled = false;
        assert_eq!(PostUniform::new(&graphics).fog_color[3], 0.0);
    }
}
