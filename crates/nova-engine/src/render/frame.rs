//! Per-frame render data.
//!
//! The render system turns ECS state into a [`FramePacket`]: the culled
//! draw list, light views, the camera, fitted shadow cascades and the
//! ordered pass plan. A [`FrameRenderer`] consumes the packet. Building the
//! packet needs no GPU.

use glam::{Mat4, Vec3};
use nova_ecs::prelude::*;

use crate::camera::Camera;
use crate::components::{DirectionalLight, Material, Model, PointLight};
use crate::config::GraphicsSettings;
use crate::mesh::{MeshHandle, MeshLibrary};
use crate::render::cascade::{Cascade, CascadeCalculator};
use crate::EngineError;

/// Directional lights the lighting pass can take.
pub const MAX_DIRECTIONAL_LIGHTS: usize = 4;

/// Point lights the lighting pass can take.
pub const MAX_POINT_LIGHTS: usize = 64;

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// One mesh to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTarget {
    pub entity: EntityId,
    pub mesh: MeshHandle,
    pub material: Material,
    /// World matrix.
    pub transform: Mat4,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLightView {
    pub entity: EntityId,
    /// Unit vector from the scene toward the light.
    pub direction: Vec3,
    /// Color premultiplied by intensity.
    pub radiance: Vec3,
    pub cast_shadows: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLightView {
    pub entity: EntityId,
    pub position: Vec3,
    pub radiance: Vec3,
    pub radius: f32,
}

// ---------------------------------------------------------------------------
// Pass plan
// ---------------------------------------------------------------------------

/// Stages of the deferred pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PassKind {
    Cull,
    Geometry,
    Shadow,
    AmbientOcclusion,
    AmbientOcclusionBlur,
    Lighting,
    ToneMapping,
    Present,
}

impl PassKind {
    pub fn name(self) -> &'static str {
        match self {
            PassKind::Cull => "cull",
            PassKind::Geometry => "geometry",
            PassKind::Shadow => "shadow",
            PassKind::AmbientOcclusion => "ambient_occlusion",
            PassKind::AmbientOcclusionBlur => "ambient_occlusion_blur",
            PassKind::Lighting => "lighting",
            PassKind::ToneMapping => "tone_mapping",
            PassKind::Present => "present",
        }
    }
}

/// Passes to run this frame. Shadow runs only with a shadow caster.
pub fn plan_frame(has_shadow_caster: bool, blur_occlusion: bool) -> Vec<PassKind> {
    let mut passes = vec![PassKind::Cull, PassKind::Geometry];
    if has_shadow_caster {
        passes.push(PassKind::Shadow);
    }
    passes.push(PassKind::AmbientOcclusion);
    if blur_occlusion {
        passes.push(PassKind::AmbientOcclusionBlur);
    }
    passes.extend([PassKind::Lighting, PassKind::ToneMapping, PassKind::Present]);
    passes
}

// ---------------------------------------------------------------------------
// Gathering
// ---------------------------------------------------------------------------

/// Draw list for every entity with a model. No spatial culling.
pub fn cull<I>(world: &World, entities: I) -> Result<Vec<RenderTarget>, EcsError>
where
    I: IntoIterator<Item = EntityId>,
{
    let mut targets = Vec::new();
    for entity in entities {
        let model = world.get_component::<Model>(entity)?;
        let transform = world.global_transform(entity)? * model.mesh_transform;
        targets.extend(model.meshes.iter().map(|&mesh| RenderTarget {
            entity,
            mesh,
            material: model.material.clone(),
            transform,
        }));
    }
    Ok(targets)
}

/// Directional lights aim along their entity's world up axis.
pub fn collect_directional_lights<I>(
    world: &World,
    entities: I,
) -> Result<Vec<DirectionalLightView>, EcsError>
where
    I: IntoIterator<Item = EntityId>,
{
    entities
        .into_iter()
        .map(|entity| {
            let light = world.get_component::<DirectionalLight>(entity)?;
            let global = world.global_transform(entity)?;
            Ok(DirectionalLightView {
                entity,
                direction: global.transform_vector3(Vec3::Y).normalize_or(Vec3::Y),
                radiance: light.color * light.intensity,
                cast_shadows: light.cast_shadows,
            })
        })
        .collect()
}

pub fn collect_point_lights<I>(world: &World, entities: I) -> Result<Vec<PointLightView>, EcsError>
where
    I: IntoIterator<Item = EntityId>,
{
    entities
        .into_iter()
        .map(|entity| {
            let light = world.get_component::<PointLight>(entity)?;
            let global = world.global_transform(entity)?;
            Ok(PointLightView {
                entity,
                position: global.w_axis.truncate(),
                radiance: light.color * light.intensity,
                radius: light.radius,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// FramePacket
// ---------------------------------------------------------------------------

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FramePacket {
    pub camera: Camera,
    pub targets: Vec<RenderTarget>,
    pub directional_lights: Vec<DirectionalLightView>,
    pub point_lights: Vec<PointLightView>,
    /// Index into `directional_lights` of the light the cascades follow.
    pub shadow_light: Option<usize>,
    pub cascades: Vec<Cascade>,
    pub passes: Vec<PassKind>,
}

impl FramePacket {
    /// Combine gathered views, fit cascades for the first shadow-casting
    /// directional light and plan the passes.
    pub fn assemble(
        camera: Camera,
        targets: Vec<RenderTarget>,
        mut directional_lights: Vec<DirectionalLightView>,
        mut point_lights: Vec<PointLightView>,
        cascades: &CascadeCalculator,
        graphics: &GraphicsSettings,
    ) -> Result<Self, EngineError> {
        if directional_lights.len() > MAX_DIRECTIONAL_LIGHTS {
            tracing::warn!(
                count = directional_lights.len(),
                max = MAX_DIRECTIONAL_LIGHTS,
                "too many directional lights, extra lights ignored"
            );
            directional_lights.truncate(MAX_DIRECTIONAL_LIGHTS);
        }
        if point_lights.len() > MAX_POINT_LIGHTS {
            tracing::warn!(
                count = point_lights.len(),
                max = MAX_POINT_LIGHTS,
                "too many point lights, extra lights ignored"
            );
            point_lights.truncate(MAX_POINT_LIGHTS);
        }

        let shadow_light = directional_lights.iter().position(|l| l.cast_shadows);
        let fitted = match shadow_light {
            Some(index) => cascades.compute(&camera, directional_lights[index].direction)?,
            None => Vec::new(),
        };

        Ok(Self {
            camera,
            targets,
            directional_lights,
            point_lights,
            shadow_light,
            cascades: fitted,
            passes: plan_frame(shadow_light.is_some(), graphics.ambient_occlusion.blur),
        })
    }

    pub fn runs(&self, pass: PassKind) -> bool {
        self.passes.contains(&pass)
    }

    /// Targets drawn into the shadow map.
    pub fn shadow_casters(&self) -> impl Iterator<Item = &RenderTarget> {
        self.targets.iter().filter(|t| t.material.casts_shadow())
    }
}

// ---------------------------------------------------------------------------
// FrameRenderer
// ---------------------------------------------------------------------------

/// Backend that draws a [`FramePacket`].
pub trait FrameRenderer {
    /// Run every pass in `packet.passes`, in order.
    fn render(
        &mut self,
        packet: &FramePacket,
        meshes: &MeshLibrary,
        graphics: &GraphicsSettings,
    ) -> Result<(), EngineError>;

    /// Recreate size-dependent targets.
    fn resize(&mut self, width: u32, height: u32) -> Result<(), EngineError>;

    /// Entity whose geometry covers pixel `(x, y)` in the last frame.
    fn read_entity_id(&mut self, x: u32, y: u32) -> Result<Option<EntityId>, EngineError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn light(entity: u32, cast_shadows: bool) -> DirectionalLightView {
        DirectionalLightView {
            entity: EntityId::from_raw(entity),
            direction: Vec3::Y,
            radiance: Vec3::ONE,
            cast_shadows,
        }
    }

    #[test]
    fn plan_orders_passes() {
        let full = plan_frame(true, true);
        let mut sorted = full.clone();
        sorted.sort();
        assert_eq!(full, sorted);
        assert_eq!(full.len(), 8);
        assert!(!plan_frame(false, true).contains(&PassKind::Shadow));
        assert!(!plan_frame(true, false).contains(&PassKind::AmbientOcclusionBlur));
    }

    #[test]
    fn shadow_follows_first_casting_light() {
        let packet = FramePacket::assemble(
            Camera::default(),
            Vec::new(),
            vec![light(1, false), light(2, true), light(3, true)],
            Vec::new(),
            &CascadeCalculator::default(),
            &GraphicsSettings::default(),
        )
        .unwrap();
        assert_eq!(packet.shadow_light, Some(1));
        assert_eq!(packet.cascades.len(), 4);
        assert!(packet.runs(PassKind::Shadow));
    }

    #[test]
    fn no_caster_means_no_cascades() {
        let packet = FramePacket::assemble(
            Camera::default(),
            Vec::new(),
            vec![light(1, false)],
            Vec::new(),
            &CascadeCalculator::default(),
            &GraphicsSettings::default(),
        )
        .unwrap();
        assert!(packet.cascades.is_empty());
        assert!(!packet.runs(PassKind::Shadow));
    }

    #[test]
    fn extra_lights_are_dropped() {
        let lights = (0..6).map(|i| light(i, false)).collect();
        let packet = FramePacket::assemble(
            Camera::default(),
            Vec::new(),
            lights,
            Vec::new(),
            &CascadeCalculator::default(),
            &GraphicsSettings::default(),
        )
        .unwrap();
        assert_eq!(packet.directional_lights.len(), MAX_DIRECTIONAL_LIGHTS);
    }
}
