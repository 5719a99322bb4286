//! Scene components understood by the built-in systems.
//!
//! Kind ids are fixed at compile time through [`ComponentKind`]; bit 0 is the
//! ECS-owned [`Transform`](nova_ecs::transform::Transform).

use glam::{Mat4, Vec3, Vec4};
use nova_ecs::component::{Component, ComponentTypeId};
use nova_ecs::world::World;
use serde::{Deserialize, Serialize};

use crate::mesh::MeshHandle;

// ---------------------------------------------------------------------------
// ComponentKind
// ---------------------------------------------------------------------------

/// Signature bit assigned to each engine component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ComponentKind {
    Transform = 0,
    Model = 1,
    PointLight = 2,
    DirectionalLight = 3,
    Camera = 4,
    FpsControl = 5,
    RigidBody = 6,
    DeathTimer = 7,
    DebugShape = 8,
}

impl ComponentKind {
    pub const fn id(self) -> ComponentTypeId {
        ComponentTypeId::new(self as u8)
    }
}

/// First kind id free for application components.
pub const FIRST_USER_KIND: u8 = ComponentKind::DebugShape as u8 + 1;

/// Register every engine component with its default prototype.
pub fn register_all(world: &mut World) -> Result<(), nova_ecs::EcsError> {
    world.register_component::<Model>()?;
    world.register_component::<PointLight>()?;
    world.register_component::<DirectionalLight>()?;
    world.register_component::<CameraComponent>()?;
    world.register_component::<FpsControl>()?;
    world.register_component::<RigidBody>()?;
    world.register_component::<DeathTimer>()?;
    world.register_component::<DebugShape>()?;
    tracing::debug!(count = 8, "registered engine components");
    Ok(())
}

// ---------------------------------------------------------------------------
// Model / Material
// ---------------------------------------------------------------------------

/// Blinn-Phong surface description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Material {
    pub albedo: Vec3,
    pub opacity: f32,
    pub specular: Vec3,
    pub shininess: f32,
    /// Skip lighting and shadow casting; the albedo is written as-is.
    pub unlit: bool,
    /// Draw triangle edges only. Wireframes cast no shadows.
    pub wireframe: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            albedo: Vec3::splat(0.8),
            opacity: 1.0,
            specular: Vec3::splat(0.5),
            shininess: 32.0,
            unlit: false,
            wireframe: false,
        }
    }
}

impl Material {
    pub fn colored(albedo: Vec3) -> Self {
        Self {
            albedo,
            ..Self::default()
        }
    }

    pub fn unlit(albedo: Vec3) -> Self {
        Self {
            albedo,
            unlit: true,
            ..Self::default()
        }
    }

    /// Unlit wireframe in a flat color, as used for debug overlays.
    pub fn wireframe(albedo: Vec3) -> Self {
        Self {
            wireframe: true,
            ..Self::unlit(albedo)
        }
    }

    pub fn casts_shadow(&self) -> bool {
        !self.unlit && !self.wireframe
    }

    /// Albedo and opacity packed as one vector.
    pub fn albedo_rgba(&self) -> Vec4 {
        self.albedo.extend(self.opacity)
    }
}

/// Renderable geometry: one or more meshes sharing a material.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub meshes: Vec<MeshHandle>,
    pub material: Material,
    /// Applied to mesh vertices before the entity's world matrix. May be
    /// projective; positions are divided by `w`.
    #[serde(default)]
    pub mesh_transform: Mat4,
}

impl Model {
    pub fn new(mesh: MeshHandle, material: Material) -> Self {
        Self {
            meshes: vec![mesh],
            material,
            mesh_transform: Mat4::IDENTITY,
        }
    }
}

impl Component for Model {
    const KIND: ComponentTypeId = ComponentKind::Model.id();
    const NAME: &'static str = "model";
}

// ---------------------------------------------------------------------------
// Lights
// ---------------------------------------------------------------------------

/// Omnidirectional light at the entity's world position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointLight {
    pub color: Vec3,
    /// Distance at which the contribution reaches zero.
    pub radius: f32,
    pub intensity: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            radius: 5.0,
            intensity: 1.0,
        }
    }
}

impl Component for PointLight {
    const KIND: ComponentTypeId = ComponentKind::PointLight.id();
    const NAME: &'static str = "point_light";
}

/// Infinitely distant light.
///
/// The light lies along the entity's world-space up axis, so the default
/// orientation is a light straight overhead. Rotate the transform to aim it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectionalLight {
    pub color: Vec3,
    pub intensity: f32,
    pub cast_shadows: bool,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            intensity: 1.0,
            cast_shadows: true,
        }
    }
}

impl Component for DirectionalLight {
    const KIND: ComponentTypeId = ComponentKind::DirectionalLight.id();
    const NAME: &'static str = "directional_light";
}

// ---------------------------------------------------------------------------
// Camera
// ---------------------------------------------------------------------------

/// Perspective camera looking along the entity's forward axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraComponent {
    /// Only the main camera is rendered.
    pub main: bool,
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraComponent {
    fn default() -> Self {
        Self {
            main: false,
            fov_y_degrees: 60.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

impl CameraComponent {
    pub fn main() -> Self {
        Self {
            main: true,
            ..Self::default()
        }
    }
}

impl Component for CameraComponent {
    const KIND: ComponentTypeId = ComponentKind::Camera.id();
    const NAME: &'static str = "camera";
}

// ---------------------------------------------------------------------------
// FpsControl
// ---------------------------------------------------------------------------

/// Keyboard and mouse fly controls with smoothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FpsControl {
    pub movement_speed: f32,
    pub rotation_speed: f32,
    /// Fraction of the remaining distance covered per frame.
    pub movement_smoothing: f32,
    /// Slerp factor toward the target orientation per frame.
    pub rotation_smoothing: f32,
    pub target_position: Vec3,
    pub target_yaw: f32,
    pub target_pitch: f32,
}

impl Default for FpsControl {
    fn default() -> Self {
        Self {
            movement_speed: 0.5,
            rotation_speed: 0.5,
            movement_smoothing: 0.2,
            rotation_smoothing: 0.25,
            target_position: Vec3::ZERO,
            target_yaw: 0.0,
            target_pitch: 0.0,
        }
    }
}

impl Component for FpsControl {
    const KIND: ComponentTypeId = ComponentKind::FpsControl.id();
    const NAME: &'static str = "fps_control";
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigidBody {
    pub velocity: Vec3,
    /// Quadratic drag coefficient.
    pub drag: f32,
    pub gravity: bool,
}

impl Default for RigidBody {
    fn default() -> Self {
        Self {
            velocity: Vec3::ZERO,
            drag: 0.01,
            gravity: true,
        }
    }
}

impl RigidBody {
    pub fn with_velocity(velocity: Vec3) -> Self {
        Self {
            velocity,
            ..Self::default()
        }
    }
}

impl Component for RigidBody {
    const KIND: ComponentTypeId = ComponentKind::RigidBody.id();
    const NAME: &'static str = "rigid_body";
}

/// Destroys the entity (and its subtree) once the countdown passes zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeathTimer {
    pub seconds_remaining: f32,
}

impl Default for DeathTimer {
    fn default() -> Self {
        Self {
            seconds_remaining: 10.0,
        }
    }
}

impl DeathTimer {
    pub fn new(seconds: f32) -> Self {
        Self {
            seconds_remaining: seconds,
        }
    }
}

impl Component for DeathTimer {
    const KIND: ComponentTypeId = ComponentKind::DeathTimer.id();
    const NAME: &'static str = "death_timer";
}

// ---------------------------------------------------------------------------
// DebugShape
// ---------------------------------------------------------------------------

/// What a debug overlay entity draws.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DebugKind {
    /// Outline of a camera volume.
    #[default]
    Frustum,
    /// Small solid marker.
    Point,
    /// Wire sphere.
    Sphere,
}

/// Marks an entity owned by the [`DebugSystem`](crate::systems::DebugSystem).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DebugShape {
    pub kind: DebugKind,
}

impl Component for DebugShape {
    const KIND: ComponentTypeId = ComponentKind::DebugShape.id();
    const NAME: &'static str = "debug_shape";
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
