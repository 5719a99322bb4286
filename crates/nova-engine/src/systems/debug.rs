//! Pooled debug overlays.

use std::collections::{HashMap, VecDeque};

use glam::{Mat4, Quat, Vec3};
use nova_ecs::prelude::*;

use super::{System, SystemContext};
use crate::camera::Camera;
use crate::components::{DebugKind, DebugShape, Material, Model};
use crate::context::{AppContext, Key};
use crate::mesh::{MeshData, MeshHandle};
use crate::EngineError;

/// Scale of a point marker relative to the unit sphere mesh.
const POINT_SCALE: f32 = 0.1;

#[derive(Debug, Clone, Copy)]
struct DebugMeshes {
    frustum: MeshHandle,
    sphere: MeshHandle,
}

/// Draws camera frustums, points and spheres as unlit overlay entities.
///
/// Each overlay is an ordinary entity carrying a [`DebugShape`] and a
/// [`Model`]. Clearing disables the entities instead of destroying them,
/// and later requests of the same kind re-enable one from the pool.
/// Releasing C clears every overlay.
///
/// ```
/// use nova_engine::prelude::*;
/// use glam::Vec3;
///
/// let mut engine = Engine::new(EngineConfig::default()).unwrap();
/// engine.add_system(DebugSystem::default()).unwrap();
///
/// let marker = engine
///     .with_system::<DebugSystem, _>(|debug, world, app| {
///         debug.point(world, app, Vec3::X, Vec3::new(1.0, 2.0, 3.0))
///     })
///     .unwrap()
///     .unwrap();
/// assert!(engine.world().is_enabled(marker));
/// ```
#[derive(Debug, Default)]
pub struct DebugSystem {
    meshes: Option<DebugMeshes>,
    pools: HashMap<DebugKind, VecDeque<EntityId>>,
}

impl DebugSystem {
    const SHAPES: Signature = Signature::new().with_component::<DebugShape>();

    /// Outline the volume `camera` sees.
    pub fn frustum(
        &mut self,
        world: &mut World,
        app: &mut AppContext,
        color: Vec3,
        camera: &Camera,
    ) -> Result<EntityId, EngineError> {
        self.frustum_from_matrix(world, app, color, camera.view_projection())
    }

    /// Outline the volume that `view_projection` maps onto clip space.
    ///
    /// # Errors
    ///
    /// [`EngineError::Argument`] if the matrix cannot be inverted.
    pub fn frustum_from_matrix(
        &mut self,
        world: &mut World,
        app: &mut AppContext,
        color: Vec3,
        view_projection: Mat4,
    ) -> Result<EntityId, EngineError> {
        if view_projection.determinant().abs() <= f32::EPSILON {
            return Err(EngineError::Argument(
                "frustum matrix is singular".to_owned(),
            ));
        }
        let mesh = self.meshes(app).frustum;
        let model = Model {
            mesh_transform: view_projection.inverse(),
            ..Model::new(mesh, Material::wireframe(color))
        };
        self.place(world, DebugKind::Frustum, model, Mat4::IDENTITY)
    }

    /// Small solid marker at `position`.
    pub fn point(
        &mut self,
        world: &mut World,
        app: &mut AppContext,
        color: Vec3,
        position: Vec3,
    ) -> Result<EntityId, EngineError> {
        let mesh = self.meshes(app).sphere;
        let pose = Mat4::from_scale_rotation_translation(
            Vec3::splat(POINT_SCALE),
            Quat::IDENTITY,
            position,
        );
        self.place(world, DebugKind::Point, Model::new(mesh, Material::unlit(color)), pose)
    }

    /// Wire sphere of `radius` around `center`.
    pub fn sphere(
        &mut self,
        world: &mut World,
        app: &mut AppContext,
        color: Vec3,
        center: Vec3,
        radius: f32,
    ) -> Result<EntityId, EngineError> {
        let mesh = self.meshes(app).sphere;
        let pose =
            Mat4::from_scale_rotation_translation(Vec3::splat(radius), Quat::IDENTITY, center);
        self.place(
            world,
            DebugKind::Sphere,
            Model::new(mesh, Material::wireframe(color)),
            pose,
        )
    }

    /// Disable every visible overlay and return it to its pool. Returns how
    /// many were cleared.
    pub fn clear(&mut self, world: &mut World) -> Result<usize, EngineError> {
        let visible = self.visible(world);
        for &entity in &visible {
            let kind = world.get_component::<DebugShape>(entity)?.kind;
            world.disable_entity(entity)?;
            self.pools.entry(kind).or_default().push_back(entity);
        }
        if !visible.is_empty() {
            tracing::debug!(count = visible.len(), "cleared debug overlays");
        }
        Ok(visible.len())
    }

    /// Enabled overlay entities in id order.
    pub fn visible(&self, world: &World) -> Vec<EntityId> {
        world
            .entities_matching(Self::SHAPES)
            .into_iter()
            .filter(|&e| world.is_enabled(e))
            .collect()
    }

    /// Disabled entities waiting for reuse.
    pub fn pooled(&self, kind: DebugKind) -> usize {
        self.pools.get(&kind).map_or(0, VecDeque::len)
    }

    fn meshes(&mut self, app: &mut AppContext) -> DebugMeshes {
        *self.meshes.get_or_insert_with(|| DebugMeshes {
            frustum: app.meshes.add(MeshData::ndc_cube()),
            sphere: app.meshes.add(MeshData::uv_sphere(1.0, 16, 8)),
        })
    }

    /// Reuse a pooled entity of `kind` or create one, then give it `model`
    /// and the local pose `pose`.
    fn place(
        &mut self,
        world: &mut World,
        kind: DebugKind,
        model: Model,
        pose: Mat4,
    ) -> Result<EntityId, EngineError> {
        let entity = match self.reuse(world, kind)? {
            Some(entity) => entity,
            None => {
                let entity = world.create_entity()?;
                world.insert_component(entity, DebugShape { kind })?;
                tracing::trace!(%entity, ?kind, "created debug overlay");
                entity
            }
        };
        world.insert_component(entity, model)?;
        world
            .get_component_mut::<Transform>(entity)?
            .set_local_matrix(pose);
        Ok(entity)
    }

    /// Pop pooled entities until one is still a disabled overlay of `kind`.
    /// Ids destroyed or recycled since pooling are dropped.
    fn reuse(&mut self, world: &mut World, kind: DebugKind) -> Result<Option<EntityId>, EngineError> {
        let Some(pool) = self.pools.get_mut(&kind) else {
            return Ok(None);
        };
        while let Some(entity) = pool.pop_front() {
            let still_ours = world.is_alive(entity)
                && !world.is_enabled(entity)
                && world
                    .get_component::<DebugShape>(entity)
                    .is_ok_and(|shape| shape.kind == kind);
            if still_ours {
                world.enable_entity(entity)?;
                return Ok(Some(entity));
            }
        }
        Ok(None)
    }
}

impl System for DebugSystem {
    fn descriptor(&self) -> SystemDescriptor {
        SystemDescriptor::new("debug", SystemPhase::Logic).require(Self::SHAPES)
    }

    fn init(&mut self, ctx: &mut SystemContext<'_>) -> Result<(), EngineError> {
        self.meshes(ctx.app);
        Ok(())
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>) -> Result<(), EngineError> {
        if ctx.app.input.key_up(Key::C) {
            self.clear(ctx.world)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
