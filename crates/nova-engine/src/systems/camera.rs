//! Main camera selection.

use nova_ecs::prelude::*;

use super::{System, SystemContext};
use crate::camera::{Camera, Projection};
use crate::components::CameraComponent;
use crate::EngineError;

/// Tracks the main camera entity and publishes its [`Camera`] into the
/// [`AppContext`](crate::context::AppContext) every frame.
///
/// The camera is placed by the entity's world matrix and looks along its
/// forward (+Z) axis.
#[derive(Debug, Default, Clone)]
pub struct CameraSystem {
    main: Option<EntityId>,
}

impl CameraSystem {
    pub fn main_camera(&self) -> Option<EntityId> {
        self.main
    }

    /// Make `entity` the only camera flagged as main.
    ///
    /// # Errors
    ///
    /// Fails if `entity` is dead or has no [`CameraComponent`].
    pub fn set_main_camera(&mut self, world: &mut World, entity: EntityId) -> Result<(), EngineError> {
        world.get_component::<CameraComponent>(entity)?;
        if let Some(previous) = self.main.filter(|&p| p != entity) {
            if let Ok(component) = world.get_component_mut::<CameraComponent>(previous) {
                component.main = false;
            }
        }
        world.get_component_mut::<CameraComponent>(entity)?.main = true;
        if self.main != Some(entity) {
            tracing::info!(%entity, "main camera changed");
        }
        self.main = Some(entity);
        Ok(())
    }

    /// Camera value for `entity` at the given aspect ratio.
    pub fn camera_of(world: &World, entity: EntityId, aspect: f32) -> Result<Camera, EngineError> {
        let component = world.get_component::<CameraComponent>(entity)?;
        let global = world.global_transform(entity)?;
        Ok(Camera::from_matrix(
            global,
            component.near,
            component.far,
            Projection::Perspective {
                fov_y_degrees: component.fov_y_degrees,
                aspect,
            },
        ))
    }

    fn select(&mut self, world: &World, members: &[EntityId]) -> Option<EntityId> {
        let still_main = self.main.filter(|e| {
            members.contains(e)
                && world
                    .get_component::<CameraComponent>(*e)
                    .is_ok_and(|c| c.main)
        });
        if still_main.is_some() {
            return still_main;
        }
        let next = members.iter().copied().find(|&e| {
            world
                .get_component::<CameraComponent>(e)
                .is_ok_and(|c| c.main)
        });
        if next != self.main {
            match next {
                Some(entity) => tracing::info!(%entity, "main camera changed"),
                None => tracing::debug!("no main camera"),
            }
        }
        next
    }
}

impl System for CameraSystem {
    fn descriptor(&self) -> SystemDescriptor {
        SystemDescriptor::new("camera", SystemPhase::Logic)
            .require(Signature::new().with_component::<CameraComponent>())
    }

    fn on_entity_removed(
        &mut self,
        _ctx: &mut SystemContext<'_>,
        entity: EntityId,
    ) -> Result<(), EngineError> {
        if self.main == Some(entity) {
            self.main = None;
        }
        Ok(())
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>) -> Result<(), EngineError> {
        let members = ctx.members()?;
        self.main = self.select(ctx.world, &members);
        let camera = match self.main {
            Some(entity) => Some(Self::camera_of(ctx.world, entity, ctx.app.viewport().aspect())?),
            None => None,
        };
        ctx.app.set_camera(camera);
        Ok(())
    }
}
