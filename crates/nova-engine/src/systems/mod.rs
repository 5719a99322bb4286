//! Engine systems.
//!
//! A [`System`] declares its phase and required signatures through a
//! [`SystemDescriptor`]. The [`Engine`](crate::engine::Engine) registers the
//! descriptor with the world, then calls the hooks with a
//! [`SystemContext`] giving mutable access to the world and the
//! [`AppContext`].

use std::any::Any;

use nova_ecs::prelude::*;

use crate::context::AppContext;
use crate::EngineError;

pub mod camera;
pub mod death_timer;
pub mod debug;
pub mod fps_control;
pub mod light;
pub mod physics;
pub mod render;

pub use camera::CameraSystem;
pub use death_timer::DeathTimerSystem;
pub use debug::DebugSystem;
pub use fps_control::FpsControlSystem;
pub use light::LightSystem;
pub use physics::PhysicsSystem;
pub use render::RenderSystem;

// ---------------------------------------------------------------------------
// SystemContext
// ---------------------------------------------------------------------------

/// What a system hook can touch.
pub struct SystemContext<'a> {
    /// Id the world assigned to the running system.
    pub id: SystemId,
    pub world: &'a mut World,
    pub app: &'a mut AppContext,
}

impl SystemContext<'_> {
    /// Seconds since the previous frame.
    pub fn dt(&self) -> f32 {
        self.app.delta_time()
    }

    /// Current members of the running system, in id order.
    pub fn members(&self) -> Result<Vec<EntityId>, EcsError> {
        self.world.system_members(self.id)
    }

    /// Members that matched one specific requirement.
    pub fn members_matching(&self, signature: Signature) -> Result<Vec<EntityId>, EcsError> {
        self.world.system_members_matching(self.id, signature)
    }
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

/// Behavior run by the engine each frame.
///
/// Membership hooks run before the next `update` of the frame in which the
/// change happened. `on_entity_removed` may see an entity that is already
/// destroyed, so it must not expect its components to be readable.
pub trait System: 'static {
    fn descriptor(&self) -> SystemDescriptor;

    fn init(&mut self, _ctx: &mut SystemContext<'_>) -> Result<(), EngineError> {
        Ok(())
    }

    fn on_entity_added(
        &mut self,
        _ctx: &mut SystemContext<'_>,
        _entity: EntityId,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    fn on_entity_removed(
        &mut self,
        _ctx: &mut SystemContext<'_>,
        _entity: EntityId,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>) -> Result<(), EngineError>;
}

/// Downcasting support for boxed systems.
pub(crate) trait AnySystem: System {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: System> AnySystem for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
