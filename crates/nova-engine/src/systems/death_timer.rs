//! Timed entity removal.

use nova_ecs::prelude::*;

use super::{System, SystemContext};
use crate::components::DeathTimer;
use crate::EngineError;

/// Counts every [`DeathTimer`] down and destroys the entity, with its
/// subtree, once the timer drops below zero.
#[derive(Debug, Default, Clone)]
pub struct DeathTimerSystem {
    destroyed: u64,
}

impl DeathTimerSystem {
    /// Entities destroyed so far.
    pub fn destroyed(&self) -> u64 {
        self.destroyed
    }
}

impl System for DeathTimerSystem {
    fn descriptor(&self) -> SystemDescriptor {
        SystemDescriptor::new("death_timer", SystemPhase::Logic)
            .require(Signature::new().with_component::<DeathTimer>())
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>) -> Result<(), EngineError> {
        let dt = ctx.dt();
        let mut expired = Vec::new();
        for entity in ctx.members()? {
            let timer = ctx.world.get_component_mut::<DeathTimer>(entity)?;
            timer.seconds_remaining -= dt;
            if timer.seconds_remaining < 0.0 {
                expired.push(entity);
            }
        }
        for entity in expired {
            // An earlier expiry may already have taken this one with its
            // parent.
            if ctx.world.is_alive(entity) {
                ctx.world.destroy_entity(entity)?;
                self.destroyed += 1;
                tracing::debug!(%entity, "death timer expired");
            }
        }
        Ok(())
    }
}
