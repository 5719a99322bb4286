//! Point-mass integration for entities with a [`RigidBody`].

use glam::Vec3;
use nova_ecs::prelude::*;

use super::{System, SystemContext};
use crate::components::RigidBody;
use crate::EngineError;

pub const GRAVITY: f32 = 9.82;
pub const GROUND_HEIGHT: f32 = 0.5;

/// Gravity, quadratic drag and a flat ground plane.
#[derive(Debug, Clone)]
pub struct PhysicsSystem {
    pub gravity: f32,
    /// Bodies below this height stop and are lifted back onto it.
    pub ground_height: f32,
}

impl Default for PhysicsSystem {
    fn default() -> Self {
        Self {
            gravity: GRAVITY,
            ground_height: GROUND_HEIGHT,
        }
    }
}

impl PhysicsSystem {
    /// Advance one body by `dt` and return its new position.
    pub fn integrate(&self, body: &mut RigidBody, position: Vec3, dt: f32) -> Vec3 {
        if body.gravity {
            body.velocity.y -= self.gravity * dt;
        }
        let drag = body.velocity.length_squared() * body.drag;
        body.velocity -= body.velocity.normalize_or_zero() * drag * dt;

        if position.y < self.ground_height {
            body.velocity = Vec3::ZERO;
            Vec3::new(position.x, self.ground_height, position.z)
        } else {
            position + body.velocity * dt
        }
    }
}

impl System for PhysicsSystem {
    fn descriptor(&self) -> SystemDescriptor {
        SystemDescriptor::new("physics", SystemPhase::Physics)
            .require(Signature::new().with_component::<RigidBody>())
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>) -> Result<(), EngineError> {
        let dt = ctx.dt();
        for entity in ctx.members()? {
            let mut body = ctx.world.get_component::<RigidBody>(entity)?.clone();
            let position = ctx.world.get_component::<Transform>(entity)?.position();
            let next = self.integrate(&mut body, position, dt);
            ctx.world
                .get_component_mut::<Transform>(entity)?
                .set_position(next);
            *ctx.world.get_component_mut::<RigidBody>(entity)? = body;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falling_body_accelerates_downward() {
        let physics = PhysicsSystem::default();
        let mut body = RigidBody {
            drag: 0.0,
            ..RigidBody::default()
        };
        let p1 = physics.integrate(&mut body, Vec3::new(0.0, 10.0, 0.0), 0.1);
        assert!((body.velocity.y + 0.982).abs() < 1e-5);
        assert!(p1.y < 10.0);
    }

    #[test]
    fn drag_opposes_motion() {
        let physics = PhysicsSystem {
            gravity: 0.0,
            ..PhysicsSystem::default()
        };
        let mut body = RigidBody::with_velocity(Vec3::new(10.0, 0.0, 0.0));
        physics.integrate(&mut body, Vec3::new(0.0, 5.0, 0.0), 0.1);
        // |v|^2 * drag * dt = 100 * 0.01 * 0.1
        assert!((body.velocity.x - 9.9).abs() < 1e-5);
    }

    #[test]
    fn ground_clamps_and_stops() {
        let physics = PhysicsSystem::default();
        let mut body = RigidBody::with_velocity(Vec3::new(1.0, -5.0, 0.0));
        let p = physics.integrate(&mut body, Vec3::new(2.0, 0.2, 3.0), 0.016);
        assert_eq!(p, Vec3::new(2.0, 0.5, 3.0));
        assert_eq!(body.velocity, Vec3::ZERO);
    }

    #[test]
    fn gravity_flag_disables_gravity() {
        let physics = PhysicsSystem::default();
        let mut body = RigidBody {
            gravity: false,
            ..RigidBody::default()
        };
        let p = physics.integrate(&mut body, Vec3::new(0.0, 3.0, 0.0), 1.0);
        assert_eq!(p, Vec3::new(0.0, 3.0, 0.0));
    }
}
