//! First-person fly controls.

use glam::{EulerRot, Quat, Vec2, Vec3};
use nova_ecs::prelude::*;

use super::{System, SystemContext};
use crate::components::FpsControl;
use crate::context::{InputState, Key};
use crate::EngineError;

const MOVE_SCALE: f32 = 40.0;
const LOOK_SCALE: f32 = 280.0;
const MOUSE_UNITS: f32 = 720.0 / 40.0;
const PITCH_LIMIT: f32 = 89.0;

/// Moves and turns every entity with an [`FpsControl`].
///
/// WASD moves in the horizontal plane, E and Q move up and down, Shift
/// triples and Control divides the speed by three. Mouse motion turns the
/// entity while mouse look is enabled. Both motions approach their targets
/// with exponential smoothing.
#[derive(Debug, Default, Clone)]
pub struct FpsControlSystem;

impl FpsControlSystem {
    /// Unsmoothed displacement requested by the keyboard this frame.
    pub fn movement(input: &InputState, forward: Vec3, speed: f32, dt: f32) -> Vec3 {
        let mut speed = MOVE_SCALE * speed * dt;
        if input.key(Key::Shift) {
            speed *= 3.0;
        } else if input.key(Key::Control) {
            speed /= 3.0;
        }

        let right = Vec3::Y.cross(forward).normalize_or_zero();
        let mut direction = Vec3::ZERO;
        for (key, axis) in [
            (Key::W, forward),
            (Key::S, -forward),
            (Key::D, right),
            (Key::A, -right),
            (Key::E, Vec3::Y),
            (Key::Q, Vec3::NEG_Y),
        ] {
            if input.key(key) {
                direction += axis;
            }
        }
        direction.normalize_or_zero() * speed
    }

    /// Apply a mouse delta to the target yaw and pitch (degrees).
    pub fn look(control: &mut FpsControl, mouse_delta: Vec2, dt: f32) {
        let speed = LOOK_SCALE * control.rotation_speed * dt;
        control.target_yaw += mouse_delta.x / MOUSE_UNITS * speed;
        control.target_pitch = (control.target_pitch + mouse_delta.y / MOUSE_UNITS * speed)
            .clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    pub fn target_rotation(control: &FpsControl) -> Quat {
        Quat::from_euler(
            EulerRot::YXZ,
            control.target_yaw.to_radians(),
            control.target_pitch.to_radians(),
            0.0,
        )
    }
}

impl System for FpsControlSystem {
    fn descriptor(&self) -> SystemDescriptor {
        SystemDescriptor::new("fps_control", SystemPhase::Logic)
            .require(Signature::new().with_component::<FpsControl>())
    }

    /// Start from the entity's current pose so it does not jump.
    fn on_entity_added(
        &mut self,
        ctx: &mut SystemContext<'_>,
        entity: EntityId,
    ) -> Result<(), EngineError> {
        let transform = ctx.world.get_component::<Transform>(entity)?;
        let position = transform.position();
        let euler = transform.euler_degrees();
        let control = ctx.world.get_component_mut::<FpsControl>(entity)?;
        control.target_position = position;
        control.target_pitch = euler.x;
        control.target_yaw = euler.y;
        Ok(())
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>) -> Result<(), EngineError> {
        let dt = ctx.dt();
        let mouse = ctx.app.input.mouse_delta();
        for entity in ctx.members()? {
            let forward = ctx.world.get_component::<Transform>(entity)?.forward();
            let position = ctx.world.get_component::<Transform>(entity)?.position();

            let control = ctx.world.get_component_mut::<FpsControl>(entity)?;
            control.target_position +=
                Self::movement(&ctx.app.input, forward, control.movement_speed, dt);
            Self::look(control, mouse, dt);
            let step = (control.target_position - position) * control.movement_smoothing;
            let rotation = Self::target_rotation(control);
            let smoothing = control.rotation_smoothing;

            let transform = ctx.world.get_component_mut::<Transform>(entity)?;
            transform.translate(step);
            transform.rotate_slerp(rotation, smoothing);
        }
        Ok(())
    }
}
