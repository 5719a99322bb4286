//! Arrow-key sun steering.

use glam::{Quat, Vec3};
use nova_ecs::prelude::*;

use super::{System, SystemContext};
use crate::components::DirectionalLight;
use crate::context::{InputState, Key};
use crate::EngineError;

/// Swings every [`DirectionalLight`] around the sky.
///
/// Left and Right turn the light around the vertical axis, Up and Down
/// raise and lower it. Until the first key press the lights keep the pose
/// their entities were given; afterwards every light follows the steered
/// direction, including lights added later.
#[derive(Debug, Clone)]
pub struct LightSystem {
    /// Azimuth in radians.
    pub horizontal: f32,
    /// Elevation angle in radians.
    pub vertical: f32,
    /// Radians per second while a key is held.
    pub speed: f32,
    steered: bool,
}

impl Default for LightSystem {
    fn default() -> Self {
        Self {
            horizontal: 0.0,
            vertical: 0.0,
            speed: 0.6,
            steered: false,
        }
    }
}

impl LightSystem {
    /// Unit vector from the scene toward the light.
    pub fn direction(&self) -> Vec3 {
        Vec3::new(
            self.horizontal.cos(),
            0.8 + self.vertical.sin(),
            self.horizontal.sin(),
        )
        .normalize_or(Vec3::Y)
    }

    /// Advance the angles from held keys. Returns whether any moved.
    pub fn steer(&mut self, input: &InputState, dt: f32) -> bool {
        let step = self.speed * dt;
        let mut moved = false;
        for (key, horizontal, vertical) in [
            (Key::Left, -step, 0.0),
            (Key::Right, step, 0.0),
            (Key::Up, 0.0, step),
            (Key::Down, 0.0, -step),
        ] {
            if input.key(key) {
                self.horizontal += horizontal;
                self.vertical += vertical;
                moved = true;
            }
        }
        moved
    }

    pub fn is_steered(&self) -> bool {
        self.steered
    }
}

impl System for LightSystem {
    fn descriptor(&self) -> SystemDescriptor {
        SystemDescriptor::new("light", SystemPhase::Logic)
            .require(Signature::new().with_component::<DirectionalLight>())
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>) -> Result<(), EngineError> {
        if self.steer(&ctx.app.input, ctx.dt()) {
            self.steered = true;
        }
        if !self.steered {
            return Ok(());
        }
        // Directional lights shine along their entity's up axis.
        let rotation = Quat::from_rotation_arc(Vec3::Y, self.direction());
        for entity in ctx.members()? {
            ctx.world
                .get_component_mut::<Transform>(entity)?
                .set_rotation(rotation);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::Engine;

    fn engine_with_sun() -> (Engine, EntityId) {
        let mut engine = Engine::new(EngineConfig::default()).unwrap();
        engine.add_system(LightSystem::default()).unwrap();
        let sun = engine.world_mut().create_entity().unwrap();
        engine
            .world_mut()
            .get_component_mut::<Transform>(sun)
            .unwrap()
            .set_rotation(Quat::from_rotation_x(0.4));
        engine
            .world_mut()
            .insert_component(sun, DirectionalLight::default())
            .unwrap();
        (engine, sun)
    }

    fn up_axis(engine: &Engine, entity: EntityId) -> Vec3 {
        engine
            .world()
            .global_transform(entity)
            .unwrap()
            .transform_vector3(Vec3::Y)
    }

    #[test]
    fn untouched_lights_keep_their_pose() {
        let (mut engine, sun) = engine_with_sun();
        engine.run_frames(10, 0.016).unwrap();
        let expected = Quat::from_rotation_x(0.4) * Vec3::Y;
        assert!(up_axis(&engine, sun).abs_diff_eq(expected, 1e-5));
    }

    #[test]
    fn arrow_keys_swing_the_sun() {
        let (mut engine, sun) = engine_with_sun();
        engine.app_mut().input.set_key(Key::Right, true);
        engine.run_frames(10, 0.1).unwrap();

        let system = engine.system::<LightSystem>().unwrap();
        assert!(system.is_steered());
        assert!((system.horizontal - 0.6).abs() < 1e-4);
        assert_eq!(system.vertical, 0.0);
        assert!(up_axis(&engine, sun).abs_diff_eq(system.direction(), 1e-4));
    }

    #[test]
    fn later_lights_follow_the_steered_direction() {
        let (mut engine, _) = engine_with_sun();
        engine.app_mut().input.set_key(Key::Up, true);
        engine.frame(0.5).unwrap();
        engine.app_mut().input.set_key(Key::Up, false);

        let late = engine.world_mut().create_entity().unwrap();
        engine
            .world_mut()
            .insert_component(late, DirectionalLight::default())
            .unwrap();
        engine.frame(0.016).unwrap();

        let direction = engine.system::<LightSystem>().unwrap().direction();
        assert!(up_axis(&engine, late).abs_diff_eq(direction, 1e-4));
    }

    #[test]
    fn direction_formula() {
        let system = LightSystem {
            horizontal: std::f32::consts::FRAC_PI_2,
            vertical: 0.0,
            ..LightSystem::default()
        };
        let expected = Vec3::new(0.0, 0.8, 1.0).normalize();
        assert!(system.direction().abs_diff_eq(expected, 1e-5));
    }
}
