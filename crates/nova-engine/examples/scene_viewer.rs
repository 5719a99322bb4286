//! Interactive scene -- a lit courtyard of cubes with falling spheres.
//!
//! Run with:
//!   cargo run --example scene_viewer --features renderer -p nova-engine
//!
//! Reads `nova.json` from the working directory when present.
//!
//! Controls:
//!   WASD -- move, E/Q -- up/down, Shift/Ctrl -- faster/slower
//!   Arrows -- swing the sun
//!   C -- clear the light radius overlays
//!   Tab -- toggle mouse look
//!   Escape -- quit

use glam::{Quat, Vec3};
use nova_engine::logging;
use nova_engine::prelude::*;
use nova_engine::render::run_windowed;

const CONFIG_PATH: &str = "nova.json";

fn spawn(
    world: &mut World,
    position: Vec3,
    rotation: Quat,
    scale: Vec3,
) -> Result<EntityId, EngineError> {
    let e = world.create_entity()?;
    let transform = world.get_component_mut::<Transform>(e)?;
    transform.set_position(position);
    transform.set_rotation(rotation);
    transform.set_scale(scale);
    Ok(e)
}

fn build_scene(engine: &mut Engine) -> Result<(), EngineError> {
    let meshes = &mut engine.app_mut().meshes;
    let plane = meshes.add(MeshData::plane(60.0));
    let cube = meshes.add(MeshData::cube(1.0));
    let sphere = meshes.add(MeshData::uv_sphere(0.5, 32, 16));

    let world = engine.world_mut();

    // Ground
    let ground = spawn(world, Vec3::ZERO, Quat::IDENTITY, Vec3::ONE)?;
    world.insert_component(ground, Model::new(plane, Material::colored(Vec3::splat(0.7))))?;

    // Ring of pillars with a lamp above every other one
    for i in 0..12 {
        let angle = i as f32 / 12.0 * std::f32::consts::TAU;
        let position = Vec3::new(angle.cos() * 12.0, 2.0, angle.sin() * 12.0);
        let pillar = spawn(
            world,
            position,
            Quat::from_rotation_y(-angle),
            Vec3::new(1.0, 4.0, 1.0),
        )?;
        let hue = Vec3::new(0.5 + 0.5 * angle.cos(), 0.6, 0.5 + 0.5 * angle.sin());
        world.insert_component(pillar, Model::new(cube, Material::colored(hue)))?;

        if i % 2 == 0 {
            let lamp = spawn(world, position + Vec3::Y * 3.0, Quat::IDENTITY, Vec3::splat(0.3))?;
            world.insert_component(lamp, Model::new(sphere, Material::unlit(hue)))?;
            world.insert_component(
                lamp,
                PointLight {
                    color: hue,
                    radius: 8.0,
                    intensity: 2.0,
                },
            )?;
        }
    }

    // Spheres dropped from different heights, gone after a while
    for i in 0..8 {
        let x = i as f32 * 1.5 - 5.25;
        let ball = spawn(
            world,
            Vec3::new(x, 6.0 + i as f32, 3.0),
            Quat::IDENTITY,
            Vec3::ONE,
        )?;
        let material = Material {
            specular: Vec3::ONE,
            shininess: 96.0,
            ..Material::colored(Vec3::new(0.9, 0.9, 0.95))
        };
        world.insert_component(ball, Model::new(sphere, material))?;
        world.insert_component(ball, RigidBody::with_velocity(Vec3::new(0.0, 0.0, 0.5)))?;
        world.insert_component(ball, DeathTimer::new(20.0 + i as f32 * 2.0))?;
    }

    // Sun, tilted toward the camera side
    let sun = spawn(
        world,
        Vec3::ZERO,
        Quat::from_rotation_x(-0.6) * Quat::from_rotation_z(0.3),
        Vec3::ONE,
    )?;
    world.insert_component(
        sun,
        DirectionalLight {
            color: Vec3::new(1.0, 0.95, 0.85),
            intensity: 1.2,
            cast_shadows: true,
        },
    )?;

    // Viewer
    let eye = spawn(world, Vec3::new(0.0, 4.0, -18.0), Quat::IDENTITY, Vec3::ONE)?;
    world.insert_component(eye, CameraComponent::main())?;
    world.insert_component(eye, FpsControl::default())?;

    tracing::info!(entities = world.entity_count(), "scene built");
    Ok(())
}

/// Wire spheres marking how far each point light reaches.
fn show_light_ranges(engine: &mut Engine) -> Result<(), EngineError> {
    let lamps = engine
        .world()
        .entities_matching(Signature::new().with_component::<PointLight>());
    engine
        .with_system::<DebugSystem, _>(|debug, world, app| -> Result<(), EngineError> {
            for lamp in lamps {
                let light = world.get_component::<PointLight>(lamp)?.clone();
                let center = world.global_transform(lamp)?.w_axis.truncate();
                debug.sphere(world, app, light.color, center, light.radius)?;
            }
            Ok(())
        })
        .unwrap_or(Ok(()))
}

fn main() -> Result<(), anyhow::Error> {
    logging::init();

    let config = EngineConfig::load_or_default(CONFIG_PATH)?;
    let mut engine = Engine::new(config.clone())?;
    engine.add_system(PhysicsSystem::default())?;
    engine.add_system(DeathTimerSystem::default())?;
    engine.add_system(FpsControlSystem)?;
    engine.add_system(CameraSystem::default())?;
    engine.add_system(RenderSystem::new())?;

    engine.add_system(LightSystem::default())?;
    engine.add_system(DebugSystem::default())?;

    build_scene(&mut engine)?;
    show_light_ranges(&mut engine)?;
    run_windowed(engine, &config.window)
}
