//! Frame loop scenarios with the built-in systems.

use std::cell::RefCell;
use std::rc::Rc;

use glam::{Quat, Vec3};
use nova_engine::prelude::*;
use nova_engine::systems::physics::GROUND_HEIGHT;

fn engine() -> Engine {
    Engine::new(EngineConfig::default()).unwrap()
}

fn spawn_at(engine: &mut Engine, position: Vec3) -> EntityId {
    let e = engine.world_mut().create_entity().unwrap();
    engine
        .world_mut()
        .get_component_mut::<Transform>(e)
        .unwrap()
        .set_position(position);
    e
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

#[test]
fn dropped_body_comes_to_rest_on_the_ground() {
    let mut engine = engine();
    engine.add_system(PhysicsSystem::default()).unwrap();
    let ball = spawn_at(&mut engine, Vec3::new(1.0, 10.0, 2.0));
    engine
        .world_mut()
        .insert_component(ball, RigidBody::default())
        .unwrap();

    engine.run_frames(600, 1.0 / 60.0).unwrap();

    let position = engine
        .world()
        .get_component::<Transform>(ball)
        .unwrap()
        .position();
    assert!(position.y <= GROUND_HEIGHT + 1e-4, "y = {}", position.y);
    assert!(position.y >= GROUND_HEIGHT - 0.01, "y = {}", position.y);
    assert!((position.x - 1.0).abs() < 1e-5);
    assert!((position.z - 2.0).abs() < 1e-5);
}

#[test]
fn thrown_body_slows_down_under_drag() {
    let mut engine = engine();
    engine.add_system(PhysicsSystem::default()).unwrap();
    let shot = spawn_at(&mut engine, Vec3::new(0.0, 50.0, 0.0));
    engine
        .world_mut()
        .insert_component(
            shot,
            RigidBody {
                gravity: false,
                ..RigidBody::with_velocity(Vec3::new(20.0, 0.0, 0.0))
            },
        )
        .unwrap();

    engine.run_frames(30, 1.0 / 30.0).unwrap();

    let body = engine.world().get_component::<RigidBody>(shot).unwrap();
    assert!(body.velocity.x > 0.0 && body.velocity.x < 20.0);
    assert_eq!(body.velocity.y, 0.0);
}

#[test]
fn death_timer_takes_the_subtree_with_it() {
    let mut engine = engine();
    engine.add_system(DeathTimerSystem::default()).unwrap();
    let parent = spawn_at(&mut engine, Vec3::ZERO);
    let child = spawn_at(&mut engine, Vec3::X);
    let bystander = spawn_at(&mut engine, Vec3::Y);
    engine.world_mut().set_parent(child, Some(parent)).unwrap();
    engine
        .world_mut()
        .insert_component(parent, DeathTimer::new(0.25))
        .unwrap();

    engine.run_frames(2, 0.1).unwrap();
    assert!(engine.world().is_alive(parent));

    engine.frame(0.1).unwrap();
    assert!(!engine.world().is_alive(parent));
    assert!(!engine.world().is_alive(child));
    assert!(engine.world().is_alive(bystander));
    assert_eq!(engine.system::<DeathTimerSystem>().unwrap().destroyed(), 1);
}

#[test]
fn physics_runs_before_logic_whatever_the_registration_order() {
    let mut engine = engine();
    engine.add_system(DeathTimerSystem::default()).unwrap();
    engine.add_system(CameraSystem::default()).unwrap();
    engine.add_system(PhysicsSystem::default()).unwrap();

    assert_eq!(
        engine.system_names(),
        vec!["physics", "death_timer", "camera"]
    );
}

#[test]
fn frame_diagnostics_list_every_system() {
    let mut engine = engine();
    engine.add_system(PhysicsSystem::default()).unwrap();
    engine.add_system(DeathTimerSystem::default()).unwrap();
    spawn_at(&mut engine, Vec3::ZERO);

    engine.frame(0.016).unwrap();

    let diagnostics = engine.last_diagnostics();
    let names: Vec<&str> = diagnostics
        .system_times
        .iter()
        .map(|(name, _)| name.as_str())
        .collect();
    assert_eq!(names, ["physics", "death_timer"]);
    assert!((engine.app().elapsed() - 0.016).abs() < 1e-6);
}

// ---------------------------------------------------------------------------
// Controls and camera
// ---------------------------------------------------------------------------

#[test]
fn holding_w_flies_the_camera_forward() {
    let mut engine = engine();
    engine.add_system(FpsControlSystem).unwrap();
    engine.add_system(CameraSystem::default()).unwrap();
    let eye = spawn_at(&mut engine, Vec3::new(0.0, 2.0, -10.0));
    engine
        .world_mut()
        .insert_component(eye, CameraComponent::main())
        .unwrap();
    engine
        .world_mut()
        .insert_component(eye, FpsControl::default())
        .unwrap();

    engine.frame(1.0 / 60.0).unwrap();
    let start = engine.app().camera().unwrap().position;

    for _ in 0..30 {
        engine.app_mut().input.set_key(Key::W, true);
        engine.frame(1.0 / 60.0).unwrap();
    }

    let end = engine.app().camera().unwrap().position;
    assert!(end.z > start.z + 1.0, "moved from {start} to {end}");
    assert!((end.y - start.y).abs() < 1e-4);
}

#[test]
fn camera_pose_comes_from_the_entity_transform() {
    let mut engine = engine();
    engine.add_system(CameraSystem::default()).unwrap();
    let eye = spawn_at(&mut engine, Vec3::new(3.0, 1.0, 0.0));
    engine
        .world_mut()
        .get_component_mut::<Transform>(eye)
        .unwrap()
        .set_rotation(Quat::from_rotation_y(std::f32::consts::FRAC_PI_2));
    engine
        .world_mut()
        .insert_component(eye, CameraComponent::main())
        .unwrap();

    engine.frame(0.016).unwrap();

    let camera = engine.app().camera().unwrap();
    assert!(camera.position.abs_diff_eq(Vec3::new(3.0, 1.0, 0.0), 1e-5));
    assert!(camera.forward.abs_diff_eq(Vec3::X, 1e-5));
    assert_eq!(
        engine.system::<CameraSystem>().unwrap().main_camera(),
        Some(eye)
    );
}

#[test]
fn destroying_the_main_camera_unpublishes_it() {
    let mut engine = engine();
    engine.add_system(CameraSystem::default()).unwrap();
    let eye = spawn_at(&mut engine, Vec3::ZERO);
    engine
        .world_mut()
        .insert_component(eye, CameraComponent::main())
        .unwrap();
    engine.frame(0.016).unwrap();
    assert!(engine.app().camera().is_some());

    engine.world_mut().destroy_entity(eye).unwrap();
    engine.frame(0.016).unwrap();

    assert!(engine.app().camera().is_none());
    assert_eq!(engine.system::<CameraSystem>().unwrap().main_camera(), None);
}

#[test]
fn resize_listeners_see_new_sizes_only() {
    let mut engine = engine();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    engine
        .app_mut()
        .on_resize(move |w, h| sink.borrow_mut().push((w, h)));

    engine.app_mut().notify_resize(800, 600);
    engine.app_mut().notify_resize(800, 600);
    engine.app_mut().notify_resize(0, 600);
    engine.app_mut().notify_resize(1024, 768);

    assert_eq!(*seen.borrow(), vec![(800, 600), (1024, 768)]);
    assert!((engine.app().viewport().aspect() - 4.0 / 3.0).abs() < 1e-6);
}
