//! Scenario tests for the ECS world: pool exhaustion, id reuse, hierarchy
//! composition and subtree destruction.

use glam::{Mat4, Vec3};
use nova_ecs::prelude::*;

#[derive(Debug, Clone, Default)]
struct Renderable;

impl Component for Renderable {
    const KIND: ComponentTypeId = ComponentTypeId::new(1);
    const NAME: &'static str = "renderable";
}

#[derive(Debug, Clone, Default)]
struct Glow;

impl Component for Glow {
    const KIND: ComponentTypeId = ComponentTypeId::new(2);
    const NAME: &'static str = "glow";
}

// ---------------------------------------------------------------------------
// Entity pool
// ---------------------------------------------------------------------------

#[test]
fn creating_past_max_entities_fails_without_issuing_an_id() {
    let mut world = World::new();
    for _ in 0..MAX_ENTITIES {
        world.create_entity().unwrap();
    }
    assert_eq!(world.entity_count(), MAX_ENTITIES);

    match world.create_entity() {
        Err(EcsError::CapacityExceeded { max }) => assert_eq!(max, MAX_ENTITIES),
        other => panic!("expected CapacityExceeded, got {other:?}"),
    }
    assert_eq!(world.entity_count(), MAX_ENTITIES);
}

#[test]
fn destroyed_id_comes_back_within_max_entities_creates() {
    let mut world = World::new();
    let e = world.create_entity().unwrap();
    world.destroy_entity(e).unwrap();
    assert!(matches!(
        world.get_component::<Transform>(e),
        Err(EcsError::EntityInvalid { .. })
    ));

    let mut reissued = false;
    for _ in 0..MAX_ENTITIES {
        if world.create_entity().unwrap() == e {
            reissued = true;
            break;
        }
        assert!(world.get_component::<Transform>(e).is_err());
    }
    assert!(reissued, "id {e:?} was never reissued");
}

// ---------------------------------------------------------------------------
// Hierarchy
// ---------------------------------------------------------------------------

fn spawn_at(world: &mut World, position: Vec3) -> EntityId {
    let e = world.create_entity().unwrap();
    world
        .get_component_mut::<Transform>(e)
        .unwrap()
        .set_position(position);
    e
}

#[test]
fn chain_of_translations_composes() {
    let mut world = World::new();
    let root = spawn_at(&mut world, Vec3::new(1.0, 0.0, 0.0));
    let a = spawn_at(&mut world, Vec3::new(0.0, 1.0, 0.0));
    let b = spawn_at(&mut world, Vec3::new(0.0, 0.0, 1.0));
    world.set_parent(a, Some(root)).unwrap();
    world.set_parent(b, Some(a)).unwrap();

    let expected = Mat4::from_translation(Vec3::ONE);
    assert!(world.global_transform(b).unwrap().abs_diff_eq(expected, 1e-6));
}

#[test]
fn moving_an_ancestor_moves_cached_descendants() {
    let mut world = World::new();
    let root = spawn_at(&mut world, Vec3::ZERO);
    let leaf = spawn_at(&mut world, Vec3::X);
    world.set_parent(leaf, Some(root)).unwrap();
    assert!(world
        .global_transform(leaf)
        .unwrap()
        .abs_diff_eq(Mat4::from_translation(Vec3::X), 1e-6));

    world
        .get_component_mut::<Transform>(root)
        .unwrap()
        .translate(Vec3::new(0.0, 0.0, 5.0));
    assert!(world
        .global_transform(leaf)
        .unwrap()
        .abs_diff_eq(Mat4::from_translation(Vec3::new(1.0, 0.0, 5.0)), 1e-6));
}

#[test]
fn destroying_parent_clears_descendants_from_every_system() {
    let mut world = World::new();
    world.register_component::<Renderable>().unwrap();
    world.register_component::<Glow>().unwrap();
    let render = world
        .register_system(
            SystemDescriptor::new("render", SystemPhase::Render)
                .require(Signature::new().with_component::<Renderable>())
                .require(Signature::new().with_component::<Glow>()),
        )
        .unwrap();
    let everything = world
        .register_system(SystemDescriptor::new("all", SystemPhase::Logic).require(Signature::new()))
        .unwrap();

    let root = world.create_entity().unwrap();
    let child = world.create_entity().unwrap();
    let grandchild = world.create_entity().unwrap();
    let other = world.create_entity().unwrap();
    world.add_component::<Renderable>(child).unwrap();
    world.add_component::<Glow>(grandchild).unwrap();
    world.add_component::<Renderable>(other).unwrap();
    world.set_parent(child, Some(root)).unwrap();
    world.set_parent(grandchild, Some(child)).unwrap();

    world.destroy_entity(root).unwrap();

    assert_eq!(world.system_members(render).unwrap(), vec![other]);
    assert_eq!(world.system_members(everything).unwrap(), vec![other]);
    for id in [root, child, grandchild] {
        assert!(!world.is_alive(id));
    }
}

#[test]
fn reparenting_under_a_descendant_is_refused() {
    let mut world = World::new();
    let root = world.create_entity().unwrap();
    let child = world.create_entity().unwrap();
    world.set_parent(child, Some(root)).unwrap();
    let err = world.set_parent(root, Some(child)).unwrap_err();
    assert!(matches!(err, EcsError::HierarchyCycle { .. }));
    // The failed call left both links as they were.
    assert_eq!(world.parent(root).unwrap(), None);
    assert_eq!(world.parent(child).unwrap(), Some(root));
    assert!(world.global_transform(root).is_ok());
}
