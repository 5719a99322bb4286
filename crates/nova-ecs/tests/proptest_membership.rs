//! Property tests for system membership.
//!
//! Random sequences of create / add / remove / destroy / reparent operations
//! are applied to a world with several systems, and after every step each
//! system's member set is compared against a brute-force evaluation of its
//! requirements.

use nova_ecs::prelude::*;
use proptest::prelude::*;

#[derive(Debug, Clone, Default)]
struct A;
#[derive(Debug, Clone, Default)]
struct B;
#[derive(Debug, Clone, Default)]
struct C;

impl Component for A {
    const KIND: ComponentTypeId = ComponentTypeId::new(1);
    const NAME: &'static str = "a";
}
impl Component for B {
    const KIND: ComponentTypeId = ComponentTypeId::new(2);
    const NAME: &'static str = "b";
}
impl Component for C {
    const KIND: ComponentTypeId = ComponentTypeId::new(3);
    const NAME: &'static str = "c";
}

/// Operations we can perform on the world.
#[derive(Debug, Clone)]
enum Op {
    Create,
    Add(usize, u8),
    Remove(usize, u8),
    Destroy(usize),
    Parent(usize, usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Create),
        4 => (0..32usize, 0..3u8).prop_map(|(i, k)| Op::Add(i, k)),
        2 => (0..32usize, 0..3u8).prop_map(|(i, k)| Op::Remove(i, k)),
        1 => (0..32usize).prop_map(Op::Destroy),
        1 => (0..32usize, 0..32usize).prop_map(|(c, p)| Op::Parent(c, p)),
    ]
}

fn add(world: &mut World, e: EntityId, kind: u8) -> Result<(), EcsError> {
    match kind {
        0 => world.add_component::<A>(e).map(|_| ()),
        1 => world.add_component::<B>(e).map(|_| ()),
        _ => world.add_component::<C>(e).map(|_| ()),
    }
}

fn remove(world: &mut World, e: EntityId, kind: u8) -> Result<(), EcsError> {
    match kind {
        0 => world.remove_component::<A>(e),
        1 => world.remove_component::<B>(e),
        _ => world.remove_component::<C>(e),
    }
}

fn assert_membership(world: &World, systems: &[SystemId]) {
    for &system in systems {
        let requirements = &world.systems().descriptor(system).unwrap().requirements;
        for e in world.entities() {
            let sig = world.signature(e).unwrap();
            let expected = requirements.iter().any(|r| sig.contains(*r));
            assert_eq!(
                world.systems().contains(system, e),
                expected,
                "entity {e:?} with {sig:?} vs system {system:?}"
            );
            for r in requirements {
                let in_set = world
                    .systems()
                    .members_matching(system, *r)
                    .unwrap()
                    .contains(&e);
                assert_eq!(in_set, sig.contains(*r));
            }
        }
        // No dead entity lingers in a member set.
        for member in world.systems().members(system).unwrap() {
            assert!(world.is_alive(*member), "dead {member:?} still in {system:?}");
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn membership_matches_signatures(ops in prop::collection::vec(op_strategy(), 1..80)) {
        let mut world = World::with_capacity(64);
        world.register_component::<A>().unwrap();
        world.register_component::<B>().unwrap();
        world.register_component::<C>().unwrap();

        let systems = vec![
            world.register_system(
                SystemDescriptor::new("a", SystemPhase::Physics)
                    .require(Signature::new().with_component::<A>()),
            ).unwrap(),
            world.register_system(
                SystemDescriptor::new("a_or_bc", SystemPhase::Logic)
                    .require(Signature::new().with_component::<A>())
                    .require(Signature::new().with_component::<B>().with_component::<C>()),
            ).unwrap(),
            world.register_system(
                SystemDescriptor::new("transform_only", SystemPhase::Render)
                    .require(Signature::new()),
            ).unwrap(),
        ];

        let mut handles: Vec<EntityId> = Vec::new();

        for op in ops {
            match op {
                Op::Create => {
                    if let Ok(e) = world.create_entity() {
                        handles.push(e);
                    }
                }
                Op::Add(i, k) => {
                    if let Some(&e) = handles.get(i) {
                        let result = add(&mut world, e, k);
                        prop_assert_eq!(result.is_ok(), world.is_alive(e));
                    }
                }
                Op::Remove(i, k) => {
                    if let Some(&e) = handles.get(i) {
                        let _ = remove(&mut world, e, k);
                    }
                }
                Op::Destroy(i) => {
                    if let Some(&e) = handles.get(i) {
                        let was_alive = world.is_alive(e);
                        prop_assert_eq!(world.destroy_entity(e).is_ok(), was_alive);
                    }
                }
                Op::Parent(c, p) => {
                    if let (Some(&c), Some(&p)) = (handles.get(c), handles.get(p)) {
                        let _ = world.set_parent(c, Some(p));
                    }
                }
            }
            assert_membership(&world, &systems);
        }
    }

    #[test]
    fn destroyed_id_is_reissued_only_after_the_rest_of_the_pool(capacity in 2usize..40, victim in 0usize..40) {
        let victim = victim % capacity;
        let mut world = World::with_capacity(capacity);
        let ids: Vec<EntityId> = (0..capacity).map(|_| world.create_entity().unwrap()).collect();
        let target = ids[victim];
        world.destroy_entity(target).unwrap();
        prop_assert!(world.get_component::<Transform>(target).is_err());

        // The pool has exactly one free slot, so the next create reuses it.
        let again = world.create_entity().unwrap();
        prop_assert_eq!(again, target);
        prop_assert!(world.create_entity().is_err());
    }
}
