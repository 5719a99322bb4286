//! Nova ECS -- signature-dispatched Entity Component System with a cached
//! transform hierarchy.
//!
//! Entities are small integer ids drawn from a fixed pool. Components live in
//! dense per-type columns indexed by entity id, and each entity's set of
//! component kinds is summarised in a [`Signature`](signature::Signature)
//! bitmask. Systems declare the signatures they care about; the
//! [`World`](world::World) keeps every system's member set up to date as
//! components come and go, so systems never scan for work.
//!
//! Every entity carries a [`Transform`](transform::Transform) and a node in the
//! [`TransformGraph`](hierarchy::TransformGraph), which caches world matrices
//! and cascades destruction down the tree.
//!
//! # Quick Start
//!
//! ```
//! use nova_ecs::prelude::*;
//! use glam::Vec3;
//!
//! #[derive(Debug, Clone, Default, PartialEq)]
//! struct Velocity(Vec3);
//!
//! impl Component for Velocity {
//!     const KIND: ComponentTypeId = ComponentTypeId::new(1);
//!     const NAME: &'static str = "velocity";
//! }
//!
//! let mut world = World::new();
//! world.register_component::<Velocity>().unwrap();
//!
//! let movers = world
//!     .register_system(
//!         SystemDescriptor::new("movers", SystemPhase::Physics)
//!             .require(Signature::new().with_component::<Velocity>()),
//!     )
//!     .unwrap();
//!
//! let parent = world.create_entity().unwrap();
//! let child = world.create_entity().unwrap();
//! world.insert_component(child, Velocity(Vec3::X)).unwrap();
//! world.set_parent(child, Some(parent)).unwrap();
//!
//! assert_eq!(world.system_members(movers).unwrap(), vec![child]);
//!
//! world.destroy_entity(parent).unwrap();
//! assert!(!world.is_alive(child));
//! assert!(world.system_members(movers).unwrap().is_empty());
//! ```

#![deny(unsafe_code)]

pub mod component;
pub mod entity;
pub mod hierarchy;
pub mod signature;
pub mod system;
pub mod transform;
pub mod world;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by ECS operations.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// Every entity id is in use.
    #[error("entity capacity of {max} exhausted")]
    CapacityExceeded { max: usize },

    /// A component type was used before being registered.
    #[error("component type '{component}' is not registered")]
    TypeNotRegistered { component: String },

    /// The entity does not hold the requested component.
    #[error("entity {entity:?} has no '{component}' component")]
    ComponentAbsent {
        entity: entity::EntityId,
        component: String,
    },

    /// The entity id is not alive.
    #[error("entity {entity:?} is not alive")]
    EntityInvalid { entity: entity::EntityId },

    /// Reparenting would make a node its own ancestor.
    #[error("cannot parent {child:?} under {parent:?}: it would create a cycle")]
    HierarchyCycle {
        child: entity::EntityId,
        parent: entity::EntityId,
    },

    /// A system name was registered twice.
    #[error("system '{name}' is already registered")]
    DuplicateSystem { name: String },

    /// A system id does not refer to a registered system.
    #[error("unknown system {system:?}")]
    UnknownSystem { system: system::SystemId },

    /// Misuse of an API that is not covered by a more specific variant.
    #[error("invalid argument: {0}")]
    Argument(String),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::component::{Component, ComponentInfo, ComponentStore, ComponentTypeId};
    pub use crate::entity::{EntityId, EntityRegistry, MAX_ENTITIES};
    pub use crate::hierarchy::TransformGraph;
    pub use crate::signature::Signature;
    pub use crate::system::{
        MembershipEvent, SystemDescriptor, SystemId, SystemPhase, SystemRegistry,
    };
    pub use crate::transform::Transform;
    pub use crate::world::World;
    pub use crate::EcsError;
}
