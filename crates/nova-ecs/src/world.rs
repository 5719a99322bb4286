//! The [`World`] is the top-level container for the ECS. It owns the entity
//! registry, the component store, the system membership registry and the
//! transform hierarchy, and keeps them consistent with each other.
//!
//! Every structural mutation goes through the world: adding or removing a
//! component updates the entity's [`Signature`] and immediately re-evaluates
//! system membership; destroying an entity tears down its whole hierarchy
//! subtree, leaves first.

use std::collections::BTreeSet;

use glam::Mat4;

use crate::component::{Component, ComponentStore, ComponentTypeId};
use crate::entity::{EntityId, EntityRegistry, MAX_ENTITIES};
use crate::hierarchy::TransformGraph;
use crate::signature::Signature;
use crate::system::{MembershipEvent, SystemDescriptor, SystemId, SystemRegistry};
use crate::transform::Transform;
use crate::EcsError;

/// Entities, components, systems and the transform hierarchy.
#[derive(Debug)]
pub struct World {
    entities: EntityRegistry,
    components: ComponentStore,
    systems: SystemRegistry,
    hierarchy: TransformGraph,
    /// Entities withheld from every system until re-enabled.
    disabled: BTreeSet<EntityId>,
}

impl World {
    /// A world with room for [`MAX_ENTITIES`] entities and the Transform
    /// component registered.
    pub fn new() -> Self {
        Self::with_capacity(MAX_ENTITIES)
    }

    /// A world with a smaller entity pool.
    pub fn with_capacity(capacity: usize) -> Self {
        let entities = EntityRegistry::with_capacity(capacity);
        let capacity = entities.capacity();
        Self {
            entities,
            components: ComponentStore::with_transform(capacity),
            systems: SystemRegistry::new(),
            hierarchy: TransformGraph::new(capacity),
            disabled: BTreeSet::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Register `T` using its `Default` value as the prototype.
    pub fn register_component<T: Component + Default>(&mut self) -> Result<(), EcsError> {
        self.components.register(T::default())
    }

    /// Register `T` with an explicit prototype.
    pub fn register_component_with<T: Component>(&mut self, prototype: T) -> Result<(), EcsError> {
        self.components.register(prototype)
    }

    /// Register a system. Existing entities are matched right away.
    pub fn register_system(&mut self, descriptor: SystemDescriptor) -> Result<SystemId, EcsError> {
        self.systems.register(descriptor, self.entities.iter())
    }

    /// Withdraw the most recently registered system, for example after its
    /// setup failed. Events it had queued are discarded.
    pub fn unregister_system(&mut self, system: SystemId) -> Result<(), EcsError> {
        self.systems.rollback(system).map(|_| ())
    }

    pub fn components(&self) -> &ComponentStore {
        &self.components
    }

    pub fn systems(&self) -> &SystemRegistry {
        &self.systems
    }

    // -----------------------------------------------------------------------
    // Entities
    // -----------------------------------------------------------------------

    /// Create an entity carrying a clone of the Transform prototype.
    ///
    /// # Errors
    ///
    /// [`EcsError::CapacityExceeded`] when the pool is exhausted.
    pub fn create_entity(&mut self) -> Result<EntityId, EcsError> {
        let entity = self.entities.create()?;
        self.components.construct(ComponentTypeId::TRANSFORM, entity)?;
        self.hierarchy.insert(entity);
        self.systems.signature_changed(entity, Signature::new());
        tracing::trace!(%entity, "created entity");
        Ok(entity)
    }

    /// Destroy `entity` and every descendant in the hierarchy.
    ///
    /// Descendants go first. Each entity is dropped from every system before
    /// its components are cleared and its id is released.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityInvalid`] if `entity` is not alive.
    pub fn destroy_entity(&mut self, entity: EntityId) -> Result<(), EcsError> {
        if !self.entities.is_alive(entity) {
            return Err(EcsError::EntityInvalid { entity });
        }
        let doomed = self.hierarchy.subtree_post_order(entity)?;
        for id in &doomed {
            self.systems.entity_destroyed(*id);
            self.disabled.remove(id);
            self.hierarchy.remove(*id)?;
            self.components.clear_entity(*id);
            self.entities.destroy(*id)?;
        }
        tracing::debug!(%entity, count = doomed.len(), "destroyed entity subtree");
        Ok(())
    }

    /// Take `entity` out of every system without touching its components.
    ///
    /// Component changes while disabled update the signature but not system
    /// membership. Disabling twice is a no-op.
    pub fn disable_entity(&mut self, entity: EntityId) -> Result<(), EcsError> {
        self.entities.signature(entity)?;
        if self.disabled.insert(entity) {
            self.systems.entity_destroyed(entity);
            tracing::trace!(%entity, "disabled entity");
        }
        Ok(())
    }

    /// Put a disabled entity back into every system its current signature
    /// matches. Enabling an enabled entity is a no-op.
    pub fn enable_entity(&mut self, entity: EntityId) -> Result<(), EcsError> {
        let signature = self.entities.signature(entity)?;
        if self.disabled.remove(&entity) {
            self.systems.signature_changed(entity, signature);
            tracing::trace!(%entity, "enabled entity");
        }
        Ok(())
    }

    /// Alive and not disabled.
    pub fn is_enabled(&self, entity: EntityId) -> bool {
        self.entities.is_alive(entity) && !self.disabled.contains(&entity)
    }

    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.entities.is_alive(entity)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn signature(&self, entity: EntityId) -> Result<Signature, EcsError> {
        self.entities.signature(entity)
    }

    /// Live entities in id order.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.iter().map(|(id, _)| id)
    }

    /// Live entities whose signature contains `signature`.
    pub fn entities_matching(&self, signature: Signature) -> Vec<EntityId> {
        self.entities
            .iter()
            .filter(|(_, sig)| sig.contains(signature))
            .map(|(id, _)| id)
            .collect()
    }

    /// Create a new root entity holding clones of all of `source`'s components.
    pub fn copy_entity(&mut self, source: EntityId) -> Result<EntityId, EcsError> {
        let signature = self.entities.signature(source)?;
        let copy = self.create_entity()?;
        for kind in signature.kinds() {
            self.components.copy(kind, source, copy)?;
        }
        self.entities.set_signature(copy, signature)?;
        self.systems.signature_changed(copy, signature);
        Ok(copy)
    }

    // -----------------------------------------------------------------------
    // Components
    // -----------------------------------------------------------------------

    /// Attach a clone of `T`'s prototype. Returns the existing value if the
    /// entity already has one.
    pub fn add_component<T: Component>(&mut self, entity: EntityId) -> Result<&mut T, EcsError> {
        let signature = self.entities.signature(entity)?;
        self.components.construct(T::KIND, entity)?;
        self.mark_added(entity, signature, T::KIND)?;
        self.components.get_mut::<T>(entity)
    }

    /// Attach `value`, replacing any existing `T`.
    pub fn insert_component<T: Component>(
        &mut self,
        entity: EntityId,
        value: T,
    ) -> Result<&mut T, EcsError> {
        let signature = self.entities.signature(entity)?;
        self.components.insert(entity, value)?;
        self.mark_added(entity, signature, T::KIND)?;
        self.components.get_mut::<T>(entity)
    }

    /// Detach `T`. Removing an absent component is a no-op.
    ///
    /// # Errors
    ///
    /// [`EcsError::Argument`] for [`Transform`], which every entity keeps.
    pub fn remove_component<T: Component>(&mut self, entity: EntityId) -> Result<(), EcsError> {
        if T::KIND == ComponentTypeId::TRANSFORM {
            return Err(EcsError::Argument(
                "the transform component cannot be removed".to_owned(),
            ));
        }
        let signature = self.entities.signature(entity)?;
        if !self.components.remove(T::KIND, entity)? {
            return Ok(());
        }
        let signature = signature.without(T::KIND);
        self.entities.set_signature(entity, signature)?;
        self.refresh_membership(entity, signature);
        Ok(())
    }

    /// Clone `from`'s `T` onto `to`.
    pub fn copy_component<T: Component>(&mut self, from: EntityId, to: EntityId) -> Result<(), EcsError> {
        self.entities.signature(from)?;
        let signature = self.entities.signature(to)?;
        self.components.copy(T::KIND, from, to)?;
        self.mark_added(to, signature, T::KIND)
    }

    pub fn has_component<T: Component>(&self, entity: EntityId) -> bool {
        self.entities
            .signature(entity)
            .is_ok_and(|sig| sig.has(T::KIND))
    }

    pub fn get_component<T: Component>(&self, entity: EntityId) -> Result<&T, EcsError> {
        self.entities.signature(entity)?;
        self.components.get::<T>(entity)
    }

    pub fn get_component_mut<T: Component>(&mut self, entity: EntityId) -> Result<&mut T, EcsError> {
        self.entities.signature(entity)?;
        self.components.get_mut::<T>(entity)
    }

    fn mark_added(
        &mut self,
        entity: EntityId,
        signature: Signature,
        kind: ComponentTypeId,
    ) -> Result<(), EcsError> {
        if signature.has(kind) {
            return Ok(());
        }
        let signature = signature.with(kind);
        self.entities.set_signature(entity, signature)?;
        self.refresh_membership(entity, signature);
        Ok(())
    }

    fn refresh_membership(&mut self, entity: EntityId, signature: Signature) {
        if !self.disabled.contains(&entity) {
            self.systems.signature_changed(entity, signature);
        }
    }

    // -----------------------------------------------------------------------
    // Systems
    // -----------------------------------------------------------------------

    /// All members of `system`, in id order.
    pub fn system_members(&self, system: SystemId) -> Result<Vec<EntityId>, EcsError> {
        Ok(self.systems.members(system)?.iter().copied().collect())
    }

    /// Members of `system` that matched the requirement `signature`.
    pub fn system_members_matching(
        &self,
        system: SystemId,
        signature: Signature,
    ) -> Result<Vec<EntityId>, EcsError> {
        Ok(self
            .systems
            .members_matching(system, signature)?
            .iter()
            .copied()
            .collect())
    }

    /// Pending membership transitions, oldest first.
    pub fn drain_membership_events(&mut self) -> Vec<MembershipEvent> {
        self.systems.drain_events()
    }

    // -----------------------------------------------------------------------
    // Hierarchy
    // -----------------------------------------------------------------------

    /// Reparent `child`, keeping its local transform.
    pub fn set_parent(&mut self, child: EntityId, parent: Option<EntityId>) -> Result<(), EcsError> {
        self.hierarchy.set_parent(child, parent)
    }

    /// Reparent `child` and rewrite its local transform so that its world
    /// pose is unchanged.
    pub fn set_parent_keep_world(
        &mut self,
        child: EntityId,
        parent: Option<EntityId>,
    ) -> Result<(), EcsError> {
        let old_global = self.global_transform(child)?;
        let parent_global = match parent {
            Some(parent) => self.global_transform(parent)?,
            None => Mat4::IDENTITY,
        };
        if parent_global.determinant().abs() <= f32::EPSILON {
            return Err(EcsError::Argument(format!(
                "world transform of {parent:?} is singular, cannot keep the child's pose"
            )));
        }
        self.hierarchy.set_parent(child, parent)?;
        let local = parent_global.inverse() * old_global;
        self.components
            .get_mut::<Transform>(child)?
            .set_local_matrix(local);
        Ok(())
    }

    pub fn parent(&self, entity: EntityId) -> Result<Option<EntityId>, EcsError> {
        self.hierarchy.parent(entity)
    }

    pub fn children(&self, entity: EntityId) -> Result<&[EntityId], EcsError> {
        self.hierarchy.children(entity)
    }

    /// World-space matrix of `entity`.
    pub fn global_transform(&self, entity: EntityId) -> Result<Mat4, EcsError> {
        self.hierarchy.global_transform(entity, &self.components)
    }

    pub fn hierarchy(&self) -> &TransformGraph {
        &self.hierarchy
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
