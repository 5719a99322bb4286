//! System registration and incremental membership tracking.
//!
//! A system is described by a [`SystemDescriptor`]: a name, a
//! [`SystemPhase`] and a list of required [`Signature`]s. The requirements are
//! disjunctive: an entity belongs to the system when its signature contains
//! *any* of them. Membership is recorded per requirement so a system can
//! iterate, say, only its point lights and then only its models.
//!
//! The registry never scans the world. [`World`](crate::world::World) reports
//! each signature change and each destruction, and the registry updates the
//! affected sets on the spot. Transitions into and out of a system are queued
//! as [`MembershipEvent`]s so that the code owning the system behaviour can
//! run its `on_entity_added` / `on_entity_removed` hooks.

use std::collections::{BTreeSet, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::signature::Signature;
use crate::EcsError;

// ---------------------------------------------------------------------------
// SystemId / SystemPhase / SystemDescriptor
// ---------------------------------------------------------------------------

/// Handle to a registered system.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SystemId(u32);

impl SystemId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SystemId({})", self.0)
    }
}

/// Scheduling bucket. Phases run in declaration order each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SystemPhase {
    Physics,
    Logic,
    Render,
}

impl SystemPhase {
    /// All phases in execution order.
    pub const ORDER: [SystemPhase; 3] = [SystemPhase::Physics, SystemPhase::Logic, SystemPhase::Render];
}

/// Static description of a system.
#[derive(Debug, Clone)]
pub struct SystemDescriptor {
    pub name: String,
    pub phase: SystemPhase,
    /// An entity matches if its signature contains any of these.
    pub requirements: Vec<Signature>,
}

impl SystemDescriptor {
    pub fn new(name: impl Into<String>, phase: SystemPhase) -> Self {
        Self {
            name: name.into(),
            phase,
            requirements: Vec::new(),
        }
    }

    /// Add a required signature. Duplicates are ignored.
    #[must_use]
    pub fn require(mut self, signature: Signature) -> Self {
        if !self.requirements.contains(&signature) {
            self.requirements.push(signature);
        }
        self
    }
}

// ---------------------------------------------------------------------------
// MembershipEvent
// ---------------------------------------------------------------------------

/// A transition of one entity into or out of one system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipEvent {
    Added { system: SystemId, entity: EntityId },
    Removed { system: SystemId, entity: EntityId },
}

impl MembershipEvent {
    pub fn system(&self) -> SystemId {
        match *self {
            MembershipEvent::Added { system, .. } | MembershipEvent::Removed { system, .. } => system,
        }
    }
}

// ---------------------------------------------------------------------------
// SystemRegistry
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct SystemEntry {
    descriptor: SystemDescriptor,
    /// One set per requirement, parallel to `descriptor.requirements`.
    matching: Vec<BTreeSet<EntityId>>,
    /// Union of `matching`.
    members: BTreeSet<EntityId>,
}

impl SystemEntry {
    fn new(descriptor: SystemDescriptor) -> Self {
        let matching = vec![BTreeSet::new(); descriptor.requirements.len()];
        Self {
            descriptor,
            matching,
            members: BTreeSet::new(),
        }
    }

    /// Recompute membership of `entity`. Returns `Some(true)` on entry,
    /// `Some(false)` on exit and `None` when overall membership is unchanged.
    fn refresh(&mut self, entity: EntityId, signature: Signature) -> Option<bool> {
        let mut any = false;
        for (requirement, set) in self.descriptor.requirements.iter().zip(&mut self.matching) {
            if signature.contains(*requirement) {
                set.insert(entity);
                any = true;
            } else {
                set.remove(&entity);
            }
        }
        match (any, self.members.contains(&entity)) {
            (true, false) => {
                self.members.insert(entity);
                Some(true)
            }
            (false, true) => {
                self.members.remove(&entity);
                Some(false)
            }
            _ => None,
        }
    }

    fn evict(&mut self, entity: EntityId) -> bool {
        for set in &mut self.matching {
            set.remove(&entity);
        }
        self.members.remove(&entity)
    }
}

/// All registered systems and their membership sets.
#[derive(Debug, Default)]
pub struct SystemRegistry {
    systems: Vec<SystemEntry>,
    events: VecDeque<MembershipEvent>,
}

impl SystemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a system and seed its membership from `existing` entities.
    ///
    /// # Errors
    ///
    /// [`EcsError::DuplicateSystem`] if the name is taken.
    pub fn register(
        &mut self,
        descriptor: SystemDescriptor,
        existing: impl IntoIterator<Item = (EntityId, Signature)>,
    ) -> Result<SystemId, EcsError> {
        if self.systems.iter().any(|s| s.descriptor.name == descriptor.name) {
            return Err(EcsError::DuplicateSystem {
                name: descriptor.name,
            });
        }
        let id = SystemId(self.systems.len() as u32);
        tracing::debug!(
            system = %descriptor.name,
            phase = ?descriptor.phase,
            requirements = descriptor.requirements.len(),
            "registered system"
        );
        let mut entry = SystemEntry::new(descriptor);
        for (entity, signature) in existing {
            if entry.refresh(entity, signature) == Some(true) {
                self.events.push_back(MembershipEvent::Added { system: id, entity });
            }
        }
        self.systems.push(entry);
        Ok(id)
    }

    /// Undo the registration of the most recently registered system, along
    /// with any membership events it has queued.
    ///
    /// # Errors
    ///
    /// [`EcsError::Argument`] if `system` is not the last one registered,
    /// since later ids would shift.
    pub fn rollback(&mut self, system: SystemId) -> Result<SystemDescriptor, EcsError> {
        if system.index() + 1 != self.systems.len() {
            return Err(EcsError::Argument(format!(
                "{system:?} is not the most recently registered system"
            )));
        }
        let entry = self.systems.pop().ok_or(EcsError::UnknownSystem { system })?;
        self.events.retain(|event| event.system() != system);
        tracing::debug!(system = %entry.descriptor.name, "rolled back system registration");
        Ok(entry.descriptor)
    }

    /// Re-evaluate `entity` against every system after its signature changed.
    pub fn signature_changed(&mut self, entity: EntityId, signature: Signature) {
        for (index, entry) in self.systems.iter_mut().enumerate() {
            let system = SystemId(index as u32);
            match entry.refresh(entity, signature) {
                Some(true) => self.events.push_back(MembershipEvent::Added { system, entity }),
                Some(false) => self.events.push_back(MembershipEvent::Removed { system, entity }),
                None => {}
            }
        }
    }

    /// Remove `entity` from every system unconditionally.
    pub fn entity_destroyed(&mut self, entity: EntityId) {
        for (index, entry) in self.systems.iter_mut().enumerate() {
            if entry.evict(entity) {
                self.events.push_back(MembershipEvent::Removed {
                    system: SystemId(index as u32),
                    entity,
                });
            }
        }
    }

    /// Every entity matching at least one requirement of `system`, in id order.
    pub fn members(&self, system: SystemId) -> Result<&BTreeSet<EntityId>, EcsError> {
        Ok(&self.entry(system)?.members)
    }

    /// Entities that matched the specific requirement `signature`.
    ///
    /// # Errors
    ///
    /// [`EcsError::Argument`] if `signature` is not one of the system's
    /// requirements.
    pub fn members_matching(
        &self,
        system: SystemId,
        signature: Signature,
    ) -> Result<&BTreeSet<EntityId>, EcsError> {
        let entry = self.entry(system)?;
        entry
            .descriptor
            .requirements
            .iter()
            .position(|r| *r == signature)
            .map(|i| &entry.matching[i])
            .ok_or_else(|| {
                EcsError::Argument(format!(
                    "{signature:?} is not a requirement of system '{}'",
                    entry.descriptor.name
                ))
            })
    }

    /// Whether `entity` is currently a member of `system`.
    pub fn contains(&self, system: SystemId, entity: EntityId) -> bool {
        self.systems
            .get(system.index())
            .is_some_and(|e| e.members.contains(&entity))
    }

    pub fn descriptor(&self, system: SystemId) -> Result<&SystemDescriptor, EcsError> {
        Ok(&self.entry(system)?.descriptor)
    }

    /// Look a system up by name.
    pub fn find(&self, name: &str) -> Option<SystemId> {
        self.systems
            .iter()
            .position(|s| s.descriptor.name == name)
            .map(|i| SystemId(i as u32))
    }

    /// All system ids sorted by phase, registration order within a phase.
    pub fn schedule(&self) -> Vec<SystemId> {
        let mut ids: Vec<SystemId> = (0..self.systems.len() as u32).map(SystemId).collect();
        ids.sort_by_key(|id| (self.systems[id.index()].descriptor.phase, *id));
        ids
    }

    /// Take all pending membership events, oldest first.
    pub fn drain_events(&mut self) -> Vec<MembershipEvent> {
        self.events.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    fn entry(&self, system: SystemId) -> Result<&SystemEntry, EcsError> {
        self.systems
            .get(system.index())
            .ok_or(EcsError::UnknownSystem { system })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentTypeId;

    const MODEL: ComponentTypeId = ComponentTypeId::new(1);
    const LIGHT: ComponentTypeId = ComponentTypeId::new(2);
    const BODY: ComponentTypeId = ComponentTypeId::new(3);

    fn e(raw: u32) -> EntityId {
        EntityId::from_raw(raw)
    }

    fn render_descriptor() -> SystemDescriptor {
        SystemDescriptor::new("render", SystemPhase::Render)
            .require(Signature::of(&[MODEL]))
            .require(Signature::of(&[LIGHT]))
    }

    #[test]
    fn entity_joins_when_any_requirement_matches() {
        let mut reg = SystemRegistry::new();
        let id = reg.register(render_descriptor(), []).unwrap();

        reg.signature_changed(e(0), Signature::of(&[LIGHT]));
        assert!(reg.contains(id, e(0)));
        assert!(reg
            .members_matching(id, Signature::of(&[LIGHT]))
            .unwrap()
            .contains(&e(0)));
        assert!(reg
            .members_matching(id, Signature::of(&[MODEL]))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn entity_leaves_when_no_requirement_matches() {
        let mut reg = SystemRegistry::new();
        let id = reg.register(render_descriptor(), []).unwrap();
        reg.signature_changed(e(0), Signature::of(&[MODEL, BODY]));
        reg.signature_changed(e(0), Signature::of(&[BODY]));
        assert!(!reg.contains(id, e(0)));
        assert!(reg.members(id).unwrap().is_empty());
    }

    #[test]
    fn membership_is_per_requirement() {
        let mut reg = SystemRegistry::new();
        let id = reg.register(render_descriptor(), []).unwrap();
        reg.signature_changed(e(0), Signature::of(&[MODEL, LIGHT]));
        reg.signature_changed(e(0), Signature::of(&[LIGHT]));
        assert!(reg.contains(id, e(0)));
        assert!(!reg
            .members_matching(id, Signature::of(&[MODEL]))
            .unwrap()
            .contains(&e(0)));
    }

    #[test]
    fn events_only_on_transitions() {
        let mut reg = SystemRegistry::new();
        let id = reg.register(render_descriptor(), []).unwrap();
        reg.signature_changed(e(4), Signature::of(&[MODEL]));
        reg.signature_changed(e(4), Signature::of(&[MODEL, LIGHT]));
        reg.entity_destroyed(e(4));
        reg.entity_destroyed(e(4));
        assert_eq!(
            reg.drain_events(),
            vec![
                MembershipEvent::Added { system: id, entity: e(4) },
                MembershipEvent::Removed { system: id, entity: e(4) },
            ]
        );
        assert!(reg.drain_events().is_empty());
    }

    #[test]
    fn registration_seeds_from_existing_entities() {
        let mut reg = SystemRegistry::new();
        let id = reg
            .register(
                render_descriptor(),
                [
                    (e(0), Signature::of(&[MODEL])),
                    (e(1), Signature::new()),
                ],
            )
            .unwrap();
        assert!(reg.contains(id, e(0)));
        assert!(!reg.contains(id, e(1)));
    }

    #[test]
    fn system_without_requirements_matches_nothing() {
        let mut reg = SystemRegistry::new();
        let id = reg
            .register(SystemDescriptor::new("idle", SystemPhase::Logic), [])
            .unwrap();
        reg.signature_changed(e(0), Signature::of(&[MODEL, LIGHT, BODY]));
        assert!(reg.members(id).unwrap().is_empty());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut reg = SystemRegistry::new();
        reg.register(render_descriptor(), []).unwrap();
        assert!(matches!(
            reg.register(render_descriptor(), []),
            Err(EcsError::DuplicateSystem { .. })
        ));
    }

    #[test]
    fn unknown_requirement_is_an_argument_error() {
        let mut reg = SystemRegistry::new();
        let id = reg.register(render_descriptor(), []).unwrap();
        assert!(matches!(
            reg.members_matching(id, Signature::of(&[BODY])),
            Err(EcsError::Argument(_))
        ));
    }

    #[test]
    fn rollback_frees_the_name_and_drops_queued_events() {
        let mut reg = SystemRegistry::new();
        let keep = reg
            .register(SystemDescriptor::new("keep", SystemPhase::Logic).require(Signature::new()), [])
            .unwrap();
        reg.drain_events();
        let id = reg
            .register(render_descriptor(), [(e(0), Signature::of(&[MODEL]))])
            .unwrap();

        assert!(matches!(reg.rollback(keep), Err(EcsError::Argument(_))));
        assert_eq!(reg.rollback(id).unwrap().name, "render");
        assert!(reg.drain_events().is_empty());
        assert_eq!(reg.len(), 1);

        let again = reg.register(render_descriptor(), []).unwrap();
        assert_eq!(again, id);
    }

    #[test]
    fn schedule_orders_by_phase_then_registration() {
        let mut reg = SystemRegistry::new();
        let render = reg.register(render_descriptor(), []).unwrap();
        let logic = reg
            .register(SystemDescriptor::new("logic", SystemPhase::Logic), [])
            .unwrap();
        let physics = reg
            .register(SystemDescriptor::new("physics", SystemPhase::Physics), [])
            .unwrap();
        let logic2 = reg
            .register(SystemDescriptor::new("logic2", SystemPhase::Logic), [])
            .unwrap();
        assert_eq!(reg.schedule(), vec![physics, logic, logic2, render]);
        assert_eq!(reg.find("logic2"), Some(logic2));
    }
}
