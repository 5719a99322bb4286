//! Entity identifiers and allocation.
//!
//! An [`EntityId`] is a plain integer index into every per-entity array of the
//! ECS. Ids are bounded by [`MAX_ENTITIES`] and recycled through a FIFO free
//! list, so a destroyed id is handed out again only after every other free id
//! has been used once.
//!
//! The registry also owns each live entity's [`Signature`], because liveness
//! and signature change together on create/destroy.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use crate::signature::Signature;
use crate::EcsError;

/// Upper bound on simultaneously alive entities.
pub const MAX_ENTITIES: usize = 5000;

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// An entity identifier.
///
/// Valid ids are in `0..MAX_ENTITIES`. [`EntityId::INVALID`] lies outside that
/// range and is never issued by the registry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u32);

impl EntityId {
    /// Sentinel for "no entity". Never returned by [`EntityRegistry::create`].
    pub const INVALID: EntityId = EntityId(u32::MAX);

    /// Construct an id from its raw index.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw `u32` representation.
    #[inline]
    pub const fn to_raw(self) -> u32 {
        self.0
    }

    /// Index into per-entity arrays.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// `false` for [`EntityId::INVALID`].
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "EntityId({})", self.0)
        } else {
            f.write_str("EntityId(INVALID)")
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// EntityRegistry
// ---------------------------------------------------------------------------

/// Allocates and recycles [`EntityId`]s and tracks their signatures.
#[derive(Debug)]
pub struct EntityRegistry {
    /// `Some` while the entity is alive. Indexed by `EntityId::index`.
    signatures: Vec<Option<Signature>>,
    /// Ids ready to be issued, oldest first.
    free: VecDeque<EntityId>,
    alive: usize,
}

impl EntityRegistry {
    /// Create a registry with room for [`MAX_ENTITIES`] entities.
    pub fn new() -> Self {
        Self::with_capacity(MAX_ENTITIES)
    }

    /// Create a registry with a custom capacity (clamped to [`MAX_ENTITIES`]).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.min(MAX_ENTITIES);
        Self {
            signatures: vec![None; capacity],
            free: (0..capacity as u32).map(EntityId).collect(),
            alive: 0,
        }
    }

    /// Issue a fresh id with the base signature (Transform only).
    ///
    /// # Errors
    ///
    /// [`EcsError::CapacityExceeded`] when every id is in use. No id is
    /// consumed in that case.
    pub fn create(&mut self) -> Result<EntityId, EcsError> {
        let Some(id) = self.free.pop_front() else {
            tracing::warn!(max = self.capacity(), "entity pool exhausted");
            return Err(EcsError::CapacityExceeded {
                max: self.capacity(),
            });
        };
        self.signatures[id.index()] = Some(Signature::new());
        self.alive += 1;
        Ok(id)
    }

    /// Release `id` back to the free list.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityInvalid`] if `id` is not alive. The free list is left
    /// untouched, so a double destroy can never enqueue an id twice.
    pub fn destroy(&mut self, id: EntityId) -> Result<(), EcsError> {
        let slot = self
            .signatures
            .get_mut(id.index())
            .filter(|slot| slot.is_some())
            .ok_or(EcsError::EntityInvalid { entity: id })?;
        *slot = None;
        self.alive -= 1;
        self.free.push_back(id);
        Ok(())
    }

    /// Whether `id` refers to a live entity.
    pub fn is_alive(&self, id: EntityId) -> bool {
        matches!(self.signatures.get(id.index()), Some(Some(_)))
    }

    /// Current signature of a live entity.
    pub fn signature(&self, id: EntityId) -> Result<Signature, EcsError> {
        self.signatures
            .get(id.index())
            .copied()
            .flatten()
            .ok_or(EcsError::EntityInvalid { entity: id })
    }

    /// Overwrite the signature of a live entity.
    pub fn set_signature(&mut self, id: EntityId, signature: Signature) -> Result<(), EcsError> {
        match self.signatures.get_mut(id.index()) {
            Some(Some(slot)) => {
                *slot = signature;
                Ok(())
            }
            _ => Err(EcsError::EntityInvalid { entity: id }),
        }
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.alive
    }

    /// Whether no entities are alive.
    pub fn is_empty(&self) -> bool {
        self.alive == 0
    }

    /// Maximum number of simultaneously live entities.
    pub fn capacity(&self) -> usize {
        self.signatures.len()
    }

    /// Live entities with their signatures, in id order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, Signature)> + '_ {
        self.signatures
            .iter()
            .enumerate()
            .filter_map(|(index, sig)| sig.map(|sig| (EntityId(index as u32), sig)))
    }
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
