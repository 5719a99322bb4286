//! Component signatures.
//!
//! A [`Signature`] is a `u64` bitmask where bit `i` means "has the component
//! kind whose [`ComponentTypeId`] is `i`". Every signature built through the
//! public constructors carries the Transform bit, because every live entity
//! has a transform.
//!
//! Signatures double as capability descriptors: a system declares the
//! signatures it needs, and an entity qualifies when its own signature
//! [`contains`](Signature::contains) one of them.

use std::fmt;

use crate::component::{Component, ComponentTypeId, MAX_COMPONENTS};

const _: () = assert!(MAX_COMPONENTS <= u64::BITS as usize);

/// Bitmask of component kinds. Immutable: every mutator returns a new value.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Signature(u64);

impl Signature {
    /// The base signature: Transform only.
    #[inline]
    pub const fn new() -> Self {
        Self(1 << ComponentTypeId::TRANSFORM.bit())
    }

    /// Build a signature from a list of kinds (Transform is always included).
    pub fn of(kinds: &[ComponentTypeId]) -> Self {
        kinds.iter().fold(Self::new(), |sig, &kind| sig.with(kind))
    }

    /// Copy of `self` with `kind` set.
    #[inline]
    #[must_use]
    pub const fn with(self, kind: ComponentTypeId) -> Self {
        Self(self.0 | (1 << kind.bit()))
    }

    /// Copy of `self` with the kind of `T` set.
    #[inline]
    #[must_use]
    pub const fn with_component<T: Component>(self) -> Self {
        self.with(T::KIND)
    }

    /// Copy of `self` with `kind` cleared. The Transform bit cannot be cleared.
    #[inline]
    #[must_use]
    pub const fn without(self, kind: ComponentTypeId) -> Self {
        if kind.bit() == ComponentTypeId::TRANSFORM.bit() {
            return self;
        }
        Self(self.0 & !(1 << kind.bit()))
    }

    /// Whether `kind` is set.
    #[inline]
    pub const fn has(self, kind: ComponentTypeId) -> bool {
        self.0 & (1 << kind.bit()) != 0
    }

    /// Whether `self` is a superset of `other`.
    #[inline]
    pub const fn contains(self, other: Signature) -> bool {
        self.0 & other.0 == other.0
    }

    /// Raw bitmask.
    #[inline]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Number of kinds set.
    pub const fn len(self) -> u32 {
        self.0.count_ones()
    }

    /// Never true for signatures built through the public API.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterate the set kinds in ascending bit order.
    pub fn kinds(self) -> impl Iterator<Item = ComponentTypeId> {
        (0..MAX_COMPONENTS as u8)
            .filter(move |&bit| self.0 & (1 << bit) != 0)
            .map(ComponentTypeId::new)
    }
}

impl Default for Signature {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({:#b})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
