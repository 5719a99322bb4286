//! Component type registration and dense per-entity storage.
//!
//! Component kinds form a closed set known at compile time: each component
//! type implements [`Component`] and names its [`ComponentTypeId`] (a bit index
//! below [`MAX_COMPONENTS`]) as an associated constant. An out-of-range bit is
//! rejected during constant evaluation, so the bound is checked at compile
//! time.
//!
//! # Storage
//!
//! [`ComponentStore`] keeps one column per registered kind. A column owns the
//! registered *prototype* and a dense `Vec<Option<T>>` indexed by
//! [`EntityId::index`]. Adding a component clones the prototype into the
//! entity's slot; the prototype itself is never handed out.
//!
//! Columns are type-erased behind a private column trait so the store can
//! remove, copy and prototype-construct components knowing only the kind id.
//! Dispatch happens once per column, not once per stored value.

use std::any::{Any, TypeId};
use std::fmt;

use crate::entity::EntityId;
use crate::transform::Transform;
use crate::EcsError;

/// Number of distinct component kinds a [`Signature`](crate::signature::Signature) can describe.
pub const MAX_COMPONENTS: usize = 64;

// ---------------------------------------------------------------------------
// ComponentTypeId
// ---------------------------------------------------------------------------

/// Bit index identifying a component kind.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentTypeId(u8);

impl ComponentTypeId {
    /// Reserved for [`Transform`](crate::transform::Transform).
    pub const TRANSFORM: ComponentTypeId = ComponentTypeId(0);

    /// Create a kind id. Panics (at compile time when used in a `const`) if
    /// `bit` does not fit in a signature.
    pub const fn new(bit: u8) -> Self {
        assert!(
            (bit as usize) < MAX_COMPONENTS,
            "component kind does not fit in a signature"
        );
        Self(bit)
    }

    /// The signature bit this kind occupies.
    #[inline]
    pub const fn bit(self) -> u8 {
        self.0
    }
}

impl fmt::Debug for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentTypeId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

/// A plain data type that can be attached to entities.
pub trait Component: Clone + Send + Sync + 'static {
    /// The kind bit for this type. Must be unique among registered types.
    const KIND: ComponentTypeId;
    /// Human-readable name used in errors and logs.
    const NAME: &'static str;
}

// ---------------------------------------------------------------------------
// ComponentInfo
// ---------------------------------------------------------------------------

/// Metadata about a registered component type.
#[derive(Debug, Clone)]
pub struct ComponentInfo {
    pub kind: ComponentTypeId,
    pub name: &'static str,
    /// `std::mem::size_of::<T>()`
    pub size: usize,
    /// `std::mem::align_of::<T>()`
    pub align: usize,
    /// Rust `TypeId` for runtime type checking.
    pub type_id: TypeId,
}

impl ComponentInfo {
    fn of<T: Component>() -> Self {
        Self {
            kind: T::KIND,
            name: T::NAME,
            size: std::mem::size_of::<T>(),
            align: std::mem::align_of::<T>(),
            type_id: TypeId::of::<T>(),
        }
    }
}

// ---------------------------------------------------------------------------
// Columns
// ---------------------------------------------------------------------------

/// Type-erased operations on one component column.
trait ErasedColumn: Send + Sync {
    fn info(&self) -> &ComponentInfo;
    fn has(&self, entity: EntityId) -> bool;
    /// Clone the prototype into `entity`'s slot if it is empty.
    fn construct(&mut self, entity: EntityId);
    fn remove(&mut self, entity: EntityId) -> bool;
    /// Clone `from`'s value into `to`, replacing whatever `to` held.
    fn copy(&mut self, from: EntityId, to: EntityId) -> bool;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

struct Column<T: Component> {
    info: ComponentInfo,
    prototype: T,
    slots: Vec<Option<T>>,
}

impl<T: Component> Column<T> {
    fn new(prototype: T, capacity: usize) -> Self {
        let mut slots = Vec::new();
        slots.resize_with(capacity, || None);
        Self {
            info: ComponentInfo::of::<T>(),
            prototype,
            slots,
        }
    }

    fn slot(&self, entity: EntityId) -> Option<&T> {
        self.slots.get(entity.index()).and_then(Option::as_ref)
    }

    fn slot_mut(&mut self, entity: EntityId) -> Option<&mut T> {
        self.slots.get_mut(entity.index()).and_then(Option::as_mut)
    }

    fn ensure_len(&mut self, entity: EntityId) {
        if entity.index() >= self.slots.len() {
            self.slots.resize_with(entity.index() + 1, || None);
        }
    }

    fn put(&mut self, entity: EntityId, value: T) -> &mut T {
        self.ensure_len(entity);
        self.slots[entity.index()].insert(value)
    }
}

impl<T: Component> ErasedColumn for Column<T> {
    fn info(&self) -> &ComponentInfo {
        &self.info
    }

    fn has(&self, entity: EntityId) -> bool {
        self.slot(entity).is_some()
    }

    fn construct(&mut self, entity: EntityId) {
        if !self.has(entity) {
            let value = self.prototype.clone();
            self.put(entity, value);
        }
    }

    fn remove(&mut self, entity: EntityId) -> bool {
        self.slots
            .get_mut(entity.index())
            .and_then(Option::take)
            .is_some()
    }

    fn copy(&mut self, from: EntityId, to: EntityId) -> bool {
        match self.slot(from).cloned() {
            Some(value) => {
                self.put(to, value);
                true
            }
            None => false,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// ComponentStore
// ---------------------------------------------------------------------------

/// All component columns, indexed by [`ComponentTypeId`].
pub struct ComponentStore {
    columns: Vec<Option<Box<dyn ErasedColumn>>>,
    capacity: usize,
}

impl ComponentStore {
    /// Create an empty store whose columns pre-size to `capacity` slots.
    pub fn new(capacity: usize) -> Self {
        let mut columns = Vec::with_capacity(MAX_COMPONENTS);
        columns.resize_with(MAX_COMPONENTS, || None);
        Self { columns, capacity }
    }

    /// An empty store with the [`Transform`] column already in place.
    pub fn with_transform(capacity: usize) -> Self {
        let mut store = Self::new(capacity);
        let index = ComponentTypeId::TRANSFORM.bit() as usize;
        store.columns[index] = Some(Box::new(Column::new(Transform::default(), capacity)));
        store
    }

    /// Register `T` with the prototype that new instances are cloned from.
    ///
    /// Registering the same type again replaces its prototype and keeps the
    /// stored values.
    ///
    /// # Errors
    ///
    /// [`EcsError::Argument`] if another type already claimed `T::KIND`.
    pub fn register<T: Component>(&mut self, prototype: T) -> Result<(), EcsError> {
        let index = T::KIND.bit() as usize;
        if let Some(existing) = self.columns[index].as_deref_mut() {
            let taken_by = existing.info().name;
            let column = existing
                .as_any_mut()
                .downcast_mut::<Column<T>>()
                .ok_or_else(|| {
                    EcsError::Argument(format!(
                        "component kind {} is already used by '{}', cannot register '{}'",
                        index,
                        taken_by,
                        T::NAME
                    ))
                })?;
            column.prototype = prototype;
            return Ok(());
        }
        tracing::debug!(component = T::NAME, kind = index, "registered component");
        self.columns[index] = Some(Box::new(Column::new(prototype, self.capacity)));
        Ok(())
    }

    /// Whether a type is registered for `kind`.
    pub fn is_registered(&self, kind: ComponentTypeId) -> bool {
        self.columns[kind.bit() as usize].is_some()
    }

    /// Metadata for the type registered under `kind`.
    pub fn info(&self, kind: ComponentTypeId) -> Option<&ComponentInfo> {
        self.column(kind).map(|c| c.info())
    }

    /// Names of all registered component types, in kind order.
    pub fn registered_names(&self) -> Vec<&'static str> {
        self.columns
            .iter()
            .flatten()
            .map(|c| c.info().name)
            .collect()
    }

    /// Whether `entity` holds a `kind` component.
    pub fn has(&self, kind: ComponentTypeId, entity: EntityId) -> bool {
        self.column(kind).is_some_and(|c| c.has(entity))
    }

    /// Clone the prototype of `kind` into `entity`'s slot (no-op if present).
    pub fn construct(&mut self, kind: ComponentTypeId, entity: EntityId) -> Result<(), EcsError> {
        self.column_mut(kind)?.construct(entity);
        Ok(())
    }

    /// Store an explicit value, replacing any existing one.
    pub fn insert<T: Component>(&mut self, entity: EntityId, value: T) -> Result<&mut T, EcsError> {
        Ok(self.typed_mut::<T>()?.put(entity, value))
    }

    /// Drop `entity`'s `kind` component. Returns whether one was present.
    pub fn remove(&mut self, kind: ComponentTypeId, entity: EntityId) -> Result<bool, EcsError> {
        Ok(self.column_mut(kind)?.remove(entity))
    }

    /// Clone `from`'s `kind` component into `to`.
    pub fn copy(
        &mut self,
        kind: ComponentTypeId,
        from: EntityId,
        to: EntityId,
    ) -> Result<(), EcsError> {
        let column = self.column_mut(kind)?;
        if column.copy(from, to) {
            Ok(())
        } else {
            Err(EcsError::ComponentAbsent {
                entity: from,
                component: column.info().name.to_owned(),
            })
        }
    }

    /// Shared access to `entity`'s `T`.
    pub fn get<T: Component>(&self, entity: EntityId) -> Result<&T, EcsError> {
        self.typed::<T>()?
            .slot(entity)
            .ok_or_else(|| absent::<T>(entity))
    }

    /// Mutable access to `entity`'s `T`.
    pub fn get_mut<T: Component>(&mut self, entity: EntityId) -> Result<&mut T, EcsError> {
        self.typed_mut::<T>()?
            .slot_mut(entity)
            .ok_or_else(|| absent::<T>(entity))
    }

    /// The registered prototype for `T`.
    pub fn prototype<T: Component>(&self) -> Result<&T, EcsError> {
        Ok(&self.typed::<T>()?.prototype)
    }

    /// Drop every component `entity` holds.
    pub fn clear_entity(&mut self, entity: EntityId) {
        for column in self.columns.iter_mut().flatten() {
            column.remove(entity);
        }
    }

    // -- internals ----------------------------------------------------------

    fn column(&self, kind: ComponentTypeId) -> Option<&dyn ErasedColumn> {
        self.columns[kind.bit() as usize].as_deref()
    }

    fn column_mut(&mut self, kind: ComponentTypeId) -> Result<&mut dyn ErasedColumn, EcsError> {
        match self.columns[kind.bit() as usize].as_deref_mut() {
            Some(column) => Ok(column),
            None => Err(EcsError::TypeNotRegistered {
                component: format!("kind {}", kind.bit()),
            }),
        }
    }

    fn typed<T: Component>(&self) -> Result<&Column<T>, EcsError> {
        self.column(T::KIND)
            .and_then(|c| c.as_any().downcast_ref::<Column<T>>())
            .ok_or_else(not_registered::<T>)
    }

    fn typed_mut<T: Component>(&mut self) -> Result<&mut Column<T>, EcsError> {
        self.columns[T::KIND.bit() as usize]
            .as_deref_mut()
            .and_then(|c| c.as_any_mut().downcast_mut::<Column<T>>())
            .ok_or_else(not_registered::<T>)
    }
}

impl fmt::Debug for ComponentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentStore")
            .field("registered", &self.registered_names())
            .field("capacity", &self.capacity)
            .finish()
    }
}

fn not_registered<T: Component>() -> EcsError {
    EcsError::TypeNotRegistered {
        component: T::NAME.to_owned(),
    }
}

fn absent<T: Component>(entity: EntityId) -> EcsError {
    EcsError::ComponentAbsent {
        entity,
        component: T::NAME.to_owned(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
