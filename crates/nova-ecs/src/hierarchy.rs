//! Parent/child hierarchy with lazily cached world matrices.
//!
//! Nodes live in an arena indexed by [`EntityId`]; parent and child links are
//! ids, never references. A node's world matrix is `world(parent) * local`.
//!
//! # Caching
//!
//! Instead of dirty flags pushed down the tree, each cached world matrix
//! remembers what it was computed from:
//!
//! - the revision of the entity's own [`Transform`],
//! - the node's link generation (bumped on reparent),
//! - the *stamp* of the parent's cached matrix.
//!
//! Every recomputation issues a new stamp. A read walks up to the root,
//! and any node whose inputs no longer match recomputes; descendants notice
//! the new parent stamp on their next read. Nothing is written on the mutation
//! path, so a pose change costs O(1) and invalidation of a whole subtree is
//! implicit.

use std::cell::Cell;

use glam::Mat4;

use crate::component::ComponentStore;
use crate::entity::EntityId;
use crate::transform::Transform;
use crate::EcsError;

#[derive(Debug, Clone, Copy)]
struct CachedWorld {
    matrix: Mat4,
    transform_revision: u64,
    link_generation: u64,
    parent_stamp: u64,
    stamp: u64,
}

#[derive(Debug, Default)]
struct Node {
    parent: Option<EntityId>,
    children: Vec<EntityId>,
    link_generation: u64,
    cache: Cell<Option<CachedWorld>>,
}

/// Arena of transform nodes, one per live entity.
#[derive(Debug)]
pub struct TransformGraph {
    nodes: Vec<Option<Node>>,
    /// Stamp handed to the next recomputed matrix. Roots use stamp 0 for
    /// their (absent) parent.
    next_stamp: Cell<u64>,
}

impl TransformGraph {
    pub fn new(capacity: usize) -> Self {
        let mut nodes = Vec::new();
        nodes.resize_with(capacity, || None);
        Self {
            nodes,
            next_stamp: Cell::new(1),
        }
    }

    /// Create a root node for a freshly created entity.
    pub fn insert(&mut self, entity: EntityId) {
        if entity.index() >= self.nodes.len() {
            self.nodes.resize_with(entity.index() + 1, || None);
        }
        self.nodes[entity.index()] = Some(Node::default());
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.node(entity).is_ok()
    }

    pub fn parent(&self, entity: EntityId) -> Result<Option<EntityId>, EcsError> {
        Ok(self.node(entity)?.parent)
    }

    pub fn children(&self, entity: EntityId) -> Result<&[EntityId], EcsError> {
        Ok(&self.node(entity)?.children)
    }

    /// Whether `ancestor` is `entity` or lies on its path to the root.
    pub fn is_ancestor_or_self(&self, ancestor: EntityId, entity: EntityId) -> bool {
        let mut cursor = Some(entity);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.node(current).ok().and_then(|n| n.parent);
        }
        false
    }

    /// Attach `child` under `parent`, or make it a root with `None`.
    ///
    /// The child's local transform is kept as is, so its world pose changes
    /// to follow the new parent.
    ///
    /// # Errors
    ///
    /// - [`EcsError::EntityInvalid`] if either node is missing.
    /// - [`EcsError::HierarchyCycle`] if `parent` is `child` or one of its
    ///   descendants.
    pub fn set_parent(&mut self, child: EntityId, parent: Option<EntityId>) -> Result<(), EcsError> {
        self.node(child)?;
        if let Some(parent) = parent {
            self.node(parent)?;
            if self.is_ancestor_or_self(child, parent) {
                return Err(EcsError::HierarchyCycle { child, parent });
            }
        }

        let previous = self.node(child)?.parent;
        if previous == parent {
            return Ok(());
        }
        if let Some(old) = previous {
            self.node_mut(old)?.children.retain(|&c| c != child);
        }
        if let Some(new) = parent {
            self.node_mut(new)?.children.push(child);
        }
        let node = self.node_mut(child)?;
        node.parent = parent;
        node.link_generation += 1;
        tracing::trace!(%child, parent = ?parent, "reparented");
        Ok(())
    }

    /// World matrix of `entity`, recomputing stale ancestors on the way.
    pub fn global_transform(
        &self,
        entity: EntityId,
        components: &ComponentStore,
    ) -> Result<Mat4, EcsError> {
        self.resolve(entity, components).map(|(matrix, _)| matrix)
    }

    /// `entity` and all its descendants, children before parents.
    pub fn subtree_post_order(&self, entity: EntityId) -> Result<Vec<EntityId>, EcsError> {
        fn visit(
            graph: &TransformGraph,
            entity: EntityId,
            out: &mut Vec<EntityId>,
        ) -> Result<(), EcsError> {
            for &child in &graph.node(entity)?.children {
                visit(graph, child, out)?;
            }
            out.push(entity);
            Ok(())
        }

        let mut out = Vec::new();
        visit(self, entity, &mut out)?;
        Ok(out)
    }

    /// Drop `entity`'s node, detaching it from its parent. Remaining children
    /// become roots.
    pub fn remove(&mut self, entity: EntityId) -> Result<(), EcsError> {
        let node = self
            .nodes
            .get_mut(entity.index())
            .and_then(Option::take)
            .ok_or(EcsError::EntityInvalid { entity })?;
        if let Some(parent) = node.parent {
            if let Ok(parent) = self.node_mut(parent) {
                parent.children.retain(|&c| c != entity);
            }
        }
        for child in node.children {
            if let Ok(child) = self.node_mut(child) {
                child.parent = None;
                child.link_generation += 1;
            }
        }
        Ok(())
    }

    // -- internals ----------------------------------------------------------

    fn node(&self, entity: EntityId) -> Result<&Node, EcsError> {
        self.nodes
            .get(entity.index())
            .and_then(Option::as_ref)
            .ok_or(EcsError::EntityInvalid { entity })
    }

    fn node_mut(&mut self, entity: EntityId) -> Result<&mut Node, EcsError> {
        self.nodes
            .get_mut(entity.index())
            .and_then(Option::as_mut)
            .ok_or(EcsError::EntityInvalid { entity })
    }

    fn resolve(&self, entity: EntityId, components: &ComponentStore) -> Result<(Mat4, u64), EcsError> {
        let node = self.node(entity)?;
        let transform = components.get::<Transform>(entity)?;
        let (parent_matrix, parent_stamp) = match node.parent {
            Some(parent) => self.resolve(parent, components)?,
            None => (Mat4::IDENTITY, 0),
        };

        if let Some(cached) = node.cache.get() {
            if cached.transform_revision == transform.revision()
                && cached.link_generation == node.link_generation
                && cached.parent_stamp == parent_stamp
            {
                return Ok((cached.matrix, cached.stamp));
            }
        }

        let matrix = parent_matrix * transform.local_matrix();
        let stamp = self.next_stamp.get();
        self.next_stamp.set(stamp + 1);
        node.cache.set(Some(CachedWorld {
            matrix,
            transform_revision: transform.revision(),
            link_generation: node.link_generation,
            parent_stamp,
            stamp,
        }));
        Ok((matrix, stamp))
    }

    #[cfg(test)]
    fn stamp_of(&self, entity: EntityId) -> Option<u64> {
        self.node(entity).ok()?.cache.get().map(|c| c.stamp)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    struct Fixture {
        graph: TransformGraph,
        components: ComponentStore,
    }

    impl Fixture {
        fn new() -> Self {
            let mut components = ComponentStore::new(16);
            components.register(Transform::default()).unwrap();
            Self {
                graph: TransformGraph::new(16),
                components,
            }
        }

        fn spawn(&mut self, raw: u32, position: Vec3) -> EntityId {
            let id = EntityId::from_raw(raw);
            self.graph.insert(id);
            self.components
                .insert(id, Transform::from_position(position))
                .unwrap();
            id
        }

        fn world_position(&self, id: EntityId) -> Vec3 {
            self.graph
                .global_transform(id, &self.components)
                .unwrap()
                .w_axis
                .truncate()
        }
    }

    #[test]
    fn chain_composes_translations() {
        let mut f = Fixture::new();
        let root = f.spawn(0, Vec3::X);
        let a = f.spawn(1, Vec3::Y);
        let b = f.spawn(2, Vec3::Z);
        f.graph.set_parent(a, Some(root)).unwrap();
        f.graph.set_parent(b, Some(a)).unwrap();
        assert!(f.world_position(b).abs_diff_eq(Vec3::ONE, 1e-6));
    }

    #[test]
    fn root_global_is_local() {
        let mut f = Fixture::new();
        let root = f.spawn(0, Vec3::new(3.0, 4.0, 5.0));
        let local = f.components.get::<Transform>(root).unwrap().local_matrix();
        assert_eq!(f.graph.global_transform(root, &f.components).unwrap(), local);
    }

    #[test]
    fn parent_change_propagates_to_descendants() {
        let mut f = Fixture::new();
        let root = f.spawn(0, Vec3::ZERO);
        let child = f.spawn(1, Vec3::X);
        let grandchild = f.spawn(2, Vec3::X);
        f.graph.set_parent(child, Some(root)).unwrap();
        f.graph.set_parent(grandchild, Some(child)).unwrap();
        assert!(f.world_position(grandchild).abs_diff_eq(Vec3::new(2.0, 0.0, 0.0), 1e-6));

        f.components
            .get_mut::<Transform>(root)
            .unwrap()
            .set_position(Vec3::new(0.0, 10.0, 0.0));
        assert!(f
            .world_position(grandchild)
            .abs_diff_eq(Vec3::new(2.0, 10.0, 0.0), 1e-6));
    }

    #[test]
    fn clean_reads_reuse_cache() {
        let mut f = Fixture::new();
        let root = f.spawn(0, Vec3::ZERO);
        let child = f.spawn(1, Vec3::X);
        f.graph.set_parent(child, Some(root)).unwrap();

        f.world_position(child);
        let first = f.graph.stamp_of(child);
        f.world_position(child);
        assert_eq!(f.graph.stamp_of(child), first);

        // Touching the child leaves the root cache alone.
        let root_stamp = f.graph.stamp_of(root);
        f.components.get_mut::<Transform>(child).unwrap().translate(Vec3::Y);
        f.world_position(child);
        assert_ne!(f.graph.stamp_of(child), first);
        assert_eq!(f.graph.stamp_of(root), root_stamp);
    }

    #[test]
    fn reparent_moves_child_between_lists() {
        let mut f = Fixture::new();
        let a = f.spawn(0, Vec3::ZERO);
        let b = f.spawn(1, Vec3::new(5.0, 0.0, 0.0));
        let c = f.spawn(2, Vec3::Y);
        f.graph.set_parent(c, Some(a)).unwrap();
        f.world_position(c);
        f.graph.set_parent(c, Some(b)).unwrap();
        assert!(f.graph.children(a).unwrap().is_empty());
        assert_eq!(f.graph.children(b).unwrap(), &[c]);
        assert!(f.world_position(c).abs_diff_eq(Vec3::new(5.0, 1.0, 0.0), 1e-6));

        f.graph.set_parent(c, None).unwrap();
        assert_eq!(f.graph.parent(c).unwrap(), None);
        assert!(f.world_position(c).abs_diff_eq(Vec3::Y, 1e-6));
    }

    #[test]
    fn cycles_are_rejected() {
        let mut f = Fixture::new();
        let a = f.spawn(0, Vec3::ZERO);
        let b = f.spawn(1, Vec3::ZERO);
        let c = f.spawn(2, Vec3::ZERO);
        f.graph.set_parent(b, Some(a)).unwrap();
        f.graph.set_parent(c, Some(b)).unwrap();
        assert!(matches!(
            f.graph.set_parent(a, Some(c)),
            Err(EcsError::HierarchyCycle { .. })
        ));
        assert!(matches!(
            f.graph.set_parent(a, Some(a)),
            Err(EcsError::HierarchyCycle { .. })
        ));
        assert_eq!(f.graph.parent(a).unwrap(), None);
    }

    #[test]
    fn post_order_lists_children_first() {
        let mut f = Fixture::new();
        let root = f.spawn(0, Vec3::ZERO);
        let a = f.spawn(1, Vec3::ZERO);
        let b = f.spawn(2, Vec3::ZERO);
        let a1 = f.spawn(3, Vec3::ZERO);
        f.graph.set_parent(a, Some(root)).unwrap();
        f.graph.set_parent(b, Some(root)).unwrap();
        f.graph.set_parent(a1, Some(a)).unwrap();
        assert_eq!(f.graph.subtree_post_order(root).unwrap(), vec![a1, a, b, root]);
    }

    #[test]
    fn remove_detaches_from_parent_and_orphans_children() {
        let mut f = Fixture::new();
        let root = f.spawn(0, Vec3::ZERO);
        let mid = f.spawn(1, Vec3::X);
        let leaf = f.spawn(2, Vec3::X);
        f.graph.set_parent(mid, Some(root)).unwrap();
        f.graph.set_parent(leaf, Some(mid)).unwrap();
        f.graph.remove(mid).unwrap();
        assert!(f.graph.children(root).unwrap().is_empty());
        assert_eq!(f.graph.parent(leaf).unwrap(), None);
        assert!(!f.graph.contains(mid));
        assert!(f.graph.remove(mid).is_err());
    }
}
