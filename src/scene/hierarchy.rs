//! Transform hierarchy and incremental matrix rebuild.
//!
//! Every mutation marks the touched node stale and walks up its ancestors,
//! turning clean ones into [`Staleness::Descendants`] and stopping at the first
//! ancestor that is already dirty. The root of every tree that holds a dirty
//! node is remembered in `dirty_roots`.
//!
//! The rebuild is an explicit-stack depth-first walk from a root:
//!
//! | flag          | action                                              |
//! |---------------|-----------------------------------------------------|
//! | `None`        | skip the whole subtree                              |
//! | `Descendants` | keep own matrices, descend                          |
//! | `World`       | `world = parent.world * local`, descend             |
//! | `Local`       | recompose `local` from TRS, then as `World`         |
//!
//! A node whose parent's world was recomputed in the same pass is treated as
//! at least `World`. Cost is proportional to the dirty nodes, their ancestors
//! and the subtrees under recomputed nodes, never to the whole tree.

use glam::{Affine3A, Quat, Vec3};
use rustc_hash::FxHashSet;

use crate::component::{ComponentId, ComponentKind, ComponentTable};
use crate::errors::{GraphError, Result};
use crate::scene::transform::{MeshBinding, Staleness, Transform};

/// Per-pass counters of a rebuild.
#[derive(Debug, Default, Clone)]
pub struct RebuildStats {
    /// Nodes whose flag was not `None` when reached (including forced ones).
    pub visited: usize,
    /// Nodes whose world matrix was recomputed.
    pub recomputed: usize,
    /// Ids of the recomputed nodes, in visit order.
    pub world_changed: Vec<ComponentId>,
}

impl RebuildStats {
    pub fn merge(&mut self, other: RebuildStats) {
        self.visited += other.visited;
        self.recomputed += other.recomputed;
        self.world_changed.extend(other.world_changed);
    }
}

/// A subtree that changed scene membership during a hierarchy edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneMove {
    pub from: Option<ComponentId>,
    pub to: Option<ComponentId>,
    /// Every node of the moved subtree, root first.
    pub nodes: Vec<ComponentId>,
}

/// Result of deleting a node from the hierarchy.
#[derive(Debug)]
pub struct RemovedTransform {
    pub transform: Transform,
    /// Former children, now unparented, leaving the scene with their subtrees.
    pub orphaned: Vec<SceneMove>,
}

#[derive(Debug, Default)]
pub struct TransformHierarchy {
    nodes: ComponentTable<Transform>,
    dirty_roots: FxHashSet<ComponentId>,
    stack: Vec<(ComponentId, Affine3A, bool)>,
}

impl TransformHierarchy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Storage
    // ========================================================================

    /// Adds an unparented node. A node of kind `Scene` belongs to itself.
    pub fn create(&mut self, id: ComponentId, name: impl Into<String>, kind: ComponentKind) -> &mut Transform {
        let mut node = Transform::with_kind(id, name, kind);
        if kind == ComponentKind::Scene {
            node.scene = Some(id);
        }
        self.dirty_roots.insert(id);
        self.nodes.insert(node)
    }

    #[inline]
    #[must_use]
    pub fn get(&self, id: ComponentId) -> Option<&Transform> {
        self.nodes.get(id)
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, id: ComponentId) -> Option<&mut Transform> {
        self.nodes.get_mut(id)
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, id: ComponentId) -> bool {
        self.nodes.contains(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transform> {
        self.nodes.iter()
    }

    #[must_use]
    pub fn world_matrix(&self, id: ComponentId) -> Option<&Affine3A> {
        self.nodes.get(id).map(Transform::world_matrix)
    }

    #[must_use]
    pub fn local_matrix(&self, id: ComponentId) -> Option<&Affine3A> {
        self.nodes.get(id).map(Transform::local_matrix)
    }

    #[must_use]
    pub fn staleness(&self, id: ComponentId) -> Option<Staleness> {
        self.nodes.get(id).map(Transform::staleness)
    }

    /// Roots with pending work, in no particular order.
    pub fn dirty_roots(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.dirty_roots.iter().copied()
    }

    /// Deletes `id`. Its children become unparented roots.
    pub fn remove(&mut self, id: ComponentId) -> Option<RemovedTransform> {
        let parent = self.nodes.get(id)?.parent;
        if let Some(parent) = parent {
            self.unlink(parent, id);
            self.mark_stale(parent, Staleness::Descendants);
        }

        let children = self.nodes.get(id).map(|n| n.children.clone()).unwrap_or_default();
        let mut orphaned = Vec::with_capacity(children.len());
        for child in children {
            if let Some(mv) = self.detach(id, child) {
                orphaned.push(mv);
            }
        }

        self.dirty_roots.remove(&id);
        let transform = self.nodes.remove(id)?;
        Some(RemovedTransform { transform, orphaned })
    }

    // ========================================================================
    // Hierarchy edits
    // ========================================================================

    /// True if `ancestor` sits on the parent chain of `id`.
    #[must_use]
    pub fn is_ancestor(&self, ancestor: ComponentId, id: ComponentId) -> bool {
        self.ancestors(id).any(|a| a == ancestor)
    }

    /// Parent chain of `id`, nearest first.
    pub fn ancestors(&self, id: ComponentId) -> impl Iterator<Item = ComponentId> + '_ {
        std::iter::successors(self.nodes.get(id).and_then(|n| n.parent), move |&cur| {
            self.nodes.get(cur).and_then(|n| n.parent)
        })
    }

    #[must_use]
    pub fn depth(&self, id: ComponentId) -> usize {
        self.ancestors(id).count()
    }

    /// Subtree of `id` in depth-first pre-order, `id` first.
    #[must_use]
    pub fn descendants(&self, id: ComponentId) -> Vec<ComponentId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            let Some(node) = self.nodes.get(cur) else {
                continue;
            };
            out.push(cur);
            stack.extend(node.children.iter().rev());
        }
        out
    }

    /// Makes `child` the last child of `parent`, detaching it from any
    /// previous parent first.
    ///
    /// Returns the scene membership change of the moved subtree, if any.
    pub fn add_child(&mut self, parent: ComponentId, child: ComponentId) -> Result<Option<SceneMove>> {
        let parent_node = self.nodes.get(parent).ok_or(GraphError::ComponentNotFound(parent))?;
        let child_node = self.nodes.get(child).ok_or(GraphError::ComponentNotFound(child))?;

        if child_node.kind == ComponentKind::Scene {
            return Err(GraphError::SceneNotAttachable(child));
        }
        if parent == child || self.is_ancestor(child, parent) {
            return Err(GraphError::HierarchyCycle { parent, child });
        }
        if child_node.parent == Some(parent) {
            return Ok(None);
        }

        let target_scene = parent_node.scene;
        let old_parent = child_node.parent;

        if let Some(old) = old_parent {
            self.unlink(old, child);
            self.mark_stale(old, Staleness::Descendants);
        }

        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.push(child);
        }
        if let Some(c) = self.nodes.get_mut(child) {
            c.parent = Some(parent);
            c.stale = Staleness::Local;
        }
        self.dirty_roots.remove(&child);
        self.propagate_up(Some(parent), child);

        Ok(self.move_to_scene(child, target_scene))
    }

    /// Detaches `child` from `parent`. The child keeps its subtree, becomes a
    /// root and leaves the scene.
    ///
    /// Returns `Ok(None)` when `child` is not a child of `parent`.
    pub fn remove_child(&mut self, parent: ComponentId, child: ComponentId) -> Result<Option<SceneMove>> {
        if !self.nodes.contains(parent) {
            return Err(GraphError::ComponentNotFound(parent));
        }
        let child_node = self.nodes.get(child).ok_or(GraphError::ComponentNotFound(child))?;
        if child_node.parent != Some(parent) {
            return Ok(None);
        }

        self.unlink(parent, child);
        self.mark_stale(parent, Staleness::Descendants);
        Ok(self.detach(parent, child))
    }

    /// Detaches every child of `parent`.
    pub fn remove_all_children(&mut self, parent: ComponentId) -> Result<Vec<SceneMove>> {
        let children = self
            .nodes
            .get(parent)
            .ok_or(GraphError::ComponentNotFound(parent))?
            .children
            .clone();

        let mut moves = Vec::new();
        for child in children {
            if let Some(mv) = self.remove_child(parent, child)? {
                moves.push(mv);
            }
        }
        Ok(moves)
    }

    fn unlink(&mut self, parent: ComponentId, child: ComponentId) {
        if let Some(p) = self.nodes.get_mut(parent)
            && let Some(i) = p.children.iter().position(|&c| c == child)
        {
            p.children.remove(i);
        }
    }

    /// Turns `child` (already unlinked from `parent`'s list) into a root.
    fn detach(&mut self, parent: ComponentId, child: ComponentId) -> Option<SceneMove> {
        let node = self.nodes.get_mut(child)?;
        debug_assert_eq!(node.parent, Some(parent));
        node.parent = None;
        node.stale = Staleness::Local;
        self.dirty_roots.insert(child);
        self.move_to_scene(child, None)
    }

    /// Sets the scene of the whole subtree under `root`.
    fn move_to_scene(&mut self, root: ComponentId, to: Option<ComponentId>) -> Option<SceneMove> {
        let from = self.nodes.get(root)?.scene;
        if from == to {
            return None;
        }

        let nodes = self.descendants(root);
        for &id in &nodes {
            if let Some(n) = self.nodes.get_mut(id) {
                n.scene = to;
            }
        }
        Some(SceneMove { from, to, nodes })
    }

    // ========================================================================
    // Local TRS
    // ========================================================================

    pub fn set_position(&mut self, id: ComponentId, position: Vec3) -> bool {
        self.edit(id, |t| t.position = position)
    }

    pub fn set_rotation(&mut self, id: ComponentId, rotation: Quat) -> bool {
        self.edit(id, |t| t.rotation = rotation)
    }

    pub fn set_scale(&mut self, id: ComponentId, scale: Vec3) -> bool {
        self.edit(id, |t| t.scale = scale)
    }

    /// Adds `delta` to the local position.
    pub fn translate(&mut self, id: ComponentId, delta: Vec3) -> bool {
        self.edit(id, |t| t.position += delta)
    }

    /// Applies `rotation` on top of the current local rotation.
    pub fn rotate(&mut self, id: ComponentId, rotation: Quat) -> bool {
        self.edit(id, |t| t.rotation = (rotation * t.rotation).normalize())
    }

    /// Points local -Z at `target`, given in the parent's space.
    pub fn look_at(&mut self, id: ComponentId, target: Vec3, up: Vec3) -> bool {
        let Some(rotation) = self.nodes.get(id).and_then(|t| t.look_at_rotation(target, up)) else {
            return false;
        };
        self.set_rotation(id, rotation)
    }

    /// Replaces TRS by decomposing `matrix`.
    pub fn set_local_matrix(&mut self, id: ComponentId, matrix: Affine3A) -> bool {
        self.edit(id, |t| t.apply_local_matrix(matrix))
    }

    pub(crate) fn set_mesh(&mut self, id: ComponentId, mesh: Option<MeshBinding>) -> Option<Option<MeshBinding>> {
        let node = self.nodes.get_mut(id)?;
        Some(std::mem::replace(&mut node.mesh, mesh))
    }

    fn edit(&mut self, id: ComponentId, f: impl FnOnce(&mut Transform)) -> bool {
        let Some(node) = self.nodes.get_mut(id) else {
            return false;
        };
        f(node);
        self.mark_stale(id, Staleness::Local);
        true
    }

    // ========================================================================
    // Staleness propagation
    // ========================================================================

    /// Raises `id` to at least `level` and makes every ancestor at least
    /// `Descendants`.
    pub fn mark_stale(&mut self, id: ComponentId, level: Staleness) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        node.stale = node.stale.max(level);
        let parent = node.parent;
        self.propagate_up(parent, id);
    }

    /// Walks up from `start`, turning clean ancestors into `Descendants`.
    /// Stops at the first already-dirty one; if the walk reaches the top,
    /// records that root as dirty.
    fn propagate_up(&mut self, start: Option<ComponentId>, origin: ComponentId) {
        let mut top = origin;
        let mut cursor = start;
        while let Some(id) = cursor {
            let Some(node) = self.nodes.get_mut(id) else {
                break;
            };
            if node.stale.is_dirty() {
                return;
            }
            node.stale = Staleness::Descendants;
            top = id;
            cursor = node.parent;
        }
        self.dirty_roots.insert(top);
    }

    // ========================================================================
    // Rebuild
    // ========================================================================

    /// Brings the subtree under `root` up to date.
    ///
    /// If `root` has a parent, that parent's current world matrix is used as is.
    pub fn rebuild_matrices(&mut self, root: ComponentId) -> RebuildStats {
        let mut stats = RebuildStats::default();
        self.rebuild_into(root, &mut stats);
        if self.nodes.get(root).is_some_and(|n| n.parent.is_none()) {
            self.dirty_roots.remove(&root);
        }
        stats
    }

    /// Rebuilds every tree that holds a dirty node.
    pub fn rebuild_dirty(&mut self) -> RebuildStats {
        let mut stats = RebuildStats::default();
        let roots: Vec<ComponentId> = self.dirty_roots.drain().collect();
        for root in roots {
            // Reparented since it was recorded; its new root is in the set.
            if self.nodes.get(root).is_some_and(|n| n.parent.is_none()) {
                self.rebuild_into(root, &mut stats);
            }
        }
        stats
    }

    fn rebuild_into(&mut self, root: ComponentId, stats: &mut RebuildStats) {
        let Some(root_node) = self.nodes.get(root) else {
            return;
        };
        let root_parent_world = root_node
            .parent
            .and_then(|p| self.nodes.get(p))
            .map_or(Affine3A::IDENTITY, |p| p.world_matrix);

        let mut stack = std::mem::take(&mut self.stack);
        stack.push((root, root_parent_world, false));

        while let Some((id, parent_world, parent_changed)) = stack.pop() {
            let Some(node) = self.nodes.get_mut(id) else {
                continue;
            };

            let mut level = node.stale;
            if parent_changed {
                level = level.max(Staleness::World);
            }

            let world_changed = match level {
                Staleness::None => continue,
                Staleness::Descendants => false,
                Staleness::World => {
                    node.world_matrix = parent_world * node.local_matrix;
                    true
                }
                Staleness::Local => {
                    node.compose_local();
                    node.world_matrix = parent_world * node.local_matrix;
                    true
                }
            };

            node.stale = Staleness::None;
            stats.visited += 1;
            if world_changed {
                stats.recomputed += 1;
                stats.world_changed.push(id);
            }

            let world = node.world_matrix;
            for &child in node.children.iter().rev() {
                stack.push((child, world, world_changed));
            }
        }

        self.stack = stack;
    }
}
