//! Per-scene draw batching tables.
//!
//! - `MaterialToGeometry`: material id → geometries drawn with it
//! - `GeometryToXforms`: (geometry, material) → the instance set of transforms
//!
//! Entries are created on first use. Emptied entries are left in place and
//! skipped during iteration until [`BindingTables::compact`] prunes them.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use rustc_hash::FxHashMap;

use crate::component::ComponentId;
use crate::scene::hierarchy::TransformHierarchy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchKey {
    pub geometry: ComponentId,
    pub material: ComponentId,
}

impl BatchKey {
    #[inline]
    #[must_use]
    pub fn new(geometry: ComponentId, material: ComponentId) -> Self {
        Self { geometry, material }
    }
}

/// Per-instance data uploaded to the GPU instance buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceData {
    pub model: [[f32; 4]; 4],
    pub normal: [[f32; 4]; 4],
}

impl InstanceData {
    #[must_use]
    pub fn from_world(world: Mat4) -> Self {
        Self {
            model: world.to_cols_array_2d(),
            normal: world.inverse().transpose().to_cols_array_2d(),
        }
    }
}

/// The transforms drawn with one (geometry, material) pair, plus the cached
/// instance buffer contents built from their world matrices.
#[derive(Debug)]
pub struct InstanceBatch {
    key: BatchKey,
    members: Vec<ComponentId>,
    slots: FxHashMap<ComponentId, usize>,
    instances: Vec<InstanceData>,
    dirty: bool,
    rebuilds: u64,
}

impl InstanceBatch {
    #[must_use]
    pub fn new(key: BatchKey) -> Self {
        Self {
            key,
            members: Vec::new(),
            slots: FxHashMap::default(),
            instances: Vec::new(),
            dirty: false,
            rebuilds: 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn key(&self) -> BatchKey {
        self.key
    }

    #[inline]
    #[must_use]
    pub fn members(&self) -> &[ComponentId] {
        &self.members
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, xform: ComponentId) -> bool {
        self.slots.contains_key(&xform)
    }

    #[inline]
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Number of times the instance buffer contents were rebuilt.
    #[inline]
    #[must_use]
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds
    }

    pub fn insert(&mut self, xform: ComponentId) -> bool {
        if self.slots.contains_key(&xform) {
            return false;
        }
        self.slots.insert(xform, self.members.len());
        self.members.push(xform);
        self.dirty = true;
        true
    }

    pub fn remove(&mut self, xform: ComponentId) -> bool {
        let Some(slot) = self.slots.remove(&xform) else {
            return false;
        };
        self.members.swap_remove(slot);
        if let Some(&moved) = self.members.get(slot) {
            self.slots.insert(moved, slot);
        }
        self.dirty = true;
        true
    }

    /// A member's world matrix changed.
    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    /// Rebuilds the instance data if membership or a member's world matrix
    /// changed since the last call.
    ///
    /// Empty batches return `None` and are never rebuilt.
    pub fn refresh(&mut self, hierarchy: &TransformHierarchy) -> Option<&[InstanceData]> {
        if self.members.is_empty() {
            return None;
        }
        if self.dirty {
            self.instances.clear();
            self.instances.extend(
                self.members
                    .iter()
                    .filter_map(|&id| hierarchy.get(id))
                    .map(|t| InstanceData::from_world(t.world_matrix_as_mat4())),
            );
            self.dirty = false;
            self.rebuilds += 1;
        }
        Some(&self.instances)
    }

    /// Instance data as of the last [`refresh`](Self::refresh).
    #[must_use]
    pub fn instances(&self) -> &[InstanceData] {
        &self.instances
    }

    #[must_use]
    pub fn instance_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.instances)
    }
}

#[derive(Debug, Default)]
pub struct BindingTables {
    material_to_geometry: FxHashMap<ComponentId, Vec<ComponentId>>,
    geometry_to_xforms: FxHashMap<BatchKey, InstanceBatch>,
}

impl BindingTables {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `xform` to the instance set of (geometry, material).
    pub fn bind(&mut self, xform: ComponentId, geometry: ComponentId, material: ComponentId) -> bool {
        let key = BatchKey::new(geometry, material);

        let geometries = self.material_to_geometry.entry(material).or_default();
        if !geometries.contains(&geometry) {
            geometries.push(geometry);
        }

        self.geometry_to_xforms
            .entry(key)
            .or_insert_with(|| InstanceBatch::new(key))
            .insert(xform)
    }

    /// Removes `xform` from the instance set of (geometry, material). The
    /// emptied entry stays until the next compaction.
    pub fn unbind(&mut self, xform: ComponentId, geometry: ComponentId, material: ComponentId) -> bool {
        self.geometry_to_xforms
            .get_mut(&BatchKey::new(geometry, material))
            .is_some_and(|batch| batch.remove(xform))
    }

    /// Transforms currently drawn with (geometry, material).
    #[must_use]
    pub fn instance_set(&self, geometry: ComponentId, material: ComponentId) -> &[ComponentId] {
        self.geometry_to_xforms
            .get(&BatchKey::new(geometry, material))
            .map(InstanceBatch::members)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn batch(&self, key: BatchKey) -> Option<&InstanceBatch> {
        self.geometry_to_xforms.get(&key)
    }

    pub fn batch_mut(&mut self, key: BatchKey) -> Option<&mut InstanceBatch> {
        self.geometry_to_xforms.get_mut(&key)
    }

    pub fn invalidate(&mut self, key: BatchKey) {
        if let Some(batch) = self.geometry_to_xforms.get_mut(&key) {
            batch.invalidate();
        }
    }

    /// Materials with at least one table entry, possibly empty ones.
    pub fn materials(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.material_to_geometry.keys().copied()
    }

    #[must_use]
    pub fn geometries_for(&self, material: ComponentId) -> &[ComponentId] {
        self.material_to_geometry
            .get(&material)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn batches(&self) -> impl Iterator<Item = &InstanceBatch> {
        self.geometry_to_xforms.values()
    }

    pub fn batches_mut(&mut self) -> impl Iterator<Item = &mut InstanceBatch> {
        self.geometry_to_xforms.values_mut()
    }

    /// Number of (geometry, material) entries, empty ones included.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.geometry_to_xforms.len()
    }

    /// Drops empty instance sets and entries for which `is_live` rejects the
    /// geometry or the material. Returns the number of instance sets dropped.
    pub fn compact(&mut self, is_live: impl Fn(ComponentId) -> bool) -> usize {
        let before = self.geometry_to_xforms.len();
        self.geometry_to_xforms
            .retain(|key, batch| !batch.is_empty() && is_live(key.geometry) && is_live(key.material));

        let batches = &self.geometry_to_xforms;
        self.material_to_geometry.retain(|&material, geometries| {
            geometries.retain(|&geometry| batches.contains_key(&BatchKey::new(geometry, material)));
            !geometries.is_empty()
        });

        before - self.geometry_to_xforms.len()
    }
}
