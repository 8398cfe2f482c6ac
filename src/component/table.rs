use rustc_hash::FxHashMap;

use super::{Component, ComponentId};

/// Contiguous storage for one component kind.
///
/// Records live packed in a `Vec`; an `FxHashMap` maps each id to its current
/// slot. Removal swaps the last record into the freed slot and repoints the
/// moved record's index entry, so there are never holes and never compaction
/// passes.
///
/// References returned by [`get`](Self::get) are only valid until the next
/// insert or remove; hold ids across those, not references.
#[derive(Debug)]
pub struct ComponentTable<T> {
    records: Vec<T>,
    index: FxHashMap<ComponentId, usize>,
}

impl<T> Default for ComponentTable<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            index: FxHashMap::default(),
        }
    }
}

impl<T: Component> ComponentTable<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            index: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
        }
    }

    /// Stores `record` under its own id.
    ///
    /// # Panics
    /// If the id is the sentinel or already present; both mean the id
    /// allocator was bypassed.
    pub fn insert(&mut self, record: T) -> &mut T {
        let id = record.id();
        assert!(!id.is_none(), "cannot store a {:?} under the null id", T::KIND);
        assert!(
            !self.index.contains_key(&id),
            "duplicate {:?} id {id}",
            T::KIND
        );

        let slot = self.records.len();
        self.records.push(record);
        self.index.insert(id, slot);
        &mut self.records[slot]
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, id: ComponentId) -> bool {
        self.index.contains_key(&id)
    }

    #[inline]
    #[must_use]
    pub fn get(&self, id: ComponentId) -> Option<&T> {
        let &slot = self.index.get(&id)?;
        self.records.get(slot)
    }

    #[inline]
    pub fn get_mut(&mut self, id: ComponentId) -> Option<&mut T> {
        let &slot = self.index.get(&id)?;
        self.records.get_mut(slot)
    }

    /// Fetches the record for `id`, creating it with `make` first if missing.
    pub fn get_or_insert_with(&mut self, id: ComponentId, make: impl FnOnce() -> T) -> &mut T {
        if let Some(&slot) = self.index.get(&id) {
            return &mut self.records[slot];
        }
        self.insert(make())
    }

    /// Swap-removes the record for `id`.
    pub fn remove(&mut self, id: ComponentId) -> Option<T> {
        let slot = self.index.remove(&id)?;
        let removed = self.records.swap_remove(slot);

        // Whatever used to be last now sits in `slot`.
        if let Some(moved) = self.records.get(slot) {
            self.index.insert(moved.id(), slot);
        }

        Some(removed)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Storage order, which changes on removal.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.records.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.records.iter_mut()
    }

    /// Snapshot of the live ids, for loops that delete while walking.
    #[must_use]
    pub fn ids(&self) -> Vec<ComponentId> {
        self.records.iter().map(Component::id).collect()
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.index.clear();
    }
}
