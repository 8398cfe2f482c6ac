use rustc_hash::{FxHashMap, FxHashSet};

use super::{ComponentId, ComponentKind};
use crate::errors::{GraphError, Result};

/// Tracks the kind of every live id and remembers retired ones.
///
/// Retired ids let the render thread tell "deleted earlier" (a stale reference,
/// skipped) apart from "deleted twice" (a protocol violation, fatal).
///
/// The retired set is never pruned: it costs one hash-set entry per deleted
/// id for the lifetime of the session. See [`retired_count`](Self::retired_count).
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    live: FxHashMap<ComponentId, ComponentKind>,
    retired: FxHashSet<ComponentId>,
}

impl ComponentRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `id` as a live component of `kind`.
    ///
    /// Returns `false` if the id was retired; retired ids are never revived.
    pub fn register(&mut self, id: ComponentId, kind: ComponentKind) -> bool {
        if self.retired.contains(&id) {
            return false;
        }
        let previous = self.live.insert(id, kind);
        debug_assert!(
            previous.is_none() || previous == Some(kind),
            "id {id} re-registered as {kind:?} (was {previous:?})"
        );
        true
    }

    #[inline]
    #[must_use]
    pub fn kind_of(&self, id: ComponentId) -> Option<ComponentKind> {
        self.live.get(&id).copied()
    }

    #[inline]
    #[must_use]
    pub fn is_live(&self, id: ComponentId) -> bool {
        self.live.contains_key(&id)
    }

    #[inline]
    #[must_use]
    pub fn is_retired(&self, id: ComponentId) -> bool {
        self.retired.contains(&id)
    }

    /// Checks that `id` is live and of kind `expected`.
    pub fn expect_kind(&self, id: ComponentId, expected: ComponentKind) -> Result<()> {
        match self.kind_of(id) {
            Some(found) if found == expected => Ok(()),
            Some(found) => Err(GraphError::KindMismatch { id, expected, found }),
            None => Err(GraphError::ComponentNotFound(id)),
        }
    }

    /// Moves `id` from live to retired and returns its kind.
    ///
    /// Returns `None` for ids that were never registered.
    ///
    /// # Panics
    /// If `id` was already retired: a double delete means producer and
    /// consumer disagree about component lifetimes.
    pub fn retire(&mut self, id: ComponentId) -> Option<ComponentKind> {
        if self.retired.contains(&id) {
            log::error!("Component {id} deleted twice");
            panic!("double delete of component {id}");
        }
        let kind = self.live.remove(&id)?;
        self.retired.insert(id);
        Some(kind)
    }

    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Deleted ids remembered for stale-reference and double-delete checks.
    #[must_use]
    pub fn retired_count(&self) -> usize {
        self.retired.len()
    }

    /// Live ids of `kind`, in no particular order.
    pub fn ids_of(&self, kind: ComponentKind) -> impl Iterator<Item = ComponentId> + '_ {
        self.live
            .iter()
            .filter(move |&(_, &k)| k == kind)
            .map(|(&id, _)| id)
    }
}
