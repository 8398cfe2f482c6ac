//! Scenegraph
//!
//! - [`Transform`]: TRS, cached matrices, staleness flag, hierarchy links
//! - [`TransformHierarchy`]: parent/child edits and the incremental rebuild
//! - [`Scene`]: scene settings, membership and binding tables
//! - [`BindingTables`]: (geometry, material) → instance sets for batched draws

pub mod bindings;
pub mod hierarchy;
#[allow(clippy::module_inception)]
pub mod scene;
pub mod transform;

pub use bindings::{BatchKey, BindingTables, InstanceBatch, InstanceData};
pub use hierarchy::{RebuildStats, RemovedTransform, SceneMove, TransformHierarchy};
pub use scene::{Scene, SceneChanges};
pub use transform::{MeshBinding, Staleness, Transform};
