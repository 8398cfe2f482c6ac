//! Error Types
//!
//! This module defines the error types used throughout the scenegraph core.
//!
//! # Overview
//!
//! [`GraphError`] covers the *recoverable* failure modes:
//! - malformed or truncated command records
//! - hierarchy edits that would break the tree (cycles, re-parenting a scene)
//! - lookups of unknown ids or ids of the wrong component kind
//! - rotations that cannot be normalised
//! - references to components deleted earlier (skipped, never fatal)
//!
//! Protocol violations between the producer and the render thread (swapping an
//! undrained queue, unknown command tags, deleting a component twice) are not
//! represented here. They abort with a diagnostic instead of returning an error.
//!
//! # Usage
//!
//! ```rust,ignore
//! use avgraph::errors::{GraphError, Result};
//!
//! fn attach(graph: &mut SceneGraph, parent: ComponentId, child: ComponentId) -> Result<()> {
//!     graph.hierarchy_mut().add_child(parent, child)?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::component::{ComponentId, ComponentKind};

/// The main error type for the scenegraph core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    // ========================================================================
    // Wire Format Errors
    // ========================================================================
    /// A record header carried a tag that this build does not know.
    #[error("Unknown command tag {0} in command record")]
    UnknownCommand(u32),

    /// A record was shorter than its header claims, or pointed outside the arena.
    #[error("Malformed command record at offset {offset}: {reason}")]
    MalformedRecord {
        /// Absolute arena offset of the record header
        offset: usize,
        /// What did not add up
        reason: &'static str,
    },

    /// A string payload was not valid UTF-8.
    #[error("Invalid UTF-8 in command record at offset {0}")]
    InvalidUtf8(usize),

    // ========================================================================
    // Component Errors
    // ========================================================================
    /// No live component with this id.
    #[error("Component {0} not found")]
    ComponentNotFound(ComponentId),

    /// The id was deleted earlier. The command naming it is skipped; this is
    /// expected when a deletion and an update race across a frame boundary.
    #[error("Component {0} was deleted")]
    StaleReference(ComponentId),

    /// The id exists but belongs to another component kind.
    #[error("Component {id} is a {found:?}, expected {expected:?}")]
    KindMismatch {
        /// Offending id
        id: ComponentId,
        /// Kind the operation needed
        expected: ComponentKind,
        /// Kind the registry holds
        found: ComponentKind,
    },

    /// A rotation of zero or non-finite length cannot be normalised.
    #[error("Rotation for {0} is zero or not finite")]
    DegenerateRotation(ComponentId),

    // ========================================================================
    // Hierarchy Errors
    // ========================================================================
    /// Attaching would make a node its own ancestor.
    #[error("Cannot attach {child} under {parent}: {child} is an ancestor of {parent}")]
    HierarchyCycle {
        /// Requested parent
        parent: ComponentId,
        /// Requested child
        child: ComponentId,
    },

    /// Scenes are always roots of their hierarchy.
    #[error("Scene {0} cannot be attached as a child")]
    SceneNotAttachable(ComponentId),
}

/// Alias for `Result<T, GraphError>`.
pub type Result<T> = std::result::Result<T, GraphError>;
