#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

//! Retained scenegraph core for a real-time audiovisual engine.
//!
//! A producer thread describes scene changes as [`Command`]s pushed into a
//! double-buffered [`CommandQueue`]. Once per frame the render thread swaps
//! the queue, applies the generation to its [`SceneGraph`], rebuilds only the
//! world matrices that went stale and pulls instanced draws batched by
//! (geometry, material).

pub mod command;
pub mod component;
pub mod context;
pub mod core;
pub mod errors;
pub mod graph;
pub mod scene;
pub mod settings;

pub use command::{Command, CommandKind, CommandQueue, FrameSync, ReadQueue};
pub use component::{ComponentId, ComponentKind, ComponentRegistry, ComponentTable, IdAllocator};
pub use context::{FrameReport, GraphContext, Producer, RenderFrame};
pub use errors::{GraphError, Result};
pub use graph::{DrawCall, FrameStats, RenderBackend, SceneGraph};
pub use scene::{BatchKey, InstanceData, Scene, Staleness, Transform, TransformHierarchy};
pub use settings::GraphSettings;
