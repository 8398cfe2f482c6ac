//! Scenegraph Settings
//!
//! Configuration consumed once when a [`GraphContext`](crate::context::GraphContext)
//! is built. Every field has a sensible default; override only what you need.
//!
//! ```rust,ignore
//! use avgraph::GraphSettings;
//!
//! let settings = GraphSettings {
//!     compact_interval: None,
//!     frame_wait_timeout: Some(Duration::from_millis(50)),
//!     ..Default::default()
//! };
//! ```

use std::time::Duration;

use crate::command::queue::DEFAULT_QUEUE_CAPACITY;

/// # Fields
///
/// | Field                  | Description                                  | Default  |
/// |------------------------|----------------------------------------------|----------|
/// | `queue_capacity`       | Initial byte capacity of each queue arena    | 64 KiB   |
/// | `compact_interval`     | Frames between binding-table compactions     | `600`    |
/// | `log_stale_references` | Warn when a command names a deleted id       | `true`   |
/// | `frame_wait_timeout`   | Upper bound on a producer's frame wait       | `None`   |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphSettings {
    // === Command Queue ===
    /// Bytes reserved up front for each of the two arenas. Arenas grow past
    /// this on demand and keep their peak capacity afterwards.
    pub queue_capacity: usize,

    /// How long [`Producer::wait_for_frame`](crate::context::Producer::wait_for_frame)
    /// blocks at most. `None` waits until the render thread finishes a frame.
    pub frame_wait_timeout: Option<Duration>,

    // === Scene Maintenance ===
    /// Emptied instance sets and entries naming deleted materials or
    /// geometries are pruned every this many frames. `None` never prunes;
    /// such entries are skipped during iteration either way.
    pub compact_interval: Option<u32>,

    /// Emit a `warn` record for every command skipped because it names a
    /// component deleted earlier. Such skips are expected when deletions race
    /// with updates across a frame boundary.
    pub log_stale_references: bool,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            frame_wait_timeout: None,
            compact_interval: Some(600),
            log_stale_references: true,
        }
    }
}

impl GraphSettings {
    /// Whether compaction is due after `frame` frames.
    #[inline]
    #[must_use]
    pub fn compaction_due(&self, frame: u64) -> bool {
        match self.compact_interval {
            Some(n) if n > 0 => frame % u64::from(n) == 0,
            _ => false,
        }
    }
}
