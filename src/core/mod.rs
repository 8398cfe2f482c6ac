//! Low-level building blocks shared by the queue and the component stores.

pub mod arena;
pub mod version;

pub use arena::Arena;
pub use version::ChangeTracker;
