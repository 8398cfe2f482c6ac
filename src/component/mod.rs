//! Component identity and storage.
//!
//! - [`ComponentId`]: stable integer id, never reused, `0` means "no component"
//! - [`IdAllocator`]: process-wide monotonically increasing id source
//! - [`ComponentTable`]: contiguous per-kind storage with an id → slot index
//! - [`ComponentRegistry`]: which kind every live id belongs to
//! - [`records`]: render-side component records (geometry, material, ...)

pub mod records;
pub mod registry;
pub mod table;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

pub use records::{Buffer, Camera, Geometry, Light, LightKind, Material, Pass, Shader, Text, Texture};
pub use registry::ComponentRegistry;
pub use table::ComponentTable;

/// Stable component id.
///
/// All cross references between components are by id and resolved through a
/// table lookup on demand; storage slots may move, ids never do.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(bytemuck::Pod, bytemuck::Zeroable)]
pub struct ComponentId(pub u64);

impl ComponentId {
    /// The "no component" sentinel.
    pub const NONE: Self = Self(0);

    #[inline]
    #[must_use]
    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    /// `None` for the sentinel, `Some(self)` otherwise.
    #[inline]
    #[must_use]
    pub fn to_option(self) -> Option<Self> {
        if self.is_none() { None } else { Some(self) }
    }

    #[inline]
    #[must_use]
    pub fn from_option(id: Option<Self>) -> Self {
        id.unwrap_or(Self::NONE)
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Component type discriminant.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Base = 0,
    Transform,
    Scene,
    Geometry,
    Shader,
    Material,
    Texture,
    Mesh,
    Camera,
    Text,
    Pass,
    Buffer,
    Light,
}

impl ComponentKind {
    /// Kinds that live in the transform hierarchy and can be parented.
    #[inline]
    #[must_use]
    pub fn is_transform_like(self) -> bool {
        matches!(
            self,
            Self::Transform | Self::Scene | Self::Mesh | Self::Camera | Self::Light | Self::Text
        )
    }
}

/// Hands out component ids.
///
/// Shared between the producer (which needs ids up front to reference
/// components in later commands of the same frame) and the render thread.
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Returns a fresh id; never [`ComponentId::NONE`], never repeated.
    pub fn allocate(&self) -> ComponentId {
        ComponentId(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// The next id that [`allocate`](Self::allocate) would return.
    #[must_use]
    pub fn peek(&self) -> ComponentId {
        ComponentId(self.next.load(Ordering::Relaxed))
    }

    /// Bumps the counter past `id`, for ids materialised by the render thread
    /// without going through this allocator.
    pub fn observe(&self, id: ComponentId) {
        self.next.fetch_max(id.0.saturating_add(1), Ordering::Relaxed);
    }
}

/// A record stored in a [`ComponentTable`].
pub trait Component {
    const KIND: ComponentKind;

    fn id(&self) -> ComponentId;

    fn name(&self) -> &str;

    fn set_name(&mut self, name: String);
}
