use bitflags::bitflags;
use glam::{Vec3, Vec4};
use rustc_hash::FxHashSet;

use crate::component::{Component, ComponentId, ComponentKind};
use crate::scene::bindings::BindingTables;

bitflags! {
    /// What changed on a scene since the renderer last looked.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct SceneChanges: u32 {
        const AMBIENT     = 1 << 0;
        const BACKGROUND  = 1 << 1;
        const MAIN_CAMERA = 1 << 2;
        const MEMBERSHIP  = 1 << 3;
    }
}

/// Scene data owned alongside the scene's root transform (same id).
///
/// Tracks which transforms currently sit under the scene root and the
/// binding tables used to batch the scene's draws.
#[derive(Debug)]
pub struct Scene {
    pub(crate) id: ComponentId,
    pub(crate) name: String,

    pub ambient: Vec3,
    pub background: Vec4,
    main_camera: ComponentId,

    transforms: FxHashSet<ComponentId>,
    pub(crate) bindings: BindingTables,

    changes: SceneChanges,
}

impl Scene {
    #[must_use]
    pub fn new(id: ComponentId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ambient: Vec3::splat(0.2),
            background: Vec4::new(0.0, 0.0, 0.0, 1.0),
            main_camera: ComponentId::NONE,
            transforms: FxHashSet::default(),
            bindings: BindingTables::new(),
            changes: SceneChanges::all(),
        }
    }

    pub fn set_ambient(&mut self, color: Vec3) {
        self.ambient = color;
        self.changes |= SceneChanges::AMBIENT;
    }

    pub fn set_background(&mut self, color: Vec4) {
        self.background = color;
        self.changes |= SceneChanges::BACKGROUND;
    }

    /// `NONE` clears the main camera.
    pub fn set_main_camera(&mut self, camera: ComponentId) {
        self.main_camera = camera;
        self.changes |= SceneChanges::MAIN_CAMERA;
    }

    #[inline]
    #[must_use]
    pub fn main_camera(&self) -> Option<ComponentId> {
        self.main_camera.to_option()
    }

    pub(crate) fn add_member(&mut self, xform: ComponentId) {
        if self.transforms.insert(xform) {
            self.changes |= SceneChanges::MEMBERSHIP;
        }
    }

    pub(crate) fn remove_member(&mut self, xform: ComponentId) {
        if self.transforms.remove(&xform) {
            self.changes |= SceneChanges::MEMBERSHIP;
        }
        if self.main_camera == xform {
            self.set_main_camera(ComponentId::NONE);
        }
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, xform: ComponentId) -> bool {
        self.transforms.contains(&xform)
    }

    #[must_use]
    pub fn member_count(&self) -> usize {
        self.transforms.len()
    }

    pub fn members(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.transforms.iter().copied()
    }

    #[inline]
    #[must_use]
    pub fn bindings(&self) -> &BindingTables {
        &self.bindings
    }

    /// Returns and resets the accumulated change flags.
    pub fn take_changes(&mut self) -> SceneChanges {
        std::mem::take(&mut self.changes)
    }
}

impl Component for Scene {
    const KIND: ComponentKind = ComponentKind::Scene;

    #[inline]
    fn id(&self) -> ComponentId {
        self.id
    }

    #[inline]
    fn name(&self) -> &str {
        &self.name
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }
}
