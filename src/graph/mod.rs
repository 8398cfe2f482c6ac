//! Render-thread scene state.
//!
//! [`SceneGraph`] owns every component table, the transform hierarchy and the
//! per-scene binding tables. It is only ever touched by the thread that drains
//! the command queue; the producer describes changes as commands and never
//! sees this state.

mod apply;
mod frame;

use glam::{Mat4, Vec3};

use crate::component::{
    Buffer, Camera, Component, ComponentId, ComponentKind, ComponentRegistry, ComponentTable, Geometry, Light,
    LightKind, Material, Pass, Shader, Text, Texture,
};
use crate::errors::{GraphError, Result};
use crate::scene::{Scene, SceneMove, Transform, TransformHierarchy};
use crate::settings::GraphSettings;

pub use frame::{DrawCall, FrameStats, RenderBackend};

/// Field-of-view given to cameras materialised by an update command.
const DEFAULT_FOV_Y: f32 = std::f32::consts::FRAC_PI_4;
const DEFAULT_NEAR: f32 = 0.1;
const DEFAULT_FAR: f32 = 1000.0;

#[derive(Debug, Default)]
pub struct SceneGraph {
    settings: GraphSettings,
    registry: ComponentRegistry,
    hierarchy: TransformHierarchy,

    scenes: ComponentTable<Scene>,
    cameras: ComponentTable<Camera>,
    lights: ComponentTable<Light>,
    texts: ComponentTable<Text>,

    geometries: ComponentTable<Geometry>,
    shaders: ComponentTable<Shader>,
    materials: ComponentTable<Material>,
    textures: ComponentTable<Texture>,
    buffers: ComponentTable<Buffer>,
    passes: ComponentTable<Pass>,

    frame: u64,
}

impl SceneGraph {
    #[must_use]
    pub fn new(settings: GraphSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &GraphSettings {
        &self.settings
    }

    #[inline]
    #[must_use]
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    #[inline]
    #[must_use]
    pub fn hierarchy(&self) -> &TransformHierarchy {
        &self.hierarchy
    }

    /// Direct hierarchy access for callers that drive the graph without the
    /// command queue (tools, tests). Registry bookkeeping is not updated.
    #[inline]
    pub fn hierarchy_mut(&mut self) -> &mut TransformHierarchy {
        &mut self.hierarchy
    }

    /// Frames prepared so far.
    #[inline]
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.frame
    }

    #[must_use]
    pub fn kind_of(&self, id: ComponentId) -> Option<ComponentKind> {
        self.registry.kind_of(id)
    }

    #[must_use]
    pub fn is_live(&self, id: ComponentId) -> bool {
        self.registry.is_live(id)
    }

    #[must_use]
    pub fn transform(&self, id: ComponentId) -> Option<&Transform> {
        self.hierarchy.get(id)
    }

    #[must_use]
    pub fn scene(&self, id: ComponentId) -> Option<&Scene> {
        self.scenes.get(id)
    }

    pub fn scenes(&self) -> impl Iterator<Item = &Scene> {
        self.scenes.iter()
    }

    #[must_use]
    pub fn camera(&self, id: ComponentId) -> Option<&Camera> {
        self.cameras.get(id)
    }

    #[must_use]
    pub fn light(&self, id: ComponentId) -> Option<&Light> {
        self.lights.get(id)
    }

    pub fn lights(&self) -> impl Iterator<Item = &Light> {
        self.lights.iter()
    }

    #[must_use]
    pub fn text(&self, id: ComponentId) -> Option<&Text> {
        self.texts.get(id)
    }

    #[must_use]
    pub fn geometry(&self, id: ComponentId) -> Option<&Geometry> {
        self.geometries.get(id)
    }

    #[must_use]
    pub fn shader(&self, id: ComponentId) -> Option<&Shader> {
        self.shaders.get(id)
    }

    #[must_use]
    pub fn material(&self, id: ComponentId) -> Option<&Material> {
        self.materials.get(id)
    }

    #[must_use]
    pub fn texture(&self, id: ComponentId) -> Option<&Texture> {
        self.textures.get(id)
    }

    #[must_use]
    pub fn buffer(&self, id: ComponentId) -> Option<&Buffer> {
        self.buffers.get(id)
    }

    #[must_use]
    pub fn pass(&self, id: ComponentId) -> Option<&Pass> {
        self.passes.get(id)
    }

    /// Display name of any live component.
    #[must_use]
    pub fn name_of(&self, id: ComponentId) -> Option<&str> {
        match self.registry.kind_of(id)? {
            kind if kind.is_transform_like() => self.hierarchy.get(id).map(Component::name),
            ComponentKind::Geometry => self.geometries.get(id).map(Component::name),
            ComponentKind::Shader => self.shaders.get(id).map(Component::name),
            ComponentKind::Material => self.materials.get(id).map(Component::name),
            ComponentKind::Texture => self.textures.get(id).map(Component::name),
            ComponentKind::Buffer => self.buffers.get(id).map(Component::name),
            ComponentKind::Pass => self.passes.get(id).map(Component::name),
            _ => None,
        }
    }

    /// Camera world matrix as refreshed by the last [`prepare_frame`](Self::prepare_frame).
    #[must_use]
    pub fn camera_world(&self, id: ComponentId) -> Option<Mat4> {
        self.cameras.get(id).map(|c| Mat4::from(*c.world_matrix()))
    }

    /// World-space position and direction of a light.
    #[must_use]
    pub fn light_world(&self, id: ComponentId) -> Option<(Vec3, Vec3)> {
        self.lights.get(id).map(|l| (l.position(), l.direction()))
    }

    /// Passes reachable from `start` through `next` links, in chain order.
    /// Stops at the first deleted pass or at a loop.
    #[must_use]
    pub fn pass_chain(&self, start: ComponentId) -> Vec<ComponentId> {
        let mut chain = Vec::new();
        let mut cursor = start;
        while let Some(pass) = self.passes.get(cursor) {
            if chain.contains(&cursor) {
                log::warn!("Pass chain starting at {start} loops back to {cursor}");
                break;
            }
            chain.push(cursor);
            cursor = pass.next;
        }
        chain
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Makes sure `id` is a live component compatible with `wanted`, creating
    /// a default record when the id has never been seen.
    ///
    /// `Transform` and `Mesh` accept any transform-like node; other kinds
    /// must match exactly.
    fn materialize(&mut self, id: ComponentId, wanted: ComponentKind) -> Result<()> {
        if id.is_none() {
            return Err(GraphError::ComponentNotFound(id));
        }
        if self.registry.is_retired(id) {
            return Err(GraphError::StaleReference(id));
        }

        match self.registry.kind_of(id) {
            Some(found) if found == wanted => Ok(()),
            Some(found)
                if matches!(wanted, ComponentKind::Transform | ComponentKind::Mesh) && found.is_transform_like() =>
            {
                Ok(())
            }
            Some(found) => Err(GraphError::KindMismatch {
                id,
                expected: wanted,
                found,
            }),
            None => {
                self.spawn(id, wanted);
                Ok(())
            }
        }
    }

    fn spawn(&mut self, id: ComponentId, kind: ComponentKind) {
        match kind {
            ComponentKind::Base | ComponentKind::Transform => {
                self.hierarchy.create(id, "", ComponentKind::Transform);
            }
            ComponentKind::Mesh => {
                self.hierarchy.create(id, "", ComponentKind::Mesh);
            }
            ComponentKind::Scene => {
                self.hierarchy.create(id, "", ComponentKind::Scene);
                self.scenes.insert(Scene::new(id, ""));
            }
            ComponentKind::Camera => {
                self.hierarchy.create(id, "", ComponentKind::Camera);
                self.cameras
                    .insert(Camera::new_perspective(id, "", DEFAULT_FOV_Y, DEFAULT_NEAR, DEFAULT_FAR));
            }
            ComponentKind::Light => {
                self.hierarchy.create(id, "", ComponentKind::Light);
                self.lights
                    .insert(Light::new(id, "", LightKind::Point, Vec3::ONE, 1.0));
            }
            ComponentKind::Text => {
                self.hierarchy.create(id, "", ComponentKind::Text);
                self.texts.insert(Text::new(id, "", ""));
            }
            ComponentKind::Geometry => {
                self.geometries.insert(Geometry::new(id, "", 0));
            }
            ComponentKind::Shader => {
                self.shaders.insert(Shader::new(id, ""));
            }
            ComponentKind::Material => {
                self.materials.insert(Material::new(id, "", ComponentId::NONE));
            }
            ComponentKind::Texture => {
                self.textures.insert(Texture::new(id, "", 0, 0));
            }
            ComponentKind::Buffer => {
                self.buffers.insert(Buffer::new(id, "", Vec::new()));
            }
            ComponentKind::Pass => {
                self.passes.insert(Pass::new(id, ""));
            }
        }
        let kind = if kind == ComponentKind::Base { ComponentKind::Transform } else { kind };
        self.registry.register(id, kind);
        log::trace!("Materialised {kind:?} {id}");
    }

    fn rename(&mut self, id: ComponentId, name: String) -> Result<()> {
        let kind = self.registry.kind_of(id).ok_or(GraphError::ComponentNotFound(id))?;
        if kind.is_transform_like() {
            match kind {
                ComponentKind::Scene => set_name(&mut self.scenes, id, name.clone()),
                ComponentKind::Camera => set_name(&mut self.cameras, id, name.clone()),
                ComponentKind::Light => set_name(&mut self.lights, id, name.clone()),
                ComponentKind::Text => set_name(&mut self.texts, id, name.clone()),
                _ => {}
            }
            if let Some(node) = self.hierarchy.get_mut(id) {
                node.set_name(name);
            }
            return Ok(());
        }

        match kind {
            ComponentKind::Geometry => set_name(&mut self.geometries, id, name),
            ComponentKind::Shader => set_name(&mut self.shaders, id, name),
            ComponentKind::Material => set_name(&mut self.materials, id, name),
            ComponentKind::Texture => set_name(&mut self.textures, id, name),
            ComponentKind::Buffer => set_name(&mut self.buffers, id, name),
            ComponentKind::Pass => set_name(&mut self.passes, id, name),
            _ => {}
        }
        Ok(())
    }

    /// Deletes `id` and everything that hangs off it directly.
    ///
    /// Children of a deleted node become unparented roots. Binding-table
    /// entries naming a deleted geometry or material are left for lazy skip.
    ///
    /// # Panics
    /// If `id` was already deleted.
    fn delete(&mut self, id: ComponentId) -> Result<()> {
        let Some(kind) = self.registry.retire(id) else {
            return Err(GraphError::ComponentNotFound(id));
        };

        if kind.is_transform_like()
            && let Some(removed) = self.hierarchy.remove(id)
        {
            let node = &removed.transform;
            if let Some(scene_id) = node.scene
                && scene_id != id
                && let Some(scene) = self.scenes.get_mut(scene_id)
            {
                scene.remove_member(id);
                if let Some(mesh) = node.mesh {
                    scene.bindings.unbind(id, mesh.geometry, mesh.material);
                }
            }
            for mv in removed.orphaned {
                self.apply_scene_move(&mv);
            }
        }

        match kind {
            ComponentKind::Scene => {
                self.scenes.remove(id);
            }
            ComponentKind::Camera => {
                self.cameras.remove(id);
                for scene in self.scenes.iter_mut() {
                    if scene.main_camera() == Some(id) {
                        scene.set_main_camera(ComponentId::NONE);
                    }
                }
            }
            ComponentKind::Light => {
                self.lights.remove(id);
            }
            ComponentKind::Text => {
                self.texts.remove(id);
            }
            ComponentKind::Geometry => {
                self.geometries.remove(id);
            }
            ComponentKind::Shader => {
                self.shaders.remove(id);
            }
            ComponentKind::Material => {
                self.materials.remove(id);
            }
            ComponentKind::Texture => {
                self.textures.remove(id);
            }
            ComponentKind::Buffer => {
                self.buffers.remove(id);
            }
            ComponentKind::Pass => {
                self.passes.remove(id);
            }
            ComponentKind::Base | ComponentKind::Transform | ComponentKind::Mesh => {}
        }

        log::trace!("Deleted {kind:?} {id}");
        Ok(())
    }

    /// Moves scene membership and mesh bindings along with a re-homed subtree.
    fn apply_scene_move(&mut self, mv: &SceneMove) {
        for &node_id in &mv.nodes {
            let mesh = self.hierarchy.get(node_id).and_then(Transform::mesh);

            if let Some(scene) = mv.from.and_then(|s| self.scenes.get_mut(s)) {
                scene.remove_member(node_id);
                if let Some(mesh) = mesh {
                    scene.bindings.unbind(node_id, mesh.geometry, mesh.material);
                }
            }
            if let Some(scene) = mv.to.and_then(|s| self.scenes.get_mut(s)) {
                scene.add_member(node_id);
                if let Some(mesh) = mesh {
                    scene.bindings.bind(node_id, mesh.geometry, mesh.material);
                }
            }
        }
    }

    /// Drops emptied instance sets and entries naming deleted components in
    /// every scene. Returns the number of instance sets dropped.
    ///
    /// Ids not created yet count as alive: a mesh may be bound to a geometry
    /// or material whose create command arrives in a later generation.
    pub fn compact(&mut self) -> usize {
        let registry = &self.registry;
        let dropped: usize = self
            .scenes
            .iter_mut()
            .map(|scene| scene.bindings.compact(|id| !registry.is_retired(id)))
            .sum();
        if dropped > 0 {
            log::debug!("Compacted {dropped} binding entries");
        }
        dropped
    }
}

fn set_name<T: Component>(table: &mut ComponentTable<T>, id: ComponentId, name: String) {
    if let Some(record) = table.get_mut(id) {
        record.set_name(name);
    }
}
