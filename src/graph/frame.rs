//! Per-frame maintenance and the renderer pull interface.
//!
//! After a generation has been applied, [`SceneGraph::prepare_frame`] brings
//! world matrices up to date and flags the instance batches they feed. The
//! renderer then pulls draws for a scene in pipeline order:
//!
//! ```text
//! shader (pipeline) → material → geometry → instance set
//! ```
//!
//! Empty instance sets, and sets whose material, shader or geometry has been
//! deleted, are skipped without touching their instance buffer.

use crate::component::ComponentId;
use crate::graph::SceneGraph;
use crate::scene::{BatchKey, InstanceData};

/// Counters of one [`SceneGraph::prepare_frame`] call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FrameStats {
    pub frame: u64,
    /// Nodes reached by the rebuild with a dirty flag.
    pub visited: usize,
    /// World matrices recomputed.
    pub recomputed: usize,
    /// Instance batches flagged for re-upload by a world-matrix change.
    pub batches_invalidated: usize,
    /// Binding entries pruned by this frame's compaction, if one ran.
    pub compacted: usize,
}

/// One instanced draw, in the order [`SceneGraph::draw_batches`] emits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCall {
    pub shader: ComponentId,
    pub material: ComponentId,
    pub geometry: ComponentId,
    pub vertex_count: u32,
    pub instance_count: u32,
}

impl DrawCall {
    #[inline]
    #[must_use]
    pub fn key(&self) -> BatchKey {
        BatchKey::new(self.geometry, self.material)
    }
}

/// GPU-side collaborator driven by [`SceneGraph::render`].
pub trait RenderBackend {
    /// Replaces the instance buffer of one (geometry, material) batch.
    fn upload_instances(&mut self, key: BatchKey, instances: &[InstanceData]);

    fn draw(&mut self, call: &DrawCall);
}

impl SceneGraph {
    /// Rebuilds every dirty world matrix, refreshes camera and light data of
    /// moved nodes, flags the instance batches of moved meshes and runs the
    /// periodic binding-table compaction.
    pub fn prepare_frame(&mut self) -> FrameStats {
        let rebuild = self.hierarchy.rebuild_dirty();
        self.frame += 1;

        let mut stats = FrameStats {
            frame: self.frame,
            visited: rebuild.visited,
            recomputed: rebuild.recomputed,
            ..FrameStats::default()
        };

        for &id in &rebuild.world_changed {
            let Some(node) = self.hierarchy.get(id) else {
                continue;
            };
            let world = node.world_matrix();

            if let Some(camera) = self.cameras.get_mut(id) {
                camera.update_view(world);
            }
            if let Some(light) = self.lights.get_mut(id) {
                light.update_world(world);
            }
            if let (Some(mesh), Some(scene)) = (node.mesh(), node.scene())
                && let Some(scene) = self.scenes.get_mut(scene)
                && let Some(batch) = scene.bindings.batch_mut(BatchKey::new(mesh.geometry, mesh.material))
                && !batch.is_dirty()
            {
                batch.invalidate();
                stats.batches_invalidated += 1;
            }
        }

        if self.settings.compaction_due(self.frame) {
            stats.compacted = self.compact();
        }

        if stats.recomputed > 0 || stats.compacted > 0 {
            log::debug!(
                "Frame {}: {} visited, {} recomputed, {} batches invalidated, {} compacted",
                stats.frame,
                stats.visited,
                stats.recomputed,
                stats.batches_invalidated,
                stats.compacted
            );
        }
        stats
    }

    /// Draws of `scene` in pipeline order. Empty or unresolvable batches are
    /// left out.
    #[must_use]
    pub fn draw_batches(&self, scene: ComponentId) -> Vec<DrawCall> {
        let Some(scene) = self.scenes.get(scene) else {
            return Vec::new();
        };
        let bindings = scene.bindings();

        let mut materials: Vec<(ComponentId, ComponentId)> = bindings
            .materials()
            .filter_map(|id| self.materials.get(id))
            .filter(|m| self.shaders.contains(m.shader))
            .map(|m| (m.shader, m.id))
            .collect();
        materials.sort_unstable();

        let mut calls = Vec::new();
        for (shader, material) in materials {
            for &geometry in bindings.geometries_for(material) {
                let Some(geo) = self.geometries.get(geometry) else {
                    continue;
                };
                let Some(batch) = bindings.batch(BatchKey::new(geometry, material)) else {
                    continue;
                };
                if batch.is_empty() {
                    continue;
                }
                calls.push(DrawCall {
                    shader,
                    material,
                    geometry,
                    vertex_count: geo.vertex_count,
                    instance_count: batch.members().len() as u32,
                });
            }
        }
        calls
    }

    /// Non-empty batches of `scene` whose instance data is out of date.
    #[must_use]
    pub fn dirty_batches(&self, scene: ComponentId) -> Vec<BatchKey> {
        let Some(scene) = self.scenes.get(scene) else {
            return Vec::new();
        };
        let mut keys: Vec<BatchKey> = scene
            .bindings()
            .batches()
            .filter(|b| !b.is_empty() && b.is_dirty())
            .map(|b| b.key())
            .collect();
        keys.sort_unstable();
        keys
    }

    /// Re-uploads stale instance data and issues every draw of `scene`.
    /// Returns the number of draws issued.
    pub fn render(&mut self, scene: ComponentId, backend: &mut impl RenderBackend) -> usize {
        let calls = self.draw_batches(scene);
        let Some(scene) = self.scenes.get_mut(scene) else {
            return 0;
        };

        for call in &calls {
            let Some(batch) = scene.bindings.batch_mut(call.key()) else {
                continue;
            };
            let stale = batch.is_dirty();
            if let Some(instances) = batch.refresh(&self.hierarchy)
                && stale
            {
                backend.upload_instances(call.key(), instances);
            }
            backend.draw(call);
        }
        calls.len()
    }
}
