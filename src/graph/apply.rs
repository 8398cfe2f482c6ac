//! Command application loop.

use glam::Affine3A;

use super::SceneGraph;
use crate::command::{Command, ReadQueue};
use crate::component::{ComponentId, ComponentKind};
use crate::errors::{GraphError, Result};
use crate::scene::MeshBinding;

impl SceneGraph {
    /// Drains `read` in issue order and clears it. Returns the number of
    /// commands applied, skipped ones included.
    ///
    /// Rejected or stale commands are logged and skipped; the rest of the
    /// generation still applies.
    ///
    /// # Panics
    /// On an unknown command tag or a second delete of the same id. Both mean
    /// producer and consumer disagree about the protocol.
    pub fn apply_all(&mut self, read: &mut ReadQueue) -> usize {
        let mut applied = 0;
        for decoded in read.iter() {
            let cmd = match decoded {
                Ok(cmd) => cmd,
                Err(GraphError::UnknownCommand(tag)) => {
                    log::error!("Unknown command tag {tag} in generation {}", read.generation());
                    panic!("unknown command tag {tag}");
                }
                Err(e) => {
                    log::error!("Dropping the rest of generation {}: {e}", read.generation());
                    break;
                }
            };
            self.apply_logged(cmd);
            applied += 1;
        }
        read.clear();
        applied
    }

    fn apply_logged(&mut self, cmd: Command) {
        let kind = cmd.kind();
        match self.apply(cmd) {
            Ok(()) => {}
            Err(GraphError::StaleReference(id)) => {
                if self.settings.log_stale_references {
                    log::warn!("Skipping {kind:?}: component {id} was deleted");
                }
            }
            Err(e) => log::warn!("Skipping {kind:?}: {e}"),
        }
    }

    /// Applies one command.
    ///
    /// Update commands naming an id that was never created create it first.
    /// Commands naming a deleted id return [`GraphError::StaleReference`]
    /// and change nothing.
    pub fn apply(&mut self, cmd: Command) -> Result<()> {
        match cmd {
            // === Lifecycle ===
            Command::CreateTransform { id, name } => self.create(id, ComponentKind::Transform, name),
            Command::CreateScene { id, name } => self.create(id, ComponentKind::Scene, name),
            Command::CreateShader { id, name } => self.create(id, ComponentKind::Shader, name),
            Command::CreatePass { id, name } => self.create(id, ComponentKind::Pass, name),
            Command::CreateMesh { id, name, geometry, material } => {
                self.create(id, ComponentKind::Mesh, name)?;
                self.set_mesh(id, Some(MeshBinding { geometry, material }))
            }
            Command::CreateCamera { id, name, fov_y, near, far } => {
                self.create(id, ComponentKind::Camera, name)?;
                if let Some(camera) = self.cameras.get_mut(id) {
                    camera.fov_y = fov_y;
                    camera.near = near;
                    camera.far = far;
                    camera.update_projection_matrix();
                }
                Ok(())
            }
            Command::CreateLight { id, name, kind, color, intensity } => {
                self.create(id, ComponentKind::Light, name)?;
                if let Some(light) = self.lights.get_mut(id) {
                    light.kind = kind;
                    light.color = color;
                    light.intensity = intensity;
                }
                Ok(())
            }
            Command::CreateText { id, name, text } => {
                self.create(id, ComponentKind::Text, name)?;
                self.set_text(id, text)
            }
            Command::CreateGeometry { id, name, vertex_count } => {
                self.create(id, ComponentKind::Geometry, name)?;
                if let Some(geometry) = self.geometries.get_mut(id) {
                    geometry.vertex_count = vertex_count;
                    geometry.version.changed();
                }
                Ok(())
            }
            Command::CreateMaterial { id, name, shader } => {
                self.create(id, ComponentKind::Material, name)?;
                self.set_material_shader(id, shader)
            }
            Command::CreateTexture { id, name, width, height } => {
                self.create(id, ComponentKind::Texture, name)?;
                if let Some(texture) = self.textures.get_mut(id) {
                    texture.width = width;
                    texture.height = height;
                }
                Ok(())
            }
            Command::CreateBuffer { id, name, data } => {
                self.create(id, ComponentKind::Buffer, name)?;
                self.set_buffer_data(id, data)
            }
            Command::Delete { id } => self.delete(id),
            Command::SetName { id, name } => {
                if self.registry.is_retired(id) {
                    return Err(GraphError::StaleReference(id));
                }
                self.rename(id, name)
            }

            // === Hierarchy ===
            Command::AddChild { parent, child } => {
                self.materialize(parent, ComponentKind::Transform)?;
                self.materialize(child, ComponentKind::Transform)?;
                if let Some(mv) = self.hierarchy.add_child(parent, child)? {
                    self.apply_scene_move(&mv);
                }
                Ok(())
            }
            Command::RemoveChild { parent, child } => {
                self.check_not_stale(parent)?;
                self.check_not_stale(child)?;
                if let Some(mv) = self.hierarchy.remove_child(parent, child)? {
                    self.apply_scene_move(&mv);
                }
                Ok(())
            }
            Command::RemoveAllChildren { parent } => {
                self.check_not_stale(parent)?;
                for mv in self.hierarchy.remove_all_children(parent)? {
                    self.apply_scene_move(&mv);
                }
                Ok(())
            }

            // === Transform ===
            Command::SetPosition { id, value } => {
                self.materialize(id, ComponentKind::Transform)?;
                self.hierarchy.set_position(id, value);
                Ok(())
            }
            Command::SetRotation { id, value } => {
                let length = value.length();
                if !length.is_finite() || length <= f32::EPSILON {
                    return Err(GraphError::DegenerateRotation(id));
                }
                self.materialize(id, ComponentKind::Transform)?;
                self.hierarchy.set_rotation(id, value / length);
                Ok(())
            }
            Command::SetScale { id, value } => {
                self.materialize(id, ComponentKind::Transform)?;
                self.hierarchy.set_scale(id, value);
                Ok(())
            }
            Command::SetLocalMatrix { id, matrix } => {
                self.materialize(id, ComponentKind::Transform)?;
                self.hierarchy.set_local_matrix(id, Affine3A::from_mat4(matrix));
                Ok(())
            }

            // === Mesh ===
            Command::SetMesh { xform, geometry, material } => {
                self.materialize(xform, ComponentKind::Mesh)?;
                self.set_mesh(xform, Some(MeshBinding { geometry, material }))
            }
            Command::ClearMesh { xform } => {
                self.materialize(xform, ComponentKind::Mesh)?;
                self.set_mesh(xform, None)
            }

            // === Scene ===
            Command::SetAmbient { scene, color } => {
                self.materialize(scene, ComponentKind::Scene)?;
                if let Some(scene) = self.scenes.get_mut(scene) {
                    scene.set_ambient(color);
                }
                Ok(())
            }
            Command::SetBackground { scene, color } => {
                self.materialize(scene, ComponentKind::Scene)?;
                if let Some(scene) = self.scenes.get_mut(scene) {
                    scene.set_background(color);
                }
                Ok(())
            }
            Command::SetMainCamera { scene, camera } => {
                self.materialize(scene, ComponentKind::Scene)?;
                if !camera.is_none() {
                    self.materialize(camera, ComponentKind::Camera)?;
                }
                if let Some(scene) = self.scenes.get_mut(scene) {
                    scene.set_main_camera(camera);
                }
                Ok(())
            }

            // === Resources ===
            Command::SetMaterialShader { material, shader } => {
                self.materialize(material, ComponentKind::Material)?;
                self.set_material_shader(material, shader)
            }
            Command::SetMaterialUniform { material, slot, value } => {
                self.materialize(material, ComponentKind::Material)?;
                if let Some(material) = self.materials.get_mut(material) {
                    material.set_uniform(slot, value);
                }
                Ok(())
            }
            Command::SetBufferData { buffer, data } => {
                self.materialize(buffer, ComponentKind::Buffer)?;
                self.set_buffer_data(buffer, data)
            }
            Command::SetText { id, text } => {
                self.materialize(id, ComponentKind::Text)?;
                self.set_text(id, text)
            }
            Command::SetCameraParams { id, fov_y, aspect, near, far } => {
                self.materialize(id, ComponentKind::Camera)?;
                if let Some(camera) = self.cameras.get_mut(id) {
                    camera.fov_y = fov_y;
                    camera.aspect = aspect;
                    camera.near = near;
                    camera.far = far;
                    camera.update_projection_matrix();
                }
                Ok(())
            }
            Command::SetPassTargets { pass, scene, camera, next } => {
                self.materialize(pass, ComponentKind::Pass)?;
                if let Some(pass) = self.passes.get_mut(pass) {
                    pass.scene = scene;
                    pass.camera = camera;
                    pass.next = next;
                }
                Ok(())
            }
        }
    }

    /// Create-or-update: an existing component of the same kind is renamed
    /// and otherwise left alone.
    fn create(&mut self, id: ComponentId, kind: ComponentKind, name: String) -> Result<()> {
        self.materialize(id, kind)?;
        self.rename(id, name)
    }

    fn check_not_stale(&self, id: ComponentId) -> Result<()> {
        if self.registry.is_retired(id) {
            Err(GraphError::StaleReference(id))
        } else {
            Ok(())
        }
    }

    /// Replaces the mesh binding of a transform and keeps its scene's
    /// binding tables in step.
    fn set_mesh(&mut self, xform: ComponentId, mesh: Option<MeshBinding>) -> Result<()> {
        let previous = self
            .hierarchy
            .set_mesh(xform, mesh)
            .ok_or(GraphError::ComponentNotFound(xform))?;
        if previous == mesh {
            return Ok(());
        }

        let Some(scene) = self
            .hierarchy
            .get(xform)
            .and_then(|t| t.scene())
            .and_then(|s| self.scenes.get_mut(s))
        else {
            return Ok(());
        };
        if let Some(old) = previous {
            scene.bindings.unbind(xform, old.geometry, old.material);
        }
        if let Some(new) = mesh {
            scene.bindings.bind(xform, new.geometry, new.material);
        }
        Ok(())
    }

    fn set_material_shader(&mut self, material: ComponentId, shader: ComponentId) -> Result<()> {
        if !shader.is_none() && self.registry.is_retired(shader) {
            return Err(GraphError::StaleReference(shader));
        }
        if let Some(material) = self.materials.get_mut(material)
            && material.shader != shader
        {
            material.shader = shader;
            material.version.changed();
        }
        Ok(())
    }

    fn set_buffer_data(&mut self, buffer: ComponentId, data: Vec<f32>) -> Result<()> {
        if let Some(buffer) = self.buffers.get_mut(buffer) {
            buffer.data = data;
            buffer.version.changed();
        }
        Ok(())
    }

    fn set_text(&mut self, id: ComponentId, text: String) -> Result<()> {
        if let Some(record) = self.texts.get_mut(id)
            && record.text != text
        {
            record.text = text;
            record.version.changed();
        }
        Ok(())
    }
}
