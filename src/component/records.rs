//! Render-side component records.
//!
//! The core only needs their ids, their names and the few fields the binding
//! tables and per-frame uniforms read. GPU objects built from them belong to
//! the renderer.

use glam::{Affine3A, Mat4, Vec3};

use super::{Component, ComponentId, ComponentKind};
use crate::core::version::ChangeTracker;

macro_rules! impl_component {
    ($ty:ty, $kind:ident) => {
        impl Component for $ty {
            const KIND: ComponentKind = ComponentKind::$kind;

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
    };
}

#[derive(Debug, Clone)]
pub struct Geometry {
    pub id: ComponentId,
    pub name: String,
    pub vertex_count: u32,
    pub version: ChangeTracker,
}

impl Geometry {
    #[must_use]
    pub fn new(id: ComponentId, name: impl Into<String>, vertex_count: u32) -> Self {
        Self {
            id,
            name: name.into(),
            vertex_count,
            version: ChangeTracker::new(),
        }
    }
}

impl_component!(Geometry, Geometry);

/// A shader program; materials sharing a shader share a render pipeline.
#[derive(Debug, Clone)]
pub struct Shader {
    pub id: ComponentId,
    pub name: String,
}

impl Shader {
    #[must_use]
    pub fn new(id: ComponentId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl_component!(Shader, Shader);

#[derive(Debug, Clone)]
pub struct Material {
    pub id: ComponentId,
    pub name: String,
    /// Pipeline key. `NONE` until the producer assigns one.
    pub shader: ComponentId,
    /// `(slot, value)` pairs, sorted by slot.
    uniforms: Vec<(u32, [f32; 4])>,
    /// Bumped on every uniform write; the renderer rebuilds the bind group
    /// when it sees a new version.
    pub version: ChangeTracker,
}

impl Material {
    #[must_use]
    pub fn new(id: ComponentId, name: impl Into<String>, shader: ComponentId) -> Self {
        Self {
            id,
            name: name.into(),
            shader,
            uniforms: Vec::new(),
            version: ChangeTracker::new(),
        }
    }

    pub fn set_uniform(&mut self, slot: u32, value: [f32; 4]) {
        match self.uniforms.binary_search_by_key(&slot, |&(s, _)| s) {
            Ok(i) => self.uniforms[i].1 = value,
            Err(i) => self.uniforms.insert(i, (slot, value)),
        }
        self.version.changed();
    }

    #[must_use]
    pub fn uniform(&self, slot: u32) -> Option<[f32; 4]> {
        self.uniforms
            .binary_search_by_key(&slot, |&(s, _)| s)
            .ok()
            .map(|i| self.uniforms[i].1)
    }

    #[must_use]
    pub fn uniforms(&self) -> &[(u32, [f32; 4])] {
        &self.uniforms
    }
}

impl_component!(Material, Material);

#[derive(Debug, Clone)]
pub struct Texture {
    pub id: ComponentId,
    pub name: String,
    pub width: u32,
    pub height: u32,
}

impl Texture {
    #[must_use]
    pub fn new(id: ComponentId, name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            id,
            name: name.into(),
            width,
            height,
        }
    }
}

impl_component!(Texture, Texture);

/// CPU copy of a storage buffer the producer fills with floats.
#[derive(Debug, Clone)]
pub struct Buffer {
    pub id: ComponentId,
    pub name: String,
    pub data: Vec<f32>,
    pub version: ChangeTracker,
}

impl Buffer {
    #[must_use]
    pub fn new(id: ComponentId, name: impl Into<String>, data: Vec<f32>) -> Self {
        Self {
            id,
            name: name.into(),
            data,
            version: ChangeTracker::new(),
        }
    }
}

impl_component!(Buffer, Buffer);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProjectionType {
    Perspective,
    Orthographic,
}

/// Projection data for a camera node. Its placement comes from the
/// transform with the same id.
#[derive(Debug, Clone)]
pub struct Camera {
    pub id: ComponentId,
    pub name: String,

    pub projection_type: ProjectionType,
    /// Vertical field of view, radians.
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub ortho_size: f32,

    pub(crate) world_matrix: Affine3A,
    pub(crate) view_matrix: Mat4,
    pub(crate) projection_matrix: Mat4,
}

impl Camera {
    #[must_use]
    pub fn new_perspective(id: ComponentId, name: impl Into<String>, fov_y: f32, near: f32, far: f32) -> Self {
        let mut cam = Self {
            id,
            name: name.into(),
            projection_type: ProjectionType::Perspective,
            fov_y,
            aspect: 1.0,
            near,
            far,
            ortho_size: 10.0,
            world_matrix: Affine3A::IDENTITY,
            view_matrix: Mat4::IDENTITY,
            projection_matrix: Mat4::IDENTITY,
        };
        cam.update_projection_matrix();
        cam
    }

    pub fn update_projection_matrix(&mut self) {
        self.projection_matrix = match self.projection_type {
            ProjectionType::Perspective => Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far),
            ProjectionType::Orthographic => {
                let w = self.ortho_size * self.aspect;
                let h = self.ortho_size;
                Mat4::orthographic_rh(-w, w, -h, h, self.near, self.far)
            }
        };
    }

    /// Called after the hierarchy recomputed this camera's world matrix.
    pub fn update_view(&mut self, world: &Affine3A) {
        self.world_matrix = *world;
        self.view_matrix = Mat4::from(*world).inverse();
    }

    #[inline]
    #[must_use]
    pub fn world_matrix(&self) -> &Affine3A {
        &self.world_matrix
    }

    #[inline]
    #[must_use]
    pub fn view_matrix(&self) -> Mat4 {
        self.view_matrix
    }

    #[inline]
    #[must_use]
    pub fn projection_matrix(&self) -> Mat4 {
        self.projection_matrix
    }

    #[must_use]
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix * self.view_matrix
    }
}

impl_component!(Camera, Camera);

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    Directional = 0,
    Point = 1,
    Spot = 2,
}

impl LightKind {
    #[must_use]
    pub fn from_u32(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Directional),
            1 => Some(Self::Point),
            2 => Some(Self::Spot),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Light {
    pub id: ComponentId,
    pub name: String,
    pub kind: LightKind,
    pub color: Vec3,
    pub intensity: f32,

    /// World-space position and direction, refreshed after each rebuild.
    pub(crate) position: Vec3,
    pub(crate) direction: Vec3,
}

impl Light {
    #[must_use]
    pub fn new(id: ComponentId, name: impl Into<String>, kind: LightKind, color: Vec3, intensity: f32) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            color,
            intensity,
            position: Vec3::ZERO,
            direction: Vec3::NEG_Z,
        }
    }

    pub fn update_world(&mut self, world: &Affine3A) {
        self.position = world.translation.into();
        self.direction = world.transform_vector3(Vec3::NEG_Z).normalize_or_zero();
    }

    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.position
    }

    #[must_use]
    pub fn direction(&self) -> Vec3 {
        self.direction
    }
}

impl_component!(Light, Light);

/// One render pass in the frame's pass chain.
#[derive(Debug, Clone)]
pub struct Pass {
    pub id: ComponentId,
    pub name: String,
    pub scene: ComponentId,
    pub camera: ComponentId,
    /// Next pass in the chain, `NONE` for the last.
    pub next: ComponentId,
}

impl Pass {
    #[must_use]
    pub fn new(id: ComponentId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            scene: ComponentId::NONE,
            camera: ComponentId::NONE,
            next: ComponentId::NONE,
        }
    }
}

impl_component!(Pass, Pass);

#[derive(Debug, Clone)]
pub struct Text {
    pub id: ComponentId,
    pub name: String,
    pub text: String,
    pub version: ChangeTracker,
}

impl Text {
    #[must_use]
    pub fn new(id: ComponentId, name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            text: text.into(),
            version: ChangeTracker::new(),
        }
    }
}

impl_component!(Text, Text);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn material_uniforms_sorted_and_versioned() {
        let mut m = Material::new(ComponentId(1), "m", ComponentId(2));
        let v0 = m.version.version();
        m.set_uniform(3, [1.0; 4]);
        m.set_uniform(1, [0.5; 4]);
        m.set_uniform(3, [2.0; 4]);
        assert_eq!(m.uniforms().len(), 2);
        assert_eq!(m.uniforms()[0].0, 1);
        assert_eq!(m.uniform(3), Some([2.0; 4]));
        assert_eq!(m.version.version(), v0 + 3);
    }

    #[test]
    fn camera_view_is_inverse_world() {
        let mut cam = Camera::new_perspective(ComponentId(1), "cam", 1.0, 0.1, 100.0);
        let world = Affine3A::from_translation(Vec3::new(0.0, 0.0, 5.0));
        cam.update_view(&world);
        let p = cam.view_matrix().transform_point3(Vec3::new(0.0, 0.0, 5.0));
        assert!(p.length() < 1e-5);
    }
}
