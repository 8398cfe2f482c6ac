use glam::{Affine3A, EulerRot, Mat3, Mat4, Quat, Vec3};

use crate::component::{Component, ComponentId, ComponentKind};

/// Which cached matrices of a transform are out of date.
///
/// Ordered by severity, so "at least `Descendants`" is `>= Staleness::Descendants`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Staleness {
    /// Local and world matrices are valid, and so is every descendant.
    #[default]
    None,
    /// This node is valid but something below it is not.
    Descendants,
    /// Local matrix valid, world matrix stale.
    World,
    /// Both matrices stale.
    Local,
}

impl Staleness {
    #[inline]
    #[must_use]
    pub fn is_dirty(self) -> bool {
        self != Self::None
    }
}

/// Geometry + material pair carried by a mesh node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshBinding {
    pub geometry: ComponentId,
    pub material: ComponentId,
}

/// A node of the scenegraph.
///
/// Holds TRS, the cached local/world matrices and the hierarchy links. Links
/// are ids: the parent owns the membership of `children`, the child keeps a
/// non-owning back reference in `parent`.
#[derive(Debug, Clone)]
pub struct Transform {
    pub(crate) id: ComponentId,
    pub(crate) name: String,
    pub(crate) kind: ComponentKind,

    pub(crate) position: Vec3,
    pub(crate) rotation: Quat,
    pub(crate) scale: Vec3,

    pub(crate) local_matrix: Affine3A,
    pub(crate) world_matrix: Affine3A,

    pub(crate) parent: Option<ComponentId>,
    pub(crate) children: Vec<ComponentId>,
    pub(crate) stale: Staleness,

    /// Scene whose subtree this node currently sits in.
    pub(crate) scene: Option<ComponentId>,
    pub(crate) mesh: Option<MeshBinding>,
}

impl Transform {
    #[must_use]
    pub fn new(id: ComponentId, name: impl Into<String>) -> Self {
        Self::with_kind(id, name, ComponentKind::Transform)
    }

    /// New nodes start `Local`-stale so the first rebuild computes both matrices.
    #[must_use]
    pub fn with_kind(id: ComponentId, name: impl Into<String>, kind: ComponentKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            local_matrix: Affine3A::IDENTITY,
            world_matrix: Affine3A::IDENTITY,
            parent: None,
            children: Vec::new(),
            stale: Staleness::Local,
            scene: None,
            mesh: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.position
    }

    #[inline]
    #[must_use]
    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    #[inline]
    #[must_use]
    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    /// Current euler angles (XYZ order).
    #[must_use]
    pub fn rotation_euler(&self) -> Vec3 {
        let (x, y, z) = self.rotation.to_euler(EulerRot::XYZ);
        Vec3::new(x, y, z)
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<ComponentId> {
        self.parent
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[ComponentId] {
        &self.children
    }

    #[inline]
    #[must_use]
    pub fn staleness(&self) -> Staleness {
        self.stale
    }

    #[inline]
    #[must_use]
    pub fn scene(&self) -> Option<ComponentId> {
        self.scene
    }

    #[inline]
    #[must_use]
    pub fn mesh(&self) -> Option<MeshBinding> {
        self.mesh
    }

    #[inline]
    #[must_use]
    pub fn local_matrix(&self) -> &Affine3A {
        &self.local_matrix
    }

    #[inline]
    #[must_use]
    pub fn world_matrix(&self) -> &Affine3A {
        &self.world_matrix
    }

    /// World matrix as `Mat4`, for GPU upload.
    #[inline]
    #[must_use]
    pub fn world_matrix_as_mat4(&self) -> Mat4 {
        Mat4::from(self.world_matrix)
    }

    #[must_use]
    pub fn world_position(&self) -> Vec3 {
        self.world_matrix.translation.into()
    }

    pub(crate) fn compose_local(&mut self) {
        self.local_matrix = Affine3A::from_scale_rotation_translation(self.scale, self.rotation, self.position);
    }

    /// Takes a full local matrix and decomposes it back into TRS.
    ///
    /// Shear is lost in the decomposition.
    pub(crate) fn apply_local_matrix(&mut self, mat: Affine3A) {
        let (scale, rotation, translation) = mat.to_scale_rotation_translation();
        self.scale = scale;
        self.rotation = rotation;
        self.position = translation;
        self.local_matrix = mat;
    }

    /// Orientation that makes local -Z point at `target` (parent space).
    ///
    /// `None` when `target` sits on the `up` axis through `position`.
    #[must_use]
    pub fn look_at_rotation(&self, target: Vec3, up: Vec3) -> Option<Quat> {
        let forward = (target - self.position).normalize_or_zero();
        if forward.cross(up).length_squared() < 1e-4 {
            return None;
        }

        let right = forward.cross(up).normalize();
        let new_up = right.cross(forward).normalize();
        Some(Quat::from_mat3(&Mat3::from_cols(right, new_up, -forward)))
    }
}

impl Component for Transform {
    const KIND: ComponentKind = ComponentKind::Transform;

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
