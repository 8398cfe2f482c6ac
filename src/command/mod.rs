//! Cross-thread command protocol.
//!
//! The producer (script/audio thread) never touches component storage. It
//! describes every scene mutation as a [`Command`], which is serialised into
//! the write arena of the [`CommandQueue`]. Once per frame the render thread
//! swaps arenas, decodes the frozen generation in issue order and applies it.
//!
//! ```text
//! producer ──push──► [write arena] ─┐
//!                                   │ swap (once per frame, under lock)
//! render   ◄──iter── [read arena]  ◄┘ ──apply──► SceneGraph
//! ```

pub mod codec;
pub mod queue;
pub mod sync;

use glam::{Mat4, Quat, Vec3, Vec4};

use crate::component::{ComponentId, LightKind};

pub use codec::{RecordHeader, decode, encode};
pub use queue::{CommandQueue, ReadQueue, ReadQueueIter};
pub use sync::FrameSync;

/// Wire tag of each command record. Stable within a build only.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    CreateTransform = 1,
    CreateScene,
    CreateMesh,
    CreateCamera,
    CreateLight,
    CreateText,
    CreateGeometry,
    CreateShader,
    CreateMaterial,
    CreateTexture,
    CreateBuffer,
    CreatePass,
    Delete,
    SetName,
    AddChild,
    RemoveChild,
    RemoveAllChildren,
    SetPosition,
    SetRotation,
    SetScale,
    SetLocalMatrix,
    SetMesh,
    ClearMesh,
    SetAmbient,
    SetBackground,
    SetMainCamera,
    SetMaterialShader,
    SetMaterialUniform,
    SetBufferData,
    SetText,
    SetCameraParams,
    SetPassTargets,
}

impl CommandKind {
    const ALL: [Self; 32] = [
        Self::CreateTransform,
        Self::CreateScene,
        Self::CreateMesh,
        Self::CreateCamera,
        Self::CreateLight,
        Self::CreateText,
        Self::CreateGeometry,
        Self::CreateShader,
        Self::CreateMaterial,
        Self::CreateTexture,
        Self::CreateBuffer,
        Self::CreatePass,
        Self::Delete,
        Self::SetName,
        Self::AddChild,
        Self::RemoveChild,
        Self::RemoveAllChildren,
        Self::SetPosition,
        Self::SetRotation,
        Self::SetScale,
        Self::SetLocalMatrix,
        Self::SetMesh,
        Self::ClearMesh,
        Self::SetAmbient,
        Self::SetBackground,
        Self::SetMainCamera,
        Self::SetMaterialShader,
        Self::SetMaterialUniform,
        Self::SetBufferData,
        Self::SetText,
        Self::SetCameraParams,
        Self::SetPassTargets,
    ];

    #[must_use]
    pub fn from_u32(raw: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| *k as u32 == raw)
    }
}

/// One scene mutation issued by the producer.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // === Lifecycle ===
    CreateTransform { id: ComponentId, name: String },
    CreateScene { id: ComponentId, name: String },
    /// A transform drawn with (geometry, material).
    CreateMesh { id: ComponentId, name: String, geometry: ComponentId, material: ComponentId },
    CreateCamera { id: ComponentId, name: String, fov_y: f32, near: f32, far: f32 },
    CreateLight { id: ComponentId, name: String, kind: LightKind, color: Vec3, intensity: f32 },
    CreateText { id: ComponentId, name: String, text: String },
    CreateGeometry { id: ComponentId, name: String, vertex_count: u32 },
    CreateShader { id: ComponentId, name: String },
    CreateMaterial { id: ComponentId, name: String, shader: ComponentId },
    CreateTexture { id: ComponentId, name: String, width: u32, height: u32 },
    CreateBuffer { id: ComponentId, name: String, data: Vec<f32> },
    CreatePass { id: ComponentId, name: String },
    Delete { id: ComponentId },
    SetName { id: ComponentId, name: String },

    // === Hierarchy ===
    AddChild { parent: ComponentId, child: ComponentId },
    RemoveChild { parent: ComponentId, child: ComponentId },
    RemoveAllChildren { parent: ComponentId },

    // === Transform ===
    SetPosition { id: ComponentId, value: Vec3 },
    SetRotation { id: ComponentId, value: Quat },
    SetScale { id: ComponentId, value: Vec3 },
    SetLocalMatrix { id: ComponentId, matrix: Mat4 },

    // === Mesh ===
    SetMesh { xform: ComponentId, geometry: ComponentId, material: ComponentId },
    ClearMesh { xform: ComponentId },

    // === Scene ===
    SetAmbient { scene: ComponentId, color: Vec3 },
    SetBackground { scene: ComponentId, color: Vec4 },
    SetMainCamera { scene: ComponentId, camera: ComponentId },

    // === Resources ===
    SetMaterialShader { material: ComponentId, shader: ComponentId },
    SetMaterialUniform { material: ComponentId, slot: u32, value: [f32; 4] },
    SetBufferData { buffer: ComponentId, data: Vec<f32> },
    SetText { id: ComponentId, text: String },
    SetCameraParams { id: ComponentId, fov_y: f32, aspect: f32, near: f32, far: f32 },
    SetPassTargets { pass: ComponentId, scene: ComponentId, camera: ComponentId, next: ComponentId },
}

impl Command {
    #[must_use]
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::CreateTransform { .. } => CommandKind::CreateTransform,
            Self::CreateScene { .. } => CommandKind::CreateScene,
            Self::CreateMesh { .. } => CommandKind::CreateMesh,
            Self::CreateCamera { .. } => CommandKind::CreateCamera,
            Self::CreateLight { .. } => CommandKind::CreateLight,
            Self::CreateText { .. } => CommandKind::CreateText,
            Self::CreateGeometry { .. } => CommandKind::CreateGeometry,
            Self::CreateShader { .. } => CommandKind::CreateShader,
            Self::CreateMaterial { .. } => CommandKind::CreateMaterial,
            Self::CreateTexture { .. } => CommandKind::CreateTexture,
            Self::CreateBuffer { .. } => CommandKind::CreateBuffer,
            Self::CreatePass { .. } => CommandKind::CreatePass,
            Self::Delete { .. } => CommandKind::Delete,
            Self::SetName { .. } => CommandKind::SetName,
            Self::AddChild { .. } => CommandKind::AddChild,
            Self::RemoveChild { .. } => CommandKind::RemoveChild,
            Self::RemoveAllChildren { .. } => CommandKind::RemoveAllChildren,
            Self::SetPosition { .. } => CommandKind::SetPosition,
            Self::SetRotation { .. } => CommandKind::SetRotation,
            Self::SetScale { .. } => CommandKind::SetScale,
            Self::SetLocalMatrix { .. } => CommandKind::SetLocalMatrix,
            Self::SetMesh { .. } => CommandKind::SetMesh,
            Self::ClearMesh { .. } => CommandKind::ClearMesh,
            Self::SetAmbient { .. } => CommandKind::SetAmbient,
            Self::SetBackground { .. } => CommandKind::SetBackground,
            Self::SetMainCamera { .. } => CommandKind::SetMainCamera,
            Self::SetMaterialShader { .. } => CommandKind::SetMaterialShader,
            Self::SetMaterialUniform { .. } => CommandKind::SetMaterialUniform,
            Self::SetBufferData { .. } => CommandKind::SetBufferData,
            Self::SetText { .. } => CommandKind::SetText,
            Self::SetCameraParams { .. } => CommandKind::SetCameraParams,
            Self::SetPassTargets { .. } => CommandKind::SetPassTargets,
        }
    }
}
