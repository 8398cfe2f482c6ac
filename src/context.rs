//! Explicitly constructed shared state and the two thread-side handles.
//!
//! ```rust,ignore
//! let ctx = GraphContext::new(GraphSettings::default());
//!
//! // script / audio thread
//! let mut producer = ctx.producer();
//! let parent = producer.create_transform("parent");
//! let child = producer.create_transform("child");
//! producer.add_child(parent, child);
//! producer.set_position(child, Vec3::X);
//! producer.wait_for_frame();
//!
//! // render thread
//! let mut frame = ctx.render_frame();
//! loop {
//!     frame.begin_frame();
//!     frame.render(scene, &mut backend);
//! }
//! ```

use std::sync::Arc;

use glam::{Mat4, Quat, Vec3, Vec4};

use crate::command::{Command, CommandQueue, FrameSync, ReadQueue};
use crate::component::{ComponentId, IdAllocator, LightKind};
use crate::graph::{FrameStats, RenderBackend, SceneGraph};
use crate::settings::GraphSettings;

/// Everything the producer and the render thread share.
#[derive(Debug)]
pub struct GraphContext {
    queue: CommandQueue,
    ids: IdAllocator,
    frame_sync: FrameSync,
    settings: GraphSettings,
}

impl GraphContext {
    #[must_use]
    pub fn new(settings: GraphSettings) -> Arc<Self> {
        log::info!("Creating scenegraph context, queue capacity {} bytes", settings.queue_capacity);
        Arc::new(Self {
            queue: CommandQueue::with_capacity(settings.queue_capacity),
            ids: IdAllocator::new(),
            frame_sync: FrameSync::new(),
            settings,
        })
    }

    #[inline]
    #[must_use]
    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    #[inline]
    #[must_use]
    pub fn ids(&self) -> &IdAllocator {
        &self.ids
    }

    #[inline]
    #[must_use]
    pub fn frame_sync(&self) -> &FrameSync {
        &self.frame_sync
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &GraphSettings {
        &self.settings
    }

    #[must_use]
    pub fn producer(self: &Arc<Self>) -> Producer {
        Producer {
            last_frame: self.frame_sync.frame(),
            ctx: Arc::clone(self),
        }
    }

    #[must_use]
    pub fn render_frame(self: &Arc<Self>) -> RenderFrame {
        RenderFrame {
            read: ReadQueue::with_capacity(self.settings.queue_capacity),
            graph: SceneGraph::new(self.settings.clone()),
            ctx: Arc::clone(self),
        }
    }
}

// ============================================================================
// Producer
// ============================================================================

/// Script-side handle: allocates ids and describes changes as commands.
///
/// Ids are returned immediately so later commands of the same frame can
/// name the new component before the render thread has seen it.
#[derive(Debug, Clone)]
pub struct Producer {
    ctx: Arc<GraphContext>,
    last_frame: u64,
}

impl Producer {
    #[inline]
    #[must_use]
    pub fn context(&self) -> &Arc<GraphContext> {
        &self.ctx
    }

    #[inline]
    pub fn push(&self, cmd: &Command) {
        self.ctx.queue.push(cmd);
    }

    pub fn push_all<'a>(&self, cmds: impl IntoIterator<Item = &'a Command>) {
        self.ctx.queue.push_batch(cmds);
    }

    /// Blocks until the render thread finishes a frame newer than the last
    /// one this producer waited for, or the configured timeout passes.
    pub fn wait_for_frame(&mut self) -> u64 {
        self.last_frame = self
            .ctx
            .frame_sync
            .wait_for_frame(self.last_frame, self.ctx.settings.frame_wait_timeout);
        self.last_frame
    }

    fn allocate(&self) -> ComponentId {
        self.ctx.ids.allocate()
    }

    // === Lifecycle ===

    pub fn create_transform(&self, name: impl Into<String>) -> ComponentId {
        let id = self.allocate();
        self.push(&Command::CreateTransform { id, name: name.into() });
        id
    }

    pub fn create_scene(&self, name: impl Into<String>) -> ComponentId {
        let id = self.allocate();
        self.push(&Command::CreateScene { id, name: name.into() });
        id
    }

    pub fn create_mesh(&self, name: impl Into<String>, geometry: ComponentId, material: ComponentId) -> ComponentId {
        let id = self.allocate();
        self.push(&Command::CreateMesh {
            id,
            name: name.into(),
            geometry,
            material,
        });
        id
    }

    pub fn create_camera(&self, name: impl Into<String>, fov_y: f32, near: f32, far: f32) -> ComponentId {
        let id = self.allocate();
        self.push(&Command::CreateCamera {
            id,
            name: name.into(),
            fov_y,
            near,
            far,
        });
        id
    }

    pub fn create_light(&self, name: impl Into<String>, kind: LightKind, color: Vec3, intensity: f32) -> ComponentId {
        let id = self.allocate();
        self.push(&Command::CreateLight {
            id,
            name: name.into(),
            kind,
            color,
            intensity,
        });
        id
    }

    pub fn create_text(&self, name: impl Into<String>, text: impl Into<String>) -> ComponentId {
        let id = self.allocate();
        self.push(&Command::CreateText {
            id,
            name: name.into(),
            text: text.into(),
        });
        id
    }

    pub fn create_geometry(&self, name: impl Into<String>, vertex_count: u32) -> ComponentId {
        let id = self.allocate();
        self.push(&Command::CreateGeometry {
            id,
            name: name.into(),
            vertex_count,
        });
        id
    }

    pub fn create_shader(&self, name: impl Into<String>) -> ComponentId {
        let id = self.allocate();
        self.push(&Command::CreateShader { id, name: name.into() });
        id
    }

    pub fn create_material(&self, name: impl Into<String>, shader: ComponentId) -> ComponentId {
        let id = self.allocate();
        self.push(&Command::CreateMaterial {
            id,
            name: name.into(),
            shader,
        });
        id
    }

    pub fn create_texture(&self, name: impl Into<String>, width: u32, height: u32) -> ComponentId {
        let id = self.allocate();
        self.push(&Command::CreateTexture {
            id,
            name: name.into(),
            width,
            height,
        });
        id
    }

    pub fn create_buffer(&self, name: impl Into<String>, data: Vec<f32>) -> ComponentId {
        let id = self.allocate();
        self.push(&Command::CreateBuffer {
            id,
            name: name.into(),
            data,
        });
        id
    }

    pub fn create_pass(&self, name: impl Into<String>) -> ComponentId {
        let id = self.allocate();
        self.push(&Command::CreatePass { id, name: name.into() });
        id
    }

    pub fn delete(&self, id: ComponentId) {
        self.push(&Command::Delete { id });
    }

    pub fn set_name(&self, id: ComponentId, name: impl Into<String>) {
        self.push(&Command::SetName { id, name: name.into() });
    }

    // === Hierarchy ===

    pub fn add_child(&self, parent: ComponentId, child: ComponentId) {
        self.push(&Command::AddChild { parent, child });
    }

    pub fn remove_child(&self, parent: ComponentId, child: ComponentId) {
        self.push(&Command::RemoveChild { parent, child });
    }

    pub fn remove_all_children(&self, parent: ComponentId) {
        self.push(&Command::RemoveAllChildren { parent });
    }

    // === Transform ===

    pub fn set_position(&self, id: ComponentId, value: Vec3) {
        self.push(&Command::SetPosition { id, value });
    }

    pub fn set_rotation(&self, id: ComponentId, value: Quat) {
        self.push(&Command::SetRotation { id, value });
    }

    pub fn set_scale(&self, id: ComponentId, value: Vec3) {
        self.push(&Command::SetScale { id, value });
    }

    pub fn set_local_matrix(&self, id: ComponentId, matrix: Mat4) {
        self.push(&Command::SetLocalMatrix { id, matrix });
    }

    // === Mesh / Scene ===

    pub fn set_mesh(&self, xform: ComponentId, geometry: ComponentId, material: ComponentId) {
        self.push(&Command::SetMesh { xform, geometry, material });
    }

    pub fn clear_mesh(&self, xform: ComponentId) {
        self.push(&Command::ClearMesh { xform });
    }

    pub fn set_ambient(&self, scene: ComponentId, color: Vec3) {
        self.push(&Command::SetAmbient { scene, color });
    }

    pub fn set_background(&self, scene: ComponentId, color: Vec4) {
        self.push(&Command::SetBackground { scene, color });
    }

    pub fn set_main_camera(&self, scene: ComponentId, camera: ComponentId) {
        self.push(&Command::SetMainCamera { scene, camera });
    }

    // === Resources ===

    pub fn set_material_shader(&self, material: ComponentId, shader: ComponentId) {
        self.push(&Command::SetMaterialShader { material, shader });
    }

    pub fn set_material_uniform(&self, material: ComponentId, slot: u32, value: [f32; 4]) {
        self.push(&Command::SetMaterialUniform { material, slot, value });
    }

    pub fn set_buffer_data(&self, buffer: ComponentId, data: Vec<f32>) {
        self.push(&Command::SetBufferData { buffer, data });
    }

    pub fn set_text(&self, id: ComponentId, text: impl Into<String>) {
        self.push(&Command::SetText { id, text: text.into() });
    }

    pub fn set_camera_params(&self, id: ComponentId, fov_y: f32, aspect: f32, near: f32, far: f32) {
        self.push(&Command::SetCameraParams {
            id,
            fov_y,
            aspect,
            near,
            far,
        });
    }

    pub fn set_pass_targets(&self, pass: ComponentId, scene: ComponentId, camera: ComponentId, next: ComponentId) {
        self.push(&Command::SetPassTargets {
            pass,
            scene,
            camera,
            next,
        });
    }
}

// ============================================================================
// Render thread
// ============================================================================

/// What one [`RenderFrame::begin_frame`] did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FrameReport {
    /// Queue generation that was applied.
    pub generation: u64,
    /// Commands applied from that generation.
    pub commands: usize,
    pub stats: FrameStats,
}

/// Render-thread handle: owns the read side of the queue and the scene state.
#[derive(Debug)]
pub struct RenderFrame {
    ctx: Arc<GraphContext>,
    read: ReadQueue,
    graph: SceneGraph,
}

impl RenderFrame {
    #[inline]
    #[must_use]
    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    #[inline]
    pub fn graph_mut(&mut self) -> &mut SceneGraph {
        &mut self.graph
    }

    /// Swaps the queue, applies the new generation, brings matrices and
    /// batches up to date and releases waiting producers.
    pub fn begin_frame(&mut self) -> FrameReport {
        self.ctx.queue.swap(&mut self.read);
        let generation = self.read.generation();
        let commands = self.graph.apply_all(&mut self.read);
        let stats = self.graph.prepare_frame();
        self.ctx.frame_sync.notify_frame();

        FrameReport {
            generation,
            commands,
            stats,
        }
    }

    /// Uploads stale instance data and issues the draws of `scene`.
    pub fn render(&mut self, scene: ComponentId, backend: &mut impl RenderBackend) -> usize {
        self.graph.render(scene, backend)
    }
}
