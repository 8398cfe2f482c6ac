//! SceneGraph and context tests
//!
//! Tests for:
//! - The producer → queue → apply → rebuild data flow end to end
//! - Create-or-update and stale-reference skipping
//! - Deletion: unparenting, scene membership, lazy binding skip, double delete
//! - Scene membership and mesh bindings following hierarchy edits
//! - Draw iteration order and empty-batch skipping through a RenderBackend
//! - Camera and light world data refreshed after rebuild

use std::thread;

use avgraph::command::{Command, CommandQueue, ReadQueue};
use avgraph::component::{ComponentId, ComponentKind, LightKind};
use avgraph::errors::GraphError;
use avgraph::graph::{DrawCall, RenderBackend, SceneGraph};
use avgraph::scene::{BatchKey, InstanceData, Staleness};
use avgraph::{GraphContext, GraphSettings};
use glam::{Quat, Vec3, Vec4};

// ============================================================================
// Helpers
// ============================================================================

const EPSILON: f32 = 1e-5;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn vec3_approx(a: Vec3, b: Vec3) -> bool {
    (a - b).abs().max_element() < EPSILON
}

fn id(n: u64) -> ComponentId {
    ComponentId(n)
}

/// Pushes `cmds` as one generation, applies it and prepares the frame.
fn run_frame(graph: &mut SceneGraph, cmds: &[Command]) -> usize {
    let queue = CommandQueue::new();
    let mut read = ReadQueue::new();
    queue.push_batch(cmds);
    queue.swap(&mut read);
    let applied = graph.apply_all(&mut read);
    graph.prepare_frame();
    applied
}

#[derive(Default)]
struct RecordingBackend {
    uploads: Vec<(BatchKey, usize)>,
    draws: Vec<DrawCall>,
}

impl RenderBackend for RecordingBackend {
    fn upload_instances(&mut self, key: BatchKey, instances: &[InstanceData]) {
        self.uploads.push((key, instances.len()));
    }

    fn draw(&mut self, call: &DrawCall) {
        self.draws.push(*call);
    }
}

/// Scene 1 with shader 10, materials 20/21, geometries 30/31 and meshes
/// 40..=43 under the scene root.
fn mesh_scene() -> SceneGraph {
    let mut graph = SceneGraph::default();
    let mut cmds = vec![
        Command::CreateScene {
            id: id(1),
            name: "main".into(),
        },
        Command::CreateShader {
            id: id(10),
            name: "unlit".into(),
        },
        Command::CreateMaterial {
            id: id(21),
            name: "blue".into(),
            shader: id(10),
        },
        Command::CreateMaterial {
            id: id(20),
            name: "red".into(),
            shader: id(10),
        },
        Command::CreateGeometry {
            id: id(30),
            name: "cube".into(),
            vertex_count: 36,
        },
        Command::CreateGeometry {
            id: id(31),
            name: "quad".into(),
            vertex_count: 6,
        },
    ];
    for (mesh, geometry, material) in [(40, 30, 20), (41, 30, 20), (42, 31, 20), (43, 30, 21)] {
        cmds.push(Command::CreateMesh {
            id: id(mesh),
            name: format!("mesh{mesh}"),
            geometry: id(geometry),
            material: id(material),
        });
        cmds.push(Command::AddChild {
            parent: id(1),
            child: id(mesh),
        });
    }
    run_frame(&mut graph, &cmds);
    graph
}

// ============================================================================
// End to end
// ============================================================================

#[test]
fn child_translation_composes_with_parent() {
    init_logger();
    let mut graph = SceneGraph::default();
    let applied = run_frame(
        &mut graph,
        &[
            Command::CreateTransform {
                id: id(1),
                name: "parent".into(),
            },
            Command::CreateTransform {
                id: id(2),
                name: "child".into(),
            },
            Command::AddChild {
                parent: id(1),
                child: id(2),
            },
            Command::SetPosition {
                id: id(2),
                value: Vec3::new(1.0, 0.0, 0.0),
            },
            Command::SetPosition {
                id: id(1),
                value: Vec3::new(0.0, 5.0, 0.0),
            },
        ],
    );

    assert_eq!(applied, 5);
    let child = graph.transform(id(2)).unwrap();
    assert!(vec3_approx(child.world_position(), Vec3::new(1.0, 5.0, 0.0)));
    assert_eq!(child.staleness(), Staleness::None);
    assert_eq!(graph.name_of(id(2)), Some("child"));
}

#[test]
fn context_drives_producer_and_render_threads() {
    init_logger();
    let ctx = GraphContext::new(GraphSettings::default());
    let mut frame = ctx.render_frame();

    let producer = ctx.producer();
    let worker = thread::spawn(move || {
        let parent = producer.create_transform("parent");
        let child = producer.create_transform("child");
        producer.add_child(parent, child);
        producer.set_position(child, Vec3::X);
        producer.set_position(parent, Vec3::new(0.0, 5.0, 0.0));
        (parent, child)
    });
    let (_, child) = worker.join().unwrap();

    let report = frame.begin_frame();
    assert_eq!(report.generation, 1);
    assert_eq!(report.commands, 5);
    assert_eq!(report.stats.frame, 1);
    assert!(vec3_approx(
        frame.graph().transform(child).unwrap().world_position(),
        Vec3::new(1.0, 5.0, 0.0)
    ));
    assert_eq!(ctx.frame_sync().frame(), 1);

    // Next frame with nothing queued.
    let report = frame.begin_frame();
    assert_eq!(report.commands, 0);
    assert_eq!(report.stats.recomputed, 0);
}

#[test]
fn producer_blocks_until_frame_is_rendered() {
    let ctx = GraphContext::new(GraphSettings::default());
    let mut frame = ctx.render_frame();
    let mut producer = ctx.producer();

    let waiter = thread::spawn(move || {
        let node = producer.create_transform("node");
        producer.set_position(node, Vec3::Z);
        let seen = producer.wait_for_frame();
        (node, seen)
    });

    while ctx.queue().pending() < 2 {
        thread::yield_now();
    }
    frame.begin_frame();

    let (node, seen) = waiter.join().unwrap();
    assert!(seen >= 1);
    assert!(vec3_approx(frame.graph().transform(node).unwrap().world_position(), Vec3::Z));
}

// ============================================================================
// Create-or-update / stale references
// ============================================================================

#[test]
fn update_on_unknown_id_creates_it() {
    let mut graph = SceneGraph::default();
    run_frame(
        &mut graph,
        &[
            Command::SetScale {
                id: id(5),
                value: Vec3::splat(2.0),
            },
            Command::SetMaterialUniform {
                material: id(6),
                slot: 1,
                value: [0.5; 4],
            },
            Command::SetAmbient {
                scene: id(7),
                color: Vec3::ONE,
            },
        ],
    );

    assert_eq!(graph.kind_of(id(5)), Some(ComponentKind::Transform));
    assert_eq!(graph.transform(id(5)).unwrap().scale(), Vec3::splat(2.0));
    assert_eq!(graph.material(id(6)).unwrap().uniform(1), Some([0.5; 4]));
    assert_eq!(graph.scene(id(7)).unwrap().ambient, Vec3::ONE);
}

#[test]
fn create_twice_acts_as_update() {
    let mut graph = SceneGraph::default();
    run_frame(
        &mut graph,
        &[
            Command::CreateGeometry {
                id: id(1),
                name: "a".into(),
                vertex_count: 3,
            },
            Command::CreateGeometry {
                id: id(1),
                name: "b".into(),
                vertex_count: 6,
            },
        ],
    );
    let geo = graph.geometry(id(1)).unwrap();
    assert_eq!(geo.vertex_count, 6);
    assert_eq!(graph.name_of(id(1)), Some("b"));
}

#[test]
fn commands_on_deleted_ids_are_skipped() {
    init_logger();
    let mut graph = SceneGraph::default();
    let applied = run_frame(
        &mut graph,
        &[
            Command::CreateTransform {
                id: id(1),
                name: "gone".into(),
            },
            Command::Delete { id: id(1) },
            Command::SetPosition {
                id: id(1),
                value: Vec3::ONE,
            },
            Command::AddChild {
                parent: id(1),
                child: id(2),
            },
            Command::SetName {
                id: id(1),
                name: "back".into(),
            },
        ],
    );

    assert_eq!(applied, 5);
    assert!(graph.transform(id(1)).is_none());
    assert!(graph.registry().is_retired(id(1)));
    // Ids are never revived, and the skipped AddChild did not create 2 either.
    assert!(!graph.is_live(id(1)));
    assert!(!graph.is_live(id(2)));
}

#[test]
fn kind_mismatch_is_rejected() {
    let mut graph = SceneGraph::default();
    run_frame(
        &mut graph,
        &[
            Command::CreateGeometry {
                id: id(1),
                name: "geo".into(),
                vertex_count: 3,
            },
            Command::SetPosition {
                id: id(1),
                value: Vec3::ONE,
            },
        ],
    );
    assert!(graph.transform(id(1)).is_none());
    assert_eq!(graph.kind_of(id(1)), Some(ComponentKind::Geometry));
}

#[test]
#[should_panic(expected = "double delete")]
fn double_delete_is_fatal() {
    let mut graph = SceneGraph::default();
    run_frame(
        &mut graph,
        &[
            Command::CreateShader {
                id: id(1),
                name: "s".into(),
            },
            Command::Delete { id: id(1) },
            Command::Delete { id: id(1) },
        ],
    );
}

// ============================================================================
// Hierarchy through commands
// ============================================================================

#[test]
fn cycle_command_is_skipped_and_tree_kept() {
    let mut graph = SceneGraph::default();
    run_frame(
        &mut graph,
        &[
            Command::AddChild {
                parent: id(1),
                child: id(2),
            },
            Command::AddChild {
                parent: id(2),
                child: id(1),
            },
        ],
    );
    assert_eq!(graph.transform(id(2)).unwrap().parent(), Some(id(1)));
    assert_eq!(graph.transform(id(1)).unwrap().parent(), None);
}

#[test]
fn deleting_parent_unparents_children() {
    let mut graph = SceneGraph::default();
    run_frame(
        &mut graph,
        &[
            Command::SetPosition {
                id: id(1),
                value: Vec3::Y,
            },
            Command::SetPosition {
                id: id(2),
                value: Vec3::X,
            },
            Command::AddChild {
                parent: id(1),
                child: id(2),
            },
        ],
    );
    assert!(vec3_approx(graph.transform(id(2)).unwrap().world_position(), Vec3::new(1.0, 1.0, 0.0)));

    run_frame(&mut graph, &[Command::Delete { id: id(1) }]);
    let child = graph.transform(id(2)).unwrap();
    assert_eq!(child.parent(), None);
    assert!(vec3_approx(child.world_position(), Vec3::X));
}

// ============================================================================
// Scenes and bindings
// ============================================================================

#[test]
fn meshes_bind_when_entering_a_scene() {
    let graph = mesh_scene();
    let scene = graph.scene(id(1)).unwrap();
    assert_eq!(scene.member_count(), 4);
    assert_eq!(scene.bindings().instance_set(id(30), id(20)), &[id(40), id(41)]);
    assert_eq!(scene.bindings().instance_set(id(30), id(21)), &[id(43)]);
}

#[test]
fn subtree_leaving_scene_unbinds_meshes() {
    let mut graph = mesh_scene();
    run_frame(
        &mut graph,
        &[
            Command::CreateTransform {
                id: id(50),
                name: "group".into(),
            },
            Command::AddChild {
                parent: id(1),
                child: id(50),
            },
            Command::AddChild {
                parent: id(50),
                child: id(40),
            },
        ],
    );
    assert!(graph.scene(id(1)).unwrap().contains(id(40)));

    run_frame(
        &mut graph,
        &[Command::RemoveChild {
            parent: id(1),
            child: id(50),
        }],
    );
    let scene = graph.scene(id(1)).unwrap();
    assert!(!scene.contains(id(50)));
    assert!(!scene.contains(id(40)));
    assert_eq!(scene.bindings().instance_set(id(30), id(20)), &[id(41)]);
    assert_eq!(graph.transform(id(40)).unwrap().scene(), None);
}

#[test]
fn set_mesh_rebinds_and_clear_mesh_unbinds() {
    let mut graph = mesh_scene();
    run_frame(
        &mut graph,
        &[
            Command::SetMesh {
                xform: id(40),
                geometry: id(31),
                material: id(20),
            },
            Command::ClearMesh { xform: id(41) },
        ],
    );
    let bindings = graph.scene(id(1)).unwrap().bindings();
    assert!(bindings.instance_set(id(30), id(20)).is_empty());
    assert_eq!(bindings.instance_set(id(31), id(20)), &[id(42), id(40)]);
    assert_eq!(graph.transform(id(41)).unwrap().mesh(), None);
}

#[test]
fn deleting_scene_releases_its_subtree() {
    let mut graph = mesh_scene();
    run_frame(&mut graph, &[Command::Delete { id: id(1) }]);
    assert!(graph.scene(id(1)).is_none());
    let mesh = graph.transform(id(40)).unwrap();
    assert_eq!(mesh.parent(), None);
    assert_eq!(mesh.scene(), None);
}

#[test]
fn main_camera_cleared_when_camera_deleted() {
    let mut graph = mesh_scene();
    run_frame(
        &mut graph,
        &[
            Command::CreateCamera {
                id: id(60),
                name: "cam".into(),
                fov_y: 1.0,
                near: 0.1,
                far: 100.0,
            },
            Command::SetMainCamera {
                scene: id(1),
                camera: id(60),
            },
        ],
    );
    assert_eq!(graph.scene(id(1)).unwrap().main_camera(), Some(id(60)));

    run_frame(&mut graph, &[Command::Delete { id: id(60) }]);
    assert_eq!(graph.scene(id(1)).unwrap().main_camera(), None);
}

// ============================================================================
// Draw iteration
// ============================================================================

#[test]
fn draws_follow_pipeline_material_geometry_order() {
    let graph = mesh_scene();
    let calls = graph.draw_batches(id(1));
    let order: Vec<_> = calls.iter().map(|c| (c.material, c.geometry, c.instance_count)).collect();
    assert_eq!(
        order,
        vec![(id(20), id(30), 2), (id(20), id(31), 1), (id(21), id(30), 1)]
    );
    assert!(calls.iter().all(|c| c.shader == id(10)));
    assert_eq!(calls[0].vertex_count, 36);
}

#[test]
fn empty_sets_are_skipped_without_rebuild() {
    let mut graph = mesh_scene();
    run_frame(&mut graph, &[Command::ClearMesh { xform: id(43) }]);

    let mut backend = RecordingBackend::default();
    let draws = graph.render(id(1), &mut backend);
    assert_eq!(draws, 2);
    assert!(backend.draws.iter().all(|c| c.material == id(20)));

    let empty = graph
        .scene(id(1))
        .unwrap()
        .bindings()
        .batch(BatchKey::new(id(30), id(21)))
        .unwrap();
    assert!(empty.is_empty());
    assert_eq!(empty.rebuild_count(), 0);
}

#[test]
fn instance_buffers_upload_only_when_stale() {
    let mut graph = mesh_scene();
    let mut backend = RecordingBackend::default();

    graph.render(id(1), &mut backend);
    assert_eq!(backend.uploads.len(), 3);

    backend.uploads.clear();
    graph.render(id(1), &mut backend);
    assert!(backend.uploads.is_empty(), "nothing moved, nothing uploaded");

    run_frame(
        &mut graph,
        &[Command::SetRotation {
            id: id(42),
            value: Quat::from_rotation_x(1.0),
        }],
    );
    assert_eq!(graph.dirty_batches(id(1)), vec![BatchKey::new(id(31), id(20))]);

    graph.render(id(1), &mut backend);
    assert_eq!(backend.uploads, vec![(BatchKey::new(id(31), id(20)), 1)]);
}

#[test]
fn deleted_material_disappears_from_iteration() {
    let mut graph = mesh_scene();
    run_frame(&mut graph, &[Command::Delete { id: id(21) }]);

    let calls = graph.draw_batches(id(1));
    assert!(calls.iter().all(|c| c.material != id(21)));
    // The stale entry is still there until compaction.
    assert_eq!(graph.scene(id(1)).unwrap().bindings().entry_count(), 3);
    assert_eq!(graph.compact(), 1);
    assert_eq!(graph.scene(id(1)).unwrap().bindings().entry_count(), 2);
}

#[test]
fn compaction_keeps_bindings_to_components_not_created_yet() -> anyhow::Result<()> {
    let mut graph = SceneGraph::default();
    for cmd in [
        Command::CreateScene {
            id: id(1),
            name: "main".into(),
        },
        Command::CreateShader {
            id: id(10),
            name: "unlit".into(),
        },
        Command::CreateMaterial {
            id: id(20),
            name: "red".into(),
            shader: id(10),
        },
        Command::CreateMesh {
            id: id(40),
            name: "early".into(),
            geometry: id(30),
            material: id(20),
        },
        Command::AddChild {
            parent: id(1),
            child: id(40),
        },
    ] {
        graph.apply(cmd)?;
    }
    graph.prepare_frame();

    // Geometry 30 does not exist yet: nothing to draw, nothing to prune.
    assert!(graph.draw_batches(id(1)).is_empty());
    assert_eq!(graph.compact(), 0);

    graph.apply(Command::CreateGeometry {
        id: id(30),
        name: "late".into(),
        vertex_count: 3,
    })?;
    graph.prepare_frame();

    let calls = graph.draw_batches(id(1));
    assert_eq!(calls.len(), 1);
    assert_eq!((calls[0].geometry, calls[0].instance_count), (id(30), 1));
    Ok(())
}

#[test]
fn periodic_compaction_runs_on_schedule() {
    let mut graph = SceneGraph::new(GraphSettings {
        compact_interval: Some(2),
        ..Default::default()
    });
    run_frame(
        &mut graph,
        &[
            Command::CreateScene {
                id: id(1),
                name: "s".into(),
            },
            Command::CreateMesh {
                id: id(2),
                name: "m".into(),
                geometry: id(3),
                material: id(4),
            },
            Command::AddChild {
                parent: id(1),
                child: id(2),
            },
            Command::ClearMesh { xform: id(2) },
        ],
    );
    assert_eq!(graph.scene(id(1)).unwrap().bindings().entry_count(), 1);

    let stats = graph.prepare_frame();
    assert_eq!(stats.frame, 2);
    assert_eq!(stats.compacted, 1);
    assert_eq!(graph.scene(id(1)).unwrap().bindings().entry_count(), 0);
}

// ============================================================================
// Cameras, lights, passes
// ============================================================================

#[test]
fn camera_and_light_follow_their_transforms() {
    let mut graph = SceneGraph::default();
    run_frame(
        &mut graph,
        &[
            Command::CreateTransform {
                id: id(1),
                name: "rig".into(),
            },
            Command::CreateCamera {
                id: id(2),
                name: "cam".into(),
                fov_y: 1.0,
                near: 0.1,
                far: 100.0,
            },
            Command::CreateLight {
                id: id(3),
                name: "lamp".into(),
                kind: LightKind::Spot,
                color: Vec3::ONE,
                intensity: 4.0,
            },
            Command::AddChild {
                parent: id(1),
                child: id(2),
            },
            Command::AddChild {
                parent: id(1),
                child: id(3),
            },
            Command::SetPosition {
                id: id(1),
                value: Vec3::new(0.0, 0.0, 10.0),
            },
        ],
    );

    let world = graph.camera_world(id(2)).unwrap();
    assert!(vec3_approx(world.w_axis.truncate(), Vec3::new(0.0, 0.0, 10.0)));
    let view = graph.camera(id(2)).unwrap().view_matrix();
    assert!(vec3_approx(view.transform_point3(Vec3::new(0.0, 0.0, 10.0)), Vec3::ZERO));

    let (position, direction) = graph.light_world(id(3)).unwrap();
    assert!(vec3_approx(position, Vec3::new(0.0, 0.0, 10.0)));
    assert!(vec3_approx(direction, Vec3::NEG_Z));
    assert_eq!(graph.light(id(3)).unwrap().intensity, 4.0);
}

#[test]
fn pass_chain_follows_next_links() {
    let mut graph = SceneGraph::default();
    run_frame(
        &mut graph,
        &[
            Command::CreatePass {
                id: id(1),
                name: "shadow".into(),
            },
            Command::CreatePass {
                id: id(2),
                name: "main".into(),
            },
            Command::SetPassTargets {
                pass: id(1),
                scene: id(9),
                camera: ComponentId::NONE,
                next: id(2),
            },
            Command::SetPassTargets {
                pass: id(2),
                scene: id(9),
                camera: ComponentId::NONE,
                next: id(1),
            },
            Command::SetBackground {
                scene: id(9),
                color: Vec4::ONE,
            },
        ],
    );
    // The loop back to 1 is cut.
    assert_eq!(graph.pass_chain(id(1)), vec![id(1), id(2)]);
    assert_eq!(graph.scene(id(9)).unwrap().background, Vec4::ONE);
}

#[test]
fn text_and_buffer_updates_bump_versions() {
    let mut graph = SceneGraph::default();
    run_frame(
        &mut graph,
        &[
            Command::CreateText {
                id: id(1),
                name: "label".into(),
                text: "hi".into(),
            },
            Command::CreateBuffer {
                id: id(2),
                name: "wave".into(),
                data: vec![0.0; 4],
            },
        ],
    );
    let text_v = graph.text(id(1)).unwrap().version.version();
    let buf_v = graph.buffer(id(2)).unwrap().version.version();

    run_frame(
        &mut graph,
        &[
            Command::SetText {
                id: id(1),
                text: "hello".into(),
            },
            Command::SetBufferData {
                buffer: id(2),
                data: vec![1.0; 8],
            },
        ],
    );
    assert_eq!(graph.text(id(1)).unwrap().text, "hello");
    assert!(graph.text(id(1)).unwrap().version.is_newer_than(text_v));
    assert_eq!(graph.buffer(id(2)).unwrap().data.len(), 8);
    assert!(graph.buffer(id(2)).unwrap().version.version() > buf_v);
}

// ============================================================================
// Rejected values
// ============================================================================

#[test]
fn degenerate_rotation_is_rejected() -> anyhow::Result<()> {
    let mut graph = SceneGraph::default();
    graph.apply(Command::SetPosition {
        id: id(1),
        value: Vec3::X,
    })?;

    for bad in [Quat::from_xyzw(0.0, 0.0, 0.0, 0.0), Quat::from_xyzw(f32::NAN, 0.0, 0.0, 1.0)] {
        assert_eq!(
            graph.apply(Command::SetRotation { id: id(1), value: bad }),
            Err(GraphError::DegenerateRotation(id(1)))
        );
    }
    graph.prepare_frame();

    let node = graph.transform(id(1)).unwrap();
    assert_eq!(node.rotation(), Quat::IDENTITY);
    assert!(node.world_matrix().is_finite());
    assert!(vec3_approx(node.world_position(), Vec3::X));
    Ok(())
}

#[test]
fn unnormalised_rotation_is_normalised() -> anyhow::Result<()> {
    let mut graph = SceneGraph::default();
    let scaled = Quat::from_rotation_z(0.5) * 3.0;
    graph.apply(Command::SetRotation { id: id(1), value: scaled })?;
    let rotation = graph.transform(id(1)).unwrap().rotation();
    assert!(rotation.is_normalized());
    assert!(rotation.abs_diff_eq(Quat::from_rotation_z(0.5), EPSILON));
    Ok(())
}
