//! Transform hierarchy tests
//!
//! Tests for:
//! - Dirty propagation and its early stop
//! - Rebuild minimality (only the dirty path is recomputed)
//! - World = parent.world * local consistency after every rebuild
//! - Reparenting, detaching and deleting nodes
//! - Cycle and scene-as-child rejection
//! - TRS helpers: look_at, set_local_matrix decomposition

use avgraph::component::{Component, ComponentId, ComponentKind};
use avgraph::errors::GraphError;
use avgraph::scene::{Staleness, TransformHierarchy};
use glam::{Affine3A, Quat, Vec3};
use std::f32::consts::FRAC_PI_2;

// ============================================================================
// Helpers
// ============================================================================

const EPSILON: f32 = 1e-5;

fn vec3_approx(a: Vec3, b: Vec3) -> bool {
    (a - b).abs().max_element() < EPSILON
}

fn affine_approx(a: &Affine3A, b: &Affine3A) -> bool {
    a.abs_diff_eq(*b, EPSILON)
}

fn id(n: u64) -> ComponentId {
    ComponentId(n)
}

/// Builds
///
/// ```text
///        1
///      /   \
///     2     3
///    / \     \
///   4   5     6
///   |
///   7
/// ```
///
/// with every node offset by one unit along X, then rebuilds so all flags
/// are clean.
fn build_tree() -> TransformHierarchy {
    let mut h = TransformHierarchy::new();
    for n in 1..=7 {
        h.create(id(n), format!("n{n}"), ComponentKind::Transform);
        h.set_position(id(n), Vec3::X);
    }
    for (parent, child) in [(1, 2), (1, 3), (2, 4), (2, 5), (3, 6), (4, 7)] {
        h.add_child(id(parent), id(child)).unwrap();
    }
    h.rebuild_dirty();
    h
}

fn assert_consistent(h: &TransformHierarchy) {
    for node in h.iter() {
        assert_eq!(node.staleness(), Staleness::None, "node {} still dirty", node.id());
        let expected = match node.parent() {
            Some(p) => *h.world_matrix(p).unwrap() * *node.local_matrix(),
            None => *node.local_matrix(),
        };
        assert!(
            affine_approx(node.world_matrix(), &expected),
            "node {} world matrix inconsistent",
            node.id()
        );
    }
}

// ============================================================================
// Propagation
// ============================================================================

#[test]
fn mutation_marks_path_to_root() {
    let mut h = build_tree();
    h.set_position(id(7), Vec3::Y);

    assert_eq!(h.staleness(id(7)), Some(Staleness::Local));
    for ancestor in [4, 2, 1] {
        assert_eq!(h.staleness(id(ancestor)), Some(Staleness::Descendants));
    }
    for untouched in [3, 5, 6] {
        assert_eq!(h.staleness(id(untouched)), Some(Staleness::None));
    }
    assert_eq!(h.dirty_roots().collect::<Vec<_>>(), vec![id(1)]);
}

#[test]
fn second_mutation_stops_at_dirty_ancestor() {
    let mut h = build_tree();
    h.set_position(id(4), Vec3::Z);
    h.set_position(id(7), Vec3::Y);

    // 4 stays LOCAL: the walk from 7 stopped there.
    assert_eq!(h.staleness(id(4)), Some(Staleness::Local));
    assert_eq!(h.staleness(id(2)), Some(Staleness::Descendants));
}

// ============================================================================
// Rebuild
// ============================================================================

#[test]
fn leaf_mutation_recomputes_only_its_path() {
    let mut h = build_tree();
    h.set_position(id(7), Vec3::new(0.0, 2.0, 0.0));

    let stats = h.rebuild_matrices(id(1));
    assert_eq!(stats.visited, h.depth(id(7)) + 1);
    assert_eq!(stats.recomputed, 1);
    assert_eq!(stats.world_changed, vec![id(7)]);
    assert_consistent(&h);
}

#[test]
fn inner_mutation_recomputes_subtree() {
    let mut h = build_tree();
    h.set_rotation(id(2), Quat::from_rotation_z(FRAC_PI_2));

    let stats = h.rebuild_dirty();
    // 1 (descendants) + 2, 4, 5, 7 recomputed.
    assert_eq!(stats.visited, 5);
    assert_eq!(stats.recomputed, 4);
    assert!(!stats.world_changed.contains(&id(3)));
    assert!(!stats.world_changed.contains(&id(6)));
    assert_consistent(&h);

    // 2 is rotated 90° about Z, so its +X child offset points along +Y.
    let p4 = h.get(id(4)).unwrap().world_position();
    assert!(vec3_approx(p4, Vec3::new(2.0, 1.0, 0.0)), "got {p4}");
}

#[test]
fn clean_tree_rebuild_does_nothing() {
    let mut h = build_tree();
    let stats = h.rebuild_dirty();
    assert_eq!(stats.visited, 0);
    assert_eq!(stats.recomputed, 0);
    assert_consistent(&h);
}

#[test]
fn world_positions_compose_down_the_chain() {
    let h = build_tree();
    assert!(vec3_approx(h.get(id(7)).unwrap().world_position(), Vec3::new(4.0, 0.0, 0.0)));
    assert!(vec3_approx(h.get(id(6)).unwrap().world_position(), Vec3::new(3.0, 0.0, 0.0)));
}

// ============================================================================
// Reparenting
// ============================================================================

#[test]
fn reparent_moves_child_between_lists() {
    let mut h = build_tree();
    h.set_scale(id(3), Vec3::splat(2.0));
    h.add_child(id(3), id(4)).unwrap();

    assert!(!h.get(id(2)).unwrap().children().contains(&id(4)));
    assert!(h.get(id(3)).unwrap().children().contains(&id(4)));
    assert_eq!(h.get(id(4)).unwrap().parent(), Some(id(3)));

    h.rebuild_dirty();
    assert_consistent(&h);

    let expected = *h.world_matrix(id(3)).unwrap() * *h.local_matrix(id(4)).unwrap();
    assert!(affine_approx(h.world_matrix(id(4)).unwrap(), &expected));
    // 7 follows its parent.
    assert!(vec3_approx(
        h.get(id(7)).unwrap().world_position(),
        Vec3::new(2.0 + 2.0 + 2.0, 0.0, 0.0)
    ));
}

#[test]
fn reparent_marks_both_parents() {
    let mut h = build_tree();
    h.add_child(id(6), id(5)).unwrap();
    assert_eq!(h.staleness(id(2)), Some(Staleness::Descendants));
    assert_eq!(h.staleness(id(6)), Some(Staleness::Descendants));
    assert_eq!(h.staleness(id(5)), Some(Staleness::Local));
}

#[test]
fn remove_child_makes_root() {
    let mut h = build_tree();
    h.remove_child(id(2), id(4)).unwrap();
    assert_eq!(h.get(id(4)).unwrap().parent(), None);
    assert_eq!(h.get(id(7)).unwrap().parent(), Some(id(4)));

    h.rebuild_dirty();
    assert_consistent(&h);
    assert!(vec3_approx(h.get(id(4)).unwrap().world_position(), Vec3::X));
}

#[test]
fn remove_child_of_other_parent_is_noop() {
    let mut h = build_tree();
    assert_eq!(h.remove_child(id(3), id(4)), Ok(None));
    assert_eq!(h.get(id(4)).unwrap().parent(), Some(id(2)));
}

#[test]
fn remove_all_children_detaches_each() {
    let mut h = build_tree();
    h.remove_all_children(id(2)).unwrap();
    assert!(h.get(id(2)).unwrap().children().is_empty());
    assert_eq!(h.get(id(4)).unwrap().parent(), None);
    assert_eq!(h.get(id(5)).unwrap().parent(), None);
    h.rebuild_dirty();
    assert_consistent(&h);
}

#[test]
fn deleted_parent_leaves_children_as_roots() {
    let mut h = build_tree();
    let removed = h.remove(id(2)).unwrap();
    assert_eq!(removed.transform.id(), id(2));
    assert!(!h.contains(id(2)));
    assert!(!h.get(id(1)).unwrap().children().contains(&id(2)));
    assert_eq!(h.get(id(4)).unwrap().parent(), None);

    h.rebuild_dirty();
    assert_consistent(&h);
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn cycles_are_rejected() {
    let mut h = build_tree();
    assert_eq!(
        h.add_child(id(7), id(1)),
        Err(GraphError::HierarchyCycle {
            parent: id(7),
            child: id(1)
        })
    );
    assert_eq!(
        h.add_child(id(3), id(3)),
        Err(GraphError::HierarchyCycle {
            parent: id(3),
            child: id(3)
        })
    );
    // Tree unchanged.
    assert_eq!(h.get(id(1)).unwrap().parent(), None);
}

#[test]
fn scenes_cannot_be_children() {
    let mut h = build_tree();
    h.create(id(100), "scene", ComponentKind::Scene);
    assert_eq!(h.add_child(id(1), id(100)), Err(GraphError::SceneNotAttachable(id(100))));

    let moved = h.add_child(id(100), id(1)).unwrap().expect("subtree enters the scene");
    assert_eq!(moved.to, Some(id(100)));
    assert_eq!(moved.nodes.len(), 7);
    assert!(h.iter().all(|n| n.scene() == Some(id(100))));
}

#[test]
fn missing_nodes_are_reported() {
    let mut h = TransformHierarchy::new();
    h.create(id(1), "a", ComponentKind::Transform);
    assert_eq!(h.add_child(id(1), id(2)), Err(GraphError::ComponentNotFound(id(2))));
    assert!(!h.set_position(id(2), Vec3::ONE));
}

// ============================================================================
// TRS helpers
// ============================================================================

#[test]
fn set_local_matrix_decomposes() {
    let mut h = TransformHierarchy::new();
    h.create(id(1), "a", ComponentKind::Transform);
    let m = Affine3A::from_scale_rotation_translation(
        Vec3::splat(3.0),
        Quat::from_rotation_x(0.3),
        Vec3::new(1.0, 2.0, 3.0),
    );
    h.set_local_matrix(id(1), m);
    h.rebuild_dirty();

    let node = h.get(id(1)).unwrap();
    assert!(vec3_approx(node.position(), Vec3::new(1.0, 2.0, 3.0)));
    assert!(vec3_approx(node.scale(), Vec3::splat(3.0)));
    assert!(affine_approx(node.world_matrix(), &m));
}

#[test]
fn look_at_points_negative_z_at_target() {
    let mut h = TransformHierarchy::new();
    h.create(id(1), "cam", ComponentKind::Camera);
    h.set_position(id(1), Vec3::new(0.0, 0.0, 5.0));
    assert!(h.look_at(id(1), Vec3::new(5.0, 0.0, 5.0), Vec3::Y));
    h.rebuild_dirty();

    let forward = h.world_matrix(id(1)).unwrap().transform_vector3(Vec3::NEG_Z);
    assert!(vec3_approx(forward, Vec3::X), "got {forward}");
}

#[test]
fn translate_and_rotate_accumulate() {
    let mut h = TransformHierarchy::new();
    h.create(id(1), "a", ComponentKind::Transform);
    h.translate(id(1), Vec3::X);
    h.translate(id(1), Vec3::X);
    h.rotate(id(1), Quat::from_rotation_y(0.25));
    h.rotate(id(1), Quat::from_rotation_y(0.25));
    h.rebuild_dirty();

    let node = h.get(id(1)).unwrap();
    assert!(vec3_approx(node.position(), Vec3::new(2.0, 0.0, 0.0)));
    assert!(node.rotation().abs_diff_eq(Quat::from_rotation_y(0.5), EPSILON));
}
