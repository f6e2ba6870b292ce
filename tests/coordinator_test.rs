//! Tests for BuildLayoutCoordinator: output relocation and evaluation order

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rstest::{fixture, rstest};

use buildlayout::domain::{BuildLayoutCoordinator, BuildTree, DomainError, EvaluationEdge, ProjectNode};

const PROJECT: &str = "/work/flutter_app/android";

fn tree_with(root: &str, children: &[&str]) -> BuildTree {
    let root = ProjectNode::new(root, format!("{PROJECT}/build"));
    let children = children
        .iter()
        .map(|name| ProjectNode::new(*name, format!("{PROJECT}/{name}/build")))
        .collect();
    BuildTree::new(root, children).expect("valid tree")
}

#[fixture]
fn coordinator() -> BuildLayoutCoordinator {
    BuildLayoutCoordinator::new(tree_with("app", &["pluginA", "pluginB"]))
}

// ============================================================
// relocate_output_directory
// ============================================================

#[rstest]
fn given_two_plugins_when_relocating_then_outputs_land_under_project_parent(
    mut coordinator: BuildLayoutCoordinator,
) {
    coordinator
        .relocate_output_directory(Path::new("../../build"))
        .unwrap();

    let tree = coordinator.finish();
    assert_eq!(
        tree.root().declared_output_dir(),
        Path::new("/work/flutter_app/build")
    );
    assert_eq!(
        tree.node("pluginA").unwrap().declared_output_dir(),
        Path::new("/work/flutter_app/build/pluginA")
    );
    assert_eq!(
        tree.node("pluginB").unwrap().declared_output_dir(),
        Path::new("/work/flutter_app/build/pluginB")
    );
}

#[rstest]
#[case::no_children(&[])]
#[case::one_child(&["app"])]
#[case::many_children(&["app", "camera", "path_provider", "shared_preferences", "url_launcher"])]
fn given_n_children_when_relocating_then_all_outputs_distinct_and_share_root(#[case] children: &[&str]) {
    let mut coordinator = BuildLayoutCoordinator::new(tree_with("android", children));

    let new_root = coordinator
        .relocate_output_directory(Path::new("../../build"))
        .unwrap();

    let tree = coordinator.finish();
    let dirs: Vec<PathBuf> = tree
        .nodes()
        .map(|n| n.declared_output_dir().to_path_buf())
        .collect();
    let unique: HashSet<&PathBuf> = dirs.iter().collect();
    assert_eq!(dirs.len(), children.len() + 1);
    assert_eq!(unique.len(), dirs.len(), "output dirs must be pairwise distinct");
    for dir in &dirs {
        assert!(dir.starts_with(&new_root), "{} not under {}", dir.display(), new_root.display());
    }
    for child in tree.children() {
        assert_eq!(child.declared_output_dir().parent(), Some(new_root.as_path()));
    }
}

#[rstest]
#[case("../../build")]
#[case("out")]
#[case("./../shared/./build")]
fn given_same_offset_when_relocating_twice_then_result_unchanged(#[case] offset: &str) {
    let mut once = BuildLayoutCoordinator::new(tree_with("app", &["pluginA", "pluginB"]));
    let mut twice = BuildLayoutCoordinator::new(tree_with("app", &["pluginA", "pluginB"]));

    once.relocate_output_directory(Path::new(offset)).unwrap();
    twice.relocate_output_directory(Path::new(offset)).unwrap();
    twice.relocate_output_directory(Path::new(offset)).unwrap();

    let once = once.finish();
    let twice = twice.finish();
    for (a, b) in once.nodes().zip(twice.nodes()) {
        assert_eq!(a.declared_output_dir(), b.declared_output_dir());
    }
}

#[rstest]
#[case::absolute("/tmp/build")]
#[case::empty("")]
#[case::above_root("../../../../../../build")]
#[case::filesystem_root("../../../..")]
fn given_malformed_offset_when_relocating_then_invalid_path(#[case] offset: &str) {
    let mut coordinator = BuildLayoutCoordinator::new(tree_with("app", &["pluginA"]));

    let err = coordinator
        .relocate_output_directory(Path::new(offset))
        .unwrap_err();

    assert!(matches!(err, DomainError::InvalidPath { .. }), "got {err:?}");
    assert_eq!(
        coordinator.tree().node("pluginA").unwrap().declared_output_dir(),
        Path::new("/work/flutter_app/android/pluginA/build"),
        "failed relocation must not touch the tree"
    );
}

#[test]
fn given_relative_root_output_when_relocating_then_invalid_path() {
    let tree = BuildTree::new(ProjectNode::new("android", "build"), vec![]).unwrap();
    let mut coordinator = BuildLayoutCoordinator::new(tree);

    let err = coordinator
        .relocate_output_directory(Path::new("../../build"))
        .unwrap_err();

    assert!(matches!(err, DomainError::InvalidPath { .. }));
}

// ============================================================
// enforce_evaluation_order
// ============================================================

#[rstest]
fn given_edge_when_adding_reverse_edge_then_cycle_and_graph_unchanged(
    mut coordinator: BuildLayoutCoordinator,
) {
    coordinator.enforce_evaluation_order("pluginA", "app").unwrap();

    let err = coordinator
        .enforce_evaluation_order("app", "pluginA")
        .unwrap_err();

    assert!(matches!(err, DomainError::CyclicDependency { .. }));
    let tree = coordinator.finish();
    assert_eq!(
        tree.evaluation_edges(),
        vec![EvaluationEdge {
            dependent: "pluginA".into(),
            required: "app".into(),
        }]
    );
    assert!(tree.node("app").unwrap().evaluation_dependencies().is_empty());
}

#[rstest]
fn given_chain_when_closing_indirect_cycle_then_rejected(mut coordinator: BuildLayoutCoordinator) {
    coordinator.enforce_evaluation_order("pluginA", "app").unwrap();
    coordinator.enforce_evaluation_order("pluginB", "pluginA").unwrap();

    let err = coordinator
        .enforce_evaluation_order("app", "pluginB")
        .unwrap_err();

    match err {
        DomainError::CyclicDependency {
            dependent,
            required,
            cycle,
        } => {
            assert_eq!(dependent, "app");
            assert_eq!(required, "pluginB");
            assert_eq!(cycle, vec!["app", "pluginA", "pluginB", "app"]);
        }
        other => panic!("expected cycle, got {other:?}"),
    }
    assert_eq!(coordinator.tree().evaluation_edges().len(), 2);
}

#[rstest]
fn given_unknown_module_when_enforcing_order_then_unknown_node(mut coordinator: BuildLayoutCoordinator) {
    let err = coordinator
        .enforce_evaluation_order("pluginA", "pluginZ")
        .unwrap_err();
    assert_eq!(err, DomainError::UnknownNode("pluginZ".into()));

    let err = coordinator
        .enforce_evaluation_order("ghost", "app")
        .unwrap_err();
    assert_eq!(err, DomainError::UnknownNode("ghost".into()));
}

#[test]
fn given_arbitrary_edge_sequence_when_enforcing_then_graph_stays_acyclic() {
    let names = ["a", "b", "c", "d", "e"];
    let mut coordinator = BuildLayoutCoordinator::new(tree_with("root", &names));

    // Each pair in both directions; the second direction always closes a cycle.
    let mut accepted = 0;
    let mut rejected = 0;
    for (i, dependent) in names.iter().enumerate() {
        for required in names.iter().skip(i) {
            for (d, r) in [(dependent, required), (required, dependent)] {
                let before = coordinator.tree().evaluation_edges();
                match coordinator.enforce_evaluation_order(d, r) {
                    Ok(()) => accepted += 1,
                    Err(DomainError::CyclicDependency { .. }) => {
                        rejected += 1;
                        assert_eq!(coordinator.tree().evaluation_edges(), before);
                    }
                    Err(other) => panic!("unexpected error: {other}"),
                }
            }
        }
    }

    let tree = coordinator.finish();
    assert!(accepted > 0 && rejected > 0);
    // A valid topological order exists and respects every edge.
    let order = tree.configuration_order();
    assert_eq!(order.len(), tree.module_count());
    let pos = |n: &str| order.iter().position(|o| o == n).unwrap();
    for edge in tree.evaluation_edges() {
        assert!(pos(&edge.required) < pos(&edge.dependent), "{edge:?} violated");
    }
}

#[test]
fn given_primary_first_when_querying_concurrency_then_only_siblings_parallel() {
    let mut coordinator = BuildLayoutCoordinator::new(tree_with("android", &["app", "pluginA", "pluginB"]));

    coordinator.enforce_primary_first("app").unwrap();

    let tree = coordinator.finish();
    assert!(!tree.may_configure_concurrently("app", "pluginA").unwrap());
    assert!(tree.may_configure_concurrently("pluginA", "pluginB").unwrap());
    assert!(tree.may_configure_concurrently("android", "pluginA").unwrap());
}

#[rstest]
fn given_primary_is_root_when_enforcing_primary_first_then_children_wait_for_root(
    mut coordinator: BuildLayoutCoordinator,
) {
    coordinator.enforce_primary_first("app").unwrap();

    let tree = coordinator.finish();
    assert_eq!(
        tree.configuration_waves(),
        vec![vec!["app".to_string()], vec!["pluginA".to_string(), "pluginB".to_string()]]
    );
}
