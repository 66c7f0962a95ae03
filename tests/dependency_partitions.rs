use std::any::{Any, TypeId};
use std::collections::HashSet;
use std::sync::Arc;

use opgraph::dag::{ByType, DependencyGraph};
use opgraph::errors::OpgraphError;

mod common;
use common::{NameGraph, TestResult};

fn sorted(partition: &[&'static str]) -> Vec<&'static str> {
    let mut v = partition.to_vec();
    v.sort_unstable();
    v
}

#[test]
fn test_diamond_layers_by_depth() -> TestResult {
    // top depends on left + right, both depend on base.
    let mut g = NameGraph::new();
    g.setup_dependency("top", "left")?;
    g.setup_dependency("top", "right")?;
    g.setup_dependency("left", "base")?;
    g.setup_dependency("right", "base")?;

    let partitions = g.partitions_by_dependency_depth(None)?;
    let layers: Vec<Vec<&str>> = partitions.iter().map(|p| sorted(p.elements())).collect();

    assert_eq!(layers, vec![vec!["base"], vec!["left", "right"], vec!["top"]]);
    let levels: Vec<usize> = partitions.iter().map(|p| p.level()).collect();
    assert_eq!(levels, vec![1, 2, 3]);
    Ok(())
}

#[test]
fn test_free_nodes_land_in_first_partition() -> TestResult {
    let mut g = NameGraph::new();
    assert!(g.register("solo"));
    assert!(!g.register("solo"), "register is idempotent");
    g.setup_dependency("b", "a")?;

    let partitions = g.partitions_by_dependency_depth(None)?;
    assert_eq!(sorted(partitions[0].elements()), vec!["a", "solo"]);
    assert_eq!(sorted(partitions[1].elements()), vec!["b"]);
    Ok(())
}

#[test]
fn test_empty_graph_has_no_partitions() -> TestResult {
    let g = NameGraph::new();
    assert!(g.partitions_by_dependency_depth(None)?.is_empty());
    Ok(())
}

#[test]
fn test_two_cycle_fails_and_names_both() {
    let mut g = NameGraph::new();
    g.setup_dependency("a", "b").unwrap();
    g.setup_dependency("b", "a").unwrap();

    match g.partitions_by_dependency_depth(None) {
        Err(OpgraphError::DependencyCycle(msg)) => {
            assert!(msg.contains("\"a\""), "message was: {msg}");
            assert!(msg.contains("\"b\""), "message was: {msg}");
            assert!(msg.contains("&str"), "message names the element type: {msg}");
        }
        other => panic!("expected DependencyCycle, got {:?}", other),
    }
}

#[test]
fn test_cycle_behind_healthy_prefix_still_fails() {
    let mut g = NameGraph::new();
    g.setup_dependency("x", "root").unwrap();
    g.setup_dependency("y", "x").unwrap();
    g.setup_dependency("z", "y").unwrap();
    g.setup_dependency("x", "z").unwrap();

    match g.partitions_by_dependency_depth(None) {
        Err(OpgraphError::DependencyCycle(msg)) => {
            assert!(!msg.contains("\"root\""), "root is resolvable: {msg}");
            assert!(msg.starts_with("3 element(s)"), "message was: {msg}");
        }
        other => panic!("expected DependencyCycle, got {:?}", other),
    }
}

#[test]
fn test_self_dependency_rejected_at_declaration() {
    let mut g = NameGraph::new();
    match g.setup_dependency("a", "a") {
        Err(OpgraphError::SelfDependency(_)) => {}
        other => panic!("expected SelfDependency, got {:?}", other),
    }
    assert!(!g.contains(&"a"));
}

#[test]
fn test_subset_treats_outside_dependencies_as_satisfied() -> TestResult {
    let mut g = NameGraph::new();
    g.setup_dependency("b", "a")?;
    g.setup_dependency("c", "b")?;

    let partitions = g.partitions_by_dependency_depth(Some(&["c", "b"][..]))?;
    let layers: Vec<Vec<&str>> = partitions.iter().map(|p| sorted(p.elements())).collect();
    assert_eq!(layers, vec![vec!["b"], vec!["c"]]);
    Ok(())
}

#[test]
fn test_dependency_closure_and_neighbours() -> TestResult {
    let mut g = NameGraph::new();
    g.setup_dependency("app", "lib")?;
    g.setup_dependency("lib", "core")?;
    g.setup_dependency("tests", "app")?;
    g.register("docs");

    let closure: HashSet<&str> = g.dependency_closure(&["app"]).into_iter().collect();
    assert_eq!(closure, HashSet::from(["app", "lib", "core"]));

    assert_eq!(g.dependencies_of(&"app").copied().collect::<Vec<_>>(), vec!["lib"]);
    assert_eq!(g.dependents_of(&"app").copied().collect::<Vec<_>>(), vec!["tests"]);
    assert!(g.would_create_cycle(&"core", &"tests"));
    assert!(!g.would_create_cycle(&"docs", &"tests"));
    Ok(())
}

#[test]
fn test_remove_element_unblocks_dependents() -> TestResult {
    let mut g = NameGraph::new();
    g.setup_dependency("a", "b")?;
    g.setup_dependency("b", "a")?;
    assert!(g.partitions_by_dependency_depth(None).is_err());

    assert!(g.remove_dependency(&"b", &"a"));
    let partitions = g.partitions_by_dependency_depth(None)?;
    assert_eq!(partitions.len(), 2);

    assert!(g.remove(&"b"));
    let partitions = g.partitions_by_dependency_depth(None)?;
    assert_eq!(partitions.len(), 1);
    assert_eq!(partitions[0].elements(), &["a"]);
    Ok(())
}

struct Database;
struct Cache;
struct Api;

#[test]
fn test_type_graph_uses_type_identity() -> TestResult {
    let mut g: DependencyGraph<TypeId, ByType> = DependencyGraph::new();
    g.setup_dependency(TypeId::of::<Api>(), TypeId::of::<Cache>())?;
    g.setup_dependency(TypeId::of::<Cache>(), TypeId::of::<Database>())?;
    g.setup_dependency(TypeId::of::<Api>(), TypeId::of::<Database>())?;

    let partitions = g.partitions_by_dependency_depth(None)?;
    assert_eq!(partitions.len(), 3);
    assert_eq!(partitions[0].elements(), &[TypeId::of::<Database>()]);
    assert_eq!(partitions[2].elements(), &[TypeId::of::<Api>()]);
    Ok(())
}

#[test]
fn test_instances_of_one_type_are_one_node() -> TestResult {
    let mut g: DependencyGraph<Arc<dyn Any + Send + Sync>, ByType> = DependencyGraph::new();
    let first: Arc<dyn Any + Send + Sync> = Arc::new(Cache);
    let second: Arc<dyn Any + Send + Sync> = Arc::new(Cache);
    let db: Arc<dyn Any + Send + Sync> = Arc::new(Database);

    assert!(g.register(first));
    assert!(!g.register(Arc::clone(&second)));
    assert!(g.setup_dependency(Arc::clone(&second), Arc::clone(&second)).is_err());

    g.setup_dependency(second, db)?;
    assert_eq!(g.len(), 2);
    Ok(())
}
