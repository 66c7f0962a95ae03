use std::collections::{HashMap, HashSet};

use opgraph::dag::{ByValue, DependencyGraph};
use proptest::prelude::*;

// Acyclic by construction: element N may only depend on elements 0..N-1.
fn dag_strategy(max_nodes: usize) -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1..=max_nodes).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..n), n).prop_map(
            |raw| {
                raw.into_iter()
                    .enumerate()
                    .map(|(i, deps)| {
                        let mut valid: Vec<usize> = if i == 0 {
                            Vec::new()
                        } else {
                            deps.into_iter().map(|d| d % i).collect()
                        };
                        valid.sort_unstable();
                        valid.dedup();
                        valid
                    })
                    .collect()
            },
        )
    })
}

fn build(deps: &[Vec<usize>]) -> DependencyGraph<usize, ByValue> {
    let mut g = DependencyGraph::new();
    for (i, ds) in deps.iter().enumerate() {
        g.register(i);
        for d in ds {
            g.setup_dependency(i, *d).unwrap();
        }
    }
    g
}

proptest! {
    #[test]
    fn test_partitions_are_sound(deps in dag_strategy(12)) {
        let g = build(&deps);
        let partitions = g.partitions_by_dependency_depth(None).unwrap();

        let level_of: HashMap<usize, usize> = partitions
            .iter()
            .flat_map(|p| p.iter().map(move |e| (*e, p.level())))
            .collect();

        for (element, element_deps) in deps.iter().enumerate() {
            for dep in element_deps {
                prop_assert!(
                    level_of[dep] < level_of[&element],
                    "{} (level {}) depends on {} (level {})",
                    element, level_of[&element], dep, level_of[dep]
                );
            }
        }
    }

    #[test]
    fn test_partitions_are_complete(deps in dag_strategy(12)) {
        let g = build(&deps);
        let partitions = g.partitions_by_dependency_depth(None).unwrap();

        let all: Vec<usize> = partitions.iter().flat_map(|p| p.iter().copied()).collect();
        let unique: HashSet<usize> = all.iter().copied().collect();

        prop_assert_eq!(all.len(), unique.len(), "an element appears twice");
        prop_assert_eq!(unique, (0..deps.len()).collect::<HashSet<_>>());
        prop_assert!(partitions.iter().all(|p| !p.is_empty()));
    }

    #[test]
    fn test_closing_any_back_edge_is_detected(deps in dag_strategy(10)) {
        let mut g = build(&deps);
        // Pick the first element with a dependency and point that dependency
        // back at it.
        if let Some((i, d)) = deps
            .iter()
            .enumerate()
            .find_map(|(i, ds)| ds.first().map(|d| (i, *d)))
        {
            prop_assert!(g.would_create_cycle(&d, &i));
            g.setup_dependency(d, i).unwrap();
            prop_assert!(g.partitions_by_dependency_depth(None).is_err());
        }
    }
}
