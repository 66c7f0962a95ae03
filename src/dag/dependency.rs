// src/dag/dependency.rs

//! Dependency semantics and topological layering on top of [`DirectedGraph`].
//!
//! An edge `from -> to` means "`from` depends on `to`": `from` may not start
//! before `to` has finished.

use std::any::type_name;
use std::collections::HashSet;
use std::fmt;

use tracing::{debug, trace};

use crate::dag::graph::DirectedGraph;
use crate::dag::identity::NodeIdentity;
use crate::errors::{OpgraphError, Result};

/// Elements sharing one dependency depth.
///
/// Every dependency of an element in the partition at `level` k lives in a
/// partition with a lower level. Elements inside one partition carry no
/// ordering guarantee relative to each other.
#[derive(Debug, Clone)]
pub struct DependencyPartition<T> {
    level: usize,
    elements: Vec<T>,
}

impl<T> DependencyPartition<T> {
    /// 1-based depth.
    pub fn level(&self) -> usize {
        self.level
    }

    pub fn elements(&self) -> &[T] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.elements.iter()
    }
}

impl<T> IntoIterator for DependencyPartition<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a DependencyPartition<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

/// Graph of elements with "depends on" edges.
pub struct DependencyGraph<T, I: NodeIdentity<T>> {
    graph: DirectedGraph<T, I>,
}

impl<T, I> DependencyGraph<T, I>
where
    T: Clone + fmt::Debug,
    I: NodeIdentity<T>,
{
    pub fn new() -> Self {
        Self {
            graph: DirectedGraph::with_self_reference(false),
        }
    }

    /// Register an element with no dependencies. Idempotent.
    pub fn register(&mut self, element: T) -> bool {
        self.graph.add_free_node(element)
    }

    /// Declare that `from` depends on `to`. Unknown elements are registered.
    pub fn setup_dependency(&mut self, from: T, to: T) -> Result<()> {
        if I::are_equal(&from, &to) {
            return Err(OpgraphError::SelfDependency(format!(
                "{from:?} cannot depend on itself"
            )));
        }
        if self.graph.add_edge(from.clone(), to.clone())? {
            trace!(from = ?from, to = ?to, "dependency registered");
        }
        Ok(())
    }

    /// Whether declaring `from` depends on `to` would close a cycle.
    pub fn would_create_cycle(&self, from: &T, to: &T) -> bool {
        I::are_equal(from, to) || self.graph.has_path(to, from)
    }

    pub fn remove_dependency(&mut self, from: &T, to: &T) -> bool {
        self.graph.remove_edge(from, to)
    }

    pub fn remove(&mut self, element: &T) -> bool {
        self.graph.remove_node(element)
    }

    pub fn contains(&self, element: &T) -> bool {
        self.graph.has_node(element)
    }

    pub fn known_elements(&self) -> impl Iterator<Item = &T> + '_ {
        self.graph.nodes()
    }

    /// What `element` directly depends on.
    pub fn dependencies_of(&self, element: &T) -> impl Iterator<Item = &T> + '_ {
        self.graph.edges_from(element)
    }

    /// What directly depends on `element`.
    pub fn dependents_of(&self, element: &T) -> impl Iterator<Item = &T> + '_ {
        self.graph.edges_to(element)
    }

    /// `roots` plus everything they transitively depend on.
    pub fn dependency_closure(&self, roots: &[T]) -> Vec<T> {
        let mut seen: HashSet<I::Key> = HashSet::new();
        let mut closure = Vec::new();
        let mut stack: Vec<T> = roots.to_vec();

        while let Some(element) = stack.pop() {
            if !seen.insert(I::key_of(&element)) {
                continue;
            }
            stack.extend(self.graph.edges_from(&element).cloned());
            closure.push(element);
        }

        closure
    }

    pub fn len(&self) -> usize {
        self.graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    pub fn clear(&mut self) {
        self.graph.clear();
    }

    /// Group elements into partitions by dependency depth.
    ///
    /// With `Some(subset)`, only those elements are layered; dependencies
    /// that fall outside the subset count as already satisfied.
    ///
    /// Fails with [`OpgraphError::DependencyCycle`] naming every element that
    /// could not be placed. At most one round per element is attempted, so a
    /// cycle can never make this loop forever.
    pub fn partitions_by_dependency_depth(
        &self,
        subset: Option<&[T]>,
    ) -> Result<Vec<DependencyPartition<T>>> {
        let mut remaining: Vec<T> = Vec::new();
        let mut requested: HashSet<I::Key> = HashSet::new();
        let candidates: Box<dyn Iterator<Item = &T> + '_> = match subset {
            Some(elements) => Box::new(elements.iter()),
            None => Box::new(self.graph.nodes()),
        };
        for element in candidates {
            if requested.insert(I::key_of(element)) {
                remaining.push(element.clone());
            }
        }

        let rounds = remaining.len();
        let mut treated: HashSet<I::Key> = HashSet::with_capacity(rounds);
        let mut partitions: Vec<DependencyPartition<T>> = Vec::new();

        for _ in 0..rounds {
            if remaining.is_empty() {
                break;
            }

            let (ready, blocked): (Vec<T>, Vec<T>) =
                remaining.into_iter().partition(|element| {
                    self.graph.edges_from(element).all(|dep| {
                        let key = I::key_of(dep);
                        treated.contains(&key) || !requested.contains(&key)
                    })
                });

            if ready.is_empty() {
                return Err(cycle_error(&blocked));
            }

            treated.extend(ready.iter().map(I::key_of));
            let level = partitions.len() + 1;
            debug!(level, size = ready.len(), "dependency partition computed");
            partitions.push(DependencyPartition {
                level,
                elements: ready,
            });
            remaining = blocked;
        }

        if !remaining.is_empty() {
            return Err(cycle_error(&remaining));
        }

        Ok(partitions)
    }
}

impl<T, I> Default for DependencyGraph<T, I>
where
    T: Clone + fmt::Debug,
    I: NodeIdentity<T>,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, I: NodeIdentity<T>> fmt::Debug for DependencyGraph<T, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyGraph")
            .field("graph", &self.graph)
            .finish()
    }
}

fn cycle_error<T: fmt::Debug>(stuck: &[T]) -> OpgraphError {
    let names = stuck
        .iter()
        .map(|e| format!("{e:?}"))
        .collect::<Vec<_>>()
        .join(", ");
    OpgraphError::DependencyCycle(format!(
        "{} element(s) of type `{}` have unresolvable dependencies: [{}]",
        stuck.len(),
        type_name::<T>(),
        names
    ))
}
