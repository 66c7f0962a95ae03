// src/dag/graph.rs

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use petgraph::Direction;
use petgraph::algo::has_path_connecting;
use petgraph::graphmap::DiGraphMap;

use crate::dag::identity::NodeIdentity;
use crate::errors::{OpgraphError, Result};

/// Mutable directed graph of opaque node values.
///
/// The direction of an edge carries no meaning here; [`DependencyGraph`]
/// layers "depends on" semantics on top.
///
/// Structure lives in a `DiGraphMap` keyed by node identity, which keeps both
/// the forward and the reverse adjacency of every node, so "edges from" and
/// "edges to" are both direct lookups. Node values are kept in a separate
/// registry keyed the same way.
///
/// A node is known once it has been added as a free node or as either end of
/// an edge. Removing an edge leaves both endpoints known.
///
/// [`DependencyGraph`]: crate::dag::DependencyGraph
pub struct DirectedGraph<T, I: NodeIdentity<T>> {
    structure: DiGraphMap<I::Key, ()>,
    values: HashMap<I::Key, T>,
    allow_self_reference: bool,
    _identity: PhantomData<fn() -> I>,
}

impl<T, I: NodeIdentity<T>> DirectedGraph<T, I> {
    /// Empty graph that rejects `(x, x)` edges.
    pub fn new() -> Self {
        Self::with_self_reference(false)
    }

    pub fn with_self_reference(allow_self_reference: bool) -> Self {
        Self {
            structure: DiGraphMap::new(),
            values: HashMap::new(),
            allow_self_reference,
            _identity: PhantomData,
        }
    }

    /// Register a node without edges.
    ///
    /// Returns `false` if the node was already known; the stored value is kept.
    pub fn add_free_node(&mut self, node: T) -> bool {
        let key = I::key_of(&node);
        if self.values.contains_key(&key) {
            return false;
        }
        self.structure.add_node(key);
        self.values.insert(key, node);
        true
    }

    /// Add the edge `from -> to`, registering unknown endpoints.
    ///
    /// Returns `false` if the edge already existed.
    pub fn add_edge(&mut self, from: T, to: T) -> Result<bool> {
        let from_key = I::key_of(&from);
        let to_key = I::key_of(&to);

        if from_key == to_key && !self.allow_self_reference {
            return Err(OpgraphError::SelfReference(format!(
                "edge from node {from_key:?} to itself"
            )));
        }

        self.add_free_node(from);
        self.add_free_node(to);
        Ok(self.structure.add_edge(from_key, to_key, ()).is_none())
    }

    pub fn remove_edge(&mut self, from: &T, to: &T) -> bool {
        self.structure
            .remove_edge(I::key_of(from), I::key_of(to))
            .is_some()
    }

    /// Remove a node together with every edge that touches it, in both
    /// directions.
    pub fn remove_node(&mut self, node: &T) -> bool {
        let key = I::key_of(node);
        if self.values.remove(&key).is_none() {
            return false;
        }
        self.structure.remove_node(key);
        true
    }

    pub fn has_node(&self, node: &T) -> bool {
        self.values.contains_key(&I::key_of(node))
    }

    pub fn has_edge(&self, from: &T, to: &T) -> bool {
        self.structure
            .contains_edge(I::key_of(from), I::key_of(to))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Known nodes, in registration order (until nodes are removed).
    pub fn nodes(&self) -> impl Iterator<Item = &T> + '_ {
        self.structure
            .nodes()
            .filter_map(move |key| self.values.get(&key))
    }

    pub fn edges(&self) -> impl Iterator<Item = (&T, &T)> + '_ {
        self.structure
            .all_edges()
            .filter_map(move |(from, to, _)| {
                Some((self.values.get(&from)?, self.values.get(&to)?))
            })
    }

    /// Targets of edges leaving `node`. Empty for unknown nodes.
    pub fn edges_from(&self, node: &T) -> impl Iterator<Item = &T> + '_ {
        self.neighbors(I::key_of(node), Direction::Outgoing)
    }

    /// Sources of edges entering `node`. Empty for unknown nodes.
    pub fn edges_to(&self, node: &T) -> impl Iterator<Item = &T> + '_ {
        self.neighbors(I::key_of(node), Direction::Incoming)
    }

    pub fn clear(&mut self) {
        self.structure.clear();
        self.values.clear();
    }

    /// Whether `to` is reachable from `from` along edge direction.
    pub(crate) fn has_path(&self, from: &T, to: &T) -> bool {
        let from_key = I::key_of(from);
        let to_key = I::key_of(to);
        if !self.structure.contains_node(from_key) || !self.structure.contains_node(to_key) {
            return false;
        }
        has_path_connecting(&self.structure, from_key, to_key, None)
    }

    fn neighbors(&self, key: I::Key, dir: Direction) -> impl Iterator<Item = &T> + '_ {
        self.structure
            .neighbors_directed(key, dir)
            .filter_map(move |k| self.values.get(&k))
    }
}

impl<T, I: NodeIdentity<T>> Default for DirectedGraph<T, I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, I: NodeIdentity<T>> fmt::Debug for DirectedGraph<T, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectedGraph")
            .field("nodes", &self.structure.node_count())
            .field("edges", &self.structure.edge_count())
            .field("allow_self_reference", &self.allow_self_reference)
            .finish_non_exhaustive()
    }
}
