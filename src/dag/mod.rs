// src/dag/mod.rs

//! Graph building blocks.
//!
//! - [`identity`] defines the pluggable equality rule graphs use for nodes.
//! - [`graph`] holds a generic mutable directed graph.
//! - [`dependency`] adds "depends on" semantics and layers elements into
//!   ordered partitions by dependency depth.

pub mod dependency;
pub mod graph;
pub mod identity;

pub use dependency::{DependencyGraph, DependencyPartition};
pub use graph::DirectedGraph;
pub use identity::{ByReference, ByType, ByValue, NodeIdentity};
