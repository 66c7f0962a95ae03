// src/dag/identity.rs

//! Pluggable node identity for the graph types.
//!
//! Graphs never compare node values with `PartialEq`; they ask a
//! [`NodeIdentity`] rule for a small copyable key and compare keys instead.
//! The key is also what the graph indexes adjacency by, so node values are
//! only ever referenced, never compared structurally.

use std::any::{Any, TypeId};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

/// Equality rule for graph nodes of type `T`.
pub trait NodeIdentity<T: ?Sized> {
    /// Identity key. Two nodes are the same node iff their keys are equal.
    type Key: Copy + Ord + Hash + Debug;

    fn key_of(node: &T) -> Self::Key;

    fn are_equal(a: &T, b: &T) -> bool {
        Self::key_of(a) == Self::key_of(b)
    }
}

/// Reference identity: two handles are equal iff they point at the same
/// allocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByReference;

impl<T: ?Sized> NodeIdentity<Arc<T>> for ByReference {
    type Key = usize;

    fn key_of(node: &Arc<T>) -> usize {
        Arc::as_ptr(node).cast::<()>() as usize
    }
}

/// Type identity: two nodes are equal iff they have the same runtime type.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByType;

impl NodeIdentity<Arc<dyn Any + Send + Sync>> for ByType {
    type Key = TypeId;

    fn key_of(node: &Arc<dyn Any + Send + Sync>) -> TypeId {
        (**node).type_id()
    }
}

impl NodeIdentity<TypeId> for ByType {
    type Key = TypeId;

    fn key_of(node: &TypeId) -> TypeId {
        *node
    }
}

/// Value identity for small copyable values (names, ids, integers).
#[derive(Debug, Clone, Copy, Default)]
pub struct ByValue;

impl<T> NodeIdentity<T> for ByValue
where
    T: Copy + Ord + Hash + Debug,
{
    type Key = T;

    fn key_of(node: &T) -> T {
        *node
    }
}
