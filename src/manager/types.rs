/*!
 * Segment Manager Types
 * Handles and statistics
 */

use crate::core::types::{Offset, Size};
use crate::index::IndexShape;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

/// Typed reference to a payload inside a managed region.
///
/// A handle is `{payload offset, element count}`. It stays valid across a
/// region grow (unlike raw pointers) and across processes mapping the same
/// region. It does not keep the object alive: the caller is responsible for
/// not racing a concurrent destroy of the same name.
pub struct Handle<T> {
    off: Offset,
    len: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    pub(crate) fn new(off: Offset, len: usize) -> Self {
        Self {
            off,
            len,
            _marker: PhantomData,
        }
    }

    /// Payload offset inside the region.
    pub fn offset(&self) -> Offset {
        self.off
    }

    /// Number of elements constructed under this handle.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> std::fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("offset", &self.off)
            .field("len", &self.len)
            .finish()
    }
}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.off == other.off && self.len == other.len
    }
}

impl<T> Eq for Handle<T> {}

/// Segment statistics snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SegmentStats {
    pub size: Size,
    pub free_memory: Size,
    pub named_objects: usize,
    pub unique_objects: usize,
    pub index_shape: IndexShape,
}
