/*!
 * Typed Convenience Wrappers
 * Allocator and deleter factories bound to a segment manager
 */

use super::types::Handle;
use super::SegmentManager;
use crate::algo::MemoryAlgorithm;
use crate::core::errors::SegmentError;
use crate::core::types::SegmentResult;
use std::marker::PhantomData;
use std::mem::{align_of, size_of};

/// Raw typed array allocator for container-style use.
///
/// Allocates capacity, not objects: no constructors run and no block header
/// is written, so these handles must go back through
/// [`TypedAllocator::deallocate`], never through destroy.
pub struct TypedAllocator<'a, T, A: MemoryAlgorithm> {
    mgr: &'a SegmentManager<A>,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T, A: MemoryAlgorithm> TypedAllocator<'a, T, A> {
    pub(crate) fn new(mgr: &'a SegmentManager<A>) -> Self {
        Self {
            mgr,
            _marker: PhantomData,
        }
    }

    /// Allocate uninitialized capacity for `count` elements.
    pub fn allocate(&self, count: usize) -> SegmentResult<Handle<T>> {
        let bytes = count
            .checked_mul(size_of::<T>())
            .ok_or(SegmentError::Overflow {
                count,
                elem_size: size_of::<T>(),
            })?;
        let off = self.mgr.allocate_aligned(bytes, align_of::<T>())?;
        Ok(Handle::new(off, count))
    }

    /// Release capacity obtained from [`TypedAllocator::allocate`].
    pub fn deallocate(&self, handle: Handle<T>) {
        self.mgr.deallocate(handle.offset());
    }
}

impl<'a, T, A: MemoryAlgorithm> Clone for TypedAllocator<'a, T, A> {
    fn clone(&self) -> Self {
        Self::new(self.mgr)
    }
}

/// Deleter for constructed objects, for scoped-ownership wrappers.
pub struct TypedDeleter<'a, T, A: MemoryAlgorithm> {
    mgr: &'a SegmentManager<A>,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T, A: MemoryAlgorithm> TypedDeleter<'a, T, A> {
    pub(crate) fn new(mgr: &'a SegmentManager<A>) -> Self {
        Self {
            mgr,
            _marker: PhantomData,
        }
    }

    /// Destroy the object behind `handle`, whatever kind it was published
    /// as.
    pub fn destroy(&self, handle: Handle<T>) {
        self.mgr.destroy_handle(handle);
    }
}

impl<'a, T, A: MemoryAlgorithm> Clone for TypedDeleter<'a, T, A> {
    fn clone(&self) -> Self {
        Self::new(self.mgr)
    }
}
