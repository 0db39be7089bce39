/*!
 * Memory Algorithm Traits
 * The surface a raw allocator must expose to the segment manager
 */

use crate::core::types::{Offset, Size};

/// Requested behavior for [`MemoryAlgorithm::allocation_command`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationCommand {
    /// Shrink the reused block in place; never moves
    Shrink,
    /// Expand the reused block in place; never moves
    ExpandInPlace,
    /// Expand in place when the neighbor allows it, else allocate fresh
    ExpandOrNew,
    /// Plain fresh allocation
    AllocateNew,
}

/// A satisfied allocation command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawAllocation {
    pub offset: Offset,
    /// Bytes actually granted; at least the command's limit
    pub received: Size,
    /// Whether the reuse block was kept in place
    pub reused: bool,
}

/// Batch of offsets produced by allocate_many
pub type AllocationChain = Vec<Offset>;

/// Raw allocator over a fixed byte range, offset-based.
///
/// Null-on-failure convention: every fallible call returns `None` and the
/// facade above decides whether that surfaces as an error. Implementations
/// hand out offsets aligned to [`crate::core::limits::ALLOC_ALIGN`]; payload
/// alignments above that are computed against the real base address the
/// algorithm was formatted with.
pub trait MemoryAlgorithm: Send {
    /// Create an algorithm managing `size` bytes based at `base_addr`.
    fn format(size: Size, base_addr: usize) -> Self
    where
        Self: Sized;

    /// Smallest region able to hold `payload` user bytes.
    fn get_min_size(payload: Size) -> Size
    where
        Self: Sized;

    fn allocate(&mut self, nbytes: Size) -> Option<Offset>;

    fn allocate_aligned(&mut self, nbytes: Size, alignment: Size) -> Option<Offset>;

    fn deallocate(&mut self, offset: Offset);

    /// Usable size of the allocated block at `offset`.
    fn size_of(&self, offset: Offset) -> Size;

    fn get_size(&self) -> Size;

    fn get_free_memory(&self) -> Size;

    /// Extend the managed range by `extra` bytes (the region grew).
    fn grow(&mut self, extra: Size);

    /// Release trailing free space; returns the new managed size.
    fn shrink_to_fit(&mut self) -> Size;

    /// The region base moved (owned region reallocated).
    fn rebase(&mut self, base_addr: usize);

    /// Free extents, for zeroing and diagnostics.
    fn free_ranges(&self) -> Vec<(Offset, Size)>;

    /// Internal bookkeeping is consistent.
    fn check_sanity(&self) -> bool;

    /// No allocation is outstanding.
    fn all_memory_deallocated(&self) -> bool;

    /// In-place resize protocol: shrink, expand in place, or allocate new,
    /// granting between `limit` and `preferred` bytes.
    fn allocation_command(
        &mut self,
        command: AllocationCommand,
        limit: Size,
        preferred: Size,
        reuse: Option<Offset>,
    ) -> Option<RawAllocation>;

    /// Allocate `count` blocks of `elem_bytes` each; all or nothing.
    fn allocate_many(&mut self, elem_bytes: Size, count: usize) -> Option<AllocationChain>;

    /// Allocate one block per entry of `sizes`; all or nothing.
    fn allocate_many_sized(&mut self, sizes: &[Size]) -> Option<AllocationChain>;

    /// Release a chain produced by allocate_many.
    fn deallocate_many(&mut self, chain: AllocationChain);
}
