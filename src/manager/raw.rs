/*!
 * Raw Allocation Facade
 * Throwing/non-throwing pass-throughs and the anonymous-object protocol
 */

use super::SegmentManager;
use crate::algo::{AllocationChain, AllocationCommand, MemoryAlgorithm, RawAllocation};
use crate::block::{BlockHeader, BlockPlacement, CtorTable};
use crate::core::errors::SegmentError;
use crate::core::types::{ObjectKind, Offset, SegmentResult, Size};

impl<A: MemoryAlgorithm> SegmentManager<A> {
    /// Allocate `nbytes` raw bytes; `None` when the algorithm has no block.
    pub fn try_allocate(&self, nbytes: Size) -> Option<Offset> {
        self.mem_lock().allocate(nbytes)
    }

    /// Allocate `nbytes` raw bytes, raising [`SegmentError::OutOfMemory`].
    pub fn allocate(&self, nbytes: Size) -> SegmentResult<Offset> {
        self.try_allocate(nbytes).ok_or_else(|| self.oom(nbytes))
    }

    /// Aligned variant of [`SegmentManager::try_allocate`].
    pub fn try_allocate_aligned(&self, nbytes: Size, alignment: Size) -> Option<Offset> {
        self.mem_lock().allocate_aligned(nbytes, alignment)
    }

    /// Aligned variant of [`SegmentManager::allocate`].
    pub fn allocate_aligned(&self, nbytes: Size, alignment: Size) -> SegmentResult<Offset> {
        self.try_allocate_aligned(nbytes, alignment)
            .ok_or_else(|| self.oom(nbytes))
    }

    /// Release a block obtained from the raw allocation surface.
    pub fn deallocate(&self, offset: Offset) {
        self.mem_lock().deallocate(offset)
    }

    /// Usable size of the allocated block at `offset`.
    pub fn size_of(&self, offset: Offset) -> Size {
        self.mem_lock().size_of(offset)
    }

    /// In-place resize protocol; `None` when the command cannot be met.
    pub fn try_allocation_command(
        &self,
        command: AllocationCommand,
        limit: Size,
        preferred: Size,
        reuse: Option<Offset>,
    ) -> Option<RawAllocation> {
        self.mem_lock()
            .allocation_command(command, limit, preferred, reuse)
    }

    /// In-place resize protocol, raising [`SegmentError::OutOfMemory`].
    pub fn allocation_command(
        &self,
        command: AllocationCommand,
        limit: Size,
        preferred: Size,
        reuse: Option<Offset>,
    ) -> SegmentResult<RawAllocation> {
        self.try_allocation_command(command, limit, preferred, reuse)
            .ok_or_else(|| self.oom(preferred))
    }

    /// Untyped resize protocol: limits and results counted in elements of
    /// `elem_size` bytes.
    pub fn raw_allocation_command(
        &self,
        command: AllocationCommand,
        limit_elems: Size,
        preferred_elems: Size,
        reuse: Option<Offset>,
        elem_size: Size,
    ) -> SegmentResult<RawAllocation> {
        let limit = limit_elems
            .checked_mul(elem_size)
            .ok_or(SegmentError::Overflow {
                count: limit_elems,
                elem_size,
            })?;
        let preferred = preferred_elems
            .checked_mul(elem_size)
            .ok_or(SegmentError::Overflow {
                count: preferred_elems,
                elem_size,
            })?;
        let raw = self.allocation_command(command, limit, preferred, reuse)?;
        Ok(RawAllocation {
            offset: raw.offset,
            received: raw.received / elem_size,
            reused: raw.reused,
        })
    }

    /// Batch-allocate `count` blocks of `elem_bytes`; all or nothing.
    pub fn try_allocate_many(&self, elem_bytes: Size, count: usize) -> Option<AllocationChain> {
        self.mem_lock().allocate_many(elem_bytes, count)
    }

    /// Raising variant of [`SegmentManager::try_allocate_many`].
    pub fn allocate_many(&self, elem_bytes: Size, count: usize) -> SegmentResult<AllocationChain> {
        self.try_allocate_many(elem_bytes, count)
            .ok_or_else(|| self.oom(elem_bytes.saturating_mul(count)))
    }

    /// Batch-allocate one block per entry of `sizes`; all or nothing.
    pub fn try_allocate_many_sized(&self, sizes: &[Size]) -> Option<AllocationChain> {
        self.mem_lock().allocate_many_sized(sizes)
    }

    /// Raising variant of [`SegmentManager::try_allocate_many_sized`].
    pub fn allocate_many_sized(&self, sizes: &[Size]) -> SegmentResult<AllocationChain> {
        self.try_allocate_many_sized(sizes)
            .ok_or_else(|| self.oom(sizes.iter().sum()))
    }

    /// Release a chain produced by the batch calls.
    pub fn deallocate_many(&self, chain: AllocationChain) {
        self.mem_lock().deallocate_many(chain)
    }

    /// Write zeros over every free extent.
    pub fn zero_free_memory(&self) {
        let algo = self.mem_lock();
        for (off, len) in algo.free_ranges() {
            self.region().zero_range(off, len);
        }
    }

    /// The algorithm's bookkeeping is consistent.
    pub fn check_sanity(&self) -> bool {
        self.mem_lock().check_sanity()
    }

    /// No allocation (raw, anonymous, named or unique) is outstanding.
    pub fn all_memory_deallocated(&self) -> bool {
        self.mem_lock().all_memory_deallocated()
    }

    /// Build `count` anonymous elements in one combined header+payload
    /// block. The object is reachable only through the returned offset.
    ///
    /// A failed element constructor tears down the partial array and
    /// releases the block before the error surfaces.
    pub(crate) fn anonymous_construct(
        &self,
        count: usize,
        table: &mut CtorTable<'_>,
    ) -> SegmentResult<(Offset, usize)> {
        let value_bytes = count
            .checked_mul(table.elem_size)
            .ok_or(SegmentError::Overflow {
                count,
                elem_size: table.elem_size,
            })?;
        let total = BlockPlacement::total_size(0, value_bytes, table.elem_align)?;
        let block_off = self.try_allocate(total).ok_or_else(|| self.oom(total))?;

        let region = self.region();
        let placement =
            BlockPlacement::resolve(region.base_addr(), block_off, 0, table.elem_align);
        let mut header = BlockHeader::new(
            value_bytes,
            table.elem_size,
            table.elem_align,
            ObjectKind::Anonymous,
            0,
        );
        header.back_pad = placement.back_pad();
        header.encode_at(region, placement.header_off);

        match table.construct(region.ptr_at(placement.payload_off), count) {
            Ok(()) => Ok((placement.payload_off, count)),
            Err(e) => {
                // no partial object survives a failed construction
                self.deallocate(block_off);
                Err(e)
            }
        }
    }

    /// Destroy an anonymous object through its payload offset.
    pub(crate) fn anonymous_destroy(&self, payload_off: Offset, table: &CtorTable<'_>) {
        let region = self.region();
        let header_off = BlockHeader::header_offset(payload_off);
        let header = BlockHeader::decode_at(region, header_off);
        assert!(
            header.kind == ObjectKind::Anonymous,
            "offset does not refer to an anonymous object"
        );
        assert_eq!(
            header.elem_size as usize, table.elem_size,
            "anonymous destroy with mismatched element type"
        );
        let count = header.count();
        // SAFETY: the header says `count` live elements of the table's type
        // start at the payload offset; they are torn down exactly once.
        unsafe { table.destroy(region.ptr_at(payload_off), count) };
        self.deallocate(header.block_offset(header_off));
    }

    fn mem_lock(&self) -> parking_lot::MutexGuard<'_, A> {
        self.mem.algo.lock()
    }
}
