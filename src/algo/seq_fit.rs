/*!
 * Sequential-Fit Algorithm
 * Default free-list allocator over region offsets
 */

use super::traits::{AllocationChain, AllocationCommand, MemoryAlgorithm, RawAllocation};
use crate::core::limits::{ALLOC_ALIGN, MIN_SEGMENT_SIZE};
use crate::core::types::{align_up, Offset, Size};
use log::warn;
use std::collections::BTreeMap;

/// Sequential-fit free list keyed by offset.
///
/// First-fit allocation with split-on-allocate and eager coalescing on
/// deallocate, so the free map is always sorted, disjoint and maximal.
/// Bookkeeping lives outside the region; the region bytes are entirely the
/// caller's.
#[derive(Debug)]
pub struct SeqFit {
    size: Size,
    base_addr: usize,
    /// offset -> length, coalesced free extents
    free: BTreeMap<Offset, Size>,
    /// offset -> length, outstanding allocations
    allocated: BTreeMap<Offset, Size>,
    free_bytes: Size,
}

fn round(nbytes: Size) -> Size {
    align_up(nbytes.max(1), ALLOC_ALIGN)
}

impl SeqFit {
    /// Merge a returned extent into the free map, coalescing with both
    /// neighbors.
    fn insert_free(&mut self, off: Offset, len: Size) {
        let mut start = off;
        let mut merged = len;
        if let Some((&prev_off, &prev_len)) = self.free.range(..off).next_back() {
            if prev_off + prev_len == off {
                self.free.remove(&prev_off);
                start = prev_off;
                merged += prev_len;
            }
        }
        let end = off + len;
        if let Some(&next_len) = self.free.get(&end) {
            self.free.remove(&end);
            merged += next_len;
        }
        self.free.insert(start, merged);
        self.free_bytes += len;
    }

    /// Carve `nbytes` out of the free extent at `off`, keeping `pad` bytes
    /// of it free in front.
    fn carve(&mut self, off: Offset, pad: Size, nbytes: Size) -> Offset {
        let len = self.free.remove(&off).expect("carving a non-free extent");
        debug_assert!(pad + nbytes <= len);
        if pad > 0 {
            self.free.insert(off, pad);
        }
        let target = off + pad;
        let remainder = len - pad - nbytes;
        if remainder > 0 {
            self.free.insert(target + nbytes, remainder);
        }
        self.allocated.insert(target, nbytes);
        self.free_bytes -= nbytes;
        target
    }

    /// In-place expansion of `off` up to `preferred`, granting at least
    /// `limit`, eating into the adjacent free extent.
    fn expand_in_place(&mut self, off: Offset, limit: Size, preferred: Size) -> Option<Size> {
        let current = *self.allocated.get(&off)?;
        if current >= preferred {
            return Some(current);
        }
        let end = off + current;
        let adjacent = self.free.get(&end).copied().unwrap_or(0);
        if current + adjacent < limit {
            return None;
        }
        let granted = (current + adjacent).min(preferred);
        let need = granted - current;
        if need > 0 {
            self.free.remove(&end);
            let remainder = adjacent - need;
            if remainder > 0 {
                self.free.insert(end + need, remainder);
            }
            self.free_bytes -= need;
        }
        self.allocated.insert(off, granted);
        Some(granted)
    }
}

impl MemoryAlgorithm for SeqFit {
    fn format(size: Size, base_addr: usize) -> Self {
        let usable = size & !(ALLOC_ALIGN - 1);
        let mut free = BTreeMap::new();
        free.insert(0, usable);
        Self {
            size: usable,
            base_addr,
            free,
            allocated: BTreeMap::new(),
            free_bytes: usable,
        }
    }

    fn get_min_size(payload: Size) -> Size {
        round(payload).max(MIN_SEGMENT_SIZE)
    }

    fn allocate(&mut self, nbytes: Size) -> Option<Offset> {
        let nbytes = round(nbytes);
        let (off, _) = self.free.iter().find(|(_, &len)| len >= nbytes)?;
        let off = *off;
        Some(self.carve(off, 0, nbytes))
    }

    fn allocate_aligned(&mut self, nbytes: Size, alignment: Size) -> Option<Offset> {
        assert!(alignment.is_power_of_two(), "alignment must be a power of two");
        if alignment <= ALLOC_ALIGN {
            return self.allocate(nbytes);
        }
        let nbytes = round(nbytes);
        let base = self.base_addr;
        let found = self.free.iter().find_map(|(&off, &len)| {
            let aligned = align_up(base + off, alignment) - base;
            let pad = aligned - off;
            (pad + nbytes <= len).then_some((off, pad))
        })?;
        Some(self.carve(found.0, found.1, nbytes))
    }

    fn deallocate(&mut self, offset: Offset) {
        let len = self
            .allocated
            .remove(&offset)
            .expect("deallocating an offset that is not allocated");
        self.insert_free(offset, len);
    }

    fn size_of(&self, offset: Offset) -> Size {
        *self
            .allocated
            .get(&offset)
            .expect("size_of on an offset that is not allocated")
    }

    fn get_size(&self) -> Size {
        self.size
    }

    fn get_free_memory(&self) -> Size {
        self.free_bytes
    }

    fn grow(&mut self, extra: Size) {
        let new_size = (self.size + extra) & !(ALLOC_ALIGN - 1);
        let delta = new_size - self.size;
        if delta > 0 {
            let old_end = self.size;
            self.size = new_size;
            self.insert_free(old_end, delta);
        }
    }

    fn shrink_to_fit(&mut self) -> Size {
        if let Some((&off, &len)) = self.free.last_key_value() {
            if off + len == self.size {
                let new_size = off.max(MIN_SEGMENT_SIZE);
                let released = self.size - new_size;
                if released > 0 {
                    self.free.remove(&off);
                    let keep = len - released;
                    if keep > 0 {
                        self.free.insert(off, keep);
                    }
                    self.free_bytes -= released;
                    self.size = new_size;
                }
            }
        }
        self.size
    }

    fn rebase(&mut self, base_addr: usize) {
        self.base_addr = base_addr;
    }

    fn free_ranges(&self) -> Vec<(Offset, Size)> {
        self.free.iter().map(|(&off, &len)| (off, len)).collect()
    }

    fn check_sanity(&self) -> bool {
        let mut total_free = 0;
        let mut prev_end: Option<Offset> = None;
        for (&off, &len) in &self.free {
            total_free += len;
            if len == 0 || off + len > self.size {
                return false;
            }
            // coalescing invariant: no two adjacent free extents
            if prev_end == Some(off) {
                return false;
            }
            prev_end = Some(off + len);
        }
        if total_free != self.free_bytes {
            return false;
        }
        // free and allocated extents must not overlap
        let mut extents: Vec<(Offset, Size)> = self
            .free
            .iter()
            .chain(self.allocated.iter())
            .map(|(&off, &len)| (off, len))
            .collect();
        extents.sort_unstable();
        extents.windows(2).all(|w| w[0].0 + w[0].1 <= w[1].0)
    }

    fn all_memory_deallocated(&self) -> bool {
        self.allocated.is_empty() && self.free_bytes == self.size
    }

    fn allocation_command(
        &mut self,
        command: AllocationCommand,
        limit: Size,
        preferred: Size,
        reuse: Option<Offset>,
    ) -> Option<RawAllocation> {
        let limit = round(limit);
        let preferred = round(preferred.max(limit));
        match command {
            AllocationCommand::Shrink => {
                let off = reuse?;
                let current = *self.allocated.get(&off)?;
                if preferred >= current {
                    return Some(RawAllocation {
                        offset: off,
                        received: current,
                        reused: true,
                    });
                }
                self.allocated.insert(off, preferred);
                self.insert_free(off + preferred, current - preferred);
                Some(RawAllocation {
                    offset: off,
                    received: preferred,
                    reused: true,
                })
            }
            AllocationCommand::ExpandInPlace => {
                let off = reuse?;
                let received = self.expand_in_place(off, limit, preferred)?;
                Some(RawAllocation {
                    offset: off,
                    received,
                    reused: true,
                })
            }
            AllocationCommand::ExpandOrNew => {
                if let Some(off) = reuse {
                    if let Some(received) = self.expand_in_place(off, limit, preferred) {
                        return Some(RawAllocation {
                            offset: off,
                            received,
                            reused: true,
                        });
                    }
                }
                self.allocation_command(AllocationCommand::AllocateNew, limit, preferred, None)
            }
            AllocationCommand::AllocateNew => {
                let (offset, received) = match self.allocate(preferred) {
                    Some(off) => (off, preferred),
                    None => (self.allocate(limit)?, limit),
                };
                Some(RawAllocation {
                    offset,
                    received,
                    reused: false,
                })
            }
        }
    }

    fn allocate_many(&mut self, elem_bytes: Size, count: usize) -> Option<AllocationChain> {
        let mut chain = AllocationChain::with_capacity(count);
        for _ in 0..count {
            match self.allocate(elem_bytes) {
                Some(off) => chain.push(off),
                None => {
                    warn!(
                        "allocate_many rolled back after {}/{} blocks of {} bytes",
                        chain.len(),
                        count,
                        elem_bytes
                    );
                    self.deallocate_many(chain);
                    return None;
                }
            }
        }
        Some(chain)
    }

    fn allocate_many_sized(&mut self, sizes: &[Size]) -> Option<AllocationChain> {
        let mut chain = AllocationChain::with_capacity(sizes.len());
        for &nbytes in sizes {
            match self.allocate(nbytes) {
                Some(off) => chain.push(off),
                None => {
                    warn!(
                        "allocate_many_sized rolled back after {}/{} blocks",
                        chain.len(),
                        sizes.len()
                    );
                    self.deallocate_many(chain);
                    return None;
                }
            }
        }
        Some(chain)
    }

    fn deallocate_many(&mut self, chain: AllocationChain) {
        for off in chain {
            self.deallocate(off);
        }
    }
}
