/*!
 * Intrusive Index
 * Sorted offsets whose keys live inside the blocks themselves
 */

use super::types::{DirEntry, InsertCommit};
use crate::block::BlockHeader;
use crate::core::errors::SegmentError;
use crate::core::region::Region;
use crate::core::types::{Offset, SegmentResult};

/// Ordered index whose entry node is the block itself.
///
/// Holds only header offsets, sorted by the name bytes stored inside each
/// block. No per-entry key allocation: comparisons read the committed name
/// straight out of the region, which is why every method that compares
/// takes the region and must run under the directory lock.
#[derive(Debug, Default)]
pub(crate) struct IntrusiveIndex {
    entries: Vec<Offset>,
}

fn stored_name<'r>(region: &'r Region, header_off: Offset) -> &'r [u8] {
    let hdr = BlockHeader::decode_at(region, header_off);
    hdr.name_bytes(region, header_off)
}

impl IntrusiveIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, name: &str, region: &Region) -> Option<Offset> {
        self.entries
            .binary_search_by(|&h| stored_name(region, h).cmp(name.as_bytes()))
            .ok()
            .map(|pos| self.entries[pos])
    }

    pub fn insert_check(&self, name: &str, region: &Region) -> Result<InsertCommit, Offset> {
        match self
            .entries
            .binary_search_by(|&h| stored_name(region, h).cmp(name.as_bytes()))
        {
            Ok(pos) => Err(self.entries[pos]),
            Err(slot) => Ok(InsertCommit { slot }),
        }
    }

    /// Splice the stabilized header offset at the position located by
    /// `insert_check`. The block's name bytes must already be written.
    pub fn insert_commit(&mut self, header: Offset, commit: InsertCommit) {
        self.entries.insert(commit.slot, header);
    }

    pub fn erase(&mut self, name: &str, region: &Region) -> Option<Offset> {
        self.entries
            .binary_search_by(|&h| stored_name(region, h).cmp(name.as_bytes()))
            .ok()
            .map(|pos| self.entries.remove(pos))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self, region: &Region) -> Vec<DirEntry> {
        self.entries
            .iter()
            .map(|&h| DirEntry {
                name: BlockHeader::decode_at(region, h).name_string(region, h),
                header: h,
            })
            .collect()
    }

    pub fn reserve(&mut self, additional: usize) -> SegmentResult<()> {
        self.entries
            .try_reserve(additional)
            .map_err(|_| SegmentError::OutOfMemory {
                requested: additional * std::mem::size_of::<Offset>(),
                free: 0,
            })
    }

    pub fn shrink_to_fit(&mut self) {
        self.entries.shrink_to_fit();
    }
}
