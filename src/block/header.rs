/*!
 * Block Header
 * Fixed-layout record preceding every payload in the region
 */

use crate::core::limits::{ALLOC_ALIGN, MAX_NAME_LEN, MAX_PAYLOAD_ALIGN};
use crate::core::region::Region;
use crate::core::types::{align_up, ObjectKind, Offset, SegmentResult, Size};
use crate::core::errors::SegmentError;

/// Encoded size of a block header.
///
/// The header always sits at exactly this negative offset from its payload,
/// which is what makes a bare payload offset recoverable.
pub const HEADER_BYTES: usize = 24;

/// Self-describing metadata record stored immediately before a payload.
///
/// Field-by-field little-endian layout, 24 bytes:
///
/// ```text
/// 0..8   value_bytes  u64   payload length in bytes
/// 8..12  elem_size    u32   element size the payload was built with
/// 12..16 alignment    u32   payload alignment
/// 16..20 name_len     u32   stored name length in characters
/// 20..22 back_pad     u16   distance from block start to header start
/// 22     kind         u8    anonymous / named / unique
/// 23     name_width   u8    bytes per name character (1 for UTF-8)
/// ```
///
/// Processes sharing a region agree on this layout byte-for-byte; it is the
/// in-region ABI, so it is hand-packed rather than serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub value_bytes: u64,
    pub elem_size: u32,
    pub alignment: u32,
    pub name_len: u32,
    pub back_pad: u16,
    pub kind: ObjectKind,
    pub name_width: u8,
}

impl BlockHeader {
    /// Candidate header for a block that has not been allocated yet;
    /// `back_pad` is filled in once the block is placed.
    pub fn new(
        value_bytes: Size,
        elem_size: Size,
        alignment: Size,
        kind: ObjectKind,
        name_len: Size,
    ) -> Self {
        debug_assert!(elem_size > 0, "zero-sized elements are not managed");
        debug_assert!(alignment.is_power_of_two());
        Self {
            value_bytes: value_bytes as u64,
            elem_size: elem_size as u32,
            alignment: alignment as u32,
            name_len: name_len as u32,
            back_pad: 0,
            kind,
            name_width: 1,
        }
    }

    /// Header location for a payload offset.
    pub fn header_offset(payload_off: Offset) -> Offset {
        payload_off - HEADER_BYTES
    }

    /// Payload location for a header offset.
    pub fn payload_offset(header_off: Offset) -> Offset {
        header_off + HEADER_BYTES
    }

    /// Start of the stored name, immediately before the header.
    pub fn name_offset(&self, header_off: Offset) -> Offset {
        header_off - self.name_len as usize * self.name_width as usize
    }

    /// Start of the combined allocation this header lives in.
    pub fn block_offset(&self, header_off: Offset) -> Offset {
        header_off - self.back_pad as usize
    }

    /// Number of elements in the payload.
    pub fn count(&self) -> usize {
        (self.value_bytes / self.elem_size as u64) as usize
    }

    /// Write the header into the region at `header_off`.
    pub fn encode_at(&self, region: &Region, header_off: Offset) {
        let mut buf = [0u8; HEADER_BYTES];
        buf[0..8].copy_from_slice(&self.value_bytes.to_le_bytes());
        buf[8..12].copy_from_slice(&self.elem_size.to_le_bytes());
        buf[12..16].copy_from_slice(&self.alignment.to_le_bytes());
        buf[16..20].copy_from_slice(&self.name_len.to_le_bytes());
        buf[20..22].copy_from_slice(&self.back_pad.to_le_bytes());
        buf[22] = self.kind.as_raw();
        buf[23] = self.name_width;
        region.write(header_off, &buf);
    }

    /// Read the header stored at `header_off`.
    ///
    /// A kind byte outside the known set means the offset does not point at
    /// a live header; that is a caller bug, not a recoverable condition.
    pub fn decode_at(region: &Region, header_off: Offset) -> Self {
        let mut buf = [0u8; HEADER_BYTES];
        region.read_into(header_off, &mut buf);
        let kind = ObjectKind::from_raw(buf[22])
            .expect("offset does not point at a live block header");
        Self {
            value_bytes: u64::from_le_bytes(buf[0..8].try_into().unwrap()),
            elem_size: u32::from_le_bytes(buf[8..12].try_into().unwrap()),
            alignment: u32::from_le_bytes(buf[12..16].try_into().unwrap()),
            name_len: u32::from_le_bytes(buf[16..20].try_into().unwrap()),
            back_pad: u16::from_le_bytes(buf[20..22].try_into().unwrap()),
            kind,
            name_width: buf[23],
        }
    }

    /// Borrow the stored name bytes.
    ///
    /// Call only while the directory lock is held; the bytes are written
    /// once before the entry is committed and never mutated while an entry
    /// references them.
    pub(crate) fn name_bytes<'r>(&self, region: &'r Region, header_off: Offset) -> &'r [u8] {
        let len = self.name_len as usize * self.name_width as usize;
        let off = self.name_offset(header_off);
        // SAFETY: the name range was written inside the region at
        // construction and the block stays allocated while its directory
        // entry (which the caller found under the lock) exists.
        unsafe { std::slice::from_raw_parts(region.ptr_at(off), len) }
    }

    /// Stored name as an owned string (named and unique blocks).
    pub(crate) fn name_string(&self, region: &Region, header_off: Offset) -> String {
        String::from_utf8_lossy(self.name_bytes(region, header_off)).into_owned()
    }
}

/// Resolved locations of one combined {name, header, payload} block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPlacement {
    pub block_off: Offset,
    pub name_off: Offset,
    pub header_off: Offset,
    pub payload_off: Offset,
}

impl BlockPlacement {
    /// Bytes to request from the allocator for a combined block.
    ///
    /// Conservative: includes worst-case padding for the payload alignment,
    /// so `resolve` always fits. Rejects arithmetic overflow before any
    /// allocation happens.
    pub fn total_size(name_len: Size, value_bytes: Size, alignment: Size) -> SegmentResult<Size> {
        let slack = alignment.max(ALLOC_ALIGN);
        name_len
            .checked_add(HEADER_BYTES)
            .and_then(|n| n.checked_add(value_bytes))
            .and_then(|n| n.checked_add(slack))
            .ok_or(SegmentError::Overflow {
                count: value_bytes,
                elem_size: 1,
            })
    }

    /// Place name, header and payload inside an allocated block.
    ///
    /// The payload address is aligned against the real base address, so
    /// alignments above the allocator granularity are honored exactly.
    pub fn resolve(
        base_addr: usize,
        block_off: Offset,
        name_len: Size,
        alignment: Size,
    ) -> Self {
        debug_assert!(name_len <= MAX_NAME_LEN);
        debug_assert!(alignment <= MAX_PAYLOAD_ALIGN);
        let eff_align = alignment.max(ALLOC_ALIGN);
        let first_payload = base_addr + block_off + name_len + HEADER_BYTES;
        let payload_off = align_up(first_payload, eff_align) - base_addr;
        let header_off = payload_off - HEADER_BYTES;
        let name_off = header_off - name_len;
        debug_assert!(name_off >= block_off);
        debug_assert!(header_off - block_off <= u16::MAX as usize);
        Self {
            block_off,
            name_off,
            header_off,
            payload_off,
        }
    }

    /// Distance from block start to header start, stored for recovery.
    pub fn back_pad(&self) -> u16 {
        (self.header_off - self.block_off) as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_round_trip() {
        let region = Region::new(1024).unwrap();
        let mut hdr = BlockHeader::new(64, 8, 8, ObjectKind::Named, 7);
        hdr.back_pad = 7;
        hdr.encode_at(&region, 128);
        assert_eq!(BlockHeader::decode_at(&region, 128), hdr);
    }

    #[test]
    fn test_header_sits_at_fixed_negative_offset() {
        let payload = 512;
        assert_eq!(BlockHeader::payload_offset(BlockHeader::header_offset(payload)), payload);
    }

    #[test]
    fn test_placement_aligns_payload() {
        let region = Region::new(4096).unwrap();
        for align in [1usize, 8, 16, 64, 128] {
            for name_len in [0usize, 3, 13, 200] {
                let p = BlockPlacement::resolve(region.base_addr(), 40, name_len, align);
                assert_eq!((region.base_addr() + p.payload_off) % align.max(8), 0);
                assert_eq!(p.header_off, p.payload_off - HEADER_BYTES);
                assert_eq!(p.name_off, p.header_off - name_len);
                assert!(p.name_off >= p.block_off);
                let total = BlockPlacement::total_size(name_len, 96, align).unwrap();
                assert!(p.payload_off + 96 <= p.block_off + total);
            }
        }
    }

    #[test]
    fn test_total_size_rejects_overflow() {
        let err = BlockPlacement::total_size(16, usize::MAX - 8, 8).unwrap_err();
        assert!(matches!(err, SegmentError::Overflow { .. }));
    }

    #[test]
    fn test_name_recovery() {
        let region = Region::new(1024).unwrap();
        let p = BlockPlacement::resolve(region.base_addr(), 64, 5, 8);
        region.write(p.name_off, b"gauge");
        let mut hdr = BlockHeader::new(32, 4, 4, ObjectKind::Named, 5);
        hdr.back_pad = p.back_pad();
        hdr.encode_at(&region, p.header_off);

        let decoded = BlockHeader::decode_at(&region, p.header_off);
        assert_eq!(decoded.name_string(&region, p.header_off), "gauge");
        assert_eq!(decoded.block_offset(p.header_off), p.block_off);
        assert_eq!(decoded.count(), 8);
    }
}
