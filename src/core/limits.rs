/*!
 * Segment Limits and Constants
 *
 * Centralized location for segment-wide limits and layout constants.
 * All values include rationale comments explaining WHY they exist.
 */

/// Allocation granularity (8 bytes)
/// Every offset handed out by a memory algorithm is a multiple of this, so
/// block headers can be byte-copied and payloads up to 8-byte alignment need
/// no extra padding
pub const ALLOC_ALIGN: usize = 8;

/// Alignment of an owned region's base address (64 bytes)
/// Cache-line aligned; payload alignments above ALLOC_ALIGN are computed
/// against the real base address, so this is a floor, not a ceiling
pub const REGION_ALIGN: usize = 64;

/// Smallest region a segment manager will accept (256 bytes)
/// Below this not even one header + payload fits, and shrink_to_fit never
/// reduces a region past it
pub const MIN_SEGMENT_SIZE: usize = 256;

/// Default region size for `SegmentManager::new` callers that take the
/// library default (64KB)
pub const DEFAULT_SEGMENT_SIZE: usize = 64 * 1024;

/// Longest accepted object name in bytes (4KB)
/// The header records the block-recovery distance in a u16; bounding names
/// keeps that distance representable for any payload alignment
pub const MAX_NAME_LEN: usize = 4096;

/// Largest payload alignment a named construct will honor (32KB)
/// Together with MAX_NAME_LEN this keeps the header's u16 back-distance
/// from overflowing
pub const MAX_PAYLOAD_ALIGN: usize = 32 * 1024;
