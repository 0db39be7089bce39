/*!
 * Managed Memory Segment Library
 * Named-object directory layered over a pluggable raw allocator
 */

pub mod algo;
pub mod block;
pub mod core;
pub mod index;
pub mod manager;

// Re-exports
pub use crate::core::errors::SegmentError;
pub use crate::core::region::Region;
pub use crate::core::types::{ObjectKind, Offset, SegmentResult, Size};
pub use algo::{AllocationCommand, MemoryAlgorithm, RawAllocation, SeqFit};
pub use index::{DirEntry, IndexShape};
pub use manager::{
    ConstructProxy, Handle, SegmentManager, SegmentStats, TypedAllocator, TypedDeleter,
};
