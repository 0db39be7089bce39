/*!
 * Memory Algorithm Module
 * Pluggable raw allocator turning a byte range into allocate/deallocate
 */

mod seq_fit;
mod traits;

pub use seq_fit::SeqFit;
pub use traits::{AllocationChain, AllocationCommand, MemoryAlgorithm, RawAllocation};
