/*!
 * Error Types
 * Segment error handling with thiserror and serde support
 */

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Segment error types
///
/// Every recoverable failure of the segment manager surfaces as one of
/// these. Misuse that cannot be recovered from (foreign handles, corrupted
/// headers) is a defensive assertion instead.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "error", content = "details")]
pub enum SegmentError {
    /// Raw allocator returned no block
    #[error("out of memory: requested {requested} bytes, {free} bytes free")]
    OutOfMemory { requested: usize, free: usize },

    /// construct() collision with an existing name
    #[error("an object named \"{0}\" already exists in this segment")]
    AlreadyExists(String),

    /// count x element size exceeds the addressable range
    #[error("allocation overflow: {count} elements of {elem_size} bytes")]
    Overflow { count: usize, elem_size: usize },

    /// Object name longer than limits::MAX_NAME_LEN
    #[error("name too long: {len} bytes, limit {max}")]
    NameTooLong { len: usize, max: usize },

    /// An element constructor reported failure; the partial array and its
    /// directory entry were rolled back before this surfaced
    #[error("element constructor failed at index {index}")]
    ConstructorFailed { index: usize },
}
