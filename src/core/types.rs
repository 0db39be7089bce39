/*!
 * Core Types
 * Common types used across the segment
 */

use serde::{Deserialize, Serialize};

/// Byte offset inside a managed region
pub type Offset = usize;

/// Size type for region operations
pub type Size = usize;

/// Common result type for segment operations
pub type SegmentResult<T> = Result<T, super::errors::SegmentError>;

/// How a block was published at construction time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    /// No directory entry; reachable only through the creation handle
    Anonymous,
    /// Registered in the named index under a caller-chosen string
    Named,
    /// Registered in the unique index under the type-identity string
    Unique,
}

/// Round `x` up to the next multiple of `align` (a power of two)
pub(crate) fn align_up(x: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (x + align - 1) & !(align - 1)
}

impl ObjectKind {
    /// Raw value stored in the in-region block header
    pub(crate) fn as_raw(self) -> u8 {
        match self {
            ObjectKind::Anonymous => 0,
            ObjectKind::Named => 1,
            ObjectKind::Unique => 2,
        }
    }

    pub(crate) fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(ObjectKind::Anonymous),
            1 => Some(ObjectKind::Named),
            2 => Some(ObjectKind::Unique),
            _ => None,
        }
    }
}
