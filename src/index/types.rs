/*!
 * Directory Types
 * Shared types for the two index shapes
 */

use crate::core::types::Offset;
use serde::{Deserialize, Serialize};

/// Which directory implementation a segment manager uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexShape {
    /// Entry node embedded in the block's own allocation; insertion is
    /// two-phase and saves one allocation and one indirection per entry
    Intrusive,
    /// Directory owns a separate node per entry; conventional map semantics
    Node,
}

/// Context produced by `insert_check`, consumed by `insert_commit`.
///
/// For the intrusive shape this pins the position located during the check,
/// so the commit is a pure splice; the node shape needs no context.
#[derive(Debug, Clone, Copy)]
pub struct InsertCommit {
    pub(crate) slot: usize,
}

/// One (name, header) pair from a directory snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirEntry {
    pub name: String,
    /// Offset of the entry's block header inside the region
    pub header: Offset,
}
