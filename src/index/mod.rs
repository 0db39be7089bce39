/*!
 * Name Directory Module
 * Ordered name-to-header maps in two interchangeable shapes
 */

mod intrusive;
mod node;
mod types;

pub use types::{DirEntry, IndexShape, InsertCommit};
pub(crate) use intrusive::IntrusiveIndex;
pub(crate) use node::NodeIndex;

use crate::core::region::Region;
use crate::core::types::{Offset, SegmentResult};

/// A name directory in one of the two shapes, chosen when the segment
/// manager is built.
///
/// Both shapes share the same surface; the manager drives them through this
/// enum so the two-phase insert protocol reads identically either way.
#[derive(Debug)]
pub(crate) enum Directory {
    Intrusive(IntrusiveIndex),
    Node(NodeIndex),
}

impl Directory {
    pub fn new(shape: IndexShape) -> Self {
        match shape {
            IndexShape::Intrusive => Directory::Intrusive(IntrusiveIndex::new()),
            IndexShape::Node => Directory::Node(NodeIndex::new()),
        }
    }

    pub fn shape(&self) -> IndexShape {
        if self.is_intrusive_index() {
            IndexShape::Intrusive
        } else {
            IndexShape::Node
        }
    }

    /// The entry's node shares its allocation with the block header.
    pub fn is_intrusive_index(&self) -> bool {
        matches!(self, Directory::Intrusive(_))
    }

    /// The directory owns a separate node per entry; destroy-by-handle must
    /// release it in addition to the block. Checked independently of the
    /// intrusive dispatch.
    pub fn is_node_index(&self) -> bool {
        matches!(self, Directory::Node(_))
    }

    pub fn find(&self, name: &str, region: &Region) -> Option<Offset> {
        match self {
            Directory::Intrusive(idx) => idx.find(name, region),
            Directory::Node(idx) => idx.find(name),
        }
    }

    /// Phase one: locate the insert position without touching memory.
    /// `Err` carries the existing entry's header offset.
    pub fn insert_check(&self, name: &str, region: &Region) -> Result<InsertCommit, Offset> {
        match self {
            Directory::Intrusive(idx) => idx.insert_check(name, region),
            Directory::Node(idx) => idx.insert_check(name),
        }
    }

    /// Phase two: commit the entry once its block exists.
    pub fn insert_commit(&mut self, name: &str, header: Offset, commit: InsertCommit) {
        match self {
            Directory::Intrusive(idx) => idx.insert_commit(header, commit),
            Directory::Node(idx) => idx.insert_commit(name, header),
        }
    }

    /// Remove the entry for `name`, returning its header offset.
    pub fn erase(&mut self, name: &str, region: &Region) -> Option<Offset> {
        match self {
            Directory::Intrusive(idx) => idx.erase(name, region),
            Directory::Node(idx) => idx.erase(name),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Directory::Intrusive(idx) => idx.len(),
            Directory::Node(idx) => idx.len(),
        }
    }

    /// Snapshot of (name, header) pairs in name order.
    pub fn entries(&self, region: &Region) -> Vec<DirEntry> {
        match self {
            Directory::Intrusive(idx) => idx.entries(region),
            Directory::Node(idx) => idx.entries(),
        }
    }

    /// Pre-size directory capacity for `additional` more entries.
    pub fn reserve(&mut self, additional: usize) -> SegmentResult<()> {
        match self {
            Directory::Intrusive(idx) => idx.reserve(additional),
            Directory::Node(idx) => idx.reserve(additional),
        }
    }

    /// Release directory-internal slack.
    pub fn shrink_to_fit(&mut self) {
        match self {
            Directory::Intrusive(idx) => idx.shrink_to_fit(),
            Directory::Node(idx) => idx.shrink_to_fit(),
        }
    }
}
