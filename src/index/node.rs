/*!
 * Node Index
 * Conventional ordered map owning a separate node per entry
 */

use super::types::{DirEntry, InsertCommit};
use crate::core::types::{Offset, SegmentResult};
use std::collections::BTreeMap;

/// Ordered index that owns its keys.
///
/// Each entry is a separately allocated (name, header offset) node inside
/// the map; one extra allocation and one extra indirection per entry
/// compared to the intrusive shape, in exchange for plain map semantics.
#[derive(Debug, Default)]
pub(crate) struct NodeIndex {
    map: BTreeMap<Box<str>, Offset>,
}

impl NodeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, name: &str) -> Option<Offset> {
        self.map.get(name).copied()
    }

    /// The node shape needs no position context; the check is a pure
    /// membership probe.
    pub fn insert_check(&self, name: &str) -> Result<InsertCommit, Offset> {
        match self.map.get(name) {
            Some(&existing) => Err(existing),
            None => Ok(InsertCommit { slot: 0 }),
        }
    }

    pub fn insert_commit(&mut self, name: &str, header: Offset) {
        let prev = self.map.insert(name.into(), header);
        debug_assert!(prev.is_none(), "commit over an existing entry");
    }

    pub fn erase(&mut self, name: &str) -> Option<Offset> {
        self.map.remove(name)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn entries(&self) -> Vec<DirEntry> {
        self.map
            .iter()
            .map(|(name, &header)| DirEntry {
                name: name.to_string(),
                header,
            })
            .collect()
    }

    /// B-tree nodes are grown on demand; nothing to pre-size.
    pub fn reserve(&mut self, _additional: usize) -> SegmentResult<()> {
        Ok(())
    }

    pub fn shrink_to_fit(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_then_commit() {
        let mut idx = NodeIndex::new();
        assert!(idx.insert_check("pool").is_ok());
        idx.insert_commit("pool", 64);
        assert_eq!(idx.find("pool"), Some(64));
        assert_eq!(idx.insert_check("pool").unwrap_err(), 64);
    }

    #[test]
    fn test_erase_then_miss() {
        let mut idx = NodeIndex::new();
        idx.insert_commit("queue", 128);
        assert_eq!(idx.erase("queue"), Some(128));
        assert_eq!(idx.erase("queue"), None);
        assert_eq!(idx.find("queue"), None);
    }

    #[test]
    fn test_entries_name_ordered() {
        let mut idx = NodeIndex::new();
        idx.insert_commit("b", 16);
        idx.insert_commit("a", 8);
        idx.insert_commit("c", 24);
        let names: Vec<_> = idx.entries().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
