use crate::config::LevelLayout;
use crate::manager::{BlockId, StorageManager};
use crate::structures::map::{SortedMap, StructureKind};
use hexastore_common::StorageResult;

/// The innermost sorted set of node ids of an index.
///
/// A terminal is shared by two indexes (e.g., SPO and PSO share the terminal of each `(s, p)`
/// pair) and therefore reference counted. A terminal starts with a count of one. Additional
/// references can only be created through [Terminal::share], which hands out a [SharedTerminal]
/// that must be placed into another structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Terminal(SortedMap);

impl Terminal {
    pub(crate) fn create(storage: &mut StorageManager, layout: LevelLayout) -> StorageResult<Self> {
        SortedMap::create(storage, StructureKind::Terminal, layout).map(Self)
    }

    pub(crate) fn creation_bound(storage: &StorageManager, layout: LevelLayout) -> u64 {
        SortedMap::creation_bound(storage, layout)
    }

    /// Refers to an existing terminal.
    pub(crate) fn open(storage: &StorageManager, id: BlockId) -> Self {
        Self(SortedMap::open(storage, id, StructureKind::Terminal))
    }

    pub(crate) fn id(self) -> BlockId {
        self.0.id()
    }

    pub(crate) fn len(self, storage: &StorageManager) -> u64 {
        self.0.len(storage)
    }

    pub(crate) fn is_empty(self, storage: &StorageManager) -> bool {
        self.0.is_empty(storage)
    }

    #[cfg(test)]
    pub(crate) fn refcount(self, storage: &StorageManager) -> u32 {
        self.0.refcount(storage)
    }

    pub(crate) fn contains(self, storage: &StorageManager, node: i64) -> bool {
        self.0.contains(storage, node)
    }

    /// Adds `node`. Returns `false` if it was already present.
    pub(crate) fn add(self, storage: &mut StorageManager, node: i64) -> StorageResult<bool> {
        self.0.insert(storage, node, 0)
    }

    /// Removes `node`. Returns `false` if it was not present.
    pub(crate) fn remove(self, storage: &mut StorageManager, node: i64) -> bool {
        self.0.remove(storage, node).is_some()
    }

    pub(crate) fn insert_bound(self, storage: &StorageManager) -> u64 {
        self.0.insert_bound(storage)
    }

    pub(crate) fn iter(self, storage: &StorageManager) -> impl Iterator<Item = i64> + '_ {
        self.0.iter(storage).map(|(node, _)| node)
    }

    pub(crate) fn memory_size(self, storage: &StorageManager) -> u64 {
        self.0.memory_size(storage)
    }

    /// Creates another reference to this terminal.
    pub(crate) fn share(self, storage: &mut StorageManager) -> SharedTerminal {
        self.0.inc_refcount(storage);
        SharedTerminal(self)
    }

    /// Drops one reference. The terminal is destroyed once no reference is left.
    pub(crate) fn release(self, storage: &mut StorageManager) {
        if self.0.dec_refcount(storage) == 0 {
            self.0.destroy(storage);
        }
    }
}

/// A reference to a [Terminal] that has already been counted but not yet stored anywhere.
///
/// The only way to get rid of a [SharedTerminal] is to store it with
/// [SharedTerminal::into_terminal], which is done by the structure that takes ownership of the
/// reference.
#[must_use = "A shared terminal holds a reference that must be stored in an index."]
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct SharedTerminal(Terminal);

impl SharedTerminal {
    pub(crate) fn terminal(&self) -> Terminal {
        self.0
    }

    pub(crate) fn into_terminal(self) -> Terminal {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_remove_nodes() {
        let mut storage = StorageManager::memory();
        let terminal = Terminal::create(&mut storage, LevelLayout::sorted_array()).unwrap();

        assert!(terminal.add(&mut storage, 4).unwrap());
        assert!(terminal.add(&mut storage, 3).unwrap());
        assert!(!terminal.add(&mut storage, 4).unwrap());
        assert_eq!(terminal.iter(&storage).collect::<Vec<_>>(), vec![3, 4]);

        assert!(terminal.remove(&mut storage, 3));
        assert!(!terminal.remove(&mut storage, 3));
        assert!(terminal.contains(&storage, 4));
        assert_eq!(terminal.len(&storage), 1);
    }

    #[test]
    fn shared_terminal_is_destroyed_with_the_last_reference() {
        let mut storage = StorageManager::memory();
        let terminal = Terminal::create(&mut storage, LevelLayout::btree()).unwrap();
        let shared = terminal.share(&mut storage);
        assert_eq!(terminal.refcount(&storage), 2);

        terminal.release(&mut storage);
        assert!(storage.contains_block(terminal.id()));

        shared.into_terminal().release(&mut storage);
        assert_eq!(storage.block_count(), 0);
    }
}
