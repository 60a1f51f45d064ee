use crate::config::LevelLayout;
use crate::manager::{BlockId, StorageManager};
use crate::structures::map::{SortedMap, StructureKind};
use crate::structures::terminal::Terminal;
use hexastore_common::StorageResult;
use std::marker::PhantomData;

/// A structure that can be stored below a [Level].
pub(crate) trait LevelChild: Copy + 'static {
    /// The kind of a [Level] holding children of this type.
    const PARENT_KIND: StructureKind;

    /// Refers to the child stored with the given id.
    fn from_id(storage: &StorageManager, id: BlockId) -> Self;

    fn id(self) -> BlockId;

    /// The number of triples below this child.
    fn triples_count(self, storage: &StorageManager) -> u64;

    fn memory_size(self, storage: &StorageManager) -> u64;

    /// Drops the parent's reference to this child.
    fn release(self, storage: &mut StorageManager);
}

impl LevelChild for Terminal {
    const PARENT_KIND: StructureKind = StructureKind::Vector;

    fn from_id(storage: &StorageManager, id: BlockId) -> Self {
        Terminal::open(storage, id)
    }

    fn id(self) -> BlockId {
        Terminal::id(self)
    }

    fn triples_count(self, storage: &StorageManager) -> u64 {
        self.len(storage)
    }

    fn memory_size(self, storage: &StorageManager) -> u64 {
        Terminal::memory_size(self, storage)
    }

    fn release(self, storage: &mut StorageManager) {
        Terminal::release(self, storage);
    }
}

/// A sorted map from node ids to child structures that caches the number of triples below it.
///
/// Two instantiations make up an index: [Head] maps the first key to a [Vector] and a [Vector]
/// maps the second key to a [Terminal].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Level<C: LevelChild> {
    map: SortedMap,
    child: PhantomData<C>,
}

/// The middle level of an index.
pub(crate) type Vector = Level<Terminal>;

/// The outermost level of an index.
pub(crate) type Head = Level<Vector>;

impl LevelChild for Vector {
    const PARENT_KIND: StructureKind = StructureKind::Head;

    fn from_id(storage: &StorageManager, id: BlockId) -> Self {
        Self::open(storage, id)
    }

    fn id(self) -> BlockId {
        self.map.id()
    }

    fn triples_count(self, storage: &StorageManager) -> u64 {
        self.map.triples_count(storage)
    }

    fn memory_size(self, storage: &StorageManager) -> u64 {
        Level::memory_size(self, storage)
    }

    fn release(self, storage: &mut StorageManager) {
        self.destroy(storage);
    }
}

impl<C: LevelChild> Level<C> {
    pub(crate) fn create(storage: &mut StorageManager, layout: LevelLayout) -> StorageResult<Self> {
        let map = SortedMap::create(storage, C::PARENT_KIND, layout)?;
        Ok(Self::from_map(map))
    }

    pub(crate) fn creation_bound(storage: &StorageManager, layout: LevelLayout) -> u64 {
        SortedMap::creation_bound(storage, layout)
    }

    /// Refers to an existing level, checking that the block holds a level of this type.
    pub(crate) fn open(storage: &StorageManager, id: BlockId) -> Self {
        Self::from_map(SortedMap::open(storage, id, C::PARENT_KIND))
    }

    fn from_map(map: SortedMap) -> Self {
        Self {
            map,
            child: PhantomData,
        }
    }

    pub(crate) fn id(self) -> BlockId {
        self.map.id()
    }

    pub(crate) fn map(self) -> SortedMap {
        self.map
    }

    /// The number of children.
    pub(crate) fn len(self, storage: &StorageManager) -> u64 {
        self.map.len(storage)
    }

    pub(crate) fn is_empty(self, storage: &StorageManager) -> bool {
        self.map.is_empty(storage)
    }

    /// The cached number of triples below this level.
    pub(crate) fn triples_count(self, storage: &StorageManager) -> u64 {
        self.map.triples_count(storage)
    }

    pub(crate) fn increment_triples_count(self, storage: &mut StorageManager) {
        let count = self.map.triples_count(storage);
        self.map.set_triples_count(storage, count + 1);
    }

    pub(crate) fn decrement_triples_count(self, storage: &mut StorageManager) {
        let count = self.map.triples_count(storage);
        assert!(count > 0, "The level {} has no triples to remove.", self.map.id());
        self.map.set_triples_count(storage, count - 1);
    }

    pub(crate) fn get(self, storage: &StorageManager, key: i64) -> Option<C> {
        let value = self.map.get(storage, key)?;
        Some(self.child(storage, value))
    }

    /// Resolves a value stored in this level to the child it refers to.
    pub(crate) fn child(self, storage: &StorageManager, value: u64) -> C {
        let id = BlockId::from_raw(value)
            .unwrap_or_else(|| panic!("The level {} holds a null child.", self.map.id()));
        C::from_id(storage, id)
    }

    /// Stores `child` under `key`. An existing child is not replaced and `false` is returned.
    pub(crate) fn add(self, storage: &mut StorageManager, key: i64, child: C) -> StorageResult<bool> {
        self.map.insert(storage, key, child.id().as_u64())
    }

    /// Removes the child stored under `key` and releases it.
    pub(crate) fn remove(self, storage: &mut StorageManager, key: i64) -> bool {
        match self.map.remove(storage, key) {
            Some(value) => {
                self.child(storage, value).release(storage);
                true
            }
            None => false,
        }
    }

    /// The number of bytes an insertion into this level may allocate.
    pub(crate) fn insert_bound(self, storage: &StorageManager) -> u64 {
        self.map.insert_bound(storage)
    }

    pub(crate) fn iter(self, storage: &StorageManager) -> impl Iterator<Item = (i64, C)> + '_ {
        self.map
            .iter(storage)
            .map(move |(key, value)| (key, self.child(storage, value)))
    }

    /// The bytes held by this level and everything below it.
    pub(crate) fn memory_size(self, storage: &StorageManager) -> u64 {
        let children = self
            .iter(storage)
            .map(|(_, child)| child.memory_size(storage))
            .sum::<u64>();
        self.map.memory_size(storage) + children
    }

    /// Releases every child and the level itself.
    pub(crate) fn destroy(self, storage: &mut StorageManager) {
        let children = self
            .iter(storage)
            .map(|(_, child)| child)
            .collect::<Vec<_>>();
        for child in children {
            child.release(storage);
        }
        self.map.destroy(storage);
    }
}
