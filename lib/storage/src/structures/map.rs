use crate::block::{read_u32, read_u64, write_u32, write_u64};
use crate::config::LevelLayout;
use crate::manager::{BlockId, StorageManager};
use crate::structures::{btree, sorted_array};
use hexastore_common::StorageResult;

// Descriptor layout
const KIND_OFFSET: usize = 0;
const REFCOUNT_OFFSET: usize = 4;
const LAYOUT_TAG_OFFSET: usize = 8;
const LAYOUT_PARAMETER_OFFSET: usize = 12;
const BACKING_OFFSET: usize = 16;
const LEN_OFFSET: usize = 24;
const TRIPLES_COUNT_OFFSET: usize = 32;
const DESCRIPTOR_SIZE: usize = 48;

/// What a [SortedMap] is used for. Recorded in the descriptor to catch dangling references early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StructureKind {
    Terminal,
    Vector,
    Head,
}

impl StructureKind {
    fn tag(self) -> u32 {
        match self {
            StructureKind::Terminal => u32::from(b'T'),
            StructureKind::Vector => u32::from(b'V'),
            StructureKind::Head => u32::from(b'H'),
        }
    }
}

/// A sorted map from node ids to `u64` values, identified by a stable descriptor block.
///
/// The descriptor records the layout, the backing block (sorted array or B-tree root), the
/// number of entries, a reference count, and a cached triples count. The backing block moves
/// when an array grows or a tree gets a new root, but the descriptor never does, so a parent can
/// keep the descriptor id as its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SortedMap(BlockId);

impl SortedMap {
    /// Allocates an empty map with a reference count of one.
    pub(crate) fn create(
        storage: &mut StorageManager,
        kind: StructureKind,
        layout: LevelLayout,
    ) -> StorageResult<Self> {
        let layout = layout.normalized();
        let backing = match layout {
            LevelLayout::SortedArray { initial_capacity } => {
                sorted_array::create(storage, u64::from(initial_capacity))?
            }
            LevelLayout::BTree { branching } => btree::create(storage, branching)?,
        };
        let descriptor = match storage.new_block(DESCRIPTOR_SIZE) {
            Ok(descriptor) => descriptor,
            Err(error) => {
                storage.release_block(backing);
                return Err(error);
            }
        };

        let (tag, parameter) = layout.to_raw();
        let block = storage.block_mut(descriptor);
        write_u32(block, KIND_OFFSET, kind.tag());
        write_u32(block, REFCOUNT_OFFSET, 1);
        write_u32(block, LAYOUT_TAG_OFFSET, tag);
        write_u32(block, LAYOUT_PARAMETER_OFFSET, parameter);
        write_u64(block, BACKING_OFFSET, backing.as_u64());
        Ok(Self(descriptor))
    }

    /// The number of bytes [Self::create] allocates.
    pub(crate) fn creation_bound(storage: &StorageManager, layout: LevelLayout) -> u64 {
        let backing = match layout.normalized() {
            LevelLayout::SortedArray { initial_capacity } => {
                sorted_array::block_size(u64::from(initial_capacity))
            }
            LevelLayout::BTree { branching } => btree::node_block_size(branching),
        };
        storage.allocation_size(backing) + storage.allocation_size(DESCRIPTOR_SIZE)
    }

    /// Refers to an existing map.
    ///
    /// # Panics
    ///
    /// Panics if the descriptor does not describe a map of the given `kind`.
    pub(crate) fn open(storage: &StorageManager, id: BlockId, kind: StructureKind) -> Self {
        let actual = read_u32(storage.block(id), KIND_OFFSET);
        assert_eq!(
            actual,
            kind.tag(),
            "The block {id} does not hold a {kind:?} descriptor."
        );
        Self(id)
    }

    /// Returns whether `id` is a live block holding a descriptor of the given `kind`.
    pub(crate) fn has_kind(storage: &StorageManager, id: BlockId, kind: StructureKind) -> bool {
        storage.contains_block(id)
            && storage.block_size(id) >= DESCRIPTOR_SIZE
            && read_u32(storage.block(id), KIND_OFFSET) == kind.tag()
    }

    /// Refers to an existing map without checking its kind.
    pub(crate) fn from_id(id: BlockId) -> Self {
        Self(id)
    }

    pub(crate) fn id(self) -> BlockId {
        self.0
    }

    pub(crate) fn layout(self, storage: &StorageManager) -> LevelLayout {
        let block = storage.block(self.0);
        let tag = read_u32(block, LAYOUT_TAG_OFFSET);
        let parameter = read_u32(block, LAYOUT_PARAMETER_OFFSET);
        LevelLayout::from_raw(tag, parameter)
            .unwrap_or_else(|| panic!("The descriptor {} has an unknown layout {tag}.", self.0))
    }

    fn backing(self, storage: &StorageManager) -> BlockId {
        BlockId::from_raw(read_u64(storage.block(self.0), BACKING_OFFSET))
            .unwrap_or_else(|| panic!("The descriptor {} has no backing block.", self.0))
    }

    fn set_backing(self, storage: &mut StorageManager, backing: BlockId) {
        write_u64(storage.block_mut(self.0), BACKING_OFFSET, backing.as_u64());
    }

    /// The number of entries.
    pub(crate) fn len(self, storage: &StorageManager) -> u64 {
        read_u64(storage.block(self.0), LEN_OFFSET)
    }

    pub(crate) fn is_empty(self, storage: &StorageManager) -> bool {
        self.len(storage) == 0
    }

    fn set_len(self, storage: &mut StorageManager, len: u64) {
        write_u64(storage.block_mut(self.0), LEN_OFFSET, len);
    }

    /// The cached number of triples below this map.
    pub(crate) fn triples_count(self, storage: &StorageManager) -> u64 {
        read_u64(storage.block(self.0), TRIPLES_COUNT_OFFSET)
    }

    pub(crate) fn set_triples_count(self, storage: &mut StorageManager, count: u64) {
        write_u64(storage.block_mut(self.0), TRIPLES_COUNT_OFFSET, count);
    }

    pub(crate) fn refcount(self, storage: &StorageManager) -> u32 {
        read_u32(storage.block(self.0), REFCOUNT_OFFSET)
    }

    pub(crate) fn inc_refcount(self, storage: &mut StorageManager) {
        let refcount = self.refcount(storage);
        write_u32(storage.block_mut(self.0), REFCOUNT_OFFSET, refcount + 1);
    }

    /// Decrements the reference count and returns the new count.
    pub(crate) fn dec_refcount(self, storage: &mut StorageManager) -> u32 {
        let refcount = self.refcount(storage);
        assert!(refcount > 0, "The descriptor {} is not referenced.", self.0);
        write_u32(storage.block_mut(self.0), REFCOUNT_OFFSET, refcount - 1);
        refcount - 1
    }

    pub(crate) fn get(self, storage: &StorageManager, key: i64) -> Option<u64> {
        let backing = self.backing(storage);
        match self.layout(storage) {
            LevelLayout::SortedArray { .. } => sorted_array::search(storage, backing, key)
                .ok()
                .map(|index| sorted_array::entry(storage, backing, index).1),
            LevelLayout::BTree { .. } => btree::get(storage, backing, key),
        }
    }

    pub(crate) fn contains(self, storage: &StorageManager, key: i64) -> bool {
        self.get(storage, key).is_some()
    }

    /// Inserts `(key, value)` unless `key` is already present. Returns whether it was inserted.
    pub(crate) fn insert(
        self,
        storage: &mut StorageManager,
        key: i64,
        value: u64,
    ) -> StorageResult<bool> {
        let backing = self.backing(storage);
        let (new_backing, inserted) = match self.layout(storage) {
            LevelLayout::SortedArray { .. } => sorted_array::insert(storage, backing, key, value)?,
            LevelLayout::BTree { branching } => {
                btree::insert(storage, backing, branching, key, value)?
            }
        };
        if new_backing != backing {
            self.set_backing(storage, new_backing);
        }
        if inserted {
            let len = self.len(storage);
            self.set_len(storage, len + 1);
        }
        Ok(inserted)
    }

    /// Removes `key` and returns its value.
    pub(crate) fn remove(self, storage: &mut StorageManager, key: i64) -> Option<u64> {
        let backing = self.backing(storage);
        let (new_backing, removed) = match self.layout(storage) {
            LevelLayout::SortedArray { initial_capacity } => {
                sorted_array::remove(storage, backing, key, u64::from(initial_capacity))
            }
            LevelLayout::BTree { branching } => btree::remove(storage, backing, branching, key),
        };
        if new_backing != backing {
            self.set_backing(storage, new_backing);
        }
        if removed.is_some() {
            let len = self.len(storage);
            self.set_len(storage, len - 1);
        }
        removed
    }

    /// The number of bytes an insertion into this map may allocate.
    pub(crate) fn insert_bound(self, storage: &StorageManager) -> u64 {
        let backing = self.backing(storage);
        match self.layout(storage) {
            LevelLayout::SortedArray { .. } => sorted_array::insert_bound(storage, backing),
            LevelLayout::BTree { branching } => btree::insert_bound(storage, backing, branching),
        }
    }

    /// A cursor at the smallest entry.
    pub(crate) fn first(self, storage: &StorageManager) -> MapCursor {
        self.seek(storage, i64::MIN)
    }

    /// A cursor at the first entry with a key `>= key`.
    pub(crate) fn seek(self, storage: &StorageManager, key: i64) -> MapCursor {
        let backing = self.backing(storage);
        match self.layout(storage) {
            LevelLayout::SortedArray { .. } => {
                let index = match sorted_array::search(storage, backing, key) {
                    Ok(index) | Err(index) => index,
                };
                MapCursor::Array {
                    block: backing,
                    index,
                }
            }
            LevelLayout::BTree { .. } => match btree::seek(storage, backing, key) {
                Some((leaf, index)) => MapCursor::Tree { leaf, index },
                None => MapCursor::End,
            },
        }
    }

    /// Iterates over all entries in ascending key order.
    pub(crate) fn iter(self, storage: &StorageManager) -> MapIter<'_> {
        MapIter {
            storage,
            cursor: self.first(storage),
        }
    }

    /// The number of bytes held by the descriptor and the backing blocks.
    pub(crate) fn memory_size(self, storage: &StorageManager) -> u64 {
        let backing = self.backing(storage);
        let backing_size = match self.layout(storage) {
            LevelLayout::SortedArray { .. } => storage.block_size(backing) as u64,
            LevelLayout::BTree { .. } => btree::memory_size(storage, backing),
        };
        storage.block_size(self.0) as u64 + backing_size
    }

    /// Releases the descriptor and the backing blocks. Values are not interpreted.
    pub(crate) fn destroy(self, storage: &mut StorageManager) {
        let backing = self.backing(storage);
        match self.layout(storage) {
            LevelLayout::SortedArray { .. } => storage.release_block(backing),
            LevelLayout::BTree { .. } => btree::destroy(storage, backing),
        }
        storage.release_block(self.0);
    }
}

/// A position in a [SortedMap]. Holds no borrow, so it must not be used after the map changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MapCursor {
    Array { block: BlockId, index: usize },
    Tree { leaf: BlockId, index: usize },
    End,
}

impl MapCursor {
    /// The entry at the cursor or [None] if the cursor is past the end.
    pub(crate) fn entry(&self, storage: &StorageManager) -> Option<(i64, u64)> {
        match *self {
            MapCursor::Array { block, index } => {
                let used = sorted_array::used(storage, block) as usize;
                (index < used).then(|| sorted_array::entry(storage, block, index))
            }
            MapCursor::Tree { leaf, index } => Some(btree::leaf_entry(storage, leaf, index)),
            MapCursor::End => None,
        }
    }

    /// Moves to the next entry.
    pub(crate) fn advance(&mut self, storage: &StorageManager) {
        *self = match *self {
            MapCursor::Array { block, index } => MapCursor::Array {
                block,
                index: index + 1,
            },
            MapCursor::Tree { leaf, index } => match btree::normalize(storage, leaf, index + 1) {
                Some((leaf, index)) => MapCursor::Tree { leaf, index },
                None => MapCursor::End,
            },
            MapCursor::End => MapCursor::End,
        };
    }
}

/// Iterates over the entries of a [SortedMap].
pub(crate) struct MapIter<'storage> {
    storage: &'storage StorageManager,
    cursor: MapCursor,
}

impl Iterator for MapIter<'_> {
    type Item = (i64, u64);

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.cursor.entry(self.storage)?;
        self.cursor.advance(self.storage);
        Some(entry)
    }
}
