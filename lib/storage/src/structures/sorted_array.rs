use crate::block::{read_entry, read_u64, search_entries, write_entry, write_u64, ENTRY_SIZE};
use crate::manager::{BlockId, StorageManager};
use hexastore_common::StorageResult;

// Layout: capacity (u64), used (u64), entries
const CAPACITY_OFFSET: usize = 0;
const USED_OFFSET: usize = 8;
const ENTRIES_OFFSET: usize = 16;

/// Returns the block size of an array with `capacity` entries.
pub(super) fn block_size(capacity: u64) -> usize {
    ENTRIES_OFFSET + capacity as usize * ENTRY_SIZE
}

/// Allocates an empty array.
pub(super) fn create(storage: &mut StorageManager, capacity: u64) -> StorageResult<BlockId> {
    let id = storage.new_block(block_size(capacity))?;
    write_u64(storage.block_mut(id), CAPACITY_OFFSET, capacity);
    Ok(id)
}

pub(super) fn capacity(storage: &StorageManager, id: BlockId) -> u64 {
    read_u64(storage.block(id), CAPACITY_OFFSET)
}

pub(super) fn used(storage: &StorageManager, id: BlockId) -> u64 {
    read_u64(storage.block(id), USED_OFFSET)
}

pub(super) fn entry(storage: &StorageManager, id: BlockId, index: usize) -> (i64, u64) {
    read_entry(storage.block(id), ENTRIES_OFFSET, index)
}

/// Finds `key`. Same contract as [slice::binary_search].
pub(super) fn search(storage: &StorageManager, id: BlockId, key: i64) -> Result<usize, usize> {
    let block = storage.block(id);
    let used = read_u64(block, USED_OFFSET) as usize;
    search_entries(block, ENTRIES_OFFSET, used, key)
}

/// Returns the number of bytes an insertion may allocate.
pub(super) fn insert_bound(storage: &StorageManager, id: BlockId) -> u64 {
    let capacity = capacity(storage, id);
    if used(storage, id) == capacity {
        storage.allocation_size(block_size(capacity * 2))
    } else {
        0
    }
}

/// Inserts `(key, value)` keeping the entries sorted.
///
/// Returns the id of the array (which changes if the array had to grow) and whether the key was
/// inserted. An existing key is not overwritten.
pub(super) fn insert(
    storage: &mut StorageManager,
    id: BlockId,
    key: i64,
    value: u64,
) -> StorageResult<(BlockId, bool)> {
    let position = match search(storage, id, key) {
        Ok(_) => return Ok((id, false)),
        Err(position) => position,
    };

    let capacity = capacity(storage, id);
    let used = used(storage, id);
    let id = if used == capacity {
        let new_id = storage.resize_block(id, block_size(capacity * 2))?;
        write_u64(storage.block_mut(new_id), CAPACITY_OFFSET, capacity * 2);
        new_id
    } else {
        id
    };

    let block = storage.block_mut(id);
    let start = ENTRIES_OFFSET + position * ENTRY_SIZE;
    let end = ENTRIES_OFFSET + used as usize * ENTRY_SIZE;
    block.copy_within(start..end, start + ENTRY_SIZE);
    write_entry(block, ENTRIES_OFFSET, position, (key, value));
    write_u64(block, USED_OFFSET, used + 1);
    Ok((id, true))
}

/// Removes `key`, returning the array id (which changes if the array shrank) and the removed
/// value.
///
/// The array shrinks by half once it is at most a quarter full, but never below
/// `min_capacity`. Shrinking is best-effort: if the smaller block cannot be allocated, the array
/// keeps its size.
pub(super) fn remove(
    storage: &mut StorageManager,
    id: BlockId,
    key: i64,
    min_capacity: u64,
) -> (BlockId, Option<u64>) {
    let Ok(position) = search(storage, id, key) else {
        return (id, None);
    };

    let capacity = capacity(storage, id);
    let used = used(storage, id);
    let (_, value) = entry(storage, id, position);

    let block = storage.block_mut(id);
    let start = ENTRIES_OFFSET + position * ENTRY_SIZE;
    let end = ENTRIES_OFFSET + used as usize * ENTRY_SIZE;
    block.copy_within(start + ENTRY_SIZE..end, start);
    write_u64(block, USED_OFFSET, used - 1);

    let new_capacity = capacity / 2;
    if (used - 1) * 4 > capacity || new_capacity < min_capacity {
        return (id, Some(value));
    }

    match storage.resize_block(id, block_size(new_capacity)) {
        Ok(new_id) => {
            write_u64(storage.block_mut(new_id), CAPACITY_OFFSET, new_capacity);
            (new_id, Some(value))
        }
        Err(error) => {
            tracing::warn!(%error, "Failed to shrink sorted array");
            (id, Some(value))
        }
    }
}

/// Reads all entries. Used by tests and diagnostics.
#[cfg(test)]
pub(super) fn entries(storage: &StorageManager, id: BlockId) -> Vec<(i64, u64)> {
    (0..used(storage, id) as usize)
        .map(|index| entry(storage, id, index))
        .collect()
}
