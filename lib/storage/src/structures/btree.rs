//! A B+-tree over `(i64, u64)` entries stored in blocks.
//!
//! ```text
//!                    ┌──────────────────────┐
//!                    │ (MIN,#a) (5,#b)      │   internal: (lower bound, child)
//!                    └───┬──────────┬───────┘
//!              ┌─────────┘          └────────┐
//!    ┌─────────▼─────────┐         ┌─────────▼─────────┐
//!    │ (1,v) (3,v)       │ ◄─────► │ (5,v) (8,v) (9,v) │   leaves: (key, value), linked
//!    └───────────────────┘         └───────────────────┘
//! ```
//!
//! In an internal node, entry `i > 0` holds the smallest key that may occur below child `i`.
//! The key of entry 0 is not used for routing. Nodes have room for `branching + 1` entries so
//! that an insertion can overflow a node before it is split.

use crate::block::{
    read_entry, read_u32, read_u64, search_entries, write_entry, write_u32, write_u64, ENTRY_SIZE,
};
use crate::manager::{BlockId, StorageManager};
use hexastore_common::StorageResult;

const LEAF: u32 = 2;

// Layout: flags (u32), used (u32), prev (u64), next (u64), reserved (u64), entries
const FLAGS_OFFSET: usize = 0;
const USED_OFFSET: usize = 4;
const PREV_OFFSET: usize = 8;
const NEXT_OFFSET: usize = 16;
const ENTRIES_OFFSET: usize = 32;

fn node_size(branching: u32) -> usize {
    ENTRIES_OFFSET + (branching as usize + 1) * ENTRY_SIZE
}

/// The size of one node block.
pub(super) fn node_block_size(branching: u32) -> usize {
    node_size(branching)
}

fn min_entries(branching: u32) -> usize {
    branching as usize / 2
}

fn is_leaf(storage: &StorageManager, node: BlockId) -> bool {
    read_u32(storage.block(node), FLAGS_OFFSET) & LEAF != 0
}

fn used(storage: &StorageManager, node: BlockId) -> usize {
    read_u32(storage.block(node), USED_OFFSET) as usize
}

fn next(storage: &StorageManager, node: BlockId) -> Option<BlockId> {
    BlockId::from_raw(read_u64(storage.block(node), NEXT_OFFSET))
}

fn set_next(storage: &mut StorageManager, node: BlockId, next: Option<BlockId>) {
    write_u64(storage.block_mut(node), NEXT_OFFSET, next.map_or(0, BlockId::as_u64));
}

fn set_prev(storage: &mut StorageManager, node: BlockId, prev: Option<BlockId>) {
    write_u64(storage.block_mut(node), PREV_OFFSET, prev.map_or(0, BlockId::as_u64));
}

fn entry(storage: &StorageManager, node: BlockId, index: usize) -> (i64, u64) {
    read_entry(storage.block(node), ENTRIES_OFFSET, index)
}

fn set_key(storage: &mut StorageManager, node: BlockId, index: usize, key: i64) {
    let (_, value) = entry(storage, node, index);
    write_entry(storage.block_mut(node), ENTRIES_OFFSET, index, (key, value));
}

fn child(storage: &StorageManager, node: BlockId, index: usize) -> BlockId {
    let (_, child) = entry(storage, node, index);
    BlockId::from_raw(child).unwrap_or_else(|| panic!("The node {node} has a null child."))
}

fn read_entries(storage: &StorageManager, node: BlockId) -> Vec<(i64, u64)> {
    (0..used(storage, node))
        .map(|index| entry(storage, node, index))
        .collect()
}

fn write_entries(storage: &mut StorageManager, node: BlockId, entries: &[(i64, u64)]) {
    let block = storage.block_mut(node);
    for (index, entry) in entries.iter().enumerate() {
        write_entry(block, ENTRIES_OFFSET, index, *entry);
    }
    write_u32(block, USED_OFFSET, entries.len() as u32);
}

fn insert_entry_at(storage: &mut StorageManager, node: BlockId, index: usize, entry: (i64, u64)) {
    let used = used(storage, node);
    let block = storage.block_mut(node);
    let start = ENTRIES_OFFSET + index * ENTRY_SIZE;
    let end = ENTRIES_OFFSET + used * ENTRY_SIZE;
    block.copy_within(start..end, start + ENTRY_SIZE);
    write_entry(block, ENTRIES_OFFSET, index, entry);
    write_u32(block, USED_OFFSET, used as u32 + 1);
}

fn remove_entry_at(storage: &mut StorageManager, node: BlockId, index: usize) {
    let used = used(storage, node);
    let block = storage.block_mut(node);
    let start = ENTRIES_OFFSET + index * ENTRY_SIZE;
    let end = ENTRIES_OFFSET + used * ENTRY_SIZE;
    block.copy_within(start + ENTRY_SIZE..end, start);
    write_u32(block, USED_OFFSET, used as u32 - 1);
}

/// The child of an internal node that may contain `key`.
fn child_index(storage: &StorageManager, node: BlockId, key: i64) -> usize {
    let block = storage.block(node);
    let used = read_u32(block, USED_OFFSET) as usize;
    match search_entries(block, ENTRIES_OFFSET, used, key) {
        Ok(index) => index,
        Err(0) => 0,
        Err(index) => index - 1,
    }
}

/// Descends to the leaf that may contain `key`, recording `(internal node, child index)` pairs.
fn descend(
    storage: &StorageManager,
    root: BlockId,
    key: i64,
    path: &mut Vec<(BlockId, usize)>,
) -> BlockId {
    let mut node = root;
    while !is_leaf(storage, node) {
        let index = child_index(storage, node, key);
        path.push((node, index));
        node = child(storage, node, index);
    }
    node
}

/// Allocates an empty tree, which is a single leaf.
pub(super) fn create(storage: &mut StorageManager, branching: u32) -> StorageResult<BlockId> {
    let root = storage.new_block(node_size(branching))?;
    write_u32(storage.block_mut(root), FLAGS_OFFSET, LEAF);
    Ok(root)
}

pub(super) fn get(storage: &StorageManager, root: BlockId, key: i64) -> Option<u64> {
    let leaf = descend(storage, root, key, &mut Vec::new());
    let block = storage.block(leaf);
    let used = read_u32(block, USED_OFFSET) as usize;
    let index = search_entries(block, ENTRIES_OFFSET, used, key).ok()?;
    Some(entry(storage, leaf, index).1)
}

/// The number of levels of the tree.
pub(super) fn depth(storage: &StorageManager, root: BlockId) -> usize {
    let mut depth = 1;
    let mut node = root;
    while !is_leaf(storage, node) {
        node = child(storage, node, 0);
        depth += 1;
    }
    depth
}

/// Returns the number of bytes an insertion may allocate (a split on every level plus a new
/// root).
pub(super) fn insert_bound(storage: &StorageManager, root: BlockId, branching: u32) -> u64 {
    (depth(storage, root) as u64 + 1) * storage.allocation_size(node_size(branching))
}

/// Inserts `(key, value)`. Returns the (possibly new) root and whether the key was inserted. An
/// existing key is not overwritten.
pub(super) fn insert(
    storage: &mut StorageManager,
    root: BlockId,
    branching: u32,
    key: i64,
    value: u64,
) -> StorageResult<(BlockId, bool)> {
    let mut path = Vec::new();
    let leaf = descend(storage, root, key, &mut path);
    let position = {
        let block = storage.block(leaf);
        let used = read_u32(block, USED_OFFSET) as usize;
        match search_entries(block, ENTRIES_OFFSET, used, key) {
            Ok(_) => return Ok((root, false)),
            Err(position) => position,
        }
    };
    insert_entry_at(storage, leaf, position, (key, value));

    let mut node = leaf;
    while used(storage, node) > branching as usize {
        let (separator, sibling) = split(storage, node, branching)?;
        match path.pop() {
            Some((parent, index)) => {
                insert_entry_at(storage, parent, index + 1, (separator, sibling.as_u64()));
                node = parent;
            }
            None => {
                let new_root = storage.new_block(node_size(branching))?;
                write_entries(
                    storage,
                    new_root,
                    &[(i64::MIN, node.as_u64()), (separator, sibling.as_u64())],
                );
                return Ok((new_root, true));
            }
        }
    }
    Ok((root, true))
}

/// Moves the upper half of `node` into a new right sibling. Returns the separator key of the
/// sibling and its id.
fn split(
    storage: &mut StorageManager,
    node: BlockId,
    branching: u32,
) -> StorageResult<(i64, BlockId)> {
    let sibling = storage.new_block(node_size(branching))?;
    let leaf = is_leaf(storage, node);
    let entries = read_entries(storage, node);
    let middle = entries.len() / 2;

    if leaf {
        write_u32(storage.block_mut(sibling), FLAGS_OFFSET, LEAF);
        let next = next(storage, node);
        set_next(storage, sibling, next);
        set_prev(storage, sibling, Some(node));
        set_next(storage, node, Some(sibling));
        if let Some(next) = next {
            set_prev(storage, next, Some(sibling));
        }
    }
    write_entries(storage, sibling, &entries[middle..]);
    write_entries(storage, node, &entries[..middle]);
    Ok((entries[middle].0, sibling))
}

/// Removes `key`. Returns the (possibly new) root and the removed value.
///
/// An underflowing node borrows an entry from a sibling or is merged with it. A merge removes an
/// entry from the parent, so the parent is checked next, up to the root. A root with a single
/// child is replaced by that child.
pub(super) fn remove(
    storage: &mut StorageManager,
    root: BlockId,
    branching: u32,
    key: i64,
) -> (BlockId, Option<u64>) {
    let mut path = Vec::new();
    let leaf = descend(storage, root, key, &mut path);
    let position = {
        let block = storage.block(leaf);
        let used = read_u32(block, USED_OFFSET) as usize;
        match search_entries(block, ENTRIES_OFFSET, used, key) {
            Ok(position) => position,
            Err(_) => return (root, None),
        }
    };
    let (_, value) = entry(storage, leaf, position);
    remove_entry_at(storage, leaf, position);

    let min = min_entries(branching);
    let mut node = leaf;
    while let Some((parent, index)) = path.pop() {
        if used(storage, node) >= min || !rebalance(storage, parent, index, node, min) {
            break;
        }
        node = parent;
    }

    let mut root = root;
    while !is_leaf(storage, root) && used(storage, root) == 1 {
        let only_child = child(storage, root, 0);
        storage.release_block(root);
        root = only_child;
    }
    (root, Some(value))
}

/// Fixes the underflow of `node`, the `index`-th child of `parent`. Returns `true` if two nodes
/// were merged.
fn rebalance(
    storage: &mut StorageManager,
    parent: BlockId,
    index: usize,
    node: BlockId,
    min: usize,
) -> bool {
    if index + 1 < used(storage, parent) {
        let right = child(storage, parent, index + 1);
        if used(storage, right) > min {
            borrow_from_right(storage, parent, index, node, right);
            return false;
        }
        merge(storage, parent, index, node, right);
    } else {
        let left = child(storage, parent, index - 1);
        if used(storage, left) > min {
            borrow_from_left(storage, parent, index, left, node);
            return false;
        }
        merge(storage, parent, index - 1, left, node);
    }
    true
}

fn borrow_from_right(
    storage: &mut StorageManager,
    parent: BlockId,
    index: usize,
    node: BlockId,
    right: BlockId,
) {
    let mut right_entries = read_entries(storage, right);
    let (first_key, first_value) = right_entries.remove(0);
    let moved_key = if is_leaf(storage, node) {
        first_key
    } else {
        entry(storage, parent, index + 1).0
    };

    let used = used(storage, node);
    insert_entry_at(storage, node, used, (moved_key, first_value));
    write_entries(storage, right, &right_entries);
    set_key(storage, parent, index + 1, right_entries[0].0);
}

fn borrow_from_left(
    storage: &mut StorageManager,
    parent: BlockId,
    index: usize,
    left: BlockId,
    node: BlockId,
) {
    let mut left_entries = read_entries(storage, left);
    let Some((last_key, last_value)) = left_entries.pop() else {
        unreachable!("Borrowing from an empty sibling.")
    };

    let mut node_entries = read_entries(storage, node);
    if !is_leaf(storage, node) {
        node_entries[0].0 = entry(storage, parent, index).0;
    }
    node_entries.insert(0, (last_key, last_value));

    write_entries(storage, left, &left_entries);
    write_entries(storage, node, &node_entries);
    set_key(storage, parent, index, last_key);
}

/// Appends `right` (the child at `left_index + 1`) to `left` and releases it.
fn merge(
    storage: &mut StorageManager,
    parent: BlockId,
    left_index: usize,
    left: BlockId,
    right: BlockId,
) {
    let mut entries = read_entries(storage, left);
    let mut right_entries = read_entries(storage, right);
    if is_leaf(storage, left) {
        let next = next(storage, right);
        set_next(storage, left, next);
        if let Some(next) = next {
            set_prev(storage, next, Some(left));
        }
    } else {
        right_entries[0].0 = entry(storage, parent, left_index + 1).0;
    }
    entries.extend(right_entries);

    write_entries(storage, left, &entries);
    storage.release_block(right);
    remove_entry_at(storage, parent, left_index + 1);
}

/// Moves `(leaf, index)` forward to the next valid entry, following sibling links.
pub(super) fn normalize(
    storage: &StorageManager,
    mut leaf: BlockId,
    mut index: usize,
) -> Option<(BlockId, usize)> {
    while index >= used(storage, leaf) {
        leaf = next(storage, leaf)?;
        index = 0;
    }
    Some((leaf, index))
}

/// The position of the first entry with a key `>= key`.
pub(super) fn seek(storage: &StorageManager, root: BlockId, key: i64) -> Option<(BlockId, usize)> {
    let leaf = descend(storage, root, key, &mut Vec::new());
    let block = storage.block(leaf);
    let used = read_u32(block, USED_OFFSET) as usize;
    let index = match search_entries(block, ENTRIES_OFFSET, used, key) {
        Ok(index) | Err(index) => index,
    };
    normalize(storage, leaf, index)
}

/// The position of the smallest entry.
pub(super) fn first(storage: &StorageManager, root: BlockId) -> Option<(BlockId, usize)> {
    seek(storage, root, i64::MIN)
}

pub(super) fn leaf_entry(storage: &StorageManager, leaf: BlockId, index: usize) -> (i64, u64) {
    entry(storage, leaf, index)
}

fn nodes(storage: &StorageManager, root: BlockId) -> Vec<BlockId> {
    let mut result = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if !is_leaf(storage, node) {
            stack.extend((0..used(storage, node)).map(|index| child(storage, node, index)));
        }
        result.push(node);
    }
    result
}

/// Releases all nodes of the tree.
pub(super) fn destroy(storage: &mut StorageManager, root: BlockId) {
    for node in nodes(storage, root) {
        storage.release_block(node);
    }
}

/// The number of bytes held by the nodes of the tree.
pub(super) fn memory_size(storage: &StorageManager, root: BlockId) -> u64 {
    nodes(storage, root)
        .into_iter()
        .map(|node| storage.block_size(node) as u64)
        .sum()
}
