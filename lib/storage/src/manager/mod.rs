//! Block storage.
//!
//! Every structure of a hexastore lives in blocks handed out by a [StorageManager]. Structures
//! never hold on to the memory of a block. They keep the block's [BlockId] and resolve it through
//! the manager on every access:
//!
//! ```text
//!  Structure ── BlockId ──► StorageManager::block(id) ──► &[u8]
//!                               │
//!                               ├─ heap backend:   slot in a slab of boxed slices
//!                               └─ mapped backend: byte offset into a growable file mapping
//! ```
//!
//! Growing the mapped backend replaces the mapping. As block ids are offsets into the file, they
//! stay valid across a remap and across process restarts. Because [StorageManager::block]
//! borrows the manager and allocation requires `&mut self`, no block memory can be kept alive
//! across an allocation.

mod heap;
mod mapped;

use crate::config::StorageConfig;
use hexastore_common::StorageResult;
use heap::HeapBlocks;
use mapped::MappedBlocks;
use std::fmt::{Debug, Display, Formatter};
use std::path::Path;

/// A stable identifier of a block.
///
/// Zero is never a valid block id and is used as "no block" in persisted fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(u64);

impl BlockId {
    /// Converts a persisted value into a [BlockId]. Returns [None] for zero.
    pub fn from_raw(value: u64) -> Option<Self> {
        (value != 0).then_some(Self(value))
    }

    /// Returns the raw value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl Display for BlockId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Observes remaps of a mapped storage.
///
/// `freeze` is called before the mapping is replaced and `thaw` after. Structures only store
/// [BlockId]s, so there is nothing to convert. Listeners can be used for instrumentation.
pub trait RemapListener: Send {
    /// Called before the mapping of `old_capacity` bytes is dropped.
    fn freeze(&mut self, old_capacity: u64);

    /// Called after the new mapping has been established.
    fn thaw(&mut self, new_capacity: u64);
}

enum Backend {
    Heap(HeapBlocks),
    Mapped(MappedBlocks),
}

/// Allocates, resolves, and releases blocks.
pub struct StorageManager {
    backend: Backend,
    listeners: Vec<Box<dyn RemapListener>>,
}

impl StorageManager {
    /// Creates a heap-backed storage manager.
    pub fn memory() -> Self {
        Self {
            backend: Backend::Heap(HeapBlocks::new()),
            listeners: Vec::new(),
        }
    }

    /// Creates a new mapped file at `path`, truncating any existing file.
    pub fn create_mapped(path: impl AsRef<Path>, initial_size: u64) -> StorageResult<Self> {
        Ok(Self {
            backend: Backend::Mapped(MappedBlocks::create(path.as_ref(), initial_size)?),
            listeners: Vec::new(),
        })
    }

    /// Opens an existing mapped file at `path`, rebuilding the free lists from the blocks in the
    /// file.
    pub fn open_mapped(path: impl AsRef<Path>) -> StorageResult<Self> {
        Ok(Self {
            backend: Backend::Mapped(MappedBlocks::open(path.as_ref())?),
            listeners: Vec::new(),
        })
    }

    /// Creates a new, empty storage manager from `config`.
    pub fn from_config(config: &StorageConfig) -> StorageResult<Self> {
        match config {
            StorageConfig::Memory => Ok(Self::memory()),
            StorageConfig::MappedFile { path, initial_size } => {
                Self::create_mapped(path, *initial_size)
            }
        }
    }

    /// Registers a [RemapListener].
    pub fn add_remap_listener(&mut self, listener: Box<dyn RemapListener>) {
        self.listeners.push(listener);
    }

    /// Returns `true` if blocks live in a mapped file.
    pub fn is_mapped(&self) -> bool {
        matches!(self.backend, Backend::Mapped(_))
    }

    /// Allocates a zeroed block of at least `size` bytes.
    pub fn new_block(&mut self, size: usize) -> StorageResult<BlockId> {
        match &mut self.backend {
            Backend::Heap(heap) => Ok(heap.allocate(size)),
            Backend::Mapped(mapped) => mapped.allocate(size, &mut self.listeners),
        }
    }

    /// Releases a block. The id must not be used afterward.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not refer to a live block.
    pub fn release_block(&mut self, id: BlockId) {
        match &mut self.backend {
            Backend::Heap(heap) => heap.release(id),
            Backend::Mapped(mapped) => mapped.release(id),
        }
    }

    /// Allocates a block of `new_size` bytes holding the first bytes of `id` and releases `id`.
    pub fn resize_block(&mut self, id: BlockId, new_size: usize) -> StorageResult<BlockId> {
        let new_id = self.new_block(new_size)?;
        let copied = self.block_size(id).min(self.block_size(new_id));
        let content = self.block(id)[..copied].to_vec();
        self.block_mut(new_id)[..copied].copy_from_slice(&content);
        self.release_block(id);
        Ok(new_id)
    }

    /// Resolves a block.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not refer to a live block. Structures only store ids of blocks they
    /// own, so an unknown id is a corrupted structure.
    pub fn block(&self, id: BlockId) -> &[u8] {
        match &self.backend {
            Backend::Heap(heap) => heap.block(id),
            Backend::Mapped(mapped) => mapped.block(id),
        }
    }

    /// Resolves a block for writing. See [Self::block].
    pub fn block_mut(&mut self, id: BlockId) -> &mut [u8] {
        match &mut self.backend {
            Backend::Heap(heap) => heap.block_mut(id),
            Backend::Mapped(mapped) => mapped.block_mut(id),
        }
    }

    /// Returns the usable size of a block.
    pub fn block_size(&self, id: BlockId) -> usize {
        self.block(id).len()
    }

    /// Returns `true` if `id` refers to a live block.
    pub fn contains_block(&self, id: BlockId) -> bool {
        match &self.backend {
            Backend::Heap(heap) => heap.contains(id),
            Backend::Mapped(mapped) => mapped.contains(id),
        }
    }

    /// The number of bytes a block of `size` bytes occupies, including headers and padding.
    pub fn allocation_size(&self, size: usize) -> u64 {
        match &self.backend {
            Backend::Heap(_) => HeapBlocks::allocation_size(size),
            Backend::Mapped(_) => MappedBlocks::allocation_size(size),
        }
    }

    /// Makes sure that the next `bytes` bytes of allocations (as computed by
    /// [Self::allocation_size]) cannot fail for lack of space.
    ///
    /// For the mapped backend, this grows the file ahead of time. Callers use it to fail a
    /// mutation before it touches any structure.
    pub fn reserve(&mut self, bytes: u64) -> StorageResult<()> {
        match &mut self.backend {
            Backend::Heap(_) => Ok(()),
            Backend::Mapped(mapped) => mapped.reserve(bytes, &mut self.listeners),
        }
    }

    /// Returns the root block id recorded in this storage.
    pub fn root(&self) -> Option<BlockId> {
        match &self.backend {
            Backend::Heap(heap) => heap.root(),
            Backend::Mapped(mapped) => mapped.root(),
        }
    }

    /// Records the root block id, allowing a structure to be reattached after reopening.
    pub fn set_root(&mut self, root: Option<BlockId>) {
        match &mut self.backend {
            Backend::Heap(heap) => heap.set_root(root),
            Backend::Mapped(mapped) => mapped.set_root(root),
        }
    }

    /// The number of bytes held by live blocks.
    pub fn allocated_bytes(&self) -> u64 {
        match &self.backend {
            Backend::Heap(heap) => heap.allocated_bytes(),
            Backend::Mapped(mapped) => mapped.allocated_bytes(),
        }
    }

    /// The number of live blocks.
    pub fn block_count(&self) -> usize {
        match &self.backend {
            Backend::Heap(heap) => heap.block_count(),
            Backend::Mapped(mapped) => mapped.block_count(),
        }
    }

    /// Writes outstanding changes of a mapped file to disk. A no-op for the heap backend.
    pub fn flush(&self) -> StorageResult<()> {
        match &self.backend {
            Backend::Heap(_) => Ok(()),
            Backend::Mapped(mapped) => mapped.flush(),
        }
    }
}

impl Default for StorageManager {
    fn default() -> Self {
        Self::memory()
    }
}

impl Debug for StorageManager {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageManager")
            .field("mapped", &self.is_mapped())
            .field("block_count", &self.block_count())
            .field("allocated_bytes", &self.allocated_bytes())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
