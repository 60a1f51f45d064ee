use crate::block::{read_u32, read_u64, write_u32, write_u64};
use crate::manager::{BlockId, RemapListener};
use hexastore_common::{CorruptionError, StorageError, StorageResult};
use memmap2::{MmapMut, MmapOptions};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

const MAGIC: &[u8; 8] = b"HXSTORE1";
const VERSION: u32 = 1;

// File header
const FILE_HEADER_SIZE: u64 = 64;
const VERSION_OFFSET: usize = 8;
const BUMP_OFFSET: usize = 16;
const ROOT_OFFSET: usize = 24;

// Block header: payload size (u32), live flag (u32)
const BLOCK_HEADER_SIZE: u64 = 8;
const ALIGNMENT: u64 = 8;
const MIN_FILE_SIZE: u64 = 4096;

/// Blocks bump-allocated from a memory-mapped file.
///
/// ```text
/// ┌────────────────┬────────┬─────────┬────────┬─────────┬─────┬──────────────┐
/// │ header (64 B)  │ size|1 │ payload │ size|0 │ payload │ ... │ unused space │
/// └────────────────┴────────┴─────────┴────────┴─────────┴─────┴──────────────┘
///                           ▲                                  ▲
///                           BlockId = payload offset           bump pointer
/// ```
///
/// Released blocks are kept in free lists keyed by their exact payload size. Free blocks are not
/// coalesced.
pub(super) struct MappedBlocks {
    path: PathBuf,
    file: File,
    map: MmapMut,
    bump: u64,
    free: BTreeMap<u64, Vec<u64>>,
    allocated_bytes: u64,
    block_count: usize,
}

impl MappedBlocks {
    pub(super) fn create(path: &Path, initial_size: u64) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(initial_size.max(MIN_FILE_SIZE))?;
        let mut map = map_file(&file)?;

        map[..MAGIC.len()].copy_from_slice(MAGIC);
        write_u32(&mut map, VERSION_OFFSET, VERSION);
        write_u64(&mut map, BUMP_OFFSET, FILE_HEADER_SIZE);
        write_u64(&mut map, ROOT_OFFSET, 0);

        tracing::debug!(path = %path.display(), capacity = map.len(), "Created mapped storage");
        Ok(Self {
            path: path.to_path_buf(),
            file,
            map,
            bump: FILE_HEADER_SIZE,
            free: BTreeMap::new(),
            allocated_bytes: 0,
            block_count: 0,
        })
    }

    pub(super) fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len();
        if len < FILE_HEADER_SIZE {
            return Err(CorruptionError::msg(format!(
                "The mapped file {} is too small ({len} bytes).",
                path.display()
            ))
            .into());
        }

        let map = map_file(&file)?;
        if &map[..MAGIC.len()] != MAGIC {
            return Err(CorruptionError::msg("The mapped file has an invalid magic number.").into());
        }
        let version = read_u32(&map, VERSION_OFFSET);
        if version != VERSION {
            return Err(CorruptionError::msg(format!(
                "Unsupported mapped file version {version}."
            ))
            .into());
        }
        let bump = read_u64(&map, BUMP_OFFSET);
        if bump < FILE_HEADER_SIZE || bump > len || bump % ALIGNMENT != 0 {
            return Err(CorruptionError::msg(format!("Invalid bump pointer {bump}.")).into());
        }

        let mut result = Self {
            path: path.to_path_buf(),
            file,
            map,
            bump,
            free: BTreeMap::new(),
            allocated_bytes: 0,
            block_count: 0,
        };
        result.rebuild_free_lists()?;

        tracing::debug!(
            path = %path.display(),
            capacity = result.capacity(),
            blocks = result.block_count,
            "Opened mapped storage"
        );
        Ok(result)
    }

    /// Walks all blocks between the file header and the bump pointer.
    fn rebuild_free_lists(&mut self) -> StorageResult<()> {
        let mut offset = FILE_HEADER_SIZE;
        while offset < self.bump {
            if offset + BLOCK_HEADER_SIZE > self.bump {
                return Err(CorruptionError::msg(format!(
                    "Truncated block header at offset {offset}."
                ))
                .into());
            }
            let size = u64::from(read_u32(&self.map, offset as usize));
            let live = read_u32(&self.map, offset as usize + 4);
            let payload = offset + BLOCK_HEADER_SIZE;
            if size == 0 || size % ALIGNMENT != 0 || payload + size > self.bump {
                return Err(CorruptionError::msg(format!(
                    "Invalid block header at offset {offset}."
                ))
                .into());
            }

            match live {
                0 => self.free.entry(size).or_default().push(payload),
                1 => {
                    self.allocated_bytes += size;
                    self.block_count += 1;
                }
                _ => {
                    return Err(CorruptionError::msg(format!(
                        "Invalid live flag {live} at offset {offset}."
                    ))
                    .into())
                }
            }
            offset = payload + size;
        }
        Ok(())
    }

    pub(super) fn allocation_size(size: usize) -> u64 {
        payload_size(size) + BLOCK_HEADER_SIZE
    }

    pub(super) fn allocate(
        &mut self,
        size: usize,
        listeners: &mut [Box<dyn RemapListener>],
    ) -> StorageResult<BlockId> {
        let payload_size = payload_size(size);
        if payload_size > u64::from(u32::MAX) {
            return Err(StorageError::OutOfSpace {
                requested: payload_size,
                capacity: u64::from(u32::MAX),
            });
        }

        if let Some(payload) = self.pop_free(payload_size) {
            let start = payload as usize;
            self.map[start..start + payload_size as usize].fill(0);
            write_u32(&mut self.map, start - 4, 1);
            self.allocated_bytes += payload_size;
            self.block_count += 1;
            return Ok(BlockId(payload));
        }

        let end = self.bump + BLOCK_HEADER_SIZE + payload_size;
        if end > self.capacity() {
            self.grow(end, listeners)?;
        }

        let header = self.bump as usize;
        write_u32(&mut self.map, header, payload_size as u32);
        write_u32(&mut self.map, header + 4, 1);
        self.bump = end;
        write_u64(&mut self.map, BUMP_OFFSET, end);
        self.allocated_bytes += payload_size;
        self.block_count += 1;
        Ok(BlockId(header as u64 + BLOCK_HEADER_SIZE))
    }

    fn pop_free(&mut self, payload_size: u64) -> Option<u64> {
        let offsets = self.free.get_mut(&payload_size)?;
        let payload = offsets.pop();
        if offsets.is_empty() {
            self.free.remove(&payload_size);
        }
        payload
    }

    pub(super) fn release(&mut self, id: BlockId) {
        let size = self.payload_size_of(id);
        write_u32(&mut self.map, id.0 as usize - 4, 0);
        self.free.entry(size).or_default().push(id.0);
        self.allocated_bytes -= size;
        self.block_count -= 1;
    }

    pub(super) fn reserve(
        &mut self,
        bytes: u64,
        listeners: &mut [Box<dyn RemapListener>],
    ) -> StorageResult<()> {
        let end = self.bump + bytes;
        if end > self.capacity() {
            self.grow(end, listeners)?;
        }
        Ok(())
    }

    /// Doubles the file until it holds at least `min_capacity` bytes and maps it again.
    fn grow(
        &mut self,
        min_capacity: u64,
        listeners: &mut [Box<dyn RemapListener>],
    ) -> StorageResult<()> {
        let old_capacity = self.capacity();
        let mut new_capacity = old_capacity.max(MIN_FILE_SIZE);
        while new_capacity < min_capacity {
            new_capacity = new_capacity.checked_mul(2).ok_or(StorageError::OutOfSpace {
                requested: min_capacity,
                capacity: old_capacity,
            })?;
        }

        tracing::debug!(
            path = %self.path.display(),
            old_capacity,
            new_capacity,
            "Growing mapped storage"
        );

        for listener in listeners.iter_mut() {
            listener.freeze(old_capacity);
        }
        let result = self.remap(new_capacity);
        let capacity = self.capacity();
        for listener in listeners.iter_mut() {
            listener.thaw(capacity);
        }
        result
    }

    fn remap(&mut self, new_capacity: u64) -> StorageResult<()> {
        self.map.flush()?;
        self.file.set_len(new_capacity)?;
        self.map = map_file(&self.file)?;
        Ok(())
    }

    pub(super) fn contains(&self, id: BlockId) -> bool {
        let payload = id.0;
        if payload < FILE_HEADER_SIZE + BLOCK_HEADER_SIZE
            || payload % ALIGNMENT != 0
            || payload > self.bump
        {
            return false;
        }
        let size = u64::from(read_u32(&self.map, payload as usize - 8));
        let live = read_u32(&self.map, payload as usize - 4);
        live == 1 && size > 0 && payload + size <= self.bump
    }

    fn payload_size_of(&self, id: BlockId) -> u64 {
        assert!(self.contains(id), "The block {id} does not exist.");
        u64::from(read_u32(&self.map, id.0 as usize - 8))
    }

    pub(super) fn block(&self, id: BlockId) -> &[u8] {
        let size = self.payload_size_of(id) as usize;
        let start = id.0 as usize;
        &self.map[start..start + size]
    }

    pub(super) fn block_mut(&mut self, id: BlockId) -> &mut [u8] {
        let size = self.payload_size_of(id) as usize;
        let start = id.0 as usize;
        &mut self.map[start..start + size]
    }

    pub(super) fn root(&self) -> Option<BlockId> {
        BlockId::from_raw(read_u64(&self.map, ROOT_OFFSET))
    }

    pub(super) fn set_root(&mut self, root: Option<BlockId>) {
        write_u64(&mut self.map, ROOT_OFFSET, root.map_or(0, BlockId::as_u64));
    }

    pub(super) fn allocated_bytes(&self) -> u64 {
        self.allocated_bytes
    }

    pub(super) fn block_count(&self) -> usize {
        self.block_count
    }

    pub(super) fn flush(&self) -> StorageResult<()> {
        self.map.flush()?;
        Ok(())
    }

    fn capacity(&self) -> u64 {
        self.map.len() as u64
    }
}

impl Drop for MappedBlocks {
    fn drop(&mut self) {
        if let Err(error) = self.map.flush() {
            tracing::warn!(path = %self.path.display(), %error, "Failed to flush mapped storage");
        }
    }
}

fn payload_size(size: usize) -> u64 {
    (size.max(1) as u64).div_ceil(ALIGNMENT) * ALIGNMENT
}

#[expect(unsafe_code, reason = "memory-mapping a file requires unsafe")]
fn map_file(file: &File) -> StorageResult<MmapMut> {
    // SAFETY: The file is opened read-write by this manager and is only resized through
    // `MappedBlocks::remap`, which replaces the mapping right after resizing.
    let map = unsafe { MmapOptions::new().map_mut(file)? };
    Ok(map)
}
