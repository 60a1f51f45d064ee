//! Little-endian field access for raw blocks.
//!
//! All structures persist their fields through these helpers so that a mapped file has the same
//! layout on every platform.

pub(crate) fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut buf = [0; 4];
    buf.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(buf)
}

pub(crate) fn write_u32(bytes: &mut [u8], offset: usize, value: u32) {
    bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

pub(crate) fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut buf = [0; 8];
    buf.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(buf)
}

pub(crate) fn write_u64(bytes: &mut [u8], offset: usize, value: u64) {
    bytes[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

pub(crate) fn read_i64(bytes: &[u8], offset: usize) -> i64 {
    let mut buf = [0; 8];
    buf.copy_from_slice(&bytes[offset..offset + 8]);
    i64::from_le_bytes(buf)
}

pub(crate) fn write_i64(bytes: &mut [u8], offset: usize, value: i64) {
    bytes[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

/// Size of one `(key, value)` entry in sorted arrays and B-tree nodes.
pub(crate) const ENTRY_SIZE: usize = 16;

/// Reads the `(key, value)` entry at `index` of an entry table starting at `base`.
pub(crate) fn read_entry(bytes: &[u8], base: usize, index: usize) -> (i64, u64) {
    let offset = base + index * ENTRY_SIZE;
    (read_i64(bytes, offset), read_u64(bytes, offset + 8))
}

/// Writes the `(key, value)` entry at `index` of an entry table starting at `base`.
pub(crate) fn write_entry(bytes: &mut [u8], base: usize, index: usize, entry: (i64, u64)) {
    let offset = base + index * ENTRY_SIZE;
    write_i64(bytes, offset, entry.0);
    write_u64(bytes, offset + 8, entry.1);
}

/// Binary search over the keys of an entry table with `len` entries.
///
/// Same contract as [slice::binary_search]: `Ok(index)` if found, otherwise `Err(insert_index)`.
pub(crate) fn search_entries(bytes: &[u8], base: usize, len: usize, key: i64) -> Result<usize, usize> {
    let mut low = 0;
    let mut high = len;
    while low < high {
        let mid = low + (high - low) / 2;
        let (mid_key, _) = read_entry(bytes, base, mid);
        match mid_key.cmp(&key) {
            std::cmp::Ordering::Less => low = mid + 1,
            std::cmp::Ordering::Greater => high = mid,
            std::cmp::Ordering::Equal => return Ok(mid),
        }
    }
    Err(low)
}
