#![cfg(test)]

use assert_fs::prelude::*;
use assert_fs::TempDir;
use hexastore_model::{Node, NodeId, NodeMap, Triple, TriplePosition};
use hexastore_storage::{
    read_hexastore, write_hexastore, Hexastore, IndexConfiguration, IndexOrder, StorageError,
    StorageManager,
};
use itertools::Itertools;
use std::fs::File;
use std::io::{BufReader, BufWriter};

#[test]
fn test_mapped_hexastore_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let file = dir.child("store.hex");
    let triples = example_triples();

    {
        let storage = StorageManager::create_mapped(file.path(), 4096).unwrap();
        let mut hexastore =
            Hexastore::new(storage, IndexConfiguration::default().with_btree_terminals()).unwrap();
        hexastore.add_triple_batch(triples.clone()).unwrap();
        hexastore.remove_triple(&triples[0]);
        hexastore.flush().unwrap();
    }
    file.assert(predicates::path::exists());

    let storage = StorageManager::open_mapped(file.path()).unwrap();
    let mut hexastore = Hexastore::open(storage).unwrap();
    assert_eq!(
        hexastore.config(),
        IndexConfiguration::default().with_btree_terminals()
    );
    assert_eq!(hexastore.len(), triples.len() as u64 - 1);
    assert!(!hexastore.contains(&triples[0]));
    for order in IndexOrder::ALL {
        assert_eq!(hexastore.index(order).len(), triples.len() as u64 - 1);
    }

    // The reopened store is still writable.
    assert!(hexastore.add_triple(triples[0]).unwrap());
    assert_eq!(hexastore.len(), triples.len() as u64);
}

#[test]
fn test_open_mapped_rejects_bad_header() {
    let dir = TempDir::new().unwrap();
    let cases = [
        ("short.hex", vec![0; 32], "too small"),
        ("foreign.hex", vec![1; 128], "invalid magic number"),
        (
            "version.hex",
            raw_mapped_file(128, 2, 64, &[]),
            "Unsupported mapped file version 2.",
        ),
        (
            "before_header.hex",
            raw_mapped_file(128, 1, 32, &[]),
            "Invalid bump pointer 32.",
        ),
        (
            "past_end.hex",
            raw_mapped_file(128, 1, 256, &[]),
            "Invalid bump pointer 256.",
        ),
    ];

    for (name, bytes, message) in cases {
        let file = dir.child(name);
        file.write_binary(&bytes).unwrap();
        let error = StorageManager::open_mapped(file.path()).unwrap_err();
        assert!(matches!(error, StorageError::Corruption(_)), "{error}");
        assert!(error.to_string().contains(message), "{name}: {error}");
    }
}

#[test]
fn test_open_mapped_rejects_unaligned_bump() {
    let dir = TempDir::new().unwrap();
    let file = dir.child("unaligned.hex");
    // One live 24 byte block ends at 96, the bump pointer claims 100 bytes.
    file.write_binary(&raw_mapped_file(100, 1, 100, &[(24, 1)])).unwrap();

    let error = StorageManager::open_mapped(file.path()).unwrap_err();
    assert!(matches!(error, StorageError::Corruption(_)), "{error}");
    assert_eq!(error.to_string(), "Invalid bump pointer 100.");
}

#[test]
fn test_open_mapped_rejects_bad_blocks() {
    let dir = TempDir::new().unwrap();
    let cases = [
        (
            "truncated.hex",
            raw_mapped_file(4096, 1, 96, &[(64, 1)]),
            "Invalid block header at offset 64.",
        ),
        (
            "empty_block.hex",
            raw_mapped_file(4096, 1, 80, &[(0, 1)]),
            "Invalid block header at offset 64.",
        ),
        (
            "live_flag.hex",
            raw_mapped_file(4096, 1, 96, &[(8, 1), (8, 7)]),
            "Invalid live flag 7 at offset 80.",
        ),
    ];

    for (name, bytes, message) in cases {
        let file = dir.child(name);
        file.write_binary(&bytes).unwrap();
        let error = StorageManager::open_mapped(file.path()).unwrap_err();
        assert!(matches!(error, StorageError::Corruption(_)), "{error}");
        assert_eq!(error.to_string(), message, "{name}");
    }
}

#[test]
fn test_open_mapped_accepts_handwritten_blocks() {
    let dir = TempDir::new().unwrap();
    let file = dir.child("handwritten.hex");
    file.write_binary(&raw_mapped_file(4096, 1, 120, &[(16, 1), (24, 0)]))
        .unwrap();

    let mut storage = StorageManager::open_mapped(file.path()).unwrap();
    assert_eq!(storage.block_count(), 1);
    // The released block is handed out again.
    let reused = storage.new_block(24).unwrap();
    assert_eq!(reused.as_u64(), 96);
}

#[test]
fn test_mapped_file_grows() {
    let dir = TempDir::new().unwrap();
    let file = dir.child("small.hex");

    let storage = StorageManager::create_mapped(file.path(), 4096).unwrap();
    let mut hexastore = Hexastore::new(storage, IndexConfiguration::default()).unwrap();
    let triples = (1..=200)
        .map(|i| Triple::from_raw(i, 1000 + i % 7, 2000 + i % 13))
        .collect_vec();
    hexastore.add_triple_batch(triples.clone()).unwrap();

    assert_eq!(hexastore.len(), 200);
    assert!(file.path().metadata().unwrap().len() > 4096);
    assert_eq!(
        hexastore.count_statements(NodeId::WILDCARD, NodeId::new(1003), NodeId::WILDCARD),
        triples
            .iter()
            .filter(|triple| triple.predicate == NodeId::new(1003))
            .count() as u64
    );
}

#[test]
fn test_open_without_hexastore_fails() {
    let dir = TempDir::new().unwrap();
    let file = dir.child("empty.hex");
    drop(StorageManager::create_mapped(file.path(), 4096).unwrap());

    let storage = StorageManager::open_mapped(file.path()).unwrap();
    let error = Hexastore::open(storage).unwrap_err();
    assert!(matches!(error, StorageError::Corruption(_)), "{error}");
}

#[test]
fn test_snapshot_file_roundtrip() {
    let dir = TempDir::new().unwrap();
    let file = dir.child("snapshot.bin");

    let mut node_map = NodeMap::new();
    let alice = node_map.intern(Node::resource("http://example.com/alice"));
    let knows = node_map.intern(Node::resource("http://xmlns.com/foaf/0.1/knows"));
    let bob = node_map.intern(Node::resource("http://example.com/bob"));
    let name = node_map.intern(Node::resource("http://xmlns.com/foaf/0.1/name"));
    let bob_name = node_map.intern(Node::literal("Bob"));

    let mut hexastore =
        Hexastore::new(StorageManager::memory(), IndexConfiguration::default()).unwrap();
    hexastore
        .add_triple_batch([
            Triple::new(alice, knows, bob),
            Triple::new(bob, name, bob_name),
        ])
        .unwrap();

    let writer = BufWriter::new(File::create(file.path()).unwrap());
    write_hexastore(&hexastore, Some(&node_map), writer).unwrap();

    let reader = BufReader::new(File::open(file.path()).unwrap());
    let (restored, restored_map) = read_hexastore(
        StorageManager::memory(),
        IndexConfiguration::default().with_btree_terminals(),
        reader,
    )
    .unwrap();
    let restored_map = restored_map.unwrap();

    assert_eq!(restored.len(), 2);
    assert_eq!(
        restored
            .get_statements(NodeId::WILDCARD, knows, NodeId::WILDCARD, TriplePosition::Object)
            .collect_vec(),
        vec![Triple::new(alice, knows, bob)]
    );
    assert_eq!(restored_map.len(), node_map.len());
    assert_eq!(restored_map.get_node(bob_name), Some(&Node::literal("Bob")));
    assert_eq!(restored_map.next_id(), node_map.next_id());
}

#[test]
fn test_truncated_snapshot_fails() {
    let mut hexastore =
        Hexastore::new(StorageManager::memory(), IndexConfiguration::default()).unwrap();
    hexastore.add_triple_batch(example_triples()).unwrap();

    let mut bytes = Vec::new();
    write_hexastore(&hexastore, None, &mut bytes).unwrap();
    bytes.truncate(bytes.len() / 2);

    let result = read_hexastore(
        StorageManager::memory(),
        IndexConfiguration::default(),
        bytes.as_slice(),
    );
    assert!(result.is_err());
}

/// Builds a mapped file of `len` bytes by hand. Each block is given as its payload size and
/// live flag and is laid out right after the 64 byte file header.
fn raw_mapped_file(len: usize, version: u32, bump: u64, blocks: &[(u32, u32)]) -> Vec<u8> {
    let mut bytes = vec![0; len];
    bytes[..8].copy_from_slice(b"HXSTORE1");
    bytes[8..12].copy_from_slice(&version.to_le_bytes());
    bytes[16..24].copy_from_slice(&bump.to_le_bytes());
    let mut offset = 64;
    for (size, live) in blocks {
        bytes[offset..offset + 4].copy_from_slice(&size.to_le_bytes());
        bytes[offset + 4..offset + 8].copy_from_slice(&live.to_le_bytes());
        offset += 8 + *size as usize;
    }
    bytes
}

fn example_triples() -> Vec<Triple> {
    (1..=4)
        .cartesian_product(10..=12)
        .cartesian_product(20..=24)
        .map(|((s, p), o)| Triple::from_raw(s, p, o))
        .collect()
}
