//! Snapshots of a hexastore.
//!
//! A snapshot is a sequence of records, each starting with a one-byte tag. Integers are
//! little-endian: lengths and counts are `u64`, node ids are `i64`.
//!
//! ```text
//! snapshot := node_map? hexastore
//! node_map := 'M' count next_id (id node)*
//! node     := 'N' kind value (language | datatype)?      kind is R, B, L, G, or D
//! hexastore:= 'X' index{6}                               in the order SPO SOP PSO POS OSP OPS
//! index    := 'I' order[3] len triples (key vector)*     order as position letters, e.g. "POS"
//! vector   := 'V' len triples (key terminal)*
//! terminal := 'T' len id*
//! ```
//!
//! Strings are a length followed by UTF-8 bytes. All keys are strictly ascending within their
//! level.
//!
//! Reading rebuilds the hexastore from the SPO record and checks that the other five records hold
//! the same triples. Any mismatch is reported as a [CorruptionError].

use crate::config::IndexConfiguration;
use crate::index::IndexOrder;
use crate::manager::StorageManager;
use crate::Hexastore;
use hexastore_common::{CorruptionError, StorageError, StorageResult};
use hexastore_model::{Node, NodeId, NodeKind, NodeMap, Triple, TriplePosition};
use std::io::{Read, Write};

const NODE_MAP_TAG: u8 = b'M';
const NODE_TAG: u8 = b'N';
const HEXASTORE_TAG: u8 = b'X';
const INDEX_TAG: u8 = b'I';
const VECTOR_TAG: u8 = b'V';
const TERMINAL_TAG: u8 = b'T';

/// Writes `hexastore` (and, if given, the `node_map` naming its nodes) to `writer`.
pub fn write_hexastore(
    hexastore: &Hexastore,
    node_map: Option<&NodeMap>,
    writer: impl Write,
) -> StorageResult<()> {
    let mut writer = SnapshotWriter { inner: writer };
    if let Some(node_map) = node_map {
        writer.write_node_map(node_map)?;
    }

    writer.write_u8(HEXASTORE_TAG)?;
    for order in IndexOrder::ALL {
        writer.write_index(hexastore, order)?;
    }
    writer.inner.flush()?;
    tracing::info!(
        triples = hexastore.len(),
        nodes = node_map.map(NodeMap::len),
        "Wrote hexastore snapshot"
    );
    Ok(())
}

/// Reads a snapshot written by [write_hexastore] into a new hexastore in `storage`.
///
/// Returns the node map if the snapshot contains one.
pub fn read_hexastore(
    storage: StorageManager,
    config: IndexConfiguration,
    reader: impl Read,
) -> StorageResult<(Hexastore, Option<NodeMap>)> {
    let mut reader = SnapshotReader { inner: reader };

    let mut tag = reader.read_u8()?;
    let node_map = if tag == NODE_MAP_TAG {
        let node_map = reader.read_node_map()?;
        tag = reader.read_u8()?;
        Some(node_map)
    } else {
        None
    };
    expect_tag(tag, HEXASTORE_TAG)?;

    let mut hexastore = Hexastore::new(storage, config)?;
    for order in IndexOrder::ALL {
        let count = if order == IndexOrder::SPO {
            reader.read_index(order, |triple| {
                if hexastore.add_triple(triple)? {
                    Ok(())
                } else {
                    Err(corrupted(format!("The triple {triple} is stored twice.")))
                }
            })?
        } else {
            reader.read_index(order, |triple| {
                if hexastore.contains(&triple) {
                    Ok(())
                } else {
                    Err(corrupted(format!(
                        "The {order} index holds {triple}, the SPO index does not."
                    )))
                }
            })?
        };
        if count != hexastore.len() {
            return Err(corrupted(format!(
                "The {order} index holds {count} triples, the SPO index holds {}.",
                hexastore.len()
            )));
        }
    }

    if reader.inner.read(&mut [0])? != 0 {
        return Err(corrupted("Unexpected data after the hexastore record."));
    }
    tracing::info!(
        triples = hexastore.len(),
        nodes = node_map.as_ref().map(NodeMap::len),
        "Read hexastore snapshot"
    );
    Ok((hexastore, node_map))
}

fn corrupted(message: impl Into<String>) -> StorageError {
    CorruptionError::msg(message).into()
}

fn expect_tag(found: u8, expected: u8) -> StorageResult<()> {
    if found == expected {
        Ok(())
    } else {
        Err(corrupted(format!(
            "Expected a '{}' record, found tag {found:#04x}.",
            char::from(expected)
        )))
    }
}

fn position_byte(position: TriplePosition) -> u8 {
    match position {
        TriplePosition::Subject => b'S',
        TriplePosition::Predicate => b'P',
        TriplePosition::Object => b'O',
    }
}

fn position_from_byte(byte: u8) -> Option<TriplePosition> {
    match byte {
        b'S' => Some(TriplePosition::Subject),
        b'P' => Some(TriplePosition::Predicate),
        b'O' => Some(TriplePosition::Object),
        _ => None,
    }
}

struct SnapshotWriter<W: Write> {
    inner: W,
}

impl<W: Write> SnapshotWriter<W> {
    fn write_u8(&mut self, value: u8) -> StorageResult<()> {
        self.inner.write_all(&[value])?;
        Ok(())
    }

    fn write_u64(&mut self, value: u64) -> StorageResult<()> {
        self.inner.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    fn write_i64(&mut self, value: i64) -> StorageResult<()> {
        self.inner.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    fn write_string(&mut self, value: &str) -> StorageResult<()> {
        self.write_u64(value.len() as u64)?;
        self.inner.write_all(value.as_bytes())?;
        Ok(())
    }

    fn write_node_map(&mut self, node_map: &NodeMap) -> StorageResult<()> {
        self.write_u8(NODE_MAP_TAG)?;
        self.write_u64(node_map.len() as u64)?;
        self.write_i64(node_map.next_id())?;
        for (id, node) in node_map.iter() {
            self.write_i64(id.as_i64())?;
            self.write_node(node)?;
        }
        Ok(())
    }

    fn write_node(&mut self, node: &Node) -> StorageResult<()> {
        self.write_u8(NODE_TAG)?;
        self.write_u8(node.kind().as_byte())?;
        self.write_string(node.value())?;
        if let Some(annotation) = node.annotation() {
            self.write_string(annotation)?;
        }
        Ok(())
    }

    fn write_index(&mut self, hexastore: &Hexastore, order: IndexOrder) -> StorageResult<()> {
        let storage = hexastore.storage();
        let head = hexastore.index_for(order).head();

        self.write_u8(INDEX_TAG)?;
        for position in order.inner() {
            self.write_u8(position_byte(*position))?;
        }
        self.write_u64(head.len(storage))?;
        self.write_u64(head.triples_count(storage))?;
        for (key, vector) in head.iter(storage) {
            self.write_i64(key)?;
            self.write_u8(VECTOR_TAG)?;
            self.write_u64(vector.len(storage))?;
            self.write_u64(vector.triples_count(storage))?;
            for (key, terminal) in vector.iter(storage) {
                self.write_i64(key)?;
                self.write_u8(TERMINAL_TAG)?;
                self.write_u64(terminal.len(storage))?;
                for node in terminal.iter(storage) {
                    self.write_i64(node)?;
                }
            }
        }
        Ok(())
    }
}

struct SnapshotReader<R: Read> {
    inner: R,
}

impl<R: Read> SnapshotReader<R> {
    fn read_array<const N: usize>(&mut self) -> StorageResult<[u8; N]> {
        let mut buffer = [0; N];
        self.inner.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    fn read_u8(&mut self) -> StorageResult<u8> {
        let [value] = self.read_array::<1>()?;
        Ok(value)
    }

    fn read_u64(&mut self) -> StorageResult<u64> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    fn read_i64(&mut self) -> StorageResult<i64> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    fn read_string(&mut self) -> StorageResult<String> {
        let len = self.read_u64()?;
        let mut bytes = Vec::new();
        let read = (&mut self.inner).take(len).read_to_end(&mut bytes)?;
        if read as u64 != len {
            return Err(corrupted(format!(
                "Expected a string of {len} bytes, found only {read} bytes."
            )));
        }
        String::from_utf8(bytes).map_err(|error| CorruptionError::new(error).into())
    }

    fn read_node_map(&mut self) -> StorageResult<NodeMap> {
        let count = self.read_u64()?;
        let next_id = self.read_i64()?;
        let mut entries = Vec::new();
        for _ in 0..count {
            let id = NodeId::new(self.read_i64()?);
            entries.push((id, self.read_node()?));
        }
        NodeMap::from_entries(next_id, entries).map_err(|error| CorruptionError::new(error).into())
    }

    fn read_node(&mut self) -> StorageResult<Node> {
        expect_tag(self.read_u8()?, NODE_TAG)?;
        let kind_byte = self.read_u8()?;
        let kind = NodeKind::from_byte(kind_byte)
            .ok_or_else(|| corrupted(format!("Unknown node kind {kind_byte:#04x}.")))?;
        let value = self.read_string()?;
        let annotation = match kind {
            NodeKind::LangLiteral | NodeKind::DatatypeLiteral => Some(self.read_string()?),
            _ => None,
        };
        Node::from_parts(kind, value, annotation)
            .ok_or_else(|| corrupted(format!("Invalid node of kind {kind_byte:#04x}.")))
    }

    /// Reads a node id that must be a term and greater than `previous`.
    fn read_key(&mut self, previous: &mut Option<i64>, order: IndexOrder) -> StorageResult<i64> {
        let key = self.read_i64()?;
        if key <= 0 || previous.is_some_and(|previous| previous >= key) {
            return Err(corrupted(format!(
                "The {order} index holds the key {key} after {previous:?}."
            )));
        }
        *previous = Some(key);
        Ok(key)
    }

    fn read_count(&mut self, order: IndexOrder, what: &str) -> StorageResult<u64> {
        let count = self.read_u64()?;
        if count == 0 {
            return Err(corrupted(format!("The {order} index holds an empty {what}.")));
        }
        Ok(count)
    }

    /// Reads an index record, passing every triple to `on_triple`. Returns the number of triples.
    fn read_index(
        &mut self,
        order: IndexOrder,
        mut on_triple: impl FnMut(Triple) -> StorageResult<()>,
    ) -> StorageResult<u64> {
        expect_tag(self.read_u8()?, INDEX_TAG)?;
        let positions = self.read_array::<3>()?;
        let found = positions
            .map(position_from_byte)
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .and_then(|positions| IndexOrder::try_new(positions.try_into().ok()?).ok());
        if found != Some(order) {
            return Err(corrupted(format!(
                "Expected the {order} index, found {:?}.",
                String::from_utf8_lossy(&positions)
            )));
        }

        let head_len = self.read_u64()?;
        let head_triples = self.read_u64()?;
        let mut total = 0;
        let mut previous_a = None;
        for _ in 0..head_len {
            let a = self.read_key(&mut previous_a, order)?;
            expect_tag(self.read_u8()?, VECTOR_TAG)?;
            let vector_len = self.read_count(order, "vector")?;
            let vector_triples = self.read_u64()?;

            let mut vector_total = 0;
            let mut previous_b = None;
            for _ in 0..vector_len {
                let b = self.read_key(&mut previous_b, order)?;
                expect_tag(self.read_u8()?, TERMINAL_TAG)?;
                let terminal_len = self.read_count(order, "terminal")?;

                let mut previous_c = None;
                for _ in 0..terminal_len {
                    let c = self.read_key(&mut previous_c, order)?;
                    on_triple(order.unpermute([a, b, c]))?;
                }
                vector_total += terminal_len;
            }

            if vector_total != vector_triples {
                return Err(corrupted(format!(
                    "The {order} vector of {a} claims {vector_triples} triples but holds {vector_total}."
                )));
            }
            total += vector_total;
        }

        if total != head_triples {
            return Err(corrupted(format!(
                "The {order} index claims {head_triples} triples but holds {total}."
            )));
        }
        Ok(total)
    }
}
