#![doc(test(attr(deny(warnings))))]

//! The storage engine of the hexastore.
//!
//! ```text
//!  Hexastore ── six TripleIndex (SPO, SOP, PSO, POS, OSP, OPS)
//!                 └─ Head ──► Vector ──► Terminal      (shared by SPO/PSO, SOP/OSP, POS/OPS)
//!                      └── sorted arrays or B+-trees in blocks of a StorageManager
//! ```
//!
//! The [Hexastore] is the entry point. It keeps all six indexes in lockstep and chooses the index
//! that answers a pattern with the fewest scans. Snapshots are written and read with
//! [write_hexastore] and [read_hexastore].

mod block;
mod config;
mod hexastore;
mod index;
mod manager;
mod persistence;
mod structures;

pub use config::*;
pub use hexastore::{Hexastore, IndexView};
pub use hexastore_common::{CorruptionError, StorageError, StorageResult};
pub use index::{IndexOrder, IndexOrderCreationError, PositionMask, TripleIndexIterator};
pub use manager::{BlockId, RemapListener, StorageManager};
pub use persistence::{read_hexastore, write_hexastore};
