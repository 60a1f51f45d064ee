//! The data model shared by all hexastore crates.
//!
//! The core of the hexastore only ever handles [NodeId]s. RDF terms are interned into ids by a
//! [NodeMap] at the edge of the system (loading, printing results).

mod error;
mod node;
mod node_id;
mod node_map;
mod triple;

pub use error::*;
pub use node::{Node, NodeKind};
pub use node_id::NodeId;
pub use node_map::NodeMap;
pub use triple::{Triple, TriplePosition};

// Re-export the oxrdf types that appear in our public API.
pub use oxrdf::{BlankNode, Literal, NamedNode, Subject, Term};
