//! The query engine of the hexastore.
//!
//! Results are streams of [VariableBindings](bindings::VariableBindings) produced by
//! [BindingsIterator](bindings::BindingsIterator)s. A [PatternIterator](bindings::PatternIterator)
//! reads the matches of a single triple pattern from a [Hexastore](hexastore_storage::Hexastore),
//! and a [MergeJoinIterator](bindings::MergeJoinIterator) joins two sorted streams. The [bgp]
//! module plans and evaluates conjunctions of patterns with these building blocks.

pub mod bgp;
pub mod bindings;
mod error;

pub use error::QueryError;
