//! The six-way triple index.
//!
//! A triple index stores all triples nested in one [IndexOrder]. For example, the
//! [IndexOrder::POS] index maps each predicate to the objects it is used with, and each of those
//! to the subjects. A pattern with a bound predicate and object can therefore be answered with two
//! lookups, followed by a scan of the subjects.
//!
//! The [TripleIndexIterator] walks one index, constrained by one [PositionMask] per triple
//! position.

mod error;
mod iterator;
mod mask;
mod order;
mod triple_index;

pub use error::*;
pub use iterator::TripleIndexIterator;
pub use mask::PositionMask;
pub use order::IndexOrder;
pub(crate) use triple_index::TripleIndex;
