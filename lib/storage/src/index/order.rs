use crate::index::IndexOrderCreationError;
use hexastore_model::{Triple, TriplePosition};
use std::collections::HashSet;
use std::fmt::{Display, Formatter};

/// The order in which an index nests the positions of a triple.
///
/// For example, [IndexOrder::POS] maps predicates to objects to subjects. The first position of
/// the order is stored in the head, the second in the vectors, and the third in the terminals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexOrder([TriplePosition; 3]);

impl IndexOrder {
    /// An SPO index.
    pub const SPO: IndexOrder = IndexOrder([
        TriplePosition::Subject,
        TriplePosition::Predicate,
        TriplePosition::Object,
    ]);

    /// An SOP index.
    pub const SOP: IndexOrder = IndexOrder([
        TriplePosition::Subject,
        TriplePosition::Object,
        TriplePosition::Predicate,
    ]);

    /// A PSO index.
    pub const PSO: IndexOrder = IndexOrder([
        TriplePosition::Predicate,
        TriplePosition::Subject,
        TriplePosition::Object,
    ]);

    /// A POS index.
    pub const POS: IndexOrder = IndexOrder([
        TriplePosition::Predicate,
        TriplePosition::Object,
        TriplePosition::Subject,
    ]);

    /// An OSP index.
    pub const OSP: IndexOrder = IndexOrder([
        TriplePosition::Object,
        TriplePosition::Subject,
        TriplePosition::Predicate,
    ]);

    /// An OPS index.
    pub const OPS: IndexOrder = IndexOrder([
        TriplePosition::Object,
        TriplePosition::Predicate,
        TriplePosition::Subject,
    ]);

    /// All six orders. This is also the order in which indexes are preferred if more than one
    /// index can answer a pattern equally well, and the order of the index records of a snapshot.
    pub const ALL: [IndexOrder; 6] = [
        IndexOrder::SPO,
        IndexOrder::SOP,
        IndexOrder::PSO,
        IndexOrder::POS,
        IndexOrder::OSP,
        IndexOrder::OPS,
    ];

    /// Tries to create a new [IndexOrder].
    ///
    /// Returns an error if a [TriplePosition] appears more than once.
    pub fn try_new(positions: [TriplePosition; 3]) -> Result<Self, IndexOrderCreationError> {
        let distinct = positions.iter().collect::<HashSet<_>>();
        if distinct.len() != positions.len() {
            return Err(IndexOrderCreationError);
        }

        Ok(IndexOrder(positions))
    }

    /// Returns a reference to the inner array.
    pub fn inner(&self) -> &[TriplePosition; 3] {
        &self.0
    }

    /// The position stored at the given nesting `level`.
    pub fn position(self, level: usize) -> TriplePosition {
        self.0[level]
    }

    /// The nesting level at which `position` is stored.
    pub fn level_of(self, position: TriplePosition) -> usize {
        self.0
            .iter()
            .position(|candidate| *candidate == position)
            .unwrap_or_else(|| panic!("The order {self} does not contain {position}."))
    }

    /// The order that shares its terminals with this one. It swaps the first two positions, so
    /// both orders have the same position in their terminals (e.g., SPO and PSO).
    pub fn dual(self) -> IndexOrder {
        let [first, second, third] = self.0;
        IndexOrder([second, first, third])
    }

    /// Arranges the nodes of `triple` in this order.
    pub fn permute(self, triple: &Triple) -> [i64; 3] {
        self.0.map(|position| triple.get(position).as_i64())
    }

    /// Reverts [Self::permute].
    pub fn unpermute(self, keys: [i64; 3]) -> Triple {
        let mut spo = [0; 3];
        for (level, key) in keys.into_iter().enumerate() {
            spo[self.0[level].spo_index()] = key;
        }
        Triple::from_raw(spo[0], spo[1], spo[2])
    }
}

impl Display for IndexOrder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for position in &self.0 {
            write!(f, "{position}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_order_accepts_unique_positions() {
        let ok = IndexOrder::try_new([
            TriplePosition::Object,
            TriplePosition::Subject,
            TriplePosition::Predicate,
        ]);
        assert_eq!(ok, Ok(IndexOrder::OSP));
    }

    #[test]
    fn index_order_rejects_duplicate_positions() {
        let err = IndexOrder::try_new([
            TriplePosition::Subject,
            TriplePosition::Subject,
            TriplePosition::Object,
        ]);
        assert!(err.is_err());
    }

    #[test]
    fn duals_share_the_terminal_position() {
        assert_eq!(IndexOrder::SPO.dual(), IndexOrder::PSO);
        assert_eq!(IndexOrder::SOP.dual(), IndexOrder::OSP);
        assert_eq!(IndexOrder::POS.dual(), IndexOrder::OPS);
        for order in IndexOrder::ALL {
            assert_eq!(order.dual().dual(), order);
        }
    }

    #[test]
    fn permute_and_unpermute() {
        let triple = Triple::from_raw(1, 2, 3);
        assert_eq!(IndexOrder::POS.permute(&triple), [2, 3, 1]);
        assert_eq!(IndexOrder::POS.unpermute([2, 3, 1]), triple);
        assert_eq!(IndexOrder::OPS.level_of(TriplePosition::Subject), 2);
        assert_eq!(IndexOrder::OPS.to_string(), "OPS");
    }
}
