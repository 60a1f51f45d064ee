use crate::NodeId;
use std::fmt::{Display, Formatter};

/// Represents what part of an RDF triple is meant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TriplePosition {
    /// The subject
    Subject,
    /// The predicate
    Predicate,
    /// The object
    Object,
}

impl TriplePosition {
    /// All positions in SPO order.
    pub const ALL: [TriplePosition; 3] = [
        TriplePosition::Subject,
        TriplePosition::Predicate,
        TriplePosition::Object,
    ];

    /// Returns the index of the position in an SPO triple.
    pub const fn spo_index(self) -> usize {
        match self {
            TriplePosition::Subject => 0,
            TriplePosition::Predicate => 1,
            TriplePosition::Object => 2,
        }
    }

    /// Returns the position for an index into an SPO triple.
    pub fn from_spo_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl Display for TriplePosition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TriplePosition::Subject => f.write_str("S"),
            TriplePosition::Predicate => f.write_str("P"),
            TriplePosition::Object => f.write_str("O"),
        }
    }
}

/// An ordered (subject, predicate, object) tuple of [NodeId]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Triple {
    /// The subject.
    pub subject: NodeId,
    /// The predicate.
    pub predicate: NodeId,
    /// The object.
    pub object: NodeId,
}

impl Triple {
    /// Creates a new [Triple].
    pub const fn new(subject: NodeId, predicate: NodeId, object: NodeId) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }

    /// Creates a triple from raw ids. Mostly useful in tests.
    pub const fn from_raw(subject: i64, predicate: i64, object: i64) -> Self {
        Self::new(NodeId::new(subject), NodeId::new(predicate), NodeId::new(object))
    }

    /// Returns the node at `position`.
    pub const fn get(&self, position: TriplePosition) -> NodeId {
        match position {
            TriplePosition::Subject => self.subject,
            TriplePosition::Predicate => self.predicate,
            TriplePosition::Object => self.object,
        }
    }

    /// Returns the triple as an SPO array.
    pub const fn to_array(self) -> [NodeId; 3] {
        [self.subject, self.predicate, self.object]
    }

    /// Creates a triple from an SPO array.
    pub const fn from_array(nodes: [NodeId; 3]) -> Self {
        Self::new(nodes[0], nodes[1], nodes[2])
    }

    /// Returns `true` if all three positions hold concrete terms.
    pub const fn is_ground(&self) -> bool {
        self.subject.is_term() && self.predicate.is_term() && self.object.is_term()
    }
}

impl Display for Triple {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.subject, self.predicate, self.object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triple_position_access() {
        let triple = Triple::from_raw(1, 2, 3);
        assert_eq!(triple.get(TriplePosition::Subject), NodeId::new(1));
        assert_eq!(triple.get(TriplePosition::Predicate), NodeId::new(2));
        assert_eq!(triple.get(TriplePosition::Object), NodeId::new(3));
        assert_eq!(Triple::from_array(triple.to_array()), triple);
    }

    #[test]
    fn ground_triples_have_no_variables() {
        assert!(Triple::from_raw(1, 2, 3).is_ground());
        assert!(!Triple::from_raw(1, -2, 3).is_ground());
        assert!(!Triple::from_raw(1, 2, 0).is_ground());
    }
}
