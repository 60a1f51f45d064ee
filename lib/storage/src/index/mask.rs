use crate::index::IndexOrder;
use hexastore_model::{NodeId, TriplePosition};

/// Restricts the values of one triple position when iterating over an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PositionMask {
    /// The position must hold the given node.
    Bound(NodeId),
    /// The position may hold any node.
    Wildcard,
    /// The position must hold the same node as the other position. Used for patterns that
    /// repeat a variable, such as `?x <p> ?x`.
    SameAs(TriplePosition),
}

impl PositionMask {
    /// Creates the masks of a pattern given in SPO order.
    ///
    /// Terms become [PositionMask::Bound] and the wildcard becomes [PositionMask::Wildcard]. The
    /// first occurrence of a variable is a [PositionMask::Wildcard] while every further occurrence
    /// of the same variable refers back to it.
    pub fn from_pattern(pattern: [NodeId; 3]) -> [PositionMask; 3] {
        let mut masks = [PositionMask::Wildcard; 3];
        for (index, node) in pattern.iter().enumerate() {
            masks[index] = if node.is_term() {
                PositionMask::Bound(*node)
            } else if node.is_variable() {
                pattern[..index]
                    .iter()
                    .position(|other| other == node)
                    .and_then(TriplePosition::from_spo_index)
                    .map_or(PositionMask::Wildcard, PositionMask::SameAs)
            } else {
                PositionMask::Wildcard
            };
        }
        masks
    }

    pub fn is_bound(&self) -> bool {
        matches!(self, PositionMask::Bound(_))
    }
}

/// A [PositionMask] translated to the nesting levels of one index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LevelMask {
    Bound(i64),
    Free,
    /// Must equal the key at the given (outer) level.
    SameAs(usize),
}

/// Either the bound node or the position that carries the value of a chain of
/// [PositionMask::SameAs].
#[derive(Clone, Copy, PartialEq, Eq)]
enum Resolved {
    Bound(i64),
    Variable(TriplePosition),
}

fn resolve(masks: &[PositionMask; 3], position: TriplePosition) -> Resolved {
    let mut current = position;
    for _ in 0..masks.len() {
        match masks[current.spo_index()] {
            PositionMask::Bound(node) => {
                assert!(node.is_term(), "The bound node {node} is not a term.");
                return Resolved::Bound(node.as_i64());
            }
            PositionMask::Wildcard => return Resolved::Variable(current),
            PositionMask::SameAs(other) => current = other,
        }
    }
    panic!("The masks {masks:?} refer to each other in a cycle.")
}

/// Translates masks in SPO order to the levels of an index with the given `order`.
///
/// The outermost level of a group of positions that must be equal iterates freely and the other
/// levels of the group refer to it. This way, the constraint is re-evaluated whenever the outer
/// level advances.
pub(crate) fn level_masks(order: IndexOrder, masks: &[PositionMask; 3]) -> [LevelMask; 3] {
    let resolved = [0, 1, 2].map(|level| resolve(masks, order.position(level)));
    let mut result = [LevelMask::Free; 3];
    for (level, mask) in result.iter_mut().enumerate() {
        *mask = match resolved[level] {
            Resolved::Bound(node) => LevelMask::Bound(node),
            Resolved::Variable(_) => resolved[..level]
                .iter()
                .position(|outer| *outer == resolved[level])
                .map_or(LevelMask::Free, LevelMask::SameAs),
        };
    }
    result
}
