use crate::InvalidNodeIdError;
use std::fmt::{Display, Formatter};

/// An opaque identifier for an interned RDF term or a query variable.
///
/// - Positive values denote concrete terms handed out by a [NodeMap](crate::NodeMap).
/// - Negative values denote query variables. The magnitude only distinguishes variables from each
///   other and carries no order semantics.
/// - Zero is the wildcard ("no value"). It is never stored in an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct NodeId(i64);

impl NodeId {
    /// The wildcard id. Matches anything in a pattern and is never stored.
    pub const WILDCARD: NodeId = NodeId(0);

    /// Creates a new [NodeId] from its raw value without any checks.
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Creates the id of a concrete RDF term.
    ///
    /// Returns an error if `value` is not positive.
    pub fn try_term(value: i64) -> Result<Self, InvalidNodeIdError> {
        if value > 0 {
            Ok(Self(value))
        } else {
            Err(InvalidNodeIdError(value))
        }
    }

    /// Creates the id of the variable in `slot` (1-based).
    pub const fn variable(slot: u32) -> Self {
        Self(-(slot as i64))
    }

    /// Returns the raw value.
    pub const fn as_i64(self) -> i64 {
        self.0
    }

    /// Returns `true` if this id refers to an interned RDF term.
    pub const fn is_term(self) -> bool {
        self.0 > 0
    }

    /// Returns `true` if this id is a query variable.
    pub const fn is_variable(self) -> bool {
        self.0 < 0
    }

    /// Returns `true` if this id is the wildcard.
    pub const fn is_wildcard(self) -> bool {
        self.0 == 0
    }
}

impl From<i64> for NodeId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<NodeId> for i64 {
    fn from(value: NodeId) -> Self {
        value.0
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
