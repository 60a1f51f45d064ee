use thiserror::Error;

/// Returned when an RDF term cannot be represented as a hexastore [Node](crate::Node).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum NodeConversionError {
    /// RDF-star quoted triples are not part of the flat triple model.
    #[error("Quoted triples cannot be stored in a hexastore.")]
    QuotedTriple,
    /// The node cannot be used in the requested triple position.
    #[error("The node {0} cannot be used as {1}.")]
    InvalidPosition(String, &'static str),
}

/// Returned when a raw value is not a valid [NodeId](crate::NodeId) for the requested use.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("{0} is not a valid node id for an RDF term (must be positive).")]
pub struct InvalidNodeIdError(pub i64);

/// Returned when persisted node map entries are inconsistent.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum NodeMapError {
    #[error("The next id {0} of a node map must be positive.")]
    InvalidNextId(i64),
    #[error("The node id {0} is out of range (next id is {1}).")]
    IdOutOfRange(i64, i64),
    #[error("The node id {0} is used more than once.")]
    DuplicateId(i64),
    #[error("The node {0} is mapped to more than one id.")]
    DuplicateNode(String),
}
