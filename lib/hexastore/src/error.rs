use hexastore_common::StorageError;
use hexastore_engine::QueryError;
use hexastore_model::NodeConversionError;
use oxttl::TurtleParseError;
use spargebra::SparqlSyntaxError;
use std::io;

/// An error raised by a [`Store`](crate::store::Store).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    /// An error from the underlying storage.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// An error while planning or evaluating a query.
    #[error(transparent)]
    Query(#[from] QueryError),
    /// An error while parsing an N-Triples file.
    #[error(transparent)]
    Parse(#[from] TurtleParseError),
    /// An error while parsing a SPARQL query.
    #[error(transparent)]
    Syntax(#[from] SparqlSyntaxError),
    /// A term cannot be stored (e.g., a quoted triple).
    #[error(transparent)]
    InvalidTerm(#[from] NodeConversionError),
    /// An error while reading or writing a file.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// The query uses a feature that is not supported.
    #[error("{0}")]
    UnsupportedQuery(String),
}

impl From<StoreError> for io::Error {
    #[inline]
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Storage(error) => error.into(),
            StoreError::Io(error) => error,
            StoreError::Parse(error) => error.into(),
            other => Self::new(io::ErrorKind::InvalidInput, other.to_string()),
        }
    }
}
