use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Duplicate triple position given.")]
pub struct IndexOrderCreationError;
