use hexastore_common::StorageError;

/// An error raised while planning or evaluating a basic graph pattern.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum QueryError {
    /// An error from the underlying storage.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// The patterns fall apart into groups that share no variables.
    #[error(
        "The basic graph pattern consists of {components} components that share no variables. \
         Enable cartesian products to evaluate it anyway."
    )]
    CartesianProduct {
        /// The number of disconnected components.
        components: usize,
    },
    /// A variable is referenced that the pattern or the iterator does not know.
    #[error("The variable {0} is unknown.")]
    UnknownVariable(String),
}
