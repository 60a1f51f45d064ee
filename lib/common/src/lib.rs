pub mod error;

pub use error::{CorruptionError, StorageError};

pub type StorageResult<T> = Result<T, StorageError>;
