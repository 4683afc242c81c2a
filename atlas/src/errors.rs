use keystone::StorageError;
use thiserror::Error;

/// Everything that can go wrong while executing an operator tree.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("column not found: {0}")]
    ColumnNotFound(String),

    /// The operator was used before `open` or after `close`.
    #[error("operator is not open")]
    ClosedOperator,

    /// `next` was called past the end of the stream.
    #[error("no more tuples")]
    NoSuchTuple,

    #[error("unsupported: {0}")]
    Unsupported(String),
}
