use std::io;
use thiserror::Error;

/// Everything that can go wrong inside the storage engine.
#[derive(Error, Debug)]
pub enum StorageError {
    /// A tuple's descriptor does not match the page or table it is bound for.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A tuple, table or field was looked up and is not there.
    #[error("not found: {0}")]
    NotFound(String),

    /// The page has no unused slot left. Recoverable: try the next page.
    #[error("page is full")]
    PageFull,

    /// A write was attempted more than one page past the end of the file.
    #[error("bad page number {0}")]
    BadPageNumber(usize),

    /// Lock acquisition gave up after the configured retries. The caller
    /// must abort via `transaction_complete(tid, false)`.
    #[error("transaction aborted waiting for a page lock")]
    TransactionAborted,

    /// Every cached page is dirty; under NO-STEAL none may be evicted.
    #[error("buffer pool is full and all pages are dirty")]
    CacheFull,

    /// The operation is not defined for the given types.
    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}
