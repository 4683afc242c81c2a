//! # Keystone Storage Engine
//! A page-oriented heap store with a transactional buffer pool.
//! This crate is responsible for the on-disk and in-memory representation of
//! tables: typed fields and tuples, slotted heap pages, heap files, the
//! catalog, page-level locking, and the commit/abort protocol.

/// The buffer pool: bounded page cache plus transaction completion.
pub mod buffer_pool;
/// The registry of tables and the schema text loader.
pub mod catalog;
/// The process-wide handle tying catalog, buffer pool and log together.
pub mod database;
/// Error taxonomy for the storage layer.
pub mod errors;
/// Primitive value kinds and typed field values.
pub mod field;
/// Heap files: fixed-size pages on disk.
pub mod heap_file;
/// The page-level lock manager for concurrency control.
pub mod lock_manager;
/// The update log hook invoked on page flush.
pub mod log;
/// The slotted heap page layout.
pub mod page;
/// Transaction identifiers and page access permissions.
pub mod transaction;
/// Tuples and their schemas.
pub mod tuple;

/// The default size of a single page in bytes.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// The default number of pages the buffer pool may cache.
pub const DEFAULT_POOL_CAPACITY: usize = 50;

/// The fixed serialized width of a string field's payload in bytes.
pub const STRING_LEN: usize = 128;

pub use buffer_pool::BufferPool;
pub use catalog::Catalog;
pub use database::{Database, DatabaseOptions};
pub use errors::StorageError;
pub use field::{Field, Op, Type};
pub use heap_file::{HeapFile, HeapFileIterator};
pub use lock_manager::LockManager;
pub use log::{LogFile, LogRecord};
pub use page::{HeapPage, HeapPageId};
pub use transaction::{Permissions, TransactionId};
pub use tuple::{RecordId, Tuple, TupleDesc};

/// Debug tracing for the storage engine. Compiles to nothing unless the
/// `trace-log` feature is enabled.
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {{
        #[cfg(feature = "trace-log")]
        println!($($arg)*);
    }};
}
