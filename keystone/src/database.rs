use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::buffer_pool::BufferPool;
use crate::catalog::Catalog;
use crate::errors::StorageError;
use crate::heap_file::HeapFile;
use crate::lock_manager::LockManager;
use crate::log::LogFile;
use crate::page::{HeapPage, HeapPageId};
use crate::transaction::{Permissions, TransactionId};
use crate::tuple::{Tuple, TupleDesc};
use crate::{DEFAULT_PAGE_SIZE, DEFAULT_POOL_CAPACITY};

/// Tunables for one database instance. Page size is per-instance rather
/// than process-wide so tests can shrink it.
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    pub page_size: usize,
    pub pool_capacity: usize,
    pub lock_retries: u32,
    pub lock_retry_wait: Duration,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        DatabaseOptions {
            page_size: DEFAULT_PAGE_SIZE,
            pool_capacity: DEFAULT_POOL_CAPACITY,
            lock_retries: 10,
            lock_retry_wait: Duration::from_millis(10),
        }
    }
}

/// The process-wide collaborators, held together and passed explicitly:
/// the catalog, the buffer pool and the update log.
pub struct Database {
    dir: PathBuf,
    options: DatabaseOptions,
    catalog: Catalog,
    buffer_pool: BufferPool,
    log: LogFile,
}

impl Database {
    /// Opens a database rooted at `dir`, creating the directory and the
    /// update log (`<dir>/wal.log`) as needed.
    pub fn open<P: AsRef<Path>>(dir: P, options: DatabaseOptions) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        let log = LogFile::open(dir.join("wal.log"))?;
        let lock_manager = LockManager::new(options.lock_retries, options.lock_retry_wait);
        let buffer_pool = BufferPool::new(options.pool_capacity, lock_manager);
        Ok(Database {
            dir,
            options,
            catalog: Catalog::new(),
            buffer_pool,
            log,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn page_size(&self) -> usize {
        self.options.page_size
    }

    pub fn options(&self) -> &DatabaseOptions {
        &self.options
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn buffer_pool(&self) -> &BufferPool {
        &self.buffer_pool
    }

    pub fn log(&self) -> &LogFile {
        &self.log
    }

    /// Opens `<dir>/<name>.dat` with the given schema and registers it.
    /// Returns the new table's id.
    pub fn create_table(
        &self,
        name: &str,
        td: TupleDesc,
        primary_key: &str,
    ) -> Result<u32, StorageError> {
        let file = Arc::new(HeapFile::open(
            self.dir.join(format!("{}.dat", name)),
            td,
            self.options.page_size,
        )?);
        let id = file.id();
        self.catalog.add_table(file, name, primary_key);
        Ok(id)
    }

    /// Loads a schema text file (see `Catalog::load_schema`), placing table
    /// data next to the schema file.
    pub fn load_schema<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> Result<Vec<(u32, String)>, StorageError> {
        self.catalog.load_schema(path, self.options.page_size)
    }

    pub fn get_page(
        &self,
        tid: TransactionId,
        pid: HeapPageId,
        perm: Permissions,
    ) -> Result<Arc<RwLock<HeapPage>>, StorageError> {
        self.buffer_pool.get_page(&self.catalog, tid, pid, perm)
    }

    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        table_id: u32,
        t: Tuple,
    ) -> Result<(), StorageError> {
        self.buffer_pool.insert_tuple(self, tid, table_id, t)
    }

    pub fn delete_tuple(&self, tid: TransactionId, t: &Tuple) -> Result<(), StorageError> {
        self.buffer_pool.delete_tuple(self, tid, t)
    }

    /// Commits (`true`) or aborts (`false`) a transaction and releases its
    /// locks.
    pub fn transaction_complete(
        &self,
        tid: TransactionId,
        commit: bool,
    ) -> Result<(), StorageError> {
        self.buffer_pool.transaction_complete(self, tid, commit)
    }

    pub fn flush_page(&self, pid: HeapPageId) -> Result<(), StorageError> {
        self.buffer_pool.flush_page(&self.catalog, &self.log, pid)
    }

    pub fn flush_all_pages(&self) -> Result<(), StorageError> {
        self.buffer_pool.flush_all_pages(&self.catalog, &self.log)
    }

    pub fn flush_pages(&self, tid: TransactionId) -> Result<(), StorageError> {
        self.buffer_pool.flush_pages(&self.catalog, &self.log, tid)
    }

    pub fn remove_page(&self, pid: HeapPageId) {
        self.buffer_pool.remove_page(pid);
    }

    pub fn holds_lock(&self, tid: TransactionId, pid: HeapPageId) -> bool {
        self.buffer_pool.lock_manager().holds_lock(tid, pid)
    }
}
