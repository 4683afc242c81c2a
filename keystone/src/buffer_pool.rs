//! The buffer pool: a bounded cache of heap pages, gated by the lock
//! manager. NO-STEAL / FORCE: dirty pages are never evicted, and a
//! transaction's dirty pages are all written out when it commits, so abort
//! only has to throw cached images away.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::catalog::Catalog;
use crate::database::Database;
use crate::debug_log;
use crate::errors::StorageError;
use crate::lock_manager::LockManager;
use crate::log::LogFile;
use crate::page::{HeapPage, HeapPageId};
use crate::transaction::{Permissions, TransactionId};
use crate::tuple::Tuple;

/// Caches up to `capacity` pages and mediates every page access.
pub struct BufferPool {
    capacity: usize,
    cache: Mutex<HashMap<HeapPageId, Arc<RwLock<HeapPage>>>>,
    lock_manager: LockManager,
}

impl BufferPool {
    pub fn new(capacity: usize, lock_manager: LockManager) -> Self {
        BufferPool {
            capacity,
            cache: Mutex::new(HashMap::new()),
            lock_manager,
        }
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.lock_manager
    }

    /// How many pages are currently cached.
    pub fn cached_pages(&self) -> usize {
        self.cache.lock().unwrap().len()
    }

    /// Fetches a page under the requested permission. Blocks while another
    /// transaction holds a conflicting lock and gives up with
    /// `TransactionAborted` after the configured retries; the caller must
    /// then abort the transaction. Reads the page from disk on a cache
    /// miss, evicting a clean page first when the cache is full.
    pub fn get_page(
        &self,
        catalog: &Catalog,
        tid: TransactionId,
        pid: HeapPageId,
        perm: Permissions,
    ) -> Result<Arc<RwLock<HeapPage>>, StorageError> {
        self.lock_manager.acquire(tid, pid, perm)?;

        let mut cache = self.cache.lock().unwrap();
        if let Some(page) = cache.get(&pid) {
            debug_log!("[BufferPool::get_page] hit {:?}", pid);
            return Ok(page.clone());
        }
        if cache.len() >= self.capacity {
            Self::evict_page(&mut cache)?;
        }
        debug_log!("[BufferPool::get_page] miss {:?}, reading", pid);
        let file = catalog.file(pid.table_id)?;
        let page = Arc::new(RwLock::new(file.read_page(pid)?));
        cache.insert(pid, page.clone());
        Ok(page)
    }

    /// Evicts the first clean page. Dirty pages are pinned in memory until
    /// their transaction completes (NO-STEAL), so when everything is dirty
    /// the pool is stuck and the caller gets `CacheFull`.
    fn evict_page(
        cache: &mut HashMap<HeapPageId, Arc<RwLock<HeapPage>>>,
    ) -> Result<(), StorageError> {
        let victim = cache
            .iter()
            .find(|(_, page)| page.read().unwrap().dirtier().is_none())
            .map(|(pid, _)| *pid)
            .ok_or(StorageError::CacheFull)?;
        // clean pages need no write-back
        cache.remove(&victim);
        debug_log!("[BufferPool::evict_page] evicted {:?}", victim);
        Ok(())
    }

    /// Adds `t` to the named table, locking every touched page `ReadWrite`
    /// through the table's heap file. Dirtied pages are marked with `tid`
    /// and put (back) into the cache.
    pub fn insert_tuple(
        &self,
        db: &Database,
        tid: TransactionId,
        table_id: u32,
        t: Tuple,
    ) -> Result<(), StorageError> {
        let file = db.catalog().file(table_id)?;
        let mut t = t;
        let dirtied = file.insert_tuple(db, tid, &mut t)?;
        self.admit_dirtied(tid, dirtied);
        Ok(())
    }

    /// Removes `t` from the page its record id names.
    pub fn delete_tuple(
        &self,
        db: &Database,
        tid: TransactionId,
        t: &Tuple,
    ) -> Result<(), StorageError> {
        let rid = t
            .record_id()
            .ok_or_else(|| StorageError::NotFound(format!("tuple [{}] has no record id", t)))?;
        let file = db.catalog().file(rid.pid.table_id)?;
        let dirtied = file.delete_tuple(db, tid, t)?;
        self.admit_dirtied(tid, dirtied);
        Ok(())
    }

    fn admit_dirtied(&self, tid: TransactionId, pages: Vec<Arc<RwLock<HeapPage>>>) {
        for page in pages {
            let pid = {
                let mut guard = page.write().unwrap();
                guard.mark_dirty(Some(tid));
                guard.id()
            };
            self.cache.lock().unwrap().insert(pid, page);
        }
    }

    /// Writes one dirty page out. The update record goes to the log and the
    /// log is forced before the data write; clean pages are a no-op.
    pub fn flush_page(
        &self,
        catalog: &Catalog,
        log: &LogFile,
        pid: HeapPageId,
    ) -> Result<(), StorageError> {
        let cache = self.cache.lock().unwrap();
        let Some(page) = cache.get(&pid).cloned() else {
            return Ok(());
        };
        let mut guard = page.write().unwrap();
        if let Some(dirtier) = guard.dirtier() {
            let after = guard.serialize();
            log.log_write(dirtier, pid, guard.before_image_data(), &after)?;
            log.force()?;
            catalog.file(pid.table_id)?.write_page(&guard)?;
            guard.mark_dirty(None);
            debug_log!("[BufferPool::flush_page] flushed {:?}", pid);
        }
        Ok(())
    }

    /// Flushes every cached dirty page. Breaks NO-STEAL if transactions are
    /// still running; meant for orderly shutdown.
    pub fn flush_all_pages(&self, catalog: &Catalog, log: &LogFile) -> Result<(), StorageError> {
        let pids: Vec<HeapPageId> = self.cache.lock().unwrap().keys().copied().collect();
        for pid in pids {
            self.flush_page(catalog, log, pid)?;
        }
        Ok(())
    }

    /// Flushes the pages dirtied by one transaction.
    pub fn flush_pages(
        &self,
        catalog: &Catalog,
        log: &LogFile,
        tid: TransactionId,
    ) -> Result<(), StorageError> {
        let pids: Vec<HeapPageId> = {
            let cache = self.cache.lock().unwrap();
            cache
                .iter()
                .filter(|(_, page)| page.read().unwrap().dirtier() == Some(tid))
                .map(|(pid, _)| *pid)
                .collect()
        };
        for pid in pids {
            self.flush_page(catalog, log, pid)?;
        }
        Ok(())
    }

    /// Drops a page from the cache without writing it.
    pub fn remove_page(&self, pid: HeapPageId) {
        self.cache.lock().unwrap().remove(&pid);
    }

    /// Finishes a transaction. Commit flushes every page the transaction
    /// dirtied (forcing the log first) and re-snapshots the surviving
    /// images; abort re-reads every touched page from disk, discarding
    /// in-memory changes. All of the transaction's locks are released
    /// either way.
    pub fn transaction_complete(
        &self,
        db: &Database,
        tid: TransactionId,
        commit: bool,
    ) -> Result<(), StorageError> {
        debug_log!(
            "[BufferPool::transaction_complete] {:?} commit={}",
            tid,
            commit
        );
        if commit {
            // flush by dirtier, not by the exclusive set: a dirty page may
            // have been downgraded to a shared hold since it was written
            let dirtied: Vec<HeapPageId> = {
                let cache = self.cache.lock().unwrap();
                cache
                    .iter()
                    .filter(|(_, page)| page.read().unwrap().dirtier() == Some(tid))
                    .map(|(pid, _)| *pid)
                    .collect()
            };
            for pid in dirtied {
                self.flush_page(db.catalog(), db.log(), pid)?;
                let page = { self.cache.lock().unwrap().get(&pid).cloned() };
                if let Some(page) = page {
                    page.write().unwrap().set_before_image();
                }
            }
            db.log().log_commit(tid)?;
        } else {
            // shared holds may have been downgraded from exclusive, so
            // every touched page goes back to its on-disk state
            for pid in self.lock_manager.held_pages(tid) {
                let page = { self.cache.lock().unwrap().get(&pid).cloned() };
                if let Some(page) = page {
                    let fresh = db.catalog().file(pid.table_id)?.read_page(pid)?;
                    *page.write().unwrap() = fresh;
                }
            }
            db.log().log_abort(tid)?;
        }
        db.log().force()?;
        self.lock_manager.release_all(tid);
        Ok(())
    }
}
