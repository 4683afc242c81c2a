//! Page-granularity strict two-phase locking.

use std::collections::{HashMap, HashSet};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::debug_log;
use crate::errors::StorageError;
use crate::page::HeapPageId;
use crate::transaction::{Permissions, TransactionId};

#[derive(Debug, Default)]
struct PageLock {
    readers: HashSet<TransactionId>,
    writer: Option<TransactionId>,
}

#[derive(Debug, Default)]
struct LockTables {
    page_locks: HashMap<HeapPageId, PageLock>,
    shared_held: HashMap<TransactionId, HashSet<HeapPageId>>,
    exclusive_held: HashMap<TransactionId, HashSet<HeapPageId>>,
}

/// Grants shared/exclusive page locks with upgrade and downgrade. Waiters
/// retry a bounded number of times with a short sleep; when the budget runs
/// out the acquire fails with `TransactionAborted` instead of deadlocking.
pub struct LockManager {
    tables: Mutex<LockTables>,
    cvar: Condvar,
    retries: u32,
    retry_wait: Duration,
}

impl LockManager {
    pub fn new(retries: u32, retry_wait: Duration) -> Self {
        LockManager {
            tables: Mutex::new(LockTables::default()),
            cvar: Condvar::new(),
            retries,
            retry_wait,
        }
    }

    /// Acquires `pid` for `tid` in the requested mode, blocking while other
    /// transactions hold conflicting locks. Fails `TransactionAborted` once
    /// the retry budget is exhausted; the caller must then abort.
    pub fn acquire(
        &self,
        tid: TransactionId,
        pid: HeapPageId,
        perm: Permissions,
    ) -> Result<(), StorageError> {
        let mut tables = self.tables.lock().unwrap();
        let mut attempts = 0u32;
        loop {
            if Self::try_acquire(&mut tables, tid, pid, perm) {
                // a downgrade may unblock writers-turned-readers' peers
                self.cvar.notify_all();
                return Ok(());
            }
            if attempts >= self.retries {
                debug_log!(
                    "[LockManager::acquire] {:?} gives up on {:?} after {} tries",
                    tid,
                    pid,
                    attempts
                );
                return Err(StorageError::TransactionAborted);
            }
            attempts += 1;
            let (guard, _timed_out) = self.cvar.wait_timeout(tables, self.retry_wait).unwrap();
            tables = guard;
        }
    }

    fn try_acquire(
        tables: &mut LockTables,
        tid: TransactionId,
        pid: HeapPageId,
        perm: Permissions,
    ) -> bool {
        let entry = tables.page_locks.entry(pid).or_default();
        match perm {
            Permissions::ReadOnly => {
                if entry.writer == Some(tid) {
                    // downgrade: drop the writer slot, keep reading
                    entry.writer = None;
                    entry.readers.insert(tid);
                    if let Some(held) = tables.exclusive_held.get_mut(&tid) {
                        held.remove(&pid);
                    }
                    tables.shared_held.entry(tid).or_default().insert(pid);
                    return true;
                }
                if entry.writer.is_some() {
                    return false;
                }
                entry.readers.insert(tid);
                tables.shared_held.entry(tid).or_default().insert(pid);
                true
            }
            Permissions::ReadWrite => {
                if entry.writer == Some(tid) {
                    return true;
                }
                let other_holder = entry.writer.is_some()
                    || entry.readers.iter().any(|reader| *reader != tid);
                if other_holder {
                    return false;
                }
                // upgrade: surrender our reader slot, if any
                if entry.readers.remove(&tid) {
                    if let Some(held) = tables.shared_held.get_mut(&tid) {
                        held.remove(&pid);
                    }
                }
                entry.writer = Some(tid);
                tables.exclusive_held.entry(tid).or_default().insert(pid);
                true
            }
        }
    }

    /// Drops one lock. Risky outside transaction completion; exposed for
    /// callers that know a page was only probed, never read.
    pub fn release(&self, tid: TransactionId, pid: HeapPageId) {
        let mut tables = self.tables.lock().unwrap();
        let mut now_free = false;
        if let Some(entry) = tables.page_locks.get_mut(&pid) {
            entry.readers.remove(&tid);
            if entry.writer == Some(tid) {
                entry.writer = None;
            }
            now_free = entry.readers.is_empty() && entry.writer.is_none();
        }
        if now_free {
            tables.page_locks.remove(&pid);
        }
        if let Some(held) = tables.shared_held.get_mut(&tid) {
            held.remove(&pid);
        }
        if let Some(held) = tables.exclusive_held.get_mut(&tid) {
            held.remove(&pid);
        }
        self.cvar.notify_all();
    }

    /// Releases every lock `tid` holds and forgets the transaction.
    pub fn release_all(&self, tid: TransactionId) {
        let mut tables = self.tables.lock().unwrap();
        let shared = tables.shared_held.remove(&tid).unwrap_or_default();
        let exclusive = tables.exclusive_held.remove(&tid).unwrap_or_default();
        for pid in shared.iter().chain(exclusive.iter()) {
            let mut now_free = false;
            if let Some(entry) = tables.page_locks.get_mut(pid) {
                entry.readers.remove(&tid);
                if entry.writer == Some(tid) {
                    entry.writer = None;
                }
                now_free = entry.readers.is_empty() && entry.writer.is_none();
            }
            if now_free {
                tables.page_locks.remove(pid);
            }
        }
        debug_log!("[LockManager::release_all] {:?}", tid);
        self.cvar.notify_all();
    }

    pub fn holds_lock(&self, tid: TransactionId, pid: HeapPageId) -> bool {
        let tables = self.tables.lock().unwrap();
        tables
            .page_locks
            .get(&pid)
            .is_some_and(|entry| entry.readers.contains(&tid) || entry.writer == Some(tid))
    }

    /// The pages `tid` currently holds exclusively.
    pub fn exclusive_pages(&self, tid: TransactionId) -> Vec<HeapPageId> {
        let tables = self.tables.lock().unwrap();
        tables
            .exclusive_held
            .get(&tid)
            .map(|held| held.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Every page `tid` holds, shared or exclusive.
    pub fn held_pages(&self, tid: TransactionId) -> Vec<HeapPageId> {
        let tables = self.tables.lock().unwrap();
        let mut pages: Vec<HeapPageId> = tables
            .shared_held
            .get(&tid)
            .into_iter()
            .flatten()
            .chain(tables.exclusive_held.get(&tid).into_iter().flatten())
            .copied()
            .collect();
        pages.dedup();
        pages
    }
}
