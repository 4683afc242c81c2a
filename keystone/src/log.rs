//! The update log the buffer pool writes through on page flush.
//!
//! Only the hook is implemented here: appending update records with the
//! page's before and after images, commit/abort markers, and forcing the
//! log to disk ahead of any data write. Replay and checkpointing belong to
//! a recovery component and are out of scope.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};

use crate::debug_log;
use crate::errors::StorageError;
use crate::page::HeapPageId;
use crate::transaction::TransactionId;

/// A Log Sequence Number: the byte offset of a record in the log file.
pub type Lsn = u64;

/// One record in the update log.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum LogRecord {
    /// A page changed: both images are whole-page byte arrays.
    Update {
        tid: TransactionId,
        pid: HeapPageId,
        before: Vec<u8>,
        after: Vec<u8>,
    },
    /// The transaction committed.
    Commit { tid: TransactionId },
    /// The transaction aborted.
    Abort { tid: TransactionId },
}

const FRAME_HEADER_LEN: usize = 8; // total_len: u32 + crc: u32

struct LogInner {
    file: File,
    next_lsn: Lsn,
}

/// An append-only record log with checksummed frames.
pub struct LogFile {
    inner: Mutex<LogInner>,
    path: PathBuf,
}

impl LogFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path_buf = path.as_ref().to_path_buf();
        if let Some(parent) = path_buf.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path_buf)?;
        let next_lsn = file.metadata()?.len();
        Ok(LogFile {
            inner: Mutex::new(LogInner { file, next_lsn }),
            path: path_buf,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, record: &LogRecord) -> Result<Lsn, StorageError> {
        let payload = bincode::serialize(record)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let mut hasher = Hasher::new();
        hasher.update(&payload);
        let crc = hasher.finalize();
        let total_len = (FRAME_HEADER_LEN + payload.len()) as u32;

        let mut inner = self.inner.lock().unwrap();
        let lsn = inner.next_lsn;
        inner.file.seek(SeekFrom::Start(lsn))?;
        inner.file.write_all(&total_len.to_le_bytes())?;
        inner.file.write_all(&crc.to_le_bytes())?;
        inner.file.write_all(&payload)?;
        inner.next_lsn += total_len as Lsn;
        debug_log!("[LogFile::append] lsn={} len={}", lsn, total_len);
        Ok(lsn)
    }

    /// Appends an update record for a page about to be flushed. Must be
    /// called while the page is still dirty, before the data write.
    pub fn log_write(
        &self,
        tid: TransactionId,
        pid: HeapPageId,
        before: &[u8],
        after: &[u8],
    ) -> Result<Lsn, StorageError> {
        self.append(&LogRecord::Update {
            tid,
            pid,
            before: before.to_vec(),
            after: after.to_vec(),
        })
    }

    pub fn log_commit(&self, tid: TransactionId) -> Result<Lsn, StorageError> {
        self.append(&LogRecord::Commit { tid })
    }

    pub fn log_abort(&self, tid: TransactionId) -> Result<Lsn, StorageError> {
        self.append(&LogRecord::Abort { tid })
    }

    /// Makes every appended record durable.
    pub fn force(&self) -> Result<(), StorageError> {
        let inner = self.inner.lock().unwrap();
        inner.file.sync_all()?;
        Ok(())
    }

    /// Re-reads the log from the start, verifying checksums. Parsing stops
    /// at the first torn or corrupt frame.
    pub fn records(&self) -> Result<Vec<LogRecord>, StorageError> {
        let mut inner = self.inner.lock().unwrap();
        let end = inner.next_lsn;
        inner.file.seek(SeekFrom::Start(0))?;
        let mut raw = Vec::with_capacity(end as usize);
        std::io::Read::by_ref(&mut inner.file).take(end).read_to_end(&mut raw)?;
        drop(inner);

        let mut records = Vec::new();
        let mut offset = 0usize;
        while offset + FRAME_HEADER_LEN <= raw.len() {
            let total_len =
                u32::from_le_bytes(raw[offset..offset + 4].try_into().unwrap_or([0; 4])) as usize;
            let crc = u32::from_le_bytes(
                raw[offset + 4..offset + 8].try_into().unwrap_or([0; 4]),
            );
            if total_len < FRAME_HEADER_LEN || offset + total_len > raw.len() {
                break;
            }
            let payload = &raw[offset + FRAME_HEADER_LEN..offset + total_len];
            let mut hasher = Hasher::new();
            hasher.update(payload);
            if hasher.finalize() != crc {
                break;
            }
            match bincode::deserialize::<LogRecord>(payload) {
                Ok(record) => records.push(record),
                Err(_) => break,
            }
            offset += total_len;
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn appended_records_read_back_in_order() {
        let dir = tempdir().unwrap();
        let log = LogFile::open(dir.path().join("wal.log")).unwrap();
        let tid = TransactionId::new();
        let pid = HeapPageId::new(3, 1);

        log.log_write(tid, pid, &[0u8; 8], &[1u8; 8]).unwrap();
        log.log_commit(tid).unwrap();
        log.force().unwrap();

        let records = log.records().unwrap();
        assert_eq!(records.len(), 2);
        match &records[0] {
            LogRecord::Update {
                tid: t,
                pid: p,
                before,
                after,
            } => {
                assert_eq!(*t, tid);
                assert_eq!(*p, pid);
                assert_eq!(before, &vec![0u8; 8]);
                assert_eq!(after, &vec![1u8; 8]);
            }
            other => panic!("expected update record, got {:?}", other),
        }
        assert_eq!(records[1], LogRecord::Commit { tid });
    }

    #[test]
    fn log_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");
        let tid = TransactionId::new();
        {
            let log = LogFile::open(&path).unwrap();
            log.log_abort(tid).unwrap();
            log.force().unwrap();
        }
        let log = LogFile::open(&path).unwrap();
        assert_eq!(log.records().unwrap(), vec![LogRecord::Abort { tid }]);
        // appends continue past the existing tail
        log.log_commit(tid).unwrap();
        assert_eq!(log.records().unwrap().len(), 2);
    }

    #[test]
    fn corrupt_tail_is_ignored() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");
        let tid = TransactionId::new();
        {
            let log = LogFile::open(&path).unwrap();
            log.log_commit(tid).unwrap();
            log.force().unwrap();
        }
        // tack garbage onto the end
        let mut f = OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(&[0xde, 0xad, 0xbe, 0xef, 1, 2, 3]).unwrap();
        drop(f);

        let log = LogFile::open(&path).unwrap();
        assert_eq!(log.records().unwrap(), vec![LogRecord::Commit { tid }]);
    }
}
