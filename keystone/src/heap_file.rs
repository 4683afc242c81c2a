use std::collections::hash_map::DefaultHasher;
use std::fs::{File, OpenOptions};
use std::hash::{Hash, Hasher};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::database::Database;
use crate::debug_log;
use crate::errors::StorageError;
use crate::page::{HeapPage, HeapPageId};
use crate::transaction::{Permissions, TransactionId};
use crate::tuple::{Tuple, TupleDesc};

/// A table's backing store: a file on disk viewed as a 0-indexed array of
/// fixed-size pages. Tuples live in no particular order.
pub struct HeapFile {
    file: Mutex<File>,
    path: PathBuf,
    td: TupleDesc,
    id: u32,
    page_size: usize,
    num_pages: AtomicUsize,
}

impl HeapFile {
    /// Opens (or creates) the backing file. The table id is a stable hash
    /// of the absolute path, so reopening the same file yields the same id.
    pub fn open<P: AsRef<Path>>(
        path: P,
        td: TupleDesc,
        page_size: usize,
    ) -> Result<Self, StorageError> {
        let path_ref = path.as_ref();
        if let Some(parent) = path_ref.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path_ref)?;

        let abs = std::fs::canonicalize(path_ref)?;
        let mut hasher = DefaultHasher::new();
        abs.hash(&mut hasher);
        let id = hasher.finish() as u32;

        let file_len = file.metadata()?.len() as usize;
        let num_pages = file_len.div_ceil(page_size);
        debug_log!(
            "[HeapFile::open] {:?} id={} pages={}",
            abs,
            id,
            num_pages
        );

        Ok(HeapFile {
            file: Mutex::new(file),
            path: abs,
            td,
            id,
            page_size,
            num_pages: AtomicUsize::new(num_pages),
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tuple_desc(&self) -> &TupleDesc {
        &self.td
    }

    /// The number of pages this file spans, counting pages grown in memory
    /// but not yet written.
    pub fn num_pages(&self) -> usize {
        self.num_pages.load(Ordering::SeqCst)
    }

    /// Reads one page image from disk. Reading at or past the current end
    /// of the on-disk file yields a fresh all-zero page; a short read in the
    /// middle of the file is an error.
    pub fn read_page(&self, pid: HeapPageId) -> Result<HeapPage, StorageError> {
        let offset = (pid.page_no * self.page_size) as u64;
        let mut file = self.file.lock().unwrap();
        let disk_len = file.metadata()?.len();

        if offset >= disk_len {
            debug_log!("[HeapFile::read_page] {:?} past EOF, empty image", pid);
            return HeapPage::new(
                pid,
                &HeapPage::empty_page_data(self.page_size),
                self.td.clone(),
                self.page_size,
            );
        }

        let mut buf = vec![0u8; self.page_size];
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut buf)?;
        drop(file);
        debug_log!("[HeapFile::read_page] {:?}", pid);
        HeapPage::new(pid, &buf, self.td.clone(), self.page_size)
    }

    /// Writes one page image at its offset. Writing page `num_pages` grows
    /// the file by one page; anything past that is a `BadPageNumber`.
    pub fn write_page(&self, page: &HeapPage) -> Result<(), StorageError> {
        let page_no = page.id().page_no;
        let known = self.num_pages.load(Ordering::SeqCst);
        if page_no > known {
            return Err(StorageError::BadPageNumber(page_no));
        }
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start((page_no * self.page_size) as u64))?;
        file.write_all(&page.serialize())?;
        file.sync_all()?;
        drop(file);
        if page_no == known {
            self.num_pages.store(known + 1, Ordering::SeqCst);
        }
        debug_log!("[HeapFile::write_page] {:?}", page.id());
        Ok(())
    }

    /// Inserts `t` into the first page with a free slot, trying pages in
    /// order under `ReadWrite`, and growing the file by one page when every
    /// existing page is full. Returns the pages dirtied by the insert.
    pub fn insert_tuple(
        &self,
        db: &Database,
        tid: TransactionId,
        t: &mut Tuple,
    ) -> Result<Vec<Arc<RwLock<HeapPage>>>, StorageError> {
        for page_no in 0..self.num_pages() {
            let pid = HeapPageId::new(self.id, page_no);
            let page = db.get_page(tid, pid, Permissions::ReadWrite)?;
            let inserted = {
                let mut guard = page.write().unwrap();
                match guard.insert_tuple(t) {
                    Ok(_) => true,
                    Err(StorageError::PageFull) => false,
                    Err(e) => return Err(e),
                }
            };
            if inserted {
                return Ok(vec![page]);
            }
        }

        // Every page is full: grow by one.
        let page_no = self.num_pages.fetch_add(1, Ordering::SeqCst);
        let pid = HeapPageId::new(self.id, page_no);
        debug_log!("[HeapFile::insert_tuple] growing {:?}", pid);
        let page = db.get_page(tid, pid, Permissions::ReadWrite)?;
        page.write().unwrap().insert_tuple(t)?;
        Ok(vec![page])
    }

    /// Deletes `t` from the page its record id names, under `ReadWrite`.
    pub fn delete_tuple(
        &self,
        db: &Database,
        tid: TransactionId,
        t: &Tuple,
    ) -> Result<Vec<Arc<RwLock<HeapPage>>>, StorageError> {
        let rid = t
            .record_id()
            .ok_or_else(|| StorageError::NotFound(format!("tuple [{}] has no record id", t)))?;
        let page = db.get_page(tid, rid.pid, Permissions::ReadWrite)?;
        page.write().unwrap().delete_tuple(t)?;
        Ok(vec![page])
    }

    /// A lazy tuple iterator over all pages of this file, requesting each
    /// page with `ReadOnly` and advancing only when a page is exhausted.
    pub fn iter(&self, db: &Arc<Database>, tid: TransactionId) -> HeapFileIterator {
        HeapFileIterator::new(db.clone(), tid, self.id)
    }
}

/// Streams a heap file's tuples page by page.
pub struct HeapFileIterator {
    db: Arc<Database>,
    tid: TransactionId,
    table_id: u32,
    page_no: usize,
    current: Vec<Tuple>,
    pos: usize,
    opened: bool,
}

impl HeapFileIterator {
    pub fn new(db: Arc<Database>, tid: TransactionId, table_id: u32) -> Self {
        HeapFileIterator {
            db,
            tid,
            table_id,
            page_no: 0,
            current: Vec::new(),
            pos: 0,
            opened: false,
        }
    }

    fn load_page(&mut self, page_no: usize) -> Result<(), StorageError> {
        let pid = HeapPageId::new(self.table_id, page_no);
        let page = self.db.get_page(self.tid, pid, Permissions::ReadOnly)?;
        let guard = page.read().unwrap();
        self.current = guard.iter().cloned().collect();
        self.page_no = page_no;
        self.pos = 0;
        Ok(())
    }

    pub fn open(&mut self) -> Result<(), StorageError> {
        self.opened = true;
        self.page_no = 0;
        self.current.clear();
        self.pos = 0;
        let file = self.db.catalog().file(self.table_id)?;
        if file.num_pages() > 0 {
            self.load_page(0)?;
        }
        Ok(())
    }

    pub fn next(&mut self) -> Result<Option<Tuple>, StorageError> {
        if !self.opened {
            return Ok(None);
        }
        loop {
            if self.pos < self.current.len() {
                let t = self.current[self.pos].clone();
                self.pos += 1;
                return Ok(Some(t));
            }
            let file = self.db.catalog().file(self.table_id)?;
            if self.page_no + 1 >= file.num_pages() {
                return Ok(None);
            }
            self.load_page(self.page_no + 1)?;
        }
    }

    pub fn rewind(&mut self) -> Result<(), StorageError> {
        self.open()
    }

    pub fn close(&mut self) {
        self.opened = false;
        self.current.clear();
        self.pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{Field, Type};
    use tempfile::tempdir;

    const PAGE_SIZE: usize = 4096;

    fn two_int_desc() -> TupleDesc {
        TupleDesc::new(vec![
            (Type::Int, "a".to_string()),
            (Type::Int, "b".to_string()),
        ])
    }

    fn pair(td: &TupleDesc, a: i32, b: i32) -> Tuple {
        Tuple::new(td.clone(), vec![Field::Int(a), Field::Int(b)]).unwrap()
    }

    #[test]
    fn fresh_file_has_no_pages() {
        let dir = tempdir().unwrap();
        let hf = HeapFile::open(dir.path().join("t.dat"), two_int_desc(), PAGE_SIZE).unwrap();
        assert_eq!(hf.num_pages(), 0);
    }

    #[test]
    fn id_is_stable_across_opens() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.dat");
        let a = HeapFile::open(&path, two_int_desc(), PAGE_SIZE).unwrap();
        let b = HeapFile::open(&path, two_int_desc(), PAGE_SIZE).unwrap();
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let td = two_int_desc();
        let hf = HeapFile::open(dir.path().join("t.dat"), td.clone(), PAGE_SIZE).unwrap();

        let pid = HeapPageId::new(hf.id(), 0);
        let mut page =
            HeapPage::new(pid, &HeapPage::empty_page_data(PAGE_SIZE), td.clone(), PAGE_SIZE)
                .unwrap();
        page.insert_tuple(&mut pair(&td, 4, 8)).unwrap();
        hf.write_page(&page).unwrap();
        assert_eq!(hf.num_pages(), 1);

        let reread = hf.read_page(pid).unwrap();
        assert_eq!(reread.serialize(), page.serialize());
    }

    #[test]
    fn reading_just_past_end_yields_empty_page() {
        let dir = tempdir().unwrap();
        let hf = HeapFile::open(dir.path().join("t.dat"), two_int_desc(), PAGE_SIZE).unwrap();
        let page = hf.read_page(HeapPageId::new(hf.id(), 0)).unwrap();
        assert_eq!(page.iter().count(), 0);
        assert!(page.serialize().iter().all(|b| *b == 0));
    }

    #[test]
    fn writing_far_past_end_is_rejected() {
        let dir = tempdir().unwrap();
        let td = two_int_desc();
        let hf = HeapFile::open(dir.path().join("t.dat"), td.clone(), PAGE_SIZE).unwrap();
        let page = HeapPage::new(
            HeapPageId::new(hf.id(), 3),
            &HeapPage::empty_page_data(PAGE_SIZE),
            td,
            PAGE_SIZE,
        )
        .unwrap();
        assert!(matches!(
            hf.write_page(&page),
            Err(StorageError::BadPageNumber(3))
        ));
    }

    #[test]
    fn num_pages_counts_partial_trailing_page() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.dat");
        std::fs::write(&path, vec![0u8; PAGE_SIZE + 100]).unwrap();
        let hf = HeapFile::open(&path, two_int_desc(), PAGE_SIZE).unwrap();
        assert_eq!(hf.num_pages(), 2);
    }
}
