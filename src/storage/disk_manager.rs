//! L0 raw page I/O: per-file monotonic page allocator on top of
//! `SmallFile`.
//!
//! Every heap file, index file and the WAL each get their own fd.
//! Page 0 of a heap/index file is reserved for that file's own header
//! (heap file layout / B+tree node layout) — `DiskManager` itself only
//! deals in raw, opaque pages; it does not interpret page 0.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc, RwLock,
    },
};

use crate::{
    error::SmallResult,
    io::SmallFile,
    storage::page_id::{Fd, PageId},
};

struct OpenFile {
    path: PathBuf,
    file: Arc<SmallFile>,
    num_pages: AtomicU32,
}

pub struct DiskManager {
    page_size: usize,
    next_fd: AtomicU32,
    files: RwLock<HashMap<Fd, OpenFile>>,
}

impl DiskManager {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            next_fd: AtomicU32::new(1),
            files: RwLock::new(HashMap::new()),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Opens (creating if absent) the file at `path` and assigns it a
    /// fresh fd. The number of existing pages is derived from the
    /// file's current length, so reopening a database recovers the
    /// allocator's high-water mark for free.
    pub fn open_file<P: AsRef<Path>>(&self, path: P) -> SmallResult<Fd> {
        let path = path.as_ref().to_path_buf();
        let file = SmallFile::open(&path)?;
        let len = file.len()?;
        let num_pages = (len / self.page_size as u64) as u32;

        let fd = self.next_fd.fetch_add(1, Ordering::SeqCst);
        self.files.write().unwrap().insert(
            fd,
            OpenFile {
                path,
                file: Arc::new(file),
                num_pages: AtomicU32::new(num_pages),
            },
        );
        Ok(fd)
    }

    pub fn close_file(&self, fd: Fd) {
        self.files.write().unwrap().remove(&fd);
    }

    pub fn path_of(&self, fd: Fd) -> Option<PathBuf> {
        self.files.read().unwrap().get(&fd).map(|f| f.path.clone())
    }

    pub fn num_pages(&self, fd: Fd) -> u32 {
        self.with_file(fd, |f| f.num_pages.load(Ordering::SeqCst))
    }

    /// Allocates the next page number for `fd` and zero-extends the
    /// underlying file so later reads never short-read. Does not
    /// consult any free list — that bookkeeping lives in the record
    /// manager / B+tree layers (spec §3).
    pub fn allocate_page(&self, fd: Fd) -> SmallResult<PageId> {
        let page_no = self.with_file(fd, |f| f.num_pages.fetch_add(1, Ordering::SeqCst));
        let pid = PageId::new(fd, page_no);
        self.write_page(pid, &vec![0u8; self.page_size])?;
        Ok(pid)
    }

    pub fn read_page(&self, pid: PageId, buf: &mut [u8]) -> SmallResult<()> {
        debug_assert_eq!(buf.len(), self.page_size);
        let file = self.with_file(pid.fd, |f| f.file.clone());
        file.read_at(pid.page_no as u64 * self.page_size as u64, buf)
    }

    pub fn write_page(&self, pid: PageId, buf: &[u8]) -> SmallResult<()> {
        debug_assert_eq!(buf.len(), self.page_size);
        let file = self.with_file(pid.fd, |f| f.file.clone());
        file.write_at(pid.page_no as u64 * self.page_size as u64, buf)
    }

    pub fn sync(&self, fd: Fd) -> SmallResult<()> {
        self.with_file(fd, |f| f.file.clone()).sync()
    }

    fn with_file<T>(&self, fd: Fd, f: impl FnOnce(&OpenFile) -> T) -> T {
        let files = self.files.read().unwrap();
        let entry = files
            .get(&fd)
            .unwrap_or_else(|| panic!("disk manager: unknown fd {}", fd));
        f(entry)
    }
}
