//! L0 buffer pool: fixed-capacity frame cache with LRU replacement,
//! pin-count discipline and the WAL-before-flush gate.
//!
//! One pool is shared by the heap-file and B+tree layers alike: frames
//! hold raw page bytes keyed by `PageID`, and callers parse/serialize
//! their own typed page views around
//! `fetch_page`/`write_page`/`unpin_page`.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use log::{debug, warn};

use crate::{
    error::{SmallError, SmallResult},
    recovery::log_manager::LogManager,
    storage::{disk_manager::DiskManager, page_id::PageId},
};

struct Frame {
    data: Vec<u8>,
    pin_count: u32,
    dirty: bool,
    /// LSN of the last log record whose effect this frame reflects
    /// (spec glossary "Page LSN"). Consulted by `flush_page`.
    page_lsn: i64,
}

struct Inner {
    page_table: HashMap<PageId, usize>,
    frames: Vec<Option<(PageId, Frame)>>,
    free_slots: Vec<usize>,
    /// Most-recently-used at the back; `fetch_page`/`new_page` move
    /// their slot to the back, eviction scans from the front.
    lru: VecDeque<usize>,
}

pub struct BufferPool {
    capacity: usize,
    page_size: usize,
    disk: Arc<DiskManager>,
    log_manager: Mutex<Option<Arc<LogManager>>>,
    inner: Mutex<Inner>,
}

impl BufferPool {
    pub fn new(disk: Arc<DiskManager>, capacity: usize, page_size: usize) -> Self {
        Self {
            capacity,
            page_size,
            disk,
            log_manager: Mutex::new(None),
            inner: Mutex::new(Inner {
                page_table: HashMap::new(),
                frames: Vec::new(),
                free_slots: Vec::new(),
                lru: VecDeque::new(),
            }),
        }
    }

    /// The log manager is constructed after the buffer pool (it needs
    /// its own WAL file), so it is wired in once both exist.
    pub fn set_log_manager(&self, log_manager: Arc<LogManager>) {
        *self.log_manager.lock().unwrap() = Some(log_manager);
    }

    /// Returns a pinned copy of the page's bytes, reading from disk on
    /// a miss. Callers must `unpin_page` exactly once per `fetch_page`/
    /// `new_page` call.
    pub fn fetch_page(&self, pid: PageId) -> SmallResult<Vec<u8>> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(&slot) = inner.page_table.get(&pid) {
            touch(&mut inner.lru, slot);
            let (_, frame) = inner.frames[slot].as_mut().unwrap();
            frame.pin_count += 1;
            return Ok(frame.data.clone());
        }

        let slot = self.acquire_slot(&mut inner)?;
        let mut data = vec![0u8; self.page_size];
        self.disk.read_page(pid, &mut data)?;
        inner.page_table.insert(pid, slot);
        inner.frames[slot] = Some((
            pid,
            Frame {
                data: data.clone(),
                pin_count: 1,
                dirty: false,
                page_lsn: -1,
            },
        ));
        inner.lru.push_back(slot);
        Ok(data)
    }

    /// Allocates a new page on disk via the `DiskManager` and installs
    /// it pinned, pre-zeroed.
    pub fn new_page(&self, fd: crate::storage::page_id::Fd) -> SmallResult<(PageId, Vec<u8>)> {
        let pid = self.disk.allocate_page(fd)?;
        let mut inner = self.inner.lock().unwrap();
        let slot = self.acquire_slot(&mut inner)?;
        let data = vec![0u8; self.page_size];
        inner.page_table.insert(pid, slot);
        inner.frames[slot] = Some((
            pid,
            Frame {
                data: data.clone(),
                pin_count: 1,
                dirty: false,
                page_lsn: -1,
            },
        ));
        inner.lru.push_back(slot);
        Ok((pid, data))
    }

    /// Overwrites a resident frame's bytes and marks it dirty. The
    /// page must currently be pinned by the caller.
    pub fn write_page(&self, pid: PageId, data: &[u8]) -> SmallResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let slot = *inner
            .page_table
            .get(&pid)
            .ok_or_else(|| SmallError::internal("write_page on non-resident page"))?;
        let (_, frame) = inner.frames[slot].as_mut().unwrap();
        frame.data = data.to_vec();
        frame.dirty = true;
        Ok(())
    }

    pub fn set_page_lsn(&self, pid: PageId, lsn: i64) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(&slot) = inner.page_table.get(&pid) {
            let (_, frame) = inner.frames[slot].as_mut().unwrap();
            frame.page_lsn = lsn;
        }
    }

    pub fn unpin_page(&self, pid: PageId, dirty: bool) -> SmallResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let slot = *inner
            .page_table
            .get(&pid)
            .ok_or_else(|| SmallError::internal("unpin_page on non-resident page"))?;
        let (_, frame) = inner.frames[slot].as_mut().unwrap();
        if frame.pin_count == 0 {
            return Err(SmallError::internal("unpin_page: pin count already 0"));
        }
        frame.pin_count -= 1;
        frame.dirty |= dirty;
        Ok(())
    }

    /// Forced write-back, gated on the WAL rule (spec §4.1, §4.6 MUST):
    /// the frame's `page_lsn` must already be durable in the log before
    /// its bytes reach disk.
    pub fn flush_page(&self, pid: PageId) -> SmallResult<()> {
        let (data, page_lsn, dirty) = {
            let inner = self.inner.lock().unwrap();
            match inner.page_table.get(&pid) {
                None => return Ok(()),
                Some(&slot) => {
                    let (_, frame) = inner.frames[slot].as_ref().unwrap();
                    (frame.data.clone(), frame.page_lsn, frame.dirty)
                }
            }
        };
        if !dirty {
            return Ok(());
        }
        if let Some(log_manager) = self.log_manager.lock().unwrap().as_ref() {
            if log_manager.persist_lsn() < page_lsn {
                debug!(
                    "flush_page({:?}): page_lsn {} not yet durable, forcing log flush",
                    pid, page_lsn
                );
                log_manager.flush_log_to_disk()?;
            }
        }
        self.disk.write_page(pid, &data)?;
        let mut inner = self.inner.lock().unwrap();
        if let Some(&slot) = inner.page_table.get(&pid) {
            inner.frames[slot].as_mut().unwrap().1.dirty = false;
        }
        Ok(())
    }

    pub fn flush_all_pages(&self) -> SmallResult<()> {
        let pids: Vec<PageId> = {
            let inner = self.inner.lock().unwrap();
            inner.page_table.keys().copied().collect()
        };
        for pid in pids {
            self.flush_page(pid)?;
        }
        Ok(())
    }

    /// Evicts the page if resident (without flushing — callers that
    /// need the contents persisted must `flush_page` first) and frees
    /// its frame slot.
    pub fn delete_page(&self, pid: PageId) -> SmallResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(slot) = inner.page_table.remove(&pid) {
            inner.frames[slot] = None;
            inner.lru.retain(|&s| s != slot);
            inner.free_slots.push(slot);
        }
        Ok(())
    }

    fn acquire_slot(&self, inner: &mut Inner) -> SmallResult<usize> {
        if inner.frames.len() < self.capacity {
            let slot = inner.frames.len();
            inner.frames.push(None);
            return Ok(slot);
        }
        if let Some(slot) = inner.free_slots.pop() {
            return Ok(slot);
        }

        let victim_pos = inner
            .lru
            .iter()
            .position(|&slot| inner.frames[slot].as_ref().unwrap().1.pin_count == 0);
        let pos = victim_pos.ok_or_else(|| {
            warn!("buffer pool exhausted: every frame is pinned");
            SmallError::internal("buffer pool full: no unpinned frame to evict")
        })?;
        let slot = inner.lru.remove(pos).unwrap();
        let (pid, frame) = inner.frames[slot].take().unwrap();
        inner.page_table.remove(&pid);
        if frame.dirty {
            if let Some(log_manager) = self.log_manager.lock().unwrap().as_ref() {
                if log_manager.persist_lsn() < frame.page_lsn {
                    log_manager.flush_log_to_disk()?;
                }
            }
            self.disk.write_page(pid, &frame.data)?;
        }
        Ok(slot)
    }
}

fn touch(lru: &mut VecDeque<usize>, slot: usize) {
    if let Some(pos) = lru.iter().position(|&s| s == slot) {
        lru.remove(pos);
    }
    lru.push_back(slot);
}
