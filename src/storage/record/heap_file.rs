//! `RmFileHandle` (spec §4.2): file header, free-list maintenance, and
//! the record CRUD operations layered on the buffer pool.

use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use log::debug;

use crate::{
    error::{SmallError, SmallResult},
    storage::{
        buffer_pool::BufferPool,
        disk_manager::DiskManager,
        page_id::{Fd, PageId, Rid, RM_NO_PAGE},
        record::heap_page::{records_per_page, DataPage, FileHeader},
    },
    transaction::{LockManager, Transaction},
};

pub struct HeapFile {
    pub fd: Fd,
    pub table_name: String,
    disk: Arc<DiskManager>,
    buffer_pool: Arc<BufferPool>,
    lock_manager: Arc<LockManager>,
    header: Mutex<FileHeader>,
    page_size: usize,
}

impl HeapFile {
    /// Creates a brand-new heap file on disk: a file header page and
    /// one empty data page.
    pub fn create<P: AsRef<Path>>(
        path: P,
        table_name: &str,
        record_size: usize,
        disk: Arc<DiskManager>,
        buffer_pool: Arc<BufferPool>,
        lock_manager: Arc<LockManager>,
        page_size: usize,
    ) -> SmallResult<Self> {
        let fd = disk.open_file(path)?;
        let capacity = records_per_page(page_size, record_size);
        if capacity == 0 {
            return Err(SmallError::internal(
                "record too large to fit any slot in a page",
            ));
        }

        let (hdr_pid, _) = buffer_pool.new_page(fd)?;
        debug_assert_eq!(hdr_pid.page_no, 0);
        let header = FileHeader::new(record_size as u32, capacity as u32);
        buffer_pool.write_page(hdr_pid, &header.to_bytes(page_size))?;
        buffer_pool.unpin_page(hdr_pid, true)?;

        let (data_pid, _) = buffer_pool.new_page(fd)?;
        debug_assert_eq!(data_pid.page_no, 1);
        let page = DataPage::new_empty(1, record_size, capacity);
        buffer_pool.write_page(data_pid, &page.to_bytes(page_size))?;
        buffer_pool.unpin_page(data_pid, true)?;

        Ok(Self {
            fd,
            table_name: table_name.to_string(),
            disk,
            buffer_pool,
            lock_manager,
            header: Mutex::new(header),
            page_size,
        })
    }

    pub fn open<P: AsRef<Path>>(
        path: P,
        table_name: &str,
        disk: Arc<DiskManager>,
        buffer_pool: Arc<BufferPool>,
        lock_manager: Arc<LockManager>,
        page_size: usize,
    ) -> SmallResult<Self> {
        let fd = disk.open_file(path)?;
        let bytes = buffer_pool.fetch_page(PageId::new(fd, 0))?;
        buffer_pool.unpin_page(PageId::new(fd, 0), false)?;
        let header = FileHeader::from_bytes(&bytes);
        Ok(Self {
            fd,
            table_name: table_name.to_string(),
            disk,
            buffer_pool,
            lock_manager,
            header: Mutex::new(header),
            page_size,
        })
    }

    pub fn record_size(&self) -> usize {
        self.header.lock().unwrap().record_size as usize
    }

    pub fn capacity_per_page(&self) -> usize {
        self.header.lock().unwrap().records_per_page as usize
    }

    pub fn num_pages(&self) -> u32 {
        self.header.lock().unwrap().num_pages
    }

    pub(crate) fn fetch_data_page(&self, page_no: u32) -> SmallResult<DataPage> {
        let record_size = self.record_size();
        let capacity = self.capacity_per_page();
        let pid = PageId::new(self.fd, page_no);
        let bytes = self.buffer_pool.fetch_page(pid)?;
        Ok(DataPage::from_bytes(page_no, &bytes, record_size, capacity))
    }

    fn write_data_page(&self, page: &DataPage) -> SmallResult<()> {
        let pid = PageId::new(self.fd, page.page_no);
        self.buffer_pool
            .write_page(pid, &page.to_bytes(self.page_size))?;
        self.buffer_pool.unpin_page(pid, true)
    }

    pub(crate) fn release_data_page(&self, page_no: u32) -> SmallResult<()> {
        self.buffer_pool
            .unpin_page(PageId::new(self.fd, page_no), false)
    }

    /// Stamps the buffer pool frame holding `page_no` with the LSN of
    /// the log record whose effect it now reflects, arming the
    /// WAL-before-flush gate for that frame.
    pub fn set_page_lsn(&self, page_no: u32, lsn: i64) {
        self.buffer_pool
            .set_page_lsn(PageId::new(self.fd, page_no), lsn);
    }

    fn flush_header(&self) -> SmallResult<()> {
        let header = *self.header.lock().unwrap();
        let pid = PageId::new(self.fd, 0);
        self.buffer_pool.write_page(pid, &header.to_bytes(self.page_size))
    }

    pub fn get_record(&self, rid: Rid, txn: Option<&mut Transaction>) -> SmallResult<Vec<u8>> {
        if let Some(txn) = txn {
            self.lock_manager.lock_shared_on_record(txn, rid, self.fd)?;
        }
        let page = self.fetch_data_page(rid.page_no)?;
        if !page.is_occupied(rid.slot_no as usize) {
            self.release_data_page(rid.page_no)?;
            return Err(SmallError::RecordNotFound(rid));
        }
        let bytes = page.slot_bytes(rid.slot_no as usize).to_vec();
        self.release_data_page(rid.page_no)?;
        Ok(bytes)
    }

    /// Picks the first page on the free list (allocating one if the
    /// list is empty), inserts at the first unset bit, and maintains
    /// the free-list chain (spec §4.2 "Free-list discipline").
    pub fn insert_record(
        &self,
        bytes: &[u8],
        txn: Option<&mut Transaction>,
    ) -> SmallResult<Rid> {
        let page_no = {
            let header = self.header.lock().unwrap();
            header.first_free_page_no
        };
        let page_no = if page_no == RM_NO_PAGE {
            self.allocate_data_page()?
        } else {
            page_no
        };

        let mut page = self.fetch_data_page(page_no)?;
        let slot_no = page
            .first_free_slot()
            .ok_or_else(|| SmallError::internal("free-list page reported free but has no slot"))?;
        let rid = Rid::new(page_no, slot_no as u32);

        if let Some(txn) = txn {
            self.lock_manager.lock_exclusive_on_record(txn, rid, self.fd)?;
        }

        page.set_slot(slot_no, bytes);
        let became_full = page.is_full();
        self.write_data_page(&page)?;

        if became_full {
            let mut header = self.header.lock().unwrap();
            header.first_free_page_no = page.next_free_page_no;
            drop(header);
            self.flush_header()?;
        }
        debug!("heap_file[{}]: inserted at {:?}", self.table_name, rid);
        Ok(rid)
    }

    /// Recovery/redo-only: overwrites the slot at an explicit rid,
    /// marking it used without touching free-list bookkeeping beyond
    /// that (spec §4.2).
    pub fn insert_record_at(&self, rid: Rid, bytes: &[u8]) -> SmallResult<()> {
        let mut page = self.fetch_data_page(rid.page_no)?;
        page.set_slot(rid.slot_no as usize, bytes);
        self.write_data_page(&page)
    }

    pub fn delete_record(&self, rid: Rid, txn: Option<&mut Transaction>) -> SmallResult<()> {
        if let Some(txn) = txn {
            self.lock_manager.lock_exclusive_on_record(txn, rid, self.fd)?;
        }
        let mut page = self.fetch_data_page(rid.page_no)?;
        if !page.is_occupied(rid.slot_no as usize) {
            self.release_data_page(rid.page_no)?;
            return Err(SmallError::RecordNotFound(rid));
        }
        let was_full = page.is_full();
        page.clear_slot(rid.slot_no as usize);
        if was_full {
            let mut header = self.header.lock().unwrap();
            page.next_free_page_no = header.first_free_page_no;
            header.first_free_page_no = rid.page_no;
            drop(header);
        }
        self.write_data_page(&page)?;
        if was_full {
            self.flush_header()?;
        }
        Ok(())
    }

    pub fn update_record(
        &self,
        rid: Rid,
        bytes: &[u8],
        txn: Option<&mut Transaction>,
    ) -> SmallResult<()> {
        if let Some(txn) = txn {
            self.lock_manager.lock_exclusive_on_record(txn, rid, self.fd)?;
        }
        let mut page = self.fetch_data_page(rid.page_no)?;
        if !page.is_occupied(rid.slot_no as usize) {
            self.release_data_page(rid.page_no)?;
            return Err(SmallError::RecordNotFound(rid));
        }
        page.set_slot(rid.slot_no as usize, bytes);
        // set_slot only increments num_records for previously-unset
        // bits; re-setting an occupied slot leaves the count alone.
        self.write_data_page(&page)
    }

    fn allocate_data_page(&self) -> SmallResult<u32> {
        let record_size = self.record_size();
        let capacity = self.capacity_per_page();
        let (pid, _) = self.buffer_pool.new_page(self.fd)?;
        let page = DataPage::new_empty(pid.page_no, record_size, capacity);
        self.buffer_pool
            .write_page(pid, &page.to_bytes(self.page_size))?;
        self.buffer_pool.unpin_page(pid, true)?;

        let mut header = self.header.lock().unwrap();
        header.num_pages += 1;
        header.first_free_page_no = pid.page_no;
        drop(header);
        self.flush_header()?;
        Ok(pid.page_no)
    }
}
