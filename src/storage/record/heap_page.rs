//! Slotted heap page layout (spec §3 "Heap file layout").
//!
//! Page 0 of every heap file is the `FileHeader`; every later page is a
//! `DataPage`: {num_records, next_free_page_no} header, an occupancy
//! bitmap (one bit per slot), then the slot array itself.

use bit_vec::BitVec;

use crate::storage::page_id::{Rid, RM_NO_PAGE};

pub const DATA_PAGE_HDR_SIZE: usize = 8;

/// `records_per_page = floor((PAGE_SIZE - page_hdr_size) / (record_size + 1/8 bit))`
/// (spec §3), computed as an exact integer division by scaling both
/// sides by 8 (one bitmap bit per record).
pub fn records_per_page(page_size: usize, record_size: usize) -> usize {
    let usable_bits = (page_size - DATA_PAGE_HDR_SIZE) * 8;
    usable_bits / (record_size * 8 + 1)
}

fn bitmap_bytes(records_per_page: usize) -> usize {
    (records_per_page + 7) / 8
}

/// Page 0 of a heap file.
#[derive(Debug, Clone, Copy)]
pub struct FileHeader {
    pub record_size: u32,
    pub records_per_page: u32,
    pub num_pages: u32,
    pub first_free_page_no: u32,
    pub first_record_page: u32,
}

impl FileHeader {
    pub fn new(record_size: u32, records_per_page: u32) -> Self {
        Self {
            record_size,
            records_per_page,
            num_pages: 1,
            first_free_page_no: RM_NO_PAGE,
            first_record_page: 1,
        }
    }

    pub fn to_bytes(&self, page_size: usize) -> Vec<u8> {
        let mut buf = Vec::with_capacity(page_size);
        buf.extend(self.record_size.to_le_bytes());
        buf.extend(self.records_per_page.to_le_bytes());
        buf.extend(self.num_pages.to_le_bytes());
        buf.extend(self.first_free_page_no.to_le_bytes());
        buf.extend(self.first_record_page.to_le_bytes());
        buf.resize(page_size, 0);
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Self {
        let record_size = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        let records_per_page = u32::from_le_bytes(buf[4..8].try_into().unwrap());
        let num_pages = u32::from_le_bytes(buf[8..12].try_into().unwrap());
        let first_free_page_no = u32::from_le_bytes(buf[12..16].try_into().unwrap());
        let first_record_page = u32::from_le_bytes(buf[16..20].try_into().unwrap());
        Self {
            record_size,
            records_per_page,
            num_pages,
            first_free_page_no,
            first_record_page,
        }
    }
}

/// An in-memory view over one slotted data page's bytes. `DataPage`
/// owns a copy of the bytes (the buffer pool owns the frame); callers
/// re-serialize with `to_bytes` and write back through the pool.
pub struct DataPage {
    pub page_no: u32,
    pub num_records: u32,
    pub next_free_page_no: u32,
    pub bitmap: BitVec,
    pub record_size: usize,
    pub capacity: usize,
    slots: Vec<u8>,
}

impl DataPage {
    pub fn new_empty(page_no: u32, record_size: usize, capacity: usize) -> Self {
        Self {
            page_no,
            num_records: 0,
            next_free_page_no: RM_NO_PAGE,
            bitmap: BitVec::from_elem(capacity, false),
            record_size,
            capacity,
            slots: vec![0u8; record_size * capacity],
        }
    }

    pub fn from_bytes(page_no: u32, buf: &[u8], record_size: usize, capacity: usize) -> Self {
        let num_records = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        let next_free_page_no = u32::from_le_bytes(buf[4..8].try_into().unwrap());
        let bmap_bytes = bitmap_bytes(capacity);
        let bitmap_start = DATA_PAGE_HDR_SIZE;
        let slots_start = bitmap_start + bmap_bytes;
        let mut bitmap = BitVec::from_bytes(&buf[bitmap_start..bitmap_start + bmap_bytes]);
        bitmap.truncate(capacity);
        let slots = buf[slots_start..slots_start + record_size * capacity].to_vec();
        Self {
            page_no,
            num_records,
            next_free_page_no,
            bitmap,
            record_size,
            capacity,
            slots,
        }
    }

    pub fn to_bytes(&self, page_size: usize) -> Vec<u8> {
        let mut buf = Vec::with_capacity(page_size);
        buf.extend(self.num_records.to_le_bytes());
        buf.extend(self.next_free_page_no.to_le_bytes());
        let mut bitmap = self.bitmap.clone();
        bitmap.truncate(self.capacity);
        buf.extend(bitmap.to_bytes());
        buf.resize(DATA_PAGE_HDR_SIZE + bitmap_bytes(self.capacity), 0);
        buf.extend(&self.slots);
        buf.resize(page_size, 0);
        buf
    }

    pub fn is_full(&self) -> bool {
        self.num_records as usize >= self.capacity
    }

    pub fn first_free_slot(&self) -> Option<usize> {
        (0..self.capacity).find(|&i| !self.bitmap.get(i).unwrap_or(false))
    }

    pub fn slot_bytes(&self, slot_no: usize) -> &[u8] {
        let start = slot_no * self.record_size;
        &self.slots[start..start + self.record_size]
    }

    pub fn set_slot(&mut self, slot_no: usize, bytes: &[u8]) {
        let start = slot_no * self.record_size;
        self.slots[start..start + self.record_size].copy_from_slice(bytes);
        if !self.bitmap.get(slot_no).unwrap_or(false) {
            self.bitmap.set(slot_no, true);
            self.num_records += 1;
        }
    }

    pub fn clear_slot(&mut self, slot_no: usize) {
        if self.bitmap.get(slot_no).unwrap_or(false) {
            self.bitmap.set(slot_no, false);
            self.num_records -= 1;
        }
    }

    pub fn is_occupied(&self, slot_no: usize) -> bool {
        self.bitmap.get(slot_no).unwrap_or(false)
    }

    pub fn rid(&self, slot_no: usize) -> Rid {
        Rid::new(self.page_no, slot_no as u32)
    }
}
