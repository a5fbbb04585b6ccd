//! `RmScan` (spec §4.2 "Scan"): forward cursor over a heap file's
//! live records.

use crate::storage::{
    page_id::Rid,
    record::{heap_file::HeapFile, heap_page::DataPage},
};

pub struct HeapScan<'a> {
    file: &'a HeapFile,
    page_no: u32,
    slot_no: u32,
    current_page: Option<DataPage>,
}

impl<'a> HeapScan<'a> {
    pub fn new(file: &'a HeapFile) -> Self {
        let mut scan = Self {
            file,
            page_no: 1,
            slot_no: 0,
            current_page: None,
        };
        scan.load_page();
        scan.advance_to_next_occupied();
        scan
    }

    fn load_page(&mut self) {
        if self.page_no >= self.file.num_pages() {
            self.current_page = None;
            return;
        }
        self.current_page = self.file.fetch_data_page(self.page_no).ok();
    }

    fn advance_to_next_occupied(&mut self) {
        loop {
            match &self.current_page {
                None => return,
                Some(page) => {
                    let capacity = page.capacity as u32;
                    while self.slot_no < capacity {
                        if page.is_occupied(self.slot_no as usize) {
                            return;
                        }
                        self.slot_no += 1;
                    }
                }
            }
            self.file.release_data_page(self.page_no).ok();
            self.page_no += 1;
            self.slot_no = 0;
            self.load_page();
            if self.current_page.is_none() {
                return;
            }
        }
    }

    pub fn is_end(&self) -> bool {
        self.current_page.is_none()
    }

    pub fn rid(&self) -> Option<Rid> {
        if self.is_end() {
            None
        } else {
            Some(Rid::new(self.page_no, self.slot_no))
        }
    }

    pub fn next(&mut self) -> Option<(Rid, Vec<u8>)> {
        if self.is_end() {
            return None;
        }
        let rid = Rid::new(self.page_no, self.slot_no);
        let bytes = self
            .current_page
            .as_ref()
            .unwrap()
            .slot_bytes(self.slot_no as usize)
            .to_vec();
        self.slot_no += 1;
        self.advance_to_next_occupied();
        Some((rid, bytes))
    }
}

impl<'a> Iterator for HeapScan<'a> {
    type Item = (Rid, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        HeapScan::next(self)
    }
}

impl<'a> Drop for HeapScan<'a> {
    fn drop(&mut self) {
        if self.current_page.is_some() {
            self.file.release_data_page(self.page_no).ok();
        }
    }
}
