//! SeqScan (spec §4.8): iterates a heap file page by page, filtering
//! each live slot through `eval_conds`.

use std::sync::Arc;

use crate::{
    error::SmallResult,
    execution::{predicate::eval_conds, Condition, Executor},
    storage::{page_id::Rid, schema::Column, schema::TableSchema, tuple::Tuple, HeapFile},
};

pub struct SeqScanExecutor {
    heap: Arc<HeapFile>,
    schema: TableSchema,
    conds: Vec<Condition>,
    page_no: u32,
    slot_no: u32,
    current: Option<(Rid, Tuple)>,
}

impl SeqScanExecutor {
    pub fn new(heap: Arc<HeapFile>, schema: TableSchema, conds: Vec<Condition>) -> Self {
        Self {
            heap,
            schema,
            conds,
            page_no: 1,
            slot_no: 0,
            current: None,
        }
    }

    fn advance(&mut self) -> SmallResult<()> {
        loop {
            if self.page_no >= self.heap.num_pages() {
                self.current = None;
                return Ok(());
            }
            let page = self.heap.fetch_data_page(self.page_no)?;
            let capacity = page.capacity as u32;
            while self.slot_no < capacity {
                let slot_no = self.slot_no;
                self.slot_no += 1;
                if !page.is_occupied(slot_no as usize) {
                    continue;
                }
                let bytes = page.slot_bytes(slot_no as usize).to_vec();
                if eval_conds(&self.schema.columns, &self.conds, &bytes)? {
                    self.heap.release_data_page(self.page_no)?;
                    self.current = Some((Rid::new(self.page_no, slot_no), Tuple::from_bytes(bytes)));
                    return Ok(());
                }
            }
            self.heap.release_data_page(self.page_no)?;
            self.page_no += 1;
            self.slot_no = 0;
        }
    }
}

impl Executor for SeqScanExecutor {
    fn begin_tuple(&mut self) -> SmallResult<()> {
        self.page_no = 1;
        self.slot_no = 0;
        self.advance()
    }

    fn next_tuple(&mut self) -> SmallResult<()> {
        self.advance()
    }

    fn is_end(&self) -> bool {
        self.current.is_none()
    }

    fn current_tuple(&self) -> SmallResult<Tuple> {
        Ok(self
            .current
            .as_ref()
            .expect("current_tuple called past end of scan")
            .1
            .clone())
    }

    fn cols(&self) -> &[Column] {
        &self.schema.columns
    }

    fn rid(&self) -> Option<Rid> {
        self.current.as_ref().map(|(rid, _)| *rid)
    }
}
