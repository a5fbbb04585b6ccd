//! Delete (spec §4.8): iterate a child scan; for each rid, read the
//! record, delete all index entries, log it, delete the heap record,
//! and append the before-image to the write-set.

use crate::{
    catalog::SmManager,
    error::SmallResult,
    execution::Executor,
    recovery::log_manager::LogManager,
    storage::schema::TableSchema,
    transaction::{lock_manager::LockManager, txn::{Transaction, WriteRecord}},
};

pub struct DeleteExecutor<'a> {
    sm: &'a SmManager,
    lock_manager: &'a LockManager,
    log_manager: &'a LogManager,
    table: String,
    schema: TableSchema,
}

impl<'a> DeleteExecutor<'a> {
    pub fn new(
        sm: &'a SmManager,
        lock_manager: &'a LockManager,
        log_manager: &'a LogManager,
        table: &str,
        schema: TableSchema,
    ) -> Self {
        Self {
            sm,
            lock_manager,
            log_manager,
            table: table.to_string(),
            schema,
        }
    }

    pub fn execute(&self, txn: &mut Transaction, child: &mut dyn Executor) -> SmallResult<usize> {
        let heap = self.sm.heap(&self.table)?;
        self.lock_manager.lock_ix_on_table(txn, heap.fd)?;
        let indexes = self.sm.show_index(&self.table)?;

        // Collect rids up front: the child scan walks the same heap
        // pages being mutated, so deleting while iterating would
        // invalidate its cursor.
        let mut rids = Vec::new();
        child.begin_tuple()?;
        while !child.is_end() {
            if let Some(rid) = child.rid() {
                rids.push(rid);
            }
            child.next_tuple()?;
        }

        let mut count = 0;
        for rid in rids {
            let before = heap.get_record(rid, Some(txn))?;
            for ix in &indexes {
                let handle = self.sm.index(&ix.file_name())?;
                let key = build_key_bytes(&self.schema, ix, &before);
                handle.delete_entry(&key)?;
            }
            let lsn = self
                .log_manager
                .append_delete(txn, &self.table, rid, before.clone())?;
            heap.delete_record(rid, Some(txn))?;
            heap.set_page_lsn(rid.page_no, lsn);
            txn.write_set.push(WriteRecord::Delete {
                table: self.table.clone(),
                rid,
                before,
            });
            count += 1;
        }
        Ok(count)
    }
}

fn build_key_bytes(schema: &TableSchema, index: &crate::index::IndexMeta, record: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(index.col_tot_len);
    for name in &index.cols {
        let col = schema.col(name).expect("index column missing from schema");
        key.extend_from_slice(&record[col.offset..col.offset + col.len]);
    }
    key
}
