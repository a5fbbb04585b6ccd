//! Update (spec §4.8): iterate a child scan; for each rid, read the
//! before-image, apply the set-clauses to build the after-image,
//! re-key every index (raising on a uniqueness conflict before any
//! heap mutation happens), log it, and append the before-image to the
//! write-set.

use crate::{
    catalog::SmManager,
    error::{SmallError, SmallResult},
    execution::Executor,
    recovery::log_manager::LogManager,
    storage::{
        schema::TableSchema,
        tuple::{Tuple, Value},
    },
    transaction::{lock_manager::LockManager, txn::{Transaction, WriteRecord}},
};

pub struct SetClause {
    pub col: String,
    pub value: Value,
}

pub struct UpdateExecutor<'a> {
    sm: &'a SmManager,
    lock_manager: &'a LockManager,
    log_manager: &'a LogManager,
    table: String,
    schema: TableSchema,
}

impl<'a> UpdateExecutor<'a> {
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

    pub fn execute(
        &self,
        txn: &mut Transaction,
        child: &mut dyn Executor,
        set_clauses: &[SetClause],
    ) -> SmallResult<usize> {
        let heap = self.sm.heap(&self.table)?;
        self.lock_manager.lock_ix_on_table(txn, heap.fd)?;
        let indexes = self.sm.show_index(&self.table)?;

        // Collect rids up front: updating in place while the child
        // cursor walks the same pages would invalidate it.
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
            let after = self.apply_set_clauses(&before, set_clauses)?;

            // Pass 1: pre-check every index for a key collision before
            // mutating anything (spec §4.8 "on conflict: leave the
            // record untouched").
            for ix in &indexes {
                let old_key = build_key_bytes(&self.schema, ix, &before);
                let new_key = build_key_bytes(&self.schema, ix, &after);
                if old_key != new_key {
                    let handle = self.sm.index(&ix.file_name())?;
                    if handle.get_value(&new_key)?.is_some() {
                        return Err(SmallError::IndexEntryRepeat(ix.cols.clone()));
                    }
                }
            }

            let lsn = self
                .log_manager
                .append_update(txn, &self.table, rid, before.clone(), after.clone())?;
            heap.update_record(rid, &after, Some(txn))?;
            heap.set_page_lsn(rid.page_no, lsn);

            // Pass 2: swap each index's current entry for the updated one.
            for ix in &indexes {
                let old_key = build_key_bytes(&self.schema, ix, &before);
                let new_key = build_key_bytes(&self.schema, ix, &after);
                if old_key != new_key {
                    let handle = self.sm.index(&ix.file_name())?;
                    handle.delete_entry(&old_key)?;
                    if !handle.insert_entry(&new_key, rid)? {
                        return Err(SmallError::IndexEntryRepeat(ix.cols.clone()));
                    }
                }
            }

            txn.write_set.push(WriteRecord::Update {
                table: self.table.clone(),
                rid,
                before,
            });
            count += 1;
        }
        Ok(count)
    }

    fn apply_set_clauses(&self, before: &[u8], set_clauses: &[SetClause]) -> SmallResult<Vec<u8>> {
        let mut values = Vec::with_capacity(self.schema.columns.len());
        for col in &self.schema.columns {
            if let Some(set) = set_clauses.iter().find(|s| s.col == col.name) {
                values.push(set.value.clone());
            } else {
                values.push(Value::from_bytes(
                    col.col_type,
                    &before[col.offset..col.offset + col.len],
                ));
            }
        }
        let tuple = Tuple::from_values(&self.schema, &values)?;
        Ok(tuple.bytes)
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
