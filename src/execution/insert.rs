//! Insert (spec §4.8): coerce `Value`s into a record, write the heap,
//! log it, maintain every index (rolling back the heap insert on a
//! uniqueness conflict), and append to the write-set.

use crate::{
    catalog::SmManager,
    error::{SmallError, SmallResult},
    recovery::log_manager::LogManager,
    storage::{page_id::Rid, schema::TableSchema, tuple::{Tuple, Value}},
    transaction::{lock_manager::LockManager, txn::{Transaction, WriteRecord}},
};

pub struct InsertExecutor<'a> {
    sm: &'a SmManager,
    lock_manager: &'a LockManager,
    log_manager: &'a LogManager,
    table: String,
    schema: TableSchema,
}

impl<'a> InsertExecutor<'a> {
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

    pub fn execute(&self, txn: &mut Transaction, values: &[Value]) -> SmallResult<Rid> {
        let tuple = Tuple::from_values(&self.schema, values)?;
        let heap = self.sm.heap(&self.table)?;

        self.lock_manager.lock_ix_on_table(txn, heap.fd)?;
        let rid = heap.insert_record(&tuple.bytes, Some(txn))?;

        let indexes = self.sm.show_index(&self.table)?;
        let mut inserted_on: Vec<usize> = Vec::new();
        for (i, ix) in indexes.iter().enumerate() {
            let handle = self.sm.index(&ix.file_name())?;
            let key = build_key_bytes(&self.schema, ix, &tuple.bytes);
            match handle.insert_entry(&key, rid) {
                Ok(true) => inserted_on.push(i),
                Ok(false) => {
                    // Uniqueness conflict: undo this insert and every
                    // index entry already written for it (spec §4.8
                    // "on conflict: rollback record insert").
                    for j in inserted_on {
                        let earlier = self.sm.index(&indexes[j].file_name())?;
                        let earlier_key = build_key_bytes(&self.schema, &indexes[j], &tuple.bytes);
                        earlier.delete_entry(&earlier_key)?;
                    }
                    heap.delete_record(rid, None)?;
                    return Err(SmallError::IndexEntryRepeat(ix.cols.clone()));
                }
                Err(e) => return Err(e),
            }
        }

        // `rid` is only known once the heap has physically placed the
        // record, so the log record necessarily follows the mutation
        // here (unlike delete/update, where the rid is already known
        // and the log record can precede it).
        let lsn = self
            .log_manager
            .append_insert(txn, &self.table, rid, tuple.bytes.clone(), false)?;
        heap.set_page_lsn(rid.page_no, lsn);
        txn.write_set.push(WriteRecord::Insert {
            table: self.table.clone(),
            rid,
        });
        Ok(rid)
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
