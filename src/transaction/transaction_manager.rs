//! `TransactionManager` (spec §4.7): begin/commit/abort, rollback
//! dispatch via the write-set.
//!
//! `abort` pops the write-set newest-to-oldest and invokes the
//! compensating operation at the catalog layer (spec's
//! `transaction_manager.cpp` shows this dispatch exactly — see
//! SPEC_FULL §C). The catalog is reached through the `RollbackSink`
//! trait rather than a direct `catalog::SmManager` reference so this
//! module doesn't have to know about table/index storage at all.

use std::{collections::HashMap, sync::Arc, sync::Mutex};

use log::info;

use crate::{
    error::SmallResult,
    recovery::log_manager::LogManager,
    storage::page_id::Rid,
    transaction::{
        lock_manager::LockManager,
        txn::{Transaction, TransactionState, WriteRecord},
    },
};

/// The catalog's compensating-action surface, invoked during abort.
/// Each method both undoes the effect and emits its own compensating
/// log record (spec §4.7): DELETE for an insert-rollback, INSERT with
/// `is_rollback=true` for a delete-rollback, UPDATE with swapped
/// before/after for an update-rollback.
pub trait RollbackSink: Send + Sync {
    fn rollback_insert(
        &self,
        txn: &mut Transaction,
        log_manager: &LogManager,
        table: &str,
        rid: Rid,
    ) -> SmallResult<()>;

    fn rollback_delete(
        &self,
        txn: &mut Transaction,
        log_manager: &LogManager,
        table: &str,
        rid: Rid,
        before: &[u8],
    ) -> SmallResult<()>;

    fn rollback_update(
        &self,
        txn: &mut Transaction,
        log_manager: &LogManager,
        table: &str,
        rid: Rid,
        before: &[u8],
    ) -> SmallResult<()>;
}

pub struct TransactionManager {
    lock_manager: Arc<LockManager>,
    log_manager: Arc<LogManager>,
    catalog: Arc<dyn RollbackSink>,
    /// Process-wide transaction states, replacing the source's
    /// file-scope `txn_map` static (spec §9 "Global mutable state").
    txn_map: Mutex<HashMap<u32, TransactionState>>,
}

impl TransactionManager {
    pub fn new(
        lock_manager: Arc<LockManager>,
        log_manager: Arc<LogManager>,
        catalog: Arc<dyn RollbackSink>,
    ) -> Self {
        Self {
            lock_manager,
            log_manager,
            catalog,
            txn_map: Mutex::new(HashMap::new()),
        }
    }

    pub fn begin(&self) -> SmallResult<Transaction> {
        let mut txn = Transaction::new();
        self.log_manager.append_begin(&mut txn)?;
        self.txn_map
            .lock()
            .unwrap()
            .insert(txn.id, TransactionState::Default);
        Ok(txn)
    }

    pub fn commit(&self, txn: &mut Transaction) -> SmallResult<()> {
        self.log_manager.append_commit(txn)?;
        self.log_manager.flush_log_to_disk()?;
        self.lock_manager.release_all(txn);
        txn.write_set.clear();
        txn.state = TransactionState::Committed;
        self.txn_map
            .lock()
            .unwrap()
            .insert(txn.id, TransactionState::Committed);
        info!("txn {}: committed", txn.id);
        Ok(())
    }

    pub fn abort(&self, txn: &mut Transaction) -> SmallResult<()> {
        while let Some(record) = txn.write_set.pop() {
            match record {
                WriteRecord::Insert { table, rid } => {
                    self.catalog.rollback_insert(txn, &self.log_manager, &table, rid)?
                }
                WriteRecord::Delete { table, rid, before } => self
                    .catalog
                    .rollback_delete(txn, &self.log_manager, &table, rid, &before)?,
                WriteRecord::Update { table, rid, before } => self
                    .catalog
                    .rollback_update(txn, &self.log_manager, &table, rid, &before)?,
            }
        }
        self.log_manager.append_abort(txn)?;
        self.log_manager.flush_log_to_disk()?;
        self.lock_manager.release_all(txn);
        txn.state = TransactionState::Aborted;
        self.txn_map
            .lock()
            .unwrap()
            .insert(txn.id, TransactionState::Aborted);
        info!("txn {}: aborted", txn.id);
        Ok(())
    }
}
