//! `Transaction` (spec §3 "Transaction"): id, fixed SERIALIZABLE
//! isolation, state, lock-set and write-set.

use std::{
    collections::HashSet,
    sync::atomic::{AtomicU32, Ordering},
};

use crate::{
    storage::page_id::Rid,
    transaction::lock_manager::LockDataId,
};

static NEXT_TXN_ID: AtomicU32 = AtomicU32::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Default,
    Committed,
    Aborted,
}

/// Reason the lock manager aborted a requester (spec §4.4, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlockReason {
    DeadlockPrevention,
    UpgradeConflict,
}

/// Logical undo entry appended to a transaction's write-set on every
/// mutation (spec §9 "Write-set polymorphism": a tagged union replacing
/// the source's `WType`-tagged `WriteRecord` class hierarchy).
#[derive(Debug, Clone)]
pub enum WriteRecord {
    Insert { table: String, rid: Rid },
    Delete { table: String, rid: Rid, before: Vec<u8> },
    Update { table: String, rid: Rid, before: Vec<u8> },
}

pub struct Transaction {
    pub id: u32,
    pub state: TransactionState,
    /// LSN of this transaction's most recent log record, chained for
    /// undo (spec glossary "Prev LSN").
    pub prev_lsn: i64,
    pub lock_set: HashSet<LockDataId>,
    pub write_set: Vec<WriteRecord>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::with_id(NEXT_TXN_ID.fetch_add(1, Ordering::SeqCst))
    }

    pub fn with_id(id: u32) -> Self {
        Self {
            id,
            state: TransactionState::Default,
            prev_lsn: -1,
            lock_set: HashSet::new(),
            write_set: Vec::new(),
        }
    }

    /// Reseeds the process-wide id generator past `max_seen`, called
    /// by recovery's analyze phase (spec §4.6) so ids allocated after
    /// restart never collide with ones found in the log.
    pub fn reseed_next_id(max_seen: u32) {
        let mut current = NEXT_TXN_ID.load(Ordering::SeqCst);
        while current <= max_seen {
            match NEXT_TXN_ID.compare_exchange(
                current,
                max_seen + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}
