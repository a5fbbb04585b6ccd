//! Multi-granularity lock manager (spec §4.4): table/record locks with
//! a strict wound-wait-free deadlock-prevention policy — no waiting, no
//! queuing; a conflicting foreign holder aborts the requester outright.

use std::collections::HashMap;
use std::sync::Mutex;

use log::debug;

use crate::{
    error::{SmallError, SmallResult},
    observation::Ob,
    storage::page_id::{Fd, Rid},
    transaction::txn::{DeadlockReason, Transaction},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockDataIdType {
    Table,
    Record,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LockDataId {
    pub fd: Fd,
    pub rid: Option<Rid>,
    pub ty: LockDataIdType,
}

impl LockDataId {
    pub fn table(fd: Fd) -> Self {
        Self {
            fd,
            rid: None,
            ty: LockDataIdType::Table,
        }
    }

    pub fn record(fd: Fd, rid: Rid) -> Self {
        Self {
            fd,
            rid: Some(rid),
            ty: LockDataIdType::Record,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    S,
    X,
    IS,
    IX,
    SIx,
}

impl LockMode {
    /// Standard multi-granularity compatibility matrix: can a holder
    /// in `self` coexist with a concurrent requester in `other`?
    fn compatible_with(&self, other: LockMode) -> bool {
        use LockMode::*;
        match (self, other) {
            (IS, IS) | (IS, IX) | (IS, S) | (IS, SIx) => true,
            (IX, IS) | (IX, IX) => true,
            (S, IS) | (S, S) => true,
            (SIx, IS) => true,
            _ => false,
        }
    }
}

struct LockEntry {
    holders: HashMap<u32, LockMode>,
}

pub struct LockManager {
    entries: Mutex<HashMap<LockDataId, LockEntry>>,
    ob: Mutex<Ob>,
}

impl LockManager {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ob: Mutex::new(Ob::new()),
        }
    }

    fn span_tags(txn_id: u32, data_id: LockDataId) -> HashMap<String, String> {
        let mut tags = HashMap::new();
        tags.insert("txn".to_string(), txn_id.to_string());
        tags.insert("fd".to_string(), data_id.fd.to_string());
        tags.insert(
            "rid".to_string(),
            data_id
                .rid
                .map(|r| format!("{}:{}", r.page_no, r.slot_no))
                .unwrap_or_default(),
        );
        tags
    }

    fn record(&self, txn_id: u32, data_id: LockDataId, action: &str) {
        let mut local_tags = HashMap::new();
        local_tags.insert("action".to_string(), action.to_string());
        let event = crate::observation::Event::new(Self::span_tags(txn_id, data_id), local_tags);
        self.ob.lock().unwrap().add_event(event);
    }

    /// Dumps a lock-acquisition/release timeline to the log, flagging
    /// locks still held (no matching "released" event) and the
    /// longest-held spans (spec §9 "observation").
    pub fn analyze(&self) {
        self.ob.lock().unwrap().analyze();
    }

    fn abort(&self) -> SmallError {
        SmallError::TransactionAbort(DeadlockReason::DeadlockPrevention)
    }

    /// Grants `requested` for `txn` on `data_id`, enforcing the
    /// compatibility matrix against every *other* transaction's
    /// holder. Same-transaction holders never conflict with
    /// themselves; an upgrade is attempted via `try_upgrade` first.
    fn request(
        &self,
        txn: &mut Transaction,
        data_id: LockDataId,
        requested: LockMode,
    ) -> SmallResult<()> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.entry(data_id).or_insert_with(|| LockEntry {
            holders: HashMap::new(),
        });

        if let Some(&held) = entry.holders.get(&txn.id) {
            if subsumes(held, requested) {
                return Ok(());
            }
            let result = self.try_upgrade(entry, txn, data_id, held, requested);
            drop(entries);
            if result.is_ok() {
                self.record(txn.id, data_id, "acquired");
            }
            return result;
        }

        for (&holder_id, &holder_mode) in entry.holders.iter() {
            if holder_id != txn.id && !holder_mode.compatible_with(requested) {
                debug!(
                    "lock_manager: txn {} aborted requesting {:?} on {:?} (held {:?} by txn {})",
                    txn.id, requested, data_id, holder_mode, holder_id
                );
                return Err(self.abort());
            }
        }
        entry.holders.insert(txn.id, requested);
        txn.lock_set.insert(data_id);
        drop(entries);
        self.record(txn.id, data_id, "acquired");
        Ok(())
    }

    /// S -> X only when sole holder; S -> SIX when no other S holder;
    /// any other combination requiring an actual upgrade aborts (spec
    /// §4.4 "Upgrade rules").
    fn try_upgrade(
        &self,
        entry: &mut LockEntry,
        txn: &mut Transaction,
        data_id: LockDataId,
        held: LockMode,
        requested: LockMode,
    ) -> SmallResult<()> {
        let sole_holder = entry.holders.len() == 1;
        let ok = match (held, requested) {
            (LockMode::S, LockMode::X) => sole_holder,
            (LockMode::S, LockMode::SIx) => {
                entry.holders.iter().all(|(&id, &m)| id == txn.id || m != LockMode::S)
            }
            (LockMode::IS, LockMode::IX) | (LockMode::IS, LockMode::S) => true,
            _ => false,
        };
        if !ok {
            return Err(SmallError::TransactionAbort(DeadlockReason::UpgradeConflict));
        }
        entry.holders.insert(txn.id, requested);
        txn.lock_set.insert(data_id);
        Ok(())
    }

    pub fn lock_shared_on_record(&self, txn: &mut Transaction, rid: Rid, fd: Fd) -> SmallResult<()> {
        self.request(txn, LockDataId::record(fd, rid), LockMode::S)
    }

    pub fn lock_exclusive_on_record(&self, txn: &mut Transaction, rid: Rid, fd: Fd) -> SmallResult<()> {
        self.request(txn, LockDataId::record(fd, rid), LockMode::X)
    }

    pub fn lock_shared_on_table(&self, txn: &mut Transaction, fd: Fd) -> SmallResult<()> {
        self.request(txn, LockDataId::table(fd), LockMode::S)
    }

    pub fn lock_exclusive_on_table(&self, txn: &mut Transaction, fd: Fd) -> SmallResult<()> {
        self.request(txn, LockDataId::table(fd), LockMode::X)
    }

    pub fn lock_ix_on_table(&self, txn: &mut Transaction, fd: Fd) -> SmallResult<()> {
        self.request(txn, LockDataId::table(fd), LockMode::IX)
    }

    pub fn lock_is_on_table(&self, txn: &mut Transaction, fd: Fd) -> SmallResult<()> {
        self.request(txn, LockDataId::table(fd), LockMode::IS)
    }

    pub fn unlock(&self, txn: &Transaction, data_id: LockDataId) {
        let mut entries = self.entries.lock().unwrap();
        let released = if let Some(entry) = entries.get_mut(&data_id) {
            let had_it = entry.holders.remove(&txn.id).is_some();
            if entry.holders.is_empty() {
                entries.remove(&data_id);
            }
            had_it
        } else {
            false
        };
        drop(entries);
        if released {
            self.record(txn.id, data_id, "released");
        }
    }

    /// Releases every lock in `txn.lock_set` (spec §4.4 invariant:
    /// commit/abort release all locks before setting final state).
    pub fn release_all(&self, txn: &Transaction) {
        for &data_id in &txn.lock_set {
            self.unlock(txn, data_id);
        }
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

fn subsumes(held: LockMode, requested: LockMode) -> bool {
    use LockMode::*;
    held == requested
        || matches!(
            (held, requested),
            (X, S) | (X, IS) | (X, IX) | (X, SIx) | (SIx, IS) | (SIx, S) | (SIx, IX)
        )
}
