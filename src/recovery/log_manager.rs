//! Log Manager (spec §4.5): single in-memory WAL buffer, LSN
//! assignment, append/flush.
//!
//! The source blocks `append` on a condition variable when the buffer
//! would overflow, waiting for some other thread to call
//! `flush_log_to_disk`. Since nothing else in this engine runs a
//! dedicated background flusher, an append that would overflow the
//! buffer flushes it itself under the same mutex — callers observe
//! the same invariant (the buffer never exceeds `buffer_capacity`)
//! without needing a separate flusher thread.

use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc, Mutex,
};

use log::debug;

use crate::{
    error::SmallResult,
    io::SmallFile,
    recovery::log_record::{LogBody, LogRecord},
    storage::page_id::Rid,
    transaction::txn::Transaction,
};

struct LogState {
    buffer: Vec<u8>,
}

pub struct LogManager {
    file: Arc<SmallFile>,
    state: Mutex<LogState>,
    buffer_capacity: usize,
    global_lsn: AtomicI64,
    persist_lsn: AtomicI64,
}

impl LogManager {
    pub fn new(file: Arc<SmallFile>, buffer_capacity: usize) -> Self {
        Self {
            file,
            state: Mutex::new(LogState { buffer: Vec::new() }),
            buffer_capacity,
            global_lsn: AtomicI64::new(0),
            persist_lsn: AtomicI64::new(-1),
        }
    }

    pub fn persist_lsn(&self) -> i64 {
        self.persist_lsn.load(Ordering::SeqCst)
    }

    /// Called by recovery's analyze phase to reseed the LSN counter
    /// past the highest LSN found in the log (spec §4.6).
    pub fn reseed_global_lsn(&self, max_seen: i64) {
        let mut current = self.global_lsn.load(Ordering::SeqCst);
        while current <= max_seen {
            match self.global_lsn.compare_exchange(
                current,
                max_seen + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
        self.persist_lsn.store(max_seen, Ordering::SeqCst);
    }

    fn append(&self, mut record: LogRecord) -> SmallResult<i64> {
        let lsn = self.global_lsn.fetch_add(1, Ordering::SeqCst);
        record.lsn = lsn;
        let bytes = record.encode();

        let mut state = self.state.lock().unwrap();
        if state.buffer.len() + bytes.len() > self.buffer_capacity {
            self.flush_locked(&mut state)?;
        }
        state.buffer.extend_from_slice(&bytes);
        Ok(lsn)
    }

    fn flush_locked(&self, state: &mut LogState) -> SmallResult<()> {
        if state.buffer.is_empty() {
            return Ok(());
        }
        self.file.append(&state.buffer)?;
        self.file.sync()?;
        state.buffer.clear();
        self.persist_lsn.store(self.global_lsn.load(Ordering::SeqCst) - 1, Ordering::SeqCst);
        debug!("log_manager: flushed, persist_lsn={}", self.persist_lsn());
        Ok(())
    }

    pub fn flush_log_to_disk(&self) -> SmallResult<()> {
        let mut state = self.state.lock().unwrap();
        self.flush_locked(&mut state)
    }

    /// Reads the whole log file for recovery's analyze pass.
    pub fn read_all(&self) -> SmallResult<Vec<u8>> {
        let len = self.file.len()?;
        let mut buf = vec![0u8; len as usize];
        self.file.read_at(0, &mut buf)?;
        Ok(buf)
    }

    pub fn append_begin(&self, txn: &mut Transaction) -> SmallResult<i64> {
        let lsn = self.append(LogRecord {
            lsn: 0,
            txn_id: txn.id,
            prev_lsn: txn.prev_lsn,
            body: LogBody::Begin,
        })?;
        txn.prev_lsn = lsn;
        Ok(lsn)
    }

    pub fn append_commit(&self, txn: &mut Transaction) -> SmallResult<i64> {
        let lsn = self.append(LogRecord {
            lsn: 0,
            txn_id: txn.id,
            prev_lsn: txn.prev_lsn,
            body: LogBody::Commit,
        })?;
        txn.prev_lsn = lsn;
        Ok(lsn)
    }

    pub fn append_abort(&self, txn: &mut Transaction) -> SmallResult<i64> {
        let lsn = self.append(LogRecord {
            lsn: 0,
            txn_id: txn.id,
            prev_lsn: txn.prev_lsn,
            body: LogBody::Abort,
        })?;
        txn.prev_lsn = lsn;
        Ok(lsn)
    }

    pub fn append_insert(
        &self,
        txn: &mut Transaction,
        table: &str,
        rid: Rid,
        record: Vec<u8>,
        is_rollback: bool,
    ) -> SmallResult<i64> {
        let lsn = self.append(LogRecord {
            lsn: 0,
            txn_id: txn.id,
            prev_lsn: txn.prev_lsn,
            body: LogBody::Insert {
                record,
                rid,
                table: table.to_string(),
                is_rollback,
            },
        })?;
        txn.prev_lsn = lsn;
        Ok(lsn)
    }

    pub fn append_delete(
        &self,
        txn: &mut Transaction,
        table: &str,
        rid: Rid,
        record: Vec<u8>,
    ) -> SmallResult<i64> {
        let lsn = self.append(LogRecord {
            lsn: 0,
            txn_id: txn.id,
            prev_lsn: txn.prev_lsn,
            body: LogBody::Delete {
                record,
                rid,
                table: table.to_string(),
            },
        })?;
        txn.prev_lsn = lsn;
        Ok(lsn)
    }

    pub fn append_update(
        &self,
        txn: &mut Transaction,
        table: &str,
        rid: Rid,
        before: Vec<u8>,
        after: Vec<u8>,
    ) -> SmallResult<i64> {
        let lsn = self.append(LogRecord {
            lsn: 0,
            txn_id: txn.id,
            prev_lsn: txn.prev_lsn,
            body: LogBody::Update {
                before,
                after,
                rid,
                table: table.to_string(),
            },
        })?;
        txn.prev_lsn = lsn;
        Ok(lsn)
    }
}
