//! One client connection's state: the transaction currently open, if
//! any (spec §6 TCL `BEGIN`/`COMMIT`/`ABORT`/`ROLLBACK`). Statements
//! issued outside an explicit `BEGIN` run autocommit.

use crate::{database::Database, error::SmallResult, transaction::txn::Transaction};

pub struct Session {
    pub txn: Option<Transaction>,
}

impl Session {
    pub fn new() -> Self {
        Self { txn: None }
    }

    pub fn begin(&mut self, db: &Database) -> SmallResult<()> {
        let txn = db.begin()?;
        self.txn = Some(txn);
        Ok(())
    }

    pub fn commit(&mut self, db: &Database) -> SmallResult<()> {
        if let Some(mut txn) = self.txn.take() {
            db.commit(&mut txn)?;
        }
        Ok(())
    }

    pub fn rollback(&mut self, db: &Database) -> SmallResult<()> {
        if let Some(mut txn) = self.txn.take() {
            db.abort(&mut txn)?;
        }
        Ok(())
    }

    pub fn in_transaction(&self) -> bool {
        self.txn.is_some()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
