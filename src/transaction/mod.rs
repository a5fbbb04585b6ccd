//! Transaction lifecycle and the multi-granularity lock manager
//! (spec §4.4, §4.7).

pub mod lock_manager;
pub mod transaction_manager;
pub mod txn;

pub use lock_manager::LockManager;
pub use transaction_manager::{RollbackSink, TransactionManager};
pub use txn::{DeadlockReason, Transaction, TransactionState, WriteRecord};
