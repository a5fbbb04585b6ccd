//! Error taxonomy for the engine: a `thiserror`-derived enum so callers
//! can match on the kind of failure (validation vs. constraint vs.
//! concurrency vs. system) instead of inspecting a string, plus a
//! `.show_backtrace()` debugging affordance for invariant violations
//! that should never happen in practice.

use backtrace::Backtrace;
use thiserror::Error;

use crate::storage::page_id::Rid;
use crate::transaction::DeadlockReason;

#[derive(Error, Debug)]
pub enum SmallError {
    // -- Validation --
    #[error("database already exists: {0}")]
    DatabaseExists(String),
    #[error("database not found: {0}")]
    DatabaseNotFound(String),
    #[error("table already exists: {0}")]
    TableExists(String),
    #[error("table not found: {0}")]
    TableNotFound(String),
    #[error("index already exists on {0:?}")]
    IndexExists(Vec<String>),
    #[error("index not found on {0:?}")]
    IndexNotFound(Vec<String>),
    #[error("column not found: {0}")]
    ColumnNotFound(String),
    #[error("incompatible type for column {0}")]
    IncompatibleType(String),
    #[error("expected {expected} values, got {got}")]
    InvalidValueCount { expected: usize, got: usize },
    #[error("invalid DATETIME literal: {0}")]
    DatetimeFormat(String),
    #[error("CSV row does not match table schema: {0}")]
    LoadNotMatch(String),

    // -- Constraint --
    #[error("duplicate key in unique index on {0:?}")]
    IndexEntryRepeat(Vec<String>),

    // -- Lookup --
    #[error("record not found: {0:?}")]
    RecordNotFound(Rid),
    #[error("index entry not found")]
    IndexEntryNotFound,

    // -- Concurrency --
    #[error("transaction aborted: {0:?}")]
    TransactionAbort(DeadlockReason),

    // -- System --
    #[error("i/o error: {0}")]
    UnixError(String),
    #[error("internal invariant violated: {0}")]
    Internal(String),
}

pub type SmallResult<T = ()> = Result<T, SmallError>;

impl SmallError {
    pub fn internal(msg: impl Into<String>) -> Self {
        SmallError::Internal(msg.into())
    }

    pub fn io(msg: impl Into<String>) -> Self {
        SmallError::UnixError(msg.into())
    }

    /// Print a backtrace to stderr, used at call sites guarding
    /// conditions that should never happen (buffer-pool corruption,
    /// B+tree invariant violations).
    pub fn show_backtrace(&self) {
        eprintln!("{}\n{:?}", self, Backtrace::new());
    }
}

impl From<std::io::Error> for SmallError {
    fn from(e: std::io::Error) -> Self {
        SmallError::UnixError(e.to_string())
    }
}

/// Per spec §7 propagation policy: constraint and concurrency errors
/// abort the enclosing transaction; validation errors only abort the
/// statement.
pub fn aborts_transaction(e: &SmallError) -> bool {
    matches!(
        e,
        SmallError::IndexEntryRepeat(_) | SmallError::TransactionAbort(_)
    )
}
