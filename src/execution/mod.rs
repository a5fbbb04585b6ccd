//! Execution operators (spec §4.8): the volcano iterator interface and
//! the concrete scan/join/DML/aggregate operators built on it.

pub mod aggregate;
pub mod delete;
pub mod index_scan;
pub mod insert;
pub mod nested_loop_join;
pub mod predicate;
pub mod seq_scan;
pub mod sort;
pub mod update;

pub use predicate::{CondOp, CondRhs, Condition};

use crate::{error::SmallResult, storage::page_id::Rid, storage::schema::Column, storage::tuple::Tuple};

/// Volcano iterator interface (spec §9 "Operator hierarchy"): every
/// operator implements this single interface, no deep inheritance.
/// `feed` lets a join push the current outer tuple into its inner
/// child so the inner's own predicates (e.g. an index scan's bound)
/// can reference outer columns.
pub trait Executor {
    fn begin_tuple(&mut self) -> SmallResult<()>;
    fn next_tuple(&mut self) -> SmallResult<()>;
    fn is_end(&self) -> bool;
    fn current_tuple(&self) -> SmallResult<Tuple>;
    fn cols(&self) -> &[Column];
    fn rid(&self) -> Option<Rid> {
        None
    }
    fn feed(&mut self, _outer: &Tuple) {}
}
