//! Minimal physical-plan glue (spec §9 "logical/physical plan shapes
//! are inputs; how they are produced is not specified"): picks
//! SeqScan vs IndexScan for a single table's residual conditions.

use crate::{
    catalog::SmManager,
    error::SmallResult,
    execution::{index_scan::IndexScanExecutor, seq_scan::SeqScanExecutor, Condition, Executor},
    storage::schema::TableSchema,
};

/// Picks the first index whose leading column has any condition on it
/// (spec §4.8 IndexScan "equality predicates first, then at most one
/// range predicate"); falls back to a full SeqScan otherwise.
pub fn pick_scan(
    sm: &SmManager,
    table: &str,
    schema: &TableSchema,
    conds: Vec<Condition>,
) -> SmallResult<Box<dyn Executor>> {
    let heap = sm.heap(table)?;
    let indexes = sm.show_index(table)?;

    for ix in &indexes {
        if let Some(first_col) = ix.cols.first() {
            if conds.iter().any(|c| &c.lhs_col == first_col) {
                let handle = sm.index(&ix.file_name())?;
                let exec = IndexScanExecutor::new(heap, handle, ix, schema.clone(), conds)?;
                return Ok(Box::new(exec));
            }
        }
    }

    Ok(Box::new(SeqScanExecutor::new(heap, schema.clone(), conds)))
}
