//! IndexScan (spec §4.8): builds a composite-key bound from a
//! normalized condition list and an `IndexMeta`, walks the matching
//! leaf range, and re-checks every condition on the materialized
//! record (the index only enforces the equality/range prefix it was
//! built from).

use std::sync::Arc;

use crate::{
    error::SmallResult,
    execution::{
        predicate::{eval_conds, CondOp, CondRhs},
        Condition, Executor,
    },
    index::{ix_index_handle::build_key, IndexMeta, IxIndexHandle},
    storage::{
        page_id::{Iid, Rid, RM_NO_PAGE},
        schema::{Column, TableSchema},
        tuple::Tuple,
        HeapFile,
    },
};

enum Low {
    Start,
    LowerBound(Vec<u8>),
    FirstGreater(Vec<u8>),
}

enum High {
    End,
    LowerBound(Vec<u8>),
    FirstGreater(Vec<u8>),
}

/// Walks `index_meta`'s columns in order, consuming a leading run of
/// equality conditions into the composite-key prefix, then at most one
/// trailing range condition on the next column (spec §4.8 "equality
/// predicates first, then at most one range predicate per column
/// prefix"), and maps it to the lower/upper-bound rule table.
fn plan_bounds(index_meta: &IndexMeta, conds: &[Condition]) -> (Low, High) {
    let mut low = Low::Start;
    let mut high = High::End;
    let mut prefix = Vec::new();

    for col_name in &index_meta.cols {
        let eq = conds
            .iter()
            .find(|c| &c.lhs_col == col_name && c.op == CondOp::Eq);
        if let Some(Condition {
            rhs: CondRhs::Value(v),
            ..
        }) = eq
        {
            prefix.push(v.clone());
            continue;
        }

        let range = conds.iter().find(|c| {
            &c.lhs_col == col_name
                && matches!(c.op, CondOp::Ge | CondOp::Gt | CondOp::Le | CondOp::Lt)
        });
        if let Some(cond) = range {
            if let CondRhs::Value(v) = &cond.rhs {
                let mut key_values = prefix.clone();
                key_values.push(v.clone());
                let key = build_key(index_meta, &key_values);
                match cond.op {
                    CondOp::Ge => low = Low::LowerBound(key),
                    CondOp::Gt => low = Low::FirstGreater(key),
                    CondOp::Le => high = High::FirstGreater(key),
                    CondOp::Lt => high = High::LowerBound(key),
                    _ => unreachable!(),
                }
            }
        }
        break;
    }

    if !prefix.is_empty() && matches!(low, Low::Start) && matches!(high, High::End) {
        let key = build_key(index_meta, &prefix);
        low = Low::LowerBound(key.clone());
        high = High::FirstGreater(key);
    }
    (low, high)
}

fn resolve_low(index: &IxIndexHandle, low: Low) -> SmallResult<Iid> {
    match low {
        Low::Start => index.lower_bound(&[]),
        Low::LowerBound(key) => index.lower_bound(&key),
        Low::FirstGreater(key) => index.upper_bound(&key, true),
    }
}

fn resolve_high(index: &IxIndexHandle, high: High) -> SmallResult<Iid> {
    match high {
        High::End => Ok(Iid::invalid()),
        High::LowerBound(key) => index.lower_bound(&key),
        High::FirstGreater(key) => index.upper_bound(&key, true),
    }
}

/// A bound resolved by `lower_bound`/`upper_bound` can land at
/// `slot_no == num_key` of a non-last leaf (one past its last key).
/// `advance`'s incremental walk never visits that position directly —
/// on exhausting a leaf it steps straight to `(next_leaf, 0)` — so any
/// bound built this way has to be normalized the same way up front, or
/// a scan starting or ending there would read an out-of-range slot.
fn normalize_iid(index: &IxIndexHandle, iid: Iid) -> SmallResult<Iid> {
    if iid.page_no == RM_NO_PAGE {
        return Ok(iid);
    }
    let node = index.fetch_node_for_scan(iid.page_no)?;
    let num_key = node.num_key() as u32;
    let next_leaf = node.header.next_leaf;
    index.release_node_for_scan(node.page_no)?;
    if iid.slot_no < num_key {
        return Ok(iid);
    }
    if next_leaf == RM_NO_PAGE {
        Ok(Iid::invalid())
    } else {
        Ok(Iid::new(next_leaf, 0))
    }
}

pub struct IndexScanExecutor {
    heap: Arc<HeapFile>,
    index: Arc<IxIndexHandle>,
    schema: TableSchema,
    conds: Vec<Condition>,
    low: Iid,
    high: Iid,
    current_iid: Iid,
    done: bool,
    current: Option<(Rid, Tuple)>,
}

impl IndexScanExecutor {
    pub fn new(
        heap: Arc<HeapFile>,
        index: Arc<IxIndexHandle>,
        index_meta: &IndexMeta,
        schema: TableSchema,
        conds: Vec<Condition>,
    ) -> SmallResult<Self> {
        let (low_spec, high_spec) = plan_bounds(index_meta, &conds);
        let low = normalize_iid(&index, resolve_low(&index, low_spec)?)?;
        let high = normalize_iid(&index, resolve_high(&index, high_spec)?)?;
        let done = low.page_no == RM_NO_PAGE || low == high;
        Ok(Self {
            heap,
            index,
            schema,
            conds,
            low,
            high,
            current_iid: low,
            done,
            current: None,
        })
    }

    fn advance(&mut self) -> SmallResult<()> {
        loop {
            if self.done {
                self.current = None;
                return Ok(());
            }
            let node = self.index.fetch_node_for_scan(self.current_iid.page_no)?;
            let rid = node.rid_at(self.current_iid.slot_no as usize);

            let next_slot = self.current_iid.slot_no + 1;
            if next_slot < node.num_key() as u32 {
                self.current_iid.slot_no = next_slot;
            } else {
                let next_leaf = node.header.next_leaf;
                if next_leaf == RM_NO_PAGE {
                    self.done = true;
                } else {
                    self.current_iid = Iid::new(next_leaf, 0);
                }
            }
            self.index.release_node_for_scan(node.page_no)?;
            if self.current_iid == self.high {
                self.done = true;
            }

            let bytes = self.heap.get_record(rid, None)?;
            if eval_conds(&self.schema.columns, &self.conds, &bytes)? {
                self.current = Some((rid, Tuple::from_bytes(bytes)));
                return Ok(());
            }
        }
    }
}

impl Executor for IndexScanExecutor {
    fn begin_tuple(&mut self) -> SmallResult<()> {
        self.current_iid = self.low;
        self.done = self.low.page_no == RM_NO_PAGE || self.low == self.high;
        self.advance()
    }

    fn next_tuple(&mut self) -> SmallResult<()> {
        self.advance()
    }

    fn is_end(&self) -> bool {
        self.current.is_none()
    }

    fn current_tuple(&self) -> SmallResult<Tuple> {
        Ok(self
            .current
            .as_ref()
            .expect("current_tuple called past end of scan")
            .1
            .clone())
    }

    fn cols(&self) -> &[Column] {
        &self.schema.columns
    }

    fn rid(&self) -> Option<Rid> {
        self.current.as_ref().map(|(rid, _)| *rid)
    }
}
