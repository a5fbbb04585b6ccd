//! Sort (spec §4.8): materializes the whole child, sorts in-place by
//! `(col, direction)[]`, then truncates to a LIMIT if one is given.

use std::cmp::Ordering;

use crate::{
    error::SmallResult,
    execution::{predicate::compare_values, Executor},
    storage::{page_id::Rid, schema::Column, tuple::{Tuple, Value}},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

pub struct SortExecutor {
    child: Box<dyn Executor>,
    keys: Vec<(String, SortDirection)>,
    limit: Option<usize>,
    rows: Vec<Tuple>,
    pos: usize,
}

impl SortExecutor {
    pub fn new(child: Box<dyn Executor>, keys: Vec<(String, SortDirection)>, limit: Option<usize>) -> Self {
        Self {
            child,
            keys,
            limit,
            rows: Vec::new(),
            pos: 0,
        }
    }
}

impl Executor for SortExecutor {
    fn begin_tuple(&mut self) -> SmallResult<()> {
        self.child.begin_tuple()?;
        self.rows.clear();
        while !self.child.is_end() {
            self.rows.push(self.child.current_tuple()?);
            self.child.next_tuple()?;
        }

        let cols = self.child.cols().to_vec();
        let mut err = None;
        self.rows.sort_by(|a, b| {
            for (name, dir) in &self.keys {
                let col = cols.iter().find(|c| &c.name == name);
                let col = match col {
                    Some(c) => c,
                    None => continue,
                };
                let av = Value::from_bytes(col.col_type, &a.bytes[col.offset..col.offset + col.len]);
                let bv = Value::from_bytes(col.col_type, &b.bytes[col.offset..col.offset + col.len]);
                let ordering = match compare_values(&av, &bv) {
                    Ok(o) => o,
                    Err(e) => {
                        err = Some(e);
                        Ordering::Equal
                    }
                };
                let ordering = if *dir == SortDirection::Desc {
                    ordering.reverse()
                } else {
                    ordering
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
        if let Some(e) = err {
            return Err(e);
        }

        if let Some(limit) = self.limit {
            self.rows.truncate(limit);
        }
        self.pos = 0;
        Ok(())
    }

    fn next_tuple(&mut self) -> SmallResult<()> {
        self.pos += 1;
        Ok(())
    }

    fn is_end(&self) -> bool {
        self.pos >= self.rows.len()
    }

    fn current_tuple(&self) -> SmallResult<Tuple> {
        Ok(self.rows[self.pos].clone())
    }

    fn cols(&self) -> &[Column] {
        self.child.cols()
    }

    fn rid(&self) -> Option<Rid> {
        None
    }
}
