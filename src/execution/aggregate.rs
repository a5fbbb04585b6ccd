//! Aggregate (spec §4.8): single-tuple output of MIN/MAX/SUM/COUNT over
//! a single typed column. COUNT accepts any type; MIN/MAX/SUM require a
//! numeric (or, for MIN/MAX, string) column. The result is emitted as
//! its string representation packed into a variable-length CHAR record
//! built just for that one output column; no multi-column aggregation
//! or GROUP BY.

use crate::{
    error::{SmallError, SmallResult},
    execution::Executor,
    storage::{
        page_id::Rid,
        schema::{ColType, Column, TableSchema},
        tuple::{Tuple, Value},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFn {
    Min,
    Max,
    Sum,
    Count,
}

pub struct AggregateExecutor {
    child: Box<dyn Executor>,
    func: AggFn,
    col: String,
    out_cols: Vec<Column>,
    done: bool,
    result: Option<Tuple>,
}

impl AggregateExecutor {
    pub fn new(child: Box<dyn Executor>, func: AggFn, col: &str) -> Self {
        Self {
            child,
            func,
            col: col.to_string(),
            out_cols: vec![Column {
                name: format!("{:?}({})", func, col).to_lowercase(),
                col_type: ColType::Char,
                len: 0,
                offset: 0,
                indexed: false,
            }],
            done: false,
            result: None,
        }
    }

    fn compute(&mut self) -> SmallResult<String> {
        let child_cols = self.child.cols().to_vec();
        let col = if self.func == AggFn::Count && self.col == "*" {
            None
        } else {
            Some(
                child_cols
                    .iter()
                    .find(|c| c.name == self.col)
                    .ok_or_else(|| SmallError::ColumnNotFound(self.col.clone()))?
                    .clone(),
            )
        };

        let mut count: i64 = 0;
        let mut sum_i: i64 = 0;
        let mut sum_f: f64 = 0.0;
        let mut is_float = false;
        let mut min_val: Option<Value> = None;
        let mut max_val: Option<Value> = None;

        self.child.begin_tuple()?;
        while !self.child.is_end() {
            let tuple = self.child.current_tuple()?;
            count += 1;

            if let Some(col) = &col {
                let v = Value::from_bytes(col.col_type, &tuple.bytes[col.offset..col.offset + col.len]);
                match self.func {
                    AggFn::Sum => match &v {
                        Value::Int(n) => sum_i += *n as i64,
                        Value::BigInt(n) => sum_i += *n,
                        Value::Float(n) => {
                            is_float = true;
                            sum_f += *n;
                        }
                        other => {
                            return Err(SmallError::IncompatibleType(format!(
                                "SUM requires a numeric column, got {:?}",
                                other
                            )))
                        }
                    },
                    AggFn::Min => {
                        let better = match &min_val {
                            None => true,
                            Some(cur) => super::predicate::compare_values(&v, cur)?.is_lt(),
                        };
                        if better {
                            min_val = Some(v);
                        }
                    }
                    AggFn::Max => {
                        let better = match &max_val {
                            None => true,
                            Some(cur) => super::predicate::compare_values(&v, cur)?.is_gt(),
                        };
                        if better {
                            max_val = Some(v);
                        }
                    }
                    AggFn::Count => {}
                }
            }
            self.child.next_tuple()?;
        }

        Ok(match self.func {
            AggFn::Count => count.to_string(),
            AggFn::Sum => {
                if is_float {
                    (sum_f + sum_i as f64).to_string()
                } else {
                    sum_i.to_string()
                }
            }
            AggFn::Min => match min_val {
                Some(v) => value_to_string(&v),
                None => String::new(),
            },
            AggFn::Max => match max_val {
                Some(v) => value_to_string(&v),
                None => String::new(),
            },
        })
    }
}

fn value_to_string(v: &Value) -> String {
    match v {
        Value::Int(n) => n.to_string(),
        Value::BigInt(n) => n.to_string(),
        Value::Float(n) => n.to_string(),
        Value::Char(bytes) => String::from_utf8_lossy(bytes).trim_end_matches('\0').to_string(),
        Value::Datetime(n) => n.to_string(),
    }
}

impl Executor for AggregateExecutor {
    fn begin_tuple(&mut self) -> SmallResult<()> {
        let s = self.compute()?;
        let bytes = s.into_bytes();
        self.out_cols[0].len = bytes.len();
        let schema = TableSchema {
            columns: self.out_cols.clone(),
            record_size: bytes.len(),
        };
        let tuple = Tuple::from_values(&schema, &[Value::Char(bytes)])?;
        self.result = Some(tuple);
        self.done = false;
        Ok(())
    }

    fn next_tuple(&mut self) -> SmallResult<()> {
        self.done = true;
        Ok(())
    }

    fn is_end(&self) -> bool {
        self.done
    }

    fn current_tuple(&self) -> SmallResult<Tuple> {
        Ok(self
            .result
            .clone()
            .expect("current_tuple called before begin_tuple"))
    }

    fn cols(&self) -> &[Column] {
        &self.out_cols
    }

    fn rid(&self) -> Option<Rid> {
        None
    }
}
