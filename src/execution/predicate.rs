//! Condition evaluation (spec §4.8): `eval_conds(cols, conds, rec)` is
//! the AND of binary comparisons `{=, ≠, <, >, ≤, ≥}` between a column
//! and either a literal value or another column of the same record.

use std::cmp::Ordering;

use crate::{
    error::{SmallError, SmallResult},
    storage::schema::Column,
    storage::tuple::Value,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CondOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

#[derive(Debug, Clone)]
pub enum CondRhs {
    Value(Value),
    Column(String),
}

/// Normalized so `lhs_col` always names a column of the scanned table
/// (spec §4.8 IndexScan "Condition normalization also swaps sides so
/// lhs refers to the scanned table").
#[derive(Debug, Clone)]
pub struct Condition {
    pub lhs_col: String,
    pub op: CondOp,
    pub rhs: CondRhs,
}

impl Condition {
    pub fn new(lhs_col: impl Into<String>, op: CondOp, rhs: CondRhs) -> Self {
        Self {
            lhs_col: lhs_col.into(),
            op,
            rhs,
        }
    }

    /// Flips a comparison operator for `rhs OP lhs` -> `lhs OP' rhs`.
    pub fn flip(op: CondOp) -> CondOp {
        match op {
            CondOp::Eq => CondOp::Eq,
            CondOp::Ne => CondOp::Ne,
            CondOp::Lt => CondOp::Gt,
            CondOp::Gt => CondOp::Lt,
            CondOp::Le => CondOp::Ge,
            CondOp::Ge => CondOp::Le,
        }
    }
}

pub fn compare_values(a: &Value, b: &Value) -> SmallResult<Ordering> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(x.cmp(y)),
        (Value::BigInt(x), Value::BigInt(y)) => Ok(x.cmp(y)),
        (Value::Datetime(x), Value::Datetime(y)) => Ok(x.cmp(y)),
        (Value::Char(x), Value::Char(y)) => Ok(x.cmp(y)),
        (Value::Float(x), Value::Float(y)) => x
            .partial_cmp(y)
            .ok_or_else(|| SmallError::internal("NaN in comparison")),
        // Mixed numeric literals (e.g. an INT column against a BIGINT
        // literal) are coerced to the widest representation before
        // comparing.
        (Value::Int(x), Value::BigInt(y)) => Ok((*x as i64).cmp(y)),
        (Value::BigInt(x), Value::Int(y)) => Ok(x.cmp(&(*y as i64))),
        _ => Err(SmallError::IncompatibleType(format!(
            "cannot compare {:?} with {:?}",
            a, b
        ))),
    }
}

fn eval_one(cols: &[Column], cond: &Condition, record: &[u8]) -> SmallResult<bool> {
    let lhs_col = cols
        .iter()
        .find(|c| c.name == cond.lhs_col)
        .ok_or_else(|| SmallError::ColumnNotFound(cond.lhs_col.clone()))?;
    let lhs = Value::from_bytes(lhs_col.col_type, &record[lhs_col.offset..lhs_col.offset + lhs_col.len]);

    let rhs = match &cond.rhs {
        CondRhs::Value(v) => v.clone(),
        CondRhs::Column(name) => {
            let rhs_col = cols
                .iter()
                .find(|c| &c.name == name)
                .ok_or_else(|| SmallError::ColumnNotFound(name.clone()))?;
            Value::from_bytes(rhs_col.col_type, &record[rhs_col.offset..rhs_col.offset + rhs_col.len])
        }
    };

    let ordering = compare_values(&lhs, &rhs)?;
    Ok(match cond.op {
        CondOp::Eq => ordering == Ordering::Equal,
        CondOp::Ne => ordering != Ordering::Equal,
        CondOp::Lt => ordering == Ordering::Less,
        CondOp::Gt => ordering == Ordering::Greater,
        CondOp::Le => ordering != Ordering::Greater,
        CondOp::Ge => ordering != Ordering::Less,
    })
}

pub fn eval_conds(cols: &[Column], conds: &[Condition], record: &[u8]) -> SmallResult<bool> {
    for cond in conds {
        if !eval_one(cols, cond, record)? {
            return Ok(false);
        }
    }
    Ok(true)
}
