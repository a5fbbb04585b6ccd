//! Typed column values and fixed-length record (tuple) encoding (spec
//! §3). A record is an opaque byte buffer; `Value`/`Tuple` are the
//! typed view executors and the catalog operate on above that buffer.

use crate::{
    error::{SmallError, SmallResult},
    storage::schema::{ColType, TableSchema},
    utils::datetime,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i32),
    BigInt(i64),
    Float(f64),
    Char(Vec<u8>),
    Datetime(i64),
}

impl Value {
    pub fn col_type(&self) -> ColType {
        match self {
            Value::Int(_) => ColType::Int,
            Value::BigInt(_) => ColType::BigInt,
            Value::Float(_) => ColType::Float,
            Value::Char(_) => ColType::Char,
            Value::Datetime(_) => ColType::Datetime,
        }
    }

    /// Encodes this value into exactly `len` bytes. `CHAR` values are
    /// right-padded with NUL bytes; numeric types ignore `len` (it
    /// always matches their fixed width).
    pub fn to_bytes(&self, len: usize) -> Vec<u8> {
        match self {
            Value::Int(v) => v.to_le_bytes().to_vec(),
            Value::BigInt(v) => v.to_le_bytes().to_vec(),
            Value::Float(v) => v.to_le_bytes().to_vec(),
            Value::Datetime(v) => v.to_le_bytes().to_vec(),
            Value::Char(bytes) => {
                let mut buf = bytes.clone();
                buf.resize(len, 0);
                buf.truncate(len);
                buf
            }
        }
    }

    pub fn from_bytes(col_type: ColType, bytes: &[u8]) -> Self {
        match col_type {
            ColType::Int => Value::Int(i32::from_le_bytes(bytes.try_into().unwrap())),
            ColType::BigInt => Value::BigInt(i64::from_le_bytes(bytes.try_into().unwrap())),
            ColType::Float => Value::Float(f64::from_le_bytes(bytes.try_into().unwrap())),
            ColType::Datetime => Value::Datetime(i64::from_le_bytes(bytes.try_into().unwrap())),
            ColType::Char => Value::Char(bytes.to_vec()),
        }
    }

    /// Type coercion accepted at DML boundaries (spec §4.8 Insert):
    /// BIGINT -> INT downcast when the declared column is INT, and
    /// STRING literal -> DATETIME via the packed-decimal parser.
    pub fn coerce_to(&self, target: ColType) -> SmallResult<Value> {
        if self.col_type() == target {
            return Ok(self.clone());
        }
        match (self, target) {
            (Value::BigInt(v), ColType::Int) => {
                if *v < i32::MIN as i64 || *v > i32::MAX as i64 {
                    return Err(SmallError::IncompatibleType(
                        "BIGINT value out of INT range".into(),
                    ));
                }
                Ok(Value::Int(*v as i32))
            }
            (Value::Int(v), ColType::BigInt) => Ok(Value::BigInt(*v as i64)),
            (Value::Char(bytes), ColType::Datetime) => {
                let s = String::from_utf8_lossy(bytes);
                let s = s.trim_end_matches('\0');
                Ok(Value::Datetime(datetime::parse(s)?))
            }
            _ => Err(SmallError::IncompatibleType(format!(
                "cannot coerce {:?} to {:?}",
                self.col_type(),
                target
            ))),
        }
    }

    pub fn as_comparable_bytes(&self, len: usize) -> Vec<u8> {
        match self {
            // Signed integers are stored little-endian; flip to a
            // byte-comparable form (big-endian, sign bit flipped) so
            // key comparison in the B+tree can memcmp.
            Value::Int(v) => {
                let mut b = (*v as u32 ^ 0x8000_0000).to_be_bytes().to_vec();
                b.resize(len.max(b.len()), 0);
                b
            }
            Value::BigInt(v) | Value::Datetime(v) => {
                let mut b = (*v as u64 ^ 0x8000_0000_0000_0000)
                    .to_be_bytes()
                    .to_vec();
                b.resize(len.max(b.len()), 0);
                b
            }
            Value::Float(v) => {
                let bits = v.to_bits();
                let flipped = if *v >= 0.0 {
                    bits ^ 0x8000_0000_0000_0000
                } else {
                    !bits
                };
                flipped.to_be_bytes().to_vec()
            }
            Value::Char(bytes) => self.to_bytes(len),
        }
    }
}

/// A fixed-length record: the raw bytes plus the schema used to index
/// into them. Columns occupy contiguous offsets in declaration order
/// (spec §3); there is no null bitmap.
#[derive(Debug, Clone)]
pub struct Tuple {
    pub bytes: Vec<u8>,
}

impl Tuple {
    pub fn from_values(schema: &TableSchema, values: &[Value]) -> SmallResult<Self> {
        if values.len() != schema.columns.len() {
            return Err(SmallError::InvalidValueCount {
                expected: schema.columns.len(),
                got: values.len(),
            });
        }
        let mut bytes = vec![0u8; schema.record_size];
        for (col, value) in schema.columns.iter().zip(values.iter()) {
            let coerced = value.coerce_to(col.col_type)?;
            let encoded = coerced.to_bytes(col.len);
            bytes[col.offset..col.offset + col.len].copy_from_slice(&encoded);
        }
        Ok(Self { bytes })
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn get(&self, schema: &TableSchema, col_name: &str) -> SmallResult<Value> {
        let col = schema
            .col(col_name)
            .ok_or_else(|| SmallError::ColumnNotFound(col_name.to_string()))?;
        Ok(Value::from_bytes(
            col.col_type,
            &self.bytes[col.offset..col.offset + col.len],
        ))
    }

    pub fn get_at(&self, schema: &TableSchema, idx: usize) -> Value {
        let col = &schema.columns[idx];
        Value::from_bytes(col.col_type, &self.bytes[col.offset..col.offset + col.len])
    }

    pub fn set(&mut self, schema: &TableSchema, col_name: &str, value: Value) -> SmallResult<()> {
        let col = schema
            .col(col_name)
            .ok_or_else(|| SmallError::ColumnNotFound(col_name.to_string()))?;
        let coerced = value.coerce_to(col.col_type)?;
        let encoded = coerced.to_bytes(col.len);
        self.bytes[col.offset..col.offset + col.len].copy_from_slice(&encoded);
        Ok(())
    }

    pub fn values(&self, schema: &TableSchema) -> Vec<Value> {
        schema
            .columns
            .iter()
            .map(|c| Value::from_bytes(c.col_type, &self.bytes[c.offset..c.offset + c.len]))
            .collect()
    }
}
