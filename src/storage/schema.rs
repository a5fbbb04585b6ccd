//! Table schema: column layout within a fixed-length record (spec §3
//! "Record (Tuple)"), and the catalog-facing `ColType` enum (spec §6
//! "Types: INT | BIGINT | CHAR(n) | FLOAT | DATETIME").

use std::io::Read;

use crate::io::{Decodeable, Encodeable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColType {
    Int,
    BigInt,
    Float,
    Char,
    Datetime,
}

impl ColType {
    /// Fixed on-disk width in bytes for this type; `CHAR(n)` is the one
    /// variable-width-by-declaration type, so its width is carried on
    /// `Column::len` rather than derived here.
    pub fn fixed_len(&self) -> Option<usize> {
        match self {
            ColType::Int => Some(4),
            ColType::BigInt | ColType::Datetime => Some(8),
            ColType::Float => Some(8),
            ColType::Char => None,
        }
    }

    pub fn tag(&self) -> u8 {
        match self {
            ColType::Int => 0,
            ColType::BigInt => 1,
            ColType::Float => 2,
            ColType::Char => 3,
            ColType::Datetime => 4,
        }
    }

    pub fn from_tag(tag: u8) -> Self {
        match tag {
            0 => ColType::Int,
            1 => ColType::BigInt,
            2 => ColType::Float,
            3 => ColType::Char,
            4 => ColType::Datetime,
            _ => panic!("unknown column type tag {}", tag),
        }
    }
}

impl Encodeable for ColType {
    fn encode(&self) -> Vec<u8> {
        vec![self.tag()]
    }
}

impl Decodeable for ColType {
    fn decode_from<R: Read>(reader: &mut R) -> Self {
        ColType::from_tag(u8::decode_from(reader))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub col_type: ColType,
    /// Width in bytes of this column's slot within the record.
    pub len: usize,
    /// Byte offset of this column within the record.
    pub offset: usize,
    pub indexed: bool,
}

impl Encodeable for Column {
    fn encode(&self) -> Vec<u8> {
        let mut buf = self.name.encode();
        buf.extend(self.col_type.encode());
        buf.extend((self.len as u32).encode());
        buf.extend((self.offset as u32).encode());
        buf.extend(self.indexed.encode());
        buf
    }
}

impl Decodeable for Column {
    fn decode_from<R: Read>(reader: &mut R) -> Self {
        let name = String::decode_from(reader);
        let col_type = ColType::decode_from(reader);
        let len = u32::decode_from(reader) as usize;
        let offset = u32::decode_from(reader) as usize;
        let indexed = bool::decode_from(reader);
        Self {
            name,
            col_type,
            len,
            offset,
            indexed,
        }
    }
}

/// Ordered column list plus derived total record width, assigned at
/// `CREATE TABLE` time in declaration order (spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub columns: Vec<Column>,
    pub record_size: usize,
}

impl TableSchema {
    /// Builds a schema from `(name, type, len)` triples, computing
    /// offsets in declaration order. `len` is only meaningful for
    /// `ColType::Char`; fixed-width types use their own `fixed_len()`.
    pub fn new(cols: Vec<(String, ColType, usize)>) -> Self {
        let mut offset = 0;
        let mut columns = Vec::with_capacity(cols.len());
        for (name, col_type, len) in cols {
            let width = col_type.fixed_len().unwrap_or(len);
            columns.push(Column {
                name,
                col_type,
                len: width,
                offset,
                indexed: false,
            });
            offset += width;
        }
        Self {
            record_size: offset,
            columns,
        }
    }

    pub fn col_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn col(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn mark_indexed(&mut self, names: &[String]) {
        for name in names {
            if let Some(c) = self.columns.iter_mut().find(|c| &c.name == name) {
                c.indexed = true;
            }
        }
    }
}

impl Encodeable for TableSchema {
    fn encode(&self) -> Vec<u8> {
        let mut buf = (self.columns.len() as u32).encode();
        for c in &self.columns {
            buf.extend(c.encode());
        }
        buf.extend((self.record_size as u32).encode());
        buf
    }
}

impl Decodeable for TableSchema {
    fn decode_from<R: Read>(reader: &mut R) -> Self {
        let n = u32::decode_from(reader) as usize;
        let mut columns = Vec::with_capacity(n);
        for _ in 0..n {
            columns.push(Column::decode_from(reader));
        }
        let record_size = u32::decode_from(reader) as usize;
        Self {
            columns,
            record_size,
        }
    }
}
