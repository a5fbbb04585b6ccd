//! Persisted catalog format (spec §3 "Catalog (DbMeta)", §6 "`db.meta`").
//!
//! Flushed on every DDL, loaded whole on `open_db`. One `TabMeta` per
//! table: its schema plus the indexes defined over it.

use std::{
    collections::HashMap,
    io::{Cursor, Read},
};

use crate::{
    index::IndexMeta,
    io::{Decodeable, Encodeable},
    storage::schema::TableSchema,
};

#[derive(Debug, Clone)]
pub struct TabMeta {
    pub name: String,
    pub schema: TableSchema,
    pub indexes: Vec<IndexMeta>,
}

impl TabMeta {
    pub fn new(name: &str, schema: TableSchema) -> Self {
        Self {
            name: name.to_string(),
            schema,
            indexes: Vec::new(),
        }
    }

    pub fn is_indexed(&self, cols: &[String]) -> bool {
        self.indexes.iter().any(|ix| ix.cols == cols)
    }

    pub fn index_on(&self, cols: &[String]) -> Option<&IndexMeta> {
        self.indexes.iter().find(|ix| ix.cols == cols)
    }
}

impl Encodeable for TabMeta {
    fn encode(&self) -> Vec<u8> {
        let mut buf = self.name.encode();
        buf.extend(self.schema.encode());
        buf.extend((self.indexes.len() as u32).encode());
        for ix in &self.indexes {
            buf.extend(ix.encode());
        }
        buf
    }
}

impl Decodeable for TabMeta {
    fn decode_from<R: Read>(reader: &mut R) -> Self {
        let name = String::decode_from(reader);
        let schema = TableSchema::decode_from(reader);
        let n = u32::decode_from(reader) as usize;
        let mut indexes = Vec::with_capacity(n);
        for _ in 0..n {
            indexes.push(IndexMeta::decode_from(reader));
        }
        Self {
            name,
            schema,
            indexes,
        }
    }
}

/// Root catalog object, one per open database (spec §6 "DB directory").
#[derive(Debug, Clone)]
pub struct DbMeta {
    pub name: String,
    pub tables: HashMap<String, TabMeta>,
}

impl DbMeta {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tables: HashMap::new(),
        }
    }

    pub fn is_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode()
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut cursor = Cursor::new(bytes);
        Self::decode_from(&mut cursor)
    }
}

impl Encodeable for DbMeta {
    fn encode(&self) -> Vec<u8> {
        let mut buf = self.name.encode();
        buf.extend((self.tables.len() as u32).encode());
        for tab in self.tables.values() {
            buf.extend(tab.encode());
        }
        buf
    }
}

impl Decodeable for DbMeta {
    fn decode_from<R: Read>(reader: &mut R) -> Self {
        let name = String::decode_from(reader);
        let n = u32::decode_from(reader) as usize;
        let mut tables = HashMap::with_capacity(n);
        for _ in 0..n {
            let tab = TabMeta::decode_from(reader);
            tables.insert(tab.name.clone(), tab);
        }
        Self { name, tables }
    }
}
