//! Write-ahead log record format (spec §4.5): a tagged union replacing
//! the source's `LogRecord` class hierarchy (spec §9 "Log-record
//! polymorphism") — no virtual dispatch, serialize writes header then
//! body matching the tag, deserialize switches on `log_type`.

use std::io::{Cursor, Read};

use crate::{
    io::{Decodeable, Encodeable},
    storage::page_id::Rid,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogType {
    Begin = 0,
    Commit = 1,
    Abort = 2,
    Insert = 3,
    Delete = 4,
    Update = 5,
}

impl LogType {
    fn from_u32(v: u32) -> Self {
        match v {
            0 => LogType::Begin,
            1 => LogType::Commit,
            2 => LogType::Abort,
            3 => LogType::Insert,
            4 => LogType::Delete,
            5 => LogType::Update,
            other => panic!("unknown log record type tag {}", other),
        }
    }
}

#[derive(Debug, Clone)]
pub enum LogBody {
    Begin,
    Commit,
    Abort,
    Insert {
        record: Vec<u8>,
        rid: Rid,
        table: String,
        /// Recovery places the record at `rid` (compensating insert)
        /// instead of the next free slot when this is set (spec
        /// §4.5).
        is_rollback: bool,
    },
    Delete {
        record: Vec<u8>,
        rid: Rid,
        table: String,
    },
    Update {
        before: Vec<u8>,
        after: Vec<u8>,
        rid: Rid,
        table: String,
    },
}

/// header = `{log_type: u32, lsn: i32, total_len: u32, txn_id: i32,
/// prev_lsn: i32}` then a type-specific body. `lsn` and `prev_lsn` are
/// kept as `i64` in memory (matching the log manager's `AtomicU64`
/// counter) and narrowed to an on-wire `i32` at serialization.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub lsn: i64,
    pub txn_id: u32,
    pub prev_lsn: i64,
    pub body: LogBody,
}

const HEADER_SIZE: usize = 4 + 4 + 4 + 4 + 4;

impl LogRecord {
    pub fn log_type(&self) -> LogType {
        match &self.body {
            LogBody::Begin => LogType::Begin,
            LogBody::Commit => LogType::Commit,
            LogBody::Abort => LogType::Abort,
            LogBody::Insert { .. } => LogType::Insert,
            LogBody::Delete { .. } => LogType::Delete,
            LogBody::Update { .. } => LogType::Update,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();
        match &self.body {
            LogBody::Begin | LogBody::Commit | LogBody::Abort => {}
            LogBody::Insert {
                record,
                rid,
                table,
                is_rollback,
            } => {
                body.extend((record.len() as i32).encode());
                body.extend_from_slice(record);
                body.extend(rid.encode());
                body.extend((table.len() as u32).encode());
                body.extend_from_slice(table.as_bytes());
                body.extend(is_rollback.encode());
            }
            LogBody::Delete { record, rid, table } => {
                body.extend((record.len() as i32).encode());
                body.extend_from_slice(record);
                body.extend(rid.encode());
                body.extend((table.len() as u32).encode());
                body.extend_from_slice(table.as_bytes());
            }
            LogBody::Update {
                before,
                after,
                rid,
                table,
            } => {
                body.extend((before.len() as i32).encode());
                body.extend_from_slice(before);
                body.extend((after.len() as i32).encode());
                body.extend_from_slice(after);
                body.extend(rid.encode());
                body.extend((table.len() as u32).encode());
                body.extend_from_slice(table.as_bytes());
            }
        }

        let total_len = (HEADER_SIZE + body.len()) as u32;
        let mut buf = Vec::with_capacity(total_len as usize);
        buf.extend((self.log_type() as u32).encode());
        buf.extend((self.lsn as i32).encode());
        buf.extend(total_len.encode());
        buf.extend((self.txn_id as i32).encode());
        buf.extend((self.prev_lsn as i32).encode());
        buf.extend(body);
        buf
    }

    /// Peeks the header's `total_len` field and decodes exactly that
    /// many bytes, returning the record and the number of bytes
    /// consumed — used by recovery's analyze pass to walk the log file
    /// without a separate framing format.
    pub fn decode_one(bytes: &[u8]) -> (Self, usize) {
        let total_len = u32::from_le_bytes(bytes[8..12].try_into().unwrap()) as usize;
        (Self::decode(&bytes[..total_len]), total_len)
    }

    pub fn decode(bytes: &[u8]) -> Self {
        let mut cursor = Cursor::new(bytes);
        let log_type = LogType::from_u32(u32::decode_from(&mut cursor));
        let lsn = i32::decode_from(&mut cursor) as i64;
        let _total_len = u32::decode_from(&mut cursor);
        let txn_id = i32::decode_from(&mut cursor) as u32;
        let prev_lsn = i32::decode_from(&mut cursor) as i64;

        let body = match log_type {
            LogType::Begin => LogBody::Begin,
            LogType::Commit => LogBody::Commit,
            LogType::Abort => LogBody::Abort,
            LogType::Insert => {
                let record = read_sized_bytes(&mut cursor);
                let rid = Rid::decode_from(&mut cursor);
                let table = read_name(&mut cursor);
                let is_rollback = bool::decode_from(&mut cursor);
                LogBody::Insert {
                    record,
                    rid,
                    table,
                    is_rollback,
                }
            }
            LogType::Delete => {
                let record = read_sized_bytes(&mut cursor);
                let rid = Rid::decode_from(&mut cursor);
                let table = read_name(&mut cursor);
                LogBody::Delete { record, rid, table }
            }
            LogType::Update => {
                let before = read_sized_bytes(&mut cursor);
                let after = read_sized_bytes(&mut cursor);
                let rid = Rid::decode_from(&mut cursor);
                let table = read_name(&mut cursor);
                LogBody::Update {
                    before,
                    after,
                    rid,
                    table,
                }
            }
        };

        Self {
            lsn,
            txn_id,
            prev_lsn,
            body,
        }
    }
}

fn read_sized_bytes(cursor: &mut Cursor<&[u8]>) -> Vec<u8> {
    let len = i32::decode_from(cursor) as usize;
    let mut buf = vec![0u8; len];
    cursor.read_exact(&mut buf).expect("truncated log record");
    buf
}

fn read_name(cursor: &mut Cursor<&[u8]>) -> String {
    let len = u32::decode_from(cursor) as usize;
    let mut buf = vec![0u8; len];
    cursor.read_exact(&mut buf).expect("truncated log record");
    String::from_utf8(buf).expect("non-utf8 table name in log record")
}
