//! Hand-rolled binary (de)serialization for the on-disk formats this
//! crate uses exactly (heap pages, B+tree nodes, WAL records, the
//! catalog file). These byte layouts are part of the on-disk contract,
//! so `serde` would be the wrong tool: an `Encodeable`/`Decodeable`
//! pair gives each format direct control over its own byte-for-byte
//! representation.

use std::{
    convert::TryInto,
    fs::{File, OpenOptions},
    io::{Cursor, Read, Seek, SeekFrom, Write},
    mem::size_of,
    path::Path,
    sync::{Mutex, MutexGuard},
};

use bit_vec::BitVec;

use crate::error::{SmallError, SmallResult};

pub trait Encodeable {
    fn encode(&self) -> Vec<u8>;
}

pub trait Decodeable: Sized {
    fn decode_from<R: Read>(reader: &mut R) -> Self;
}

pub fn read_exact<R: Read>(reader: &mut R, n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    reader
        .read_exact(&mut buf)
        .unwrap_or_else(|_| panic!("io error, expected {} bytes", n));
    buf
}

pub fn read_into<T: Decodeable, R: Read>(reader: &mut R) -> T {
    T::decode_from(reader)
}

macro_rules! impl_numeric {
    (for $($t:ty),+) => {
        $(
            impl Encodeable for $t {
                fn encode(&self) -> Vec<u8> {
                    self.to_le_bytes().to_vec()
                }
            }

            impl Decodeable for $t {
                fn decode_from<R: Read>(reader: &mut R) -> Self {
                    let bytes = read_exact(reader, size_of::<Self>());
                    Self::from_le_bytes(bytes.try_into().unwrap())
                }
            }
        )*
    }
}

impl_numeric!(for u8, u16, u32, u64, i8, i16, i32, i64, isize, usize, f32, f64);

impl Encodeable for bool {
    fn encode(&self) -> Vec<u8> {
        vec![*self as u8]
    }
}

impl Decodeable for bool {
    fn decode_from<R: Read>(reader: &mut R) -> Self {
        u8::decode_from(reader) == 1
    }
}

/// Format: 4-byte little-endian length prefix, then the raw bytes.
impl Encodeable for Vec<u8> {
    fn encode(&self) -> Vec<u8> {
        let mut buf = (self.len() as u32).to_le_bytes().to_vec();
        buf.extend_from_slice(self);
        buf
    }
}

impl Decodeable for Vec<u8> {
    fn decode_from<R: Read>(reader: &mut R) -> Self {
        let len = u32::decode_from(reader) as usize;
        read_exact(reader, len)
    }
}

impl Encodeable for String {
    fn encode(&self) -> Vec<u8> {
        self.as_bytes().to_vec().encode()
    }
}

impl Decodeable for String {
    fn decode_from<R: Read>(reader: &mut R) -> Self {
        let bytes = Vec::<u8>::decode_from(reader);
        String::from_utf8(bytes).expect("non-utf8 string in on-disk format")
    }
}

/// Format: 2-byte length prefix (byte count, not bit count), then the
/// packed bytes. Used for slotted-page / B+tree-node occupancy bitmaps.
impl Encodeable for BitVec<u32> {
    fn encode(&self) -> Vec<u8> {
        let payload = self.to_bytes();
        let mut buf = (payload.len() as u16).to_le_bytes().to_vec();
        buf.extend_from_slice(&payload);
        buf
    }
}

impl Decodeable for BitVec<u32> {
    fn decode_from<R: Read>(reader: &mut R) -> Self {
        let len = u16::decode_from(reader) as usize;
        let buf = read_exact(reader, len);
        BitVec::from_bytes(&buf)
    }
}

/// An append/seek-friendly wrapper around a `File`, mutex-guarded so
/// the log manager and heap/B+tree file handles can share one instance
/// behind an `Arc` without re-opening the file per operation.
pub struct SmallFile {
    file: Mutex<File>,
}

impl SmallFile {
    pub fn open<P: AsRef<Path>>(path: P) -> SmallResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    pub fn get(&self) -> MutexGuard<'_, File> {
        self.file.lock().unwrap()
    }

    pub fn len(&self) -> SmallResult<u64> {
        Ok(self.get().metadata()?.len())
    }

    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> SmallResult<()> {
        let mut file = self.get();
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)?;
        Ok(())
    }

    pub fn write_at(&self, offset: u64, buf: &[u8]) -> SmallResult<()> {
        let mut file = self.get();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(buf)?;
        Ok(())
    }

    pub fn append(&self, buf: &[u8]) -> SmallResult<u64> {
        let mut file = self.get();
        let offset = file.seek(SeekFrom::End(0))?;
        file.write_all(buf)?;
        Ok(offset)
    }

    pub fn sync(&self) -> SmallResult<()> {
        self.get().sync_all().map_err(SmallError::from)
    }

    pub fn set_len(&self, len: u64) -> SmallResult<()> {
        self.get().set_len(len).map_err(SmallError::from)
    }
}

/// Accumulates a byte buffer for a single record (page, log record,
/// ...) before it is written to disk in one shot.
#[derive(Default)]
pub struct SmallWriter {
    buf: Vec<u8>,
}

impl SmallWriter {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn write<T: Encodeable>(&mut self, obj: &T) {
        self.buf.extend_from_slice(&obj.encode());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.buf.clone()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn size(&self) -> usize {
        self.buf.len()
    }

    /// Pad (or panic if the buffer already exceeds `size`) to fit a
    /// fixed-size slot, e.g. a record's slot in a heap page.
    pub fn to_padded_bytes(&self, size: usize) -> Vec<u8> {
        let mut buf = self.buf.clone();
        assert!(
            buf.len() <= size,
            "encoded buffer ({} bytes) larger than target slot ({} bytes)",
            buf.len(),
            size
        );
        buf.resize(size, 0);
        buf
    }
}

/// A `Cursor<&[u8]>` wrapper used where call sites want the
/// `Decodeable` machinery over an in-memory record without pulling in
/// `std::io::Cursor` at every call site.
pub struct SmallReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> SmallReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(bytes),
        }
    }

    pub fn read<T: Decodeable>(&mut self) -> T {
        T::decode_from(&mut self.cursor)
    }

    pub fn read_bytes(&mut self, n: usize) -> Vec<u8> {
        read_exact(&mut self.cursor, n)
    }

    pub fn position(&self) -> u64 {
        self.cursor.position()
    }
}
