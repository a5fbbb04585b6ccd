//! Shared B+tree constants and the catalog-facing `IndexMeta` (spec §3
//! "B+tree node layout", §6 index file naming).

use std::io::Read;

use crate::{
    io::{Decodeable, Encodeable},
    storage::schema::ColType,
};

/// Bytes per leaf/internal slot header: `num_key, is_leaf, parent,
/// next_free_page_no, prev_leaf, next_leaf`.
pub const NODE_HDR_SIZE: usize = 4 + 1 + 4 + 4 + 4 + 4;

/// Leaf values are `Rid`, internal values are a child `page_no`; both
/// fit in 8 bytes, so every node uses one fixed value-slot width and
/// internal nodes zero-pad the upper 4 bytes.
pub const VALUE_SLOT_SIZE: usize = 8;

pub fn max_size(page_size: usize, col_tot_len: usize) -> usize {
    (page_size - NODE_HDR_SIZE) / (col_tot_len + VALUE_SLOT_SIZE)
}

pub fn min_size(max_size: usize) -> usize {
    (max_size + 1) / 2
}

/// Per-index metadata persisted in the catalog (spec §3 "Catalog
/// (DbMeta)"): the ordered column list making up the composite key and
/// its total byte length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMeta {
    pub table_name: String,
    pub cols: Vec<String>,
    pub col_types: Vec<ColType>,
    pub col_lens: Vec<usize>,
    pub col_tot_len: usize,
}

impl IndexMeta {
    pub fn new(table_name: &str, cols: Vec<(String, ColType, usize)>) -> Self {
        let col_tot_len = cols.iter().map(|(_, _, l)| *l).sum();
        let (names, types, lens) = cols.into_iter().fold(
            (Vec::new(), Vec::new(), Vec::new()),
            |(mut n, mut t, mut l), (name, ty, len)| {
                n.push(name);
                t.push(ty);
                l.push(len);
                (n, t, l)
            },
        );
        Self {
            table_name: table_name.to_string(),
            cols: names,
            col_types: types,
            col_lens: lens,
            col_tot_len,
        }
    }

    /// Filename the catalog assigns this index (spec §6 file formats):
    /// `<table>_<col1>[_<col2>...].idx`.
    pub fn file_name(&self) -> String {
        format!("{}_{}.idx", self.table_name, self.cols.join("_"))
    }
}

impl Encodeable for IndexMeta {
    fn encode(&self) -> Vec<u8> {
        let mut buf = self.table_name.encode();
        buf.extend((self.cols.len() as u32).encode());
        for ((name, ty), len) in self
            .cols
            .iter()
            .zip(self.col_types.iter())
            .zip(self.col_lens.iter())
        {
            buf.extend(name.encode());
            buf.extend(ty.encode());
            buf.extend((*len as u32).encode());
        }
        buf
    }
}

impl Decodeable for IndexMeta {
    fn decode_from<R: Read>(reader: &mut R) -> Self {
        let table_name = String::decode_from(reader);
        let n = u32::decode_from(reader) as usize;
        let mut cols = Vec::with_capacity(n);
        let mut col_types = Vec::with_capacity(n);
        let mut col_lens = Vec::with_capacity(n);
        for _ in 0..n {
            cols.push(String::decode_from(reader));
            col_types.push(ColType::decode_from(reader));
            col_lens.push(u32::decode_from(reader) as usize);
        }
        let col_tot_len = col_lens.iter().sum();
        Self {
            table_name,
            cols,
            col_types,
            col_lens,
            col_tot_len,
        }
    }
}
