//! A single B+tree node's page layout (spec §3 "B+tree node layout"):
//! header + key array + value array. Leaf values are `Rid`s; internal
//! values are child page numbers. Split/merge/redistribute operate
//! purely on this in-memory view; `IxIndexHandle` wires nodes together
//! through the buffer pool.

use crate::{
    index::ix_types::{NODE_HDR_SIZE, VALUE_SLOT_SIZE},
    storage::page_id::{Rid, RM_NO_PAGE},
};

#[derive(Debug, Clone, Copy)]
pub struct NodeHeader {
    pub num_key: u32,
    pub is_leaf: bool,
    pub parent: u32,
    pub next_free_page_no: u32,
    pub prev_leaf: u32,
    pub next_leaf: u32,
}

impl NodeHeader {
    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(NODE_HDR_SIZE);
        buf.extend(self.num_key.to_le_bytes());
        buf.push(self.is_leaf as u8);
        buf.extend(self.parent.to_le_bytes());
        buf.extend(self.next_free_page_no.to_le_bytes());
        buf.extend(self.prev_leaf.to_le_bytes());
        buf.extend(self.next_leaf.to_le_bytes());
        buf
    }

    fn from_bytes(buf: &[u8]) -> Self {
        Self {
            num_key: u32::from_le_bytes(buf[0..4].try_into().unwrap()),
            is_leaf: buf[4] != 0,
            parent: u32::from_le_bytes(buf[5..9].try_into().unwrap()),
            next_free_page_no: u32::from_le_bytes(buf[9..13].try_into().unwrap()),
            prev_leaf: u32::from_le_bytes(buf[13..17].try_into().unwrap()),
            next_leaf: u32::from_le_bytes(buf[17..21].try_into().unwrap()),
        }
    }
}

/// An in-memory view of one node's bytes: keys stored as the index's
/// fixed-length comparable byte form (spec §4.3 `ix_compare`), values
/// as fixed 8-byte slots (leaf: `Rid`, internal: child page_no
/// zero-padded).
pub struct IxNode {
    pub page_no: u32,
    pub header: NodeHeader,
    pub col_tot_len: usize,
    pub max_size: usize,
    keys: Vec<u8>,
    values: Vec<u8>,
}

impl IxNode {
    pub fn new_leaf(page_no: u32, col_tot_len: usize, max_size: usize) -> Self {
        Self {
            page_no,
            header: NodeHeader {
                num_key: 0,
                is_leaf: true,
                parent: RM_NO_PAGE,
                next_free_page_no: RM_NO_PAGE,
                prev_leaf: RM_NO_PAGE,
                next_leaf: RM_NO_PAGE,
            },
            col_tot_len,
            max_size,
            keys: vec![0u8; col_tot_len * max_size],
            values: vec![0u8; VALUE_SLOT_SIZE * max_size],
        }
    }

    pub fn new_internal(page_no: u32, col_tot_len: usize, max_size: usize) -> Self {
        let mut node = Self::new_leaf(page_no, col_tot_len, max_size);
        node.header.is_leaf = false;
        node
    }

    pub fn from_bytes(page_no: u32, buf: &[u8], col_tot_len: usize, max_size: usize) -> Self {
        let header = NodeHeader::from_bytes(&buf[0..NODE_HDR_SIZE]);
        let keys_start = NODE_HDR_SIZE;
        let keys_len = col_tot_len * max_size;
        let values_start = keys_start + keys_len;
        let values_len = VALUE_SLOT_SIZE * max_size;
        Self {
            page_no,
            header,
            col_tot_len,
            max_size,
            keys: buf[keys_start..keys_start + keys_len].to_vec(),
            values: buf[values_start..values_start + values_len].to_vec(),
        }
    }

    pub fn to_bytes(&self, page_size: usize) -> Vec<u8> {
        let mut buf = self.header.to_bytes();
        buf.extend(&self.keys);
        buf.extend(&self.values);
        buf.resize(page_size, 0);
        buf
    }

    pub fn num_key(&self) -> usize {
        self.header.num_key as usize
    }

    pub fn is_leaf(&self) -> bool {
        self.header.is_leaf
    }

    pub fn is_full(&self) -> bool {
        self.num_key() >= self.max_size
    }

    pub fn key_at(&self, i: usize) -> &[u8] {
        &self.keys[i * self.col_tot_len..(i + 1) * self.col_tot_len]
    }

    pub fn first_key(&self) -> &[u8] {
        self.key_at(0)
    }

    pub fn child_at(&self, i: usize) -> u32 {
        debug_assert!(!self.is_leaf());
        let start = i * VALUE_SLOT_SIZE;
        u32::from_le_bytes(self.values[start..start + 4].try_into().unwrap())
    }

    pub fn rid_at(&self, i: usize) -> Rid {
        debug_assert!(self.is_leaf());
        let start = i * VALUE_SLOT_SIZE;
        Rid::new(
            u32::from_le_bytes(self.values[start..start + 4].try_into().unwrap()),
            u32::from_le_bytes(self.values[start + 4..start + 8].try_into().unwrap()),
        )
    }

    fn set_value_child(&mut self, i: usize, child: u32) {
        let start = i * VALUE_SLOT_SIZE;
        self.values[start..start + 4].copy_from_slice(&child.to_le_bytes());
        self.values[start + 4..start + 8].copy_from_slice(&0u32.to_le_bytes());
    }

    fn set_value_rid(&mut self, i: usize, rid: Rid) {
        let start = i * VALUE_SLOT_SIZE;
        self.values[start..start + 4].copy_from_slice(&rid.page_no.to_le_bytes());
        self.values[start + 4..start + 8].copy_from_slice(&rid.slot_no.to_le_bytes());
    }

    /// Binary search: first index `i` in `[0, num_key)` with
    /// `key_at(i) >= target` (spec §4.3 `lower_bound`).
    pub fn lower_bound(&self, target: &[u8]) -> usize {
        let (mut lo, mut hi) = (0usize, self.num_key());
        while lo < hi {
            let mid = (lo + hi) / 2;
            if self.key_at(mid) < target {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// Leaf-node `upper_bound`: first index in `[0, num_key)` with
    /// `key_at(i) > target`.
    pub fn upper_bound_leaf(&self, target: &[u8]) -> usize {
        let (mut lo, mut hi) = (0usize, self.num_key());
        while lo < hi {
            let mid = (lo + hi) / 2;
            if self.key_at(mid) <= target {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// Internal-node `upper_bound`: first index in `[1, num_key)` with
    /// `key_at(i) > target` (slot 0 holds the subtree minimum, not a
    /// discriminating separator — spec §4.3/§C).
    pub fn upper_bound_internal(&self, target: &[u8]) -> usize {
        let (mut lo, mut hi) = (1usize, self.num_key());
        while lo < hi {
            let mid = (lo + hi) / 2;
            if self.key_at(mid) <= target {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// Child index whose subtree the search key belongs to: the last
    /// child whose first key is `<= target`.
    pub fn internal_lookup(&self, target: &[u8]) -> usize {
        self.upper_bound_internal(target) - 1
    }

    fn shift_right_from(&mut self, i: usize) {
        let n = self.num_key();
        for j in (i..n).rev() {
            let (k, v) = (self.key_at(j).to_vec(), self.value_slot(j).to_vec());
            self.write_key(j + 1, &k);
            self.write_value(j + 1, &v);
        }
    }

    fn value_slot(&self, i: usize) -> &[u8] {
        &self.values[i * VALUE_SLOT_SIZE..(i + 1) * VALUE_SLOT_SIZE]
    }

    fn write_key(&mut self, i: usize, key: &[u8]) {
        self.keys[i * self.col_tot_len..(i + 1) * self.col_tot_len].copy_from_slice(key);
    }

    fn write_value(&mut self, i: usize, value: &[u8]) {
        self.values[i * VALUE_SLOT_SIZE..(i + 1) * VALUE_SLOT_SIZE].copy_from_slice(value);
    }

    pub fn insert_leaf(&mut self, i: usize, key: &[u8], rid: Rid) {
        self.shift_right_from(i);
        self.write_key(i, key);
        self.set_value_rid(i, rid);
        self.header.num_key += 1;
    }

    pub fn insert_internal(&mut self, i: usize, key: &[u8], child: u32) {
        self.shift_right_from(i);
        self.write_key(i, key);
        self.set_value_child(i, child);
        self.header.num_key += 1;
    }

    pub fn remove_at(&mut self, i: usize) {
        let n = self.num_key();
        for j in i..n - 1 {
            let (k, v) = (self.key_at(j + 1).to_vec(), self.value_slot(j + 1).to_vec());
            self.write_key(j, &k);
            self.write_value(j, &v);
        }
        self.header.num_key -= 1;
    }

    /// Splits off the upper half of this (full) node into `right`,
    /// returning the split point's key for the caller to propagate
    /// into the parent (spec §4.3 Insert step 3).
    pub fn split_into(&mut self, right: &mut IxNode) -> Vec<u8> {
        let n = self.num_key();
        let mid = n / 2;
        for (dst, src) in (mid..n).enumerate() {
            let k = self.key_at(src).to_vec();
            let v = self.value_slot(src).to_vec();
            right.write_key(dst, &k);
            right.write_value(dst, &v);
        }
        right.header.num_key = (n - mid) as u32;
        self.header.num_key = mid as u32;
        right.first_key().to_vec()
    }

    /// Appends every entry of `other` onto the end of this node
    /// (spec §4.3 Delete step 3 "merge right into left").
    pub fn absorb(&mut self, other: &IxNode) {
        let base = self.num_key();
        for i in 0..other.num_key() {
            let k = other.key_at(i).to_vec();
            let v = other.value_slot(i).to_vec();
            self.write_key(base + i, &k);
            self.write_value(base + i, &v);
        }
        self.header.num_key += other.header.num_key;
    }
}
