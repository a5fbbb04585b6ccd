//! `IxIndexHandle` (spec §4.3): tree-wide search/insert/delete guarded
//! by a single `root_latch`, plus the composite-key byte builder
//! (`ix_compare`'s counterpart — comparison is plain `memcmp` once
//! values are encoded via `Value::as_comparable_bytes`).

use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use crate::{
    error::{SmallError, SmallResult},
    index::{
        ix_types::{max_size, min_size, IndexMeta, VALUE_SLOT_SIZE},
        node::IxNode,
    },
    storage::{
        buffer_pool::BufferPool,
        disk_manager::DiskManager,
        page_id::{Fd, Iid, PageId, Rid, RM_NO_PAGE},
        tuple::Value,
    },
};

/// Page 0 of an index file.
#[derive(Debug, Clone, Copy)]
struct IxFileHeader {
    root_page: u32,
    num_pages: u32,
    first_free_page_no: u32,
    col_tot_len: u32,
    max_size: u32,
    min_size: u32,
}

impl IxFileHeader {
    fn to_bytes(&self, page_size: usize) -> Vec<u8> {
        let mut buf = Vec::with_capacity(page_size);
        buf.extend(self.root_page.to_le_bytes());
        buf.extend(self.num_pages.to_le_bytes());
        buf.extend(self.first_free_page_no.to_le_bytes());
        buf.extend(self.col_tot_len.to_le_bytes());
        buf.extend(self.max_size.to_le_bytes());
        buf.extend(self.min_size.to_le_bytes());
        buf.resize(page_size, 0);
        buf
    }

    fn from_bytes(buf: &[u8]) -> Self {
        Self {
            root_page: u32::from_le_bytes(buf[0..4].try_into().unwrap()),
            num_pages: u32::from_le_bytes(buf[4..8].try_into().unwrap()),
            first_free_page_no: u32::from_le_bytes(buf[8..12].try_into().unwrap()),
            col_tot_len: u32::from_le_bytes(buf[12..16].try_into().unwrap()),
            max_size: u32::from_le_bytes(buf[16..20].try_into().unwrap()),
            min_size: u32::from_le_bytes(buf[20..24].try_into().unwrap()),
        }
    }
}

/// Builds the fixed-length comparable key bytes for `values` under
/// `meta`'s column order (spec §4.3 composite key = concatenation of
/// column bytes in index-definition order).
pub fn build_key(meta: &IndexMeta, values: &[Value]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(meta.col_tot_len);
    for (value, len) in values.iter().zip(meta.col_lens.iter()) {
        buf.extend(value.as_comparable_bytes(*len));
    }
    buf
}

pub struct IxIndexHandle {
    pub meta: IndexMeta,
    fd: Fd,
    disk: Arc<DiskManager>,
    buffer_pool: Arc<BufferPool>,
    page_size: usize,
    header: Mutex<IxFileHeader>,
    /// Single tree-wide mutex guarding every public operation
    /// end-to-end (spec §4.3 "Concurrency (as-designed)"). Finer
    /// latch-crabbing is allowed but not required.
    root_latch: Mutex<()>,
}

impl IxIndexHandle {
    pub fn create<P: AsRef<Path>>(
        path: P,
        meta: IndexMeta,
        disk: Arc<DiskManager>,
        buffer_pool: Arc<BufferPool>,
        page_size: usize,
    ) -> SmallResult<Self> {
        let fd = disk.open_file(path)?;
        let ms = max_size(page_size, meta.col_tot_len);
        let header = IxFileHeader {
            root_page: RM_NO_PAGE,
            num_pages: 1,
            first_free_page_no: RM_NO_PAGE,
            col_tot_len: meta.col_tot_len as u32,
            max_size: ms as u32,
            min_size: min_size(ms) as u32,
        };
        let (pid, _) = buffer_pool.new_page(fd)?;
        debug_assert_eq!(pid.page_no, 0);
        buffer_pool.write_page(pid, &header.to_bytes(page_size))?;
        buffer_pool.unpin_page(pid, true)?;

        Ok(Self {
            meta,
            fd,
            disk,
            buffer_pool,
            page_size,
            header: Mutex::new(header),
            root_latch: Mutex::new(()),
        })
    }

    pub fn open<P: AsRef<Path>>(
        path: P,
        meta: IndexMeta,
        disk: Arc<DiskManager>,
        buffer_pool: Arc<BufferPool>,
        page_size: usize,
    ) -> SmallResult<Self> {
        let fd = disk.open_file(path)?;
        let bytes = buffer_pool.fetch_page(PageId::new(fd, 0))?;
        buffer_pool.unpin_page(PageId::new(fd, 0), false)?;
        let header = IxFileHeader::from_bytes(&bytes);
        Ok(Self {
            meta,
            fd,
            disk,
            buffer_pool,
            page_size,
            header: Mutex::new(header),
            root_latch: Mutex::new(()),
        })
    }

    fn col_tot_len(&self) -> usize {
        self.header.lock().unwrap().col_tot_len as usize
    }

    fn max_size(&self) -> usize {
        self.header.lock().unwrap().max_size as usize
    }

    fn min_size(&self) -> usize {
        self.header.lock().unwrap().min_size as usize
    }

    fn fetch_node(&self, page_no: u32) -> SmallResult<IxNode> {
        let bytes = self.buffer_pool.fetch_page(PageId::new(self.fd, page_no))?;
        Ok(IxNode::from_bytes(
            page_no,
            &bytes,
            self.col_tot_len(),
            self.max_size(),
        ))
    }

    fn write_node(&self, node: &IxNode) -> SmallResult<()> {
        let pid = PageId::new(self.fd, node.page_no);
        self.buffer_pool.write_page(pid, &node.to_bytes(self.page_size))?;
        self.buffer_pool.unpin_page(pid, true)
    }

    fn release_node(&self, page_no: u32) -> SmallResult<()> {
        self.buffer_pool.unpin_page(PageId::new(self.fd, page_no), false)
    }

    /// Allocates a fresh node page, preferring the recycled free-list
    /// over growing the file (spec §9 SHOULD / SPEC_FULL §E.3).
    fn allocate_node(&self, is_leaf: bool) -> SmallResult<IxNode> {
        let mut header = self.header.lock().unwrap();
        let page_no = if header.first_free_page_no != RM_NO_PAGE {
            let recycled = header.first_free_page_no;
            let node = self.fetch_node(recycled)?;
            header.first_free_page_no = node.header.next_free_page_no;
            self.release_node(recycled)?;
            recycled
        } else {
            let (pid, _) = self.buffer_pool.new_page(self.fd)?;
            header.num_pages += 1;
            pid.page_no
        };
        drop(header);
        let node = if is_leaf {
            IxNode::new_leaf(page_no, self.col_tot_len(), self.max_size())
        } else {
            IxNode::new_internal(page_no, self.col_tot_len(), self.max_size())
        };
        Ok(node)
    }

    fn free_node(&self, page_no: u32) -> SmallResult<()> {
        let mut header = self.header.lock().unwrap();
        let mut node = self.fetch_node(page_no)?;
        node.header.next_free_page_no = header.first_free_page_no;
        header.first_free_page_no = page_no;
        self.write_node(&node)
    }

    fn flush_header(&self) -> SmallResult<()> {
        let header = *self.header.lock().unwrap();
        let pid = PageId::new(self.fd, 0);
        self.buffer_pool.write_page(pid, &header.to_bytes(self.page_size))
    }

    fn root_page(&self) -> u32 {
        self.header.lock().unwrap().root_page
    }

    /// Descends from the root to the leaf that would contain `key`,
    /// returning its page number. The path of internal pages visited
    /// is released as we descend (the coarse `root_latch` already
    /// protects the whole walk, so we don't need to keep ancestors
    /// pinned for a latch-crabbing protocol).
    fn find_leaf(&self, key: &[u8]) -> SmallResult<u32> {
        let mut page_no = self.root_page();
        loop {
            let node = self.fetch_node(page_no)?;
            if node.is_leaf() {
                self.release_node(page_no)?;
                return Ok(page_no);
            }
            let idx = node.internal_lookup(key);
            let child = node.child_at(idx);
            self.release_node(page_no)?;
            page_no = child;
        }
    }

    pub fn lower_bound(&self, key: &[u8]) -> SmallResult<Iid> {
        let _guard = self.root_latch.lock().unwrap();
        if self.root_page() == RM_NO_PAGE {
            return Ok(Iid::invalid());
        }
        let leaf_no = self.find_leaf(key)?;
        let node = self.fetch_node(leaf_no)?;
        let slot = node.lower_bound(key);
        self.release_node(leaf_no)?;
        Ok(Iid::new(leaf_no, slot as u32))
    }

    /// `inclusive=true` -> position is first key strictly greater than
    /// `key`; `inclusive=false` -> first key `>= key` (spec §9 Open
    /// Questions, resolved per SPEC_FULL §E.1).
    pub fn upper_bound(&self, key: &[u8], inclusive: bool) -> SmallResult<Iid> {
        let _guard = self.root_latch.lock().unwrap();
        if self.root_page() == RM_NO_PAGE {
            return Ok(Iid::invalid());
        }
        let leaf_no = self.find_leaf(key)?;
        let node = self.fetch_node(leaf_no)?;
        let slot = if inclusive {
            node.upper_bound_leaf(key)
        } else {
            node.lower_bound(key)
        };
        self.release_node(leaf_no)?;
        Ok(Iid::new(leaf_no, slot as u32))
    }

    pub fn get_value(&self, key: &[u8]) -> SmallResult<Option<Rid>> {
        let _guard = self.root_latch.lock().unwrap();
        if self.root_page() == RM_NO_PAGE {
            return Ok(None);
        }
        let leaf_no = self.find_leaf(key)?;
        let node = self.fetch_node(leaf_no)?;
        let slot = node.lower_bound(key);
        let found = slot < node.num_key() && node.key_at(slot) == key;
        let rid = if found { Some(node.rid_at(slot)) } else { None };
        self.release_node(leaf_no)?;
        Ok(rid)
    }

    /// Returns `false` on duplicate key (spec §4.3 Insert step 2).
    pub fn insert_entry(&self, key: &[u8], rid: Rid) -> SmallResult<bool> {
        let _guard = self.root_latch.lock().unwrap();

        if self.root_page() == RM_NO_PAGE {
            let mut root = self.allocate_node(true)?;
            root.insert_leaf(0, key, rid);
            let root_no = root.page_no;
            self.write_node(&root)?;
            self.header.lock().unwrap().root_page = root_no;
            self.flush_header()?;
            return Ok(true);
        }

        let leaf_no = self.find_leaf(key)?;
        let mut leaf = self.fetch_node(leaf_no)?;
        let slot = leaf.lower_bound(key);
        if slot < leaf.num_key() && leaf.key_at(slot) == key {
            self.release_node(leaf_no)?;
            return Ok(false);
        }
        leaf.insert_leaf(slot, key, rid);

        if !leaf.is_full() {
            self.write_node(&leaf)?;
            return Ok(true);
        }
        self.split_and_propagate(leaf)?;
        Ok(true)
    }

    /// Splits `node` (already full), writes both halves, and
    /// propagates the new sibling's first key into the parent,
    /// recursively splitting ancestors on overflow (spec §4.3 Insert
    /// steps 3-4).
    fn split_and_propagate(&self, mut node: IxNode) -> SmallResult<()> {
        let mut right = self.allocate_node(node.is_leaf())?;
        let split_key = node.split_into(&mut right);

        if node.is_leaf() {
            right.header.next_leaf = node.header.next_leaf;
            right.header.prev_leaf = node.page_no;
            node.header.next_leaf = right.page_no;
            if right.header.next_leaf != RM_NO_PAGE {
                let mut next = self.fetch_node(right.header.next_leaf)?;
                next.header.prev_leaf = right.page_no;
                self.write_node(&next)?;
            }
        } else {
            for i in 0..right.num_key() {
                let child = right.child_at(i);
                let mut child_node = self.fetch_node(child)?;
                child_node.header.parent = right.page_no;
                self.write_node(&child_node)?;
            }
        }
        right.header.parent = node.header.parent;

        let parent_no = node.header.parent;
        let node_no = node.page_no;
        let right_no = right.page_no;
        self.write_node(&node)?;
        self.write_node(&right)?;

        if parent_no == RM_NO_PAGE {
            let mut new_root = self.allocate_node(false)?;
            new_root.insert_internal(0, self.fetch_node(node_no)?.first_key(), node_no);
            new_root.insert_internal(1, &split_key, right_no);
            let new_root_no = new_root.page_no;
            self.write_node(&new_root)?;

            let mut left = self.fetch_node(node_no)?;
            left.header.parent = new_root_no;
            self.write_node(&left)?;
            let mut right_again = self.fetch_node(right_no)?;
            right_again.header.parent = new_root_no;
            self.write_node(&right_again)?;

            self.header.lock().unwrap().root_page = new_root_no;
            self.flush_header()?;
            return Ok(());
        }

        let mut parent = self.fetch_node(parent_no)?;
        let pos = parent.internal_lookup(&split_key) + 1;
        parent.insert_internal(pos, &split_key, right_no);
        if parent.is_full() {
            self.split_and_propagate(parent)?;
        } else {
            self.write_node(&parent)?;
        }
        Ok(())
    }

    pub fn delete_entry(&self, key: &[u8]) -> SmallResult<bool> {
        let _guard = self.root_latch.lock().unwrap();
        if self.root_page() == RM_NO_PAGE {
            return Ok(false);
        }
        let leaf_no = self.find_leaf(key)?;
        let mut leaf = self.fetch_node(leaf_no)?;
        let slot = leaf.lower_bound(key);
        if slot >= leaf.num_key() || leaf.key_at(slot) != key {
            self.release_node(leaf_no)?;
            return Ok(false);
        }
        leaf.remove_at(slot);

        if leaf.page_no == self.root_page() {
            // root may legally be smaller than min_size (spec §3).
            if leaf.num_key() == 0 {
                self.write_node(&leaf)?;
                self.header.lock().unwrap().root_page = RM_NO_PAGE;
                self.flush_header()?;
            } else {
                self.write_node(&leaf)?;
            }
            return Ok(true);
        }

        if leaf.num_key() >= self.min_size() {
            self.write_node(&leaf)?;
            self.maintain_parent(leaf.page_no)?;
            return Ok(true);
        }
        self.coalesce_or_redistribute(leaf)?;
        Ok(true)
    }

    /// Propagates a leaf/internal node's first key upward as long as
    /// it changed the parent's stored separator (spec §4.3 Delete
    /// step 2 "maintain_parent").
    fn maintain_parent(&self, mut page_no: u32) -> SmallResult<()> {
        loop {
            let node = self.fetch_node(page_no)?;
            let parent_no = node.header.parent;
            if parent_no == RM_NO_PAGE {
                return Ok(());
            }
            let first_key = node.first_key().to_vec();
            self.release_node(page_no)?;

            let mut parent = self.fetch_node(parent_no)?;
            let idx = (0..parent.num_key()).find(|&i| parent.child_at(i) == page_no);
            let idx = match idx {
                Some(i) => i,
                None => return Err(SmallError::internal("maintain_parent: child not found")),
            };
            if parent.key_at(idx) == first_key.as_slice() {
                self.release_node(parent_no)?;
                return Ok(());
            }
            parent.remove_at(idx);
            parent.insert_internal(idx, &first_key, page_no);
            self.write_node(&parent)?;
            page_no = parent_no;
        }
    }

    /// Node underflowed below `min_size`: redistribute from a sibling
    /// if the combined size allows it, else merge (spec §4.3 Delete
    /// step 3).
    fn coalesce_or_redistribute(&self, node: IxNode) -> SmallResult<()> {
        let parent_no = node.header.parent;
        let node_no = node.page_no;
        self.write_node(&node)?;

        let mut parent = self.fetch_node(parent_no)?;
        let idx = (0..parent.num_key())
            .find(|&i| parent.child_at(i) == node_no)
            .ok_or_else(|| SmallError::internal("coalesce: child not found in parent"))?;

        let (left_idx, right_idx) = if idx == 0 {
            (idx, idx + 1)
        } else {
            (idx - 1, idx)
        };
        let left_no = parent.child_at(left_idx);
        let right_no = parent.child_at(right_idx);
        self.release_node(parent_no)?;

        let mut left = self.fetch_node(left_no)?;
        let mut right = self.fetch_node(right_no)?;

        if left.num_key() + right.num_key() >= 2 * self.min_size() {
            self.redistribute(&mut left, &mut right)?;
            self.write_node(&left)?;
            self.write_node(&right)?;
            self.maintain_parent(right.page_no)?;
            return Ok(());
        }

        left.absorb(&right);
        if left.is_leaf() {
            left.header.next_leaf = right.header.next_leaf;
            if left.header.next_leaf != RM_NO_PAGE {
                let mut next = self.fetch_node(left.header.next_leaf)?;
                next.header.prev_leaf = left.page_no;
                self.write_node(&next)?;
            }
        } else {
            for i in 0..left.num_key() {
                let child = left.child_at(i);
                let mut child_node = self.fetch_node(child)?;
                child_node.header.parent = left.page_no;
                self.write_node(&child_node)?;
            }
        }
        self.write_node(&left)?;
        self.free_node(right_no)?;

        let mut parent = self.fetch_node(parent_no)?;
        parent.remove_at(right_idx);
        let parent_underflow = parent.num_key() < self.min_size() && parent.header.parent != RM_NO_PAGE;
        let parent_is_root = parent.page_no == self.root_page();

        if parent_is_root && parent.num_key() == 1 {
            let only_child = parent.child_at(0);
            self.free_node(parent.page_no)?;
            let mut child = self.fetch_node(only_child)?;
            child.header.parent = RM_NO_PAGE;
            self.write_node(&child)?;
            self.header.lock().unwrap().root_page = only_child;
            self.flush_header()?;
            return Ok(());
        }

        if parent_underflow {
            self.coalesce_or_redistribute(parent)?;
        } else {
            self.write_node(&parent)?;
            self.maintain_parent(left.page_no)?;
        }
        Ok(())
    }

    /// Moves one entry from the richer sibling to the poorer one and
    /// updates the parent separator (spec §4.3 Delete step 3
    /// "redistribute").
    fn redistribute(&self, left: &mut IxNode, right: &mut IxNode) -> SmallResult<()> {
        if left.num_key() > right.num_key() {
            let i = left.num_key() - 1;
            let key = left.key_at(i).to_vec();
            if left.is_leaf() {
                let rid = left.rid_at(i);
                right.insert_leaf(0, &key, rid);
            } else {
                let child = left.child_at(i);
                right.insert_internal(0, &key, child);
                let mut child_node = self.fetch_node(child)?;
                child_node.header.parent = right.page_no;
                self.write_node(&child_node)?;
            }
            left.remove_at(i);
        } else {
            let key = right.key_at(0).to_vec();
            if right.is_leaf() {
                let rid = right.rid_at(0);
                left.insert_leaf(left.num_key(), &key, rid);
            } else {
                let child = right.child_at(0);
                left.insert_internal(left.num_key(), &key, child);
                let mut child_node = self.fetch_node(child)?;
                child_node.header.parent = left.page_no;
                self.write_node(&child_node)?;
            }
            right.remove_at(0);
        }
        Ok(())
    }

    pub fn value_slot_size() -> usize {
        VALUE_SLOT_SIZE
    }

    pub(crate) fn fetch_node_for_scan(&self, page_no: u32) -> SmallResult<IxNode> {
        self.fetch_node(page_no)
    }

    pub(crate) fn release_node_for_scan(&self, page_no: u32) -> SmallResult<()> {
        self.release_node(page_no)
    }
}

impl std::fmt::Debug for IxIndexHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "IxIndexHandle({:?})", self.meta)
    }
}
