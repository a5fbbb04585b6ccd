//! `IxScan` (spec §4.3 "Iteration"): walks leaf slots between two
//! `Iid` bounds, following `next_leaf` across page boundaries.

use crate::{error::SmallResult, index::ix_index_handle::IxIndexHandle, storage::page_id::Iid};

pub struct IxScan<'a> {
    index: &'a IxIndexHandle,
    current: Iid,
    high: Iid,
    done: bool,
}

impl<'a> IxScan<'a> {
    pub fn new(index: &'a IxIndexHandle, low: Iid, high: Iid) -> Self {
        let done = low.page_no == crate::storage::page_id::RM_NO_PAGE || low == high;
        Self {
            index,
            current: low,
            high,
            done,
        }
    }

    pub fn is_end(&self) -> bool {
        self.done
    }

    pub fn next(&mut self) -> SmallResult<Option<crate::storage::page_id::Rid>> {
        if self.done {
            return Ok(None);
        }
        let node = self.index.fetch_node_for_scan(self.current.page_no)?;
        let rid = node.rid_at(self.current.slot_no as usize);

        let next_slot = self.current.slot_no + 1;
        if next_slot < node.num_key() as u32 {
            self.current.slot_no = next_slot;
        } else {
            let next_leaf = node.header.next_leaf;
            if next_leaf == crate::storage::page_id::RM_NO_PAGE {
                self.done = true;
            } else {
                self.current = Iid::new(next_leaf, 0);
            }
        }
        self.index.release_node_for_scan(node.page_no)?;

        if self.current == self.high {
            self.done = true;
        }
        Ok(Some(rid))
    }
}

impl<'a> Iterator for IxScan<'a> {
    type Item = crate::storage::page_id::Rid;

    fn next(&mut self) -> Option<Self::Item> {
        IxScan::next(self).ok().flatten()
    }
}
