//! Page and record identifiers shared by every layer above the buffer
//! pool (spec §3 glossary: Rid, Iid).

use std::io::Read;

use crate::io::{Decodeable, Encodeable};

/// Handle to an open on-disk file (heap file, index file, log file),
/// assigned by `DiskManager::open_file`. Distinct files never share an
/// fd, so `PageId{fd, page_no}` uniquely names a page across the whole
/// engine, not just within one table.
pub type Fd = u32;

/// Sentinel meaning "no page" (empty free-list, empty tree, root of an
/// empty B+tree, end of the leaf sibling chain).
pub const RM_NO_PAGE: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageId {
    pub fd: Fd,
    pub page_no: u32,
}

impl PageId {
    pub fn new(fd: Fd, page_no: u32) -> Self {
        Self { fd, page_no }
    }
}

/// Heap record identifier: (page_no, slot_no).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rid {
    pub page_no: u32,
    pub slot_no: u32,
}

impl Rid {
    pub fn new(page_no: u32, slot_no: u32) -> Self {
        Self { page_no, slot_no }
    }
}

impl Encodeable for Rid {
    fn encode(&self) -> Vec<u8> {
        let mut buf = self.page_no.encode();
        buf.extend(self.slot_no.encode());
        buf
    }
}

impl Decodeable for Rid {
    fn decode_from<R: Read>(reader: &mut R) -> Self {
        let page_no = u32::decode_from(reader);
        let slot_no = u32::decode_from(reader);
        Self { page_no, slot_no }
    }
}

/// B+tree leaf position: (page_no, slot_no) within a leaf node. Same
/// shape as `Rid` but a distinct type — an `Iid` indexes into a node's
/// key/value arrays, not a heap page's slot bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Iid {
    pub page_no: u32,
    pub slot_no: u32,
}

impl Iid {
    pub fn new(page_no: u32, slot_no: u32) -> Self {
        Self { page_no, slot_no }
    }

    pub fn invalid() -> Self {
        Self {
            page_no: RM_NO_PAGE,
            slot_no: 0,
        }
    }
}
