//! B+Tree Index (spec §4.3): ordered multi-column index with
//! point/range lookup and a single tree-wide root latch.

pub mod ix_index_handle;
pub mod ix_scan;
pub mod ix_types;
pub mod node;

pub use ix_index_handle::IxIndexHandle;
pub use ix_scan::IxScan;
pub use ix_types::IndexMeta;
