//! B+tree index: point lookup, uniqueness-conflict rejection, delete,
//! and ordered range iteration via `lower_bound`/`upper_bound` (spec
//! §4.3).

use std::sync::Arc;

use small_db::index::{IndexMeta, IxIndexHandle, IxScan};
use small_db::storage::{
    buffer_pool::BufferPool, disk_manager::DiskManager, page_id::Rid, schema::ColType, tuple::Value,
};

fn open_index(dir: &std::path::Path, name: &str) -> IxIndexHandle {
    let disk = Arc::new(DiskManager::new(4096));
    let buffer_pool = Arc::new(BufferPool::new(disk.clone(), 32, 4096));
    let meta = IndexMeta::new("t", vec![("id".to_string(), ColType::Int, 0)]);
    IxIndexHandle::create(dir.join(name), meta, disk, buffer_pool, 4096).unwrap()
}

fn key(v: i32) -> Vec<u8> {
    Value::Int(v).as_comparable_bytes(4)
}

#[test]
fn insert_and_point_lookup() {
    let dir = tempfile::tempdir().unwrap();
    let index = open_index(dir.path(), "ix1");

    for i in 0..50 {
        assert!(index.insert_entry(&key(i), Rid::new(i as u32, 0)).unwrap());
    }

    for i in 0..50 {
        let rid = index.get_value(&key(i)).unwrap().unwrap();
        assert_eq!(rid, Rid::new(i as u32, 0));
    }
}

#[test]
fn duplicate_key_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let index = open_index(dir.path(), "ix2");

    assert!(index.insert_entry(&key(1), Rid::new(1, 0)).unwrap());
    assert!(!index.insert_entry(&key(1), Rid::new(2, 0)).unwrap());
}

#[test]
fn delete_removes_entry() {
    let dir = tempfile::tempdir().unwrap();
    let index = open_index(dir.path(), "ix3");

    index.insert_entry(&key(5), Rid::new(5, 0)).unwrap();
    assert!(index.delete_entry(&key(5)).unwrap());
    assert!(index.get_value(&key(5)).unwrap().is_none());
}

#[test]
fn range_scan_is_ordered() {
    let dir = tempfile::tempdir().unwrap();
    let index = open_index(dir.path(), "ix4");

    let mut values: Vec<i32> = (0..200).collect();
    // Insert out of order to exercise splits from both ends.
    values.reverse();
    for v in &values {
        index.insert_entry(&key(*v), Rid::new(*v as u32, 0)).unwrap();
    }

    let low = index.lower_bound(&key(50)).unwrap();
    let high = index.upper_bound(&key(99), true).unwrap();
    let mut scan = IxScan::new(&index, low, high);

    let mut seen = Vec::new();
    while let Some(rid) = scan.next().unwrap() {
        seen.push(rid.page_no as i32);
    }
    assert_eq!(seen, (50..=99).collect::<Vec<_>>());
}
