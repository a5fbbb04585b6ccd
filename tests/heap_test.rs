//! Slotted-page heap file: insert/get/delete/update, and the free-page
//! reuse discipline across a delete-then-insert cycle (spec §4.1/§4.2).

use std::sync::Arc;

use small_db::storage::{
    buffer_pool::BufferPool,
    disk_manager::DiskManager,
    record::HeapFile,
    schema::{ColType, TableSchema},
    tuple::{Tuple, Value},
};
use small_db::transaction::LockManager;

fn schema() -> TableSchema {
    TableSchema::new(vec![
        ("id".to_string(), ColType::Int, 0),
        ("name".to_string(), ColType::Char, 16),
    ])
}

fn open_heap(dir: &std::path::Path, name: &str) -> HeapFile {
    let disk = Arc::new(DiskManager::new(4096));
    let buffer_pool = Arc::new(BufferPool::new(disk.clone(), 32, 4096));
    let lock_manager = Arc::new(LockManager::new());
    HeapFile::open(dir.join(name), name, disk, buffer_pool, lock_manager, 4096).unwrap()
}

#[test]
fn insert_get_delete_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let heap = open_heap(dir.path(), "t1");
    let schema = schema();

    let tuple = Tuple::from_values(&schema, &[Value::Int(7), Value::Char(b"alice".to_vec())]).unwrap();
    let rid = heap.insert_record(&tuple.bytes, None).unwrap();

    let fetched = heap.get_record(rid, None).unwrap();
    assert_eq!(fetched, tuple.bytes);

    heap.delete_record(rid, None).unwrap();
    assert!(heap.get_record(rid, None).is_err());
}

#[test]
fn update_changes_record_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let heap = open_heap(dir.path(), "t2");
    let schema = schema();

    let tuple = Tuple::from_values(&schema, &[Value::Int(1), Value::Char(b"bob".to_vec())]).unwrap();
    let rid = heap.insert_record(&tuple.bytes, None).unwrap();

    let updated = Tuple::from_values(&schema, &[Value::Int(2), Value::Char(b"bob".to_vec())]).unwrap();
    heap.update_record(rid, &updated.bytes, None).unwrap();

    let fetched = heap.get_record(rid, None).unwrap();
    assert_eq!(fetched, updated.bytes);
}

#[test]
fn deleted_slot_is_reused_by_a_later_insert() {
    let dir = tempfile::tempdir().unwrap();
    let heap = open_heap(dir.path(), "t3");
    let schema = schema();

    let mut rids = Vec::new();
    for i in 0..8 {
        let tuple = Tuple::from_values(&schema, &[Value::Int(i), Value::Char(b"x".to_vec())]).unwrap();
        rids.push(heap.insert_record(&tuple.bytes, None).unwrap());
    }
    for rid in &rids {
        heap.delete_record(*rid, None).unwrap();
    }

    let tuple = Tuple::from_values(&schema, &[Value::Int(99), Value::Char(b"y".to_vec())]).unwrap();
    let new_rid = heap.insert_record(&tuple.bytes, None).unwrap();
    assert!(rids.contains(&new_rid), "expected a freed slot to be reused");
}
