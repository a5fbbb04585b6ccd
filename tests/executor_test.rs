//! Volcano executors (spec §4.8): scan filtering, DML mutation, joins,
//! sort/limit and aggregation, driven directly against a `Database`.

use small_db::config::DbConfig;
use small_db::database::Database;
use small_db::execution::aggregate::{AggFn, AggregateExecutor};
use small_db::execution::delete::DeleteExecutor;
use small_db::execution::index_scan::IndexScanExecutor;
use small_db::execution::insert::InsertExecutor;
use small_db::execution::nested_loop_join::NestedLoopJoinExecutor;
use small_db::execution::seq_scan::SeqScanExecutor;
use small_db::execution::sort::{SortDirection, SortExecutor};
use small_db::execution::update::{SetClause, UpdateExecutor};
use small_db::execution::{CondOp, CondRhs, Condition, Executor};
use small_db::storage::schema::ColType;
use small_db::storage::tuple::Value;

fn open_db(dir: &std::path::Path, name: &str) -> Database {
    let cfg = DbConfig::default().with_data_dir(dir);
    Database::open(cfg, name).unwrap()
}

fn insert_row(db: &Database, table: &str, values: &[Value]) {
    let schema = db.catalog.desc_table(table).unwrap();
    let mut txn = db.begin().unwrap();
    let ins = InsertExecutor::new(&db.catalog, &db.lock_manager, &db.log_manager, table, schema);
    ins.execute(&mut txn, values).unwrap();
    db.commit(&mut txn).unwrap();
}

fn values_of(tuples: &[small_db::storage::tuple::Tuple], cols: &[small_db::storage::schema::Column], name: &str) -> Vec<i32> {
    let col = cols.iter().find(|c| c.name == name).unwrap();
    tuples
        .iter()
        .map(|t| match Value::from_bytes(col.col_type, &t.bytes[col.offset..col.offset + col.len]) {
            Value::Int(n) => n,
            other => panic!("unexpected value {:?}", other),
        })
        .collect()
}

fn collect(exec: &mut dyn Executor) -> Vec<small_db::storage::tuple::Tuple> {
    let mut out = Vec::new();
    exec.begin_tuple().unwrap();
    while !exec.is_end() {
        out.push(exec.current_tuple().unwrap());
        exec.next_tuple().unwrap();
    }
    out
}

#[test]
fn seq_scan_filters_by_condition() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(dir.path(), "exec1");
    db.catalog
        .create_table("t", vec![("id".to_string(), ColType::Int, 0)])
        .unwrap();
    for i in 0..5 {
        insert_row(&db, "t", &[Value::Int(i)]);
    }

    let heap = db.catalog.heap("t").unwrap();
    let schema = db.catalog.desc_table("t").unwrap();
    let cond = Condition::new("id", CondOp::Gt, CondRhs::Value(Value::Int(2)));
    let mut scan = SeqScanExecutor::new(heap, schema.clone(), vec![cond]);
    let rows = collect(&mut scan);
    assert_eq!(values_of(&rows, &schema.columns, "id"), vec![3, 4]);
}

#[test]
fn delete_removes_only_matching_rows() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(dir.path(), "exec2");
    db.catalog
        .create_table("t", vec![("id".to_string(), ColType::Int, 0)])
        .unwrap();
    for i in 0..4 {
        insert_row(&db, "t", &[Value::Int(i)]);
    }

    let schema = db.catalog.desc_table("t").unwrap();
    let mut txn = db.begin().unwrap();
    let heap = db.catalog.heap("t").unwrap();
    let cond = Condition::new("id", CondOp::Lt, CondRhs::Value(Value::Int(2)));
    let mut child = SeqScanExecutor::new(heap, schema.clone(), vec![cond]);
    let del = DeleteExecutor::new(&db.catalog, &db.lock_manager, &db.log_manager, "t", schema.clone());
    let deleted = del.execute(&mut txn, &mut child).unwrap();
    db.commit(&mut txn).unwrap();
    assert_eq!(deleted, 2);

    let heap = db.catalog.heap("t").unwrap();
    let mut remaining = SeqScanExecutor::new(heap, schema.clone(), Vec::new());
    let rows = collect(&mut remaining);
    let mut ids = values_of(&rows, &schema.columns, "id");
    ids.sort();
    assert_eq!(ids, vec![2, 3]);
}

#[test]
fn update_changes_matching_rows() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(dir.path(), "exec3");
    db.catalog
        .create_table("t", vec![("id".to_string(), ColType::Int, 0)])
        .unwrap();
    for i in 0..3 {
        insert_row(&db, "t", &[Value::Int(i)]);
    }

    let schema = db.catalog.desc_table("t").unwrap();
    let mut txn = db.begin().unwrap();
    let heap = db.catalog.heap("t").unwrap();
    let cond = Condition::new("id", CondOp::Eq, CondRhs::Value(Value::Int(1)));
    let mut child = SeqScanExecutor::new(heap, schema.clone(), vec![cond]);
    let upd = UpdateExecutor::new(&db.catalog, &db.lock_manager, &db.log_manager, "t", schema.clone());
    let changed = upd
        .execute(&mut txn, &mut child, &[SetClause { col: "id".to_string(), value: Value::Int(99) }])
        .unwrap();
    db.commit(&mut txn).unwrap();
    assert_eq!(changed, 1);

    let heap = db.catalog.heap("t").unwrap();
    let mut scan = SeqScanExecutor::new(heap, schema.clone(), Vec::new());
    let rows = collect(&mut scan);
    let mut ids = values_of(&rows, &schema.columns, "id");
    ids.sort();
    assert_eq!(ids, vec![0, 2, 99]);
}

#[test]
fn nested_loop_join_matches_on_equal_ids() {
    // `b`'s join column is named differently from `a`'s so the two
    // sides of the equi-join don't collide under the combined output
    // schema's plain name lookup.
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(dir.path(), "exec4");
    db.catalog
        .create_table("a", vec![("id".to_string(), ColType::Int, 0)])
        .unwrap();
    db.catalog
        .create_table("b", vec![("bid".to_string(), ColType::Int, 0)])
        .unwrap();
    for i in 0..3 {
        insert_row(&db, "a", &[Value::Int(i)]);
    }
    for i in 1..4 {
        insert_row(&db, "b", &[Value::Int(i)]);
    }

    let schema_a = db.catalog.desc_table("a").unwrap();
    let schema_b = db.catalog.desc_table("b").unwrap();
    let outer = Box::new(SeqScanExecutor::new(db.catalog.heap("a").unwrap(), schema_a, Vec::new()));
    let inner = Box::new(SeqScanExecutor::new(db.catalog.heap("b").unwrap(), schema_b, Vec::new()));
    let cond = Condition::new("id", CondOp::Eq, CondRhs::Column("bid".to_string()));
    let mut join = NestedLoopJoinExecutor::new(outer, inner, vec![cond], db.config.join_buffer_pages);

    let rows = collect(&mut join);
    assert_eq!(rows.len(), 2, "ids 1 and 2 should match across both tables");
}

#[test]
fn sort_orders_descending_and_applies_limit() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(dir.path(), "exec5");
    db.catalog
        .create_table("t", vec![("id".to_string(), ColType::Int, 0)])
        .unwrap();
    for i in [3, 1, 4, 1, 5, 9, 2, 6] {
        insert_row(&db, "t", &[Value::Int(i)]);
    }

    let schema = db.catalog.desc_table("t").unwrap();
    let child = Box::new(SeqScanExecutor::new(db.catalog.heap("t").unwrap(), schema.clone(), Vec::new()));
    let mut sorted = SortExecutor::new(child, vec![("id".to_string(), SortDirection::Desc)], Some(3));

    let rows = collect(&mut sorted);
    assert_eq!(values_of(&rows, &schema.columns, "id"), vec![9, 6, 5]);
}

#[test]
fn aggregate_computes_sum_and_count() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(dir.path(), "exec6");
    db.catalog
        .create_table("t", vec![("id".to_string(), ColType::Int, 0)])
        .unwrap();
    for i in 1..=4 {
        insert_row(&db, "t", &[Value::Int(i)]);
    }

    let schema = db.catalog.desc_table("t").unwrap();
    let child = Box::new(SeqScanExecutor::new(db.catalog.heap("t").unwrap(), schema.clone(), Vec::new()));
    let mut agg = AggregateExecutor::new(child, AggFn::Sum, "id");
    let rows = collect(&mut agg);
    assert_eq!(rows.len(), 1);
    assert_eq!(String::from_utf8(rows[0].bytes.clone()).unwrap(), "10");

    let child = Box::new(SeqScanExecutor::new(db.catalog.heap("t").unwrap(), schema, Vec::new()));
    let mut count = AggregateExecutor::new(child, AggFn::Count, "*");
    let rows = collect(&mut count);
    assert_eq!(String::from_utf8(rows[0].bytes.clone()).unwrap(), "4");
}

#[test]
fn index_scan_returns_the_matching_row() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(dir.path(), "exec7");
    db.catalog
        .create_table("t", vec![("id".to_string(), ColType::Int, 0)])
        .unwrap();
    db.catalog.create_index("t", &["id".to_string()]).unwrap();
    for i in 0..20 {
        insert_row(&db, "t", &[Value::Int(i)]);
    }

    let schema = db.catalog.desc_table("t").unwrap();
    let index_meta = db
        .catalog
        .show_index("t")
        .unwrap()
        .into_iter()
        .find(|ix| ix.cols == vec!["id".to_string()])
        .unwrap();
    let index = db.catalog.index(&index_meta.file_name()).unwrap();
    let heap = db.catalog.heap("t").unwrap();
    let cond = Condition::new("id", CondOp::Eq, CondRhs::Value(Value::Int(13)));
    let mut scan = IndexScanExecutor::new(heap, index, &index_meta, schema.clone(), vec![cond]).unwrap();

    let rows = collect(&mut scan);
    assert_eq!(values_of(&rows, &schema.columns, "id"), vec![13]);
}
