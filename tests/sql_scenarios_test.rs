//! End-to-end SQL surface (spec §6/§8): statements run through
//! `sql::execute` against a real `Database` + `Session`, covering DDL,
//! DML, transactions, indexes, joins, sort/limit and aggregates.

use small_db::config::DbConfig;
use small_db::database::Database;
use small_db::sql::{execute, QueryResult, Session};

fn open_db(dir: &std::path::Path, name: &str) -> Database {
    let cfg = DbConfig::default().with_data_dir(dir);
    Database::open(cfg, name).unwrap()
}

fn rows_of(result: QueryResult) -> Vec<Vec<String>> {
    match result {
        QueryResult::Rows { rows, .. } => rows,
        other => panic!("expected Rows, got a different QueryResult variant (Affected/Message): {}", match other {
            QueryResult::Affected(n) => format!("Affected({})", n),
            QueryResult::Message(m) => format!("Message({})", m),
            _ => unreachable!(),
        }),
    }
}

#[test]
fn create_insert_select_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(dir.path(), "s1");
    let mut session = Session::new();

    execute(&db, &mut session, "CREATE TABLE t (id INT, name VARCHAR(10))").unwrap();
    execute(&db, &mut session, "INSERT INTO t VALUES (1, 'alice')").unwrap();
    execute(&db, &mut session, "INSERT INTO t VALUES (2, 'bob')").unwrap();

    let result = execute(&db, &mut session, "SELECT id, name FROM t").unwrap();
    let mut rows = rows_of(result);
    rows.sort();
    assert_eq!(rows, vec![vec!["1".to_string(), "alice".to_string()], vec!["2".to_string(), "bob".to_string()]]);
}

#[test]
fn update_and_delete_statements() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(dir.path(), "s2");
    let mut session = Session::new();

    execute(&db, &mut session, "CREATE TABLE t (id INT, name VARCHAR(10))").unwrap();
    execute(&db, &mut session, "INSERT INTO t VALUES (1, 'alice')").unwrap();
    execute(&db, &mut session, "INSERT INTO t VALUES (2, 'bob')").unwrap();

    let affected = execute(&db, &mut session, "UPDATE t SET name = 'carol' WHERE id = 1").unwrap();
    match affected {
        QueryResult::Affected(n) => assert_eq!(n, 1),
        _ => panic!("expected Affected"),
    }

    let rows = rows_of(execute(&db, &mut session, "SELECT name FROM t WHERE id = 1").unwrap());
    assert_eq!(rows, vec![vec!["carol".to_string()]]);

    let affected = execute(&db, &mut session, "DELETE FROM t WHERE id = 2").unwrap();
    match affected {
        QueryResult::Affected(n) => assert_eq!(n, 1),
        _ => panic!("expected Affected"),
    }
    let rows = rows_of(execute(&db, &mut session, "SELECT id FROM t").unwrap());
    assert_eq!(rows, vec![vec!["1".to_string()]]);
}

#[test]
fn explicit_transaction_commit_persists_changes() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(dir.path(), "s3");
    let mut session = Session::new();

    execute(&db, &mut session, "CREATE TABLE t (id INT)").unwrap();
    execute(&db, &mut session, "BEGIN").unwrap();
    execute(&db, &mut session, "INSERT INTO t VALUES (1)").unwrap();
    execute(&db, &mut session, "INSERT INTO t VALUES (2)").unwrap();
    execute(&db, &mut session, "COMMIT").unwrap();

    let rows = rows_of(execute(&db, &mut session, "SELECT id FROM t").unwrap());
    assert_eq!(rows.len(), 2);
}

#[test]
fn explicit_transaction_abort_discards_changes() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(dir.path(), "s4");
    let mut session = Session::new();

    execute(&db, &mut session, "CREATE TABLE t (id INT)").unwrap();
    execute(&db, &mut session, "BEGIN").unwrap();
    execute(&db, &mut session, "INSERT INTO t VALUES (1)").unwrap();
    execute(&db, &mut session, "ABORT").unwrap();

    let rows = rows_of(execute(&db, &mut session, "SELECT id FROM t").unwrap());
    assert!(rows.is_empty());
}

#[test]
fn order_by_and_limit_and_aggregate() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(dir.path(), "s5");
    let mut session = Session::new();

    execute(&db, &mut session, "CREATE TABLE t (id INT)").unwrap();
    for v in [3, 1, 4, 1, 5, 9, 2, 6] {
        execute(&db, &mut session, &format!("INSERT INTO t VALUES ({})", v)).unwrap();
    }

    let rows = rows_of(execute(&db, &mut session, "SELECT id FROM t ORDER BY id DESC LIMIT 3").unwrap());
    assert_eq!(rows, vec![vec!["9".to_string()], vec!["6".to_string()], vec!["5".to_string()]]);

    let rows = rows_of(execute(&db, &mut session, "SELECT SUM(id) FROM t").unwrap());
    assert_eq!(rows, vec![vec!["31".to_string()]]);

    let rows = rows_of(execute(&db, &mut session, "SELECT COUNT(*) FROM t").unwrap());
    assert_eq!(rows, vec![vec!["8".to_string()]]);
}

#[test]
fn create_index_then_point_lookup() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(dir.path(), "s6");
    let mut session = Session::new();

    execute(&db, &mut session, "CREATE TABLE t (id INT)").unwrap();
    execute(&db, &mut session, "CREATE INDEX t (id)").unwrap();
    for i in 0..30 {
        execute(&db, &mut session, &format!("INSERT INTO t VALUES ({})", i)).unwrap();
    }

    let rows = rows_of(execute(&db, &mut session, "SELECT id FROM t WHERE id = 17").unwrap());
    assert_eq!(rows, vec![vec!["17".to_string()]]);

    let index_rows = rows_of(execute(&db, &mut session, "SHOW INDEX FROM t").unwrap());
    assert_eq!(index_rows, vec![vec!["t".to_string(), "id".to_string()]]);
}

#[test]
fn two_table_join_with_where_clause() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(dir.path(), "s7");
    let mut session = Session::new();

    execute(&db, &mut session, "CREATE TABLE a (id INT)").unwrap();
    execute(&db, &mut session, "CREATE TABLE b (bid INT)").unwrap();
    for i in 0..3 {
        execute(&db, &mut session, &format!("INSERT INTO a VALUES ({})", i)).unwrap();
    }
    for i in 1..4 {
        execute(&db, &mut session, &format!("INSERT INTO b VALUES ({})", i)).unwrap();
    }

    let rows = rows_of(execute(&db, &mut session, "SELECT id, bid FROM a, b WHERE id = bid").unwrap());
    assert_eq!(rows.len(), 2);
}

#[test]
fn show_tables_and_desc() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(dir.path(), "s8");
    let mut session = Session::new();

    execute(&db, &mut session, "CREATE TABLE t (id INT, name VARCHAR(8))").unwrap();

    let rows = rows_of(execute(&db, &mut session, "SHOW TABLES").unwrap());
    assert_eq!(rows, vec![vec!["t".to_string()]]);

    let rows = rows_of(execute(&db, &mut session, "DESC t").unwrap());
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][0], "id");
    assert_eq!(rows[1][0], "name");
}
