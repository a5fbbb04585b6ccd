//! Multi-granularity lock manager (spec §4.4): compatible locks are
//! granted to distinct transactions, conflicting ones abort the
//! requester outright (no queuing), and `release_all` at txn end frees
//! every lock so a later transaction can proceed.

use small_db::storage::page_id::Rid;
use small_db::transaction::{LockManager, Transaction};

#[test]
fn shared_locks_on_the_same_table_are_compatible() {
    let lm = LockManager::new();
    let mut t1 = Transaction::with_id(1);
    let mut t2 = Transaction::with_id(2);

    lm.lock_shared_on_table(&mut t1, 10).unwrap();
    lm.lock_shared_on_table(&mut t2, 10).unwrap();
}

#[test]
fn exclusive_table_lock_conflicts_with_a_concurrent_shared_lock() {
    let lm = LockManager::new();
    let mut t1 = Transaction::with_id(1);
    let mut t2 = Transaction::with_id(2);

    lm.lock_shared_on_table(&mut t1, 20).unwrap();
    assert!(lm.lock_exclusive_on_table(&mut t2, 20).is_err());
}

#[test]
fn same_txn_can_upgrade_shared_to_exclusive() {
    let lm = LockManager::new();
    let mut t1 = Transaction::with_id(1);

    lm.lock_shared_on_record(&mut t1, Rid::new(0, 0), 30).unwrap();
    lm.lock_exclusive_on_record(&mut t1, Rid::new(0, 0), 30).unwrap();
}

#[test]
fn release_all_frees_every_lock_the_txn_held() {
    let lm = LockManager::new();
    let mut t1 = Transaction::with_id(1);
    let mut t2 = Transaction::with_id(2);

    lm.lock_exclusive_on_table(&mut t1, 40).unwrap();
    assert!(lm.lock_shared_on_table(&mut t2, 40).is_err());

    lm.release_all(&t1);
    lm.lock_shared_on_table(&mut t2, 40).unwrap();
}
