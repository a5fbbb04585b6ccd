//! `Database`: wires disk manager, buffer pool, lock manager, log
//! manager, catalog, transaction manager and recovery manager together
//! for one open database. Each open database is an owned struct a
//! caller constructs and holds directly, rather than a process-wide
//! singleton, so multiple databases can coexist in one process (handy
//! in tests).

use std::sync::Arc;

use log::info;

use crate::{
    catalog::SmManager,
    config::DbConfig,
    error::SmallResult,
    io::SmallFile,
    recovery::{log_manager::LogManager, recovery_manager::{RecoveryManager, RecoveryOps}},
    storage::{buffer_pool::BufferPool, disk_manager::DiskManager},
    transaction::{
        lock_manager::LockManager,
        transaction_manager::{RollbackSink, TransactionManager},
        txn::Transaction,
    },
};

pub struct Database {
    pub config: DbConfig,
    pub disk: Arc<DiskManager>,
    pub buffer_pool: Arc<BufferPool>,
    pub lock_manager: Arc<LockManager>,
    pub log_manager: Arc<LogManager>,
    pub catalog: Arc<SmManager>,
    pub txn_manager: Arc<TransactionManager>,
    pub recovery_manager: Arc<RecoveryManager>,
}

impl Database {
    /// Opens `db_name` under `config.data_dir`, creating it first if it
    /// doesn't already exist, then runs crash recovery against the
    /// now-open catalog (spec §4.6 "run once at database open").
    pub fn open(config: DbConfig, db_name: &str) -> SmallResult<Self> {
        let disk = Arc::new(DiskManager::new(config.page_size));
        let buffer_pool = Arc::new(BufferPool::new(disk.clone(), config.num_frames, config.page_size));
        let lock_manager = Arc::new(LockManager::new());
        let catalog = Arc::new(SmManager::new(
            config.page_size,
            config.data_dir.clone(),
            disk.clone(),
            buffer_pool.clone(),
            lock_manager.clone(),
        ));

        if !catalog.is_dir(db_name) {
            catalog.create_db(db_name)?;
        }
        catalog.open_db(db_name)?;

        let log_file = Arc::new(SmallFile::open(catalog.log_path()?)?);
        let log_manager = Arc::new(LogManager::new(log_file, config.log_buffer_size));

        let recovery_manager = Arc::new(RecoveryManager::new(log_manager.clone()));
        recovery_manager.recover(catalog.as_ref() as &dyn RecoveryOps)?;

        let txn_manager = Arc::new(TransactionManager::new(
            lock_manager.clone(),
            log_manager.clone(),
            catalog.clone() as Arc<dyn RollbackSink>,
        ));

        info!("database: opened {}", db_name);
        Ok(Self {
            config,
            disk,
            buffer_pool,
            lock_manager,
            log_manager,
            catalog,
            txn_manager,
            recovery_manager,
        })
    }

    pub fn begin(&self) -> SmallResult<Transaction> {
        self.txn_manager.begin()
    }

    pub fn commit(&self, txn: &mut Transaction) -> SmallResult<()> {
        self.txn_manager.commit(txn)
    }

    pub fn abort(&self, txn: &mut Transaction) -> SmallResult<()> {
        self.txn_manager.abort(txn)
    }

    pub fn close(&self) -> SmallResult<()> {
        self.catalog.close_db()
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if let Err(e) = self.catalog.flush_meta() {
            log::warn!("database: failed to flush catalog on drop: {}", e);
        }
    }
}
