//! `SmManager` (spec §4.2 catalog, §6 "DB directory"): owns the open
//! database's metadata plus every live heap/index file handle, and
//! implements the logical replay/undo surfaces recovery and
//! transaction abort call into.
//!
//! Grounded in the source's `sm_manager.h`/`sm_manager.cpp`: directory
//! layout (`mkdir`/`chdir` there becomes plain path-joining here since
//! this engine has no process-wide working directory to swap), the
//! `fhs_`/`ihs_` open-handle maps, and the `rollback_*`/redo/undo
//! dispatch in `log_recovery.cpp`. `HeapFile` and `IxIndexHandle` are
//! internally synchronized and `&self`-based, so the maps hold them
//! directly behind `Arc` rather than behind an extra `RwLock`.

use std::{
    collections::HashMap,
    fs,
    path::PathBuf,
    sync::{Arc, RwLock},
};

use log::{info, warn};

use crate::{
    catalog::db_meta::{DbMeta, TabMeta},
    error::{SmallError, SmallResult},
    index::{IndexMeta, IxIndexHandle},
    io::SmallFile,
    recovery::{log_manager::LogManager, recovery_manager::RecoveryOps},
    storage::{
        buffer_pool::BufferPool,
        disk_manager::DiskManager,
        page_id::Rid,
        record::HeapScan,
        schema::{ColType, TableSchema},
        HeapFile,
    },
    transaction::{lock_manager::LockManager, transaction_manager::RollbackSink, txn::Transaction},
};

const META_FILE: &str = "db.meta";
const LOG_FILE: &str = "log.log";

pub struct SmManager {
    page_size: usize,
    data_dir: PathBuf,
    disk: Arc<DiskManager>,
    buffer_pool: Arc<BufferPool>,
    lock_manager: Arc<LockManager>,
    meta: RwLock<DbMeta>,
    db_path: RwLock<Option<PathBuf>>,
    fhs: RwLock<HashMap<String, Arc<HeapFile>>>,
    ihs: RwLock<HashMap<String, Arc<IxIndexHandle>>>,
}

impl SmManager {
    pub fn new(
        page_size: usize,
        data_dir: PathBuf,
        disk: Arc<DiskManager>,
        buffer_pool: Arc<BufferPool>,
        lock_manager: Arc<LockManager>,
    ) -> Self {
        Self {
            page_size,
            data_dir,
            disk,
            buffer_pool,
            lock_manager,
            meta: RwLock::new(DbMeta::new("")),
            db_path: RwLock::new(None),
            fhs: RwLock::new(HashMap::new()),
            ihs: RwLock::new(HashMap::new()),
        }
    }

    fn path_for(&self, db_name: &str) -> PathBuf {
        self.data_dir.join(db_name)
    }

    pub fn is_dir(&self, db_name: &str) -> bool {
        self.path_for(db_name).is_dir()
    }

    pub fn create_db(&self, db_name: &str) -> SmallResult<()> {
        if self.is_dir(db_name) {
            return Err(SmallError::DatabaseExists(db_name.to_string()));
        }
        let path = self.path_for(db_name);
        fs::create_dir_all(&path)?;
        let meta = DbMeta::new(db_name);
        fs::write(path.join(META_FILE), meta.to_bytes())?;
        SmallFile::open(path.join(LOG_FILE))?;
        info!("sm_manager: created database {}", db_name);
        Ok(())
    }

    pub fn drop_db(&self, db_name: &str) -> SmallResult<()> {
        if !self.is_dir(db_name) {
            return Err(SmallError::DatabaseNotFound(db_name.to_string()));
        }
        fs::remove_dir_all(self.path_for(db_name))?;
        info!("sm_manager: dropped database {}", db_name);
        Ok(())
    }

    /// Opens every heap/index file named in the loaded catalog into
    /// `fhs`/`ihs`, run once at connect time (spec §4.2, §4.6 "run
    /// once at database open" sets the order: catalog loads first,
    /// recovery runs against the now-open files).
    pub fn open_db(&self, db_name: &str) -> SmallResult<()> {
        if !self.is_dir(db_name) {
            return Err(SmallError::DatabaseNotFound(db_name.to_string()));
        }
        let path = self.path_for(db_name);
        let bytes = fs::read(path.join(META_FILE))?;
        let meta = DbMeta::from_bytes(&bytes);

        let mut fhs = HashMap::new();
        let mut ihs = HashMap::new();
        for tab in meta.tables.values() {
            let heap = HeapFile::open(
                path.join(&tab.name),
                &tab.name,
                self.disk.clone(),
                self.buffer_pool.clone(),
                self.lock_manager.clone(),
                self.page_size,
            )?;
            fhs.insert(tab.name.clone(), Arc::new(heap));
            for ix in &tab.indexes {
                let handle = IxIndexHandle::open(
                    path.join(ix.file_name()),
                    ix.clone(),
                    self.disk.clone(),
                    self.buffer_pool.clone(),
                    self.page_size,
                )?;
                ihs.insert(ix.file_name(), Arc::new(handle));
            }
        }

        *self.meta.write().unwrap() = meta;
        *self.db_path.write().unwrap() = Some(path);
        *self.fhs.write().unwrap() = fhs;
        *self.ihs.write().unwrap() = ihs;
        info!("sm_manager: opened database {}", db_name);
        Ok(())
    }

    pub fn close_db(&self) -> SmallResult<()> {
        self.flush_meta()?;
        self.fhs.write().unwrap().clear();
        self.ihs.write().unwrap().clear();
        *self.db_path.write().unwrap() = None;
        Ok(())
    }

    pub fn reset_db(&self, db_name: &str) -> SmallResult<()> {
        if self.is_dir(db_name) {
            self.drop_db(db_name)?;
        }
        self.create_db(db_name)
    }

    pub fn flush_meta(&self) -> SmallResult<()> {
        let path = self.require_db_path()?;
        let meta = self.meta.read().unwrap();
        fs::write(path.join(META_FILE), meta.to_bytes())?;
        Ok(())
    }

    pub fn log_path(&self) -> SmallResult<PathBuf> {
        Ok(self.require_db_path()?.join(LOG_FILE))
    }

    fn require_db_path(&self) -> SmallResult<PathBuf> {
        self.db_path
            .read()
            .unwrap()
            .clone()
            .ok_or_else(|| SmallError::internal("no database open"))
    }

    pub fn show_tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.meta.read().unwrap().tables.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn desc_table(&self, tab_name: &str) -> SmallResult<TableSchema> {
        let meta = self.meta.read().unwrap();
        let tab = meta
            .tables
            .get(tab_name)
            .ok_or_else(|| SmallError::TableNotFound(tab_name.to_string()))?;
        Ok(tab.schema.clone())
    }

    pub fn show_index(&self, tab_name: &str) -> SmallResult<Vec<IndexMeta>> {
        let meta = self.meta.read().unwrap();
        let tab = meta
            .tables
            .get(tab_name)
            .ok_or_else(|| SmallError::TableNotFound(tab_name.to_string()))?;
        Ok(tab.indexes.clone())
    }

    pub fn heap(&self, tab_name: &str) -> SmallResult<Arc<HeapFile>> {
        self.fhs
            .read()
            .unwrap()
            .get(tab_name)
            .cloned()
            .ok_or_else(|| SmallError::TableNotFound(tab_name.to_string()))
    }

    pub fn index(&self, file_name: &str) -> SmallResult<Arc<IxIndexHandle>> {
        self.ihs
            .read()
            .unwrap()
            .get(file_name)
            .cloned()
            .ok_or_else(|| SmallError::IndexNotFound(vec![file_name.to_string()]))
    }

    pub fn create_table(&self, tab_name: &str, cols: Vec<(String, ColType, usize)>) -> SmallResult<()> {
        {
            let meta = self.meta.read().unwrap();
            if meta.is_table(tab_name) {
                return Err(SmallError::TableExists(tab_name.to_string()));
            }
        }
        let path = self.require_db_path()?;
        let schema = TableSchema::new(cols);
        let heap = HeapFile::create(
            path.join(tab_name),
            tab_name,
            schema.record_size,
            self.disk.clone(),
            self.buffer_pool.clone(),
            self.lock_manager.clone(),
            self.page_size,
        )?;
        self.fhs.write().unwrap().insert(tab_name.to_string(), Arc::new(heap));
        self.meta
            .write()
            .unwrap()
            .tables
            .insert(tab_name.to_string(), TabMeta::new(tab_name, schema));
        self.flush_meta()?;
        info!("sm_manager: created table {}", tab_name);
        Ok(())
    }

    pub fn drop_table(&self, tab_name: &str) -> SmallResult<()> {
        let path = self.require_db_path()?;
        let tab = {
            let meta = self.meta.read().unwrap();
            meta.tables
                .get(tab_name)
                .cloned()
                .ok_or_else(|| SmallError::TableNotFound(tab_name.to_string()))?
        };
        for ix in &tab.indexes {
            self.ihs.write().unwrap().remove(&ix.file_name());
            let _ = fs::remove_file(path.join(ix.file_name()));
        }
        self.fhs.write().unwrap().remove(tab_name);
        let _ = fs::remove_file(path.join(tab_name));
        self.meta.write().unwrap().tables.remove(tab_name);
        self.flush_meta()?;
        info!("sm_manager: dropped table {}", tab_name);
        Ok(())
    }

    pub fn create_index(&self, tab_name: &str, col_names: &[String]) -> SmallResult<()> {
        let path = self.require_db_path()?;
        let (schema, already_indexed) = {
            let meta = self.meta.read().unwrap();
            let tab = meta
                .tables
                .get(tab_name)
                .ok_or_else(|| SmallError::TableNotFound(tab_name.to_string()))?;
            (tab.schema.clone(), tab.is_indexed(col_names))
        };
        if already_indexed {
            return Err(SmallError::IndexExists(col_names.to_vec()));
        }

        let mut col_defs = Vec::with_capacity(col_names.len());
        for name in col_names {
            let col = schema
                .col(name)
                .ok_or_else(|| SmallError::ColumnNotFound(name.clone()))?;
            col_defs.push((col.name.clone(), col.col_type, col.len));
        }
        let index_meta = IndexMeta::new(tab_name, col_defs);
        let file_name = index_meta.file_name();

        let handle = IxIndexHandle::create(
            path.join(&file_name),
            index_meta.clone(),
            self.disk.clone(),
            self.buffer_pool.clone(),
            self.page_size,
        )?;

        let heap = self.heap(tab_name)?;
        let schema_for_scan = schema.clone();
        let result: SmallResult<()> = (|| {
            let mut scan = HeapScan::new(&heap);
            while let Some((rid, bytes)) = scan.next() {
                let key = build_key_bytes(&schema_for_scan, &index_meta, &bytes);
                if !handle.insert_entry(&key, rid)? {
                    return Err(SmallError::IndexEntryRepeat(col_names.to_vec()));
                }
            }
            Ok(())
        })();
        if let Err(e) = result {
            drop(handle);
            let _ = fs::remove_file(path.join(&file_name));
            return Err(e);
        }

        self.ihs.write().unwrap().insert(file_name, Arc::new(handle));
        {
            let mut meta = self.meta.write().unwrap();
            let tab = meta.tables.get_mut(tab_name).unwrap();
            tab.indexes.push(index_meta);
            tab.schema.mark_indexed(col_names);
        }
        self.flush_meta()?;
        info!("sm_manager: created index on {}{:?}", tab_name, col_names);
        Ok(())
    }

    pub fn drop_index(&self, tab_name: &str, col_names: &[String]) -> SmallResult<()> {
        let path = self.require_db_path()?;
        let index_meta = {
            let meta = self.meta.read().unwrap();
            let tab = meta
                .tables
                .get(tab_name)
                .ok_or_else(|| SmallError::TableNotFound(tab_name.to_string()))?;
            tab.index_on(col_names)
                .cloned()
                .ok_or_else(|| SmallError::IndexNotFound(col_names.to_vec()))?
        };
        let file_name = index_meta.file_name();
        self.ihs.write().unwrap().remove(&file_name);
        let _ = fs::remove_file(path.join(&file_name));
        {
            let mut meta = self.meta.write().unwrap();
            let tab = meta.tables.get_mut(tab_name).unwrap();
            tab.indexes.retain(|ix| ix.cols != col_names);
        }
        self.flush_meta()?;
        info!("sm_manager: dropped index on {}{:?}", tab_name, col_names);
        Ok(())
    }

    fn table_indexes(&self, tab_name: &str) -> Vec<IndexMeta> {
        self.meta
            .read()
            .unwrap()
            .tables
            .get(tab_name)
            .map(|t| t.indexes.clone())
            .unwrap_or_default()
    }

    fn schema_of(&self, tab_name: &str) -> SmallResult<TableSchema> {
        self.meta
            .read()
            .unwrap()
            .tables
            .get(tab_name)
            .map(|t| t.schema.clone())
            .ok_or_else(|| SmallError::TableNotFound(tab_name.to_string()))
    }
}

fn build_key_bytes(schema: &TableSchema, index: &IndexMeta, record: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(index.col_tot_len);
    for name in &index.cols {
        let col = schema.col(name).expect("index column missing from schema");
        key.extend_from_slice(&record[col.offset..col.offset + col.len]);
    }
    key
}

impl RollbackSink for SmManager {
    /// Undoes a logged insert: delete its index entries then the heap
    /// record, and emit a compensating DELETE record (spec §4.7).
    fn rollback_insert(
        &self,
        txn: &mut Transaction,
        log_manager: &LogManager,
        table: &str,
        rid: Rid,
    ) -> SmallResult<()> {
        let heap = self.heap(table)?;
        let bytes = heap.get_record(rid, None)?;
        let schema = self.schema_of(table)?;
        for ix in self.table_indexes(table) {
            let handle = self.index(&ix.file_name())?;
            let key = build_key_bytes(&schema, &ix, &bytes);
            handle.delete_entry(&key)?;
        }
        let lsn = log_manager.append_delete(txn, table, rid, bytes)?;
        heap.delete_record(rid, None)?;
        heap.set_page_lsn(rid.page_no, lsn);
        Ok(())
    }

    /// Undoes a logged delete: reinsert the record at its original
    /// rid and rebuild index entries, emitting a compensating
    /// rollback-INSERT record (spec §4.7).
    fn rollback_delete(
        &self,
        txn: &mut Transaction,
        log_manager: &LogManager,
        table: &str,
        rid: Rid,
        before: &[u8],
    ) -> SmallResult<()> {
        let heap = self.heap(table)?;
        let lsn = log_manager.append_insert(txn, table, rid, before.to_vec(), true)?;
        heap.insert_record_at(rid, before)?;
        heap.set_page_lsn(rid.page_no, lsn);
        let schema = self.schema_of(table)?;
        for ix in self.table_indexes(table) {
            let handle = self.index(&ix.file_name())?;
            let key = build_key_bytes(&schema, &ix, before);
            handle.insert_entry(&key, rid)?;
        }
        Ok(())
    }

    /// Undoes a logged update: overwrite the heap record with its
    /// before-image, swap old/new index entries, and emit a
    /// compensating UPDATE record with before/after reversed (spec
    /// §4.7).
    fn rollback_update(
        &self,
        txn: &mut Transaction,
        log_manager: &LogManager,
        table: &str,
        rid: Rid,
        before: &[u8],
    ) -> SmallResult<()> {
        let heap = self.heap(table)?;
        let after = heap.get_record(rid, None)?;
        let lsn = log_manager.append_update(txn, table, rid, after.clone(), before.to_vec())?;
        heap.update_record(rid, before, None)?;
        heap.set_page_lsn(rid.page_no, lsn);
        let schema = self.schema_of(table)?;
        for ix in self.table_indexes(table) {
            let handle = self.index(&ix.file_name())?;
            let new_key = build_key_bytes(&schema, &ix, &after);
            let old_key = build_key_bytes(&schema, &ix, before);
            if new_key != old_key {
                handle.delete_entry(&new_key)?;
                handle.insert_entry(&old_key, rid)?;
            }
        }
        Ok(())
    }
}

impl RecoveryOps for SmManager {
    /// Forward insert (`is_rollback=false`) allocates a fresh rid off
    /// the heap's free list and rebuilds index entries at that rid;
    /// compensating insert (`is_rollback=true`) places the record back
    /// at its exact recorded rid (spec §4.6 Redo INSERT). A duplicate
    /// index key during replay deletes the just-inserted heap record
    /// rather than failing recovery.
    fn redo_insert(&self, table: &str, rid: Rid, record: &[u8], is_rollback: bool) -> SmallResult<()> {
        let heap = self.heap(table)?;
        let final_rid = if is_rollback {
            heap.insert_record_at(rid, record)?;
            rid
        } else {
            heap.insert_record(record, None)?
        };

        let schema = self.schema_of(table)?;
        for ix in self.table_indexes(table) {
            let handle = self.index(&ix.file_name())?;
            let key = build_key_bytes(&schema, &ix, record);
            if !handle.insert_entry(&key, final_rid)? {
                warn!(
                    "recovery: duplicate index entry replaying insert into {}, dropping record {:?}",
                    table, final_rid
                );
                heap.delete_record(final_rid, None)?;
                break;
            }
        }
        Ok(())
    }

    /// Deletes every index entry for the record (computed from its
    /// current, still-present heap bytes) then the heap record itself
    /// (spec §4.6 Redo DELETE).
    fn redo_delete(&self, table: &str, rid: Rid) -> SmallResult<()> {
        let heap = self.heap(table)?;
        let bytes = heap.get_record(rid, None)?;
        let schema = self.schema_of(table)?;
        for ix in self.table_indexes(table) {
            let handle = self.index(&ix.file_name())?;
            let key = build_key_bytes(&schema, &ix, &bytes);
            handle.delete_entry(&key)?;
        }
        heap.delete_record(rid, None)?;
        Ok(())
    }

    /// Two-pass replay matching the source exactly (spec §4.6 Redo
    /// UPDATE): first checks every index for a key collision the
    /// update would introduce (raising before the heap is touched),
    /// then applies the heap update, then swaps each index's old/new
    /// entry.
    fn redo_update(&self, table: &str, rid: Rid, after: &[u8]) -> SmallResult<()> {
        let heap = self.heap(table)?;
        let before = heap.get_record(rid, None)?;
        let schema = self.schema_of(table)?;
        let indexes = self.table_indexes(table);

        for ix in &indexes {
            let old_key = build_key_bytes(&schema, ix, &before);
            let new_key = build_key_bytes(&schema, ix, after);
            if old_key == new_key {
                continue;
            }
            let handle = self.index(&ix.file_name())?;
            if handle.get_value(&new_key)?.is_some() {
                return Err(SmallError::IndexEntryRepeat(ix.cols.clone()));
            }
        }

        heap.update_record(rid, after, None)?;

        for ix in &indexes {
            let handle = self.index(&ix.file_name())?;
            let old_key = build_key_bytes(&schema, ix, &before);
            let new_key = build_key_bytes(&schema, ix, after);
            if old_key == new_key {
                continue;
            }
            handle.delete_entry(&old_key)?;
            if !handle.insert_entry(&new_key, rid)? {
                return Err(SmallError::IndexEntryRepeat(ix.cols.clone()));
            }
        }
        Ok(())
    }

    /// Undoes a loser's insert: fetch the record still present at
    /// `rid`, delete its index entries, then delete the heap record
    /// (spec §4.6 Undo INSERT).
    fn undo_insert(&self, table: &str, rid: Rid) -> SmallResult<()> {
        let heap = self.heap(table)?;
        let bytes = heap.get_record(rid, None)?;
        let schema = self.schema_of(table)?;
        for ix in self.table_indexes(table) {
            let handle = self.index(&ix.file_name())?;
            let key = build_key_bytes(&schema, &ix, &bytes);
            handle.delete_entry(&key)?;
        }
        heap.delete_record(rid, None)?;
        Ok(())
    }

    /// Undoes a loser's delete: reinsert the before-image at its exact
    /// rid and reinsert every index entry, duplicate-key failures
    /// deleting the reinserted heap record rather than aborting
    /// recovery (spec §4.6 Undo DELETE, mirroring Redo INSERT's
    /// duplicate handling).
    fn undo_delete(&self, table: &str, rid: Rid, before: &[u8]) -> SmallResult<()> {
        let heap = self.heap(table)?;
        heap.insert_record_at(rid, before)?;
        let schema = self.schema_of(table)?;
        for ix in self.table_indexes(table) {
            let handle = self.index(&ix.file_name())?;
            let key = build_key_bytes(&schema, &ix, before);
            if !handle.insert_entry(&key, rid)? {
                heap.delete_record(rid, None)?;
                break;
            }
        }
        Ok(())
    }

    /// Undoes a loser's update: same two-pass structure as redo
    /// update, run in reverse (spec §4.6 Undo UPDATE) — pre-check for
    /// a collision the reverted key would introduce, overwrite the
    /// heap with the before-image, then swap each index's entry back.
    fn undo_update(&self, table: &str, rid: Rid, before: &[u8]) -> SmallResult<()> {
        let heap = self.heap(table)?;
        let after = heap.get_record(rid, None)?;
        let schema = self.schema_of(table)?;
        let indexes = self.table_indexes(table);

        for ix in &indexes {
            let old_key = build_key_bytes(&schema, ix, &after);
            let new_key = build_key_bytes(&schema, ix, before);
            if old_key == new_key {
                continue;
            }
            let handle = self.index(&ix.file_name())?;
            if handle.get_value(&new_key)?.is_some() {
                return Err(SmallError::IndexEntryRepeat(ix.cols.clone()));
            }
        }

        heap.update_record(rid, before, None)?;

        for ix in &indexes {
            let handle = self.index(&ix.file_name())?;
            let old_key = build_key_bytes(&schema, ix, &after);
            let new_key = build_key_bytes(&schema, ix, before);
            if old_key == new_key {
                continue;
            }
            handle.delete_entry(&old_key)?;
            if !handle.insert_entry(&new_key, rid)? {
                return Err(SmallError::IndexEntryRepeat(ix.cols.clone()));
            }
        }
        Ok(())
    }
}
