// Shopping-list store: JSONL logs as source of truth, SQLite as index

use crate::error::{PersistenceError, StoreError, StoreResult};
use crate::filter::{Filter, Sort};
use crate::jsonl;
use crate::models::{
    ItemId, ListId, ShoppingItem, ShoppingList, next_completed_date, now_ms, validate_name, validate_quantity,
};
use crate::record::{IndexValue, Record};
use fs2::FileExt;
use rusqlite::{Connection, OptionalExtension, Transaction};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const CURRENT_VERSION: u32 = 1;
const DB_FILE: &str = "shoplist.db";
const LOCK_FILE: &str = ".lock";
const VERSION_FILE: &str = ".version";

const DAY_MS: i64 = 86_400_000;

/// Persistent store for shopping lists and their items.
///
/// Every mutation is staged in a SQLite transaction, appended to the
/// collection's JSONL log (fsync'd), and only then committed to the index.
/// A failed append rolls the transaction back.
pub struct Store {
    base_path: PathBuf,
    db: Connection,
    _lock: File,
}

/// One staged write against a collection
enum Change {
    Put {
        collection: &'static str,
        id: String,
        entry: Value,
        updated_at: i64,
        indexes: HashMap<String, IndexValue>,
    },
    Delete {
        collection: &'static str,
        id: String,
        updated_at: i64,
    },
}

impl Change {
    fn put<T: Record>(record: &T) -> StoreResult<Self> {
        Ok(Change::Put {
            collection: T::collection_name(),
            id: record.id().to_string(),
            entry: serde_json::to_value(record)?,
            updated_at: record.updated_at(),
            indexes: record.indexed_fields(),
        })
    }

    fn delete<T: Record>(id: &str, updated_at: i64) -> Self {
        Change::Delete {
            collection: T::collection_name(),
            id: id.to_string(),
            updated_at,
        }
    }

    fn collection(&self) -> &'static str {
        match self {
            Change::Put { collection, .. } | Change::Delete { collection, .. } => *collection,
        }
    }

    fn log_entry(&self) -> Value {
        match self {
            Change::Put { entry, .. } => entry.clone(),
            Change::Delete { id, updated_at, .. } => jsonl::tombstone(id, *updated_at),
        }
    }

    fn stage(&self, tx: &Transaction<'_>) -> StoreResult<()> {
        match self {
            Change::Put {
                collection,
                id,
                entry,
                updated_at,
                indexes,
            } => {
                tx.execute(
                    "INSERT OR REPLACE INTO records (collection, id, data_json, updated_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![collection, id, serde_json::to_string(entry)?, updated_at],
                )?;
                update_indexes_tx(tx, collection, id, indexes)?;
            }
            Change::Delete { collection, id, .. } => {
                tx.execute(
                    "DELETE FROM record_indexes WHERE collection = ?1 AND id = ?2",
                    rusqlite::params![collection, id],
                )?;
                tx.execute(
                    "DELETE FROM records WHERE collection = ?1 AND id = ?2",
                    rusqlite::params![collection, id],
                )?;
            }
        }
        Ok(())
    }
}

impl Store {
    /// Open or create a store in the given directory.
    ///
    /// Takes an exclusive lock on the directory for the lifetime of the
    /// returned store, and rebuilds the index if any log changed since the
    /// last sync.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let base_path = path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;

        let lock = Self::acquire_lock(&base_path)?;
        Self::check_version(&base_path)?;

        let db = Connection::open(base_path.join(DB_FILE))?;
        let mut store = Self {
            base_path,
            db,
            _lock: lock,
        };

        store.create_schema()?;

        if store.is_stale()? {
            info!(path = ?store.base_path, "Index is stale, rebuilding from JSONL logs");
            store.sync()?;
        }

        info!(path = ?store.base_path, "Store opened");
        Ok(store)
    }

    /// Directory holding the logs and index
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn acquire_lock(base_path: &Path) -> StoreResult<File> {
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(base_path.join(LOCK_FILE))?;
        lock.try_lock_exclusive()
            .map_err(|_| PersistenceError::Locked(base_path.display().to_string()))?;
        Ok(lock)
    }

    fn check_version(base_path: &Path) -> StoreResult<()> {
        let version_path = base_path.join(VERSION_FILE);
        if version_path.exists() {
            let found = fs::read_to_string(&version_path)?.trim().to_string();
            if found != CURRENT_VERSION.to_string() {
                return Err(PersistenceError::UnsupportedVersion {
                    found,
                    expected: CURRENT_VERSION,
                }
                .into());
            }
        } else {
            fs::write(version_path, CURRENT_VERSION.to_string())?;
        }
        Ok(())
    }

    fn create_schema(&self) -> StoreResult<()> {
        debug!("Creating database schema");

        self.db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                data_json TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (collection, id)
            );

            CREATE TABLE IF NOT EXISTS record_indexes (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                field_name TEXT NOT NULL,
                field_value_str TEXT,
                field_value_int INTEGER,
                field_value_bool INTEGER,
                PRIMARY KEY (collection, id, field_name)
            );

            CREATE INDEX IF NOT EXISTS idx_record_indexes_field_str ON record_indexes(collection, field_name, field_value_str);
            CREATE INDEX IF NOT EXISTS idx_record_indexes_field_int ON record_indexes(collection, field_name, field_value_int);
            CREATE INDEX IF NOT EXISTS idx_record_indexes_field_bool ON record_indexes(collection, field_name, field_value_bool);

            CREATE TABLE IF NOT EXISTS sync_metadata (
                collection TEXT PRIMARY KEY,
                last_sync_time INTEGER NOT NULL,
                file_mtime INTEGER NOT NULL
            );
            "#,
        )?;

        Ok(())
    }

    fn log_path(&self, collection: &str) -> PathBuf {
        log_path(&self.base_path, collection)
    }

    /// True if a log changed (or appeared, or vanished) since the last sync
    pub fn is_stale(&self) -> StoreResult<bool> {
        for collection in [ShoppingList::collection_name(), ShoppingItem::collection_name()] {
            let path = self.log_path(collection);

            let stored_mtime: Option<i64> = self
                .db
                .query_row(
                    "SELECT file_mtime FROM sync_metadata WHERE collection = ?1",
                    [collection],
                    |row| row.get(0),
                )
                .optional()?;

            let stale = match (path.exists(), stored_mtime) {
                (false, None) => false,
                (false, Some(_)) | (true, None) => true,
                (true, Some(mtime)) => jsonl::file_mtime(&path)? != mtime,
            };
            if stale {
                debug!(collection, "Log out of sync with index");
                return Ok(true);
            }
        }
        Ok(false)
    }

    // ========================================================================
    // Lists
    // ========================================================================

    /// Create an incomplete list stamped with the current time
    pub fn create_list(&mut self, name: &str, due_date: Option<i64>) -> StoreResult<ListId> {
        validate_name(name, "list")?;

        let now = now_ms();
        let list = ShoppingList {
            id: ListId::generate(),
            name: name.to_string(),
            timestamp: now,
            due_date,
            is_completed: false,
            completed_date: None,
            updated_at: now,
        };

        self.apply(vec![Change::put(&list)?])?;
        debug!(id = %list.id, name = %list.name, "Created list");
        Ok(list.id)
    }

    /// Overwrite name and due date; completion state is left alone
    pub fn update_list(&mut self, id: &ListId, name: &str, due_date: Option<i64>) -> StoreResult<()> {
        let mut list: ShoppingList = self.require(id.as_str())?;
        validate_name(name, "list")?;

        list.name = name.to_string();
        list.due_date = due_date;
        list.updated_at = now_ms().max(list.updated_at);

        self.apply(vec![Change::put(&list)?])?;
        debug!(%id, "Updated list");
        Ok(())
    }

    /// Set the completion flag. Items are not touched.
    pub fn set_list_completion(&mut self, id: &ListId, completed: bool) -> StoreResult<()> {
        let mut list: ShoppingList = self.require(id.as_str())?;

        let now = now_ms();
        list.completed_date = next_completed_date(list.is_completed, list.completed_date, completed, now);
        list.is_completed = completed;
        list.updated_at = now.max(list.updated_at);

        self.apply(vec![Change::put(&list)?])?;
        debug!(%id, completed, "Set list completion");
        Ok(())
    }

    /// Delete a list and every item it owns
    pub fn delete_list(&mut self, id: &ListId) -> StoreResult<()> {
        let list: ShoppingList = self.require(id.as_str())?;
        let items: Vec<ShoppingItem> = self.list_records(&[Filter::eq_str("list_id", id.as_str())])?;

        let now = now_ms().max(list.updated_at);
        // The list tombstone is the commit point; item tombstones can be
        // re-derived by sync's orphan pruning
        let mut changes = vec![Change::delete::<ShoppingList>(id.as_str(), now)];
        changes.extend(
            items
                .iter()
                .map(|item| Change::delete::<ShoppingItem>(item.id.as_str(), now.max(item.updated_at))),
        );

        self.apply(changes)?;
        debug!(%id, items = items.len(), "Deleted list");
        Ok(())
    }

    /// Look up a single list
    pub fn get_list(&self, id: &ListId) -> StoreResult<ShoppingList> {
        self.require(id.as_str())
    }

    // ========================================================================
    // Items
    // ========================================================================

    /// Add an item to an existing list
    pub fn create_item(
        &mut self,
        list_id: &ListId,
        name: &str,
        category: &str,
        quantity: f64,
        unit: &str,
    ) -> StoreResult<ItemId> {
        let _list: ShoppingList = self.require(list_id.as_str())?;
        validate_name(name, "item")?;
        validate_quantity(quantity)?;

        let now = now_ms();
        let item = ShoppingItem {
            id: ItemId::generate(),
            list_id: list_id.clone(),
            name: name.to_string(),
            category: category.to_string(),
            quantity,
            unit: unit.to_string(),
            timestamp: now,
            is_completed: false,
            completed_date: None,
            updated_at: now,
        };

        self.apply(vec![Change::put(&item)?])?;
        debug!(id = %item.id, %list_id, name = %item.name, "Created item");
        Ok(item.id)
    }

    /// Overwrite an item's editable fields; it stays in its list
    pub fn update_item(
        &mut self,
        id: &ItemId,
        name: &str,
        category: &str,
        quantity: f64,
        unit: &str,
    ) -> StoreResult<()> {
        let mut item: ShoppingItem = self.require(id.as_str())?;
        validate_name(name, "item")?;
        validate_quantity(quantity)?;

        item.name = name.to_string();
        item.category = category.to_string();
        item.quantity = quantity;
        item.unit = unit.to_string();
        item.updated_at = now_ms().max(item.updated_at);

        self.apply(vec![Change::put(&item)?])?;
        debug!(%id, "Updated item");
        Ok(())
    }

    pub fn set_item_completion(&mut self, id: &ItemId, completed: bool) -> StoreResult<()> {
        let mut item: ShoppingItem = self.require(id.as_str())?;

        let now = now_ms();
        item.completed_date = next_completed_date(item.is_completed, item.completed_date, completed, now);
        item.is_completed = completed;
        item.updated_at = now.max(item.updated_at);

        self.apply(vec![Change::put(&item)?])?;
        debug!(%id, completed, "Set item completion");
        Ok(())
    }

    pub fn delete_item(&mut self, id: &ItemId) -> StoreResult<()> {
        let item: ShoppingItem = self.require(id.as_str())?;
        let now = now_ms().max(item.updated_at);

        self.apply(vec![Change::delete::<ShoppingItem>(id.as_str(), now)])?;
        debug!(%id, "Deleted item");
        Ok(())
    }

    pub fn get_item(&self, id: &ItemId) -> StoreResult<ShoppingItem> {
        self.require(id.as_str())
    }

    // ========================================================================
    // Durability
    // ========================================================================

    /// Flush every log to disk and mark the index as in sync with them.
    ///
    /// Mutations are already durable when they return; this makes the next
    /// `open` skip the rebuild.
    pub fn commit(&mut self) -> StoreResult<()> {
        let tx = self.db.transaction()?;
        for collection in [ShoppingList::collection_name(), ShoppingItem::collection_name()] {
            let path = log_path(&self.base_path, collection);
            jsonl::flush(&path)?;
            record_sync_metadata(&tx, collection, &path)?;
        }
        tx.commit()?;
        debug!("Committed store");
        Ok(())
    }

    /// Rebuild the index from the JSONL logs.
    ///
    /// Latest entry per id wins, tombstones are dropped, and entries that
    /// fail to deserialize are skipped with a warning. Items whose list no
    /// longer exists are removed from the index and tombstoned in the log.
    pub fn sync(&mut self) -> StoreResult<()> {
        info!("Syncing index from JSONL logs");

        let tx = self.db.transaction()?;
        tx.execute("DELETE FROM record_indexes", [])?;
        tx.execute("DELETE FROM records", [])?;

        let lists = load_collection::<ShoppingList>(&tx, &log_path(&self.base_path, ShoppingList::collection_name()))?;
        let items = load_collection::<ShoppingItem>(&tx, &log_path(&self.base_path, ShoppingItem::collection_name()))?;

        let list_ids: HashSet<&str> = lists.iter().map(|l| l.id.as_str()).collect();
        let orphans: Vec<&ShoppingItem> = items
            .iter()
            .filter(|item| !list_ids.contains(item.list_id.as_str()))
            .collect();

        if !orphans.is_empty() {
            warn!(count = orphans.len(), "Pruning items whose list no longer exists");
            let now = now_ms();
            let mut tombstones = Vec::with_capacity(orphans.len());
            for orphan in &orphans {
                let change = Change::delete::<ShoppingItem>(orphan.id.as_str(), now.max(orphan.updated_at));
                change.stage(&tx)?;
                tombstones.push(change.log_entry());
            }
            // Pruning is re-derived on every sync, so a failed tombstone write only delays compaction
            if let Err(e) = jsonl::append_batch(&log_path(&self.base_path, ShoppingItem::collection_name()), &tombstones)
            {
                warn!(error = %e, "Failed to tombstone pruned items");
            }
        }

        for collection in [ShoppingList::collection_name(), ShoppingItem::collection_name()] {
            record_sync_metadata(&tx, collection, &log_path(&self.base_path, collection))?;
        }

        tx.commit()?;
        info!(
            lists = lists.len(),
            items = items.len() - orphans.len(),
            "Sync complete"
        );
        Ok(())
    }

    /// Populate two sample lists: an open grocery run and a finished
    /// electronics purchase.
    pub fn seed_sample_data(&mut self) -> StoreResult<Vec<ListId>> {
        let now = now_ms();

        let grocery = self.create_list("Grocery Shopping", Some(now + DAY_MS))?;
        let electronics = self.create_list("Electronics", Some(now + 2 * DAY_MS))?;
        self.set_list_completion(&electronics, true)?;

        let samples = [
            (&grocery, "Milk", "Groceries", 2.0, true),
            (&grocery, "Bread", "Groceries", 1.0, false),
            (&grocery, "Eggs", "Groceries", 12.0, false),
            (&electronics, "USB Cable", "Electronics", 1.0, true),
            (&electronics, "Power Bank", "Electronics", 1.0, true),
        ];
        for (list_id, name, category, quantity, completed) in samples {
            let item = self.create_item(list_id, name, category, quantity, crate::models::DEFAULT_UNIT)?;
            if completed {
                self.set_item_completion(&item, true)?;
            }
        }

        info!("Seeded sample data");
        Ok(vec![grocery, electronics])
    }

    // ========================================================================
    // Record engine
    // ========================================================================

    fn fetch<T: Record>(&self, id: &str) -> StoreResult<Option<T>> {
        let json: Option<String> = self
            .db
            .query_row(
                "SELECT data_json FROM records WHERE collection = ?1 AND id = ?2",
                rusqlite::params![T::collection_name(), id],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn require<T: Record>(&self, id: &str) -> StoreResult<T> {
        self.fetch(id)?.ok_or_else(|| StoreError::not_found(T::kind(), id))
    }

    /// All records of a type matching every filter, newest write first
    pub(crate) fn list_records<T: Record>(&self, filters: &[Filter]) -> StoreResult<Vec<T>> {
        self.list_records_sorted(filters, &[])
    }

    /// Records matching every filter, ordered by indexed fields.
    ///
    /// Ties after the last sort key fall back to id descending. With no sort
    /// keys the order is newest write first.
    pub(crate) fn list_records_sorted<T: Record>(&self, filters: &[Filter], sorts: &[Sort]) -> StoreResult<Vec<T>> {
        let mut query = String::from("SELECT r.data_json FROM records r WHERE r.collection = ?1");
        let mut params: Vec<rusqlite::types::Value> = vec![T::collection_name().to_string().into()];

        for (i, filter) in filters.iter().enumerate() {
            validate_field_name(&filter.field)?;
            let field_param = params.len() + 1;
            query.push_str(&filter.to_exists_clause(&format!("idx{}", i), field_param, field_param + 1));
            params.push(filter.field.clone().into());
            params.push(filter.value.to_sql_value());
        }

        if sorts.is_empty() {
            query.push_str(" ORDER BY r.updated_at DESC");
        } else {
            let mut terms = Vec::with_capacity(sorts.len() + 1);
            for (i, sort) in sorts.iter().enumerate() {
                validate_field_name(sort.field)?;
                terms.push(sort.to_order_term(&format!("ord{}", i), params.len() + 1));
                params.push(sort.field.to_string().into());
            }
            terms.push("r.id DESC".to_string());
            query.push_str(" ORDER BY ");
            query.push_str(&terms.join(", "));
        }

        let mut stmt = self.db.prepare(&query)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(params), |row| row.get::<_, String>(0))?;

        let mut results = Vec::new();
        for row in rows {
            results.push(serde_json::from_str(&row?)?);
        }
        Ok(results)
    }

    /// Stage all changes, append them to the logs, then commit the index.
    ///
    /// The first collection's batch is the commit point: if it fails the
    /// transaction is dropped and nothing is applied. Batches after it must
    /// be ones `sync` can re-derive (cascade tombstones), so a failure there
    /// is logged and the change still commits.
    fn apply(&mut self, changes: Vec<Change>) -> StoreResult<()> {
        let tx = self.db.transaction()?;
        for change in &changes {
            change.stage(&tx)?;
        }

        let mut batches: Vec<(&'static str, Vec<Value>)> = Vec::new();
        for change in &changes {
            match batches.iter_mut().find(|(c, _)| *c == change.collection()) {
                Some((_, entries)) => entries.push(change.log_entry()),
                None => batches.push((change.collection(), vec![change.log_entry()])),
            }
        }

        let Some(((head_collection, head_entries), rest)) = batches.split_first() else {
            return Ok(());
        };

        if let Err(e) = jsonl::append_batch(&log_path(&self.base_path, head_collection), head_entries) {
            warn!(collection = *head_collection, error = %e, "Log append failed, rolled back");
            return Err(e.into());
        }

        for (collection, entries) in rest {
            if let Err(e) = jsonl::append_batch(&log_path(&self.base_path, collection), entries) {
                warn!(collection = *collection, error = %e, "Follow-up log append failed, next sync repairs it");
            }
        }

        if let Err(e) = tx.commit() {
            // The logs already hold the change, so rebuilding applies it
            warn!(error = %e, "Index commit failed after log append, rebuilding");
            self.sync()?;
        }
        Ok(())
    }
}

fn log_path(base_path: &Path, collection: &str) -> PathBuf {
    base_path.join(format!("{}.jsonl", collection))
}

/// Remember the log's current mtime, or forget it if the log is absent
fn record_sync_metadata(tx: &Transaction<'_>, collection: &str, path: &Path) -> StoreResult<()> {
    if !path.exists() {
        tx.execute("DELETE FROM sync_metadata WHERE collection = ?1", [collection])?;
        return Ok(());
    }
    tx.execute(
        "INSERT OR REPLACE INTO sync_metadata (collection, last_sync_time, file_mtime)
         VALUES (?1, ?2, ?3)",
        rusqlite::params![collection, now_ms(), jsonl::file_mtime(path)?],
    )?;
    Ok(())
}

/// Insert the live records of one log into the index
fn load_collection<T: Record>(tx: &Transaction<'_>, path: &Path) -> StoreResult<Vec<T>> {
    let collection = T::collection_name();
    let mut loaded = Vec::new();

    for (id, entry) in jsonl::read_latest(path)? {
        if jsonl::is_tombstone(&entry) {
            continue;
        }

        let record: T = match serde_json::from_value(entry) {
            Ok(r) => r,
            Err(e) => {
                warn!(collection, id = %id, error = ?e, "Skipping entry that doesn't match type");
                continue;
            }
        };

        Change::put(&record)?.stage(tx)?;
        loaded.push(record);
    }

    debug!(collection, count = loaded.len(), "Loaded collection");
    Ok(loaded)
}

fn update_indexes_tx(
    tx: &Transaction<'_>,
    collection: &str,
    id: &str,
    fields: &HashMap<String, IndexValue>,
) -> StoreResult<()> {
    tx.execute(
        "DELETE FROM record_indexes WHERE collection = ?1 AND id = ?2",
        rusqlite::params![collection, id],
    )?;

    for (field_name, value) in fields {
        validate_field_name(field_name)?;
        tx.execute(
            &format!(
                "INSERT INTO record_indexes (collection, id, field_name, {}) VALUES (?1, ?2, ?3, ?4)",
                value.column()
            ),
            rusqlite::params![collection, id, field_name, value.to_sql_value()],
        )?;
    }

    Ok(())
}

fn validate_field_name(name: &str) -> StoreResult<()> {
    if name.is_empty() || name.len() > 64 || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(PersistenceError::Corrupt(format!("invalid index field name: {:?}", name)).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_temp() -> (TempDir, Store) {
        let temp = TempDir::new().unwrap();
        let store = Store::open(temp.path()).unwrap();
        (temp, store)
    }

    fn assert_completion_invariant(store: &Store) {
        for list in store.list_records::<ShoppingList>(&[]).unwrap() {
            assert_eq!(list.is_completed, list.completed_date.is_some(), "list {}", list.id);
        }
        for item in store.list_records::<ShoppingItem>(&[]).unwrap() {
            assert_eq!(item.is_completed, item.completed_date.is_some(), "item {}", item.id);
        }
    }

    #[test]
    fn test_store_open_creates_layout() {
        let (temp, _store) = open_temp();
        assert!(temp.path().join(DB_FILE).exists());
        assert!(temp.path().join(VERSION_FILE).exists());
        assert!(temp.path().join(LOCK_FILE).exists());
    }

    #[test]
    fn test_second_open_is_locked() {
        let (temp, _store) = open_temp();
        let err = Store::open(temp.path()).err().unwrap();
        assert!(matches!(err, StoreError::Persistence(PersistenceError::Locked(_))));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(VERSION_FILE), "99").unwrap();

        let err = Store::open(temp.path()).err().unwrap();
        assert!(matches!(
            err,
            StoreError::Persistence(PersistenceError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn test_create_list() {
        let (temp, mut store) = open_temp();
        let id = store.create_list("Weekly", Some(1_700_000_000_000)).unwrap();

        let list = store.get_list(&id).unwrap();
        assert_eq!(list.name, "Weekly");
        assert_eq!(list.due_date, Some(1_700_000_000_000));
        assert!(!list.is_completed);
        assert!(list.completed_date.is_none());
        assert!(temp.path().join("lists.jsonl").exists());
    }

    #[test]
    fn test_create_list_empty_name_leaves_no_trace() {
        let (temp, mut store) = open_temp();

        assert!(matches!(store.create_list("", None), Err(StoreError::Validation(_))));
        assert!(matches!(store.create_list("  ", None), Err(StoreError::Validation(_))));

        assert!(store.list_records::<ShoppingList>(&[]).unwrap().is_empty());
        assert!(!temp.path().join("lists.jsonl").exists());
    }

    #[test]
    fn test_update_list_keeps_timestamp_and_completion() {
        let (_temp, mut store) = open_temp();
        let id = store.create_list("Weekly", None).unwrap();
        store.set_list_completion(&id, true).unwrap();
        let before = store.get_list(&id).unwrap();

        store.update_list(&id, "Weekend", Some(42)).unwrap();

        let after = store.get_list(&id).unwrap();
        assert_eq!(after.name, "Weekend");
        assert_eq!(after.due_date, Some(42));
        assert_eq!(after.timestamp, before.timestamp);
        assert!(after.is_completed);
        assert_eq!(after.completed_date, before.completed_date);
    }

    #[test]
    fn test_update_list_errors() {
        let (_temp, mut store) = open_temp();
        let id = store.create_list("Weekly", None).unwrap();

        assert!(matches!(store.update_list(&id, "", None), Err(StoreError::Validation(_))));
        assert_eq!(store.get_list(&id).unwrap().name, "Weekly");

        let missing = ListId::from("missing");
        assert!(matches!(
            store.update_list(&missing, "x", None),
            Err(StoreError::NotFound { kind: "list", .. })
        ));
    }

    #[test]
    fn test_list_completion_transitions() {
        let (_temp, mut store) = open_temp();
        let id = store.create_list("Weekly", None).unwrap();

        store.set_list_completion(&id, true).unwrap();
        let done = store.get_list(&id).unwrap();
        assert!(done.is_completed);
        let stamped = done.completed_date.unwrap();

        // No transition, no new stamp
        store.set_list_completion(&id, true).unwrap();
        assert_eq!(store.get_list(&id).unwrap().completed_date, Some(stamped));

        store.set_list_completion(&id, false).unwrap();
        let reopened = store.get_list(&id).unwrap();
        assert!(!reopened.is_completed);
        assert!(reopened.completed_date.is_none());

        assert_completion_invariant(&store);
    }

    #[test]
    fn test_list_completion_does_not_cascade() {
        let (_temp, mut store) = open_temp();
        let list = store.create_list("Weekly", None).unwrap();
        let item = store.create_item(&list, "Milk", "Groceries", 1.0, "piece").unwrap();

        store.set_list_completion(&list, true).unwrap();
        assert!(!store.get_item(&item).unwrap().is_completed);
    }

    #[test]
    fn test_set_completion_unknown_ids() {
        let (_temp, mut store) = open_temp();
        assert!(matches!(
            store.set_list_completion(&ListId::from("nope"), true),
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.set_item_completion(&ItemId::from("nope"), true),
            Err(StoreError::NotFound { kind: "item", .. })
        ));
    }

    #[test]
    fn test_create_item_validation() {
        let (_temp, mut store) = open_temp();
        let list = store.create_list("Weekly", None).unwrap();

        assert!(matches!(
            store.create_item(&list, "", "Groceries", 1.0, "piece"),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            store.create_item(&list, "Milk", "Groceries", 0.0, "piece"),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            store.create_item(&list, "Milk", "Groceries", -2.0, "piece"),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            store.create_item(&ListId::from("missing"), "Milk", "Groceries", 1.0, "piece"),
            Err(StoreError::NotFound { kind: "list", .. })
        ));

        assert!(store.list_records::<ShoppingItem>(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_create_item_accepts_any_positive_quantity_and_open_strings() {
        let (_temp, mut store) = open_temp();
        let list = store.create_list("Weekly", None).unwrap();

        let id = store.create_item(&list, "Flour", "Baking", 37.25, "sack").unwrap();
        let item = store.get_item(&id).unwrap();
        assert_eq!(item.quantity, 37.25);
        assert_eq!(item.category, "Baking");
        assert_eq!(item.unit, "sack");
        assert_eq!(item.list_id, list);
    }

    #[test]
    fn test_update_item() {
        let (_temp, mut store) = open_temp();
        let list = store.create_list("Weekly", None).unwrap();
        let id = store.create_item(&list, "Milk", "Groceries", 1.0, "piece").unwrap();
        let before = store.get_item(&id).unwrap();

        store.update_item(&id, "Oat milk", "Other", 1.5, "liter").unwrap();

        let after = store.get_item(&id).unwrap();
        assert_eq!(after.name, "Oat milk");
        assert_eq!(after.category, "Other");
        assert_eq!(after.quantity, 1.5);
        assert_eq!(after.unit, "liter");
        assert_eq!(after.timestamp, before.timestamp);
        assert_eq!(after.list_id, list);

        assert!(matches!(
            store.update_item(&id, "Oat milk", "Other", 0.0, "liter"),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            store.update_item(&ItemId::from("missing"), "x", "y", 1.0, "piece"),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_item_completion_transitions() {
        let (_temp, mut store) = open_temp();
        let list = store.create_list("Weekly", None).unwrap();
        let id = store.create_item(&list, "Milk", "Groceries", 2.0, "piece").unwrap();

        store.set_item_completion(&id, true).unwrap();
        let item = store.get_item(&id).unwrap();
        assert!(item.is_completed);
        assert!(item.completed_date.is_some());

        store.set_item_completion(&id, false).unwrap();
        let item = store.get_item(&id).unwrap();
        assert!(!item.is_completed);
        assert!(item.completed_date.is_none());

        assert_completion_invariant(&store);
    }

    #[test]
    fn test_delete_item() {
        let (_temp, mut store) = open_temp();
        let list = store.create_list("Weekly", None).unwrap();
        let id = store.create_item(&list, "Milk", "Groceries", 2.0, "piece").unwrap();

        store.delete_item(&id).unwrap();
        assert!(matches!(store.get_item(&id), Err(StoreError::NotFound { .. })));
        assert!(matches!(store.delete_item(&id), Err(StoreError::NotFound { .. })));
        assert!(store.get_list(&list).is_ok());
    }

    #[test]
    fn test_delete_list_cascades_to_items() {
        let (_temp, mut store) = open_temp();
        let doomed = store.create_list("Party", None).unwrap();
        let kept = store.create_list("Weekly", None).unwrap();

        let a = store.create_item(&doomed, "Chips", "Groceries", 3.0, "piece").unwrap();
        let b = store.create_item(&doomed, "Cups", "Home", 20.0, "piece").unwrap();
        let c = store.create_item(&kept, "Milk", "Groceries", 1.0, "liter").unwrap();

        store.delete_list(&doomed).unwrap();

        assert!(matches!(store.get_list(&doomed), Err(StoreError::NotFound { .. })));
        assert!(store.get_item(&a).is_err());
        assert!(store.get_item(&b).is_err());
        assert!(store.get_item(&c).is_ok());

        let remaining: Vec<ShoppingItem> = store.list_records(&[]).unwrap();
        assert_eq!(remaining.len(), 1);

        assert!(matches!(store.delete_list(&doomed), Err(StoreError::NotFound { .. })));
    }

    /// Swap a log file for a directory so appends to it fail
    fn break_log(temp: &TempDir, collection: &str) -> Option<String> {
        let path = temp.path().join(format!("{}.jsonl", collection));
        let saved = fs::read_to_string(&path).ok();
        if saved.is_some() {
            fs::remove_file(&path).unwrap();
        }
        fs::create_dir(&path).unwrap();
        saved
    }

    fn restore_log(temp: &TempDir, collection: &str, content: Option<String>) {
        let path = temp.path().join(format!("{}.jsonl", collection));
        fs::remove_dir(&path).unwrap();
        if let Some(content) = content {
            fs::write(&path, content).unwrap();
        }
    }

    #[test]
    fn test_delete_list_survives_failed_item_tombstones() {
        let temp = TempDir::new().unwrap();
        let mut store = Store::open(temp.path()).unwrap();
        let list = store.create_list("Party", None).unwrap();
        let item = store.create_item(&list, "Chips", "Groceries", 3.0, "piece").unwrap();

        let items_log = break_log(&temp, "items");
        store.delete_list(&list).unwrap();

        assert!(matches!(store.get_list(&list), Err(StoreError::NotFound { .. })));
        assert!(matches!(store.get_item(&item), Err(StoreError::NotFound { .. })));

        // Item log never got its tombstone; a rebuild must still drop the item
        restore_log(&temp, "items", items_log);
        drop(store);
        fs::remove_file(temp.path().join(DB_FILE)).unwrap();

        let store = Store::open(temp.path()).unwrap();
        assert!(matches!(store.get_list(&list), Err(StoreError::NotFound { .. })));
        assert!(matches!(store.get_item(&item), Err(StoreError::NotFound { .. })));
        let items_log = fs::read_to_string(temp.path().join("items.jsonl")).unwrap();
        assert!(items_log.lines().last().unwrap().contains("\"deleted\":true"));
    }

    #[test]
    fn test_delete_list_failed_append_changes_nothing() {
        let temp = TempDir::new().unwrap();
        let mut store = Store::open(temp.path()).unwrap();
        let list = store.create_list("Party", None).unwrap();
        let item = store.create_item(&list, "Chips", "Groceries", 3.0, "piece").unwrap();

        break_log(&temp, "lists");
        let err = store.delete_list(&list).unwrap_err();

        assert!(matches!(err, StoreError::Persistence(_)));
        assert_eq!(store.get_list(&list).unwrap().name, "Party");
        assert_eq!(store.get_item(&item).unwrap().list_id, list);
        assert_eq!(store.list_items(&list, None).unwrap().len(), 1);
    }

    #[test]
    fn test_create_item_failed_append_rolls_back() {
        let temp = TempDir::new().unwrap();
        let mut store = Store::open(temp.path()).unwrap();
        let list = store.create_list("Weekly", None).unwrap();

        break_log(&temp, "items");
        let err = store.create_item(&list, "Milk", "Groceries", 1.0, "liter").unwrap_err();

        assert!(matches!(err, StoreError::Persistence(_)));
        assert!(store.list_items(&list, None).unwrap().is_empty());
        assert!(store.list_records::<ShoppingItem>(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_item_mutations_failed_append_roll_back() {
        let temp = TempDir::new().unwrap();
        let mut store = Store::open(temp.path()).unwrap();
        let list = store.create_list("Weekly", None).unwrap();
        let item = store.create_item(&list, "Milk", "Groceries", 1.0, "liter").unwrap();
        let before = store.get_item(&item).unwrap();

        break_log(&temp, "items");

        let err = store.update_item(&item, "Oat milk", "Other", 2.0, "liter").unwrap_err();
        assert!(matches!(err, StoreError::Persistence(_)));
        assert_eq!(store.get_item(&item).unwrap(), before);
        assert!(store.list_items(&list, Some("Other")).unwrap().is_empty());

        let err = store.delete_item(&item).unwrap_err();
        assert!(matches!(err, StoreError::Persistence(_)));
        assert_eq!(store.get_item(&item).unwrap(), before);
        assert_eq!(store.list_items(&list, None).unwrap(), vec![before]);
    }

    #[test]
    fn test_reopen_restores_state_from_logs() {
        let temp = TempDir::new().unwrap();
        let (list, item) = {
            let mut store = Store::open(temp.path()).unwrap();
            let list = store.create_list("Weekly", Some(7)).unwrap();
            let item = store.create_item(&list, "Milk", "Groceries", 2.0, "piece").unwrap();
            store.set_item_completion(&item, true).unwrap();
            (list, item)
        };

        // Throw the index away entirely
        fs::remove_file(temp.path().join(DB_FILE)).unwrap();

        let store = Store::open(temp.path()).unwrap();
        assert_eq!(store.get_list(&list).unwrap().due_date, Some(7));
        let item = store.get_item(&item).unwrap();
        assert!(item.is_completed);
        assert!(item.completed_date.is_some());

        let by_list: Vec<ShoppingItem> = store.list_records(&[Filter::eq_str("list_id", list.as_str())]).unwrap();
        assert_eq!(by_list.len(), 1);
    }

    #[test]
    fn test_reopen_honours_tombstones() {
        let temp = TempDir::new().unwrap();
        let list = {
            let mut store = Store::open(temp.path()).unwrap();
            let list = store.create_list("Party", None).unwrap();
            store.create_item(&list, "Chips", "Groceries", 1.0, "piece").unwrap();
            store.delete_list(&list).unwrap();
            list
        };

        let mut store = Store::open(temp.path()).unwrap();
        store.sync().unwrap();
        assert!(store.get_list(&list).is_err());
        assert!(store.list_records::<ShoppingItem>(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_sync_prunes_orphaned_items() {
        let temp = TempDir::new().unwrap();
        {
            let mut store = Store::open(temp.path()).unwrap();
            let list = store.create_list("Party", None).unwrap();
            store.create_item(&list, "Chips", "Groceries", 1.0, "piece").unwrap();
            // Simulate a torn cascade: list tombstone landed, item tombstones did not
            jsonl::append_batch(
                &temp.path().join("lists.jsonl"),
                &[jsonl::tombstone(list.as_str(), now_ms() + 1)],
            )
            .unwrap();
        }

        let mut store = Store::open(temp.path()).unwrap();
        store.sync().unwrap();
        assert!(store.list_records::<ShoppingList>(&[]).unwrap().is_empty());
        assert!(store.list_records::<ShoppingItem>(&[]).unwrap().is_empty());

        let log = fs::read_to_string(temp.path().join("items.jsonl")).unwrap();
        assert!(log.contains("\"deleted\":true"));
    }

    #[test]
    fn test_commit_marks_index_fresh() {
        let (_temp, mut store) = open_temp();
        store.create_list("Weekly", None).unwrap();
        assert!(store.is_stale().unwrap());

        store.commit().unwrap();
        assert!(!store.is_stale().unwrap());
    }

    #[test]
    fn test_fresh_store_is_not_stale() {
        let (_temp, store) = open_temp();
        assert!(!store.is_stale().unwrap());
    }

    #[test]
    fn test_seed_sample_data() {
        let (_temp, mut store) = open_temp();
        let ids = store.seed_sample_data().unwrap();
        assert_eq!(ids.len(), 2);

        let grocery = store.get_list(&ids[0]).unwrap();
        assert_eq!(grocery.name, "Grocery Shopping");
        assert!(!grocery.is_completed);

        let electronics = store.get_list(&ids[1]).unwrap();
        assert!(electronics.is_completed);

        let items: Vec<ShoppingItem> = store.list_records(&[]).unwrap();
        assert_eq!(items.len(), 5);
        assert_eq!(items.iter().filter(|i| i.is_completed).count(), 3);
        assert_completion_invariant(&store);
    }

    #[test]
    fn test_validate_field_name() {
        assert!(validate_field_name("list_id").is_ok());
        assert!(validate_field_name("bad-field").is_err());
        assert!(validate_field_name("").is_err());
        assert!(validate_field_name(&"a".repeat(65)).is_err());
    }
}
