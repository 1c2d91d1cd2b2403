//! StateStore: redb-backed persistence for SimpleDBs and their workloads.
//!
//! Plays two roles in standalone mode: the desired-state store (SimpleDB
//! specs and status conditions) and the workload backend (workload specs and
//! observed replica counters). Values are JSON-serialized into redb's `&[u8]`
//! value columns. Both on-disk and in-memory backends are supported (the
//! latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

type JsonTable = TableDefinition<'static, &'static str, &'static [u8]>;

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(SIMPLEDBS).map_err(map_err!(Table))?;
        txn.open_table(WORKLOADS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── SimpleDBs ──────────────────────────────────────────────────

    /// Insert or replace a SimpleDB record as-is.
    pub fn put_simpledb(&self, db: &SimpleDb) -> StateResult<()> {
        db.key().validate()?;
        let key = db.table_key();
        self.put_json(SIMPLEDBS, &key, db)?;
        debug!(%key, "simpledb stored");
        Ok(())
    }

    /// Create or replace the spec of a SimpleDB, keeping any stored status.
    ///
    /// Identity and spec are validated first; invalid objects are never
    /// admitted. Returns the stored object and whether it was newly created.
    pub fn apply_simpledb(
        &self,
        namespace: &str,
        name: &str,
        spec: SimpleDbSpec,
    ) -> StateResult<(SimpleDb, bool)> {
        let object_key = ObjectKey::new(namespace, name);
        object_key.validate()?;
        spec.validate()?;
        let key = object_key.table_key();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let (applied, created) = {
            let mut table = txn.open_table(SIMPLEDBS).map_err(map_err!(Table))?;
            let existing: Option<SimpleDb> = match table.get(key.as_str()).map_err(map_err!(Read))? {
                Some(guard) => Some(decode(guard.value())?),
                None => None,
            };
            let created = existing.is_none();
            let applied = match existing {
                Some(mut db) => {
                    db.spec = spec;
                    db
                }
                None => SimpleDb::new(namespace, name, spec),
            };
            let value = encode(&applied)?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
            (applied, created)
        };
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, replicas = applied.spec.replicas, created, "simpledb applied");
        Ok((applied, created))
    }

    /// Get a SimpleDB by namespace/name key.
    pub fn get_simpledb(&self, key: &str) -> StateResult<Option<SimpleDb>> {
        self.get_json(SIMPLEDBS, key)
    }

    /// List all SimpleDBs.
    pub fn list_simpledbs(&self) -> StateResult<Vec<SimpleDb>> {
        self.list_json(SIMPLEDBS)
    }

    /// Replace the status conditions of an existing SimpleDB.
    ///
    /// The spec is left untouched, even if it changed since the caller read it.
    pub fn write_status(&self, key: &str, conditions: Vec<Condition>) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(SIMPLEDBS).map_err(map_err!(Table))?;
            let mut db: SimpleDb = match table.get(key).map_err(map_err!(Read))? {
                Some(guard) => decode(guard.value())?,
                None => return Err(StateError::NotFound(key.to_string())),
            };
            db.status.conditions = conditions;
            let value = encode(&db)?;
            table.insert(key, value.as_slice()).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, "simpledb status written");
        Ok(())
    }

    /// Delete a SimpleDB by key. Returns true if it existed.
    ///
    /// Garbage-collects the workload it owns in the same transaction.
    /// A workload at the same key without a matching owner reference is kept.
    pub fn delete_simpledb(&self, key: &str) -> StateResult<bool> {
        let owner = ObjectKey::parse(key);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        let mut collected = false;
        {
            let mut table = txn.open_table(SIMPLEDBS).map_err(map_err!(Table))?;
            existed = table.remove(key).map_err(map_err!(Write))?.is_some();
        }
        if existed && let Some(owner) = owner {
            let mut table = txn.open_table(WORKLOADS).map_err(map_err!(Table))?;
            let owned = match table.get(key).map_err(map_err!(Read))? {
                Some(guard) => decode::<Workload>(guard.value())?.is_owned_by(&owner),
                None => false,
            };
            if owned {
                table.remove(key).map_err(map_err!(Write))?;
                collected = true;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, existed, workload_collected = collected, "simpledb deleted");
        Ok(existed)
    }

    // ── Workloads ──────────────────────────────────────────────────

    /// Get a workload by its owner's namespace/name key.
    pub fn get_workload(&self, key: &str) -> StateResult<Option<Workload>> {
        self.get_json(WORKLOADS, key)
    }

    /// List all workloads.
    pub fn list_workloads(&self) -> StateResult<Vec<Workload>> {
        self.list_json(WORKLOADS)
    }

    /// Create a workload. Fails with `AlreadyExists` if one is stored at its key.
    pub fn create_workload(&self, workload: &Workload) -> StateResult<()> {
        let key = workload.table_key();
        let value = encode(workload)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(WORKLOADS).map_err(map_err!(Table))?;
            if table.get(key.as_str()).map_err(map_err!(Read))?.is_some() {
                return Err(StateError::AlreadyExists(key));
            }
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, replicas = workload.spec.replicas, "workload created");
        Ok(())
    }

    /// Update the labels, owner and spec of an existing workload.
    ///
    /// Observed counters stay as the backend last reported them.
    pub fn update_workload(&self, workload: &Workload) -> StateResult<()> {
        let key = workload.table_key();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(WORKLOADS).map_err(map_err!(Table))?;
            let stored: Workload = match table.get(key.as_str()).map_err(map_err!(Read))? {
                Some(guard) => decode(guard.value())?,
                None => return Err(StateError::NotFound(key)),
            };
            let updated = Workload {
                status: stored.status,
                ..workload.clone()
            };
            let value = encode(&updated)?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, replicas = workload.spec.replicas, "workload updated");
        Ok(())
    }

    /// Record new observed counters for a workload.
    pub fn update_workload_status(&self, key: &str, status: WorkloadStatus) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(WORKLOADS).map_err(map_err!(Table))?;
            let mut workload: Workload = match table.get(key).map_err(map_err!(Read))? {
                Some(guard) => decode(guard.value())?,
                None => return Err(StateError::NotFound(key.to_string())),
            };
            workload.status = status;
            let value = encode(&workload)?;
            table.insert(key, value.as_slice()).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Internal helpers ───────────────────────────────────────────

    fn put_json<T: Serialize>(&self, table: JsonTable, key: &str, value: &T) -> StateResult<()> {
        let value = encode(value)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(table).map_err(map_err!(Table))?;
            table.insert(key, value.as_slice()).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn get_json<T: DeserializeOwned>(&self, table: JsonTable, key: &str) -> StateResult<Option<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table).map_err(map_err!(Table))?;
        match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    fn list_json<T: DeserializeOwned>(&self, table: JsonTable) -> StateResult<Vec<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            results.push(decode(value.value())?);
        }
        Ok(results)
    }
}

fn encode<T: Serialize>(value: &T) -> StateResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(map_err!(Serialize))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StateResult<T> {
    serde_json::from_slice(bytes).map_err(map_err!(Deserialize))
}
