//! The narrow interface between the reconciler and the systems it drives.
//!
//! One trait covers both collaborators: the desired-state store (SimpleDB
//! reads and status writes) and the workload backend (workload reads,
//! creates and updates). Implementations report absence as `Ok(None)`.

use async_trait::async_trait;
use simpledb_state::{Condition, ObjectKey, SimpleDb, StateStore, Workload};

use crate::error::BackendError;

/// Reads and writes the reconciler needs, plus the listing the driver uses
/// for periodic resync.
#[async_trait]
pub trait ClusterBackend: Send + Sync {
    /// Fetch a desired-state object.
    async fn get_simpledb(&self, key: &ObjectKey) -> Result<Option<SimpleDb>, BackendError>;

    /// Fetch the workload at the same identity.
    async fn get_workload(&self, key: &ObjectKey) -> Result<Option<Workload>, BackendError>;

    /// Create a workload, recording its owner reference. Fails if one exists.
    async fn create_workload(&self, workload: &Workload) -> Result<(), BackendError>;

    /// Replace the spec of an existing workload. Observed counters are the
    /// backend's and are not overwritten.
    async fn update_workload(&self, workload: &Workload) -> Result<(), BackendError>;

    /// Replace the status conditions of a desired-state object.
    async fn write_status(
        &self,
        key: &ObjectKey,
        conditions: Vec<Condition>,
    ) -> Result<(), BackendError>;

    /// Identities of every desired-state object currently stored.
    async fn list_simpledbs(&self) -> Result<Vec<ObjectKey>, BackendError>;
}

#[async_trait]
impl ClusterBackend for StateStore {
    async fn get_simpledb(&self, key: &ObjectKey) -> Result<Option<SimpleDb>, BackendError> {
        Ok(StateStore::get_simpledb(self, &key.table_key())?)
    }

    async fn get_workload(&self, key: &ObjectKey) -> Result<Option<Workload>, BackendError> {
        Ok(StateStore::get_workload(self, &key.table_key())?)
    }

    async fn create_workload(&self, workload: &Workload) -> Result<(), BackendError> {
        Ok(StateStore::create_workload(self, workload)?)
    }

    async fn update_workload(&self, workload: &Workload) -> Result<(), BackendError> {
        Ok(StateStore::update_workload(self, workload)?)
    }

    async fn write_status(
        &self,
        key: &ObjectKey,
        conditions: Vec<Condition>,
    ) -> Result<(), BackendError> {
        Ok(StateStore::write_status(self, &key.table_key(), conditions)?)
    }

    async fn list_simpledbs(&self) -> Result<Vec<ObjectKey>, BackendError> {
        let dbs = StateStore::list_simpledbs(self)?;
        Ok(dbs.iter().map(SimpleDb::key).collect())
    }
}
