//! Domain types for the SimpleDB state store.
//!
//! `SimpleDb` is the desired-state object a user declares; `Workload` is the
//! running replica set that the reconciler creates and keeps in line with it.
//! Field names serialize in camelCase, matching the persisted schema
//! (`replicas`, `image`, `dbName`, `conditions[].lastTransitionTime`).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{StateError, StateResult};

/// Kind recorded in owner references that point at a `SimpleDb`.
pub const SIMPLEDB_KIND: &str = "SimpleDB";

// ── Identity ──────────────────────────────────────────────────────

/// Namespace-qualified identity shared by a `SimpleDb` and its `Workload`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Build the composite key used by both tables.
    pub fn table_key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    /// Both parts must be non-empty and free of `/` so that distinct
    /// identities never share a table key.
    pub fn validate(&self) -> StateResult<()> {
        for (field, value) in [("namespace", &self.namespace), ("name", &self.name)] {
            if value.is_empty() {
                return Err(StateError::Invalid(format!("{field} is required")));
            }
            if value.contains('/') {
                return Err(StateError::Invalid(format!(
                    "{field} must not contain '/', got {value:?}"
                )));
            }
        }
        Ok(())
    }

    /// Parse a `{namespace}/{name}` table key.
    pub fn parse(key: &str) -> Option<Self> {
        let (namespace, name) = key.split_once('/')?;
        if namespace.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }
        Some(Self::new(namespace, name))
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

// ── SimpleDb ──────────────────────────────────────────────────────

/// A declared database workload together with its observed status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SimpleDb {
    pub namespace: String,
    pub name: String,
    pub spec: SimpleDbSpec,
    #[serde(default)]
    pub status: SimpleDbStatus,
}

/// Desired state of a `SimpleDb`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SimpleDbSpec {
    /// Number of database instances; must be at least 1.
    pub replicas: i32,
    /// Container image, e.g. `postgres:14`.
    pub image: String,
    /// Name of the database created inside each instance.
    pub db_name: String,
}

/// Observed state of a `SimpleDb`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SimpleDbStatus {
    /// At most one entry per condition type, in insertion order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

/// A typed status signal with a reason code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    pub reason: String,
    pub message: String,
    /// Unix timestamp (seconds) of the last status or reason change.
    pub last_transition_time: u64,
}

/// Tri-state value of a `Condition`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl SimpleDb {
    pub fn new(namespace: &str, name: &str, spec: SimpleDbSpec) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            spec,
            status: SimpleDbStatus::default(),
        }
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.namespace, &self.name)
    }

    /// Build the composite key for the simpledbs table.
    pub fn table_key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    /// Look up a stored condition by type.
    pub fn condition(&self, type_: &str) -> Option<&Condition> {
        self.status.conditions.iter().find(|c| c.type_ == type_)
    }
}

impl SimpleDbSpec {
    /// Schema-level checks applied before an object is admitted to the store.
    pub fn validate(&self) -> StateResult<()> {
        if self.replicas < 1 {
            return Err(StateError::Invalid(format!(
                "replicas must be at least 1, got {}",
                self.replicas
            )));
        }
        if self.image.trim().is_empty() {
            return Err(StateError::Invalid("image is required".to_string()));
        }
        if self.db_name.trim().is_empty() {
            return Err(StateError::Invalid("dbName is required".to_string()));
        }
        Ok(())
    }
}

// ── Workload ──────────────────────────────────────────────────────

/// A running replica set, identified by its owner's key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Workload {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Back-reference used for garbage collection only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<OwnerReference>,
    pub spec: WorkloadSpec,
    #[serde(default)]
    pub status: WorkloadStatus,
}

/// Points from a workload to the object that owns it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub kind: String,
    pub namespace: String,
    pub name: String,
    /// Whether the owner is the managing controller.
    pub controller: bool,
}

/// Desired shape of a workload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadSpec {
    pub replicas: i32,
    pub selector: BTreeMap<String, String>,
    pub container: ContainerSpec,
}

/// The single container every replica runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub ports: Vec<ContainerPort>,
    #[serde(default)]
    pub env: Vec<EnvVar>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPort {
    pub name: String,
    pub container_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

/// Replica counters reported by the workload backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadStatus {
    pub updated_replicas: i32,
    pub ready_replicas: i32,
    pub available_replicas: i32,
}

impl Workload {
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.namespace, &self.name)
    }

    /// Build the composite key for the workloads table.
    pub fn table_key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    /// Whether this workload is controlled by the `SimpleDb` at `key`.
    pub fn is_owned_by(&self, key: &ObjectKey) -> bool {
        self.owner.as_ref().is_some_and(|o| {
            o.kind == SIMPLEDB_KIND && o.namespace == key.namespace && o.name == key.name
        })
    }
}
