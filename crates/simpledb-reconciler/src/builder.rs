//! Desired-workload builder.

use std::collections::BTreeMap;

use simpledb_state::*;

/// Container name used for every SimpleDB replica.
pub const CONTAINER_NAME: &str = "simpledb";

/// Port the database listens on inside each replica.
pub const DB_PORT: u16 = 5432;

// Demo-only credential; a real deployment would source this from a secret.
const DEFAULT_PASSWORD: &str = "changeme";

/// Labels attached to a workload and used as its selector.
pub fn labels_for(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("app".to_string(), "simpledb".to_string()),
        ("owner".to_string(), name.to_string()),
    ])
}

/// Build the workload a `SimpleDb` should have.
///
/// Deterministic and side-effect free. Replicas and image are copied
/// verbatim; observed counters start at zero.
pub fn desired_workload(db: &SimpleDb) -> Workload {
    let labels = labels_for(&db.name);

    Workload {
        namespace: db.namespace.clone(),
        name: db.name.clone(),
        labels: labels.clone(),
        owner: Some(OwnerReference {
            kind: SIMPLEDB_KIND.to_string(),
            namespace: db.namespace.clone(),
            name: db.name.clone(),
            controller: true,
        }),
        spec: WorkloadSpec {
            replicas: db.spec.replicas,
            selector: labels,
            container: ContainerSpec {
                name: CONTAINER_NAME.to_string(),
                image: db.spec.image.clone(),
                ports: vec![ContainerPort {
                    name: "db".to_string(),
                    container_port: DB_PORT,
                }],
                env: vec![
                    EnvVar {
                        name: "POSTGRES_DB".to_string(),
                        value: db.spec.db_name.clone(),
                    },
                    EnvVar {
                        name: "POSTGRES_PASSWORD".to_string(),
                        value: DEFAULT_PASSWORD.to_string(),
                    },
                ],
            },
        },
        status: WorkloadStatus::default(),
    }
}
