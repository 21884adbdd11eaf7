// Shared object metadata and the child resource kinds a Stack (or StackSet)
// may own. Field sets are limited to what the reconcile algorithms actually
// inspect; the cosmetic label-propagation rules of the real Stack-template
// expansion are out of scope.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A reference to the first owner of an object, as read from
/// `metadata.ownerReferences[0]`. Multiple owner references are ambiguous
/// and the indexer drops the object rather than guessing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRef {
    pub uid: String,
    pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,
    pub uid: String,
    pub owner_references: Vec<OwnerRef>,
    pub annotations: HashMap<String, String>,
    pub labels: HashMap<String, String>,
}

impl ObjectMeta {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, uid: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            uid: uid.into(),
            owner_references: Vec::new(),
            annotations: HashMap::new(),
            labels: HashMap::new(),
        }
    }

    pub fn owned_by(mut self, owner: OwnerRef) -> Self {
        self.owner_references.push(owner);
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// The first owner reference, per the "only the first owner reference"
    /// convention. `None` if the object is unowned.
    pub fn first_owner(&self) -> Option<&OwnerRef> {
        self.owner_references.first()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workload {
    pub meta: ObjectMeta,
    pub replicas: i32,
    pub ready_replicas: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Autoscaler {
    pub meta: ObjectMeta,
    pub min_replicas: i32,
    pub max_replicas: i32,
    /// Replicas currently requested by the HPA, when it has observed at
    /// least one scaling decision.
    pub current_replicas: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub meta: ObjectMeta,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ingress {
    pub meta: ObjectMeta,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteGroup {
    pub meta: ObjectMeta,
}

impl Ingress {
    pub fn updated_timestamp(&self, key: &str) -> Option<DateTime<Utc>> {
        self.meta.annotations.get(key).and_then(|v| DateTime::parse_from_rfc3339(v).ok()).map(|dt| dt.with_timezone(&Utc))
    }
}

impl RouteGroup {
    pub fn updated_timestamp(&self, key: &str) -> Option<DateTime<Utc>> {
        self.meta.annotations.get(key).and_then(|v| DateTime::parse_from_rfc3339(v).ok()).map(|dt| dt.with_timezone(&Utc))
    }
}

/// The resolved set of child resources belonging to a single Stack. Each
/// field is optional: a Stack may not yet have an autoscaler, ingress, or
/// routegroup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resources {
    pub workload: Option<Workload>,
    pub autoscaler: Option<Autoscaler>,
    pub service: Option<Service>,
    pub ingress: Option<Ingress>,
    pub routegroup: Option<RouteGroup>,
}
