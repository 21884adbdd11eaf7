use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::resources::ObjectMeta;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackSpec {
    pub workload_spec: serde_json::Value,
    pub autoscaler_spec: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackStatus {
    pub creation_timestamp: DateTime<Utc>,
    pub last_traffic_seen: Option<DateTime<Utc>>,
}

/// An immutable, versioned revision of a StackSet, identified by
/// `(stacksetName, version)` and named `{stacksetName}-{version}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stack {
    pub meta: ObjectMeta,
    pub spec: StackSpec,
    pub status: StackStatus,
}

impl Stack {
    pub fn is_idle_longer_than(&self, ttl: std::time::Duration, now: DateTime<Utc>) -> bool {
        let since = self.status.last_traffic_seen.unwrap_or(self.status.creation_timestamp);
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => now - since > ttl,
            Err(_) => false,
        }
    }
}
