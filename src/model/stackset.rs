use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::resources::ObjectMeta;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackTemplate {
    pub version: String,
    /// Opaque workload spec, copied verbatim onto the created Stack.
    pub workload_spec: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficEntry {
    pub stack_name: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LifecyclePolicy {
    pub scaledown_ttl_seconds: i64,
    pub limit: usize,
}

impl LifecyclePolicy {
    pub fn scaledown_ttl(&self) -> Duration {
        Duration::from_secs(self.scaledown_ttl_seconds.max(0) as u64)
    }
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self { scaledown_ttl_seconds: 300, limit: 5 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackSetSpec {
    pub stack_template: StackTemplate,
    pub autoscaler_spec: Option<serde_json::Value>,
    pub ingress_spec: Option<serde_json::Value>,
    pub routegroup_spec: Option<serde_json::Value>,
    pub traffic: Vec<TrafficEntry>,
    pub lifecycle: LifecyclePolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StackSetStatus {
    pub observed_stack_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackSet {
    pub meta: ObjectMeta,
    pub spec: StackSetSpec,
    pub status: StackSetStatus,
}

impl StackSet {
    /// Name of the Stack the current template version would materialize to,
    /// in the fixed `{stacksetName}-{version}` form.
    pub fn current_stack_name(&self) -> String {
        format!("{}-{}", self.meta.name, self.spec.stack_template.version)
    }

    pub fn needs_new_stack(&self) -> bool {
        self.status.observed_stack_version.as_deref() != Some(self.spec.stack_template.version.as_str())
    }
}
