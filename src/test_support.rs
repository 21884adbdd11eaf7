//! Fixture builders shared across unit tests in this crate.

#![cfg(test)]

use crate::model::{LifecyclePolicy, ObjectMeta, ReconcilerVariant, StackSet, StackSetContainer, StackSetSpec, StackSetStatus, StackTemplate};

pub fn empty_stackset_container(name: &str, reconciler: ReconcilerVariant) -> StackSetContainer {
    let stackset = StackSet {
        meta: ObjectMeta::new("default", name, format!("{name}-uid")),
        spec: StackSetSpec {
            stack_template: StackTemplate { version: "v1".into(), workload_spec: serde_json::json!({}) },
            autoscaler_spec: None,
            ingress_spec: None,
            routegroup_spec: None,
            traffic: vec![],
            lifecycle: LifecyclePolicy::default(),
        },
        status: StackSetStatus::default(),
    };
    StackSetContainer::new(stackset, reconciler)
}
