// C3: decide when to create a new Stack from the template, and which
// existing Stacks are eligible for removal.

use chrono::{DateTime, Utc};

use crate::model::{ObjectMeta, OwnerRef, Stack, StackContainer, StackSetContainer, StackSpec, StackStatus};

/// Build the Stack that should exist for the StackSet's current template
/// version, if one doesn't already. The caller is responsible for the
/// actual create call and for updating `status.observedStackVersion`
/// afterwards; creation is idempotent from the controller's point of view —
/// if the Stack already exists under another controller the create is a
/// no-op, never an error.
pub fn stack_to_create(container: &StackSetContainer, now: DateTime<Utc>) -> Option<Stack> {
    let stackset = &container.stackset;
    if !stackset.needs_new_stack() {
        return None;
    }
    let name = stackset.current_stack_name();
    if container.stacks.contains_key(&name) {
        return None;
    }
    Some(Stack {
        meta: ObjectMeta::new(stackset.meta.namespace.clone(), name, String::new())
            .owned_by(OwnerRef { uid: stackset.meta.uid.clone(), kind: "StackSet".to_string() }),
        spec: StackSpec {
            workload_spec: stackset.spec.stack_template.workload_spec.clone(),
            autoscaler_spec: stackset.spec.autoscaler_spec.clone(),
        },
        status: StackStatus { creation_timestamp: now, last_traffic_seen: None },
    })
}

/// Mark Stacks `PendingRemoval` when they (a) receive no traffic, (b) have
/// been idle longer than `scaledownTTL`, and (c) the family's retained-stack
/// count exceeds `lifecycle.limit` — oldest by creation time first
///.
pub fn mark_pending_removal(container: &mut StackSetContainer, now: DateTime<Utc>) {
    let ttl = container.stackset.spec.lifecycle.scaledown_ttl();
    let limit = container.stackset.spec.lifecycle.limit;

    let mut idle_candidates: Vec<String> = container
        .stacks
        .values()
        .filter(|sc| sc.traffic.actual_weight <= 0.0 && sc.stack.is_idle_longer_than(ttl, now))
        .map(|sc| sc.name().to_string())
        .collect();

    idle_candidates.sort_by_key(|name| container.stacks[name].stack.status.creation_timestamp);

    let total = container.stacks.len();
    let excess = total.saturating_sub(limit);
    let to_remove: std::collections::HashSet<String> = idle_candidates.into_iter().take(excess).collect();

    for (name, sc) in container.stacks.iter_mut() {
        sc.pending_removal = to_remove.contains(name);
    }
}

/// Stacks that `mark_pending_removal` flagged for deletion this pass.
pub fn stacks_to_delete<'a>(container: &'a StackSetContainer) -> impl Iterator<Item = &'a StackContainer> {
    container.stacks.values().filter(|sc| sc.pending_removal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LifecyclePolicy, ReconcilerVariant, StackSetSpec, StackSetStatus, StackTemplate};
    use chrono::Duration as ChronoDuration;

    fn base_stackset(version: &str, limit: usize, ttl_secs: i64) -> crate::model::StackSet {
        crate::model::StackSet {
            meta: ObjectMeta::new("default", "foo", "ss-1"),
            spec: StackSetSpec {
                stack_template: StackTemplate { version: version.into(), workload_spec: serde_json::json!({}) },
                autoscaler_spec: None,
                ingress_spec: None,
                routegroup_spec: None,
                traffic: vec![],
                lifecycle: LifecyclePolicy { scaledown_ttl_seconds: ttl_secs, limit },
            },
            status: StackSetStatus::default(),
        }
    }

    #[test]
    fn creates_stack_when_version_bumped() {
        let ss = base_stackset("v2", 5, 300);
        let container = StackSetContainer::new(ss, ReconcilerVariant::Simple);
        let now = Utc::now();
        let created = stack_to_create(&container, now).expect("stack should be created");
        assert_eq!(created.meta.name, "foo-v2");
    }

    #[test]
    fn no_create_when_version_already_observed() {
        let mut ss = base_stackset("v1", 5, 300);
        ss.status.observed_stack_version = Some("v1".to_string());
        let container = StackSetContainer::new(ss, ReconcilerVariant::Simple);
        assert!(stack_to_create(&container, Utc::now()).is_none());
    }

    #[test]
    fn cleanup_drops_oldest_when_over_limit() {
        let ss = base_stackset("v5", 3, 0);
        let mut container = StackSetContainer::new(ss, ReconcilerVariant::Simple);
        let now = Utc::now();
        for (i, name) in ["foo-v1", "foo-v2", "foo-v3", "foo-v4", "foo-v5"].into_iter().enumerate() {
            let mut sc = StackContainer::new(Stack {
                meta: ObjectMeta::new("default", name, format!("uid-{i}")),
                spec: StackSpec { workload_spec: serde_json::json!({}), autoscaler_spec: None },
                status: StackStatus { creation_timestamp: now - ChronoDuration::seconds(100 - i as i64), last_traffic_seen: None },
            });
            sc.traffic.actual_weight = 0.0;
            container.stacks.insert(name.to_string(), sc);
        }
        mark_pending_removal(&mut container, now);
        let removed: Vec<&str> = stacks_to_delete(&container).map(|sc| sc.name()).collect();
        assert_eq!(removed.len(), 2);
        assert!(removed.contains(&"foo-v1"));
        assert!(removed.contains(&"foo-v2"));
    }

    #[test]
    fn stacks_receiving_traffic_are_never_removed() {
        let ss = base_stackset("v1", 0, 0);
        let mut container = StackSetContainer::new(ss, ReconcilerVariant::Simple);
        let now = Utc::now();
        let mut sc = StackContainer::new(Stack {
            meta: ObjectMeta::new("default", "foo-v1", "uid-1"),
            spec: StackSpec { workload_spec: serde_json::json!({}), autoscaler_spec: None },
            status: StackStatus { creation_timestamp: now - ChronoDuration::seconds(1000), last_traffic_seen: None },
        });
        sc.traffic.actual_weight = 100.0;
        container.stacks.insert("foo-v1".to_string(), sc);
        mark_pending_removal(&mut container, now);
        assert_eq!(stacks_to_delete(&container).count(), 0);
    }
}
