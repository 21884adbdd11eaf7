// C6: for each (stackset, stack) compute the desired workload/autoscaler/
// service/ingress/routegroup and converge; enforces the cross-object grace
// window between ingress and routegroup.

use chrono::{DateTime, Utc};

use crate::config::UPDATED_TIMESTAMP_ANNOTATION;
use crate::model::StackSetContainer;

#[derive(Debug, Clone, PartialEq)]
pub enum ChildAction {
    UpsertWorkload { stack: String },
    UpsertAutoscaler { stack: String },
    UpsertService { stack: String },
    UpsertIngress,
    DeleteIngress,
    UpsertRouteGroup,
    DeleteRouteGroup,
}

/// Upserts implied by each Stack's spec. The cosmetic shape of the created
/// objects (label propagation, container specs, etc.) is delegated to the
/// Stack-template expansion rules and is out of scope; this
/// only decides *that* each child converges, and *whether* the grace
/// window lets a routing object go.
pub fn child_plan(container: &StackSetContainer, grace_window: std::time::Duration, now: DateTime<Utc>) -> Vec<ChildAction> {
    let mut actions = Vec::new();
    for stack_name in container.stacks.keys() {
        actions.push(ChildAction::UpsertWorkload { stack: stack_name.clone() });
        actions.push(ChildAction::UpsertAutoscaler { stack: stack_name.clone() });
        actions.push(ChildAction::UpsertService { stack: stack_name.clone() });
    }
    actions.extend(top_level_routing(container, grace_window, now));
    actions
}

fn too_young(timestamp: Option<DateTime<Utc>>, grace_window: chrono::Duration, now: DateTime<Utc>) -> bool {
    match timestamp {
        // No timestamp, or an unparseable one, is treated as "too young" —
        // keep the object rather than risk a window with neither route
        // present.
        None => true,
        Some(ts) => now - ts < grace_window,
    }
}

fn top_level_routing(container: &StackSetContainer, grace_window: std::time::Duration, now: DateTime<Utc>) -> Vec<ChildAction> {
    let grace = chrono::Duration::from_std(grace_window).unwrap_or_default();
    let mut actions = Vec::new();

    let wants_ingress = container.stackset.spec.ingress_spec.is_some();
    let wants_routegroup = container.stackset.spec.routegroup_spec.is_some();

    if wants_ingress {
        actions.push(ChildAction::UpsertIngress);
    } else if container.ingress.is_some() {
        if wants_routegroup || container.routegroup.is_some() {
            let rg_ts = container.routegroup.as_ref().and_then(|rg| rg.updated_timestamp(UPDATED_TIMESTAMP_ANNOTATION));
            if !too_young(rg_ts, grace, now) {
                actions.push(ChildAction::DeleteIngress);
            }
        } else {
            // Nothing is replacing it: no migration in flight, no grace
            // window to honour.
            actions.push(ChildAction::DeleteIngress);
        }
    }

    if wants_routegroup {
        actions.push(ChildAction::UpsertRouteGroup);
    } else if container.routegroup.is_some() {
        if wants_ingress || container.ingress.is_some() {
            let ing_ts = container.ingress.as_ref().and_then(|ing| ing.updated_timestamp(UPDATED_TIMESTAMP_ANNOTATION));
            if !too_young(ing_ts, grace, now) {
                actions.push(ChildAction::DeleteRouteGroup);
            }
        } else {
            actions.push(ChildAction::DeleteRouteGroup);
        }
    }

    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Ingress, ObjectMeta, ReconcilerVariant, RouteGroup};
    use std::time::Duration;

    fn container_with_ingress_and_routegroup(rg_age_secs: i64) -> StackSetContainer {
        let mut container = crate::test_support::empty_stackset_container("foo", ReconcilerVariant::Simple);
        container.stackset.spec.ingress_spec = None;
        container.stackset.spec.routegroup_spec = Some(serde_json::json!({}));
        container.ingress = Some(Ingress { meta: ObjectMeta::new("default", "foo", "ing-1") });
        let ts = (Utc::now() - chrono::Duration::seconds(rg_age_secs)).to_rfc3339();
        container.routegroup = Some(RouteGroup {
            meta: ObjectMeta::new("default", "foo", "rg-1").with_annotation(UPDATED_TIMESTAMP_ANNOTATION, ts),
        });
        container
    }

    #[test]
    fn young_routegroup_keeps_old_ingress() {
        let container = container_with_ingress_and_routegroup(10);
        let actions = child_plan(&container, Duration::from_secs(60), Utc::now());
        assert!(!actions.contains(&ChildAction::DeleteIngress));
    }

    #[test]
    fn aged_routegroup_allows_ingress_deletion() {
        let container = container_with_ingress_and_routegroup(120);
        let actions = child_plan(&container, Duration::from_secs(60), Utc::now());
        assert!(actions.contains(&ChildAction::DeleteIngress));
    }

    #[test]
    fn missing_timestamp_is_treated_as_too_young() {
        let mut container = crate::test_support::empty_stackset_container("foo", ReconcilerVariant::Simple);
        container.stackset.spec.routegroup_spec = Some(serde_json::json!({}));
        container.ingress = Some(Ingress { meta: ObjectMeta::new("default", "foo", "ing-1") });
        container.routegroup = Some(RouteGroup { meta: ObjectMeta::new("default", "foo", "rg-1") });
        let actions = child_plan(&container, Duration::from_secs(60), Utc::now());
        assert!(!actions.contains(&ChildAction::DeleteIngress));
    }
}
