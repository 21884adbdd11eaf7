// C5: per-Stack state machine that ramps replicas up before traffic is
// shifted, holds traffic until readiness, and later relaxes the autoscaler
// floor after a cool-down.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::{desired_weights, ReconcileAction, ReconcileOutput, TrafficReconciler};
use crate::config::{NO_TRAFFIC_SINCE_ANNOTATION, RELAX_FLOOR_ANNOTATION};
use crate::model::{StackContainer, StackSetContainer};
use crate::weights::{self, WeightMap};

const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy)]
pub struct PrescalingReconciler {
    pub reset_hpa_min_replicas_delay: Duration,
}

impl TrafficReconciler for PrescalingReconciler {
    fn reconcile(&self, container: &StackSetContainer, now: DateTime<Utc>) -> ReconcileOutput {
        let desired = desired_weights(container);
        let mut actions = Vec::new();
        let mut available_raw: Vec<(String, f64)> = Vec::new();

        for sc in container.stacks.values() {
            let name = sc.name().to_string();
            let desired_weight = desired.iter().find(|(n, _)| n == &name).map(|(_, w)| *w).unwrap_or(0.0);
            let actual_weight = sc.traffic.actual_weight;
            let prescale_target = sc.prescale_target();
            let no_traffic_since = sc.stack.meta.annotations.get(NO_TRAFFIC_SINCE_ANNOTATION).and_then(|v| DateTime::parse_from_rfc3339(v).ok()).map(|d| d.with_timezone(&Utc));

            // IDLE -> PRESCALING: start ramping siblings' combined current
            // capacity before shifting any traffic onto this stack.
            if prescale_target.is_none() && desired_weight > 0.0 && actual_weight <= 0.0 && no_traffic_since.is_none() {
                let n = siblings_current_replicas(container, &name);
                if n > 0 {
                    actions.push(ReconcileAction::SetPrescaleReplicas { stack: name.clone(), replicas: n });
                    if sc.resources.autoscaler.is_none() {
                        actions.push(ReconcileAction::PinWorkloadReplicas { stack: name.clone(), replicas: n });
                    }
                }
            }

            // Annotation has served its purpose once the stack is actually
            // serving traffic, or once it's no longer wanted at all
            // (testable property #6: desired <= 0 OR actual > 0).
            if prescale_target.is_some() && (desired_weight <= 0.0 || actual_weight > EPSILON) {
                actions.push(ReconcileAction::RemovePrescaleReplicas { stack: name.clone() });
            }

            // SERVING/READY_TO_ACCEPT -> RELAXING: traffic withdrawn after
            // having served; start the cool-down and keep the HPA floor
            // pinned so it doesn't immediately scale back down.
            if desired_weight <= 0.0 && actual_weight <= EPSILON && no_traffic_since.is_none() && had_prescale_floor(sc) {
                actions.push(ReconcileAction::MarkNoTrafficSince { stack: name.clone(), at: now });
            }

            if let Some(since) = no_traffic_since {
                let elapsed = now - since;
                let cooldown = chrono::Duration::from_std(self.reset_hpa_min_replicas_delay).unwrap_or_default();
                if elapsed < cooldown {
                    if let Some(floor) = relax_floor(sc) {
                        let max_replicas = sc.resources.autoscaler.as_ref().map(|a| a.max_replicas).unwrap_or(floor);
                        actions.push(ReconcileAction::SetHpaMinReplicas { stack: name.clone(), min_replicas: floor.min(max_replicas) });
                    }
                } else {
                    // RELAXING -> IDLE: cool-down elapsed.
                    actions.push(ReconcileAction::ClearNoTrafficSince { stack: name.clone() });
                }
            }

            if is_available(sc, prescale_target) {
                available_raw.push((name, desired_weight));
            }
        }

        let available = resolve_available(container, available_raw, &desired);
        ReconcileOutput { desired, available, actions }
    }
}

fn had_prescale_floor(sc: &StackContainer) -> bool {
    sc.stack.meta.annotations.contains_key(RELAX_FLOOR_ANNOTATION) || sc.prescale_target().is_some()
}

fn relax_floor(sc: &StackContainer) -> Option<i32> {
    sc.stack
        .meta
        .annotations
        .get(RELAX_FLOOR_ANNOTATION)
        .and_then(|v| v.parse::<i32>().ok())
        .or_else(|| sc.prescale_target())
}

/// Sum, across siblings currently receiving traffic, of their current
/// replica count — HPA `currentReplicas` when present, else workload
/// replicas.
fn siblings_current_replicas(container: &StackSetContainer, except: &str) -> i32 {
    container
        .stacks
        .values()
        .filter(|sc| sc.name() != except && sc.traffic.actual_weight > 0.0)
        .map(|sc| sc.current_replicas())
        .sum()
}

/// READY_TO_ACCEPT, SERVING, and SERVING-below-target Stacks are available
/// backends; a PRESCALING Stack below its target is not.
fn is_available(sc: &StackContainer, prescale_target: Option<i32>) -> bool {
    if sc.traffic.actual_weight > 0.0 {
        return true;
    }
    match prescale_target {
        Some(target) => sc.ready_replicas() >= target,
        None => false,
    }
}

/// `available` is the desired-weighted map of available Stacks, falling
/// back to current actual weights, then to desired, when empty — each case
/// re-normalized so the output always sums to 100.
fn resolve_available(container: &StackSetContainer, available_raw: Vec<(String, f64)>, desired: &WeightMap) -> WeightMap {
    if !available_raw.is_empty() && !weights::all_zero(&available_raw) {
        return weights::normalize(&available_raw);
    }
    let actual: Vec<(String, f64)> = container.stacks.values().map(|sc| (sc.name().to_string(), sc.traffic.actual_weight)).collect();
    if !actual.is_empty() && !weights::all_zero(&actual) {
        return weights::normalize(&actual);
    }
    desired.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ObjectMeta, OwnerRef, ReconcilerVariant, Stack, StackSpec, StackStatus, TrafficEntry, Workload};

    fn reconciler() -> PrescalingReconciler {
        PrescalingReconciler { reset_hpa_min_replicas_delay: Duration::from_secs(300) }
    }

    fn make_stack(container: &mut StackSetContainer, name: &str, ready: i32, replicas: i32, actual_weight: f64) {
        let mut sc = StackContainer::new(Stack {
            meta: ObjectMeta::new("default", name, format!("{name}-uid")).owned_by(OwnerRef { uid: "ss-1".into(), kind: "StackSet".into() }),
            spec: StackSpec { workload_spec: serde_json::json!({}), autoscaler_spec: None },
            status: StackStatus { creation_timestamp: Utc::now(), last_traffic_seen: None },
        });
        sc.resources.workload = Some(Workload { meta: ObjectMeta::new("default", name, format!("{name}-w")), replicas, ready_replicas: ready });
        sc.traffic.actual_weight = actual_weight;
        container.stacks.insert(name.to_string(), sc);
    }

    #[test]
    fn prescaling_below_target_is_not_available() {
        let mut container = crate::test_support::empty_stackset_container("foo", ReconcilerVariant::Prescaling { reset_hpa_min_replicas_delay: Duration::from_secs(300) });
        container.stackset.spec.traffic = vec![TrafficEntry { stack_name: "foo-v1".into(), weight: 0.0 }, TrafficEntry { stack_name: "foo-v2".into(), weight: 100.0 }];
        make_stack(&mut container, "foo-v1", 4, 4, 100.0);
        make_stack(&mut container, "foo-v2", 1, 1, 0.0);
        container.stacks.get_mut("foo-v2").unwrap().stack.meta.annotations.insert(crate::config::PRESCALE_REPLICAS_ANNOTATION.to_string(), "4".to_string());

        let out = reconciler().reconcile(&container, Utc::now());
        assert!(!out.available.iter().any(|(n, w)| n == "foo-v2" && *w > 0.0));
    }

    #[test]
    fn idle_to_prescaling_sets_replicas_from_serving_siblings() {
        let mut container = crate::test_support::empty_stackset_container("foo", ReconcilerVariant::Prescaling { reset_hpa_min_replicas_delay: Duration::from_secs(300) });
        container.stackset.spec.traffic = vec![TrafficEntry { stack_name: "foo-v1".into(), weight: 0.0 }, TrafficEntry { stack_name: "foo-v2".into(), weight: 100.0 }];
        make_stack(&mut container, "foo-v1", 4, 4, 100.0);
        make_stack(&mut container, "foo-v2", 0, 0, 0.0);

        let out = reconciler().reconcile(&container, Utc::now());
        assert!(out.actions.contains(&ReconcileAction::SetPrescaleReplicas { stack: "foo-v2".into(), replicas: 4 }));
        assert!(out.actions.contains(&ReconcileAction::PinWorkloadReplicas { stack: "foo-v2".into(), replicas: 4 }));
    }

    #[test]
    fn serving_below_target_retains_its_traffic_share() {
        let mut container = crate::test_support::empty_stackset_container("foo", ReconcilerVariant::Prescaling { reset_hpa_min_replicas_delay: Duration::from_secs(300) });
        container.stackset.spec.traffic = vec![TrafficEntry { stack_name: "foo-v2".into(), weight: 100.0 }];
        make_stack(&mut container, "foo-v2", 2, 4, 60.0);
        container.stacks.get_mut("foo-v2").unwrap().stack.meta.annotations.insert(crate::config::PRESCALE_REPLICAS_ANNOTATION.to_string(), "4".to_string());

        let out = reconciler().reconcile(&container, Utc::now());
        assert!(out.available.iter().any(|(n, w)| n == "foo-v2" && *w > 0.0));
    }

    #[test]
    fn removing_annotation_requires_zero_desired_or_positive_actual() {
        let mut container = crate::test_support::empty_stackset_container("foo", ReconcilerVariant::Prescaling { reset_hpa_min_replicas_delay: Duration::from_secs(300) });
        container.stackset.spec.traffic = vec![TrafficEntry { stack_name: "foo-v2".into(), weight: 100.0 }];
        make_stack(&mut container, "foo-v2", 4, 4, 100.0);
        container.stacks.get_mut("foo-v2").unwrap().stack.meta.annotations.insert(crate::config::PRESCALE_REPLICAS_ANNOTATION.to_string(), "4".to_string());

        let out = reconciler().reconcile(&container, Utc::now());
        assert!(out.actions.contains(&ReconcileAction::RemovePrescaleReplicas { stack: "foo-v2".into() }));
    }
}
