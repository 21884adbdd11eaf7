// C2: rebuild, per StackSet, a complete container of owned Stacks and each
// Stack's owned children, from flat lists of observed cluster resources.
// Ownership is transitive (StackSet -> Stack -> Workload -> {Service,
// Autoscaler}) and partly co-owned (ingress/routegroup may belong to either
// the StackSet or an individual Stack).

use std::collections::HashMap;
use std::time::Duration;

use tracing::warn;

use crate::config::{Config, PRESCALE_STACKS_ANNOTATION, RESET_HPA_MIN_REPLICAS_DELAY_ANNOTATION, CONTROLLER_ANNOTATION, STACK_TRAFFIC_WEIGHTS_ANNOTATION};
use crate::model::{Autoscaler, Ingress, OwnerRef, ReconcilerVariant, RouteGroup, Service, Stack, StackContainer, StackSet, StackSetContainer, Workload};

const DEFAULT_RESET_HPA_MIN_REPLICAS_DELAY: Duration = Duration::from_secs(5 * 60);

/// Flat lists of cluster resources as observed in one list call, all
/// namespace-scoped to the reconcile pass's working set.
#[derive(Debug, Clone, Default)]
pub struct ClusterSnapshot {
    pub stacksets: Vec<StackSet>,
    pub stacks: Vec<Stack>,
    pub workloads: Vec<Workload>,
    pub autoscalers: Vec<Autoscaler>,
    pub services: Vec<Service>,
    pub ingresses: Vec<Ingress>,
    pub routegroups: Vec<RouteGroup>,
}

fn parse_duration_annotation(value: Option<&String>) -> Duration {
    value
        .and_then(|v| humantime_duration(v))
        .unwrap_or(DEFAULT_RESET_HPA_MIN_REPLICAS_DELAY)
}

/// Minimal `<number><unit>` duration parser (`300s`, `5m`, `1h`) — bad input
/// is non-fatal: the field is treated as absent.
fn humantime_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let split_at = raw.find(|c: char| !c.is_ascii_digit())?;
    let (digits, unit) = raw.split_at(split_at);
    let n: u64 = digits.parse().ok()?;
    let secs = match unit {
        "s" => n,
        "m" => n * 60,
        "h" => n * 3600,
        _ => return None,
    };
    Some(Duration::from_secs(secs))
}

fn choose_reconciler(stackset: &StackSet) -> ReconcilerVariant {
    match stackset.meta.annotations.get(PRESCALE_STACKS_ANNOTATION) {
        Some(_) => ReconcilerVariant::Prescaling {
            reset_hpa_min_replicas_delay: parse_duration_annotation(
                stackset.meta.annotations.get(RESET_HPA_MIN_REPLICAS_DELAY_ANNOTATION),
            ),
        },
        None => ReconcilerVariant::Simple,
    }
}

/// Build the full `stacksetUID -> StackSetContainer` map from a flat
/// cluster snapshot. Unreadable or ambiguous owner references are dropped,
/// never fatal.
pub fn index(snapshot: &ClusterSnapshot, config: &Config) -> HashMap<String, StackSetContainer> {
    let mut containers: HashMap<String, StackSetContainer> = HashMap::new();

    for stackset in &snapshot.stacksets {
        if !config.owns(stackset.meta.annotations.get(CONTROLLER_ANNOTATION).map(|s| s.as_str())) {
            continue;
        }
        let reconciler = choose_reconciler(stackset);
        containers.insert(stackset.meta.uid.clone(), StackSetContainer::new(stackset.clone(), reconciler));
    }

    for stack in &snapshot.stacks {
        let Some(owner) = stack.meta.first_owner() else { continue };
        if let Some(container) = containers.get_mut(&owner.uid) {
            container.stacks.insert(stack.meta.name.clone(), StackContainer::new(stack.clone()));
        }
    }

    // Stack UID -> (stackset UID, stack name), used to resolve direct
    // stack ownership of children below.
    let stack_owner: HashMap<String, (String, String)> = containers
        .iter()
        .flat_map(|(stackset_uid, c)| c.stacks.values().map(move |sc| (sc.stack.meta.uid.clone(), (stackset_uid.clone(), sc.stack.meta.name.clone()))))
        .collect();

    // Workload UID -> its owning stack, so Service/Autoscaler owned by the
    // Workload (transitively, one hop) resolve to the same Stack.
    let mut workload_owner: HashMap<String, (String, String)> = HashMap::new();
    for workload in &snapshot.workloads {
        let Some(owner) = workload.meta.first_owner() else { continue };
        if let Some((stackset_uid, stack_name)) = stack_owner.get(owner.uid.as_str()).cloned() {
            if let Some(container) = containers.get_mut(&stackset_uid) {
                if let Some(sc) = container.stacks.get_mut(&stack_name) {
                    sc.resources.workload = Some(workload.clone());
                }
            }
            workload_owner.insert(workload.meta.uid.clone(), (stackset_uid, stack_name));
        }
    }

    attach_one_hop(&snapshot.autoscalers, &stack_owner, &workload_owner, &mut containers, |sc, r| sc.resources.autoscaler = Some(r));
    attach_one_hop(&snapshot.services, &stack_owner, &workload_owner, &mut containers, |sc, r| sc.resources.service = Some(r));

    for ingress in &snapshot.ingresses {
        attach_ingress_or_routegroup(ingress.clone(), &ingress.meta.first_owner().cloned(), &stack_owner, &mut containers, |sc, v| sc.resources.ingress = Some(v), |ssc, v| ssc.ingress = Some(v));
    }
    for routegroup in &snapshot.routegroups {
        attach_ingress_or_routegroup(routegroup.clone(), &routegroup.meta.first_owner().cloned(), &stack_owner, &mut containers, |sc, v| sc.resources.routegroup = Some(v), |ssc, v| ssc.routegroup = Some(v));
    }

    for container in containers.values_mut() {
        populate_traffic_status(container, config);
    }

    containers
}

/// Attach each Stack's `TrafficStatus` from the StackSet's top-level
/// ingress/routegroup annotations: `zalando.org/stack-traffic-weights` for
/// desired, the configured backend-weights key for actual.
fn populate_traffic_status(container: &mut StackSetContainer, config: &Config) {
    let desired = weight_annotation(container, STACK_TRAFFIC_WEIGHTS_ANNOTATION);
    let actual = weight_annotation(container, &config.backend_weights_annotation);
    for (name, sc) in container.stacks.iter_mut() {
        sc.traffic.desired_weight = desired.get(name).copied().unwrap_or(0.0);
        sc.traffic.actual_weight = actual.get(name).copied().unwrap_or(0.0);
    }
}

/// Reads `key` off whichever of ingress/routegroup is present, preferring
/// the ingress when a StackSet carries both. Malformed JSON is non-fatal:
/// the annotation is treated as absent and a warning is logged.
fn weight_annotation(container: &StackSetContainer, key: &str) -> HashMap<String, f64> {
    let raw = container
        .ingress
        .as_ref()
        .and_then(|i| i.meta.annotations.get(key))
        .or_else(|| container.routegroup.as_ref().and_then(|r| r.meta.annotations.get(key)));
    let Some(raw) = raw else { return HashMap::new() };
    match crate::weights::from_annotation_json(raw) {
        Some(map) => map.into_iter().collect(),
        None => {
            warn!(stackset = %container.stackset.meta.name, annotation = key, "malformed weight annotation, treating as absent");
            HashMap::new()
        }
    }
}

/// Service/Autoscaler are treated as stack-owned whether their owner
/// reference points directly at the Stack or, one hop further, at the
/// Stack's Workload.
fn attach_one_hop<R: Clone>(
    items: &[R],
    stack_owner: &HashMap<String, (String, String)>,
    workload_owner: &HashMap<String, (String, String)>,
    containers: &mut HashMap<String, StackSetContainer>,
    set: impl Fn(&mut StackContainer, R),
) where
    R: HasMeta,
{
    for item in items {
        let Some(owner) = item.meta().first_owner() else { continue };
        let resolved = stack_owner
            .get(owner.uid.as_str())
            .cloned()
            .or_else(|| workload_owner.get(&owner.uid).cloned());
        let Some((stackset_uid, stack_name)) = resolved else { continue };
        if let Some(container) = containers.get_mut(&stackset_uid) {
            if let Some(sc) = container.stacks.get_mut(&stack_name) {
                set(sc, item.clone());
            }
        }
    }
}

fn attach_ingress_or_routegroup<R: Clone>(
    item: R,
    owner: &Option<OwnerRef>,
    stack_owner: &HashMap<String, (String, String)>,
    containers: &mut HashMap<String, StackSetContainer>,
    set_stack: impl Fn(&mut StackContainer, R),
    set_top_level: impl Fn(&mut StackSetContainer, R),
) {
    let Some(owner) = owner else { return };
    if let Some((stackset_uid, stack_name)) = stack_owner.get(owner.uid.as_str()).cloned() {
        if let Some(container) = containers.get_mut(&stackset_uid) {
            if let Some(sc) = container.stacks.get_mut(&stack_name) {
                set_stack(sc, item);
            }
        }
        return;
    }
    if let Some(container) = containers.get_mut(&owner.uid) {
        set_top_level(container, item);
    }
    // Owned by a Workload or anything else: dropped (not attached through a
    // second hop for ingress/routegroup, unlike Service/Autoscaler).
}

trait HasMeta {
    fn meta(&self) -> &crate::model::ObjectMeta;
}

impl HasMeta for Autoscaler {
    fn meta(&self) -> &crate::model::ObjectMeta {
        &self.meta
    }
}

impl HasMeta for Service {
    fn meta(&self) -> &crate::model::ObjectMeta {
        &self.meta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ObjectMeta, StackSetSpec, StackSetStatus, StackSpec, StackStatus, StackTemplate, LifecyclePolicy};

    fn stackset(uid: &str, name: &str) -> StackSet {
        StackSet {
            meta: ObjectMeta::new("default", name, uid),
            spec: StackSetSpec {
                stack_template: StackTemplate { version: "v1".into(), workload_spec: serde_json::json!({}) },
                autoscaler_spec: None,
                ingress_spec: None,
                routegroup_spec: None,
                traffic: vec![],
                lifecycle: LifecyclePolicy::default(),
            },
            status: StackSetStatus::default(),
        }
    }

    fn stack(uid: &str, name: &str, owner_uid: &str) -> Stack {
        Stack {
            meta: ObjectMeta::new("default", name, uid).owned_by(OwnerRef { uid: owner_uid.into(), kind: "StackSet".into() }),
            spec: StackSpec { workload_spec: serde_json::json!({}), autoscaler_spec: None },
            status: StackStatus { creation_timestamp: chrono::Utc::now(), last_traffic_seen: None },
        }
    }

    #[test]
    fn stacks_with_unknown_owner_are_dropped() {
        let snapshot = ClusterSnapshot {
            stacksets: vec![stackset("ss-1", "foo")],
            stacks: vec![stack("stack-1", "foo-v1", "ss-unknown")],
            ..Default::default()
        };
        let containers = index(&snapshot, &Config::default());
        assert!(containers["ss-1"].stacks.is_empty());
    }

    #[test]
    fn stray_ingress_without_matching_owner_is_untouched_and_absent() {
        let snapshot = ClusterSnapshot {
            stacksets: vec![stackset("ss-1", "foo")],
            ingresses: vec![Ingress { meta: ObjectMeta::new("default", "foo", "ing-1") }],
            ..Default::default()
        };
        let containers = index(&snapshot, &Config::default());
        assert!(containers["ss-1"].ingress.is_none());
    }

    #[test]
    fn index_is_idempotent() {
        let snapshot = ClusterSnapshot {
            stacksets: vec![stackset("ss-1", "foo")],
            stacks: vec![stack("stack-1", "foo-v1", "ss-1")],
            ..Default::default()
        };
        let a = index(&snapshot, &Config::default());
        let b = index(&snapshot, &Config::default());
        assert_eq!(a["ss-1"].stacks.keys().collect::<Vec<_>>(), b["ss-1"].stacks.keys().collect::<Vec<_>>());
    }

    #[test]
    fn traffic_status_is_parsed_from_top_level_ingress_annotations() {
        let mut ss = stackset("ss-1", "foo");
        let snapshot = ClusterSnapshot {
            stacksets: vec![{
                ss.spec.ingress_spec = Some(serde_json::json!({}));
                ss.clone()
            }],
            stacks: vec![stack("stack-1", "foo-v1", "ss-1")],
            ingresses: vec![Ingress {
                meta: ObjectMeta::new("default", "foo", "ing-1")
                    .owned_by(OwnerRef { uid: "ss-1".into(), kind: "StackSet".into() })
                    .with_annotation(crate::config::STACK_TRAFFIC_WEIGHTS_ANNOTATION, r#"{"foo-v1": 100.0}"#)
                    .with_annotation("zalando.org/backend-weights", r#"{"foo-v1": 63.5}"#),
            }],
            ..Default::default()
        };
        let containers = index(&snapshot, &Config::default());
        let sc = &containers["ss-1"].stacks["foo-v1"];
        assert!((sc.traffic.desired_weight - 100.0).abs() < 1e-9);
        assert!((sc.traffic.actual_weight - 63.5).abs() < 1e-9);
    }

    #[test]
    fn malformed_traffic_annotation_is_treated_as_absent() {
        let ss = stackset("ss-1", "foo");
        let snapshot = ClusterSnapshot {
            stacksets: vec![ss],
            stacks: vec![stack("stack-1", "foo-v1", "ss-1")],
            ingresses: vec![Ingress {
                meta: ObjectMeta::new("default", "foo", "ing-1")
                    .owned_by(OwnerRef { uid: "ss-1".into(), kind: "StackSet".into() })
                    .with_annotation(crate::config::STACK_TRAFFIC_WEIGHTS_ANNOTATION, "not json"),
            }],
            ..Default::default()
        };
        let containers = index(&snapshot, &Config::default());
        let sc = &containers["ss-1"].stacks["foo-v1"];
        assert_eq!(sc.traffic.desired_weight, 0.0);
    }

    #[test]
    fn controller_annotation_filters_foreign_stacksets() {
        let mut ss = stackset("ss-1", "foo");
        ss.meta.annotations.insert(CONTROLLER_ANNOTATION.to_string(), "other-cluster".to_string());
        let snapshot = ClusterSnapshot { stacksets: vec![ss], ..Default::default() };
        let mut cfg = Config::default();
        cfg.controller_id = "this-cluster".to_string();
        let containers = index(&snapshot, &cfg);
        assert!(containers.is_empty());
    }
}
