use std::collections::BTreeMap;
use std::time::Duration;

use super::resources::{Ingress, Resources, RouteGroup};
use super::stack::Stack;
use super::stackset::StackSet;

/// Weights observed on the top-level ingress/routegroup annotations for one
/// Stack, as of the start of this reconcile pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrafficStatus {
    pub desired_weight: f64,
    pub actual_weight: f64,
}

/// Ephemeral, in-memory, per reconcile pass container for a single Stack
/// and its resolved children.
#[derive(Debug, Clone, PartialEq)]
pub struct StackContainer {
    pub stack: Stack,
    pub resources: Resources,
    pub pending_removal: bool,
    pub traffic: TrafficStatus,
}

impl StackContainer {
    pub fn new(stack: Stack) -> Self {
        Self { stack, resources: Resources::default(), pending_removal: false, traffic: TrafficStatus::default() }
    }

    pub fn name(&self) -> &str {
        &self.stack.meta.name
    }

    pub fn ready_replicas(&self) -> i32 {
        self.resources.workload.as_ref().map(|w| w.ready_replicas).unwrap_or(0)
    }

    /// Current replica count used as a prescale source: the sibling HPA's
    /// `currentReplicas` if present, else the workload's observed replicas
    ///.
    pub fn current_replicas(&self) -> i32 {
        if let Some(hpa) = &self.resources.autoscaler {
            if let Some(current) = hpa.current_replicas {
                return current;
            }
        }
        self.resources.workload.as_ref().map(|w| w.replicas).unwrap_or(0)
    }

    pub fn prescale_target(&self) -> Option<i32> {
        self.resources
            .workload
            .as_ref()
            .and_then(|w| w.meta.annotations.get(crate::config::PRESCALE_REPLICAS_ANNOTATION))
            .and_then(|v| v.parse::<i32>().ok())
    }
}

/// Which traffic policy a StackSet uses, selected by the ownership indexer
/// from the StackSet's annotations.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcilerVariant {
    Simple,
    Prescaling { reset_hpa_min_replicas_delay: Duration },
}

/// Ephemeral, per-pass container for a whole StackSet family.
#[derive(Debug, Clone, PartialEq)]
pub struct StackSetContainer {
    pub stackset: StackSet,
    pub stacks: BTreeMap<String, StackContainer>,
    pub ingress: Option<Ingress>,
    pub routegroup: Option<RouteGroup>,
    pub reconciler: ReconcilerVariant,
}

impl StackSetContainer {
    pub fn new(stackset: StackSet, reconciler: ReconcilerVariant) -> Self {
        Self { stackset, stacks: BTreeMap::new(), ingress: None, routegroup: None, reconciler }
    }
}
