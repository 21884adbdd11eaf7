// C4/C5: compute the desired and available weight vectors for a StackSet
// family.

pub mod prescaling;
pub mod simple;

use chrono::{DateTime, Utc};

use crate::model::StackSetContainer;
use crate::weights::WeightMap;

/// A durable-state mutation the controller must apply to the cluster after
/// this reconcile pass (annotations are the only state the prescaling state
/// machine trusts).
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileAction {
    SetPrescaleReplicas { stack: String, replicas: i32 },
    RemovePrescaleReplicas { stack: String },
    PinWorkloadReplicas { stack: String, replicas: i32 },
    SetHpaMinReplicas { stack: String, min_replicas: i32 },
    MarkNoTrafficSince { stack: String, at: DateTime<Utc> },
    ClearNoTrafficSince { stack: String },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReconcileOutput {
    pub desired: WeightMap,
    pub available: WeightMap,
    pub actions: Vec<ReconcileAction>,
}

/// Pluggable traffic policy, chosen per StackSet by the ownership indexer
///.
pub trait TrafficReconciler {
    fn reconcile(&self, container: &StackSetContainer, now: DateTime<Utc>) -> ReconcileOutput;
}

/// Desired weights are always `normalize(spec.traffic)`, identical for both
/// the simple and prescaling reconcilers.
pub(crate) fn desired_weights(container: &StackSetContainer) -> WeightMap {
    let raw: Vec<(String, f64)> =
        container.stackset.spec.traffic.iter().map(|t| (t.stack_name.clone(), t.weight)).collect();
    crate::weights::normalize(&raw)
}
