use chrono::{DateTime, Utc};

use super::{desired_weights, ReconcileOutput, TrafficReconciler};
use crate::model::StackSetContainer;

/// C4: reports current weights as both desired and available. Workload and
/// autoscaler reconciliation is pass-through — no prescale mutation
///.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimpleReconciler;

impl TrafficReconciler for SimpleReconciler {
    fn reconcile(&self, container: &StackSetContainer, _now: DateTime<Utc>) -> ReconcileOutput {
        let desired = desired_weights(container);
        ReconcileOutput { available: desired.clone(), desired, actions: Vec::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ReconcilerVariant, TrafficEntry};

    #[test]
    fn available_equals_desired() {
        let mut container = crate::test_support::empty_stackset_container("foo", ReconcilerVariant::Simple);
        container.stackset.spec.traffic =
            vec![TrafficEntry { stack_name: "foo-v1".into(), weight: 30.0 }, TrafficEntry { stack_name: "foo-v2".into(), weight: 70.0 }];
        let out = SimpleReconciler.reconcile(&container, Utc::now());
        assert_eq!(out.desired, out.available);
    }
}
