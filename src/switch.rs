// Library half of the `traffic` CLI. Talks to the same
// `ClusterClient` the controller uses and the same pure `weights` module, so
// a switch made here and a switch made by the background reconciler can
// never disagree about what "100%" means.

use crate::client::ClusterClient;
use crate::error::{ControllerError, ControllerResult, WeightError};
use crate::model::TrafficEntry;
use crate::weights::{self, WeightMap};

/// Current desired weights for a StackSet, normalized from `spec.traffic` —
/// the same field the background reconciler reads, not a cached annotation.
pub async fn current_weights(client: &dyn ClusterClient, namespace: &str, name: &str) -> ControllerResult<WeightMap> {
    let stackset = client.get_stackset(namespace, name).await?;
    Ok(weights::normalize(&raw_weights(&stackset)))
}

/// Set `stack_name`'s weight to `target` and persist the rescaled map back
/// onto the StackSet's `spec.traffic`, the field the background reconciler
/// reads when computing `desired`. Fails without writing anything if
/// `target` would require demoting the sole backend.
pub async fn set_weight(client: &dyn ClusterClient, namespace: &str, name: &str, stack_name: &str, target: f64) -> ControllerResult<WeightMap> {
    let mut stackset = client.get_stackset(namespace, name).await?;
    let current = raw_weights(&stackset);
    let updated = weights::set_weight(&current, stack_name, target).map_err(ControllerError::Invariant)?;

    stackset.spec.traffic = updated.iter().map(|(name, weight)| TrafficEntry { stack_name: name.clone(), weight: *weight }).collect();
    client.update_stackset(&stackset).await?;
    Ok(updated)
}

fn raw_weights(stackset: &crate::model::StackSet) -> Vec<(String, f64)> {
    stackset.spec.traffic.iter().map(|t| (t.stack_name.clone(), t.weight)).collect()
}

/// Process exit code for a switch failure, distinguishing the expected
/// "can't demote the sole backend" outcome (`ERR_SOLE_BACKEND`) from
/// everything else.
pub fn exit_code(err: &ControllerError) -> i32 {
    match err {
        ControllerError::Invariant(WeightError::SoleBackend { .. }) => 2,
        _ => 1,
    }
}
