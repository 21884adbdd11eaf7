// C7: the reconcile loop. One pass indexes the whole snapshot (C2), then
// drains a bounded pool of `config.workers` concurrent slots, each draining
// one StackSet key through stack lifecycle (C3), traffic (C4/C5), and child
// convergence (C6) in that fixed order, applying writes through the
// `ClusterClient` as it goes. No inbound RPC surface here, just a ticking
// resync.

use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{error, info, warn};

use crate::client::ClusterClient;
use crate::config::{Config, NO_TRAFFIC_SINCE_ANNOTATION, PRESCALE_REPLICAS_ANNOTATION, RELAX_FLOOR_ANNOTATION, STACK_TRAFFIC_WEIGHTS_ANNOTATION};
use crate::error::ControllerError;
use crate::metrics::Metrics;
use crate::model::StackSetContainer;
use crate::ownership;
use crate::reconcile::{self, ChildAction};
use crate::traffic::{simple::SimpleReconciler, prescaling::PrescalingReconciler, ReconcileAction, TrafficReconciler};
use crate::{lifecycle, weights};

/// Run the resync loop until `shutdown` fires. The controller is stateless
/// across restarts, so a dropped receiver (process killed) loses nothing
/// that a fresh snapshot doesn't reconstruct.
pub async fn run(client: Arc<dyn ClusterClient>, config: Config, metrics: Arc<Metrics>, mut shutdown: tokio::sync::watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(config.resync_interval());
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = reconcile_once(client.as_ref(), &config, &metrics).await {
                    error!(error = %e, "reconcile pass aborted");
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("shutdown requested, stopping resync loop");
                    return;
                }
            }
        }
    }
}

/// One full resync: list, index, and drain every owned StackSet key through
/// a bounded pool of `config.workers` concurrent reconcile slots. Each key
/// maps to exactly one in-flight future, so two workers never touch the same
/// StackSet at once; unrelated keys make progress independently, and a
/// single key's failure is logged and counted but never aborts the pass.
pub async fn reconcile_once(client: &dyn ClusterClient, config: &Config, metrics: &Metrics) -> Result<(), ControllerError> {
    metrics.record_pass();
    let snapshot = client.snapshot().await?;
    let mut containers = ownership::index(&snapshot, config);
    let now = Utc::now();
    let workers = config.workers.max(1);

    stream::iter(containers.iter_mut())
        .for_each_concurrent(workers, |(uid, container)| async move {
            if let Err(e) = reconcile_key(client, config, metrics, container, now).await {
                warn!(stackset_uid = %uid, error = %e, retryable = e.is_retryable(), "reconcile key failed");
                metrics.record_pass_error();
            }
        })
        .await;
    Ok(())
}

async fn reconcile_key(client: &dyn ClusterClient, config: &Config, metrics: &Metrics, container: &mut StackSetContainer, now: chrono::DateTime<Utc>) -> Result<(), ControllerError> {
    // 1. Stack creation. A conflict means the Stack already exists (created
    //    by a previous pass that failed before this write, or concurrently
    //    by another controller instance) — idempotent, not an error.
    if let Some(stack) = lifecycle::stack_to_create(container, now) {
        match client.create_stack(&stack).await {
            Ok(()) => metrics.record_stack_created(),
            Err(ControllerError::Conflict { .. }) => {}
            Err(e) => return Err(e),
        }
        container.stackset.status.observed_stack_version = Some(container.stackset.spec.stack_template.version.clone());
        client.update_stackset(&container.stackset).await?;
    }

    // 2. Traffic reconciliation (C4/C5).
    let output = match &container.reconciler {
        crate::model::ReconcilerVariant::Simple => SimpleReconciler.reconcile(container, now),
        crate::model::ReconcilerVariant::Prescaling { reset_hpa_min_replicas_delay } => {
            PrescalingReconciler { reset_hpa_min_replicas_delay: *reset_hpa_min_replicas_delay }.reconcile(container, now)
        }
    };
    apply_reconcile_actions(client, container, &output.actions).await?;

    // 3. Child convergence, including the ingress/routegroup grace window (C6).
    let plan = reconcile::child_plan(container, config.grace_window(), now);
    apply_child_plan(client, container, &plan).await?;

    // 4. Persist the traffic-weights annotation onto whichever routing
    //    object(s) are present, so the switch CLI and the router agree on
    //    the same state this pass just computed.
    write_traffic_annotation(client, container, &output.available).await?;
    if !weights::all_zero(&output.available) {
        metrics.record_weight_write();
    }

    // 5. Stack deletion, last, so nothing still-referenced in this pass gets
    //    torn down ahead of the writes above.
    lifecycle::mark_pending_removal(container, now);
    let to_delete: Vec<String> = lifecycle::stacks_to_delete(container).map(|sc| sc.name().to_string()).collect();
    for name in to_delete {
        client.delete_stack(&container.stackset.meta.namespace, &name).await?;
        metrics.record_stack_deleted();
        container.stacks.remove(&name);
    }

    Ok(())
}

async fn apply_reconcile_actions(client: &dyn ClusterClient, container: &mut StackSetContainer, actions: &[ReconcileAction]) -> Result<(), ControllerError> {
    for action in actions {
        match action {
            ReconcileAction::SetPrescaleReplicas { stack, replicas } => {
                set_stack_annotation(client, container, stack, PRESCALE_REPLICAS_ANNOTATION, replicas.to_string()).await?;
            }
            ReconcileAction::RemovePrescaleReplicas { stack } => {
                remove_stack_annotation(client, container, stack, PRESCALE_REPLICAS_ANNOTATION).await?;
            }
            ReconcileAction::PinWorkloadReplicas { stack, replicas } => {
                if let Some(sc) = container.stacks.get_mut(stack) {
                    if let Some(workload) = sc.resources.workload.as_mut() {
                        workload.replicas = *replicas;
                        client.upsert_workload(workload).await?;
                    }
                }
            }
            ReconcileAction::SetHpaMinReplicas { stack, min_replicas } => {
                if let Some(sc) = container.stacks.get_mut(stack) {
                    if let Some(autoscaler) = sc.resources.autoscaler.as_mut() {
                        autoscaler.min_replicas = *min_replicas;
                        client.upsert_autoscaler(autoscaler).await?;
                    }
                    set_stack_annotation_inner(sc, RELAX_FLOOR_ANNOTATION, min_replicas.to_string());
                }
            }
            ReconcileAction::MarkNoTrafficSince { stack, at } => {
                set_stack_annotation(client, container, stack, NO_TRAFFIC_SINCE_ANNOTATION, at.to_rfc3339()).await?;
            }
            ReconcileAction::ClearNoTrafficSince { stack } => {
                remove_stack_annotation(client, container, stack, NO_TRAFFIC_SINCE_ANNOTATION).await?;
                remove_stack_annotation(client, container, stack, RELAX_FLOOR_ANNOTATION).await?;
            }
        }
    }
    Ok(())
}

fn set_stack_annotation_inner(sc: &mut crate::model::StackContainer, key: &str, value: String) {
    sc.stack.meta.annotations.insert(key.to_string(), value);
}

async fn set_stack_annotation(client: &dyn ClusterClient, container: &mut StackSetContainer, stack: &str, key: &str, value: String) -> Result<(), ControllerError> {
    let Some(sc) = container.stacks.get_mut(stack) else { return Ok(()) };
    sc.stack.meta.annotations.insert(key.to_string(), value.clone());
    if let Some(workload) = sc.resources.workload.as_mut() {
        workload.meta.annotations.insert(key.to_string(), value);
        client.upsert_workload(workload).await?;
    }
    Ok(())
}

async fn remove_stack_annotation(client: &dyn ClusterClient, container: &mut StackSetContainer, stack: &str, key: &str) -> Result<(), ControllerError> {
    let Some(sc) = container.stacks.get_mut(stack) else { return Ok(()) };
    sc.stack.meta.annotations.remove(key);
    if let Some(workload) = sc.resources.workload.as_mut() {
        workload.meta.annotations.remove(key);
        client.upsert_workload(workload).await?;
    }
    Ok(())
}

async fn apply_child_plan(client: &dyn ClusterClient, container: &mut StackSetContainer, plan: &[ChildAction]) -> Result<(), ControllerError> {
    let namespace = container.stackset.meta.namespace.clone();
    let stackset_name = container.stackset.meta.name.clone();
    for action in plan {
        match action {
            ChildAction::UpsertWorkload { stack } => {
                if let Some(sc) = container.stacks.get(stack) {
                    if let Some(workload) = &sc.resources.workload {
                        client.upsert_workload(workload).await?;
                    }
                }
            }
            ChildAction::UpsertAutoscaler { stack } => {
                if let Some(sc) = container.stacks.get(stack) {
                    if let Some(autoscaler) = &sc.resources.autoscaler {
                        client.upsert_autoscaler(autoscaler).await?;
                    }
                }
            }
            ChildAction::UpsertService { stack } => {
                if let Some(sc) = container.stacks.get(stack) {
                    if let Some(service) = &sc.resources.service {
                        client.upsert_service(service).await?;
                    }
                }
            }
            ChildAction::UpsertIngress => {
                if let Some(ingress) = &container.ingress {
                    client.upsert_ingress(ingress).await?;
                }
            }
            ChildAction::DeleteIngress => {
                client.delete_ingress(&namespace, &stackset_name).await?;
                container.ingress = None;
            }
            ChildAction::UpsertRouteGroup => {
                if let Some(routegroup) = &container.routegroup {
                    client.upsert_routegroup(routegroup).await?;
                }
            }
            ChildAction::DeleteRouteGroup => {
                client.delete_routegroup(&namespace, &stackset_name).await?;
                container.routegroup = None;
            }
        }
    }
    Ok(())
}

/// Writes the weight map the router actually reads: onto
/// whichever of ingress/routegroup is present, so a StackSet mid-migration
/// keeps both in sync.
async fn write_traffic_annotation(client: &dyn ClusterClient, container: &mut StackSetContainer, available: &weights::WeightMap) -> Result<(), ControllerError> {
    let serialized = weights::to_annotation_json(available);
    if let Some(ingress) = container.ingress.as_mut() {
        ingress.meta.annotations.insert(STACK_TRAFFIC_WEIGHTS_ANNOTATION.to_string(), serialized.clone());
        client.upsert_ingress(ingress).await?;
    }
    if let Some(routegroup) = container.routegroup.as_mut() {
        routegroup.meta.annotations.insert(STACK_TRAFFIC_WEIGHTS_ANNOTATION.to_string(), serialized);
        client.upsert_routegroup(routegroup).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::FakeClusterClient;
    use crate::model::{LifecyclePolicy, ObjectMeta, StackSet, StackSetSpec, StackSetStatus, StackTemplate, TrafficEntry};

    #[tokio::test]
    async fn bootstrap_creates_the_first_stack() {
        let client = FakeClusterClient::new();
        client.seed_stackset(StackSet {
            meta: ObjectMeta::new("default", "foo", "ss-1"),
            spec: StackSetSpec {
                stack_template: StackTemplate { version: "v1".into(), workload_spec: serde_json::json!({}) },
                autoscaler_spec: None,
                ingress_spec: None,
                routegroup_spec: None,
                traffic: vec![TrafficEntry { stack_name: "foo-v1".into(), weight: 100.0 }],
                lifecycle: LifecyclePolicy::default(),
            },
            status: StackSetStatus::default(),
        });
        let config = Config::default();
        let metrics = Metrics::new();
        reconcile_once(&client, &config, &metrics).await.unwrap();

        let snapshot = client.snapshot().await.unwrap();
        assert_eq!(snapshot.stacks.len(), 1);
        assert_eq!(snapshot.stacks[0].meta.name, "foo-v1");
        assert_eq!(metrics.snapshot().stacks_created_total, 1);
    }
}
