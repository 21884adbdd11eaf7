// The boundary to the cluster API. The real implementation would wrap a
// Kubernetes client; SPEC_FULL.md §1 sanctions stopping short of one and
// instead fixes this trait as the seam, grounded on the way the sidecar's
// `client.rs` separates transport from the operations it exposes.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{ControllerError, ControllerResult};
use crate::model::{Autoscaler, Ingress, ObjectMeta, RouteGroup, Service, Stack, StackSet, Workload};
use crate::ownership::ClusterSnapshot;

/// Everything the controller and the `traffic` CLI need from the cluster.
/// One method per child kind keeps each call's failure mode (a single
/// object conflict) distinct from a full-snapshot list failure.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    async fn snapshot(&self) -> ControllerResult<ClusterSnapshot>;

    async fn get_stackset(&self, namespace: &str, name: &str) -> ControllerResult<StackSet>;
    async fn update_stackset(&self, stackset: &StackSet) -> ControllerResult<()>;

    async fn create_stack(&self, stack: &Stack) -> ControllerResult<()>;
    async fn delete_stack(&self, namespace: &str, name: &str) -> ControllerResult<()>;

    async fn upsert_workload(&self, workload: &Workload) -> ControllerResult<()>;
    async fn upsert_autoscaler(&self, autoscaler: &Autoscaler) -> ControllerResult<()>;
    async fn upsert_service(&self, service: &Service) -> ControllerResult<()>;
    async fn upsert_ingress(&self, ingress: &Ingress) -> ControllerResult<()>;
    async fn delete_ingress(&self, namespace: &str, name: &str) -> ControllerResult<()>;
    async fn upsert_routegroup(&self, routegroup: &RouteGroup) -> ControllerResult<()>;
    async fn delete_routegroup(&self, namespace: &str, name: &str) -> ControllerResult<()>;
}

/// In-memory double used by tests and by the `traffic` CLI's dry-run mode.
/// Objects are keyed by `(namespace, name)`; there is no optimistic
/// concurrency here, unlike a real API server, so conflict tests are left
/// to the reconciler's own unit tests rather than this fake.
#[derive(Default)]
pub struct FakeClusterClient {
    state: Mutex<FakeState>,
}

#[derive(Default)]
struct FakeState {
    stacksets: HashMap<(String, String), StackSet>,
    stacks: HashMap<(String, String), Stack>,
    workloads: HashMap<(String, String), Workload>,
    autoscalers: HashMap<(String, String), Autoscaler>,
    services: HashMap<(String, String), Service>,
    ingresses: HashMap<(String, String), Ingress>,
    routegroups: HashMap<(String, String), RouteGroup>,
}

fn key(meta: &ObjectMeta) -> (String, String) {
    (meta.namespace.clone(), meta.name.clone())
}

impl FakeClusterClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_stackset(&self, stackset: StackSet) {
        let mut state = self.state.lock().expect("fake cluster client lock poisoned");
        state.stacksets.insert(key(&stackset.meta), stackset);
    }

    pub fn seed_stack(&self, stack: Stack) {
        let mut state = self.state.lock().expect("fake cluster client lock poisoned");
        state.stacks.insert(key(&stack.meta), stack);
    }
}

#[async_trait]
impl ClusterClient for FakeClusterClient {
    async fn snapshot(&self) -> ControllerResult<ClusterSnapshot> {
        let state = self.state.lock().expect("fake cluster client lock poisoned");
        Ok(ClusterSnapshot {
            stacksets: state.stacksets.values().cloned().collect(),
            stacks: state.stacks.values().cloned().collect(),
            workloads: state.workloads.values().cloned().collect(),
            autoscalers: state.autoscalers.values().cloned().collect(),
            services: state.services.values().cloned().collect(),
            ingresses: state.ingresses.values().cloned().collect(),
            routegroups: state.routegroups.values().cloned().collect(),
        })
    }

    async fn get_stackset(&self, namespace: &str, name: &str) -> ControllerResult<StackSet> {
        let state = self.state.lock().expect("fake cluster client lock poisoned");
        state
            .stacksets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| ControllerError::Api(format!("stackset {namespace}/{name} not found")))
    }

    async fn update_stackset(&self, stackset: &StackSet) -> ControllerResult<()> {
        let mut state = self.state.lock().expect("fake cluster client lock poisoned");
        state.stacksets.insert(key(&stackset.meta), stackset.clone());
        Ok(())
    }

    async fn create_stack(&self, stack: &Stack) -> ControllerResult<()> {
        let mut state = self.state.lock().expect("fake cluster client lock poisoned");
        let k = key(&stack.meta);
        if state.stacks.contains_key(&k) {
            return Err(ControllerError::Conflict { kind: "Stack", name: stack.meta.name.clone() });
        }
        state.stacks.insert(k, stack.clone());
        Ok(())
    }

    async fn delete_stack(&self, namespace: &str, name: &str) -> ControllerResult<()> {
        let mut state = self.state.lock().expect("fake cluster client lock poisoned");
        state.stacks.remove(&(namespace.to_string(), name.to_string()));
        Ok(())
    }

    async fn upsert_workload(&self, workload: &Workload) -> ControllerResult<()> {
        let mut state = self.state.lock().expect("fake cluster client lock poisoned");
        state.workloads.insert(key(&workload.meta), workload.clone());
        Ok(())
    }

    async fn upsert_autoscaler(&self, autoscaler: &Autoscaler) -> ControllerResult<()> {
        let mut state = self.state.lock().expect("fake cluster client lock poisoned");
        state.autoscalers.insert(key(&autoscaler.meta), autoscaler.clone());
        Ok(())
    }

    async fn upsert_service(&self, service: &Service) -> ControllerResult<()> {
        let mut state = self.state.lock().expect("fake cluster client lock poisoned");
        state.services.insert(key(&service.meta), service.clone());
        Ok(())
    }

    async fn upsert_ingress(&self, ingress: &Ingress) -> ControllerResult<()> {
        let mut state = self.state.lock().expect("fake cluster client lock poisoned");
        state.ingresses.insert(key(&ingress.meta), ingress.clone());
        Ok(())
    }

    async fn delete_ingress(&self, namespace: &str, name: &str) -> ControllerResult<()> {
        let mut state = self.state.lock().expect("fake cluster client lock poisoned");
        state.ingresses.remove(&(namespace.to_string(), name.to_string()));
        Ok(())
    }

    async fn upsert_routegroup(&self, routegroup: &RouteGroup) -> ControllerResult<()> {
        let mut state = self.state.lock().expect("fake cluster client lock poisoned");
        state.routegroups.insert(key(&routegroup.meta), routegroup.clone());
        Ok(())
    }

    async fn delete_routegroup(&self, namespace: &str, name: &str) -> ControllerResult<()> {
        let mut state = self.state.lock().expect("fake cluster client lock poisoned");
        state.routegroups.remove(&(namespace.to_string(), name.to_string()));
        Ok(())
    }
}
