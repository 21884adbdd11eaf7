pub mod container;
pub mod resources;
pub mod stack;
pub mod stackset;

pub use container::{ReconcilerVariant, StackContainer, StackSetContainer, TrafficStatus};
pub use resources::{Autoscaler, Ingress, ObjectMeta, OwnerRef, Resources, RouteGroup, Service, Workload};
pub use stack::{Stack, StackSpec, StackStatus};
pub use stackset::{LifecyclePolicy, StackSet, StackSetSpec, StackSetStatus, StackTemplate, TrafficEntry};
