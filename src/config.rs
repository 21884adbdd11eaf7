// Controller configuration, loaded from environment variables with defaults
// and overridable via CLI flags (see main.rs). Mirrors the env-or-default
// idiom the sidecar's configuration module uses.

use std::time::Duration;

use clap::Parser;

/// Top-level controller configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "stackset-controller", about = "Reconciles StackSet traffic weights")]
pub struct Config {
    /// Only reconcile StackSets whose `stackset-controller.zalando.org/controller`
    /// annotation matches this id, or which omit the annotation entirely.
    #[arg(long, env = "CONTROLLER_ID", default_value = "")]
    pub controller_id: String,

    /// Interval between full resyncs of all known StackSets.
    #[arg(long, env = "RESYNC_INTERVAL_SECONDS", default_value_t = 60)]
    pub resync_interval_seconds: u64,

    /// Number of reconcile workers draining the per-key work queue.
    #[arg(long, env = "WORKERS", default_value_t = 4)]
    pub workers: usize,

    /// Default cool-down before a RELAXING stack's HPA floor is released,
    /// used when a StackSet opts into prescaling without overriding
    /// `reset-hpa-min-replicas-delay`.
    #[arg(long, env = "RESET_HPA_MIN_REPLICAS_DELAY_SECONDS", default_value_t = 300)]
    pub default_reset_hpa_min_replicas_delay_seconds: u64,

    /// Grace window a replacement ingress/routegroup must exist for before
    /// its predecessor is torn down.
    #[arg(long, env = "GRACE_WINDOW_SECONDS", default_value_t = 60)]
    pub grace_window_seconds: u64,

    /// Annotation key the external router writes actual/backend weights to.
    #[arg(long, env = "BACKEND_WEIGHTS_ANNOTATION", default_value = "zalando.org/backend-weights")]
    pub backend_weights_annotation: String,
}

impl Config {
    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_seconds)
    }

    pub fn default_reset_hpa_min_replicas_delay(&self) -> Duration {
        Duration::from_secs(self.default_reset_hpa_min_replicas_delay_seconds)
    }

    pub fn grace_window(&self) -> Duration {
        Duration::from_secs(self.grace_window_seconds)
    }

    /// A StackSet is in scope for this controller instance iff it omits the
    /// controller annotation, or the annotation matches our configured id.
    pub fn owns(&self, annotation: Option<&str>) -> bool {
        match annotation {
            None => true,
            Some(id) => id == self.controller_id,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            controller_id: String::new(),
            resync_interval_seconds: 60,
            workers: 4,
            default_reset_hpa_min_replicas_delay_seconds: 300,
            grace_window_seconds: 60,
            backend_weights_annotation: "zalando.org/backend-weights".to_string(),
        }
    }
}

pub const STACK_TRAFFIC_WEIGHTS_ANNOTATION: &str = "zalando.org/stack-traffic-weights";
pub const PRESCALE_REPLICAS_ANNOTATION: &str = "stacksetstacks.zalando.org/prescale-replicas";
pub const PRESCALE_STACKS_ANNOTATION: &str = "alpha.stackset-controller.zalando.org/prescale-stacks";
pub const RESET_HPA_MIN_REPLICAS_DELAY_ANNOTATION: &str =
    "alpha.stackset-controller.zalando.org/reset-hpa-min-replicas-delay";
pub const UPDATED_TIMESTAMP_ANNOTATION: &str = "stackset-controller.zalando.org/updated-timestamp";
pub const CONTROLLER_ANNOTATION: &str = "stackset-controller.zalando.org/controller";

/// Durable marker recording when a Stack's actual weight dropped to zero,
/// driving the RELAXING cool-down countdown — see DESIGN.md for the Open
/// Question this resolves.
pub const NO_TRAFFIC_SINCE_ANNOTATION: &str = "stackset-controller.zalando.org/no-traffic-since";

/// Remembers the prescale target so the HPA floor can stay pinned during
/// RELAXING after the `prescale-replicas` annotation itself is removed.
pub const RELAX_FLOOR_ANNOTATION: &str = "stackset-controller.zalando.org/relax-floor-replicas";
