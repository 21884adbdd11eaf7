// Reconcile-pass counters. No OTEL exporter wiring here, but the counters
// exist and are queryable.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Metrics {
    passes_total: AtomicU64,
    pass_errors_total: AtomicU64,
    stacks_created_total: AtomicU64,
    stacks_deleted_total: AtomicU64,
    weight_writes_total: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_pass(&self) {
        self.passes_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pass_error(&self) {
        self.pass_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stack_created(&self) {
        self.stacks_created_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stack_deleted(&self) {
        self.stacks_deleted_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_weight_write(&self) {
        self.weight_writes_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            passes_total: self.passes_total.load(Ordering::Relaxed),
            pass_errors_total: self.pass_errors_total.load(Ordering::Relaxed),
            stacks_created_total: self.stacks_created_total.load(Ordering::Relaxed),
            stacks_deleted_total: self.stacks_deleted_total.load(Ordering::Relaxed),
            weight_writes_total: self.weight_writes_total.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub passes_total: u64,
    pub pass_errors_total: u64,
    pub stacks_created_total: u64,
    pub stacks_deleted_total: u64,
    pub weight_writes_total: u64,
}
