//! Reconciles StackSet traffic weights across versioned Stack revisions:
//! builds per-family ownership containers from a flat cluster snapshot,
//! runs the pluggable traffic policy, converges child resources, and
//! enforces the ingress/routegroup migration grace window.

pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod lifecycle;
pub mod metrics;
pub mod model;
pub mod ownership;
pub mod reconcile;
pub mod switch;
pub mod traffic;
pub mod weights;

#[cfg(test)]
mod test_support;
