//! Prometheus metrics for the registration store.
//!
//! Counters are recorded through the `metrics` facade; the host process
//! decides where they go. [`install_prometheus`] wires up the Prometheus
//! exporter for hosts that want it.
//!
//! # Example
//!
//! ```rust,no_run
//! use registration_runtime::metrics::install_prometheus;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let handle = install_prometheus()?;
//!
//! // Serve this from the web layer's /metrics route
//! let body = handle.render();
//! # Ok(())
//! # }
//! ```

use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Once;
use thiserror::Error;

/// Registrations persisted.
pub const REGISTRATIONS_CREATED: &str = "registration.created";
/// Registration-number collisions reported by the backend.
pub const NUMBER_COLLISIONS: &str = "registration.number_collisions";
/// Event collections created through the registry.
pub const COLLECTIONS_CREATED: &str = "registration.collections_created";
/// Lifecycle transitions applied, labelled by `kind`.
pub const TRANSITIONS: &str = "registration.transitions";
/// Revision conflicts that forced a reload.
pub const CONFLICTS: &str = "registration.conflicts";

/// Errors from metrics setup.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Install the Prometheus recorder globally and describe every counter.
///
/// # Errors
///
/// Returns [`MetricsError::Install`] if a recorder is already installed.
pub fn install_prometheus() -> Result<PrometheusHandle, MetricsError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| MetricsError::Install(e.to_string()))?;
    register_metrics();
    tracing::info!("Prometheus metrics recorder installed");
    Ok(handle)
}

/// Register all metric descriptions with the current recorder.
///
/// Runs once per process; later calls are no-ops.
pub fn register_metrics() {
    static DESCRIBED: Once = Once::new();
    DESCRIBED.call_once(|| {
        describe_counter!(REGISTRATIONS_CREATED, "Total number of registrations persisted");
        describe_counter!(
            NUMBER_COLLISIONS,
            "Total number of registration-number collisions that forced regeneration"
        );
        describe_counter!(COLLECTIONS_CREATED, "Total number of event collections created");
        describe_counter!(TRANSITIONS, "Total number of lifecycle transitions applied");
        describe_counter!(CONFLICTS, "Total number of revision conflicts during updates");
    });
}

/// Registration store metrics recorder.
pub struct RegistrationMetrics;

impl RegistrationMetrics {
    /// Record a persisted registration.
    pub fn record_created(event_name: &str) {
        counter!(REGISTRATIONS_CREATED, "event" => event_name.to_string()).increment(1);
    }

    /// Record a registration-number collision.
    pub fn record_collision() {
        counter!(NUMBER_COLLISIONS).increment(1);
    }

    /// Record a newly created event collection.
    pub fn record_collection_created() {
        counter!(COLLECTIONS_CREATED).increment(1);
    }

    /// Record an applied transition.
    pub fn record_transition(kind: &'static str) {
        counter!(TRANSITIONS, "kind" => kind).increment(1);
    }

    /// Record a revision conflict.
    pub fn record_conflict() {
        counter!(CONFLICTS).increment(1);
    }
}
