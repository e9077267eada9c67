// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the OVN database operator.
//!
//! All metrics carry the namespace prefix `ovn_openstack_org_` (prometheus-safe
//! version of "ovn.openstack.org").
//!
//! # Metrics Categories
//!
//! - **Reconciliation Metrics** - Track reconciliation passes and their outcomes
//! - **DNS Record Metrics** - Track `DNSData` writes and garbage collection
//! - **Concurrency Metrics** - Track optimistic-concurrency write conflicts
//!
//! # Example
//!
//! ```rust,no_run
//! use ovndb_operator::metrics::record_reconciliation_success;
//!
//! record_reconciliation_success("OVNDBCluster", std::time::Duration::from_secs(1));
//! ```

use prometheus::core::Collector;
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::error;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all operator metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "ovn_openstack_org";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Register a collector, logging instead of failing if the name is already taken.
fn register<C: Collector + Clone + 'static>(collector: C) -> C {
    if let Err(e) = METRICS_REGISTRY.register(Box::new(collector.clone())) {
        error!(error = %e, "Failed to register metric");
    }
    collector
}

fn counter_vec(name: &str, help: &str, labels: &[&str]) -> CounterVec {
    let opts = Opts::new(format!("{METRICS_NAMESPACE}_{name}"), help);
    register(CounterVec::new(opts, labels).expect("metric name and labels are static and valid"))
}

// ============================================================================
// Reconciliation Metrics
// ============================================================================

/// Total number of reconciliations by resource type and status
///
/// Labels:
/// - `resource_type`: Kind of resource (e.g., `OVNDBCluster`)
/// - `status`: Outcome (`success`, `error`, `requeue`)
pub static RECONCILIATION_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter_vec(
        "reconciliations_total",
        "Total number of reconciliations by resource type and status",
        &["resource_type", "status"],
    )
});

/// Duration of reconciliations in seconds
///
/// Labels:
/// - `resource_type`: Kind of resource
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of reconciliations in seconds by resource type",
    )
    .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]);
    register(
        HistogramVec::new(opts, &["resource_type"])
            .expect("metric name and labels are static and valid"),
    )
});

// ============================================================================
// DNS Record Metrics
// ============================================================================

/// Total number of `DNSData` writes
///
/// Labels:
/// - `operation`: `create` or `update`
pub static DNS_RECORDS_WRITTEN_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter_vec(
        "dns_records_written_total",
        "Total number of DNSData records created or updated",
        &["operation"],
    )
});

/// Total number of `DNSData` deletions
///
/// Labels:
/// - `reason`: `orphaned` (pod gone) or `cluster_deleted`
pub static DNS_RECORDS_DELETED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter_vec(
        "dns_records_deleted_total",
        "Total number of DNSData records deleted",
        &["reason"],
    )
});

// ============================================================================
// Concurrency Metrics
// ============================================================================

/// Total number of optimistic-concurrency conflicts observed
///
/// Labels:
/// - `operation`: Operation that hit the conflict
pub static WRITE_CONFLICTS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    counter_vec(
        "write_conflicts_total",
        "Total number of write conflicts resolved by re-reading",
        &["operation"],
    )
});

// ============================================================================
// Recording Helpers
// ============================================================================

/// Record a successful reconciliation
///
/// # Arguments
/// * `resource_type` - The kind of resource reconciled (e.g., `OVNDBCluster`)
/// * `duration` - Duration of the reconciliation
pub fn record_reconciliation_success(resource_type: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, "success"])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[resource_type])
        .observe(duration.as_secs_f64());
}

/// Record a failed reconciliation
///
/// # Arguments
/// * `resource_type` - The kind of resource reconciled
/// * `duration` - Duration of the reconciliation before failure
pub fn record_reconciliation_error(resource_type: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, "error"])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[resource_type])
        .observe(duration.as_secs_f64());
}

/// Record a reconciliation that finished but is waiting on the cluster to become ready
pub fn record_reconciliation_requeue(resource_type: &str) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, "requeue"])
        .inc();
}

/// Record a `DNSData` create (`created == true`) or update.
pub fn record_dns_record_written(created: bool) {
    let operation = if created { "create" } else { "update" };
    DNS_RECORDS_WRITTEN_TOTAL
        .with_label_values(&[operation])
        .inc();
}

/// Record a `DNSData` deletion.
pub fn record_dns_record_deleted(reason: &str) {
    DNS_RECORDS_DELETED_TOTAL.with_label_values(&[reason]).inc();
}

/// Record a write conflict.
pub fn record_write_conflict(operation: &str) {
    // Operation names embed object names; keep label cardinality bounded.
    let operation = operation.split_whitespace().next().unwrap_or(operation);
    WRITE_CONFLICTS_TOTAL.with_label_values(&[operation]).inc();
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
