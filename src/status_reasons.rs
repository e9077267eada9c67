// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Standard Kubernetes status condition types and reasons for `OVNDBCluster`.
//!
//! Reasons are programmatic identifiers in CamelCase that explain why a
//! condition has a particular status.
//!
//! # Condition Hierarchy
//!
//! An `OVNDBCluster` carries a single encompassing `type: Ready` condition plus
//! one condition per reconcile stage and one indexed condition per pod:
//!
//! ```yaml
//! status:
//!   conditions:
//!     - type: Ready
//!       status: "False"
//!       reason: NetworkAttachmentPending
//!       message: "Pod ovsdbserver-nb-0 has no IP on network internalapi"
//!     - type: InputReady
//!       status: "True"
//!       reason: ConfigurationValid
//!     - type: DeploymentReady
//!       status: "True"
//!       reason: AllReady
//!       message: "3/3 replicas ready"
//!     - type: NetworkAttachmentsReady
//!       status: "False"
//!       reason: NetworkAttachmentPending
//!     - type: Pod-0
//!       status: "True"
//!       reason: Ready
//!       message: "Pod ovsdbserver-nb-0 is ready"
//! ```

// ============================================================================
// Common Reasons
// ============================================================================

/// Every stage of the cluster is ready. Use for the encompassing `Ready` condition.
pub const REASON_ALL_READY: &str = "AllReady";

/// A single child (pod) or stage is ready.
pub const REASON_READY: &str = "Ready";

/// Some replicas are ready, others are still starting.
pub const REASON_PARTIALLY_READY: &str = "PartiallyReady";

/// The child or stage is not ready yet.
pub const REASON_NOT_READY: &str = "NotReady";

/// Resources are being created or scaled.
pub const REASON_PROGRESSING: &str = "Progressing";

/// The cluster spec passed boundary validation.
pub const REASON_CONFIGURATION_VALID: &str = "ConfigurationValid";

/// The cluster spec violates an invariant (e.g. more than one network attachment).
///
/// Reconciliation will keep failing until the cluster spec is corrected.
pub const REASON_CONFIGURATION_INVALID: &str = "ConfigurationInvalid";

/// Reconciliation stopped at spec validation. Used on the `Ready` condition.
pub const REASON_VALIDATION_FAILED: &str = "ValidationFailed";

// ============================================================================
// Workload Reasons
// ============================================================================

/// No replica pods exist yet (statefulset just created or scaled to zero).
pub const REASON_PODS_PENDING: &str = "PodsPending";

/// The headless service for the database role does not exist or exposes no ports.
pub const REASON_SERVICE_NOT_READY: &str = "ServiceNotReady";

// ============================================================================
// Network Attachment Reasons
// ============================================================================

/// A pod has not (yet) been given an IP on the configured network attachment.
pub const REASON_NETWORK_ATTACHMENT_PENDING: &str = "NetworkAttachmentPending";

/// No network attachment is configured; the default pod network is used.
pub const REASON_NO_NETWORK_ATTACHMENT: &str = "NoNetworkAttachment";

// ============================================================================
// DNS Reasons
// ============================================================================

/// One `DNSData` record per pod is in place.
pub const REASON_DNS_DATA_SYNCED: &str = "DNSDataSynced";

/// Writing a `DNSData` record failed.
pub const REASON_DNS_DATA_FAILED: &str = "DNSDataFailed";

// ============================================================================
// Condition Types
// ============================================================================

/// Primary condition type indicating overall resource readiness.
pub const CONDITION_TYPE_READY: &str = "Ready";

/// Boundary validation of the cluster spec.
pub const CONDITION_TYPE_INPUT_READY: &str = "InputReady";

/// StatefulSet replicas match the desired count and report ready.
pub const CONDITION_TYPE_DEPLOYMENT_READY: &str = "DeploymentReady";

/// The headless service exists and exposes the database port.
pub const CONDITION_TYPE_SERVICE_READY: &str = "ServiceReady";

/// Every pod has an IP on the configured network attachment.
pub const CONDITION_TYPE_NETWORK_ATTACHMENTS_READY: &str = "NetworkAttachmentsReady";

/// Every pod has an up-to-date `DNSData` record.
pub const CONDITION_TYPE_DNS_DATA_READY: &str = "DNSDataReady";

/// Condition type prefix for tracking individual `Pod` children.
///
/// Format: `Pod-{index}` (e.g., "Pod-0", "Pod-1")
pub const CONDITION_TYPE_POD_PREFIX: &str = "Pod";

// ============================================================================
// Helper Functions
// ============================================================================

/// Create a condition type for a specific Pod child.
///
/// # Example
///
/// ```rust
/// use ovndb_operator::status_reasons::pod_condition_type;
///
/// assert_eq!(pod_condition_type(0), "Pod-0");
/// ```
#[must_use]
pub fn pod_condition_type(index: usize) -> String {
    format!("{CONDITION_TYPE_POD_PREFIX}-{index}")
}

/// Extract the index from a child condition type such as `Pod-2`.
///
/// Returns `None` when the condition type carries no numeric suffix.
#[must_use]
pub fn extract_child_index(condition_type: &str) -> Option<usize> {
    condition_type
        .rsplit_once('-')
        .and_then(|(_, index_str)| index_str.parse().ok())
}

#[cfg(test)]
#[path = "status_reasons_tests.rs"]
mod status_reasons_tests;
