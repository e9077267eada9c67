// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status condition helpers and the `OVNDBCluster` status writer.
//!
//! Conditions follow the Kubernetes conventions: `type`, `status`
//! (`True`/`False`/`Unknown`), a `CamelCase` `reason`, a human-readable
//! `message`, and the RFC3339 `lastTransitionTime` of the last status flip.
//!
//! A reconcile pass collects every status change in an
//! [`OVNDBClusterStatusUpdater`] and writes once at the end. The write is
//! skipped when nothing changed semantically, which keeps the controller from
//! re-triggering itself on its own status updates.
//!
//! # Example
//!
//! ```rust,no_run
//! use ovndb_operator::reconcilers::status::create_condition;
//!
//! let condition = create_condition("Ready", "True", "AllReady", "3/3 replicas ready");
//! assert_eq!(condition.r#type, "Ready");
//! ```

use crate::crd::{Condition, OVNDBCluster, OVNDBClusterStatus};
use crate::errors::StoreError;
use crate::reconcilers::retry::retry_on_conflict;
use crate::store::Store;
use chrono::Utc;
use kube::ResourceExt;
use std::collections::BTreeMap;
use tracing::debug;

/// Create a condition stamped with the current time.
#[must_use]
pub fn create_condition(
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) -> Condition {
    Condition {
        r#type: condition_type.to_string(),
        status: status.to_string(),
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        last_transition_time: Some(Utc::now().to_rfc3339()),
    }
}

/// Find a condition by type.
#[must_use]
pub fn find_condition<'a>(
    conditions: &'a [Condition],
    condition_type: &str,
) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == condition_type)
}

/// Update or add a condition in place (no API call).
///
/// `lastTransitionTime` is kept when the status value does not change, and
/// reset to now when it does.
pub fn update_condition_in_memory(
    conditions: &mut Vec<Condition>,
    condition_type: &str,
    status: &str,
    reason: &str,
    message: &str,
) {
    if let Some(existing) = conditions.iter_mut().find(|c| c.r#type == condition_type) {
        let last_transition_time = if existing.status == status {
            existing
                .last_transition_time
                .clone()
                .unwrap_or_else(|| Utc::now().to_rfc3339())
        } else {
            Utc::now().to_rfc3339()
        };

        existing.status = status.to_string();
        existing.reason = Some(reason.to_string());
        existing.message = Some(message.to_string());
        existing.last_transition_time = Some(last_transition_time);
    } else {
        conditions.push(create_condition(condition_type, status, reason, message));
    }
}

/// Whether two condition lists carry the same type/status/reason/message set.
///
/// `lastTransitionTime` is ignored.
#[must_use]
pub fn conditions_equal(current: &[Condition], new: &[Condition]) -> bool {
    if current.len() != new.len() {
        return false;
    }

    new.iter().all(|new_cond| {
        find_condition(current, &new_cond.r#type).is_some_and(|curr_cond| {
            curr_cond.status == new_cond.status
                && curr_cond.reason == new_cond.reason
                && curr_cond.message == new_cond.message
        })
    })
}

/// Whether two statuses are equal, ignoring condition timestamps.
#[must_use]
pub fn status_equal(current: &OVNDBClusterStatus, new: &OVNDBClusterStatus) -> bool {
    current.internal_endpoint == new.internal_endpoint
        && current.external_endpoint == new.external_endpoint
        && current.ready_count == new.ready_count
        && current.network_attachments == new.network_attachments
        && current.observed_generation == new.observed_generation
        && conditions_equal(&current.conditions, &new.conditions)
}

/// Collects status changes for one `OVNDBCluster` and writes them once.
pub struct OVNDBClusterStatusUpdater {
    namespace: String,
    name: String,
    current_status: Option<OVNDBClusterStatus>,
    new_status: OVNDBClusterStatus,
}

impl OVNDBClusterStatusUpdater {
    /// Start from the cluster's current status (or an empty one).
    #[must_use]
    pub fn new(cluster: &OVNDBCluster) -> Self {
        let current_status = cluster.status.clone();
        let new_status = current_status.clone().unwrap_or_default();

        Self {
            namespace: cluster.namespace().unwrap_or_default(),
            name: cluster.name_any(),
            current_status,
            new_status,
        }
    }

    /// Update or add a condition (in-memory only).
    pub fn set_condition(
        &mut self,
        condition_type: &str,
        status: &str,
        reason: &str,
        message: &str,
    ) {
        update_condition_in_memory(
            &mut self.new_status.conditions,
            condition_type,
            status,
            reason,
            message,
        );
    }

    /// Drop every condition for which `keep` returns false.
    pub fn retain_conditions(&mut self, keep: impl Fn(&Condition) -> bool) {
        self.new_status.conditions.retain(|c| keep(c));
    }

    /// Set both endpoints. Callers pass at most one non-empty value.
    pub fn set_endpoints(&mut self, internal: &str, external: &str) {
        internal.clone_into(&mut self.new_status.internal_endpoint);
        external.clone_into(&mut self.new_status.external_endpoint);
    }

    pub fn set_ready_count(&mut self, ready_count: i32) {
        self.new_status.ready_count = ready_count;
    }

    pub fn set_network_attachments(&mut self, attachments: BTreeMap<String, Vec<String>>) {
        self.new_status.network_attachments = attachments;
    }

    pub fn set_observed_generation(&mut self, generation: Option<i64>) {
        self.new_status.observed_generation = generation;
    }

    /// The status as it would be written.
    #[must_use]
    pub fn status(&self) -> &OVNDBClusterStatus {
        &self.new_status
    }

    /// Whether the collected status differs semantically from the current one.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        match &self.current_status {
            None => true,
            Some(current) => !status_equal(current, &self.new_status),
        }
    }

    /// Write the collected status, unless it is unchanged.
    ///
    /// On a conflict the cluster is re-read and the status compared and
    /// written again against the fresh copy. A cluster deleted in the
    /// meantime is not an error.
    ///
    /// Returns whether a write happened.
    ///
    /// # Errors
    ///
    /// Returns the store error when the write fails or conflicts persist.
    pub async fn apply(
        &self,
        store: &dyn Store<OVNDBCluster>,
        max_attempts: u32,
    ) -> Result<bool, StoreError> {
        if !self.has_changes() {
            debug!(
                "OVNDBCluster {}/{} status unchanged, skipping update",
                self.namespace, self.name
            );
            return Ok(false);
        }

        let (namespace, name, new_status) = (&self.namespace, &self.name, &self.new_status);
        let written = retry_on_conflict(
            max_attempts,
            &format!("update-status {namespace}/{name}"),
            || async move {
                let Some(mut fresh) = store.get(namespace, name).await? else {
                    return Ok(false);
                };
                if fresh
                    .status
                    .as_ref()
                    .is_some_and(|current| status_equal(current, new_status))
                {
                    return Ok(false);
                }
                fresh.status = Some(new_status.clone());
                store.replace_status(namespace, &fresh).await?;
                Ok(true)
            },
        )
        .await?;

        if written {
            debug!(
                "Updated OVNDBCluster {}/{} status: {} condition(s), internal='{}', external='{}'",
                self.namespace,
                self.name,
                self.new_status.conditions.len(),
                self.new_status.internal_endpoint,
                self.new_status.external_endpoint
            );
        }
        Ok(written)
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
