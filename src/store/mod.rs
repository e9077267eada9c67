// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Object store abstraction used by every reconciler.
//!
//! Reconcilers never talk to a process-wide client. They receive a [`Store`]
//! per object kind through the [`Context`](crate::context::Context), which
//! makes the read-modify-write logic testable without a live cluster.
//!
//! Every write is optimistic: the `metadata.resourceVersion` of the object
//! handed to [`Store::replace`] / [`Store::replace_status`] is the version
//! token, and a stale token yields [`StoreError::Conflict`]. Callers resolve
//! conflicts by re-reading and recomputing, see
//! [`retry_on_conflict`](crate::reconcilers::retry::retry_on_conflict).
//!
//! # Implementations
//!
//! - [`KubeStore`] - backed by the Kubernetes API server
//! - [`MemoryStore`] - in-process map with the same version-token semantics

use crate::errors::StoreError;
use async_trait::async_trait;
use kube::Resource;
use std::collections::BTreeMap;

pub mod kubernetes;
pub mod memory;

pub use kubernetes::KubeStore;
pub use memory::MemoryStore;

/// Namespaced object store with optimistic concurrency.
#[async_trait]
pub trait Store<K>: Send + Sync
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
{
    /// Fetch an object, returning `None` when it does not exist.
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, StoreError>;

    /// List objects in `namespace` carrying every label in `labels`.
    ///
    /// Results are ordered by name.
    async fn list(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<K>, StoreError>;

    /// Create a new object. Fails with [`StoreError::AlreadyExists`] if the name is taken.
    async fn create(&self, namespace: &str, object: &K) -> Result<K, StoreError>;

    /// Replace an object's metadata and spec.
    ///
    /// The object's `resourceVersion` must match the stored one.
    async fn replace(&self, namespace: &str, object: &K) -> Result<K, StoreError>;

    /// Replace an object's whole status subresource, guarded by `resourceVersion`.
    ///
    /// Fields absent from the new status are cleared, never kept from the old one.
    async fn replace_status(&self, namespace: &str, object: &K) -> Result<K, StoreError>;

    /// Delete an object. Deleting a missing object succeeds.
    async fn delete(&self, namespace: &str, name: &str) -> Result<(), StoreError>;
}

/// Whether `labels` contains every key/value pair of `selector`.
///
/// An empty selector matches everything.
#[must_use]
pub fn labels_match(
    selector: &BTreeMap<String, String>,
    labels: Option<&BTreeMap<String, String>>,
) -> bool {
    selector.iter().all(|(key, value)| {
        labels
            .and_then(|labels| labels.get(key))
            .is_some_and(|actual| actual == value)
    })
}

/// Render a label map as a Kubernetes label selector string (`k1=v1,k2=v2`).
#[must_use]
pub fn selector_string(selector: &BTreeMap<String, String>) -> String {
    selector
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(",")
}
