// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Finalizer management through a [`Store`].
//!
//! Both operations are idempotent and conflict-safe: on a stale version the
//! object is re-read and the finalizer list recomputed from the fresh copy.
//!
//! # Example
//!
//! ```rust,ignore
//! use ovndb_operator::constants::OVNDBCLUSTER_FINALIZER;
//! use ovndb_operator::reconcilers::finalizers::{ensure_finalizer, remove_finalizer};
//!
//! if cluster.metadata.deletion_timestamp.is_some() {
//!     // cleanup owned objects, then:
//!     remove_finalizer(store, &cluster, OVNDBCLUSTER_FINALIZER, 5).await?;
//! } else {
//!     ensure_finalizer(store, &cluster, OVNDBCLUSTER_FINALIZER, 5).await?;
//! }
//! ```

use crate::errors::StoreError;
use crate::reconcilers::retry::retry_on_conflict;
use crate::store::Store;
use kube::{Resource, ResourceExt};
use tracing::info;

/// Whether `resource` carries `finalizer`.
#[must_use]
pub fn has_finalizer<K: Resource>(resource: &K, finalizer: &str) -> bool {
    resource
        .meta()
        .finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|existing| existing == finalizer))
}

/// Add `finalizer` to a resource if not already present.
///
/// Returns `Ok(None)` if the resource no longer exists, otherwise the stored
/// resource.
///
/// # Errors
///
/// Returns the store error when the write fails or conflicts persist.
pub async fn ensure_finalizer<K>(
    store: &dyn Store<K>,
    resource: &K,
    finalizer: &str,
    max_attempts: u32,
) -> Result<Option<K>, StoreError>
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
{
    if has_finalizer(resource, finalizer) {
        return Ok(Some(resource.clone()));
    }

    let namespace = &resource.namespace().unwrap_or_default();
    let name = &resource.name_any();

    retry_on_conflict(max_attempts, &format!("add-finalizer {name}"), || async move {
        let Some(mut fresh) = store.get(namespace, name).await? else {
            return Ok(None);
        };
        if has_finalizer(&fresh, finalizer) {
            return Ok(Some(fresh));
        }
        fresh
            .meta_mut()
            .finalizers
            .get_or_insert_with(Vec::new)
            .push(finalizer.to_string());
        let stored = store.replace(namespace, &fresh).await?;
        info!(
            "Added finalizer {} to {} {}/{}",
            finalizer,
            K::kind(&()),
            namespace,
            name
        );
        Ok(Some(stored))
    })
    .await
}

/// Remove `finalizer` from a resource if present.
///
/// A resource that is already gone counts as done.
///
/// # Errors
///
/// Returns the store error when the write fails or conflicts persist.
pub async fn remove_finalizer<K>(
    store: &dyn Store<K>,
    resource: &K,
    finalizer: &str,
    max_attempts: u32,
) -> Result<(), StoreError>
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
{
    if !has_finalizer(resource, finalizer) {
        return Ok(());
    }

    let namespace = &resource.namespace().unwrap_or_default();
    let name = &resource.name_any();

    retry_on_conflict(max_attempts, &format!("remove-finalizer {name}"), || async move {
        let Some(mut fresh) = store.get(namespace, name).await? else {
            return Ok(());
        };
        if !has_finalizer(&fresh, finalizer) {
            return Ok(());
        }
        if let Some(finalizers) = fresh.meta_mut().finalizers.as_mut() {
            finalizers.retain(|f| f != finalizer);
        }
        store.replace(namespace, &fresh).await?;
        info!(
            "Removed finalizer {} from {} {}/{}",
            finalizer,
            K::kind(&()),
            namespace,
            name
        );
        Ok(())
    })
    .await
}

#[cfg(test)]
#[path = "finalizers_tests.rs"]
mod finalizers_tests;
