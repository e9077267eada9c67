// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the OVN database operator.
//!
//! - [`StoreError`] - failures reported by an object [`Store`](crate::store::Store)
//! - [`TopologyError`] - failures of the reconcile subsystem, wrapping store
//!   errors with the name of the object being written
//!
//! "Not ready" situations (pods without IPs, missing service, pending network
//! attachment) are deliberately absent: they are reported through status
//! conditions and empty endpoints, never as errors.

use thiserror::Error;

/// Errors returned by an object store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The object does not exist
    #[error("{kind} '{namespace}/{name}' not found")]
    NotFound {
        kind: String,
        namespace: String,
        name: String,
    },

    /// A create raced with another writer that created the same name first
    #[error("{kind} '{namespace}/{name}' already exists")]
    AlreadyExists {
        kind: String,
        namespace: String,
        name: String,
    },

    /// The write carried a stale resource version
    ///
    /// Resolved by re-reading the object and recomputing the write.
    #[error("write conflict on {kind} '{namespace}/{name}': {message}")]
    Conflict {
        kind: String,
        namespace: String,
        name: String,
        message: String,
    },

    /// The object handed to the store is unusable (e.g. it has no name)
    #[error("invalid {kind} object: {reason}")]
    InvalidObject { kind: String, reason: String },

    /// Any other failure of the Kubernetes API
    #[error("{kind} '{name}' request to the Kubernetes API failed: {source}")]
    Api {
        kind: String,
        name: String,
        #[source]
        source: kube::Error,
    },
}

impl StoreError {
    /// Whether this error is an optimistic concurrency collision.
    ///
    /// A create that lost to a concurrent create counts as a conflict too: the
    /// next read will see the winner's object and patch it instead.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::AlreadyExists { .. })
    }

    /// Whether this error reports a missing object.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Errors surfaced by the topology reconcile subsystem.
#[derive(Error, Debug)]
pub enum TopologyError {
    /// The `OVNDBCluster` spec violates an invariant.
    ///
    /// Retrying does not help until the cluster spec is corrected.
    #[error("invalid OVNDBCluster '{namespace}/{name}': {reason}")]
    Validation {
        namespace: String,
        name: String,
        reason: String,
    },

    /// Creating or patching a `DNSData` record failed
    #[error("Error creating DNSData {name}: {source}")]
    DnsData {
        name: String,
        #[source]
        source: StoreError,
    },

    /// Any other store operation failed
    #[error("failed to {operation} {kind} '{name}': {source}")]
    Store {
        operation: &'static str,
        kind: &'static str,
        name: String,
        #[source]
        source: StoreError,
    },
}

impl TopologyError {
    /// Wrap a store failure with the operation and object it concerned.
    pub fn store(
        operation: &'static str,
        kind: &'static str,
        name: impl Into<String>,
    ) -> impl FnOnce(StoreError) -> Self {
        let name = name.into();
        move |source| Self::Store {
            operation,
            kind,
            name,
            source,
        }
    }

    /// Whether the error is a spec validation failure.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
