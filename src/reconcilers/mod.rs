// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes reconciliation logic for `OVNDBCluster` resources.
//!
//! # Reconciliation Architecture
//!
//! The operator follows the standard Kubernetes controller pattern:
//!
//! 1. **Watch** - `OVNDBCluster` changes and changes to the owned Service,
//!    StatefulSet and `DNSData` objects
//! 2. **Observe** - Read the cluster's service, statefulset and pods
//! 3. **Plan** - Derive endpoints, DNS records and conditions ([`ovndbcluster::plan_reconcile`])
//! 4. **Apply** - Conditional writes through a [`Store`](crate::store::Store),
//!    then a single status update
//!
//! # Modules
//!
//! - [`ovndbcluster`] - Cluster reconciler and deletion handling
//! - [`endpoints`] - Internal / external endpoint resolution
//! - [`dnsdata`] - Per-pod `DNSData` synchronization and garbage collection
//! - [`resources`] - Headless Service and StatefulSet builders
//! - [`status`] - Condition helpers and the batched status writer
//! - [`finalizers`] - Finalizer add / remove
//! - [`retry`] - Bounded retry of read-modify-write cycles on conflict
//!
//! # Example: Using the Reconciler
//!
//! ```rust,no_run
//! use ovndb_operator::context::{Context, ReconcileSettings};
//! use ovndb_operator::crd::OVNDBCluster;
//! use ovndb_operator::reconcilers::reconcile_ovndbcluster;
//! use std::sync::Arc;
//!
//! async fn reconcile(client: kube::Client, cluster: OVNDBCluster) -> anyhow::Result<()> {
//!     let ctx = Arc::new(Context::from_client(client, ReconcileSettings::default()));
//!     reconcile_ovndbcluster(ctx, Arc::new(cluster)).await?;
//!     Ok(())
//! }
//! ```

pub mod dnsdata;
pub mod endpoints;
pub mod finalizers;
pub mod ovndbcluster;
pub mod resources;
pub mod retry;
pub mod status;

#[cfg(test)]
mod fixtures;

pub use ovndbcluster::{delete_ovndbcluster, reconcile_ovndbcluster, ReconcileOutcome};
