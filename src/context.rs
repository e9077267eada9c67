// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for the `OVNDBCluster` controller.
//!
//! Every reconcile pass receives an `Arc<Context>` holding:
//! - one object [`Store`] per kind the reconciler reads or writes
//! - the [`ReconcileSettings`] tuning retries and requeue intervals
//!
//! Production wiring uses [`Context::from_client`]; tests build a context over
//! in-memory stores with [`Context::in_memory`] and keep typed handles to seed
//! pods or inspect written records.

use crate::constants::{
    DEFAULT_MAX_CONFLICT_RETRIES, ERROR_REQUEUE_DURATION_SECS, NOT_READY_REQUEUE_DURATION_SECS,
    READY_REQUEUE_DURATION_SECS,
};
use crate::crd::{DNSData, OVNDBCluster};
use crate::store::{KubeStore, MemoryStore, Store};
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{Pod, Service};
use kube::Client;
use std::sync::Arc;
use std::time::Duration;

/// Tunables of a reconcile pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconcileSettings {
    /// Upper bound on read-compute-write cycles per object when writes conflict.
    pub max_conflict_retries: u32,

    /// Requeue interval once the cluster is fully ready.
    pub ready_requeue: Duration,

    /// Requeue interval while pods, service or attachments are still pending.
    pub not_ready_requeue: Duration,

    /// Requeue interval after a failed pass.
    pub error_requeue: Duration,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
            ready_requeue: Duration::from_secs(READY_REQUEUE_DURATION_SECS),
            not_ready_requeue: Duration::from_secs(NOT_READY_REQUEUE_DURATION_SECS),
            error_requeue: Duration::from_secs(ERROR_REQUEUE_DURATION_SECS),
        }
    }
}

/// Object stores for every kind the reconciler touches.
#[derive(Clone)]
pub struct Stores {
    pub clusters: Arc<dyn Store<OVNDBCluster>>,
    pub dns_data: Arc<dyn Store<DNSData>>,
    pub pods: Arc<dyn Store<Pod>>,
    pub services: Arc<dyn Store<Service>>,
    pub statefulsets: Arc<dyn Store<StatefulSet>>,
}

/// Shared context passed to the controller.
#[derive(Clone)]
pub struct Context {
    pub stores: Stores,
    pub settings: ReconcileSettings,
}

impl Context {
    /// Context backed by the Kubernetes API.
    #[must_use]
    pub fn from_client(client: Client, settings: ReconcileSettings) -> Self {
        let store = Arc::new(KubeStore::new(client));
        Self {
            stores: Stores {
                clusters: store.clone(),
                dns_data: store.clone(),
                pods: store.clone(),
                services: store.clone(),
                statefulsets: store,
            },
            settings,
        }
    }

    /// Context backed by fresh in-memory stores.
    ///
    /// Returns the typed stores alongside so callers can seed platform objects
    /// and inspect what the reconciler wrote.
    #[must_use]
    pub fn in_memory(settings: ReconcileSettings) -> (Self, MemoryStores) {
        let memory = MemoryStores::default();
        let context = Self {
            stores: memory.stores(),
            settings,
        };
        (context, memory)
    }
}

/// Typed handles on the in-memory stores of a [`Context::in_memory`] context.
#[derive(Clone, Default)]
pub struct MemoryStores {
    pub clusters: Arc<MemoryStore<OVNDBCluster>>,
    pub dns_data: Arc<MemoryStore<DNSData>>,
    pub pods: Arc<MemoryStore<Pod>>,
    pub services: Arc<MemoryStore<Service>>,
    pub statefulsets: Arc<MemoryStore<StatefulSet>>,
}

impl MemoryStores {
    /// Type-erased view usable in a [`Context`].
    #[must_use]
    pub fn stores(&self) -> Stores {
        Stores {
            clusters: self.clusters.clone(),
            dns_data: self.dns_data.clone(),
            pods: self.pods.clone(),
            services: self.services.clone(),
            statefulsets: self.statefulsets.clone(),
        }
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
