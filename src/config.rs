// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Command-line and environment configuration of the operator.
//!
//! Every flag can also be set through the environment variable named next to
//! it, which is how the operator is usually configured in its Deployment.

use crate::constants::{
    DEFAULT_MAX_CONFLICT_RETRIES, DEFAULT_METRICS_ADDR, DEFAULT_RECONCILE_CONCURRENCY,
    ERROR_REQUEUE_DURATION_SECS, NOT_READY_REQUEUE_DURATION_SECS, READY_REQUEUE_DURATION_SECS,
};
use crate::context::ReconcileSettings;
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

/// OVN database cluster operator
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct OperatorConfig {
    /// Only watch `OVNDBCluster` resources in this namespace (all namespaces when unset)
    #[arg(long, env = "WATCH_NAMESPACE")]
    pub watch_namespace: Option<String>,

    /// Bind address of the metrics and health endpoints
    #[arg(long, env = "METRICS_ADDR", default_value = DEFAULT_METRICS_ADDR)]
    pub metrics_addr: SocketAddr,

    /// Number of clusters reconciled concurrently
    #[arg(long, env = "RECONCILE_CONCURRENCY", default_value_t = DEFAULT_RECONCILE_CONCURRENCY)]
    pub concurrency: u16,

    /// Read-modify-write attempts per object when writes conflict
    #[arg(long, env = "MAX_CONFLICT_RETRIES", default_value_t = DEFAULT_MAX_CONFLICT_RETRIES)]
    pub max_conflict_retries: u32,

    /// Requeue interval in seconds once a cluster is ready
    #[arg(long, env = "READY_REQUEUE_SECS", default_value_t = READY_REQUEUE_DURATION_SECS)]
    pub ready_requeue_secs: u64,

    /// Requeue interval in seconds while a cluster is not ready
    #[arg(long, env = "NOT_READY_REQUEUE_SECS", default_value_t = NOT_READY_REQUEUE_DURATION_SECS)]
    pub not_ready_requeue_secs: u64,

    /// Requeue interval in seconds after a failed reconcile
    #[arg(long, env = "ERROR_REQUEUE_SECS", default_value_t = ERROR_REQUEUE_DURATION_SECS)]
    pub error_requeue_secs: u64,
}

impl OperatorConfig {
    /// Reconcile tunables derived from the flags.
    #[must_use]
    pub fn settings(&self) -> ReconcileSettings {
        ReconcileSettings {
            max_conflict_retries: self.max_conflict_retries.max(1),
            ready_requeue: Duration::from_secs(self.ready_requeue_secs),
            not_ready_requeue: Duration::from_secs(self.not_ready_requeue_secs),
            error_requeue: Duration::from_secs(self.error_requeue_secs),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
