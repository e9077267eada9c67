// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # ovndb-operator - OVN Database Cluster Operator for Kubernetes
//!
//! Manages replicated OVSDB clusters (OVN northbound or southbound) through the
//! `OVNDBCluster` Custom Resource and publishes how clients reach them.
//!
//! ## Overview
//!
//! For every `OVNDBCluster` the operator:
//!
//! - runs a headless Service and a StatefulSet with one RAFT member per replica
//! - keeps one `DNSData` record per pod, mapping the pod's IP to the service hostname
//! - resolves the connection endpoint clients use, either through the headless
//!   service (`tcp:ovsdbserver-nb.openstack.svc:6641`) or through the pods' IPs
//!   on a secondary network attachment (`tcp:172.17.0.9:6641,...`)
//! - reports readiness through status conditions
//!
//! ## Modules
//!
//! - [`crd`] - Custom Resource Definition types
//! - [`reconcilers`] - Reconciliation logic
//! - [`address`] - Connection string formatting
//! - [`network`] - Pod network-status annotation parsing
//! - [`store`] - Object store abstraction (Kubernetes and in-memory)
//! - [`context`] - Shared controller context
//! - [`config`] - Command-line / environment configuration
//! - [`metrics`] / [`health`] - Prometheus metrics and the HTTP endpoints serving them
//!
//! ## Example
//!
//! ```rust
//! use ovndb_operator::address::format_ip_endpoint;
//!
//! assert_eq!(format_ip_endpoint("172.17.0.9", 6641), "tcp:172.17.0.9:6641");
//! ```

pub mod address;
pub mod config;
pub mod constants;
pub mod context;
pub mod crd;
pub mod errors;
pub mod health;
pub mod labels;
pub mod metrics;
pub mod network;
pub mod reconcilers;
pub mod status_reasons;
pub mod store;
