// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) used by the OVN database operator.
//!
//! # Resource Types
//!
//! - [`OVNDBCluster`] - One replicated OVSDB deployment (northbound or southbound)
//! - [`DNSData`] - Consumed record type telling the cluster DNS resolver which
//!   hostnames a pod IP answers for. The schema is owned by the network operator;
//!   only the fields this operator writes are modelled here.
//!
//! # Example: Creating a northbound cluster
//!
//! ```rust
//! use ovndb_operator::crd::{DbType, OVNDBClusterSpec};
//!
//! let spec = OVNDBClusterSpec {
//!     db_type: DbType::NB,
//!     replicas: 3,
//!     network_attachment: Some("internalapi".to_string()),
//!     container_image: "quay.io/podified/openstack-ovn-nb-db-server:current".to_string(),
//!     storage_request: "10G".to_string(),
//!     storage_class: None,
//!     log_level: None,
//! };
//! assert_eq!(spec.db_type.service_name(), "ovsdbserver-nb");
//! ```

use crate::constants::{
    DEFAULT_REPLICAS, DEFAULT_STORAGE_REQUEST, NB_DB_PORT, NB_RAFT_PORT, SB_DB_PORT,
    SB_RAFT_PORT, SERVICE_NAME_PREFIX,
};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Condition represents an observation of a resource's current state.
///
/// Conditions are used in status subresources to communicate the state of
/// a resource to users and controllers.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition. Common types include: Ready, InputReady, DeploymentReady.
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief CamelCase reason for the condition's last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// Database role served by an `OVNDBCluster`.
///
/// The two roles are mutually exclusive: a cluster serves either the
/// northbound or the southbound database, never both.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
pub enum DbType {
    /// Northbound database
    NB,
    /// Southbound database
    SB,
}

impl DbType {
    /// Name of the headless service and statefulset for this role.
    #[must_use]
    pub fn service_name(self) -> String {
        format!("{SERVICE_NAME_PREFIX}-{}", self.suffix())
    }

    /// Short lowercase suffix (`nb` / `sb`).
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            Self::NB => "nb",
            Self::SB => "sb",
        }
    }

    /// OVSDB client port for this role.
    #[must_use]
    pub fn db_port(self) -> i32 {
        match self {
            Self::NB => NB_DB_PORT,
            Self::SB => SB_DB_PORT,
        }
    }

    /// RAFT peer port for this role.
    #[must_use]
    pub fn raft_port(self) -> i32 {
        match self {
            Self::NB => NB_RAFT_PORT,
            Self::SB => SB_RAFT_PORT,
        }
    }
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NB => f.write_str("NB"),
            Self::SB => f.write_str("SB"),
        }
    }
}

fn default_replicas() -> i32 {
    DEFAULT_REPLICAS
}

fn default_storage_request() -> String {
    DEFAULT_STORAGE_REQUEST.to_string()
}

/// `OVNDBCluster` deploys one replicated OVSDB database and publishes how to reach it.
///
/// # Example
///
/// ```yaml
/// apiVersion: ovn.openstack.org/v1beta1
/// kind: OVNDBCluster
/// metadata:
///   name: ovndbcluster-nb
///   namespace: openstack
/// spec:
///   dbType: NB
///   replicas: 3
///   networkAttachment: internalapi
///   containerImage: quay.io/podified/openstack-ovn-nb-db-server:current
///   storageRequest: 10G
/// ```
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
#[kube(
    group = "ovn.openstack.org",
    version = "v1beta1",
    kind = "OVNDBCluster",
    namespaced,
    shortname = "ovndbc",
    doc = "OVNDBCluster runs a RAFT-replicated OVSDB server (northbound or southbound) and publishes its internal and external connection endpoints.",
    printcolumn = r#"{"name":"Type","type":"string","jsonPath":".spec.dbType"}"#,
    printcolumn = r#"{"name":"Replicas","type":"integer","jsonPath":".spec.replicas"}"#,
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#
)]
#[kube(status = "OVNDBClusterStatus")]
#[serde(rename_all = "camelCase")]
pub struct OVNDBClusterSpec {
    /// Database role served by this cluster.
    pub db_type: DbType,

    /// Desired number of database replicas.
    #[serde(default = "default_replicas")]
    #[schemars(range(min = 0, max = 32))]
    pub replicas: i32,

    /// Name of the single secondary network the database is exposed on.
    ///
    /// When set, the external endpoint is built from each pod's IP on this
    /// network. At most one attachment is allowed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_attachment: Option<String>,

    /// OVSDB server container image.
    pub container_image: String,

    /// Size of the persistent volume holding the database files.
    #[serde(default = "default_storage_request")]
    pub storage_request: String,

    /// Storage class for the database volume. Cluster default when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,

    /// ovsdb-server log level (`info`, `dbg`, `warn`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

/// `OVNDBCluster` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OVNDBClusterStatus {
    /// In-cluster connection string (`tcp:<service>.<namespace>.svc:<port>`), or empty.
    #[serde(default)]
    pub internal_endpoint: String,

    /// Connection string built from network attachment IPs, or empty.
    #[serde(default)]
    pub external_endpoint: String,

    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Number of ready database replicas.
    #[serde(default)]
    pub ready_count: i32,

    /// IPs of the current pods on each configured network attachment.
    #[serde(default)]
    pub network_attachments: BTreeMap<String, Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl OVNDBCluster {
    /// Name of the headless service / statefulset backing this cluster.
    #[must_use]
    pub fn service_name(&self) -> String {
        self.spec.db_type.service_name()
    }

    /// Internal endpoint from status, if one has been published.
    #[must_use]
    pub fn internal_endpoint(&self) -> Option<&str> {
        self.status
            .as_ref()
            .map(|s| s.internal_endpoint.as_str())
            .filter(|e| !e.is_empty())
    }

    /// External endpoint from status, if one has been published.
    #[must_use]
    pub fn external_endpoint(&self) -> Option<&str> {
        self.status
            .as_ref()
            .map(|s| s.external_endpoint.as_str())
            .filter(|e| !e.is_empty())
    }

    /// Whether the encompassing `Ready` condition is `True`.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.status.as_ref().is_some_and(|status| {
            status
                .conditions
                .iter()
                .any(|c| c.r#type == crate::status_reasons::CONDITION_TYPE_READY && c.status == "True")
        })
    }
}

/// One host entry of a `DNSData` record: an IP and the names it answers for.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DNSHost {
    /// IP address the hostnames resolve to.
    pub ip: String,

    /// Hostnames resolving to `ip`.
    #[serde(default)]
    pub hostnames: Vec<String>,
}

/// `DNSData` instructs the cluster dnsmasq service to answer for a set of hosts.
///
/// The operator writes one `DNSData` per database pod, named after the pod.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[kube(
    group = "network.openstack.org",
    version = "v1beta1",
    kind = "DNSData",
    namespaced,
    doc = "DNSData holds host entries (IP to hostnames) served by the cluster DNS resolver."
)]
#[serde(rename_all = "camelCase")]
pub struct DNSDataSpec {
    /// Ordered host entries.
    #[serde(default)]
    pub hosts: Vec<DNSHost>,

    /// Value the DNS resolver's label selector matches to pick up this record.
    #[serde(default)]
    pub dns_data_label_selector_value: String,
}
