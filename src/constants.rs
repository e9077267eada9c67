// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the OVN database operator.
//!
//! Naming constants in this module are part of the compatibility contract with
//! the rest of the OVN control plane and must not change.

// ============================================================================
// API Constants
// ============================================================================

/// API group for the `OVNDBCluster` CRD
pub const API_GROUP: &str = "ovn.openstack.org";

/// Kind name for `OVNDBCluster` resource
pub const KIND_OVNDBCLUSTER: &str = "OVNDBCluster";

/// Kind name for the consumed `DNSData` resource
pub const KIND_DNS_DATA: &str = "DNSData";

/// Finalizer placed on `OVNDBCluster` resources so owned DNS records are removed first
pub const OVNDBCLUSTER_FINALIZER: &str = "ovndbcluster.ovn.openstack.org/finalizer";

/// Field manager used for writes issued by this operator
pub const FIELD_MANAGER: &str = "ovndb-operator";

// ============================================================================
// Naming Constants
// ============================================================================

/// Prefix of the headless service / statefulset name (`ovsdbserver-nb`, `ovsdbserver-sb`)
pub const SERVICE_NAME_PREFIX: &str = "ovsdbserver";

/// Suffix appended to `<service>.<namespace>` to form the headless hostname
pub const HEADLESS_DNS_SUFFIX: &str = "svc";

/// Transport prefix of OVSDB connection URIs
pub const OVSDB_TRANSPORT: &str = "tcp";

/// Fixed `dnsDataLabelSelectorValue` written into every `DNSData` record
pub const DNS_DATA_LABEL_SELECTOR_VALUE: &str = "dnsdata";

// ============================================================================
// OVSDB Port Constants
// ============================================================================

/// Northbound database client port
pub const NB_DB_PORT: i32 = 6641;

/// Southbound database client port
pub const SB_DB_PORT: i32 = 6642;

/// Northbound RAFT peer port
pub const NB_RAFT_PORT: i32 = 6643;

/// Southbound RAFT peer port
pub const SB_RAFT_PORT: i32 = 6644;

/// Name of the client port in the headless service
pub const DB_PORT_NAME: &str = "db";

/// Name of the RAFT port in the headless service
pub const RAFT_PORT_NAME: &str = "raft";

// ============================================================================
// Workload Defaults
// ============================================================================

/// Default replica count when `spec.replicas` is omitted
pub const DEFAULT_REPLICAS: i32 = 1;

/// Default storage request for the database volume
pub const DEFAULT_STORAGE_REQUEST: &str = "10G";

/// Mount path of the database volume inside the container
pub const DB_DATA_MOUNT_PATH: &str = "/etc/ovn";

/// Name of the volume claim template holding the database files
pub const DB_DATA_VOLUME_NAME: &str = "ovndbcluster-data";

/// Name of the OVSDB server container
pub const DB_CONTAINER_NAME: &str = "ovsdbserver";

/// Default ovsdb-server log level
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Annotation carrying the SHA-256 of the spec the operator last wrote
pub const SPEC_HASH_ANNOTATION: &str = "ovn.openstack.org/spec-hash";

// ============================================================================
// Network Attachment Constants
// ============================================================================

/// Pod annotation written by the CNI meta-plugin describing attached networks
pub const NETWORK_STATUS_ANNOTATION: &str = "k8s.v1.cni.cncf.io/network-status";

/// Pod template annotation requesting secondary network attachments
pub const NETWORKS_ANNOTATION: &str = "k8s.v1.cni.cncf.io/networks";

// ============================================================================
// Controller Constants
// ============================================================================

/// Requeue duration for controller errors (30 seconds)
pub const ERROR_REQUEUE_DURATION_SECS: u64 = 30;

/// Requeue duration while a cluster is not ready (30 seconds)
pub const NOT_READY_REQUEUE_DURATION_SECS: u64 = 30;

/// Requeue duration once a cluster is ready (5 minutes)
pub const READY_REQUEUE_DURATION_SECS: u64 = 300;

/// Maximum read-modify-write attempts when a write loses an optimistic concurrency race
pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 5;

/// Default number of clusters reconciled concurrently
pub const DEFAULT_RECONCILE_CONCURRENCY: u16 = 4;

/// Default bind address of the metrics / health HTTP server
pub const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:8080";

/// Page size for Kubernetes list operations
pub const KUBE_LIST_PAGE_SIZE: u32 = 100;
