// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common label and annotation constants used across reconcilers.
//!
//! The `service` label is shared by the statefulset pods, the headless service
//! selector and the generated `DNSData` records, so any of them can be listed
//! by role with a single selector.

use std::collections::BTreeMap;

// ============================================================================
// Kubernetes Standard Labels
// https://kubernetes.io/docs/concepts/overview/working-with-objects/common-labels/
// ============================================================================

/// Standard label for the component name within the architecture
pub const K8S_COMPONENT: &str = "app.kubernetes.io/component";

/// Standard label for the tool being used to manage the operation of an application
pub const K8S_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Standard label for a unique name identifying the instance of an application
pub const K8S_INSTANCE: &str = "app.kubernetes.io/instance";

/// Standard label for the name of a higher-level application this one is part of
pub const K8S_PART_OF: &str = "app.kubernetes.io/part-of";

// ============================================================================
// Label Values
// ============================================================================

/// Value for `app.kubernetes.io/part-of`
pub const PART_OF_OVN: &str = "ovn";

/// Value for `app.kubernetes.io/managed-by`
pub const MANAGED_BY_OVNDBCLUSTER: &str = "OVNDBCluster";

// ============================================================================
// OVN-Specific Labels
// ============================================================================

/// Label selecting all objects belonging to one database role (e.g. `ovsdbserver-nb`)
pub const SERVICE_LABEL: &str = "service";

/// Label naming the `OVNDBCluster` an object belongs to
pub const OVNDBCLUSTER_LABEL: &str = "ovn.openstack.org/ovndbcluster";

/// Build the label set shared by every object created for one cluster role.
#[must_use]
pub fn service_labels(service_name: &str, cluster_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (SERVICE_LABEL.to_string(), service_name.to_string()),
        (OVNDBCLUSTER_LABEL.to_string(), cluster_name.to_string()),
        (K8S_INSTANCE.to_string(), cluster_name.to_string()),
        (K8S_COMPONENT.to_string(), service_name.to_string()),
        (K8S_PART_OF.to_string(), PART_OF_OVN.to_string()),
        (
            K8S_MANAGED_BY.to_string(),
            MANAGED_BY_OVNDBCLUSTER.to_string(),
        ),
    ])
}

/// Selector used to find the pods (and records) of one database role.
#[must_use]
pub fn role_selector(service_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(SERVICE_LABEL.to_string(), service_name.to_string())])
}
