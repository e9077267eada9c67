// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Secondary network attachment helpers.
//!
//! The CNI meta-plugin reports the networks a pod is attached to in the
//! `k8s.v1.cni.cncf.io/network-status` annotation, a JSON array such as:
//!
//! ```json
//! [{"name": "ovn-kubernetes", "ips": ["10.128.0.12"], "default": true},
//!  {"name": "openstack/internalapi", "interface": "net1", "ips": ["172.17.0.9"]}]
//! ```
//!
//! Attachment names may be reported bare (`internalapi`) or qualified with the
//! namespace of the attachment definition (`openstack/internalapi`); both match.

use crate::constants::{NETWORKS_ANNOTATION, NETWORK_STATUS_ANNOTATION};
use k8s_openapi::api::core::v1::Pod;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// One entry of the network-status annotation.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStatus {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,

    #[serde(default)]
    pub ips: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,

    #[serde(default)]
    pub default: bool,
}

/// Entry of the `k8s.v1.cni.cncf.io/networks` request annotation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
struct NetworkSelection {
    name: String,
    namespace: String,
}

/// Decode the network-status annotation of a pod.
///
/// A pod without the annotation has no reported networks yet and yields an
/// empty list.
///
/// # Errors
///
/// Returns an error if the annotation is present but is not valid JSON.
pub fn network_status(pod: &Pod) -> Result<Vec<NetworkStatus>, serde_json::Error> {
    match pod
        .metadata
        .annotations
        .as_ref()
        .and_then(|annotations| annotations.get(NETWORK_STATUS_ANNOTATION))
    {
        Some(raw) if !raw.trim().is_empty() => serde_json::from_str(raw),
        _ => Ok(Vec::new()),
    }
}

/// Whether a reported network name refers to `attachment` in `namespace`.
#[must_use]
pub fn attachment_matches(reported: &str, namespace: &str, attachment: &str) -> bool {
    reported == attachment
        || reported
            .split_once('/')
            .is_some_and(|(ns, name)| ns == namespace && name == attachment)
}

/// IPs of `pod` on the network attachment `attachment`.
///
/// Returns an empty list when the pod has not been attached yet. A malformed
/// annotation is logged and treated the same way, since the CNI plugin rewrites
/// it once attachment completes.
#[must_use]
pub fn attachment_ips(pod: &Pod, namespace: &str, attachment: &str) -> Vec<String> {
    match network_status(pod) {
        Ok(networks) => networks
            .into_iter()
            .filter(|network| attachment_matches(&network.name, namespace, attachment))
            .flat_map(|network| network.ips)
            .filter(|ip| !ip.is_empty())
            .collect(),
        Err(e) => {
            warn!(
                pod = pod.metadata.name.as_deref().unwrap_or("unknown"),
                error = %e,
                "Ignoring malformed {} annotation", NETWORK_STATUS_ANNOTATION
            );
            Vec::new()
        }
    }
}

/// Pod template annotations requesting `attachment` from the CNI meta-plugin.
///
/// Returns an empty map when no attachment is configured.
#[must_use]
pub fn networks_annotation(namespace: &str, attachment: Option<&str>) -> BTreeMap<String, String> {
    let Some(attachment) = attachment else {
        return BTreeMap::new();
    };
    let selection = [NetworkSelection {
        name: attachment.to_string(),
        namespace: namespace.to_string(),
    }];
    // Serializing two plain strings cannot fail.
    let value = serde_json::to_string(&selection).unwrap_or_default();
    BTreeMap::from([(NETWORKS_ANNOTATION.to_string(), value)])
}

/// Validate the single network attachment reference of a cluster.
///
/// The field holds at most one attachment name. A list (comma or whitespace
/// separated, as the CNI networks annotation would accept) or an empty name is
/// rejected.
///
/// # Errors
///
/// Returns a human-readable reason when the value is invalid.
pub fn validate_network_attachment(attachment: Option<&str>) -> Result<(), String> {
    let Some(attachment) = attachment else {
        return Ok(());
    };

    if attachment.trim().is_empty() {
        return Err("networkAttachment must not be empty".to_string());
    }

    let names: Vec<&str> = attachment
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|name| !name.is_empty())
        .collect();
    if names.len() > 1 {
        return Err(format!(
            "only one network attachment is supported, got {}: {}",
            names.len(),
            names.join(", ")
        ));
    }
    if attachment != attachment.trim() {
        return Err(format!(
            "networkAttachment '{attachment}' must not contain surrounding whitespace"
        ));
    }

    Ok(())
}

#[cfg(test)]
#[path = "network_tests.rs"]
mod network_tests;
