// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Endpoint resolution for `OVNDBCluster` resources.
//!
//! A cluster is reachable in exactly one of two ways:
//!
//! - **Internal** (no network attachment): clients use the headless service
//!   hostname, `tcp:ovsdbserver-nb.openstack.svc:6641`.
//! - **External** (one network attachment): clients use the pods' IPs on the
//!   attachment, `tcp:172.17.0.9:6641,tcp:172.17.0.10:6641`.
//!
//! The mode is recomputed from the cluster spec on every pass. Missing inputs (no
//! service yet, pods not ready, attachment IPs not reported) resolve to
//! [`Resolution::NotReady`] with a reason for the status condition. They are
//! never errors.

use crate::address::{first_service_port, format_endpoint, format_ip_endpoint, join_endpoints};
use crate::crd::OVNDBCluster;
use crate::network::attachment_ips;
use crate::status_reasons::{
    REASON_NETWORK_ATTACHMENT_PENDING, REASON_PODS_PENDING, REASON_SERVICE_NOT_READY,
};
use k8s_openapi::api::core::v1::{Pod, Service};
use kube::ResourceExt;

/// How clients reach a cluster.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EndpointMode {
    /// Headless service hostname
    Internal,
    /// Pod IPs on the named network attachment
    External(String),
}

impl EndpointMode {
    /// Mode selected by the cluster's spec.
    #[must_use]
    pub fn for_cluster(cluster: &OVNDBCluster) -> Self {
        match cluster.spec.network_attachment.as_deref() {
            Some(attachment) if !attachment.is_empty() => Self::External(attachment.to_string()),
            _ => Self::Internal,
        }
    }

    /// IP a pod's `DNSData` record publishes in this mode.
    ///
    /// Internal mode uses the pod IP, external mode the first IP on the
    /// attachment. `None` while the address is not known yet.
    #[must_use]
    pub fn record_ip(&self, pod: &Pod, namespace: &str) -> Option<String> {
        match self {
            Self::Internal => pod_ip(pod).map(str::to_string),
            Self::External(attachment) => attachment_ips(pod, namespace, attachment)
                .into_iter()
                .next(),
        }
    }
}

/// Outcome of resolving one endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Connection string clients can use
    Ready(String),
    /// Not resolvable yet; `reason` is a status condition reason
    NotReady {
        reason: &'static str,
        message: String,
    },
}

impl Resolution {
    fn not_ready(reason: &'static str, message: impl Into<String>) -> Self {
        Self::NotReady {
            reason,
            message: message.into(),
        }
    }

    /// The connection string, or `""` when not ready.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        match self {
            Self::Ready(endpoint) => endpoint,
            Self::NotReady { .. } => "",
        }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

/// Both endpoints of a cluster. At most one of them is non-empty.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolvedEndpoints {
    pub internal: String,
    pub external: String,
    /// Condition reason and message when the active endpoint is not ready.
    pub not_ready: Option<(&'static str, String)>,
}

/// `status.podIP`, if assigned.
#[must_use]
pub fn pod_ip(pod: &Pod) -> Option<&str> {
    pod.status
        .as_ref()
        .and_then(|status| status.pod_ip.as_deref())
        .filter(|ip| !ip.is_empty())
}

/// Whether a pod is running, `Ready=True` and not being deleted.
#[must_use]
pub fn is_pod_ready(pod: &Pod) -> bool {
    if pod.metadata.deletion_timestamp.is_some() {
        return false;
    }
    pod.status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .is_some_and(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
}

/// Ready pods ordered by name.
fn ready_pods(pods: &[Pod]) -> Vec<&Pod> {
    let mut ready: Vec<&Pod> = pods.iter().filter(|pod| is_pod_ready(pod)).collect();
    ready.sort_by_key(|pod| pod.name_any());
    ready
}

/// Resolve the in-cluster endpoint through the headless service.
#[must_use]
pub fn resolve_internal_endpoint(
    cluster: &OVNDBCluster,
    service: Option<&Service>,
    pods: &[Pod],
) -> Resolution {
    let service_name = cluster.service_name();
    let namespace = cluster.namespace().unwrap_or_default();

    let endpoint = format_endpoint(service, &service_name, &namespace);
    if endpoint.is_empty() {
        return Resolution::not_ready(
            REASON_SERVICE_NOT_READY,
            format!("Service {service_name} does not exist or exposes no ports"),
        );
    }
    if ready_pods(pods).is_empty() {
        return Resolution::not_ready(
            REASON_PODS_PENDING,
            format!("No ready {service_name} pods"),
        );
    }
    Resolution::Ready(endpoint)
}

/// Resolve the endpoint built from the ready pods' IPs on `attachment`.
///
/// Pods are taken in name order. Any ready pod without an IP on the
/// attachment makes the whole endpoint not ready, so clients never see a
/// partial member list.
#[must_use]
pub fn resolve_external_endpoint(
    cluster: &OVNDBCluster,
    attachment: &str,
    service: Option<&Service>,
    pods: &[Pod],
) -> Resolution {
    let service_name = cluster.service_name();
    let namespace = cluster.namespace().unwrap_or_default();

    let Some(port) = service.and_then(first_service_port) else {
        return Resolution::not_ready(
            REASON_SERVICE_NOT_READY,
            format!("Service {service_name} does not exist or exposes no ports"),
        );
    };

    let ready = ready_pods(pods);
    if ready.is_empty() {
        return Resolution::not_ready(
            REASON_PODS_PENDING,
            format!("No ready {service_name} pods"),
        );
    }

    let mut remotes = Vec::with_capacity(ready.len());
    for pod in ready {
        match attachment_ips(pod, &namespace, attachment).first() {
            Some(ip) => remotes.push(format_ip_endpoint(ip, port)),
            None => {
                return Resolution::not_ready(
                    REASON_NETWORK_ATTACHMENT_PENDING,
                    format!(
                        "Pod {} has no IP on network attachment {attachment}",
                        pod.name_any()
                    ),
                );
            }
        }
    }
    Resolution::Ready(join_endpoints(remotes))
}

/// Resolve the cluster's endpoints for its current mode.
///
/// Only the active mode's endpoint is populated; the other is always empty.
#[must_use]
pub fn resolve_endpoints(
    cluster: &OVNDBCluster,
    service: Option<&Service>,
    pods: &[Pod],
) -> ResolvedEndpoints {
    let (resolution, external) = match EndpointMode::for_cluster(cluster) {
        EndpointMode::Internal => (resolve_internal_endpoint(cluster, service, pods), false),
        EndpointMode::External(attachment) => (
            resolve_external_endpoint(cluster, &attachment, service, pods),
            true,
        ),
    };

    let mut resolved = ResolvedEndpoints::default();
    match resolution {
        Resolution::Ready(endpoint) if external => resolved.external = endpoint,
        Resolution::Ready(endpoint) => resolved.internal = endpoint,
        Resolution::NotReady { reason, message } => resolved.not_ready = Some((reason, message)),
    }
    resolved
}

#[cfg(test)]
#[path = "endpoints_tests.rs"]
mod endpoints_tests;
