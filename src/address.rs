// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! OVSDB connection string formatting.
//!
//! Connection strings follow the OVSDB remote syntax `tcp:<host>:<port>`.
//! Several remotes are joined with commas, which is how OVN clients accept a
//! list of RAFT cluster members.
//!
//! # Example
//!
//! ```rust
//! use ovndb_operator::address::{format_ip_endpoint, headless_hostname};
//!
//! assert_eq!(headless_hostname("ovsdbserver-nb", "openstack"), "ovsdbserver-nb.openstack.svc");
//! assert_eq!(format_ip_endpoint("172.17.0.9", 6641), "tcp:172.17.0.9:6641");
//! ```

use crate::constants::{HEADLESS_DNS_SUFFIX, OVSDB_TRANSPORT};
use k8s_openapi::api::core::v1::Service;
use std::net::IpAddr;

/// Stable in-cluster hostname of a headless service: `<service>.<namespace>.svc`.
#[must_use]
pub fn headless_hostname(service_name: &str, namespace: &str) -> String {
    format!("{service_name}.{namespace}.{HEADLESS_DNS_SUFFIX}")
}

/// First port exposed by a service, if any.
#[must_use]
pub fn first_service_port(service: &Service) -> Option<i32> {
    service
        .spec
        .as_ref()
        .and_then(|spec| spec.ports.as_ref())
        .and_then(|ports| ports.first())
        .map(|port| port.port)
}

/// Connection string for a headless service: `tcp:<service>.<namespace>.svc:<port>`.
///
/// The port is the service's first port. Returns an empty string when no
/// service is supplied or it exposes no ports; callers treat that as
/// "endpoint not yet available".
#[must_use]
pub fn format_endpoint(service: Option<&Service>, service_name: &str, namespace: &str) -> String {
    service
        .and_then(first_service_port)
        .map(|port| {
            format!(
                "{OVSDB_TRANSPORT}:{}:{port}",
                headless_hostname(service_name, namespace)
            )
        })
        .unwrap_or_default()
}

/// Connection string for a single IP: `tcp:<ip>:<port>`.
///
/// IPv6 literals are bracketed (`tcp:[fd00::5]:6641`); anything that does not
/// parse as an IP is used verbatim.
#[must_use]
pub fn format_ip_endpoint(ip: &str, port: i32) -> String {
    match ip.parse::<IpAddr>() {
        Ok(IpAddr::V6(v6)) => format!("{OVSDB_TRANSPORT}:[{v6}]:{port}"),
        _ => format!("{OVSDB_TRANSPORT}:{ip}:{port}"),
    }
}

/// Join several remotes into one OVSDB connection string.
#[must_use]
pub fn join_endpoints<I, S>(endpoints: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    endpoints
        .into_iter()
        .filter(|e| !e.as_ref().is_empty())
        .map(|e| e.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
#[path = "address_tests.rs"]
mod address_tests;
