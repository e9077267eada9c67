// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `DNSData` synchronization for database pods.
//!
//! Every database pod gets one `DNSData` record, named after the pod, telling
//! the cluster DNS resolver that the pod's IP answers for the headless service
//! hostname `<service>.<namespace>.svc`.
//!
//! Writes follow an explicit read → compute desired → diff → conditional write
//! cycle. An unchanged record is never written. A write conflict re-runs the
//! whole cycle against the fresh state, bounded by the configured attempts.
//!
//! Records are owned by their `OVNDBCluster` through a controller owner
//! reference. Garbage collection is keyed on the owner's uid, so records of
//! another cluster sharing the namespace are never touched.

use crate::address::headless_hostname;
use crate::constants::{DNS_DATA_LABEL_SELECTOR_VALUE, KIND_DNS_DATA};
use crate::crd::{DNSData, DNSDataSpec, DNSHost, OVNDBCluster};
use crate::errors::{StoreError, TopologyError};
use crate::labels::role_selector;
use crate::metrics;
use crate::reconcilers::retry::retry_on_conflict;
use crate::store::Store;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Resource, ResourceExt};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// What a [`sync_dns_record`] call did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    Created,
    Updated,
    Unchanged,
}

/// Host entries of the record for a pod with `ip` behind `hostname`.
#[must_use]
pub fn desired_hosts(ip: &str, hostname: &str) -> Vec<DNSHost> {
    vec![DNSHost {
        ip: ip.to_string(),
        hostnames: vec![hostname.to_string()],
    }]
}

/// IP a record maps `hostname` to, if any.
#[must_use]
pub fn hostname_ip<'a>(record: &'a DNSData, hostname: &str) -> Option<&'a str> {
    record
        .spec
        .hosts
        .iter()
        .find(|host| host.hostnames.iter().any(|h| h == hostname))
        .map(|host| host.ip.as_str())
}

/// Whether `record` carries an owner reference with `owner_uid`.
#[must_use]
pub fn is_owned_by(record: &DNSData, owner_uid: &str) -> bool {
    record
        .owner_references()
        .iter()
        .any(|reference| reference.uid == owner_uid)
}

fn owner_reference(
    owner: &OVNDBCluster,
    record_name: &str,
) -> Result<OwnerReference, TopologyError> {
    owner
        .controller_owner_ref(&())
        .ok_or_else(|| TopologyError::DnsData {
            name: record_name.to_string(),
            source: StoreError::InvalidObject {
                kind: OVNDBCluster::kind(&()).to_string(),
                reason: "owner has no name or uid".to_string(),
            },
        })
}

/// Apply the desired state onto `current`, keeping unrelated fields.
///
/// Hosts and the label-selector value are overwritten; labels are merged and
/// the owner reference is added when missing.
fn apply_desired(
    current: &DNSData,
    spec: &DNSDataSpec,
    labels: &BTreeMap<String, String>,
    owner_ref: &OwnerReference,
) -> DNSData {
    let mut desired = current.clone();
    desired.spec.hosts.clone_from(&spec.hosts);
    desired
        .spec
        .dns_data_label_selector_value
        .clone_from(&spec.dns_data_label_selector_value);

    let merged = desired.metadata.labels.get_or_insert_with(BTreeMap::new);
    for (key, value) in labels {
        merged.insert(key.clone(), value.clone());
    }

    let references = desired.metadata.owner_references.get_or_insert_with(Vec::new);
    if !references.iter().any(|r| r.uid == owner_ref.uid) {
        references.push(owner_ref.clone());
    }
    desired
}

/// Ensure the `DNSData` record for `pod` maps `ip` to the service hostname.
///
/// The record is created when absent, updated in place when its hosts,
/// label-selector value, labels or owner reference differ, and left alone
/// otherwise.
///
/// # Arguments
///
/// * `store` - `DNSData` store
/// * `owner` - Cluster owning the record
/// * `pod` - Pod the record is named after
/// * `service_name` - Headless service whose hostname the record serves
/// * `ip` - Address the hostname resolves to
/// * `labels` - Labels merged into the record
/// * `max_attempts` - Bound on read-compute-write cycles when writes conflict
///
/// # Errors
///
/// Returns [`TopologyError::DnsData`] naming the record when the store fails
/// or conflicts persist.
pub async fn sync_dns_record(
    store: &dyn Store<DNSData>,
    owner: &OVNDBCluster,
    pod: &Pod,
    service_name: &str,
    ip: &str,
    labels: &BTreeMap<String, String>,
    max_attempts: u32,
) -> Result<SyncOutcome, TopologyError> {
    let name = pod.name_any();
    let namespace = pod
        .namespace()
        .or_else(|| owner.namespace())
        .unwrap_or_default();
    let owner_ref = &owner_reference(owner, &name)?;

    let spec = &DNSDataSpec {
        hosts: desired_hosts(ip, &headless_hostname(service_name, &namespace)),
        dns_data_label_selector_value: DNS_DATA_LABEL_SELECTOR_VALUE.to_string(),
    };
    let (name_ref, namespace_ref) = (&name, &namespace);

    let outcome = retry_on_conflict(max_attempts, &format!("sync-dnsdata {name}"), || async move {
        match store.get(namespace_ref, name_ref).await? {
            None => {
                let mut record = DNSData::new(name_ref, spec.clone());
                record.metadata.namespace = Some(namespace_ref.clone());
                record.metadata.labels = Some(labels.clone());
                record.metadata.owner_references = Some(vec![owner_ref.clone()]);
                store.create(namespace_ref, &record).await?;
                Ok(SyncOutcome::Created)
            }
            Some(current) => {
                let desired = apply_desired(&current, spec, labels, owner_ref);
                if desired.spec == current.spec && desired.metadata == current.metadata {
                    return Ok(SyncOutcome::Unchanged);
                }
                store.replace(namespace_ref, &desired).await?;
                Ok(SyncOutcome::Updated)
            }
        }
    })
    .await
    .map_err(|source| TopologyError::DnsData {
        name: name.clone(),
        source,
    })?;

    match outcome {
        SyncOutcome::Created | SyncOutcome::Updated => {
            metrics::record_dns_record_written(outcome == SyncOutcome::Created);
            info!(
                record = %name,
                namespace = %namespace,
                ip = ip,
                outcome = ?outcome,
                "Synchronized DNSData"
            );
        }
        SyncOutcome::Unchanged => {
            debug!(record = %name, namespace = %namespace, "DNSData already up to date");
        }
    }
    Ok(outcome)
}

/// Records of `owner`'s service that `owner` owns, ordered by name.
async fn owned_records(
    store: &dyn Store<DNSData>,
    owner: &OVNDBCluster,
) -> Result<Vec<DNSData>, TopologyError> {
    let Some(owner_uid) = owner.uid() else {
        return Ok(Vec::new());
    };
    let namespace = owner.namespace().unwrap_or_default();
    let service_name = owner.service_name();

    let records = store
        .list(&namespace, &role_selector(&service_name))
        .await
        .map_err(TopologyError::store("list", KIND_DNS_DATA, &service_name))?;

    Ok(records
        .into_iter()
        .filter(|record| is_owned_by(record, &owner_uid))
        .collect())
}

/// Delete records owned by `owner` whose pod is not in `live_pods`.
///
/// Returns the names of the deleted records.
///
/// # Errors
///
/// Returns an error if listing or deleting fails.
pub async fn cleanup_orphaned_dns_records(
    store: &dyn Store<DNSData>,
    owner: &OVNDBCluster,
    live_pods: &BTreeSet<String>,
) -> Result<Vec<String>, TopologyError> {
    let namespace = owner.namespace().unwrap_or_default();
    let mut deleted = Vec::new();

    for record in owned_records(store, owner).await? {
        let name = record.name_any();
        if live_pods.contains(&name) {
            continue;
        }
        store
            .delete(&namespace, &name)
            .await
            .map_err(TopologyError::store("delete", KIND_DNS_DATA, &name))?;
        metrics::record_dns_record_deleted("orphaned");
        info!(record = %name, namespace = %namespace, "Deleted DNSData of removed pod");
        deleted.push(name);
    }
    Ok(deleted)
}

/// Delete every record owned by `owner`, used when the cluster is deleted.
///
/// Returns the number of deleted records.
///
/// # Errors
///
/// Returns an error if listing or deleting fails.
pub async fn delete_owned_dns_records(
    store: &dyn Store<DNSData>,
    owner: &OVNDBCluster,
) -> Result<usize, TopologyError> {
    let namespace = owner.namespace().unwrap_or_default();
    let records = owned_records(store, owner).await?;

    for record in &records {
        let name = record.name_any();
        store
            .delete(&namespace, &name)
            .await
            .map_err(TopologyError::store("delete", KIND_DNS_DATA, &name))?;
        metrics::record_dns_record_deleted("cluster_deleted");
    }
    if !records.is_empty() {
        info!(
            cluster = %owner.name_any(),
            namespace = %namespace,
            count = records.len(),
            "Deleted DNSData records of deleted cluster"
        );
    }
    Ok(records.len())
}

#[cfg(test)]
#[path = "dnsdata_tests.rs"]
mod dnsdata_tests;
