// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `OVNDBCluster` reconciliation logic.
//!
//! A pass is split in two halves:
//!
//! - [`plan_reconcile`] is pure. From an [`ObservedState`] (cluster, headless
//!   service, statefulset, pods) it derives the DNS records to publish, the
//!   endpoints and every status condition.
//! - [`reconcile_ovndbcluster`] observes through the context's stores, calls
//!   the planner and applies the plan: workload objects, `DNSData` records and
//!   finally a single status write.
//!
//! Deletion is guarded by a finalizer so owned `DNSData` records are removed
//! before the cluster disappears.

use crate::constants::OVNDBCLUSTER_FINALIZER;
use crate::context::Context;
use crate::crd::OVNDBCluster;
use crate::errors::TopologyError;
use crate::labels::{role_selector, service_labels};
use crate::network::{attachment_ips, validate_network_attachment};
use crate::reconcilers::dnsdata::{
    cleanup_orphaned_dns_records, delete_owned_dns_records, sync_dns_record,
};
use crate::reconcilers::endpoints::{
    is_pod_ready, resolve_endpoints, EndpointMode, ResolvedEndpoints,
};
use crate::reconcilers::finalizers::{ensure_finalizer, has_finalizer, remove_finalizer};
use crate::reconcilers::resources::{build_service, build_statefulset, create_or_replace};
use crate::reconcilers::status::OVNDBClusterStatusUpdater;
use crate::status_reasons::{
    extract_child_index, pod_condition_type, CONDITION_TYPE_DEPLOYMENT_READY,
    CONDITION_TYPE_DNS_DATA_READY, CONDITION_TYPE_INPUT_READY,
    CONDITION_TYPE_NETWORK_ATTACHMENTS_READY, CONDITION_TYPE_POD_PREFIX, CONDITION_TYPE_READY,
    CONDITION_TYPE_SERVICE_READY, REASON_ALL_READY, REASON_CONFIGURATION_INVALID,
    REASON_CONFIGURATION_VALID, REASON_DNS_DATA_FAILED, REASON_DNS_DATA_SYNCED,
    REASON_NETWORK_ATTACHMENT_PENDING, REASON_NOT_READY, REASON_NO_NETWORK_ATTACHMENT,
    REASON_PARTIALLY_READY, REASON_PODS_PENDING, REASON_PROGRESSING, REASON_READY,
    REASON_SERVICE_NOT_READY, REASON_VALIDATION_FAILED,
};
use anyhow::Result;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{Pod, Service};
use kube::ResourceExt;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

const STATUS_TRUE: &str = "True";
const STATUS_FALSE: &str = "False";

/// Result of a reconcile pass, used by the controller to pick a requeue interval.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Every replica is ready and the active endpoint is published.
    Ready,
    /// Waiting on pods, the service or network attachments.
    NotReady,
    /// The cluster is gone or its deletion was processed.
    Deleted,
}

/// Everything a pass observed about one cluster.
#[derive(Clone, Debug)]
pub struct ObservedState {
    pub cluster: OVNDBCluster,
    pub service: Option<Service>,
    pub statefulset: Option<StatefulSet>,
    /// Pods selected by the cluster's role label, terminating ones included.
    pub pods: Vec<Pod>,
}

/// A `DNSData` record to publish for one pod.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DnsRecordPlan {
    pub pod_name: String,
    pub ip: String,
}

/// A status condition the pass wants to set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedCondition {
    pub r#type: String,
    pub status: &'static str,
    pub reason: &'static str,
    pub message: String,
}

impl PlannedCondition {
    fn new(
        condition_type: impl Into<String>,
        ready: bool,
        reason: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            r#type: condition_type.into(),
            status: if ready { STATUS_TRUE } else { STATUS_FALSE },
            reason,
            message: message.into(),
        }
    }
}

/// What a pass should write.
#[derive(Clone, Debug)]
pub struct ReconcilePlan {
    pub mode: EndpointMode,
    pub desired_replicas: i32,
    pub ready_count: i32,
    /// StatefulSet and pods report every desired replica ready.
    pub deployment_ready: bool,
    /// Names of every pod that still exists. Records of other pods are orphans.
    pub live_pods: BTreeSet<String>,
    /// Records to publish, ordered by pod name. Empty until the deployment is ready.
    pub dns_records: Vec<DnsRecordPlan>,
    pub endpoints: ResolvedEndpoints,
    pub network_attachments: BTreeMap<String, Vec<String>>,
    pub conditions: Vec<PlannedCondition>,
    pub ready: bool,
}

impl ReconcilePlan {
    /// Condition planned for `condition_type`, if any.
    #[must_use]
    pub fn condition(&self, condition_type: &str) -> Option<&PlannedCondition> {
        self.conditions.iter().find(|c| c.r#type == condition_type)
    }
}

/// Check the `OVNDBCluster` spec invariants the reconciler relies on.
///
/// # Errors
///
/// Returns [`TopologyError::Validation`] when the network attachment is not a
/// single name or the replica count is negative.
pub fn validate_cluster(cluster: &OVNDBCluster) -> Result<(), TopologyError> {
    let invalid = |reason: String| TopologyError::Validation {
        namespace: cluster.namespace().unwrap_or_default(),
        name: cluster.name_any(),
        reason,
    };

    validate_network_attachment(cluster.spec.network_attachment.as_deref()).map_err(invalid)?;
    if cluster.spec.replicas < 0 {
        return Err(invalid(format!(
            "replicas must not be negative, got {}",
            cluster.spec.replicas
        )));
    }
    Ok(())
}

fn statefulset_ready_replicas(statefulset: Option<&StatefulSet>) -> i32 {
    statefulset
        .and_then(|sts| sts.status.as_ref())
        .and_then(|status| status.ready_replicas)
        .unwrap_or(0)
}

/// Compute what a pass should write from what it observed.
///
/// DNS records and endpoints are only planned once the statefulset and the
/// pods report every desired replica ready. Until then conditions explain
/// what is pending and both endpoints stay empty.
#[must_use]
pub fn plan_reconcile(observed: &ObservedState) -> ReconcilePlan {
    let cluster = &observed.cluster;
    let namespace = cluster.namespace().unwrap_or_default();
    let service_name = cluster.service_name();
    let mode = EndpointMode::for_cluster(cluster);
    let desired_replicas = cluster.spec.replicas;

    let live_pods: BTreeSet<String> = observed.pods.iter().map(ResourceExt::name_any).collect();

    let mut active: Vec<Pod> = observed
        .pods
        .iter()
        .filter(|pod| pod.metadata.deletion_timestamp.is_none())
        .cloned()
        .collect();
    active.sort_by_key(ResourceExt::name_any);

    let ready_count = i32::try_from(active.iter().filter(|pod| is_pod_ready(pod)).count())
        .unwrap_or(i32::MAX);
    let sts_ready = statefulset_ready_replicas(observed.statefulset.as_ref());
    let deployment_ready = observed.statefulset.is_some()
        && sts_ready == desired_replicas
        && ready_count == desired_replicas
        && usize::try_from(desired_replicas).is_ok_and(|desired| active.len() == desired);
    let replicas_message = format!("{ready_count}/{desired_replicas} replicas ready");

    let mut conditions = vec![PlannedCondition::new(
        CONDITION_TYPE_INPUT_READY,
        true,
        REASON_CONFIGURATION_VALID,
        "Spec is valid",
    )];

    // Service
    let service_port = observed
        .service
        .as_ref()
        .and_then(crate::address::first_service_port);
    conditions.push(match service_port {
        Some(port) => PlannedCondition::new(
            CONDITION_TYPE_SERVICE_READY,
            true,
            REASON_READY,
            format!("Service {service_name} exposes port {port}"),
        ),
        None => PlannedCondition::new(
            CONDITION_TYPE_SERVICE_READY,
            false,
            REASON_SERVICE_NOT_READY,
            format!("Service {service_name} does not exist or exposes no ports"),
        ),
    });

    // Deployment
    let deployment_reason = if deployment_ready {
        REASON_ALL_READY
    } else if observed.statefulset.is_none() {
        REASON_PROGRESSING
    } else if ready_count == 0 {
        REASON_PODS_PENDING
    } else {
        REASON_PARTIALLY_READY
    };
    conditions.push(PlannedCondition::new(
        CONDITION_TYPE_DEPLOYMENT_READY,
        deployment_ready,
        deployment_reason,
        replicas_message.clone(),
    ));

    // Network attachments
    let mut network_attachments = BTreeMap::new();
    match &mode {
        EndpointMode::Internal => conditions.push(PlannedCondition::new(
            CONDITION_TYPE_NETWORK_ATTACHMENTS_READY,
            true,
            REASON_NO_NETWORK_ATTACHMENT,
            "No network attachment configured, using the pod network",
        )),
        EndpointMode::External(attachment) => {
            let mut ips = Vec::new();
            let mut pending = Vec::new();
            for pod in &active {
                let pod_ips = attachment_ips(pod, &namespace, attachment);
                if pod_ips.is_empty() {
                    pending.push(pod.name_any());
                }
                ips.extend(pod_ips);
            }
            network_attachments.insert(attachment.clone(), ips);

            conditions.push(if pending.is_empty() {
                PlannedCondition::new(
                    CONDITION_TYPE_NETWORK_ATTACHMENTS_READY,
                    true,
                    REASON_READY,
                    format!("{} pod(s) attached to {attachment}", active.len()),
                )
            } else {
                PlannedCondition::new(
                    CONDITION_TYPE_NETWORK_ATTACHMENTS_READY,
                    false,
                    REASON_NETWORK_ATTACHMENT_PENDING,
                    format!("Waiting for {} on {attachment}", pending.join(", ")),
                )
            });
        }
    }

    // Records and endpoints
    let (dns_records, endpoints) = if deployment_ready {
        let records = active
            .iter()
            .filter_map(|pod| {
                mode.record_ip(pod, &namespace).map(|ip| DnsRecordPlan {
                    pod_name: pod.name_any(),
                    ip,
                })
            })
            .collect();
        (
            records,
            resolve_endpoints(cluster, observed.service.as_ref(), &active),
        )
    } else {
        (
            Vec::new(),
            ResolvedEndpoints {
                not_ready: Some((deployment_reason, replicas_message.clone())),
                ..Default::default()
            },
        )
    };

    conditions.push(if deployment_ready {
        PlannedCondition::new(
            CONDITION_TYPE_DNS_DATA_READY,
            true,
            REASON_DNS_DATA_SYNCED,
            format!("{} DNSData record(s) in place", dns_records.len()),
        )
    } else {
        PlannedCondition::new(
            CONDITION_TYPE_DNS_DATA_READY,
            false,
            REASON_PROGRESSING,
            "Waiting for all replicas before publishing DNS records",
        )
    });

    // One condition per pod, keyed by statefulset ordinal
    for pod in &active {
        let name = pod.name_any();
        if let Some(index) = extract_child_index(&name) {
            let ready = is_pod_ready(pod);
            conditions.push(PlannedCondition::new(
                pod_condition_type(index),
                ready,
                if ready { REASON_READY } else { REASON_NOT_READY },
                if ready {
                    format!("Pod {name} is ready")
                } else {
                    format!("Pod {name} is not ready")
                },
            ));
        }
    }

    let ready = deployment_ready && endpoints.not_ready.is_none();
    conditions.push(match &endpoints.not_ready {
        None if ready => PlannedCondition::new(
            CONDITION_TYPE_READY,
            true,
            REASON_ALL_READY,
            replicas_message,
        ),
        Some((reason, message)) => {
            PlannedCondition::new(CONDITION_TYPE_READY, false, *reason, message.clone())
        }
        None => PlannedCondition::new(
            CONDITION_TYPE_READY,
            false,
            REASON_NOT_READY,
            replicas_message,
        ),
    });

    ReconcilePlan {
        mode,
        desired_replicas,
        ready_count,
        deployment_ready,
        live_pods,
        dns_records,
        endpoints,
        network_attachments,
        conditions,
        ready,
    }
}

fn is_pod_condition(condition_type: &str) -> bool {
    condition_type
        .strip_prefix(CONDITION_TYPE_POD_PREFIX)
        .is_some_and(|rest| rest.starts_with('-'))
}

/// Copy the planned conditions into `updater`, dropping per-pod conditions of
/// pods that no longer exist.
fn apply_conditions(updater: &mut OVNDBClusterStatusUpdater, plan: &ReconcilePlan) {
    let planned: BTreeSet<&str> = plan.conditions.iter().map(|c| c.r#type.as_str()).collect();
    updater.retain_conditions(|c| {
        !is_pod_condition(&c.r#type) || planned.contains(c.r#type.as_str())
    });

    for condition in &plan.conditions {
        updater.set_condition(
            &condition.r#type,
            condition.status,
            condition.reason,
            &condition.message,
        );
    }
}

/// Reconciles an `OVNDBCluster` resource.
///
/// This function:
/// 1. Handles deletion (owned `DNSData` cleanup, then finalizer removal)
/// 2. Adds the finalizer if not present
/// 3. Validates the cluster spec; an invalid spec is reported in status and returned as an error
/// 4. Creates or updates the headless Service and the StatefulSet
/// 5. Lists the role's pods and deletes `DNSData` records of pods that are gone
/// 6. Publishes one `DNSData` record per pod once every replica is ready
/// 7. Writes endpoints and conditions in a single status update
///
/// # Errors
///
/// Returns an error for an invalid spec or when a store operation fails.
pub async fn reconcile_ovndbcluster(
    ctx: Arc<Context>,
    cluster: Arc<OVNDBCluster>,
) -> Result<ReconcileOutcome> {
    let namespace = cluster.namespace().unwrap_or_default();
    let name = cluster.name_any();
    let max_attempts = ctx.settings.max_conflict_retries;

    info!("Reconciling OVNDBCluster: {}/{}", namespace, name);
    debug!(
        namespace = %namespace,
        name = %name,
        generation = ?cluster.metadata.generation,
        db_type = %cluster.spec.db_type,
        replicas = cluster.spec.replicas,
        "Starting OVNDBCluster reconciliation"
    );

    if cluster.metadata.deletion_timestamp.is_some() {
        delete_ovndbcluster(&ctx, &cluster).await?;
        return Ok(ReconcileOutcome::Deleted);
    }

    let Some(cluster) = ensure_finalizer(
        ctx.stores.clusters.as_ref(),
        cluster.as_ref(),
        OVNDBCLUSTER_FINALIZER,
        max_attempts,
    )
    .await
    .map_err(TopologyError::store("update", "OVNDBCluster", &name))?
    else {
        debug!("OVNDBCluster {}/{} no longer exists", namespace, name);
        return Ok(ReconcileOutcome::Deleted);
    };

    let mut updater = OVNDBClusterStatusUpdater::new(&cluster);

    if let Err(error) = validate_cluster(&cluster) {
        warn!("OVNDBCluster {}/{} is invalid: {}", namespace, name, error);
        let message = error.to_string();
        updater.set_condition(
            CONDITION_TYPE_INPUT_READY,
            STATUS_FALSE,
            REASON_CONFIGURATION_INVALID,
            &message,
        );
        updater.set_condition(
            CONDITION_TYPE_READY,
            STATUS_FALSE,
            REASON_VALIDATION_FAILED,
            &message,
        );
        updater.set_endpoints("", "");
        updater
            .apply(ctx.stores.clusters.as_ref(), max_attempts)
            .await
            .map_err(TopologyError::store("update status of", "OVNDBCluster", &name))?;
        return Err(error.into());
    }

    let service = create_or_replace(
        ctx.stores.services.as_ref(),
        &namespace,
        &build_service(&cluster),
        max_attempts,
    )
    .await
    .map_err(TopologyError::store("apply", "Service", cluster.service_name()))?;

    let statefulset = create_or_replace(
        ctx.stores.statefulsets.as_ref(),
        &namespace,
        &build_statefulset(&cluster),
        max_attempts,
    )
    .await
    .map_err(TopologyError::store("apply", "StatefulSet", cluster.service_name()))?;

    let service_name = cluster.service_name();
    let pods = ctx
        .stores
        .pods
        .list(&namespace, &role_selector(&service_name))
        .await
        .map_err(TopologyError::store("list", "Pod", &service_name))?;

    let observed = ObservedState {
        cluster: cluster.clone(),
        service: Some(service),
        statefulset: Some(statefulset),
        pods,
    };
    let plan = plan_reconcile(&observed);
    debug!(
        ready_count = plan.ready_count,
        desired = plan.desired_replicas,
        deployment_ready = plan.deployment_ready,
        mode = ?plan.mode,
        "Planned OVNDBCluster reconciliation"
    );

    let orphans =
        cleanup_orphaned_dns_records(ctx.stores.dns_data.as_ref(), &cluster, &plan.live_pods)
            .await?;
    if !orphans.is_empty() {
        info!(
            "Removed {} DNSData record(s) of deleted pods for {}/{}",
            orphans.len(),
            namespace,
            name
        );
    }

    apply_conditions(&mut updater, &plan);
    updater.set_ready_count(plan.ready_count);
    updater.set_network_attachments(plan.network_attachments.clone());
    updater.set_observed_generation(cluster.metadata.generation);

    let labels = service_labels(&service_name, &name);
    for record in &plan.dns_records {
        let Some(pod) = observed.pods.iter().find(|p| p.name_any() == record.pod_name) else {
            continue;
        };
        if let Err(error) = sync_dns_record(
            ctx.stores.dns_data.as_ref(),
            &cluster,
            pod,
            &service_name,
            &record.ip,
            &labels,
            max_attempts,
        )
        .await
        {
            let message = error.to_string();
            updater.set_condition(
                CONDITION_TYPE_DNS_DATA_READY,
                STATUS_FALSE,
                REASON_DNS_DATA_FAILED,
                &message,
            );
            updater.set_condition(
                CONDITION_TYPE_READY,
                STATUS_FALSE,
                REASON_DNS_DATA_FAILED,
                &message,
            );
            updater.set_endpoints("", "");
            if let Err(status_error) = updater
                .apply(ctx.stores.clusters.as_ref(), max_attempts)
                .await
            {
                warn!(
                    "Failed to record DNSData failure on {}/{}: {}",
                    namespace, name, status_error
                );
            }
            return Err(error.into());
        }
    }

    updater.set_endpoints(&plan.endpoints.internal, &plan.endpoints.external);
    updater
        .apply(ctx.stores.clusters.as_ref(), max_attempts)
        .await
        .map_err(TopologyError::store("update status of", "OVNDBCluster", &name))?;

    if plan.ready {
        info!(
            "OVNDBCluster {}/{} ready: internal='{}' external='{}'",
            namespace, name, plan.endpoints.internal, plan.endpoints.external
        );
        Ok(ReconcileOutcome::Ready)
    } else {
        if let Some((reason, message)) = &plan.endpoints.not_ready {
            debug!("OVNDBCluster {}/{} not ready ({}): {}", namespace, name, reason, message);
        }
        Ok(ReconcileOutcome::NotReady)
    }
}

/// Handle deletion of an `OVNDBCluster`.
///
/// Deletes every `DNSData` record the cluster owns, then removes the
/// finalizer. The Service and StatefulSet are garbage collected through their
/// owner references.
///
/// # Errors
///
/// Returns an error if deleting records or removing the finalizer fails.
pub async fn delete_ovndbcluster(ctx: &Context, cluster: &OVNDBCluster) -> Result<()> {
    let namespace = cluster.namespace().unwrap_or_default();
    let name = cluster.name_any();

    if !has_finalizer(cluster, OVNDBCLUSTER_FINALIZER) {
        debug!("OVNDBCluster {}/{} has no finalizer, nothing to clean up", namespace, name);
        return Ok(());
    }

    info!("Deleting OVNDBCluster {}/{}", namespace, name);
    let deleted = delete_owned_dns_records(ctx.stores.dns_data.as_ref(), cluster).await?;
    debug!("Deleted {} DNSData record(s) for {}/{}", deleted, namespace, name);

    remove_finalizer(
        ctx.stores.clusters.as_ref(),
        cluster,
        OVNDBCLUSTER_FINALIZER,
        ctx.settings.max_conflict_retries,
    )
    .await
    .map_err(TopologyError::store("update", "OVNDBCluster", &name))?;
    Ok(())
}

#[cfg(test)]
#[path = "ovndbcluster_tests.rs"]
mod ovndbcluster_tests;
