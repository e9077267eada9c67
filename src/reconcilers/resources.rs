// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Workload objects owned by an `OVNDBCluster`: the headless Service and the
//! StatefulSet running ovsdb-server.
//!
//! Builders are pure. [`create_or_replace`] applies a desired object through a
//! [`Store`] with the same read → diff → conditional write cycle used for
//! `DNSData`. Change detection relies on a SHA-256 of the desired spec kept in
//! the `ovn.openstack.org/spec-hash` annotation, since the API server fills in
//! defaults that would otherwise make every comparison differ.

use crate::constants::{
    DB_CONTAINER_NAME, DB_DATA_MOUNT_PATH, DB_DATA_VOLUME_NAME, DB_PORT_NAME, DEFAULT_LOG_LEVEL,
    RAFT_PORT_NAME, SPEC_HASH_ANNOTATION,
};
use crate::crd::OVNDBCluster;
use crate::errors::StoreError;
use crate::labels::{role_selector, service_labels};
use crate::network::networks_annotation;
use crate::reconcilers::retry::retry_on_conflict;
use crate::store::Store;
use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, PersistentVolumeClaim, PersistentVolumeClaimSpec,
    PodSpec, PodTemplateSpec, Service, ServicePort, ServiceSpec, VolumeMount,
    VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta, OwnerReference};
use kube::{Resource, ResourceExt};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// SHA-256 (hex) of the JSON form of `data`.
#[must_use]
pub fn spec_hash<T: Serialize>(data: &T) -> String {
    let json = serde_json::to_string(data).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn owned_metadata(cluster: &OVNDBCluster, name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: cluster.namespace(),
        labels: Some(service_labels(name, &cluster.name_any())),
        owner_references: cluster.controller_owner_ref(&()).map(|r| vec![r]),
        ..Default::default()
    }
}

fn with_spec_hash(mut metadata: ObjectMeta, hash: String) -> ObjectMeta {
    metadata
        .annotations
        .get_or_insert_with(BTreeMap::new)
        .insert(SPEC_HASH_ANNOTATION.to_string(), hash);
    metadata
}

/// Headless service giving each database pod a stable DNS identity.
///
/// The client port is listed first; endpoint formatting relies on that order.
#[must_use]
pub fn build_service(cluster: &OVNDBCluster) -> Service {
    let name = cluster.service_name();
    let db_type = cluster.spec.db_type;

    let spec = ServiceSpec {
        cluster_ip: Some("None".to_string()),
        publish_not_ready_addresses: Some(true),
        selector: Some(role_selector(&name)),
        ports: Some(vec![
            ServicePort {
                name: Some(DB_PORT_NAME.to_string()),
                port: db_type.db_port(),
                protocol: Some("TCP".to_string()),
                ..Default::default()
            },
            ServicePort {
                name: Some(RAFT_PORT_NAME.to_string()),
                port: db_type.raft_port(),
                protocol: Some("TCP".to_string()),
                ..Default::default()
            },
        ]),
        ..Default::default()
    };

    Service {
        metadata: with_spec_hash(owned_metadata(cluster, &name), spec_hash(&spec)),
        spec: Some(spec),
        ..Default::default()
    }
}

/// StatefulSet running one ovsdb-server RAFT member per replica.
#[must_use]
pub fn build_statefulset(cluster: &OVNDBCluster) -> StatefulSet {
    let name = cluster.service_name();
    let namespace = cluster.namespace().unwrap_or_default();
    let db_type = cluster.spec.db_type;
    let labels = service_labels(&name, &cluster.name_any());

    let template_annotations =
        networks_annotation(&namespace, cluster.spec.network_attachment.as_deref());

    let container = Container {
        name: DB_CONTAINER_NAME.to_string(),
        image: Some(cluster.spec.container_image.clone()),
        ports: Some(vec![
            ContainerPort {
                name: Some(DB_PORT_NAME.to_string()),
                container_port: db_type.db_port(),
                ..Default::default()
            },
            ContainerPort {
                name: Some(RAFT_PORT_NAME.to_string()),
                container_port: db_type.raft_port(),
                ..Default::default()
            },
        ]),
        env: Some(vec![
            EnvVar {
                name: "DB_TYPE".to_string(),
                value: Some(db_type.suffix().to_string()),
                ..Default::default()
            },
            EnvVar {
                name: "SERVICE_NAME".to_string(),
                value: Some(name.clone()),
                ..Default::default()
            },
            EnvVar {
                name: "DB_PORT".to_string(),
                value: Some(db_type.db_port().to_string()),
                ..Default::default()
            },
            EnvVar {
                name: "RAFT_PORT".to_string(),
                value: Some(db_type.raft_port().to_string()),
                ..Default::default()
            },
            EnvVar {
                name: "OVN_LOG_LEVEL".to_string(),
                value: Some(
                    cluster
                        .spec
                        .log_level
                        .clone()
                        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
                ),
                ..Default::default()
            },
        ]),
        volume_mounts: Some(vec![VolumeMount {
            name: DB_DATA_VOLUME_NAME.to_string(),
            mount_path: DB_DATA_MOUNT_PATH.to_string(),
            ..Default::default()
        }]),
        ..Default::default()
    };

    let volume_claim = PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(DB_DATA_VOLUME_NAME.to_string()),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            storage_class_name: cluster.spec.storage_class.clone(),
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([(
                    "storage".to_string(),
                    Quantity(cluster.spec.storage_request.clone()),
                )])),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    };

    let spec = StatefulSetSpec {
        replicas: Some(cluster.spec.replicas),
        service_name: Some(name.clone()),
        pod_management_policy: Some("Parallel".to_string()),
        selector: LabelSelector {
            match_labels: Some(role_selector(&name)),
            ..Default::default()
        },
        template: PodTemplateSpec {
            metadata: Some(ObjectMeta {
                labels: Some(labels),
                annotations: (!template_annotations.is_empty()).then_some(template_annotations),
                ..Default::default()
            }),
            spec: Some(PodSpec {
                containers: vec![container],
                ..Default::default()
            }),
        },
        volume_claim_templates: Some(vec![volume_claim]),
        ..Default::default()
    };

    StatefulSet {
        metadata: with_spec_hash(owned_metadata(cluster, &name), spec_hash(&spec)),
        spec: Some(spec),
        ..Default::default()
    }
}

/// Merge `desired` ownership metadata into `current`.
fn merge_metadata(current: &mut ObjectMeta, desired: &ObjectMeta) {
    if let Some(labels) = &desired.labels {
        let merged = current.labels.get_or_insert_with(BTreeMap::new);
        for (key, value) in labels {
            merged.insert(key.clone(), value.clone());
        }
    }
    if let Some(annotations) = &desired.annotations {
        let merged = current.annotations.get_or_insert_with(BTreeMap::new);
        for (key, value) in annotations {
            merged.insert(key.clone(), value.clone());
        }
    }
    if let Some(desired_refs) = &desired.owner_references {
        let refs = current.owner_references.get_or_insert_with(Vec::new);
        for desired_ref in desired_refs {
            if !refs.iter().any(|r: &OwnerReference| r.uid == desired_ref.uid) {
                refs.push(desired_ref.clone());
            }
        }
    }
}

fn hash_of<K: Resource>(object: &K) -> Option<&String> {
    object
        .meta()
        .annotations
        .as_ref()
        .and_then(|a| a.get(SPEC_HASH_ANNOTATION))
}

/// Kinds whose spec the operator owns and can transplant onto a live object.
pub trait OwnedSpec: Resource<DynamicType = ()> + Clone + Send + Sync + 'static {
    /// Copy the desired spec onto `self`, keeping fields the API server
    /// assigns or forbids changing.
    fn adopt_spec(&mut self, desired: &Self);
}

impl OwnedSpec for Service {
    fn adopt_spec(&mut self, desired: &Self) {
        let cluster_ip = self.spec.as_ref().and_then(|s| s.cluster_ip.clone());
        let cluster_ips = self.spec.as_ref().and_then(|s| s.cluster_ips.clone());
        self.spec.clone_from(&desired.spec);
        if let Some(spec) = self.spec.as_mut() {
            if cluster_ip.is_some() {
                spec.cluster_ip = cluster_ip;
            }
            spec.cluster_ips = cluster_ips;
        }
    }
}

impl OwnedSpec for StatefulSet {
    fn adopt_spec(&mut self, desired: &Self) {
        let claims = self
            .spec
            .as_ref()
            .and_then(|s| s.volume_claim_templates.clone());
        self.spec.clone_from(&desired.spec);
        if let (Some(spec), Some(claims)) = (self.spec.as_mut(), claims) {
            spec.volume_claim_templates = Some(claims);
        }
    }
}

/// Create `desired`, or bring the existing object in line with it.
///
/// The existing object is only written when its spec hash or ownership
/// metadata differ. Returns the object as stored.
///
/// # Errors
///
/// Returns the store error when the write fails or conflicts persist.
pub async fn create_or_replace<K>(
    store: &dyn Store<K>,
    namespace: &str,
    desired: &K,
    max_attempts: u32,
) -> Result<K, StoreError>
where
    K: OwnedSpec,
{
    let name = desired.name_any();
    let kind = K::kind(&());
    let name_ref = &name;

    retry_on_conflict(
        max_attempts,
        &format!("apply-{} {name}", kind.to_lowercase()),
        || async move {
            let Some(current) = store.get(namespace, name_ref).await? else {
                let created = store.create(namespace, desired).await?;
                info!("Created {} {}/{}", K::kind(&()), namespace, name_ref);
                return Ok(created);
            };

            let mut updated = current.clone();
            merge_metadata(updated.meta_mut(), desired.meta());
            let spec_changed = hash_of(&current) != hash_of(desired);
            if spec_changed {
                updated.adopt_spec(desired);
            }

            if !spec_changed && updated.meta() == current.meta() {
                debug!("{} {}/{} up to date", K::kind(&()), namespace, name_ref);
                return Ok(current);
            }

            let replaced = store.replace(namespace, &updated).await?;
            info!("Replaced {} {}/{}", K::kind(&()), namespace, name_ref);
            Ok(replaced)
        },
    )
    .await
}

#[cfg(test)]
#[path = "resources_tests.rs"]
mod resources_tests;
