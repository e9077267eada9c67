// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

// Common test utilities for integration tests

#![allow(dead_code)]

use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec, StatefulSetStatus};
use k8s_openapi::api::core::v1::{Pod, PodCondition, PodStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{
    api::{Api, DeleteParams, PostParams},
    client::Client,
};
use ovndb_operator::constants::NETWORK_STATUS_ANNOTATION;
use ovndb_operator::context::{Context, MemoryStores, ReconcileSettings};
use ovndb_operator::crd::{DbType, OVNDBCluster, OVNDBClusterSpec};
use ovndb_operator::labels::service_labels;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const NAMESPACE: &str = "openstack";

// ============================================================================
// In-memory fixtures
// ============================================================================

pub fn cluster(name: &str, db_type: DbType, replicas: i32, attachment: Option<&str>) -> OVNDBCluster {
    let mut cluster = OVNDBCluster::new(
        name,
        OVNDBClusterSpec {
            db_type,
            replicas,
            network_attachment: attachment.map(str::to_string),
            container_image: format!(
                "quay.io/podified/openstack-ovn-{}-db-server:current",
                db_type.suffix()
            ),
            storage_request: "10G".into(),
            storage_class: None,
            log_level: None,
        },
    );
    cluster.metadata.namespace = Some(NAMESPACE.into());
    cluster.metadata.generation = Some(1);
    cluster
}

/// A ready statefulset pod with `ip` and, if given, an IP on `(network, ip)`.
pub fn ready_pod(
    service_name: &str,
    index: usize,
    ip: &str,
    attachment: Option<(&str, &str)>,
) -> Pod {
    let mut networks = vec![json!({"name": "ovn-kubernetes", "ips": [ip], "default": true})];
    if let Some((network, attach_ip)) = attachment {
        networks.push(json!({
            "name": format!("{NAMESPACE}/{network}"),
            "interface": "net1",
            "ips": [attach_ip],
        }));
    }

    Pod {
        metadata: ObjectMeta {
            name: Some(format!("{service_name}-{index}")),
            namespace: Some(NAMESPACE.into()),
            labels: Some(service_labels(service_name, "ovn")),
            annotations: Some(BTreeMap::from([(
                NETWORK_STATUS_ANNOTATION.to_string(),
                serde_json::Value::Array(networks).to_string(),
            )])),
            ..Default::default()
        },
        status: Some(PodStatus {
            pod_ip: Some(ip.into()),
            conditions: Some(vec![PodCondition {
                type_: "Ready".into(),
                status: "True".into(),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// The statefulset as the platform reports it: `ready` of `replicas` ready.
pub fn statefulset(name: &str, replicas: i32, ready: i32) -> StatefulSet {
    StatefulSet {
        metadata: ObjectMeta {
            name: Some(name.into()),
            namespace: Some(NAMESPACE.into()),
            ..Default::default()
        },
        spec: Some(StatefulSetSpec {
            replicas: Some(replicas),
            ..Default::default()
        }),
        status: Some(StatefulSetStatus {
            replicas,
            ready_replicas: Some(ready),
            ..Default::default()
        }),
    }
}

/// In-memory context holding `cluster`, its statefulset and `pods`.
///
/// Returns the stored cluster, as the watcher would hand it to the reconciler.
pub async fn seeded_context(
    cluster: &OVNDBCluster,
    ready_replicas: i32,
    pods: Vec<Pod>,
) -> (Arc<Context>, MemoryStores, OVNDBCluster) {
    let (context, memory) = Context::in_memory(ReconcileSettings::default());
    let stored = memory.clusters.insert(cluster.clone()).await;
    memory
        .statefulsets
        .insert(statefulset(
            &cluster.service_name(),
            cluster.spec.replicas,
            ready_replicas,
        ))
        .await;
    for pod in pods {
        memory.pods.insert(pod).await;
    }
    (Arc::new(context), memory, stored)
}

// ============================================================================
// Live cluster helpers
// ============================================================================

/// Get a Kubernetes client or skip the test if not in a cluster
pub async fn get_kube_client_or_skip() -> Option<Client> {
    match Client::try_default().await {
        Ok(client) => Some(client),
        Err(e) => {
            eprintln!("Skipping integration test: not running in Kubernetes cluster: {}", e);
            None
        }
    }
}

/// Create a test namespace
pub async fn create_test_namespace(
    client: &Client,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let namespaces: Api<k8s_openapi::api::core::v1::Namespace> = Api::all(client.clone());

    let ns = serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": {
            "name": name,
            "labels": {
                "test": "integration",
                "managed-by": "ovndb-operator-test"
            }
        }
    }))?;

    match namespaces.create(&PostParams::default(), &ns).await {
        Ok(_) => {
            println!("Created test namespace: {}", name);
            Ok(())
        }
        Err(kube::Error::Api(ae)) if ae.code == 409 => {
            println!("Test namespace already exists: {}", name);
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

/// Cleanup test namespace
pub async fn cleanup_test_namespace(
    client: &Client,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let namespaces: Api<k8s_openapi::api::core::v1::Namespace> = Api::all(client.clone());

    match namespaces.delete(name, &DeleteParams::default()).await {
        Ok(_) => {
            println!("Deleted test namespace: {}", name);
            Ok(())
        }
        Err(kube::Error::Api(ae)) if ae.code == 404 => {
            println!("Test namespace already deleted: {}", name);
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}
