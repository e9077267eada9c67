// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Object builders shared by the reconciler unit tests.

use crate::constants::NETWORK_STATUS_ANNOTATION;
use crate::crd::{DbType, OVNDBCluster, OVNDBClusterSpec};
use crate::labels::service_labels;
use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec, StatefulSetStatus};
use k8s_openapi::api::core::v1::{
    Pod, PodCondition, PodStatus, Service, ServicePort, ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

pub const NAMESPACE: &str = "openstack";

pub fn cluster(name: &str, db_type: DbType, replicas: i32, attachment: Option<&str>) -> OVNDBCluster {
    let mut cluster = OVNDBCluster::new(
        name,
        OVNDBClusterSpec {
            db_type,
            replicas,
            network_attachment: attachment.map(str::to_string),
            container_image: "quay.io/podified/openstack-ovn-nb-db-server:current".into(),
            storage_request: "1G".into(),
            storage_class: None,
            log_level: None,
        },
    );
    cluster.metadata.namespace = Some(NAMESPACE.into());
    cluster.metadata.uid = Some(format!("{NAMESPACE}-{name}-uid"));
    cluster.metadata.generation = Some(1);
    cluster
}

pub fn service(name: &str, port: i32) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(name.into()),
            namespace: Some(NAMESPACE.into()),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            ports: Some(vec![ServicePort {
                port,
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// A ready pod of `service_name` with `ip` and, if given, an attachment IP.
pub fn pod(
    service_name: &str,
    index: usize,
    ip: &str,
    attachment: Option<(&str, &str)>,
) -> Pod {
    let annotations = attachment.map(|(network, attach_ip)| {
        BTreeMap::from([(
            NETWORK_STATUS_ANNOTATION.to_string(),
            format!(
                r#"[{{"name":"ovn-kubernetes","ips":["{ip}"],"default":true}},{{"name":"{NAMESPACE}/{network}","interface":"net1","ips":["{attach_ip}"]}}]"#
            ),
        )])
    });
    Pod {
        metadata: ObjectMeta {
            name: Some(format!("{service_name}-{index}")),
            namespace: Some(NAMESPACE.into()),
            labels: Some(service_labels(service_name, "ovn")),
            annotations,
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

pub fn not_ready(mut pod: Pod) -> Pod {
    if let Some(conditions) = pod.status.as_mut().and_then(|s| s.conditions.as_mut()) {
        for condition in conditions {
            condition.status = "False".into();
        }
    }
    pod
}

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
