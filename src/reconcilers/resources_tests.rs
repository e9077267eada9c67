// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `resources.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::address::first_service_port;
    use crate::constants::NETWORKS_ANNOTATION;
    use crate::crd::DbType;
    use crate::reconcilers::fixtures::{cluster, NAMESPACE};
    use crate::store::MemoryStore;

    #[test]
    fn test_spec_hash_is_stable_and_sensitive() {
        let a = build_statefulset(&cluster("ovn-nb", DbType::NB, 3, None));
        let b = build_statefulset(&cluster("ovn-nb", DbType::NB, 3, None));
        let c = build_statefulset(&cluster("ovn-nb", DbType::NB, 5, None));

        assert_eq!(spec_hash(&a.spec), spec_hash(&b.spec));
        assert_ne!(spec_hash(&a.spec), spec_hash(&c.spec));
        assert_eq!(spec_hash(&a.spec).len(), 64);
    }

    #[test]
    fn test_build_service_is_headless_with_db_port_first() {
        let service = build_service(&cluster("ovn-sb", DbType::SB, 1, None));

        assert_eq!(service.name_any(), "ovsdbserver-sb");
        assert_eq!(service.namespace().as_deref(), Some(NAMESPACE));
        let spec = service.spec.as_ref().unwrap();
        assert_eq!(spec.cluster_ip.as_deref(), Some("None"));
        assert_eq!(first_service_port(&service), Some(6642));
        assert_eq!(
            spec.selector.as_ref().unwrap().get("service").map(String::as_str),
            Some("ovsdbserver-sb")
        );
        assert_eq!(service.owner_references()[0].kind, "OVNDBCluster");
    }

    #[test]
    fn test_build_statefulset() {
        let sts = build_statefulset(&cluster("ovn-nb", DbType::NB, 3, Some("internalapi")));
        let spec = sts.spec.as_ref().unwrap();

        assert_eq!(sts.name_any(), "ovsdbserver-nb");
        assert_eq!(spec.replicas, Some(3));
        assert_eq!(spec.service_name.as_deref(), Some("ovsdbserver-nb"));

        let template_meta = spec.template.metadata.as_ref().unwrap();
        assert_eq!(
            template_meta.labels.as_ref().unwrap().get("service").map(String::as_str),
            Some("ovsdbserver-nb")
        );
        assert_eq!(
            template_meta
                .annotations
                .as_ref()
                .unwrap()
                .get(NETWORKS_ANNOTATION)
                .map(String::as_str),
            Some(r#"[{"name":"internalapi","namespace":"openstack"}]"#)
        );

        let container = &spec.template.spec.as_ref().unwrap().containers[0];
        assert_eq!(container.ports.as_ref().unwrap()[0].container_port, 6641);
        assert!(sts.annotations().contains_key(SPEC_HASH_ANNOTATION));
    }

    #[test]
    fn test_build_statefulset_without_attachment_has_no_networks_annotation() {
        let sts = build_statefulset(&cluster("ovn-nb", DbType::NB, 1, None));
        let template_meta = sts.spec.unwrap().template.metadata.unwrap();
        assert!(template_meta.annotations.is_none());
    }

    #[tokio::test]
    async fn test_create_or_replace_creates_then_is_idempotent() {
        let store = MemoryStore::<StatefulSet>::new();
        let desired = build_statefulset(&cluster("ovn-nb", DbType::NB, 3, None));

        create_or_replace(&store, NAMESPACE, &desired, 5).await.unwrap();
        assert_eq!(store.write_count(), 1);

        create_or_replace(&store, NAMESPACE, &desired, 5).await.unwrap();
        assert_eq!(store.write_count(), 1, "unchanged StatefulSet must not be rewritten");
    }

    #[tokio::test]
    async fn test_create_or_replace_scales_and_keeps_status() {
        let store = MemoryStore::<StatefulSet>::new();
        let mut live = build_statefulset(&cluster("ovn-nb", DbType::NB, 3, None));
        live.status = Some(k8s_openapi::api::apps::v1::StatefulSetStatus {
            replicas: 3,
            ready_replicas: Some(3),
            ..Default::default()
        });
        store.insert(live).await;

        let desired = build_statefulset(&cluster("ovn-nb", DbType::NB, 1, None));
        let stored = create_or_replace(&store, NAMESPACE, &desired, 5).await.unwrap();

        assert_eq!(stored.spec.as_ref().unwrap().replicas, Some(1));
        assert_eq!(stored.status.as_ref().unwrap().ready_replicas, Some(3));
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_service_replace_keeps_assigned_cluster_ips() {
        let store = MemoryStore::<Service>::new();
        let mut live = build_service(&cluster("ovn-nb", DbType::NB, 1, None));
        if let Some(spec) = live.spec.as_mut() {
            spec.cluster_ips = Some(vec!["None".into()]);
            spec.ports = Some(Vec::new());
        }
        live.metadata.annotations = None;
        store.insert(live).await;

        let desired = build_service(&cluster("ovn-nb", DbType::NB, 1, None));
        let stored = create_or_replace(&store, NAMESPACE, &desired, 5).await.unwrap();

        let spec = stored.spec.unwrap();
        assert_eq!(spec.cluster_ips, Some(vec!["None".to_string()]));
        assert_eq!(spec.ports.unwrap().len(), 2);
    }
}
