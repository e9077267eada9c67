// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `ovndbcluster.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::context::{Context, MemoryStores, ReconcileSettings};
    use crate::crd::{DbType, DNSData};
    use crate::reconcilers::dnsdata::hostname_ip;
    use crate::reconcilers::fixtures::{cluster, not_ready, pod, service, statefulset, NAMESPACE};
    use crate::store::Store;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

    fn observed(
        cluster: OVNDBCluster,
        ready_replicas: i32,
        pods: Vec<Pod>,
    ) -> ObservedState {
        let name = cluster.service_name();
        let port = cluster.spec.db_type.db_port();
        let replicas = cluster.spec.replicas;
        ObservedState {
            cluster,
            service: Some(service(&name, port)),
            statefulset: Some(statefulset(&name, replicas, ready_replicas)),
            pods,
        }
    }

    fn terminating(mut pod: Pod) -> Pod {
        pod.metadata.deletion_timestamp = Some(Time(k8s_openapi::jiff::Timestamp::now()));
        pod
    }

    #[test]
    fn test_plan_internal_ready() {
        let plan = plan_reconcile(&observed(
            cluster("ovn-nb", DbType::NB, 1, None),
            1,
            vec![pod("ovsdbserver-nb", 0, "10.0.0.5", None)],
        ));

        assert!(plan.ready);
        assert_eq!(plan.mode, EndpointMode::Internal);
        assert_eq!(plan.endpoints.internal, "tcp:ovsdbserver-nb.openstack.svc:6641");
        assert!(plan.endpoints.external.is_empty());
        assert_eq!(
            plan.dns_records,
            vec![DnsRecordPlan {
                pod_name: "ovsdbserver-nb-0".into(),
                ip: "10.0.0.5".into(),
            }]
        );
        assert!(plan.network_attachments.is_empty());
        assert_eq!(plan.condition("Ready").unwrap().status, "True");
        assert_eq!(plan.condition("Pod-0").unwrap().status, "True");
    }

    #[test]
    fn test_plan_external_uses_attachment_ips() {
        let plan = plan_reconcile(&observed(
            cluster("ovn-sb", DbType::SB, 2, Some("internalapi")),
            2,
            vec![
                pod("ovsdbserver-sb", 1, "10.0.0.7", Some(("internalapi", "172.17.0.10"))),
                pod("ovsdbserver-sb", 0, "10.0.0.6", Some(("internalapi", "172.17.0.9"))),
            ],
        ));

        assert!(plan.ready);
        assert!(plan.endpoints.internal.is_empty());
        assert_eq!(
            plan.endpoints.external,
            "tcp:172.17.0.9:6642,tcp:172.17.0.10:6642"
        );
        assert_eq!(plan.dns_records[0].ip, "172.17.0.9");
        assert_eq!(plan.dns_records[1].ip, "172.17.0.10");
        assert_eq!(
            plan.network_attachments.get("internalapi"),
            Some(&vec!["172.17.0.9".to_string(), "172.17.0.10".to_string()])
        );
    }

    #[test]
    fn test_plan_external_pending_attachment_is_not_ready() {
        let plan = plan_reconcile(&observed(
            cluster("ovn-nb", DbType::NB, 1, Some("internalapi")),
            1,
            vec![pod("ovsdbserver-nb", 0, "10.0.0.5", None)],
        ));

        assert!(!plan.ready);
        assert!(plan.endpoints.internal.is_empty());
        assert!(plan.endpoints.external.is_empty());

        let attachments = plan.condition("NetworkAttachmentsReady").unwrap();
        assert_eq!(attachments.status, "False");
        assert_eq!(attachments.reason, "NetworkAttachmentPending");
        assert_eq!(plan.condition("Ready").unwrap().reason, "NetworkAttachmentPending");
    }

    #[test]
    fn test_plan_waits_for_all_replicas() {
        let plan = plan_reconcile(&observed(
            cluster("ovn-nb", DbType::NB, 3, None),
            1,
            vec![
                pod("ovsdbserver-nb", 0, "10.0.0.5", None),
                not_ready(pod("ovsdbserver-nb", 1, "10.0.0.6", None)),
            ],
        ));

        assert!(!plan.deployment_ready);
        assert!(!plan.ready);
        assert_eq!(plan.ready_count, 1);
        assert!(plan.dns_records.is_empty());
        assert!(plan.endpoints.internal.is_empty());

        let deployment = plan.condition("DeploymentReady").unwrap();
        assert_eq!(deployment.reason, "PartiallyReady");
        assert_eq!(deployment.message, "1/3 replicas ready");
        assert_eq!(plan.condition("Pod-1").unwrap().status, "False");
    }

    #[test]
    fn test_plan_without_statefulset_is_progressing() {
        let mut state = observed(cluster("ovn-nb", DbType::NB, 1, None), 0, Vec::new());
        state.statefulset = None;
        let plan = plan_reconcile(&state);

        assert_eq!(plan.condition("DeploymentReady").unwrap().reason, "Progressing");
        assert_eq!(plan.condition("Ready").unwrap().status, "False");
    }

    #[test]
    fn test_plan_terminating_pod_is_live_but_not_active() {
        let plan = plan_reconcile(&observed(
            cluster("ovn-nb", DbType::NB, 1, None),
            1,
            vec![
                pod("ovsdbserver-nb", 0, "10.0.0.5", None),
                terminating(pod("ovsdbserver-nb", 1, "10.0.0.6", None)),
            ],
        ));

        assert!(plan.live_pods.contains("ovsdbserver-nb-1"));
        assert!(plan.deployment_ready);
        assert_eq!(plan.dns_records.len(), 1);
        assert!(plan.condition("Pod-1").is_none());
    }

    #[test]
    fn test_validate_cluster() {
        assert!(validate_cluster(&cluster("ovn-nb", DbType::NB, 1, None)).is_ok());
        assert!(validate_cluster(&cluster("ovn-nb", DbType::NB, 1, Some("internalapi"))).is_ok());

        let err = validate_cluster(&cluster("ovn-nb", DbType::NB, 1, Some("internalapi,tenant")))
            .unwrap_err();
        assert!(err.is_validation());

        assert!(validate_cluster(&cluster("ovn-nb", DbType::NB, -1, None)).is_err());
    }

    async fn setup(
        cluster_obj: OVNDBCluster,
        ready_replicas: i32,
        pods: Vec<Pod>,
    ) -> (Arc<Context>, MemoryStores, OVNDBCluster) {
        let (context, memory) = Context::in_memory(ReconcileSettings::default());
        let name = cluster_obj.service_name();
        let replicas = cluster_obj.spec.replicas;
        let stored = memory.clusters.create(NAMESPACE, &cluster_obj).await.unwrap();
        memory
            .statefulsets
            .insert(statefulset(&name, replicas, ready_replicas))
            .await;
        for p in pods {
            memory.pods.insert(p).await;
        }
        (Arc::new(context), memory, stored)
    }

    async fn fresh(memory: &MemoryStores, name: &str) -> OVNDBCluster {
        memory.clusters.get(NAMESPACE, name).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_reconcile_internal_cluster() {
        let (ctx, memory, stored) = setup(
            cluster("ovn-nb", DbType::NB, 1, None),
            1,
            vec![pod("ovsdbserver-nb", 0, "10.0.0.5", None)],
        )
        .await;

        let outcome = reconcile_ovndbcluster(ctx.clone(), Arc::new(stored))
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Ready);

        let cluster = fresh(&memory, "ovn-nb").await;
        assert!(has_finalizer(&cluster, OVNDBCLUSTER_FINALIZER));
        assert_eq!(
            cluster.internal_endpoint(),
            Some("tcp:ovsdbserver-nb.openstack.svc:6641")
        );
        assert_eq!(cluster.external_endpoint(), None);
        assert!(cluster.is_ready());

        let record: DNSData = memory
            .dns_data
            .get(NAMESPACE, "ovsdbserver-nb-0")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            hostname_ip(&record, "ovsdbserver-nb.openstack.svc"),
            Some("10.0.0.5")
        );

        assert!(memory
            .services
            .get(NAMESPACE, "ovsdbserver-nb")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent() {
        let (ctx, memory, stored) = setup(
            cluster("ovn-nb", DbType::NB, 1, None),
            1,
            vec![pod("ovsdbserver-nb", 0, "10.0.0.5", None)],
        )
        .await;
        reconcile_ovndbcluster(ctx.clone(), Arc::new(stored))
            .await
            .unwrap();

        let writes = (
            memory.clusters.write_count(),
            memory.dns_data.write_count(),
            memory.services.write_count(),
            memory.statefulsets.write_count(),
        );

        let cluster = fresh(&memory, "ovn-nb").await;
        reconcile_ovndbcluster(ctx.clone(), Arc::new(cluster))
            .await
            .unwrap();

        assert_eq!(
            writes,
            (
                memory.clusters.write_count(),
                memory.dns_data.write_count(),
                memory.services.write_count(),
                memory.statefulsets.write_count(),
            )
        );
    }

    #[tokio::test]
    async fn test_reconcile_not_ready_publishes_nothing() {
        let (ctx, memory, stored) = setup(
            cluster("ovn-nb", DbType::NB, 1, None),
            0,
            vec![not_ready(pod("ovsdbserver-nb", 0, "10.0.0.5", None))],
        )
        .await;

        let outcome = reconcile_ovndbcluster(ctx, Arc::new(stored)).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::NotReady);

        let cluster = fresh(&memory, "ovn-nb").await;
        assert_eq!(cluster.internal_endpoint(), None);
        assert!(!cluster.is_ready());
        assert!(memory.dns_data.all(NAMESPACE).await.is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_invalid_attachment_reports_and_fails() {
        let (ctx, memory, stored) = setup(
            cluster("ovn-nb", DbType::NB, 1, Some("internalapi tenant")),
            1,
            vec![pod("ovsdbserver-nb", 0, "10.0.0.5", None)],
        )
        .await;

        let err = reconcile_ovndbcluster(ctx, Arc::new(stored))
            .await
            .unwrap_err();
        assert!(err
            .downcast_ref::<TopologyError>()
            .is_some_and(TopologyError::is_validation));

        let cluster = fresh(&memory, "ovn-nb").await;
        let status = cluster.status.unwrap();
        let input = status
            .conditions
            .iter()
            .find(|c| c.r#type == "InputReady")
            .unwrap();
        assert_eq!(input.status, "False");
        assert_eq!(input.reason.as_deref(), Some("ConfigurationInvalid"));

        // Nothing is written before validation passes
        assert_eq!(memory.services.write_count(), 0);
        assert!(memory.dns_data.all(NAMESPACE).await.is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_scale_down_removes_records() {
        let (ctx, memory, stored) = setup(
            cluster("ovn-nb", DbType::NB, 3, None),
            3,
            vec![
                pod("ovsdbserver-nb", 0, "10.0.0.5", None),
                pod("ovsdbserver-nb", 1, "10.0.0.6", None),
                pod("ovsdbserver-nb", 2, "10.0.0.7", None),
            ],
        )
        .await;
        reconcile_ovndbcluster(ctx.clone(), Arc::new(stored))
            .await
            .unwrap();
        assert_eq!(memory.dns_data.all(NAMESPACE).await.len(), 3);

        let mut scaled = fresh(&memory, "ovn-nb").await;
        scaled.spec.replicas = 1;
        let scaled = memory.clusters.replace(NAMESPACE, &scaled).await.unwrap();
        memory.pods.remove(NAMESPACE, "ovsdbserver-nb-1").await;
        memory.pods.remove(NAMESPACE, "ovsdbserver-nb-2").await;
        memory
            .statefulsets
            .insert(statefulset("ovsdbserver-nb", 1, 1))
            .await;

        let outcome = reconcile_ovndbcluster(ctx, Arc::new(scaled)).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Ready);

        let names: Vec<String> = memory
            .dns_data
            .all(NAMESPACE)
            .await
            .iter()
            .map(ResourceExt::name_any)
            .collect();
        assert_eq!(names, vec!["ovsdbserver-nb-0".to_string()]);

        let cluster = fresh(&memory, "ovn-nb").await;
        let status = cluster.status.unwrap();
        assert!(!status.conditions.iter().any(|c| c.r#type == "Pod-2"));
    }

    #[tokio::test]
    async fn test_reconcile_survives_write_conflicts() {
        let (ctx, memory, stored) = setup(
            cluster("ovn-nb", DbType::NB, 1, None),
            1,
            vec![pod("ovsdbserver-nb", 0, "10.0.0.5", None)],
        )
        .await;

        memory.dns_data.inject_conflicts(2);
        memory.clusters.inject_conflicts(1);
        let outcome = reconcile_ovndbcluster(ctx, Arc::new(stored)).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Ready);
        assert_eq!(memory.dns_data.all(NAMESPACE).await.len(), 1);
    }

    #[tokio::test]
    async fn test_deletion_removes_records_and_finalizer() {
        let (ctx, memory, stored) = setup(
            cluster("ovn-nb", DbType::NB, 1, None),
            1,
            vec![pod("ovsdbserver-nb", 0, "10.0.0.5", None)],
        )
        .await;
        reconcile_ovndbcluster(ctx.clone(), Arc::new(stored))
            .await
            .unwrap();
        assert_eq!(memory.dns_data.all(NAMESPACE).await.len(), 1);

        let mut deleting = fresh(&memory, "ovn-nb").await;
        deleting.metadata.deletion_timestamp = Some(Time(k8s_openapi::jiff::Timestamp::now()));

        let outcome = reconcile_ovndbcluster(ctx, Arc::new(deleting)).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Deleted);
        assert!(memory.dns_data.all(NAMESPACE).await.is_empty());

        let cluster = fresh(&memory, "ovn-nb").await;
        assert!(!has_finalizer(&cluster, OVNDBCLUSTER_FINALIZER));
    }

    #[tokio::test]
    async fn test_reconcile_missing_cluster_is_deleted() {
        let (context, _memory) = Context::in_memory(ReconcileSettings::default());
        let outcome = reconcile_ovndbcluster(
            Arc::new(context),
            Arc::new(cluster("ovn-nb", DbType::NB, 1, None)),
        )
        .await
        .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Deleted);
    }
}
