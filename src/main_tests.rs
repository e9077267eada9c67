// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `main.rs` - requeue selection and error policy

#[cfg(test)]
mod tests {
    use super::super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use ovndb_operator::crd::{DbType, OVNDBClusterSpec};
    use ovndb_operator::labels::service_labels;
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn settings() -> ReconcileSettings {
        ReconcileSettings {
            max_conflict_retries: 3,
            ready_requeue: Duration::from_secs(600),
            not_ready_requeue: Duration::from_secs(15),
            error_requeue: Duration::from_secs(45),
        }
    }

    #[test]
    fn test_requeue_action_follows_outcome() {
        let settings = settings();

        assert_eq!(
            requeue_action(ReconcileOutcome::Ready, &settings),
            Action::requeue(Duration::from_secs(600))
        );
        assert_eq!(
            requeue_action(ReconcileOutcome::NotReady, &settings),
            Action::requeue(Duration::from_secs(15))
        );
        assert_eq!(
            requeue_action(ReconcileOutcome::Deleted, &settings),
            Action::await_change()
        );
    }

    fn pod(namespace: Option<&str>, labels: BTreeMap<String, String>) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some("ovsdbserver-nb-0".into()),
                namespace: namespace.map(str::to_string),
                labels: Some(labels),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_pod_maps_to_its_cluster() {
        let labelled = pod(Some("openstack"), service_labels("ovsdbserver-nb", "ovn-nb"));

        assert_eq!(
            pod_cluster_ref(labelled),
            Some(ObjectRef::<OVNDBCluster>::new("ovn-nb").within("openstack"))
        );
    }

    #[test]
    fn test_pod_without_cluster_label_maps_to_nothing() {
        let unlabelled = pod(
            Some("openstack"),
            BTreeMap::from([("service".to_string(), "ovsdbserver-nb".to_string())]),
        );
        assert_eq!(pod_cluster_ref(unlabelled), None);

        let no_namespace = pod(None, service_labels("ovsdbserver-nb", "ovn-nb"));
        assert_eq!(pod_cluster_ref(no_namespace), None);
    }

    #[test]
    fn test_error_policy_uses_configured_interval() {
        let (context, _memory) = Context::in_memory(settings());
        let cluster = OVNDBCluster::new(
            "ovn-nb",
            OVNDBClusterSpec {
                db_type: DbType::NB,
                replicas: 1,
                network_attachment: None,
                container_image: "ovn-nb:latest".into(),
                storage_request: "1G".into(),
                storage_class: None,
                log_level: None,
            },
        );
        let err = ReconcileError(anyhow::anyhow!("store unavailable"));

        assert_eq!(
            error_policy(Arc::new(cluster), &err, Arc::new(context)),
            Action::requeue(Duration::from_secs(45))
        );
    }

    /// The controller stops on SIGTERM through `shutdown_on_signal`
    #[tokio::test]
    #[cfg(unix)]
    async fn test_sigterm_signal_handler_creation() {
        use tokio::signal::unix::{signal, SignalKind};

        assert!(signal(SignalKind::terminate()).is_ok());
    }
}
