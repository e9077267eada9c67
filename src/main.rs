// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use clap::Parser;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{Pod, Service};
use k8s_openapi::NamespaceResourceScope;
use kube::{
    runtime::{controller, controller::Action, reflector::ObjectRef, watcher::Config, Controller},
    Api, Client, Resource, ResourceExt,
};
use ovndb_operator::{
    config::OperatorConfig,
    constants::KIND_OVNDBCLUSTER,
    labels::OVNDBCLUSTER_LABEL,
    context::{Context, ReconcileSettings},
    crd::{DNSData, OVNDBCluster},
    health, metrics,
    reconcilers::{reconcile_ovndbcluster, ReconcileOutcome},
};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
struct ReconcileError(#[from] anyhow::Error);

fn main() -> Result<()> {
    let config = OperatorConfig::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .thread_name("ovndb-operator")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(config))
}

async fn async_main(config: OperatorConfig) -> Result<()> {
    // Respects RUST_LOG (default: info) and RUST_LOG_FORMAT (json | text)
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    info!("Starting OVN database cluster operator");
    debug!(?config, "Loaded configuration");

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;
    debug!("Kubernetes client initialized successfully");

    let ctx = Arc::new(Context::from_client(client.clone(), config.settings()));

    tokio::select! {
        result = health::run_server(config.metrics_addr) => {
            error!("CRITICAL: metrics server exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("metrics server exited unexpectedly without error")
        }
        () = run_ovndbcluster_controller(client, ctx, &config) => {
            info!("OVNDBCluster controller stopped");
            Ok(())
        }
    }
}

/// Namespaced API for `K`, scoped to the watched namespace if one is configured.
fn scoped_api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Debug,
{
    match namespace {
        Some(namespace) => Api::namespaced(client.clone(), namespace),
        None => Api::all(client.clone()),
    }
}

/// Run the `OVNDBCluster` controller until a shutdown signal arrives
async fn run_ovndbcluster_controller(client: Client, ctx: Arc<Context>, config: &OperatorConfig) {
    let namespace = config.watch_namespace.as_deref();
    match namespace {
        Some(namespace) => info!("Starting OVNDBCluster controller in namespace {}", namespace),
        None => info!("Starting OVNDBCluster controller for all namespaces"),
    }

    Controller::new(scoped_api::<OVNDBCluster>(&client, namespace), Config::default())
        .owns(scoped_api::<StatefulSet>(&client, namespace), Config::default())
        .owns(scoped_api::<Service>(&client, namespace), Config::default())
        .owns(scoped_api::<DNSData>(&client, namespace), Config::default())
        // Pods are owned by the StatefulSet, so map them back through their label
        .watches(
            scoped_api::<Pod>(&client, namespace),
            Config::default().labels(OVNDBCLUSTER_LABEL),
            pod_cluster_ref,
        )
        .with_config(controller::Config::default().concurrency(config.concurrency))
        .shutdown_on_signal()
        .run(reconcile_ovndbcluster_wrapper, error_policy, ctx)
        .for_each(|result| {
            if let Err(e) = result {
                warn!("OVNDBCluster controller event: {}", e);
            }
            futures::future::ready(())
        })
        .await;
}

/// The `OVNDBCluster` a database pod belongs to, from its cluster label.
fn pod_cluster_ref(pod: Pod) -> Option<ObjectRef<OVNDBCluster>> {
    let namespace = pod.namespace()?;
    let cluster = pod.labels().get(OVNDBCLUSTER_LABEL)?;
    Some(ObjectRef::new(cluster).within(&namespace))
}

/// Pick the requeue interval for a finished pass.
fn requeue_action(outcome: ReconcileOutcome, settings: &ReconcileSettings) -> Action {
    match outcome {
        ReconcileOutcome::Ready => Action::requeue(settings.ready_requeue),
        ReconcileOutcome::NotReady => Action::requeue(settings.not_ready_requeue),
        ReconcileOutcome::Deleted => Action::await_change(),
    }
}

/// Reconcile wrapper for `OVNDBCluster`
async fn reconcile_ovndbcluster_wrapper(
    cluster: Arc<OVNDBCluster>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let start = Instant::now();
    debug!(
        cluster_name = %cluster.name_any(),
        namespace = ?cluster.namespace(),
        "Reconcile wrapper called for OVNDBCluster"
    );

    match reconcile_ovndbcluster(ctx.clone(), cluster.clone()).await {
        Ok(outcome) => {
            metrics::record_reconciliation_success(KIND_OVNDBCLUSTER, start.elapsed());
            if outcome == ReconcileOutcome::NotReady {
                metrics::record_reconciliation_requeue(KIND_OVNDBCLUSTER);
            }
            debug!(
                "Reconciled OVNDBCluster {}: {:?}",
                cluster.name_any(),
                outcome
            );
            Ok(requeue_action(outcome, &ctx.settings))
        }
        Err(e) => {
            metrics::record_reconciliation_error(KIND_OVNDBCLUSTER, start.elapsed());
            error!("Failed to reconcile OVNDBCluster {}: {:#}", cluster.name_any(), e);
            Err(e.into())
        }
    }
}

/// Error policy for the `OVNDBCluster` controller
fn error_policy(_resource: Arc<OVNDBCluster>, _err: &ReconcileError, ctx: Arc<Context>) -> Action {
    Action::requeue(ctx.settings.error_requeue)
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod main_tests;
