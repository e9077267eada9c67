// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! [`Store`] implementation backed by the Kubernetes API server.

use super::{selector_string, Store};
use crate::constants::{FIELD_MANAGER, KUBE_LIST_PAGE_SIZE};
use crate::errors::StoreError;
use async_trait::async_trait;
use kube::api::{DeleteParams, ListParams, PostParams};
use kube::core::NamespaceResourceScope;
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Debug;
use tracing::debug;

/// Store talking to the Kubernetes API with a shared [`Client`].
///
/// One `KubeStore` serves every namespaced resource kind.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Translate a `kube::Error` into a [`StoreError`].
///
/// `on_conflict` decides what an HTTP 409 means for the calling operation:
/// `AlreadyExists` for creates, a stale resource version for updates.
fn map_error<K>(err: kube::Error, namespace: &str, name: &str, on_conflict: Conflict) -> StoreError
where
    K: Resource<DynamicType = ()>,
{
    let kind = K::kind(&()).to_string();
    match err {
        kube::Error::Api(ref status) if status.code == 404 => StoreError::NotFound {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        },
        kube::Error::Api(ref status) if status.code == 409 => match on_conflict {
            Conflict::AlreadyExists => StoreError::AlreadyExists {
                kind,
                namespace: namespace.to_string(),
                name: name.to_string(),
            },
            Conflict::StaleVersion => StoreError::Conflict {
                kind,
                namespace: namespace.to_string(),
                name: name.to_string(),
                message: status.message.clone(),
            },
        },
        source => StoreError::Api {
            kind,
            name: format!("{namespace}/{name}"),
            source,
        },
    }
}

#[derive(Clone, Copy)]
enum Conflict {
    AlreadyExists,
    StaleVersion,
}

fn object_name<K>(object: &K) -> Result<String, StoreError>
where
    K: Resource<DynamicType = ()>,
{
    object
        .meta()
        .name
        .clone()
        .ok_or_else(|| StoreError::InvalidObject {
            kind: K::kind(&()).to_string(),
            reason: "resource must have a name".to_string(),
        })
}

#[async_trait]
impl<K> Store<K> for KubeStore
where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, StoreError> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        api.get_opt(name)
            .await
            .map_err(|e| map_error::<K>(e, namespace, name, Conflict::StaleVersion))
    }

    async fn list(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<K>, StoreError> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let mut list_params = ListParams::default().limit(KUBE_LIST_PAGE_SIZE);
        if !labels.is_empty() {
            list_params = list_params.labels(&selector_string(labels));
        }

        let mut all_items = Vec::new();
        let mut page_count = 0;
        loop {
            page_count += 1;
            let page = api
                .list(&list_params)
                .await
                .map_err(|e| map_error::<K>(e, namespace, "*", Conflict::StaleVersion))?;
            all_items.extend(page.items);

            debug!(
                kind = %K::kind(&()),
                namespace = %namespace,
                page = page_count,
                total_items = all_items.len(),
                "Fetched page from Kubernetes API"
            );

            match page.metadata.continue_ {
                Some(token) if !token.is_empty() => list_params.continue_token = Some(token),
                _ => break,
            }
        }

        all_items.sort_by_key(ResourceExt::name_any);
        Ok(all_items)
    }

    async fn create(&self, namespace: &str, object: &K) -> Result<K, StoreError> {
        let name = object_name(object)?;
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        api.create(&post_params(), object)
            .await
            .map_err(|e| map_error::<K>(e, namespace, &name, Conflict::AlreadyExists))
    }

    async fn replace(&self, namespace: &str, object: &K) -> Result<K, StoreError> {
        let name = object_name(object)?;
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        api.replace(&name, &post_params(), object)
            .await
            .map_err(|e| map_error::<K>(e, namespace, &name, Conflict::StaleVersion))
    }

    async fn replace_status(&self, namespace: &str, object: &K) -> Result<K, StoreError> {
        let name = object_name(object)?;
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);

        // A full PUT of the subresource: keys dropped from the new status are
        // removed, and the object's resourceVersion is enforced by the server.
        api.replace_status(&name, &post_params(), object)
            .await
            .map_err(|e| map_error::<K>(e, namespace, &name, Conflict::StaleVersion))
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(e) => match map_error::<K>(e, namespace, name, Conflict::StaleVersion) {
                StoreError::NotFound { .. } => Ok(()),
                other => Err(other),
            },
        }
    }
}

fn post_params() -> PostParams {
    PostParams {
        field_manager: Some(FIELD_MANAGER.to_string()),
        ..PostParams::default()
    }
}
