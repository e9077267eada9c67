// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-process [`Store`] with Kubernetes-like optimistic concurrency.
//!
//! Objects are kept per `(namespace, name)`. Every successful write bumps a
//! store-wide counter that becomes the object's `resourceVersion`; a replace
//! carrying any other version is rejected with [`StoreError::Conflict`].
//! As with a status subresource, [`Store::replace`] keeps the stored status and
//! [`Store::replace_status`] only changes the status.

use super::{labels_match, Store};
use crate::errors::StoreError;
use async_trait::async_trait;
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use tokio::sync::RwLock;

type Key = (String, String);

/// In-memory object store.
pub struct MemoryStore<K> {
    objects: RwLock<BTreeMap<Key, K>>,
    version: AtomicU64,
    injected_conflicts: AtomicU32,
    writes: AtomicU64,
}

impl<K> Default for MemoryStore<K> {
    fn default() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            version: AtomicU64::new(0),
            injected_conflicts: AtomicU32::new(0),
            writes: AtomicU64::new(0),
        }
    }
}

impl<K> MemoryStore<K>
where
    K: Resource<DynamicType = ()> + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next_version(&self) -> String {
        (self.version.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    fn kind() -> String {
        K::kind(&()).to_string()
    }

    /// Insert or overwrite an object as the platform would, bypassing version checks.
    ///
    /// Used to seed objects this operator only reads (pods, statefulset status).
    pub async fn insert(&self, mut object: K) -> K {
        let namespace = object.namespace().unwrap_or_default();
        let name = object.name_any();
        let version = self.next_version();
        let meta = object.meta_mut();
        meta.resource_version = Some(version);
        if meta.uid.is_none() {
            meta.uid = Some(format!("{namespace}-{name}-uid"));
        }
        self.objects
            .write()
            .await
            .insert((namespace, name), object.clone());
        object
    }

    /// Remove an object as the platform would (e.g. a pod removed by scale-down).
    pub async fn remove(&self, namespace: &str, name: &str) -> Option<K> {
        self.objects
            .write()
            .await
            .remove(&(namespace.to_string(), name.to_string()))
    }

    /// All objects currently stored in `namespace`, ordered by name.
    pub async fn all(&self, namespace: &str) -> Vec<K> {
        self.objects
            .read()
            .await
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, object)| object.clone())
            .collect()
    }

    /// Make the next `count` writes fail with a conflict, simulating a concurrent writer.
    pub fn inject_conflicts(&self, count: u32) {
        self.injected_conflicts.store(count, Ordering::SeqCst);
    }

    /// Number of successful writes (create, replace, status, delete) so far.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    fn take_injected_conflict(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        let injected = self
            .injected_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if injected.is_ok() {
            return Err(StoreError::Conflict {
                kind: Self::kind(),
                namespace: namespace.to_string(),
                name: name.to_string(),
                message: "the object has been modified; please apply your changes to the latest version and try again".to_string(),
            });
        }
        Ok(())
    }

    fn name_of(object: &K) -> Result<String, StoreError> {
        object
            .meta()
            .name
            .clone()
            .ok_or_else(|| StoreError::InvalidObject {
                kind: Self::kind(),
                reason: "resource must have a name".to_string(),
            })
    }

    /// Check the version token of `incoming` against `stored`.
    fn check_version(
        incoming: &K,
        stored: &K,
        namespace: &str,
        name: &str,
    ) -> Result<(), StoreError> {
        let expected = stored.meta().resource_version.as_deref();
        let actual = incoming.meta().resource_version.as_deref();
        if actual != expected {
            return Err(StoreError::Conflict {
                kind: Self::kind(),
                namespace: namespace.to_string(),
                name: name.to_string(),
                message: format!(
                    "resource version {} does not match current version {}",
                    actual.unwrap_or("<none>"),
                    expected.unwrap_or("<none>")
                ),
            });
        }
        Ok(())
    }

    /// Copy the `status` field of `source` into `target`, going through JSON.
    fn with_status_of(target: &K, source: &K) -> Result<K, StoreError> {
        let to_invalid = |e: serde_json::Error| StoreError::InvalidObject {
            kind: Self::kind(),
            reason: e.to_string(),
        };
        let mut target_value = serde_json::to_value(target).map_err(to_invalid)?;
        let source_value = serde_json::to_value(source).map_err(to_invalid)?;

        if let Value::Object(map) = &mut target_value {
            match source_value.get("status") {
                Some(status) if !status.is_null() => {
                    map.insert("status".to_string(), status.clone());
                }
                _ => {
                    map.remove("status");
                }
            }
        }
        serde_json::from_value(target_value).map_err(to_invalid)
    }
}

#[async_trait]
impl<K> Store<K> for MemoryStore<K>
where
    K: Resource<DynamicType = ()> + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, StoreError> {
        Ok(self
            .objects
            .read()
            .await
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn list(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<K>, StoreError> {
        Ok(self
            .objects
            .read()
            .await
            .iter()
            .filter(|((ns, _), object)| {
                ns == namespace && labels_match(labels, object.meta().labels.as_ref())
            })
            .map(|(_, object)| object.clone())
            .collect())
    }

    async fn create(&self, namespace: &str, object: &K) -> Result<K, StoreError> {
        let name = Self::name_of(object)?;
        self.take_injected_conflict(namespace, &name)?;

        let mut objects = self.objects.write().await;
        let key = (namespace.to_string(), name.clone());
        if objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                kind: Self::kind(),
                namespace: namespace.to_string(),
                name,
            });
        }

        let mut created = object.clone();
        let version = self.next_version();
        let meta = created.meta_mut();
        meta.namespace = Some(namespace.to_string());
        meta.resource_version = Some(version);
        meta.uid = Some(format!("{namespace}-{name}-uid"));
        objects.insert(key, created.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(created)
    }

    async fn replace(&self, namespace: &str, object: &K) -> Result<K, StoreError> {
        let name = Self::name_of(object)?;
        self.take_injected_conflict(namespace, &name)?;

        let mut objects = self.objects.write().await;
        let key = (namespace.to_string(), name.clone());
        let stored = objects.get(&key).ok_or_else(|| StoreError::NotFound {
            kind: Self::kind(),
            namespace: namespace.to_string(),
            name: name.clone(),
        })?;
        Self::check_version(object, stored, namespace, &name)?;

        let mut updated = Self::with_status_of(object, stored)?;
        let uid = stored.meta().uid.clone();
        let version = self.next_version();
        let meta = updated.meta_mut();
        meta.namespace = Some(namespace.to_string());
        meta.uid = uid;
        meta.resource_version = Some(version);
        objects.insert(key, updated.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(updated)
    }

    async fn replace_status(&self, namespace: &str, object: &K) -> Result<K, StoreError> {
        let name = Self::name_of(object)?;
        self.take_injected_conflict(namespace, &name)?;

        let mut objects = self.objects.write().await;
        let key = (namespace.to_string(), name.clone());
        let stored = objects.get(&key).ok_or_else(|| StoreError::NotFound {
            kind: Self::kind(),
            namespace: namespace.to_string(),
            name: name.clone(),
        })?;
        Self::check_version(object, stored, namespace, &name)?;

        let mut updated = Self::with_status_of(stored, object)?;
        let version = self.next_version();
        updated.meta_mut().resource_version = Some(version);
        objects.insert(key, updated.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(updated)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        let removed = self
            .objects
            .write()
            .await
            .remove(&(namespace.to_string(), name.to_string()));
        if removed.is_some() {
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod memory_tests;
