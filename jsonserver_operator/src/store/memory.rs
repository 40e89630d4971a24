//! In-process [`ResourceStore`] with API-server-like semantics: uids,
//! resource versions, optimistic concurrency and status merge patches.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;
use kube::Resource;
use serde_json::Value;

use super::{ManagedObject, ResourceStore};
use crate::crd::{JsonServer, JsonServerStatus};
use crate::error::{Error, Result};
use crate::resources::ObjectKey;

/// Store operation, used to target injected failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Get,
    Create,
    Update,
    PatchStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct StoreKey {
    kind: String,
    key: ObjectKey,
}

impl StoreKey {
    fn of<K: ManagedObject>(key: &ObjectKey) -> Self {
        Self {
            kind: K::kind(&()).into_owned(),
            key: key.clone(),
        }
    }
}

#[derive(Debug)]
struct Fault {
    kind: String,
    op: StoreOp,
    error: fn(String) -> Error,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: DashMap<StoreKey, Value>,
    version: AtomicU64,
    creates: AtomicUsize,
    updates: AtomicUsize,
    status_patches: AtomicUsize,
    faults: Mutex<Vec<Fault>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_version(&self) -> String {
        (self.version.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    fn take_fault(&self, kind: &str, op: StoreOp) -> Result<()> {
        let mut faults = self
            .faults
            .lock()
            .map_err(|_| Error::Store("fault list poisoned".to_string()))?;
        match faults.iter().position(|f| f.kind == kind && f.op == op) {
            Some(idx) => {
                let fault = faults.remove(idx);
                Err((fault.error)(format!("injected {:?} failure on {}", op, kind)))
            }
            None => Ok(()),
        }
    }

    /// Fail the next `op` on objects of `kind` with a store error
    pub fn fail_next(&self, kind: &str, op: StoreOp) {
        self.push_fault(kind, op, Error::Store);
    }

    /// Fail the next `op` on objects of `kind` with a version conflict
    pub fn conflict_next(&self, kind: &str, op: StoreOp) {
        self.push_fault(kind, op, Error::Conflict);
    }

    fn push_fault(&self, kind: &str, op: StoreOp, error: fn(String) -> Error) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.push(Fault {
                kind: kind.to_string(),
                op,
                error,
            });
        }
    }

    /// Admit an object the way a user-facing API call would, assigning a uid
    /// when missing. Replaces any existing object with the same key.
    pub fn insert<K: ManagedObject>(&self, obj: &K) -> Result<K> {
        let key = ObjectKey::of(obj)?;
        let mut obj = obj.clone();
        let meta = obj.meta_mut();
        if meta.uid.is_none() {
            meta.uid = Some(format!("uid-{}-{}", key.namespace, key.name));
        }
        meta.resource_version = Some(self.next_version());
        self.objects
            .insert(StoreKey::of::<K>(&key), serde_json::to_value(&obj)?);
        Ok(obj)
    }

    /// Current copy of an object, without counting as a store call
    pub fn object<K: ManagedObject>(&self, key: &ObjectKey) -> Option<K> {
        self.objects
            .get(&StoreKey::of::<K>(key))
            .and_then(|v| serde_json::from_value(v.value().clone()).ok())
    }

    /// Mutate an object out of band, as another actor would
    pub fn modify<K: ManagedObject>(&self, key: &ObjectKey, f: impl FnOnce(&mut K)) -> Result<()> {
        let mut obj: K = self
            .object(key)
            .ok_or_else(|| Error::Store(format!("{} {} not found", K::kind(&()), key)))?;
        f(&mut obj);
        obj.meta_mut().resource_version = Some(self.next_version());
        self.objects
            .insert(StoreKey::of::<K>(key), serde_json::to_value(&obj)?);
        Ok(())
    }

    pub fn remove<K: ManagedObject>(&self, key: &ObjectKey) -> Option<K> {
        self.objects
            .remove(&StoreKey::of::<K>(key))
            .and_then(|(_, v)| serde_json::from_value(v).ok())
    }

    /// Number of stored objects of kind `K`
    pub fn count<K: ManagedObject>(&self) -> usize {
        let kind = K::kind(&());
        self.objects.iter().filter(|e| e.key().kind == kind).count()
    }

    /// Successful creates plus updates
    pub fn writes(&self) -> usize {
        self.creates.load(Ordering::SeqCst) + self.updates.load(Ordering::SeqCst)
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn status_patches(&self) -> usize {
        self.status_patches.load(Ordering::SeqCst)
    }
}

/// RFC 7386 JSON merge patch
fn merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (k, v) in patch {
                if v.is_null() {
                    target.remove(k);
                } else {
                    merge(target.entry(k.clone()).or_insert(Value::Null), v);
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn get<K: ManagedObject>(&self, key: &ObjectKey) -> Result<Option<K>> {
        self.take_fault(&K::kind(&()), StoreOp::Get)?;
        match self.objects.get(&StoreKey::of::<K>(key)) {
            Some(v) => Ok(Some(serde_json::from_value(v.value().clone())?)),
            None => Ok(None),
        }
    }

    async fn create<K: ManagedObject>(&self, obj: &K) -> Result<K> {
        self.take_fault(&K::kind(&()), StoreOp::Create)?;
        let key = ObjectKey::of(obj)?;
        let store_key = StoreKey::of::<K>(&key);
        if self.objects.contains_key(&store_key) {
            return Err(Error::Conflict(format!("{} {} already exists", K::kind(&()), key)));
        }

        let mut created = obj.clone();
        let meta = created.meta_mut();
        meta.uid = Some(format!("uid-{}-{}-{}", K::kind(&()).to_lowercase(), key.namespace, key.name));
        meta.resource_version = Some(self.next_version());
        self.objects.insert(store_key, serde_json::to_value(&created)?);
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(created)
    }

    async fn update<K: ManagedObject>(&self, obj: &K) -> Result<K> {
        self.take_fault(&K::kind(&()), StoreOp::Update)?;
        let key = ObjectKey::of(obj)?;
        let store_key = StoreKey::of::<K>(&key);
        let mut entry = self
            .objects
            .get_mut(&store_key)
            .ok_or_else(|| Error::Store(format!("{} {} not found", K::kind(&()), key)))?;

        let current = entry.value().pointer("/metadata/resourceVersion").and_then(Value::as_str);
        if current != obj.meta().resource_version.as_deref() {
            return Err(Error::Conflict(format!(
                "{} {} has been modified",
                K::kind(&()),
                key
            )));
        }

        let mut updated = obj.clone();
        updated.meta_mut().resource_version = Some(self.next_version());
        *entry.value_mut() = serde_json::to_value(&updated)?;
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(updated)
    }

    async fn patch_status(&self, key: &ObjectKey, status: &JsonServerStatus) -> Result<()> {
        self.take_fault(&JsonServer::kind(&()), StoreOp::PatchStatus)?;
        let store_key = StoreKey::of::<JsonServer>(key);
        let mut entry = self
            .objects
            .get_mut(&store_key)
            .ok_or_else(|| Error::Store(format!("JsonServer {} not found", key)))?;

        let patch = serde_json::json!({ "status": status });
        merge(entry.value_mut(), &patch);
        let version = self.next_version();
        merge(
            entry.value_mut(),
            &serde_json::json!({ "metadata": { "resourceVersion": version } }),
        );
        self.status_patches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ConfigMap;
    use kube::api::ObjectMeta;
    use serde_json::json;

    fn config_map(name: &str) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_get_update() -> Result<()> {
        let store = MemoryStore::new();
        let key = ObjectKey::new("default", "cm");

        assert!(store.get::<ConfigMap>(&key).await?.is_none());
        let created = store.create(&config_map("cm")).await?;
        assert!(created.metadata.uid.is_some());

        let fetched: ConfigMap = store.get(&key).await?.unwrap();
        assert_eq!(fetched, created);

        let updated = store.update(&fetched).await?;
        assert_ne!(updated.metadata.resource_version, fetched.metadata.resource_version);
        assert_eq!(store.writes(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_create_conflicts() -> Result<()> {
        let store = MemoryStore::new();
        store.create(&config_map("cm")).await?;
        let err = store.create(&config_map("cm")).await.unwrap_err();
        assert!(err.is_conflict());
        Ok(())
    }

    #[tokio::test]
    async fn test_stale_update_conflicts() -> Result<()> {
        let store = MemoryStore::new();
        let key = ObjectKey::new("default", "cm");
        let created = store.create(&config_map("cm")).await?;

        store.modify::<ConfigMap>(&key, |cm| cm.data = Some(Default::default()))?;
        let err = store.update(&created).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.updates(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_injected_fault_fires_once() -> Result<()> {
        let store = MemoryStore::new();
        store.fail_next("ConfigMap", StoreOp::Create);

        let err = store.create(&config_map("cm")).await.unwrap_err();
        assert!(matches!(err, Error::Store(_)));
        store.create(&config_map("cm")).await?;
        assert_eq!(store.count::<ConfigMap>(), 1);
        Ok(())
    }

    #[test]
    fn test_merge_patch() {
        let mut target = json!({"a": 1, "b": {"c": 2, "d": 3}});
        merge(&mut target, &json!({"b": {"c": null, "e": 4}, "f": "x"}));
        assert_eq!(target, json!({"a": 1, "b": {"d": 3, "e": 4}, "f": "x"}));
    }
}
