use async_trait::async_trait;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::{Client, Resource};
use serde_json::json;

use super::{ManagedObject, ResourceStore};
use crate::crd::{JsonServer, JsonServerStatus};
use crate::error::{Error, Result};
use crate::resources::ObjectKey;

/// Store backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K: ManagedObject>(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn key_of<K: ManagedObject>(obj: &K) -> Result<ObjectKey> {
    ObjectKey::of(obj)
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn get<K: ManagedObject>(&self, key: &ObjectKey) -> Result<Option<K>> {
        Ok(self.api::<K>(&key.namespace).get_opt(&key.name).await?)
    }

    async fn create<K: ManagedObject>(&self, obj: &K) -> Result<K> {
        let key = key_of(obj)?;
        Ok(self
            .api::<K>(&key.namespace)
            .create(&PostParams::default(), obj)
            .await?)
    }

    async fn update<K: ManagedObject>(&self, obj: &K) -> Result<K> {
        let key = key_of(obj)?;
        if obj.meta().resource_version.is_none() {
            return Err(Error::Store(format!(
                "refusing unversioned replace of {} {}",
                K::kind(&()),
                key
            )));
        }
        Ok(self
            .api::<K>(&key.namespace)
            .replace(&key.name, &PostParams::default(), obj)
            .await?)
    }

    async fn patch_status(&self, key: &ObjectKey, status: &JsonServerStatus) -> Result<()> {
        let patch = json!({ "status": status });
        self.api::<JsonServer>(&key.namespace)
            .patch_status(&key.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }
}
