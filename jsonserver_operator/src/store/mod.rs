//! Resource store consumed by the reconciler.
//!
//! The reconciler never talks to `kube::Api` directly; it goes through
//! [`ResourceStore`] so the same pass runs against the cluster or against
//! the in-memory store used in tests.

pub mod cluster;
pub mod memory;

pub use cluster::KubeStore;
pub use memory::{MemoryStore, StoreOp};

use std::fmt::Debug;

use async_trait::async_trait;
use kube::core::NamespaceResourceScope;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::crd::JsonServerStatus;
use crate::error::Result;
use crate::resources::ObjectKey;

/// Any namespaced object the store can hold
pub trait ManagedObject:
    Resource<Scope = NamespaceResourceScope, DynamicType = ()>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<T> ManagedObject for T where
    T: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// Request/response access to stored objects. No client-side caching:
/// every call reflects the store at the time it is made.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetch an object; `Ok(None)` when it does not exist
    async fn get<K: ManagedObject>(&self, key: &ObjectKey) -> Result<Option<K>>;

    /// Create a new object, failing with `Conflict` if it already exists
    async fn create<K: ManagedObject>(&self, obj: &K) -> Result<K>;

    /// Replace an object; a stale `resourceVersion` fails with `Conflict`
    async fn update<K: ManagedObject>(&self, obj: &K) -> Result<K>;

    /// Merge `status` into the status sub-resource of a JsonServer
    async fn patch_status(&self, key: &ObjectKey, status: &JsonServerStatus) -> Result<()>;
}
