//! One reconciliation pass for a JsonServer.
//!
//! A pass re-reads everything it needs from the store, so it is safe to run
//! any number of times for the same key. Children are only ever created or
//! updated here; deletion happens through owner references.

use std::fmt;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use tracing::{debug, error, info, instrument};

use crate::crd::{JsonServer, SyncState};
use crate::error::{Error, Result};
use crate::resources::{self, child_key, ChildKind, ObjectKey};
use crate::status::{self, INVALID_CONFIG_MESSAGE, SYNCED_MESSAGE, UNEXPECTED_FAILURE_MESSAGE};
use crate::store::ResourceStore;
use crate::webhook::is_valid_json;

/// Steps of a pass, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Fetching,
    Validating,
    SyncingConfig,
    SyncingWorkload,
    SyncingService,
    Reporting,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// How a pass ended when it did not fail on I/O
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The JsonServer no longer exists
    Absent,
    /// `jsonConfig` does not parse; status set to `Error`, children untouched
    Invalid { message: String },
    /// All children in place; `ready_replicas` is the Deployment's live count
    Synced { ready_replicas: i32 },
}

pub struct Reconciler<S> {
    store: S,
}

impl<S: ResourceStore> Reconciler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Converge the children of the JsonServer at `key` towards its spec.
    ///
    /// I/O failures while syncing children set the status to `Error` and are
    /// returned so the caller can retry. An invalid `jsonConfig` is not an
    /// error: retrying cannot fix it, so it is only reported through status.
    #[instrument(skip_all, fields(namespace = %key.namespace, name = %key.name))]
    pub async fn reconcile(&self, key: &ObjectKey) -> Result<Outcome> {
        let Some(server) = self.store.get::<JsonServer>(key).await? else {
            debug!(phase = %Phase::Fetching, "JsonServer not found, nothing to do");
            return Ok(Outcome::Absent);
        };

        if !is_valid_json(&server.spec.json_config) {
            info!(phase = %Phase::Validating, "invalid jsonConfig detected");
            status::report(&self.store, key, SyncState::Error, INVALID_CONFIG_MESSAGE, None).await;
            return Ok(Outcome::Invalid {
                message: INVALID_CONFIG_MESSAGE.to_string(),
            });
        }

        match self.sync_children(key, &server).await {
            Ok(ready_replicas) => {
                debug!(phase = %Phase::Reporting, ready_replicas, "children in sync");
                status::report(
                    &self.store,
                    key,
                    SyncState::Synced,
                    SYNCED_MESSAGE,
                    Some(ready_replicas),
                )
                .await;
                Ok(Outcome::Synced { ready_replicas })
            }
            Err((phase, err, ready_replicas)) => {
                error!(%phase, error = %err, "failed to reconcile children");
                status::report(
                    &self.store,
                    key,
                    SyncState::Error,
                    UNEXPECTED_FAILURE_MESSAGE,
                    ready_replicas,
                )
                .await;
                Err(err)
            }
        }
    }

    /// Sync ConfigMap, Deployment and Service in order, stopping at the first
    /// failure. The ready count is carried along once it has been observed.
    async fn sync_children(
        &self,
        key: &ObjectKey,
        server: &JsonServer,
    ) -> std::result::Result<i32, (Phase, Error, Option<i32>)> {
        self.sync_config(key, server)
            .await
            .map_err(|e| (Phase::SyncingConfig, e, None))?;

        let deployment = self
            .sync_workload(key, server)
            .await
            .map_err(|e| (Phase::SyncingWorkload, e, None))?;
        let ready_replicas = ready_replicas(&deployment);

        self.sync_service(key, server)
            .await
            .map_err(|e| (Phase::SyncingService, e, Some(ready_replicas)))?;

        Ok(ready_replicas)
    }

    async fn sync_config(&self, key: &ObjectKey, server: &JsonServer) -> Result<()> {
        let key = child_key(key, ChildKind::Config);
        let desired = resources::config_map(server);

        match self.store.get::<ConfigMap>(&key).await? {
            None => {
                let mut desired = desired;
                resources::attach_owner(&mut desired, server)?;
                self.store.create(&desired).await?;
                info!(%key, "created ConfigMap");
            }
            Some(mut current) if current.data != desired.data => {
                current.data = desired.data;
                self.store.update(&current).await?;
                info!(%key, "updated ConfigMap data");
            }
            Some(_) => {}
        }
        Ok(())
    }

    async fn sync_workload(&self, key: &ObjectKey, server: &JsonServer) -> Result<Deployment> {
        let key = child_key(key, ChildKind::Workload);
        let replicas = server.spec.resolved_replicas();

        match self.store.get::<Deployment>(&key).await? {
            None => {
                let mut desired = resources::deployment(server, replicas);
                resources::attach_owner(&mut desired, server)?;
                let created = self.store.create(&desired).await?;
                info!(%key, replicas, "created Deployment");
                Ok(created)
            }
            // Only the replica count is compared; template drift is left alone.
            Some(mut current) => {
                let observed = current.spec.as_ref().and_then(|s| s.replicas);
                if observed == Some(replicas) {
                    return Ok(current);
                }

                debug!(%key, from = ?observed, to = replicas, "replica drift");
                let spec = current
                    .spec
                    .as_mut()
                    .ok_or_else(|| Error::Store(format!("Deployment {} has no spec", key)))?;
                spec.replicas = Some(replicas);
                let updated = self.store.update(&current).await?;
                info!(%key, replicas, "scaled Deployment");
                Ok(updated)
            }
        }
    }

    /// The Service is immutable once created.
    async fn sync_service(&self, key: &ObjectKey, server: &JsonServer) -> Result<()> {
        let key = child_key(key, ChildKind::Service);
        if self.store.get::<Service>(&key).await?.is_some() {
            return Ok(());
        }

        let mut desired = resources::service(server);
        resources::attach_owner(&mut desired, server)?;
        self.store.create(&desired).await?;
        info!(%key, "created Service");
        Ok(())
    }
}

fn ready_replicas(deployment: &Deployment) -> i32 {
    deployment
        .status
        .as_ref()
        .and_then(|s| s.ready_replicas)
        .unwrap_or(0)
}
