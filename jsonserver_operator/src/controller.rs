use crate::config::OperatorConfig;
use crate::crd::JsonServer;
use crate::error::Error;
use crate::reconciler::{Outcome, Reconciler};
use crate::resources::ObjectKey;
use crate::store::KubeStore;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use kube::{
    api::Api,
    client::Client,
    runtime::controller::{Action, Controller},
    runtime::watcher,
};
use std::sync::Arc;

pub struct Context {
    pub reconciler: Reconciler<KubeStore>,
    pub config: OperatorConfig,
}

impl Context {
    pub fn new(client: Client, config: OperatorConfig) -> Self {
        Self {
            reconciler: Reconciler::new(KubeStore::new(client)),
            config,
        }
    }
}

/// The event only names the JsonServer; the pass re-reads it from the API.
async fn reconcile(server: Arc<JsonServer>, ctx: Arc<Context>) -> Result<Action, Error> {
    let key = ObjectKey::of(server.as_ref())?;
    match ctx.reconciler.reconcile(&key).await? {
        Outcome::Absent => Ok(Action::await_change()),
        Outcome::Invalid { .. } | Outcome::Synced { .. } => {
            Ok(Action::requeue(ctx.config.resync_interval()))
        }
    }
}

fn error_policy(server: Arc<JsonServer>, error: &Error, ctx: Arc<Context>) -> Action {
    let delay = if error.is_conflict() {
        ctx.config.conflict_requeue()
    } else {
        ctx.config.error_requeue()
    };
    tracing::warn!(
        name = ?server.metadata.name,
        namespace = ?server.metadata.namespace,
        %error,
        retry_in = ?delay,
        "reconcile failed, requeueing"
    );
    Action::requeue(delay)
}

fn api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: kube::Resource<Scope = kube::core::NamespaceResourceScope, DynamicType = ()>,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

/// Run the JsonServer controller until a shutdown signal arrives. Changes to
/// any owned ConfigMap, Deployment or Service re-trigger their parent.
pub async fn run(client: Client, config: OperatorConfig) {
    let namespace = config.namespace.clone();
    let ns = namespace.as_deref();
    let servers = api::<JsonServer>(&client, ns);
    let context = Arc::new(Context::new(client.clone(), config));

    tracing::info!(namespace = ns.unwrap_or("*"), "starting JsonServer controller");

    Controller::new(servers, watcher::Config::default())
        .owns(api::<ConfigMap>(&client, ns), watcher::Config::default())
        .owns(api::<Deployment>(&client, ns), watcher::Config::default())
        .owns(api::<Service>(&client, ns), watcher::Config::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, context)
        .for_each(|res| async move {
            match res {
                Ok((obj, _)) => tracing::debug!("reconciled {}", obj),
                Err(e) => tracing::error!("reconcile failed: {}", e),
            }
        })
        .await;

    tracing::info!("controller stopped");
}
