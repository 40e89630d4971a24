use tracing::{debug, warn};

use crate::crd::{JsonServerStatus, SyncState};
use crate::error::Result;
use crate::resources::ObjectKey;
use crate::store::ResourceStore;

pub const SYNCED_MESSAGE: &str = "Synced successfully!";
pub const INVALID_CONFIG_MESSAGE: &str = "Error: spec.jsonConfig is not a valid json object";
pub const UNEXPECTED_FAILURE_MESSAGE: &str = "Error: unexpected failure";

/// Write state, message and (when known) the observed ready count to the
/// status sub-resource. Spec fields are never touched. `replicas: None`
/// leaves the last reported count in place.
pub async fn publish<S: ResourceStore>(
    store: &S,
    key: &ObjectKey,
    state: SyncState,
    message: &str,
    replicas: Option<i32>,
) -> Result<()> {
    let status = JsonServerStatus {
        state,
        message: message.to_string(),
        replicas,
    };
    store.patch_status(key, &status).await?;
    debug!(%key, %state, ?replicas, "status published");
    Ok(())
}

/// Like [`publish`], but a failed write is only logged. Nothing retries it;
/// the next pass will publish again.
pub async fn report<S: ResourceStore>(
    store: &S,
    key: &ObjectKey,
    state: SyncState,
    message: &str,
    replicas: Option<i32>,
) {
    if let Err(err) = publish(store, key, state, message, replicas).await {
        warn!(%key, %state, error = %err, "failed to publish status");
    }
}
