//! Kubernetes operator that keeps a ConfigMap, a Deployment and a Service in
//! line with every `JsonServer` custom resource.

pub mod config;
pub mod controller;
pub mod crd;
pub mod error;
pub mod logging;
pub mod reconciler;
pub mod resources;
pub mod status;
pub mod store;
pub mod webhook;

pub use crd::{JsonServer, JsonServerSpec, JsonServerStatus, SyncState};
pub use error::{Error, Result};
pub use reconciler::{Outcome, Reconciler};
pub use resources::ObjectKey;
