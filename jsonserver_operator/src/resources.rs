//! Desired shape of the children managed for every JsonServer.
//!
//! All constructors here are pure: the same parent always yields the same
//! object, field for field, so the reconciler can diff against them.

use std::collections::BTreeMap;
use std::fmt;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, Container, ContainerPort, PodSpec, PodTemplateSpec, Service,
    ServicePort, ServiceSpec, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::ObjectMeta;
use kube::{Resource, ResourceExt};

use crate::crd::JsonServer;
use crate::error::{Error, Result};

pub const CONFIG_KEY: &str = "db.json";
pub const SERVER_PORT: i32 = 3000;
pub const SERVER_IMAGE: &str = "backplane/json-server";
pub const CONTAINER_NAME: &str = "json-server";
pub const CONFIG_VOLUME: &str = "json-config";
pub const CONFIG_MOUNT_PATH: &str = "/data";
pub const APP_LABEL: &str = "app";

/// Namespaced identity of a stored object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of an object that already carries name and namespace
    pub fn of<K: Resource>(obj: &K) -> Result<Self> {
        let meta = obj.meta();
        let name = meta.name.clone().ok_or(Error::MissingObjectKey(".metadata.name"))?;
        let namespace = meta
            .namespace
            .clone()
            .ok_or(Error::MissingObjectKey(".metadata.namespace"))?;
        Ok(Self { namespace, name })
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// The three kinds of children owned by a JsonServer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildKind {
    Config,
    Workload,
    Service,
}

impl ChildKind {
    pub const ALL: [ChildKind; 3] = [ChildKind::Config, ChildKind::Workload, ChildKind::Service];
}

/// Children share the parent's name and namespace, whatever their kind
pub fn child_key(parent: &ObjectKey, _kind: ChildKind) -> ObjectKey {
    parent.clone()
}

fn selector_labels(parent: &JsonServer) -> BTreeMap<String, String> {
    BTreeMap::from([(APP_LABEL.to_string(), parent.name_any())])
}

fn child_meta(parent: &JsonServer, kind: ChildKind) -> ObjectMeta {
    let key = ObjectKey::new(parent.namespace().unwrap_or_default(), parent.name_any());
    let key = child_key(&key, kind);
    ObjectMeta {
        name: Some(key.name),
        namespace: Some(key.namespace),
        ..Default::default()
    }
}

/// ConfigMap holding the raw `jsonConfig` under `db.json`
pub fn config_map(parent: &JsonServer) -> ConfigMap {
    ConfigMap {
        metadata: child_meta(parent, ChildKind::Config),
        data: Some(BTreeMap::from([(
            CONFIG_KEY.to_string(),
            parent.spec.json_config.clone(),
        )])),
        ..Default::default()
    }
}

/// Deployment serving the ConfigMap through json-server
pub fn deployment(parent: &JsonServer, replicas: i32) -> Deployment {
    let labels = selector_labels(parent);
    let config_name = child_key(
        &ObjectKey::new(parent.namespace().unwrap_or_default(), parent.name_any()),
        ChildKind::Config,
    )
    .name;

    Deployment {
        metadata: child_meta(parent, ChildKind::Workload),
        spec: Some(DeploymentSpec {
            replicas: Some(replicas),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: CONTAINER_NAME.to_string(),
                        image: Some(SERVER_IMAGE.to_string()),
                        args: Some(vec![format!("{}/{}", CONFIG_MOUNT_PATH, CONFIG_KEY)]),
                        ports: Some(vec![ContainerPort {
                            container_port: SERVER_PORT,
                            protocol: Some("TCP".to_string()),
                            ..Default::default()
                        }]),
                        volume_mounts: Some(vec![VolumeMount {
                            name: CONFIG_VOLUME.to_string(),
                            mount_path: CONFIG_MOUNT_PATH.to_string(),
                            ..Default::default()
                        }]),
                        ..Default::default()
                    }],
                    volumes: Some(vec![Volume {
                        name: CONFIG_VOLUME.to_string(),
                        config_map: Some(ConfigMapVolumeSource {
                            name: Some(config_name),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Service forwarding port 3000 to the json-server pods
pub fn service(parent: &JsonServer) -> Service {
    Service {
        metadata: child_meta(parent, ChildKind::Service),
        spec: Some(ServiceSpec {
            selector: Some(selector_labels(parent)),
            ports: Some(vec![ServicePort {
                port: SERVER_PORT,
                target_port: Some(IntOrString::Int(SERVER_PORT)),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Set the parent as controlling owner so deleting it cascades to `child`
pub fn attach_owner<K: Resource>(child: &mut K, parent: &JsonServer) -> Result<()> {
    let owner = parent.controller_owner_ref(&()).ok_or_else(|| {
        Error::OwnerReference(format!(
            "JsonServer {} has no uid yet",
            parent.name_any()
        ))
    })?;
    child.meta_mut().owner_references = Some(vec![owner]);
    Ok(())
}
