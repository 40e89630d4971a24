use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Replica count used when `spec.replicas` is absent
pub const DEFAULT_REPLICAS: i32 = 1;

/// Specification for JsonServer
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[kube(group = "example.com", version = "v1", kind = "JsonServer", namespaced)]
#[kube(status = "JsonServerStatus")]
#[kube(scale = r#"{"specReplicasPath":".spec.replicas", "statusReplicasPath":".status.replicas"}"#)]
#[kube(printcolumn = r#"{"name":"State", "type":"string", "jsonPath":".status.state"}"#)]
#[kube(printcolumn = r#"{"name":"Ready", "type":"integer", "jsonPath":".status.replicas"}"#)]
#[serde(rename_all = "camelCase")]
pub struct JsonServerSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 0))]
    pub replicas: Option<i32>,
    /// Raw JSON document served as `db.json`
    pub json_config: String,
}

impl JsonServerSpec {
    /// Desired workload size, recomputed on every pass
    pub fn resolved_replicas(&self) -> i32 {
        self.replicas.unwrap_or(DEFAULT_REPLICAS)
    }
}

/// Coarse health summary of a JsonServer
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq, JsonSchema)]
pub enum SyncState {
    #[default]
    #[serde(rename = "")]
    Unknown,
    Synced,
    Error,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Unknown => "",
            SyncState::Synced => "Synced",
            SyncState::Error => "Error",
        }
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of JsonServer
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct JsonServerStatus {
    #[serde(default, skip_serializing_if = "is_unknown")]
    pub state: SyncState,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    /// Ready replicas observed on the managed Deployment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
}

fn is_unknown(state: &SyncState) -> bool {
    *state == SyncState::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::CustomResourceExt;
    use serde_json::json;

    #[test]
    fn test_spec_wire_format() {
        let spec = JsonServerSpec {
            replicas: None,
            json_config: "{}".to_string(),
        };
        assert_eq!(serde_json::to_value(&spec).unwrap(), json!({"jsonConfig": "{}"}));

        let back: JsonServerSpec =
            serde_json::from_value(json!({"replicas": 3, "jsonConfig": "[]"})).unwrap();
        assert_eq!(back.replicas, Some(3));
        assert_eq!(back.json_config, "[]");
    }

    #[test]
    fn test_resolved_replicas() {
        let mut spec = JsonServerSpec {
            replicas: None,
            json_config: String::new(),
        };
        assert_eq!(spec.resolved_replicas(), 1);

        for r in [0, 1, 7] {
            spec.replicas = Some(r);
            assert_eq!(spec.resolved_replicas(), r);
        }
    }

    #[test]
    fn test_status_omits_empty_fields() {
        let status = JsonServerStatus {
            state: SyncState::Error,
            message: "boom".to_string(),
            replicas: None,
        };
        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            json!({"state": "Error", "message": "boom"})
        );
        assert_eq!(serde_json::to_value(JsonServerStatus::default()).unwrap(), json!({}));

        let parsed: JsonServerStatus =
            serde_json::from_value(json!({"state": "", "replicas": 2})).unwrap();
        assert_eq!(parsed.state, SyncState::Unknown);
        assert_eq!(parsed.replicas, Some(2));
    }

    #[test]
    fn test_crd_metadata() {
        let crd = JsonServer::crd();
        assert_eq!(crd.spec.group, "example.com");
        assert_eq!(crd.spec.names.kind, "JsonServer");
        assert_eq!(crd.spec.scope, "Namespaced");

        let version = &crd.spec.versions[0];
        let subresources = version.subresources.as_ref().unwrap();
        assert!(subresources.status.is_some());
        assert_eq!(
            subresources.scale.as_ref().unwrap().spec_replicas_path,
            ".spec.replicas"
        );
    }
}
