//! Admission-time gate for JsonServer objects.
//!
//! Creation is strict (name prefix and parseable `jsonConfig`). Updates only
//! guard the name: a broken `jsonConfig` is let through and surfaces as an
//! `Error` status on the next reconciliation instead.

use kube::core::admission::{AdmissionRequest, AdmissionResponse, Operation};
use kube::ResourceExt;
use tracing::{debug, info};

use crate::crd::JsonServer;

/// Every JsonServer name must start with this prefix
pub const NAME_PREFIX: &str = "app-";

pub const BAD_NAME: &str = "Error: metadata.name must start with app-";
pub const BAD_JSON: &str = "Error: spec.jsonConfig is not a valid json object";
pub const NAME_CHANGED: &str = "metadata.name is immutable";

/// Admission decision
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject(String),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accept)
    }
}

/// A candidate write as seen by the gate
#[derive(Debug, Clone, Copy)]
pub enum AdmissionOp<'a> {
    Create {
        name: &'a str,
        json_config: &'a str,
    },
    Update {
        previous_name: &'a str,
        name: &'a str,
        json_config: &'a str,
    },
    Delete {
        name: &'a str,
    },
}

/// True when `raw` is any syntactically valid JSON value
pub fn is_valid_json(raw: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(raw).is_ok()
}

pub fn validate(op: AdmissionOp<'_>) -> Verdict {
    match op {
        AdmissionOp::Create { name, json_config } => {
            if !name.starts_with(NAME_PREFIX) {
                return Verdict::Reject(BAD_NAME.to_string());
            }
            if !is_valid_json(json_config) {
                return Verdict::Reject(BAD_JSON.to_string());
            }
            Verdict::Accept
        }
        AdmissionOp::Update {
            previous_name,
            name,
            ..
        } => {
            if previous_name != name {
                return Verdict::Reject(NAME_CHANGED.to_string());
            }
            Verdict::Accept
        }
        AdmissionOp::Delete { name } => {
            info!(%name, "validation for JsonServer upon deletion");
            Verdict::Accept
        }
    }
}

pub fn validate_create(obj: &JsonServer) -> Verdict {
    let name = obj.name_any();
    validate(AdmissionOp::Create {
        name: &name,
        json_config: &obj.spec.json_config,
    })
}

pub fn validate_update(old: &JsonServer, new: &JsonServer) -> Verdict {
    let previous_name = old.name_any();
    let name = new.name_any();
    validate(AdmissionOp::Update {
        previous_name: &previous_name,
        name: &name,
        json_config: &new.spec.json_config,
    })
}

pub fn validate_delete(obj: &JsonServer) -> Verdict {
    let name = obj.name_any();
    validate(AdmissionOp::Delete { name: &name })
}

/// Answer an AdmissionReview request. Requests missing the objects their
/// operation needs are denied rather than failing the hook.
pub fn review(req: &AdmissionRequest<JsonServer>) -> AdmissionResponse {
    let response = AdmissionResponse::from(req);

    let verdict = match (&req.operation, &req.object, &req.old_object) {
        (Operation::Create, Some(obj), _) => validate_create(obj),
        (Operation::Update, Some(new), Some(old)) => validate_update(old, new),
        (Operation::Delete, _, old) => match old {
            Some(obj) => validate_delete(obj),
            None => validate(AdmissionOp::Delete { name: &req.name }),
        },
        (Operation::Connect, _, _) => Verdict::Accept,
        (op, _, _) => Verdict::Reject(format!("{:?} request is missing its object", op)),
    };

    debug!(name = %req.name, operation = ?req.operation, ?verdict, "admission review");
    match verdict {
        Verdict::Accept => response,
        Verdict::Reject(reason) => response.deny(reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::JsonServerSpec;

    fn server(name: &str, json_config: &str) -> JsonServer {
        JsonServer::new(
            name,
            JsonServerSpec {
                replicas: None,
                json_config: json_config.to_string(),
            },
        )
    }

    #[test]
    fn test_create_requires_prefix() {
        let verdict = validate_create(&server("invalid-name", "{}"));
        assert_eq!(verdict, Verdict::Reject(BAD_NAME.to_string()));
    }

    #[test]
    fn test_create_requires_valid_json() {
        let verdict = validate_create(&server("app-valid", "{ invalid json }"));
        assert_eq!(verdict, Verdict::Reject(BAD_JSON.to_string()));
    }

    #[test]
    fn test_create_accepts_any_json_value() {
        for raw in [
            r#"{"people":[{"id":1,"name":"Alice"}]}"#,
            "{}",
            "[]",
            r#""string""#,
            "42",
            "null",
            " true ",
        ] {
            assert!(validate_create(&server("app-valid", raw)).is_accepted(), "{raw}");
        }
    }

    #[test]
    fn test_create_rejects_malformed_json() {
        for raw in ["", "{ invalid", "{\"a\":1} trailing", "[1,]", "'single'"] {
            assert!(!validate_create(&server("app-valid", raw)).is_accepted(), "{raw}");
        }
    }

    #[test]
    fn test_update_allows_invalid_json() {
        let old = server("app-test", "{}");
        let new = server("app-test", "{ invalid json }");
        assert!(validate_update(&old, &new).is_accepted());
    }

    #[test]
    fn test_update_rejects_rename() {
        let old = server("app-test", "{}");
        let new = server("app-other", "{}");
        assert_eq!(
            validate_update(&old, &new),
            Verdict::Reject(NAME_CHANGED.to_string())
        );
    }

    #[test]
    fn test_delete_always_accepted() {
        assert!(validate_delete(&server("no-prefix", "garbage")).is_accepted());
        assert!(validate(AdmissionOp::Delete { name: "" }).is_accepted());
    }
}
