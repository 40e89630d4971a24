use jsonserver_operator::webhook::{review, validate, AdmissionOp, Verdict, BAD_JSON, BAD_NAME, NAME_CHANGED};
use jsonserver_operator::JsonServer;
use kube::core::admission::{AdmissionRequest, AdmissionReview};
use serde_json::{json, Value};

fn server(name: &str, json_config: &str) -> Value {
    json!({
        "apiVersion": "example.com/v1",
        "kind": "JsonServer",
        "metadata": { "name": name, "namespace": "default" },
        "spec": { "jsonConfig": json_config }
    })
}

fn request(operation: &str, name: &str, object: Value, old_object: Value) -> AdmissionRequest<JsonServer> {
    let review: AdmissionReview<JsonServer> = serde_json::from_value(json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "request": {
            "uid": "705ab4f5-6393-11e8-b7cc-42010a800002",
            "kind": { "group": "example.com", "version": "v1", "kind": "JsonServer" },
            "resource": { "group": "example.com", "version": "v1", "resource": "jsonservers" },
            "requestKind": { "group": "example.com", "version": "v1", "kind": "JsonServer" },
            "requestResource": { "group": "example.com", "version": "v1", "resource": "jsonservers" },
            "name": name,
            "namespace": "default",
            "operation": operation,
            "userInfo": { "username": "admin", "groups": ["system:authenticated"] },
            "object": object,
            "oldObject": old_object,
            "dryRun": false
        }
    }))
    .unwrap();
    review.try_into().unwrap()
}

#[test]
fn test_review_create() {
    let ok = request("CREATE", "app-demo", server("app-demo", "{}"), Value::Null);
    assert!(review(&ok).allowed);

    let bad_name = request("CREATE", "demo", server("demo", "{}"), Value::Null);
    assert!(!review(&bad_name).allowed);

    let bad_json = request("CREATE", "app-demo", server("app-demo", "{ invalid"), Value::Null);
    assert!(!review(&bad_json).allowed);
}

#[test]
fn test_review_update() {
    let invalid_json = request(
        "UPDATE",
        "app-demo",
        server("app-demo", "{ invalid"),
        server("app-demo", "{}"),
    );
    assert!(review(&invalid_json).allowed);

    let renamed = request(
        "UPDATE",
        "app-demo",
        server("app-other", "{}"),
        server("app-demo", "{}"),
    );
    assert!(!review(&renamed).allowed);
}

#[test]
fn test_review_delete() {
    let delete = request("DELETE", "whatever", Value::Null, server("whatever", "garbage"));
    assert!(review(&delete).allowed);
}

#[test]
fn test_validate_messages() {
    assert_eq!(
        validate(AdmissionOp::Create { name: "demo", json_config: "{}" }),
        Verdict::Reject(BAD_NAME.to_string())
    );
    assert_eq!(
        validate(AdmissionOp::Create { name: "app-demo", json_config: "{ invalid" }),
        Verdict::Reject(BAD_JSON.to_string())
    );
    assert_eq!(
        validate(AdmissionOp::Update {
            previous_name: "app-demo",
            name: "app-demo2",
            json_config: "{}",
        }),
        Verdict::Reject(NAME_CHANGED.to_string())
    );
    // Name is checked before JSON on create.
    assert_eq!(
        validate(AdmissionOp::Create { name: "demo", json_config: "{ invalid" }),
        Verdict::Reject(BAD_NAME.to_string())
    );
}
