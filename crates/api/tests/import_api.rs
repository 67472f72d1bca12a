//! Integration tests for POST /import against an in-process mock target.
//!
//! Uses Axum's `tower::ServiceExt` to send requests directly to the router;
//! lookup queries and record creation hit a spawned mock service.

mod common;

use axum::http::StatusCode;
use common::{body_json, body_text, build_test_app, get_auth, post_file, MockUpstream};
use serde_json::{json, Value};

// ---------------------------------------------------------------------------
// Parameter validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn import_without_url_is_a_bad_request() {
    let app = build_test_app();
    let response = post_file(app, "/import", "[]").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn import_with_invalid_policy_is_a_bad_request() {
    let app = build_test_app();
    let response = post_file(
        app,
        "/import?url=http://example/api/users&on_ambiguous=maybe",
        "[]",
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn import_with_malformed_body_reports_the_position() {
    let upstream = MockUpstream::spawn().await;
    let app = build_test_app();
    let uri = format!("/import?url={}", upstream.collection_url("users"));
    let response = post_file(app, &uri, "[{\"id\": }]").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "DECODE_ERROR");
    assert!(json["error"].as_str().unwrap().contains("line 1"));
}

// ---------------------------------------------------------------------------
// Flat import (scenario: tabular round-trip without FKs)
// ---------------------------------------------------------------------------

#[tokio::test]
async fn flat_csv_import_posts_in_order_and_maps_ids() {
    let upstream = MockUpstream::spawn().await;
    upstream.seed("users", json!([])).await;

    let app = build_test_app();
    let uri = format!(
        "/import?url={}&type=csv",
        upstream.collection_url("users")
    );
    let csv = "id,email,_original_id\nu1,a@x,u1\nu2,b@x,u2\n";
    let response = post_file(app, &uri, csv).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let report = body_json(response).await;
    assert_eq!(report["total"], 2);
    assert_eq!(report["successful"], 2);
    assert_eq!(report["failed"], 0);
    assert_eq!(report["id_map"].as_object().unwrap().len(), 2);
    assert!(report["id_map"]["u1"].is_string());
    assert!(report["id_map"]["u2"].is_string());

    let posts = upstream.posts_to("users").await;
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0]["email"], "a@x");
    assert_eq!(posts[1]["email"], "b@x");
    // Reserved fields are stripped before the POST.
    assert!(posts[0].get("id").is_none());
    assert!(posts[0].get("_original_id").is_none());
}

// ---------------------------------------------------------------------------
// Tree import with self references
// ---------------------------------------------------------------------------

#[tokio::test]
async fn tree_import_posts_parents_first_and_rebinds_parent_ids() {
    let upstream = MockUpstream::spawn().await;
    upstream.seed("categories", json!([])).await;

    let records = json!([
        {"_original_id": "c1", "name": "Backend", "parent_id": null},
        {"_original_id": "c2", "name": "API", "parent_id": "c1"},
        {"_original_id": "c3", "name": "DB", "parent_id": "c1"},
        {"_original_id": "c4", "name": "REST", "parent_id": "c2"}
    ]);

    let app = build_test_app();
    let uri = format!("/import?url={}", upstream.collection_url("categories"));
    let response = post_file(app, &uri, &records.to_string()).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let report = body_json(response).await;
    assert_eq!(report["successful"], 4);
    assert_eq!(report["id_map"].as_object().unwrap().len(), 4);

    let posts = upstream.posts_to("categories").await;
    let names: Vec<&str> = posts.iter().map(|p| p["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["Backend", "API", "DB", "REST"]);

    // Children point at the freshly assigned target ids of their parents.
    let backend_new_id = &report["id_map"]["c1"];
    let api_new_id = &report["id_map"]["c2"];
    assert_eq!(&posts[1]["parent_id"], backend_new_id);
    assert_eq!(&posts[2]["parent_id"], backend_new_id);
    assert_eq!(&posts[3]["parent_id"], api_new_id);
}

#[tokio::test]
async fn shuffled_tree_input_is_reordered_before_posting() {
    let upstream = MockUpstream::spawn().await;
    upstream.seed("categories", json!([])).await;

    // Children listed before their parents.
    let records = json!([
        {"_original_id": "c4", "name": "REST", "parent_id": "c2"},
        {"_original_id": "c2", "name": "API", "parent_id": "c1"},
        {"_original_id": "c1", "name": "Backend", "parent_id": null}
    ]);

    let app = build_test_app();
    let uri = format!("/import?url={}", upstream.collection_url("categories"));
    let response = post_file(app, &uri, &records.to_string()).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let posts = upstream.posts_to("categories").await;
    let names: Vec<&str> = posts.iter().map(|p| p["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["Backend", "API", "REST"]);
}

#[tokio::test]
async fn nested_document_import_is_flattened_first() {
    let upstream = MockUpstream::spawn().await;
    upstream.seed("categories", json!([])).await;

    let nested = json!([
        {
            "_original_id": "c1",
            "name": "Backend",
            "parent_id": null,
            "children": [
                {"_original_id": "c2", "name": "API", "children": []}
            ]
        }
    ]);

    let app = build_test_app();
    let uri = format!("/import?url={}", upstream.collection_url("categories"));
    let response = post_file(app, &uri, &nested.to_string()).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let report = body_json(response).await;
    assert_eq!(report["successful"], 2);

    let posts = upstream.posts_to("categories").await;
    assert_eq!(posts.len(), 2);
    assert!(posts.iter().all(|p| p.get("children").is_none()));
}

// ---------------------------------------------------------------------------
// Ambiguous and missing references
// ---------------------------------------------------------------------------

fn ambiguous_task() -> Value {
    json!([
        {
            "_original_id": "t1",
            "name": "Triage",
            "assigned_to": "u1",
            "_references": {
                "assigned_to": {
                    "resource_type": "users",
                    "original_id": "u1",
                    "lookup_field": "email",
                    "lookup_value": "j@x"
                }
            }
        }
    ])
}

#[tokio::test]
async fn ambiguous_reference_with_skip_policy_clears_the_fk() {
    let upstream = MockUpstream::spawn().await;
    upstream
        .seed(
            "users",
            json!([
                {"id": "a1", "email": "j@x", "name": "Jay"},
                {"id": "a2", "email": "j@x", "name": "Jai"}
            ]),
        )
        .await;
    upstream.seed("tasks", json!([])).await;

    let app = build_test_app();
    let uri = format!("/import?url={}", upstream.collection_url("tasks"));
    let response = post_file(app, &uri, &ambiguous_task().to_string()).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let report = body_json(response).await;
    assert_eq!(report["successful"], 1);
    assert_eq!(report["ambiguous"], 1);

    let trace = &report["traces"][0];
    assert_eq!(trace["status"], "ambiguous");
    assert_eq!(trace["field"], "assigned_to");
    assert_eq!(trace["candidates"].as_array().unwrap().len(), 2);

    let posts = upstream.posts_to("tasks").await;
    assert_eq!(posts[0]["assigned_to"], Value::Null);
}

#[tokio::test]
async fn ambiguous_reference_with_fail_policy_aborts_the_import() {
    let upstream = MockUpstream::spawn().await;
    upstream
        .seed(
            "users",
            json!([
                {"id": "a1", "email": "j@x"},
                {"id": "a2", "email": "j@x"}
            ]),
        )
        .await;
    upstream.seed("tasks", json!([])).await;

    let app = build_test_app();
    let uri = format!(
        "/import?url={}&on_ambiguous=fail",
        upstream.collection_url("tasks")
    );
    let response = post_file(app, &uri, &ambiguous_task().to_string()).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let report = body_json(response).await;
    assert_eq!(report["successful"], 0);
    assert_eq!(report["errors"].as_array().unwrap().len(), 1);
    assert!(report["errors"][0]["message"]
        .as_str()
        .unwrap()
        .contains("ambiguous"));

    // No POST may be issued for this or subsequent records.
    assert!(upstream.posts_to("tasks").await.is_empty());
}

#[tokio::test]
async fn missing_reference_resolves_by_policy() {
    let upstream = MockUpstream::spawn().await;
    upstream.seed("users", json!([])).await;
    upstream.seed("tasks", json!([])).await;

    let app = build_test_app();
    let uri = format!("/import?url={}", upstream.collection_url("tasks"));
    let response = post_file(app, &uri, &ambiguous_task().to_string()).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let report = body_json(response).await;
    assert_eq!(report["missing"], 1);
    assert_eq!(report["successful"], 1);

    let posts = upstream.posts_to("tasks").await;
    assert_eq!(posts[0]["assigned_to"], Value::Null);
}

#[tokio::test]
async fn resolved_reference_is_rewritten_to_the_target_id() {
    let upstream = MockUpstream::spawn().await;
    upstream
        .seed("users", json!([{"id": "target-7", "email": "j@x"}]))
        .await;
    upstream.seed("tasks", json!([])).await;

    let app = build_test_app();
    let uri = format!("/import?url={}", upstream.collection_url("tasks"));
    let response = post_file(app, &uri, &ambiguous_task().to_string()).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let report = body_json(response).await;
    assert_eq!(report["resolved"], 1);

    let posts = upstream.posts_to("tasks").await;
    assert_eq!(posts[0]["assigned_to"], "target-7");
}

#[tokio::test]
async fn unenriched_foreign_keys_are_carried_through_with_a_warning() {
    let upstream = MockUpstream::spawn().await;
    upstream.seed("tasks", json!([])).await;

    let records = json!([
        {"_original_id": "t1", "name": "Orphan", "project_id": "p-src-1"}
    ]);

    let app = build_test_app();
    let uri = format!("/import?url={}", upstream.collection_url("tasks"));
    let response = post_file(app, &uri, &records.to_string()).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let report = body_json(response).await;
    let warnings = report["warnings"].as_array().unwrap();
    assert!(warnings
        .iter()
        .any(|w| w.as_str().unwrap().contains("project_id")));

    let posts = upstream.posts_to("tasks").await;
    assert_eq!(posts[0]["project_id"], "p-src-1");
}

// ---------------------------------------------------------------------------
// Cycles
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cyclic_parents_are_warned_about_and_fail_per_record() {
    let upstream = MockUpstream::spawn().await;
    upstream.seed("categories", json!([])).await;

    let records = json!([
        {"_original_id": "a", "name": "A", "parent_id": "b"},
        {"_original_id": "b", "name": "B", "parent_id": "a"}
    ]);

    let app = build_test_app();
    let uri = format!("/import?url={}", upstream.collection_url("categories"));
    let response = post_file(app, &uri, &records.to_string()).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let report = body_json(response).await;
    assert_eq!(report["failed"], 2);
    assert_eq!(report["successful"], 0);

    let warnings = report["warnings"].as_array().unwrap();
    assert!(warnings[0].as_str().unwrap().contains('a'));
    assert!(warnings[0].as_str().unwrap().contains('b'));

    // Neither record can point at a created parent, so nothing is posted.
    assert!(upstream.posts_to("categories").await.is_empty());
    assert!(report["id_map"].as_object().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Per-record target failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rejected_posts_are_recorded_per_record() {
    let upstream = MockUpstream::spawn().await;
    upstream.seed("users", json!([])).await;
    upstream.set_reject_posts(true).await;

    let records = json!([
        {"id": "u1", "email": "a@x"},
        {"id": "u2", "email": "b@x"}
    ]);

    let app = build_test_app();
    let uri = format!("/import?url={}", upstream.collection_url("users"));
    let response = post_file(app, &uri, &records.to_string()).await;

    // Everything failed, nothing succeeded.
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let report = body_json(response).await;
    assert_eq!(report["failed"], 2);
    assert_eq!(report["errors"][0]["status"], 422);
}

// ---------------------------------------------------------------------------
// Diagram round trip (export then import)
// ---------------------------------------------------------------------------

#[tokio::test]
async fn mermaid_export_feeds_back_through_import() {
    let source = MockUpstream::spawn().await;
    source
        .seed(
            "categories",
            json!([
                {"id": "c1", "name": "Backend", "parent_id": null},
                {"id": "c2", "name": "API", "parent_id": "c1"},
                {"id": "c3", "name": "DB", "parent_id": "c1"},
                {"id": "c4", "name": "REST", "parent_id": "c2"}
            ]),
        )
        .await;

    let export_uri = format!(
        "/export?url={}&type=mermaid",
        source.collection_url("categories")
    );
    let response = get_auth(build_test_app(), &export_uri).await;
    assert_eq!(response.status(), StatusCode::OK);
    let diagram = body_text(response).await;

    let target = MockUpstream::spawn().await;
    target.seed("categories", json!([])).await;

    let import_uri = format!(
        "/import?url={}&type=mermaid",
        target.collection_url("categories")
    );
    let response = post_file(build_test_app(), &import_uri, &diagram).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let report = body_json(response).await;
    assert_eq!(report["successful"], 4);
    assert_eq!(report["id_map"].as_object().unwrap().len(), 4);

    // The parent/child structure carries over to the target.
    let posts = target.posts_to("categories").await;
    let backend = posts.iter().find(|p| p["name"] == "Backend").unwrap();
    let api = posts.iter().find(|p| p["name"] == "API").unwrap();
    assert_eq!(backend["parent_id"], Value::Null);
    assert_eq!(api["parent_id"], report["id_map"]["c1"]);
}
