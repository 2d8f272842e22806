//! In-process REST surface tests via `tower::ServiceExt::oneshot`.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use workgraph::guard::CallContext;
use workgraph::service::CreateProjectInput;
use workgraph::{api, AppState, Config};

fn state() -> AppState {
    AppState::in_memory(Config::default())
}

async fn make_project(state: &AppState, name: &str) -> workgraph::domain::Project {
    state
        .service
        .create_project_with_metadata(
            &CallContext::user("maria"),
            CreateProjectInput {
                name: name.to_string(),
                ..CreateProjectInput::default()
            },
        )
        .await
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = api::create_router(state());
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_capture_state_on_empty_store_is_conflict() {
    let app = api::create_router(state());
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/capture_state?project_id=any")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "bootstrap_required");
    assert!(body["error"]["hint"].as_str().unwrap().contains("create a project"));
}

#[tokio::test]
async fn test_capture_state_returns_bundle() {
    let state = state();
    let project = make_project(&state, "Roadmap").await;
    let app = api::create_router(state);

    let uri = format!("/api/v1/capture_state?project_id={}", project.id);
    let response = app
        .oneshot(Request::builder().uri(&uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["goal_overview"]["name"], "Roadmap");
    assert_eq!(body["state_hash"].as_str().unwrap().len(), 64);
    assert_eq!(body["scope_path"][0]["scope_type"], "project");
}

#[tokio::test]
async fn test_attention_raise_list_resolve_flow() {
    let state = state();
    let project = make_project(&state, "Roadmap").await;
    let app = api::create_router(state);

    let raise = post_json(
        "/api/v1/attention/items",
        &json!({
            "project_id": project.id,
            "kind": "blocker",
            "summary": "Vendor is down",
            "requires_user_action": true
        }),
    );
    let response = app.clone().oneshot(raise).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let item = body_json(response).await;
    assert_eq!(item["state"], "open");
    assert_eq!(item["scope_type"], "project");
    let item_id = item["id"].as_str().unwrap().to_string();

    let list_uri = format!(
        "/api/v1/attention/items?project_id={}&state=open",
        project.id
    );
    let response = app
        .clone()
        .oneshot(Request::builder().uri(&list_uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let items = body_json(response).await;
    assert_eq!(items.as_array().unwrap().len(), 1);

    let resolve_uri = format!("/api/v1/attention/items/{item_id}/resolve");
    let response = app
        .clone()
        .oneshot(post_json(&resolve_uri, &json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let resolved = body_json(response).await;
    assert_eq!(resolved["state"], "resolved");

    let response = app
        .oneshot(Request::builder().uri(&list_uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let items = body_json(response).await;
    assert!(items.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_body_field_is_rejected() {
    let state = state();
    let project = make_project(&state, "Roadmap").await;
    let app = api::create_router(state);

    let raise = post_json(
        "/api/v1/attention/items",
        &json!({
            "project_id": project.id,
            "kind": "blocker",
            "summary": "x",
            "surprise": true
        }),
    );
    let response = app.oneshot(raise).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "invalid_request");
}

#[tokio::test]
async fn test_missing_summary_is_client_error() {
    let state = state();
    let project = make_project(&state, "Roadmap").await;
    let app = api::create_router(state);

    let raise = post_json(
        "/api/v1/attention/items",
        &json!({
            "project_id": project.id,
            "kind": "blocker"
        }),
    );
    let response = app.oneshot(raise).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "invalid_request");
}

#[tokio::test]
async fn test_guardrail_failure_maps_to_conflict() {
    let state = state();
    let project = make_project(&state, "Roadmap").await;
    let app = api::create_router(state);

    // an agent actor with no usable lease
    let raise = post_json(
        "/api/v1/attention/items",
        &json!({
            "project_id": project.id,
            "kind": "blocker",
            "summary": "agent raised",
            "actor": {
                "actor_type": "agent",
                "agent_name": "w-1",
                "agent_instance_id": "w-1-a",
                "lease_token": "bogus"
            }
        }),
    );
    let response = app.oneshot(raise).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "guardrail_failed");
    assert_eq!(body["error"]["context"]["rule"], "lease_invalid");
}

#[tokio::test]
async fn test_system_actor_tuple_is_rejected() {
    let state = state();
    let project = make_project(&state, "Roadmap").await;
    let app = api::create_router(state);

    let raise = post_json(
        "/api/v1/attention/items",
        &json!({
            "project_id": project.id,
            "kind": "blocker",
            "summary": "self-declared system",
            "actor": {"actor_type": "system"}
        }),
    );
    let response = app.oneshot(raise).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "invalid_request");
}

#[tokio::test]
async fn test_resolve_missing_item_is_not_found() {
    let state = state();
    make_project(&state, "Roadmap").await;
    let app = api::create_router(state);

    let uri = format!(
        "/api/v1/attention/items/{}/resolve",
        uuid::Uuid::new_v4()
    );
    let response = app.oneshot(post_json(&uri, &json!({}))).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "not_found");
}
