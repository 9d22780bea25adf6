//! Router-level tests for the content endpoints.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use debridge_api::router;
use debridge_application::testing::{FakeDebrid, RecordingAgent};
use debridge_application::AppState;
use debridge_config::AppConfig;
use debridge_domain::TorrentId;

const API_KEY: &str = "secret";

fn app(debrid: FakeDebrid) -> (Router, AppState, Arc<FakeDebrid>) {
    let mut config = AppConfig::default();
    config.api.api_key = API_KEY.to_string();

    let debrid = Arc::new(debrid);
    let state = AppState::new(config, debrid.clone(), Arc::new(RecordingAgent::new()));
    (router(state.clone()), state, debrid)
}

fn post_content(body: &str, auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/v1/content")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn health_does_not_require_api_key() {
    let (app, _, _) = app(FakeDebrid::new());

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({"status": "ok"}));
}

#[tokio::test]
async fn accepted_submission_echoes_body_and_watches_torrent() {
    let (app, state, debrid) = app(FakeDebrid::new().with_submission_id("T1"));
    let body = r#"{"magnet_url": "magnet:?xt=urn:btih:abc", "path": "/movies", "label": "x"}"#;

    let response = app
        .oneshot(post_content(body, Some(API_KEY)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({"magnet_url": "magnet:?xt=urn:btih:abc", "path": "/movies", "label": "x"})
    );
    assert_eq!(debrid.submit_calls(), 1);
    assert_eq!(
        state.watch_store.destination_of(&TorrentId::new("T1")),
        Some("/movies".to_string())
    );
}

#[tokio::test]
async fn body_is_parsed_whatever_the_content_type() {
    let (app, state, _) = app(FakeDebrid::new().with_submission_id("T1"));
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/content")
        .header(header::CONTENT_TYPE, "text/plain")
        .header(header::AUTHORIZATION, API_KEY)
        .body(Body::from(r#"{"magnet_url": "magnet:?xt=abc", "path": "/tv"}"#))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(state.watch_store.len(), 1);
}

#[tokio::test]
async fn missing_magnet_is_rejected_without_remote_call() {
    let (app, state, debrid) = app(FakeDebrid::new().with_submission_id("T1"));

    let response = app
        .oneshot(post_content(r#"{"path": "/movies"}"#, Some(API_KEY)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({"Error": "magnet_url is missing from post."})
    );
    assert_eq!(debrid.submit_calls(), 0);
    assert!(state.watch_store.is_empty());
}

#[tokio::test]
async fn missing_path_is_rejected() {
    let (app, state, debrid) = app(FakeDebrid::new().with_submission_id("T1"));

    let response = app
        .oneshot(post_content(r#"{"magnet_url": "magnet:?xt=abc"}"#, Some(API_KEY)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({"Error": "Path is missing from post."})
    );
    assert_eq!(debrid.submit_calls(), 0);
    assert!(state.watch_store.is_empty());
}

#[tokio::test]
async fn remote_refusal_maps_to_expectation_failed() {
    let (app, state, _) = app(FakeDebrid::new().with_submission_failure(503, "service_unavailable"));

    let response = app
        .oneshot(post_content(
            r#"{"magnet_url": "magnet:?xt=abc", "path": "/movies"}"#,
            Some(API_KEY),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::EXPECTATION_FAILED);
    assert_eq!(
        json_body(response).await,
        json!({"Error": "Error in sending magnet link to RD. Code: 503, Text: service_unavailable"})
    );
    assert!(state.watch_store.is_empty());
}

#[tokio::test]
async fn missing_or_wrong_api_key_is_unauthorized() {
    for auth in [None, Some("wrong"), Some("Bearer secret")] {
        let (app, state, debrid) = app(FakeDebrid::new().with_submission_id("T1"));

        let response = app
            .oneshot(post_content(
                r#"{"magnet_url": "magnet:?xt=abc", "path": "/movies"}"#,
                auth,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            json_body(response).await,
            json!({"Error": "Authentication Failed"})
        );
        assert_eq!(debrid.submit_calls(), 0);
        assert!(state.watch_store.is_empty());
    }
}

#[tokio::test]
async fn watch_list_returns_snapshot() {
    let (app, state, _) = app(FakeDebrid::new());
    state.watch_store.insert(TorrentId::new("T1"), "/movies");
    state.watch_store.insert(TorrentId::new("T2"), "/tv");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/content/all")
                .header(header::AUTHORIZATION, API_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({"T1": "/movies", "T2": "/tv"})
    );
}

#[tokio::test]
async fn watch_list_requires_api_key() {
    let (app, _, _) = app(FakeDebrid::new());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/content/all")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn openapi_document_lists_content_routes() {
    let (app, _, _) = app(FakeDebrid::new());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api-doc/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let doc = json_body(response).await;
    assert!(doc["paths"]["/api/v1/content"].is_object());
    assert!(doc["paths"]["/api/v1/content/all"].is_object());
}
