use std::collections::BTreeMap;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use debridge_application::{AppState, SubmissionError};
use debridge_realdebrid::DebridError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use utoipa::ToSchema;

/// Magnet submission body. Extra fields are accepted and echoed back.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct ContentRequest {
    pub magnet_url: String,
    pub path: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    #[serde(rename = "Error")]
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Destination path of every watched torrent, keyed by torrent id.
#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct WatchListResponse(pub BTreeMap<String, String>);

/// Submit a magnet link to the debrid service and watch it for completion.
///
/// The body is read as JSON whatever the content type says.
#[utoipa::path(
    post,
    path = "/api/v1/content",
    request_body = ContentRequest,
    responses(
        (status = 200, description = "Magnet accepted; the submitted body is echoed", body = ContentRequest),
        (status = 400, description = "A required field is missing", body = ErrorResponse),
        (status = 401, description = "Missing or invalid API key", body = ErrorResponse),
        (status = 417, description = "The debrid service refused the magnet", body = ErrorResponse)
    ),
    tag = "content"
)]
pub async fn submit_content(State(state): State<AppState>, body: Bytes) -> Response {
    let payload = parse_lenient(&body);
    let magnet_url = string_field(&payload, "magnet_url");
    let path = string_field(&payload, "path");

    match state.submissions.submit(magnet_url, path).await {
        Ok(id) => {
            info!(target: "api", %id, %path, "magnet submission accepted");
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(SubmissionError::Validation(field)) => {
            warn!(target: "api", ?field, "rejected incomplete submission");
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(field.message())),
            )
                .into_response()
        }
        Err(SubmissionError::Remote(err)) => (
            StatusCode::EXPECTATION_FAILED,
            Json(ErrorResponse::new(remote_failure_message(&err))),
        )
            .into_response(),
    }
}

/// List every torrent currently being watched.
#[utoipa::path(
    get,
    path = "/api/v1/content/all",
    responses(
        (status = 200, description = "Watched torrents and their destination paths", body = WatchListResponse),
        (status = 401, description = "Missing or invalid API key", body = ErrorResponse)
    ),
    tag = "content"
)]
pub async fn list_content(State(state): State<AppState>) -> impl IntoResponse {
    Json(WatchListResponse(state.watch_store.snapshot()))
}

/// Anything that is not a JSON document is treated as an empty object.
fn parse_lenient(body: &[u8]) -> Value {
    match serde_json::from_slice::<Value>(body) {
        Ok(value) => value,
        Err(err) => {
            warn!(target: "api", error = %err, "submission body is not valid JSON");
            Value::Object(Default::default())
        }
    }
}

fn string_field<'a>(payload: &'a Value, name: &str) -> &'a str {
    payload.get(name).and_then(Value::as_str).unwrap_or_default()
}

fn remote_failure_message(err: &DebridError) -> String {
    match err {
        DebridError::Submission { .. } => err.to_string(),
        _ => "Error in sending magnet link to RD.".to_string(),
    }
}
