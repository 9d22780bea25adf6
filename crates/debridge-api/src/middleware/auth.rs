use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use debridge_application::AppState;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::handlers::content::ErrorResponse;

/// Shared-secret middleware: the `Authorization` header must equal the configured API key.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let provided = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    match provided {
        Some(key) if key_matches(key, &state.config.api.api_key) => {
            debug!(target: "auth", path = %request.uri().path(), "request authenticated");
            next.run(request).await
        }
        Some(_) => {
            warn!(target: "auth", path = %request.uri().path(), "rejected request with invalid API key");
            unauthorized()
        }
        None => {
            warn!(target: "auth", path = %request.uri().path(), "rejected request without API key");
            unauthorized()
        }
    }
}

fn key_matches(provided: &str, expected: &str) -> bool {
    !expected.is_empty() && bool::from(provided.as_bytes().ct_eq(expected.as_bytes()))
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::new("Authentication Failed")),
    )
        .into_response()
}
