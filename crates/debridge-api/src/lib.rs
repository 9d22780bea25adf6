pub mod handlers;
pub mod middleware;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Json, Router,
};
use debridge_application::AppState;
use handlers::content::{
    list_content, submit_content, ContentRequest, ErrorResponse, WatchListResponse,
    __path_list_content, __path_submit_content,
};
use middleware::auth::require_api_key;
use serde::Serialize;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(Serialize, utoipa::ToSchema)]
struct HealthResponse {
    status: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    ),
    tag = "system"
)]
#[allow(dead_code)]
async fn health() -> Json<HealthResponse> {
    health_handler().await
}

#[derive(OpenApi)]
#[openapi(
    paths(health, submit_content, list_content),
    components(schemas(HealthResponse, ContentRequest, ErrorResponse, WatchListResponse)),
    tags(
        (name = "system", description = "System health and status endpoints"),
        (name = "content", description = "Magnet submission and watch list endpoints")
    ),
    info(
        title = "debridge API",
        version = "0.1.0",
        description = "Bridge from magnet links through Real-Debrid to JDownloader",
    )
)]
struct ApiDoc;

pub fn router(state: AppState) -> Router {
    info!(target: "api", "building router");

    let api_v1 = Router::new()
        .route("/content", post(submit_content))
        .route("/content/all", get(list_content))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    let openapi = ApiDoc::openapi();

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api/v1", api_v1)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", openapi))
        .with_state(state)
}
