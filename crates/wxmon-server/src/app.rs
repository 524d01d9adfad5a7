use crate::state::AppState;
use crate::{api, logging, openapi};
use axum::middleware;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "wxmon API",
        description = "Weather alert consumer: health, status, rules and test injection",
    ),
    tags(
        (name = "Health", description = "Liveness"),
        (name = "Status", description = "Dispatch loop counters"),
        (name = "Rules", description = "Registered alert rules"),
        (name = "Metrics", description = "Prometheus scrape"),
        (name = "Test", description = "Test injection")
    )
)]
struct ApiDoc;

pub fn build_http_app(state: AppState) -> Router {
    let (public_router, public_spec) = api::public_routes().split_for_parts();
    let (test_router, test_spec) = api::test_routes().split_for_parts();

    let mut merged_spec = ApiDoc::openapi();
    merged_spec.merge(public_spec);
    merged_spec.merge(test_spec);
    let spec = Arc::new(merged_spec);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    public_router
        .merge(test_router)
        .with_state(state)
        .merge(openapi::json_route(spec))
        .layer(cors)
        .layer(middleware::from_fn(logging::request_logging))
}
