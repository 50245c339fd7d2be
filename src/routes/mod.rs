use std::sync::Arc;

use axum::{
    http::{Method, StatusCode},
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    middleware::{make_span_with_request_id, request_id_middleware},
    services::{home_feed::HomeFeedConfig, CatalogService},
};

pub mod catalog;
pub mod continue_watching;
pub mod home;
pub mod titles;

/// Shared, read-only application state
pub struct AppState {
    pub catalog: CatalogService,
    pub feed: HomeFeedConfig,
}

impl AppState {
    pub fn new(catalog: CatalogService, feed: HomeFeedConfig) -> Self {
        Self { catalog, feed }
    }
}

/// Creates the application router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
                .layer(cors),
        )
}

/// API routes under /api/v1
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/catalog", get(catalog::list))
        .route("/titles/:id", get(titles::get_title))
        .route("/continue-watching", post(continue_watching::collapse))
        .route("/home", post(home::home_rows))
        .route("/calendar", post(home::calendar_rows))
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
