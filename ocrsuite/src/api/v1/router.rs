use axum::{
    routing::{get, post},
    Router,
};

use crate::api::state::AppState;

use super::handlers;

pub fn v1_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/openapi.json", get(super::openapi::openapi_json))
        .route("/ocr", post(handlers::ocr::recognize))
        .route("/samplers:reload", post(handlers::samplers::reload_samplers))
        .route(
            "/engines/enhanced:reset",
            post(handlers::engines::reset_enhanced),
        )
}
