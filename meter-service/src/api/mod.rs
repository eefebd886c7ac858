//! HTTP surface: CRUD over objects, meter types and readings, plus the
//! validation and model-backed endpoints.
//!
//! Errors render as `{"error": ..., "details"?: ...}` with the status code
//! chosen by [`ApiError`].

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, MatchedPath, Request},
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
    Json, Router,
};
use meter_client::db::Store;
use serde_json::{json, Value};

use crate::{gemini::ContentGenerator, validation::ValidationPolicy};

mod assist;
mod error;
mod meter_types;
mod objects;
mod readings;
mod validate;

pub use assist::API_KEY_HEADER;
pub use error::{ApiError, ErrorBody};

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub generator: Arc<dyn ContentGenerator>,
    pub policy: ValidationPolicy,
    pub max_image_bytes: usize,
    pub letter_language: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    // base64 inflates the photo by a third; leave room for the JSON around it
    let body_limit = state.max_image_bytes * 2;

    Router::new()
        .route("/health", get(health))
        .route("/api/objects", get(objects::list).post(objects::create))
        .route("/api/objects/:id", put(objects::update).delete(objects::delete))
        .route("/api/meter-types", get(meter_types::list).post(meter_types::create))
        .route("/api/readings", get(readings::list).post(readings::create))
        .route("/api/validate", post(validate::validate))
        .route("/api/extract", post(assist::extract))
        .route("/api/generate-email", post(assist::generate_email))
        .route_layer(middleware::from_fn(track_requests))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn track_requests(req: Request, next: Next) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_default();
    let method = req.method().to_string();

    let response = next.run(req).await;

    metrics::counter!(
        "http_requests_total",
        "route" => route,
        "method" => method,
        "status" => response.status().as_u16().to_string()
    )
    .increment(1);
    response
}
