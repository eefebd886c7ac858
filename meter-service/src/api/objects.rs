use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use meter_client::{
    db::ObjectStore,
    domain::{MeterObject, NewMeterObject},
};
use serde_json::{json, Value};

use super::{ApiError, AppState};

pub(super) async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Vec<MeterObject>>, ApiError> {
    Ok(Json(state.store.list_objects().await?))
}

pub(super) async fn create(
    State(state): State<Arc<AppState>>,
    body: Result<Json<NewMeterObject>, JsonRejection>,
) -> Result<(StatusCode, Json<MeterObject>), ApiError> {
    let Json(new) = body?;
    new.check()?;
    let object = state.store.create_object(new).await?;
    tracing::info!(object_id = %object.id, "object created");
    Ok((StatusCode::CREATED, Json(object)))
}

pub(super) async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Result<Json<NewMeterObject>, JsonRejection>,
) -> Result<Json<MeterObject>, ApiError> {
    let Json(update) = body?;
    update.check()?;
    state
        .store
        .update_object(&id, update)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("Object"))
}

pub(super) async fn delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if !state.store.delete_object(&id).await? {
        return Err(ApiError::NotFound("Object"));
    }
    tracing::info!(object_id = %id, "object deleted");
    Ok(Json(json!({ "success": true })))
}
