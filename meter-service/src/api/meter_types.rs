use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use meter_client::{
    db::MeterTypeStore,
    domain::{MeterType, NewMeterType},
};

use super::{ApiError, AppState};

pub(super) async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Vec<MeterType>>, ApiError> {
    Ok(Json(state.store.list_meter_types().await?))
}

pub(super) async fn create(
    State(state): State<Arc<AppState>>,
    body: Result<Json<NewMeterType>, JsonRejection>,
) -> Result<(StatusCode, Json<MeterType>), ApiError> {
    let Json(new) = body?;
    new.check()?;
    let meter_type = state.store.create_meter_type(new).await?;
    tracing::info!(meter_type_id = %meter_type.id, name = %meter_type.name, "meter type created");
    Ok((StatusCode::CREATED, Json(meter_type)))
}
