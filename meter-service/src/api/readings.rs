use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    Json,
};
use meter_client::{
    db::{ReadingFilter, ReadingStore},
    domain::{MeterReading, NewMeterReading},
};
use serde::Deserialize;

use super::{ApiError, AppState};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ReadingsQuery {
    object_id: Option<String>,
    meter_type_id: Option<String>,
}

impl From<ReadingsQuery> for ReadingFilter {
    fn from(q: ReadingsQuery) -> Self {
        // `?objectId=` filters nothing
        ReadingFilter {
            object_id: q.object_id.filter(|s| !s.is_empty()),
            meter_type_id: q.meter_type_id.filter(|s| !s.is_empty()),
        }
    }
}

pub(super) async fn list(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ReadingsQuery>, QueryRejection>,
) -> Result<Json<Vec<MeterReading>>, ApiError> {
    let Query(query) = query?;
    let filter = ReadingFilter::from(query);
    Ok(Json(state.store.list_readings(&filter).await?))
}

pub(super) async fn create(
    State(state): State<Arc<AppState>>,
    body: Result<Json<NewMeterReading>, JsonRejection>,
) -> Result<(StatusCode, Json<MeterReading>), ApiError> {
    let Json(new) = body?;
    new.check()?;
    let reading = state.store.create_reading(new).await?;
    tracing::info!(
        reading_id = %reading.id,
        object_id = %reading.object_id,
        date = %reading.date,
        status = %reading.validation_status,
        "reading saved"
    );
    Ok((StatusCode::CREATED, Json(reading)))
}
