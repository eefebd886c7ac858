use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};

use super::{ApiError, AppState};
use crate::validation::{validate_reading, CandidateReading, ValidationResult};

pub(super) async fn validate(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CandidateReading>, JsonRejection>,
) -> Result<Json<ValidationResult>, ApiError> {
    let Json(candidate) = body?;
    let result = validate_reading(&*state.store, &*state.store, &state.policy, &candidate).await?;
    Ok(Json(result))
}
