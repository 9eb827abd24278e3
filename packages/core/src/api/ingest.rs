//! `POST /api/gps-data`: push endpoint called by the GPS provider.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use super::AppState;
use crate::error::AppError;
use crate::repository::GpsPush;

pub async fn receive_gps_data(
    State(state): State<AppState>,
    payload: Result<Json<GpsPush>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let Json(push) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

    let identified = [&push.vehicle_number, &push.vehicle_id]
        .iter()
        .any(|field| field.as_deref().is_some_and(|v| !v.trim().is_empty()));
    if !identified {
        return Err(AppError::BadRequest(
            "VehicleNumber or VehicleId is required".to_string(),
        ));
    }

    let id = state.repository.insert_push(&push).await?;
    state.metrics.pushes_received_total.inc();
    tracing::debug!(
        "Stored GPS push {} for {}",
        id,
        push.vehicle_number.as_deref().unwrap_or("-")
    );

    Ok((StatusCode::OK, Json(json!({ "message": "Data saved", "id": id }))))
}
