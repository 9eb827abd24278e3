//! `GET /history`: raw position history straight from the GPS provider.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{parse_date, validate_range, AppState};
use crate::error::AppError;
use crate::telemetry::position::{classify_position, parse_engine, PositionKind};
use crate::telemetry::provider::HistoryRecord;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub imei: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HistoryRow {
    #[serde(flatten)]
    pub record: HistoryRecord,
    pub kind: PositionKind,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub imei: String,
    pub plate: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub count: usize,
    pub records: Vec<HistoryRow>,
}

fn required<'a>(value: &'a Option<String>) -> Option<&'a str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub async fn provider_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, AppError> {
    let (Some(imei), Some(start_raw), Some(end_raw)) = (
        required(&params.imei),
        required(&params.start_date),
        required(&params.end_date),
    ) else {
        return Err(AppError::BadRequest(
            "imei, start_date and end_date are required".to_string(),
        ));
    };

    let start_date = parse_date("start_date", start_raw)?;
    let end_date = parse_date("end_date", end_raw)?;
    validate_range(start_date, end_date)?;

    let records = state
        .provider
        .fetch_history(imei, start_date, end_date)
        .await?;

    let plate = state
        .fleet_store
        .read()
        .await
        .find_by_imei(imei)
        .and_then(|vehicle| vehicle.plate.clone());

    let rows: Vec<HistoryRow> = records
        .into_iter()
        .map(|record| HistoryRow {
            kind: classify_position(record.engine.as_deref().and_then(parse_engine), record.speed),
            record,
        })
        .collect();

    Ok(Json(HistoryResponse {
        imei: imei.to_string(),
        plate,
        start_date,
        end_date,
        count: rows.len(),
        records: rows,
    }))
}
