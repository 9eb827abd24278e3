//! `GET /records`: browse stored pushes with per-row fuel estimates.

use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::AppError;
use crate::repository::{GpsRecord, RecordFilter, SortOrder, RECORDS_PAGE_SIZE};
use crate::telemetry::aggregator::{per_vehicle_record_fuel, RecordReading};
use crate::telemetry::position::parse_engine;
use crate::telemetry::VehicleProfile;

#[derive(Debug, Default, Deserialize)]
pub struct RecordsQuery {
    pub plate: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub sort: Option<String>,
    pub page: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct RecordRow {
    #[serde(flatten)]
    pub record: GpsRecord,
    pub fuel_used: f64,
}

#[derive(Debug, Serialize)]
pub struct RecordsResponse {
    pub records: Vec<RecordRow>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub total_pages: i64,
    /// Every plate with stored data, for the filter dropdown.
    pub plates: Vec<String>,
}

pub async fn search_records(
    State(state): State<AppState>,
    Query(params): Query<RecordsQuery>,
) -> Result<Json<RecordsResponse>, AppError> {
    let sort = match params.sort.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => raw.parse::<SortOrder>().map_err(AppError::BadRequest)?,
        None => SortOrder::default(),
    };

    let mut filter = RecordFilter {
        plate: params.plate,
        start_time: params.start_time,
        end_time: params.end_time,
        sort,
        page: 1,
    };

    let total = state.repository.count_matching(&filter).await?;
    let total_pages = ((total + RECORDS_PAGE_SIZE - 1) / RECORDS_PAGE_SIZE).max(1);
    filter.page = params.page.unwrap_or(1).clamp(1, total_pages);

    let records = state.repository.search(&filter).await?;
    let profiles: HashMap<String, VehicleProfile> = state
        .repository
        .list_profiles()
        .await?
        .into_iter()
        .map(|profile| (profile.plate.clone(), profile))
        .collect();

    let readings: Vec<(Option<&str>, RecordReading)> = records
        .iter()
        .map(|record| {
            let plate = record.vehicle_number.clone().unwrap_or_default();
            let efficiency = match profiles.get(&plate) {
                Some(profile) => state.efficiency.resolve_efficiency(profile),
                None => state
                    .efficiency
                    .resolve_efficiency(&VehicleProfile::unregistered(plate)),
            };
            let reading = RecordReading {
                odometer: record.odometer,
                engine_on: record.engine.as_deref().and_then(parse_engine),
                efficiency_km_per_liter: efficiency,
            };
            (record.vehicle_number.as_deref(), reading)
        })
        .collect();

    let fuel = per_vehicle_record_fuel(&readings);
    let rows = records
        .into_iter()
        .zip(fuel)
        .map(|(record, fuel_used)| RecordRow { record, fuel_used })
        .collect();

    Ok(Json(RecordsResponse {
        records: rows,
        page: filter.page,
        per_page: RECORDS_PAGE_SIZE,
        total,
        total_pages,
        plates: state.repository.distinct_plates().await?,
    }))
}
