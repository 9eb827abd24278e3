//! Vehicle endpoints: provider vehicle list with recent mileage, and the
//! fuel profiles that drive the efficiency policy.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Json,
};
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::AppError;
use crate::telemetry::report::total_mileage_km;
use crate::telemetry::{FuelCategory, TelemetryProvider, VehicleProfile};

/// Days covered by `/vehicles` when `days` is not given.
pub const DEFAULT_MILEAGE_DAYS: i64 = 7;
pub const MAX_MILEAGE_DAYS: i64 = 31;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VehicleMileage {
    pub imei: Option<String>,
    pub plate: String,
    pub mileage_km: f64,
}

#[derive(Debug, Deserialize)]
pub struct VehiclesQuery {
    pub days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct VehiclesResponse {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub vehicles: Vec<VehicleMileage>,
}

/// `GET /vehicles?days=N`: every provider vehicle with its mileage over the
/// last N days (today inclusive).
pub async fn list_vehicles(
    State(state): State<AppState>,
    Query(params): Query<VehiclesQuery>,
) -> Result<Json<VehiclesResponse>, AppError> {
    let days = params.days.unwrap_or(DEFAULT_MILEAGE_DAYS);
    if !(1..=MAX_MILEAGE_DAYS).contains(&days) {
        return Err(AppError::BadRequest(format!(
            "days must be between 1 and {}",
            MAX_MILEAGE_DAYS
        )));
    }

    let end = Utc::now().date_naive();
    let start = end - Duration::days(days - 1);

    if let Some(vehicles) = state.vehicle_mileage_cache.lock().await.get(&(start, end)) {
        return Ok(Json(VehiclesResponse { start, end, vehicles }));
    }

    let vehicles = collect_mileage(state.provider.as_ref(), start, end).await?;
    state
        .vehicle_mileage_cache
        .lock()
        .await
        .insert((start, end), vehicles.clone());

    Ok(Json(VehiclesResponse { start, end, vehicles }))
}

/// A failed mileage lookup for one vehicle reports zero for that vehicle;
/// only a failed vehicle list fails the whole request.
async fn collect_mileage(
    provider: &(dyn TelemetryProvider + Send + Sync),
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<VehicleMileage>, AppError> {
    let listed = provider.list_vehicles().await?;
    let mut vehicles = Vec::with_capacity(listed.len());

    for vehicle in listed {
        let mileage_km = match vehicle.imei.as_deref() {
            Some(imei) => match provider.fetch_mileage(imei, start, end).await {
                Ok(records) => total_mileage_km(&records),
                Err(err) => {
                    tracing::warn!("Mileage lookup failed for {}: {}", imei, err);
                    0.0
                }
            },
            None => 0.0,
        };

        vehicles.push(VehicleMileage {
            plate: vehicle.display_plate(),
            imei: vehicle.imei,
            mileage_km,
        });
    }

    Ok(vehicles)
}

/// `GET /vehicles/profiles`
pub async fn list_profiles(
    State(state): State<AppState>,
) -> Result<Json<Vec<VehicleProfile>>, AppError> {
    Ok(Json(state.repository.list_profiles().await?))
}

#[derive(Debug, Deserialize)]
pub struct ProfileRequest {
    pub imei: Option<String>,
    pub fuel_type: Option<String>,
    pub efficiency_km_per_liter: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub profile: VehicleProfile,
    /// Efficiency the active policy resolves for this profile.
    pub resolved_efficiency_km_per_liter: f64,
    pub policy: String,
}

/// `PUT /vehicles/profiles/:plate`
pub async fn upsert_profile(
    State(state): State<AppState>,
    Path(plate): Path<String>,
    payload: Result<Json<ProfileRequest>, JsonRejection>,
) -> Result<Json<ProfileResponse>, AppError> {
    let Json(body) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

    let plate = plate.trim().to_string();
    if plate.is_empty() {
        return Err(AppError::BadRequest("plate must not be empty".to_string()));
    }

    let fuel_type = match body.fuel_type.as_deref() {
        Some(raw) => raw.parse::<FuelCategory>().map_err(AppError::BadRequest)?,
        None => FuelCategory::default(),
    };

    if let Some(value) = body.efficiency_km_per_liter {
        if !value.is_finite() || value <= 0.0 {
            return Err(AppError::BadRequest(
                "efficiency_km_per_liter must be a positive number".to_string(),
            ));
        }
    }

    let profile = VehicleProfile {
        plate,
        imei: body.imei.filter(|imei| !imei.trim().is_empty()),
        fuel_type,
        efficiency_km_per_liter: body.efficiency_km_per_liter,
    };
    state.repository.upsert_profile(&profile).await?;

    // Cached reports may embed the old efficiency.
    state.report_cache.lock().await.clear();

    tracing::info!(
        "Vehicle profile {} saved ({}, {:?} km/l)",
        profile.plate,
        profile.fuel_type.as_str(),
        profile.efficiency_km_per_liter
    );

    Ok(Json(ProfileResponse {
        resolved_efficiency_km_per_liter: state.efficiency.resolve_efficiency(&profile),
        policy: state.efficiency.policy_name().to_string(),
        profile,
    }))
}
