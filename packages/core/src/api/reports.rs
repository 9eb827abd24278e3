//! `GET /reports/mileage`: daily mileage, fuel and emissions for one vehicle.
//!
//! Reports are built from locally stored pushes (`source=local`, the
//! default) or from provider history (`source=provider`), cached per
//! (vehicle, source, start, end) for the configured TTL, and served with
//! `ETag` / `Last-Modified` so clients can revalidate with `If-None-Match`.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::Response,
};
use chrono::{Duration, NaiveDate, Utc};
use serde::Deserialize;

use super::headers::CachedJson;
use super::{parse_date, validate_range, AppState, ReportKey};
use crate::error::AppError;
use crate::telemetry::{
    aggregate, summarize, PeriodSummary, ReportSource, ReportSubject, Sample, VehicleProfile,
};

/// Days covered when `start` is omitted, counting `end`.
pub const DEFAULT_REPORT_DAYS: i64 = 7;

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub vehicle: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub source: Option<String>,
}

pub async fn mileage_report(
    State(state): State<AppState>,
    Query(params): Query<ReportQuery>,
    request_headers: HeaderMap,
) -> Result<Response, AppError> {
    let vehicle = params
        .vehicle
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest("vehicle is required".to_string()))?
        .to_string();

    let source = match params.source.as_deref() {
        Some(raw) => raw.parse::<ReportSource>().map_err(AppError::BadRequest)?,
        None => ReportSource::default(),
    };

    let end = match params.end.as_deref() {
        Some(raw) => parse_date("end", raw)?,
        None => Utc::now().date_naive(),
    };
    let start = match params.start.as_deref() {
        Some(raw) => parse_date("start", raw)?,
        None => end - Duration::days(DEFAULT_REPORT_DAYS - 1),
    };
    validate_range(start, end)?;

    let key = ReportKey {
        vehicle: vehicle.clone(),
        source,
        start,
        end,
    };

    let cached = state.report_cache.lock().await.get(&key);
    let report = match cached {
        Some(report) => {
            state.metrics.report_cache_hits_total.inc();
            report
        }
        None => {
            let summary = build_summary(&state, &vehicle, source, start, end).await?;
            let body = serde_json::to_vec(&summary)
                .map_err(|err| AppError::Parse(format!("Failed to encode report: {}", err)))?;
            let report = CachedJson::new(body, Utc::now());

            state.report_cache.lock().await.insert(key, report.clone());
            state
                .metrics
                .reports_generated_total
                .with_label_values(&[source.as_str()])
                .inc();
            tracing::info!(
                "Mileage report for {} ({}, {} to {}): {:?}",
                vehicle,
                source,
                start,
                end,
                summary.totals.status
            );
            report
        }
    };

    Ok(report.into_conditional_response(&request_headers, state.cache_ttl.as_secs()))
}

async fn build_summary(
    state: &AppState,
    vehicle: &str,
    source: ReportSource,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<PeriodSummary, AppError> {
    let (subject, profile, samples) = match source {
        ReportSource::Local => {
            let profile = state.profile_for_plate(vehicle).await?;
            let samples = state.repository.samples_for_plate(vehicle, start, end).await?;
            let subject = ReportSubject {
                vehicle: vehicle.to_string(),
                plate: vehicle.to_string(),
                imei: profile.imei.clone(),
                source,
            };
            (subject, profile, samples)
        }
        ReportSource::Provider => {
            let (imei, known_plate) = resolve_device(state, vehicle).await?;
            let profile = match state.repository.get_profile_by_imei(&imei).await? {
                Some(profile) => profile,
                None => {
                    state
                        .profile_for_plate(known_plate.as_deref().unwrap_or(vehicle))
                        .await?
                }
            };

            // The day before `start` only seeds the odometer baseline.
            let history = state
                .provider
                .fetch_history(&imei, start - Duration::days(1), end)
                .await?;
            let samples: Vec<Sample> = history.iter().map(Sample::from).collect();

            let subject = ReportSubject {
                vehicle: vehicle.to_string(),
                plate: known_plate.unwrap_or_else(|| profile.plate.clone()),
                imei: Some(imei),
                source,
            };
            (subject, profile, samples)
        }
    };

    let efficiency = state.efficiency.resolve_efficiency(&profile);
    let report = aggregate(&samples, start, end, efficiency, &state.aggregator);
    Ok(summarize(subject, &profile, efficiency, report))
}

/// Map the caller's vehicle reference (plate or IMEI) to a device IMEI and,
/// when known, its plate.
async fn resolve_device(
    state: &AppState,
    vehicle: &str,
) -> Result<(String, Option<String>), AppError> {
    {
        let fleet = state.fleet_store.read().await;
        if let Some(found) = fleet.find_by_plate(vehicle) {
            if let Some(imei) = &found.imei {
                return Ok((imei.clone(), Some(vehicle.to_string())));
            }
        }
        if let Some(found) = fleet.find_by_imei(vehicle) {
            return Ok((vehicle.to_string(), found.plate.clone()));
        }
    }

    let stored: Option<VehicleProfile> = state.repository.get_profile(vehicle).await?;
    if let Some(imei) = stored.and_then(|profile| profile.imei) {
        return Ok((imei, Some(vehicle.to_string())));
    }

    Ok((vehicle.to_string(), None))
}
