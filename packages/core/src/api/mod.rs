//! HTTP API: shared state, router assembly and request helpers.

pub mod dashboard;
pub mod headers;
pub mod health;
pub mod history;
pub mod ingest;
pub mod map;
pub mod records;
pub mod reports;
pub mod vehicles;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::FromRef,
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use chrono::NaiveDate;
use tokio::sync::{Mutex, RwLock};
use tower_http::cors::{Any, CorsLayer};

use crate::cache::TtlCache;
use crate::error::AppError;
use crate::metrics::{metrics_handler, track_http_metrics, AppMetrics};
use crate::repository::GpsRepository;
use crate::store::FleetStore;
use crate::telemetry::{
    AggregatorConfig, EfficiencyPolicy, ReportSource, TelemetryProvider, VehicleProfile,
};

use self::headers::CachedJson;
use self::vehicles::VehicleMileage;

/// Longest report range accepted, in days.
pub const MAX_RANGE_DAYS: i64 = 366;

/// Identifies one cached mileage report.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReportKey {
    pub vehicle: String,
    pub source: ReportSource,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn TelemetryProvider + Send + Sync>,
    pub repository: Arc<GpsRepository>,
    pub fleet_store: Arc<RwLock<FleetStore>>,
    pub metrics: Arc<AppMetrics>,
    pub efficiency: Arc<dyn EfficiencyPolicy>,
    pub aggregator: AggregatorConfig,
    pub report_cache: Arc<Mutex<TtlCache<ReportKey, CachedJson>>>,
    pub vehicle_mileage_cache: Arc<Mutex<TtlCache<(NaiveDate, NaiveDate), Vec<VehicleMileage>>>>,
    pub cache_ttl: Duration,
}

impl AppState {
    pub fn new(
        provider: Arc<dyn TelemetryProvider + Send + Sync>,
        repository: Arc<GpsRepository>,
        fleet_store: Arc<RwLock<FleetStore>>,
        metrics: Arc<AppMetrics>,
        efficiency: Arc<dyn EfficiencyPolicy>,
        aggregator: AggregatorConfig,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            provider,
            repository,
            fleet_store,
            metrics,
            efficiency,
            aggregator,
            report_cache: Arc::new(Mutex::new(TtlCache::new(cache_ttl))),
            vehicle_mileage_cache: Arc::new(Mutex::new(TtlCache::new(cache_ttl))),
            cache_ttl,
        }
    }

    /// Stored profile for `plate`, or the default one when none exists.
    pub async fn profile_for_plate(&self, plate: &str) -> Result<VehicleProfile, AppError> {
        Ok(self
            .repository
            .get_profile(plate)
            .await?
            .unwrap_or_else(|| VehicleProfile::unregistered(plate)))
    }
}

impl FromRef<AppState> for Arc<AppMetrics> {
    fn from_ref(state: &AppState) -> Self {
        state.metrics.clone()
    }
}

/// Assemble every route with CORS and request metrics.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/metrics", get(metrics_handler))
        .route("/dashboard", get(dashboard::dashboard))
        .route("/api/gps-data", post(ingest::receive_gps_data))
        .route("/vehicles", get(vehicles::list_vehicles))
        .route("/vehicles/profiles", get(vehicles::list_profiles))
        .route("/vehicles/profiles/:plate", put(vehicles::upsert_profile))
        .route("/records", get(records::search_records))
        .route("/map", get(map::map_view))
        .route("/history", get(history::provider_history))
        .route("/reports/mileage", get(reports::mileage_report))
        .route_layer(from_fn_with_state(state.metrics.clone(), track_http_metrics))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Parse a `YYYY-MM-DD` query value.
pub(crate) fn parse_date(field: &str, value: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest(format!("{} must be a date in YYYY-MM-DD format", field)))
}

/// Reject reversed or oversized ranges.
pub(crate) fn validate_range(start: NaiveDate, end: NaiveDate) -> Result<(), AppError> {
    if start > end {
        return Err(AppError::BadRequest(format!(
            "start date {} is after end date {}",
            start, end
        )));
    }
    let days = (end - start).num_days() + 1;
    if days > MAX_RANGE_DAYS {
        return Err(AppError::BadRequest(format!(
            "range of {} days exceeds the maximum of {}",
            days, MAX_RANGE_DAYS
        )));
    }
    Ok(())
}
