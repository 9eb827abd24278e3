//! `GET /dashboard`: fleet counts plus the most recent pushes.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::AppState;
use crate::error::AppError;
use crate::repository::GpsRecord;

const LATEST_PUSHES: i64 = 5;

#[derive(Debug, Serialize)]
pub struct LatestPush {
    pub plate: Option<String>,
    pub speed: Option<f64>,
    pub engine: Option<String>,
    pub datetime_utc: Option<String>,
}

impl From<GpsRecord> for LatestPush {
    fn from(record: GpsRecord) -> Self {
        Self {
            plate: record.vehicle_number,
            speed: record.speed,
            engine: record.engine,
            datetime_utc: record.datetime_utc,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub total_vehicles: usize,
    pub moving: usize,
    pub stopped: usize,
    /// `None` until the first successful provider poll.
    pub fleet_refreshed_at: Option<DateTime<Utc>>,
    pub stored_pushes: i64,
    pub latest_pushes: Vec<LatestPush>,
}

pub async fn dashboard(State(state): State<AppState>) -> Result<Json<DashboardResponse>, AppError> {
    let (counts, fleet_refreshed_at) = {
        let store = state.fleet_store.read().await;
        (store.counts(), store.refreshed_at())
    };

    let stored_pushes = state.repository.count_pushes().await?;
    let latest_pushes = state
        .repository
        .latest(LATEST_PUSHES)
        .await?
        .into_iter()
        .map(LatestPush::from)
        .collect();

    Ok(Json(DashboardResponse {
        total_vehicles: counts.total,
        moving: counts.moving,
        stopped: counts.stopped,
        fleet_refreshed_at,
        stored_pushes,
        latest_pushes,
    }))
}
