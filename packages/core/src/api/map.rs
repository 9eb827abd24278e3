//! `GET /map`: latest stored positions, classified for map markers.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::AppError;
use crate::repository::GpsRecord;
use crate::telemetry::position::{bounds, classify_position, parse_engine, Bounds, PositionKind};

pub const DEFAULT_MAP_POINTS: i64 = 50;
pub const MAX_MAP_POINTS: i64 = 1000;

#[derive(Debug, Deserialize)]
pub struct MapQuery {
    pub plate: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteMarker {
    Start,
    Finish,
}

#[derive(Debug, Serialize)]
pub struct MapPoint {
    pub plate: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub datetime_utc: Option<String>,
    pub speed: Option<f64>,
    pub engine: Option<String>,
    pub kind: PositionKind,
    pub marker: Option<RouteMarker>,
}

#[derive(Debug, Serialize)]
pub struct MapResponse {
    /// Oldest first, so the route reads from start to finish.
    pub points: Vec<MapPoint>,
    pub bounds: Option<Bounds>,
}

pub async fn map_view(
    State(state): State<AppState>,
    Query(params): Query<MapQuery>,
) -> Result<Json<MapResponse>, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_MAP_POINTS).clamp(1, MAX_MAP_POINTS);
    let mut records = state
        .repository
        .map_points(params.plate.as_deref(), limit)
        .await?;
    records.reverse();

    let points = to_map_points(records);
    let bounds = bounds(points.iter().map(|p| (p.lat, p.lon)));

    Ok(Json(MapResponse { points, bounds }))
}

fn to_map_points(records: Vec<GpsRecord>) -> Vec<MapPoint> {
    let located: Vec<(f64, f64, GpsRecord)> = records
        .into_iter()
        .filter_map(|record| Some((record.lat?, record.lon?, record)))
        .collect();
    let last = located.len().saturating_sub(1);

    located
        .into_iter()
        .enumerate()
        .map(|(index, (lat, lon, record))| {
            let engine_on = record.engine.as_deref().and_then(parse_engine);
            let kind = classify_position(engine_on, record.speed);
            let marker = if index == 0 {
                Some(RouteMarker::Start)
            } else if index == last {
                Some(RouteMarker::Finish)
            } else {
                None
            };
            MapPoint {
                plate: record.vehicle_number,
                lat,
                lon,
                datetime_utc: record.datetime_utc,
                speed: record.speed,
                engine: record.engine,
                kind,
                marker,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, speed: f64, engine: &str) -> GpsRecord {
        GpsRecord {
            id,
            vehicle_id: None,
            vehicle_number: Some("B 1".into()),
            datetime_utc: Some(format!("2024-06-01 08:0{}:00", id)),
            gps_location: None,
            lon: Some(106.8 + id as f64 / 100.0),
            lat: Some(-6.2),
            speed: Some(speed),
            direction: None,
            engine: Some(engine.into()),
            odometer: None,
            car_status: None,
            vehicle_type: None,
            received_at: String::new(),
        }
    }

    #[test]
    fn first_and_last_points_are_route_markers() {
        let points = to_map_points(vec![
            record(1, 0.0, "ON"),
            record(2, 30.0, "ON"),
            record(3, 0.0, "OFF"),
        ]);

        assert_eq!(points[0].marker, Some(RouteMarker::Start));
        assert_eq!(points[1].marker, None);
        assert_eq!(points[2].marker, Some(RouteMarker::Finish));
        assert_eq!(points[0].kind, PositionKind::Stopped);
        assert_eq!(points[1].kind, PositionKind::Moving);
        assert_eq!(points[2].kind, PositionKind::Parked);
    }

    #[test]
    fn single_point_is_the_start() {
        let points = to_map_points(vec![record(1, 0.0, "ON")]);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].marker, Some(RouteMarker::Start));
    }
}
