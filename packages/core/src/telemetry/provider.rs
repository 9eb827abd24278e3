//! Telemetry Provider Interface
//!
//! Abstraction over the upstream GPS tracking service so reports and the
//! polling scheduler can run against a real client or a test double.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::telemetry::{
    error::ProviderError,
    position::parse_engine,
    types::{flexible_f64, flexible_string, Sample},
};

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// A tracked vehicle as listed by the provider.
///
/// Payloads name some fields in more than one way and may carry several
/// names at once. The first non-null value wins: `lat` over `latitude`,
/// `lon` over `longitude`, and `updated_at` over `gps_time` over `time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawProviderVehicle")]
pub struct ProviderVehicle {
    pub imei: Option<String>,
    pub plate: Option<String>,
    pub speed: Option<f64>,
    pub engine: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub updated_at: Option<String>,
}

impl ProviderVehicle {
    /// Plate as displayed, `-` when the provider has none.
    pub fn display_plate(&self) -> String {
        self.plate
            .clone()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| "-".to_string())
    }

    pub fn engine_on(&self) -> Option<bool> {
        self.engine.as_deref().and_then(parse_engine)
    }
}

#[derive(Deserialize)]
struct RawProviderVehicle {
    #[serde(deserialize_with = "flexible_string", default)]
    imei: Option<String>,
    #[serde(deserialize_with = "flexible_string", default)]
    plate: Option<String>,
    #[serde(deserialize_with = "flexible_f64", default)]
    speed: Option<f64>,
    #[serde(deserialize_with = "flexible_string", default)]
    engine: Option<String>,
    #[serde(deserialize_with = "flexible_f64", default)]
    lat: Option<f64>,
    #[serde(deserialize_with = "flexible_f64", default)]
    latitude: Option<f64>,
    #[serde(deserialize_with = "flexible_f64", default)]
    lon: Option<f64>,
    #[serde(deserialize_with = "flexible_f64", default)]
    longitude: Option<f64>,
    #[serde(deserialize_with = "flexible_string", default)]
    updated_at: Option<String>,
    #[serde(deserialize_with = "flexible_string", default)]
    gps_time: Option<String>,
    #[serde(deserialize_with = "flexible_string", default)]
    time: Option<String>,
}

impl From<RawProviderVehicle> for ProviderVehicle {
    fn from(raw: RawProviderVehicle) -> Self {
        Self {
            imei: raw.imei,
            plate: raw.plate,
            speed: raw.speed,
            engine: raw.engine,
            lat: raw.lat.or(raw.latitude),
            lon: raw.lon.or(raw.longitude),
            updated_at: raw.updated_at.or(raw.gps_time).or(raw.time),
        }
    }
}

/// One row of the provider's position history report.
///
/// Precedence when several names are present: `timestamp` over `time` over
/// `gps_time` over `datetime`, `odometer` over `mileage`, `lat` over
/// `latitude` and `lon` over `longitude`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawHistoryRecord")]
pub struct HistoryRecord {
    pub timestamp: Option<String>,
    pub odometer: Option<f64>,
    pub speed: Option<f64>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub engine: Option<String>,
}

#[derive(Deserialize)]
struct RawHistoryRecord {
    #[serde(deserialize_with = "flexible_string", default)]
    timestamp: Option<String>,
    #[serde(deserialize_with = "flexible_string", default)]
    time: Option<String>,
    #[serde(deserialize_with = "flexible_string", default)]
    gps_time: Option<String>,
    #[serde(deserialize_with = "flexible_string", default)]
    datetime: Option<String>,
    #[serde(deserialize_with = "flexible_f64", default)]
    odometer: Option<f64>,
    #[serde(deserialize_with = "flexible_f64", default)]
    mileage: Option<f64>,
    #[serde(deserialize_with = "flexible_f64", default)]
    speed: Option<f64>,
    #[serde(deserialize_with = "flexible_f64", default)]
    lat: Option<f64>,
    #[serde(deserialize_with = "flexible_f64", default)]
    latitude: Option<f64>,
    #[serde(deserialize_with = "flexible_f64", default)]
    lon: Option<f64>,
    #[serde(deserialize_with = "flexible_f64", default)]
    longitude: Option<f64>,
    #[serde(deserialize_with = "flexible_string", default)]
    engine: Option<String>,
}

impl From<RawHistoryRecord> for HistoryRecord {
    fn from(raw: RawHistoryRecord) -> Self {
        Self {
            timestamp: raw
                .timestamp
                .or(raw.time)
                .or(raw.gps_time)
                .or(raw.datetime),
            odometer: raw.odometer.or(raw.mileage),
            speed: raw.speed,
            lat: raw.lat.or(raw.latitude),
            lon: raw.lon.or(raw.longitude),
            engine: raw.engine,
        }
    }
}

impl From<&HistoryRecord> for Sample {
    fn from(record: &HistoryRecord) -> Self {
        Sample {
            timestamp: record.timestamp.clone(),
            odometer: record.odometer,
            speed: record.speed,
        }
    }
}

/// One row of the provider's mileage report (distance in meters).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MileageRecord {
    #[serde(deserialize_with = "flexible_string", default)]
    pub date: Option<String>,
    #[serde(deserialize_with = "flexible_f64", default)]
    pub mileage: Option<f64>,
}

/// Trait for telemetry providers to keep reports independent of the data source
#[async_trait]
pub trait TelemetryProvider {
    /// List every vehicle visible to the account.
    async fn list_vehicles(&self) -> ProviderResult<Vec<ProviderVehicle>>;

    /// Position history of one device over whole calendar days.
    async fn fetch_history(
        &self,
        imei: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ProviderResult<Vec<HistoryRecord>>;

    /// Provider-computed mileage rows of one device over whole calendar days.
    async fn fetch_mileage(
        &self,
        imei: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ProviderResult<Vec<MileageRecord>>;

    /// Get the name of this provider for logging/debugging
    fn provider_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn history_row_with_both_odometer_names_prefers_odometer() {
        let rows: Vec<HistoryRecord> = serde_json::from_str(
            r#"[{"time":"2024-06-01 08:00:00","odometer":1000,"mileage":900,"speed":10}]"#,
        )
        .unwrap();

        assert_eq!(rows[0].odometer, Some(1000.0));
        assert_eq!(rows[0].timestamp.as_deref(), Some("2024-06-01 08:00:00"));
    }

    #[test]
    fn history_row_falls_back_through_timestamp_names() {
        let row: HistoryRecord = serde_json::from_value(json!({
            "time": null,
            "gps_time": "2024-06-01 08:00:00",
            "datetime": "2024-06-01 07:59:59",
            "mileage": "1500",
            "lat": null,
            "latitude": -6.2,
            "lon": 106.8,
            "longitude": 106.9,
        }))
        .unwrap();

        assert_eq!(row.timestamp.as_deref(), Some("2024-06-01 08:00:00"));
        assert_eq!(row.odometer, Some(1500.0));
        assert_eq!(row.lat, Some(-6.2));
        assert_eq!(row.lon, Some(106.8));
    }

    #[test]
    fn vehicle_with_both_time_names_parses() {
        let vehicles: Vec<ProviderVehicle> = serde_json::from_value(json!([{
            "imei": 359710000000001u64,
            "plate": "B 1234 XYZ",
            "time": "2024-06-01 07:00:00",
            "gps_time": "2024-06-01 08:00:00",
            "lat": -6.2,
            "latitude": -6.3,
        }]))
        .unwrap();

        assert_eq!(vehicles[0].updated_at.as_deref(), Some("2024-06-01 08:00:00"));
        assert_eq!(vehicles[0].lat, Some(-6.2));
        assert_eq!(vehicles[0].imei.as_deref(), Some("359710000000001"));
    }

    #[test]
    fn sample_accepts_either_counter_name() {
        let both: Sample = serde_json::from_value(json!({
            "timestamp": "2024-06-01 08:00:00",
            "odometer": 2000.0,
            "mileage": 1000.0,
        }))
        .unwrap();
        let legacy: Sample = serde_json::from_value(json!({ "mileage": 1000.0 })).unwrap();

        assert_eq!(both.odometer, Some(2000.0));
        assert_eq!(legacy.odometer, Some(1000.0));
    }

    #[test]
    fn history_serializes_with_canonical_names() {
        let row: HistoryRecord =
            serde_json::from_value(json!({ "time": "2024-06-01 08:00:00", "mileage": 5 })).unwrap();
        let value = serde_json::to_value(&row).unwrap();

        assert_eq!(value["timestamp"], "2024-06-01 08:00:00");
        assert_eq!(value["odometer"], 5.0);
        assert!(value.get("mileage").is_none());
    }
}
