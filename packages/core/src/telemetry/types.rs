//! Core data types for telemetry reports

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single device ping as consumed by the aggregator.
///
/// Every field is optional because upstream payloads routinely omit them;
/// the aggregator decides what is usable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawSample")]
pub struct Sample {
    pub timestamp: Option<String>,
    /// Cumulative distance counter in meters.
    pub odometer: Option<f64>,
    pub speed: Option<f64>,
}

/// Wire form of a [`Sample`]: the counter arrives as `odometer` or
/// `mileage`, and `odometer` wins when both are present.
#[derive(Deserialize)]
struct RawSample {
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    odometer: Option<f64>,
    #[serde(default)]
    mileage: Option<f64>,
    #[serde(default)]
    speed: Option<f64>,
}

impl From<RawSample> for Sample {
    fn from(raw: RawSample) -> Self {
        Self {
            timestamp: raw.timestamp,
            odometer: raw.odometer.or(raw.mileage),
            speed: raw.speed,
        }
    }
}

impl Sample {
    pub fn new(timestamp: impl Into<String>, odometer: f64, speed: Option<f64>) -> Self {
        Self {
            timestamp: Some(timestamp.into()),
            odometer: Some(odometer),
            speed,
        }
    }

    /// Calendar date taken from the first ten characters of the timestamp.
    pub fn date(&self) -> Option<NaiveDate> {
        let timestamp = self.timestamp.as_deref()?;
        let prefix = timestamp.get(..10)?;
        NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
    }
}

/// Running totals for one calendar day.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DayAccumulator {
    pub distance_km: f64,
    pub speed_sum: f64,
    pub speed_sample_count: usize,
}

impl DayAccumulator {
    pub fn average_speed(&self) -> Option<f64> {
        if self.speed_sample_count == 0 {
            None
        } else {
            Some(self.speed_sum / self.speed_sample_count as f64)
        }
    }
}

/// One output row per calendar day in the requested range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyMileage {
    pub date: NaiveDate,
    pub distance_km: f64,
    pub fuel_used: f64,
    pub avg_speed: f64,
}

/// Coarse classification of a reporting period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementStatus {
    NotMoving,
    MovingNoSpeedData,
    Ok,
}

impl MovementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementStatus::NotMoving => "NOT_MOVING",
            MovementStatus::MovingNoSpeedData => "MOVING_NO_SPEED_DATA",
            MovementStatus::Ok => "OK",
        }
    }
}

/// Period-level roll-up of the daily rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodTotals {
    pub total_distance_km: f64,
    pub total_fuel: f64,
    pub avg_speed: f64,
    pub status: MovementStatus,
}

/// Aggregator output: the full day sequence plus its roll-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MileageReport {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: Vec<DailyMileage>,
    pub totals: PeriodTotals,
}

/// Fuel category used for efficiency and emission lookups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FuelCategory {
    #[default]
    Gasoline,
    Diesel,
}

impl FuelCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FuelCategory::Gasoline => "gasoline",
            FuelCategory::Diesel => "diesel",
        }
    }
}

impl std::str::FromStr for FuelCategory {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gasoline" | "petrol" | "bensin" => Ok(FuelCategory::Gasoline),
            "diesel" | "solar" => Ok(FuelCategory::Diesel),
            other => Err(format!("Unknown fuel category: {}", other)),
        }
    }
}

/// Per-vehicle metadata that drives fuel policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleProfile {
    pub plate: String,
    pub imei: Option<String>,
    pub fuel_type: FuelCategory,
    pub efficiency_km_per_liter: Option<f64>,
}

impl VehicleProfile {
    /// Profile used when nothing is stored for a vehicle.
    pub fn unregistered(plate: impl Into<String>) -> Self {
        Self {
            plate: plate.into(),
            imei: None,
            fuel_type: FuelCategory::Gasoline,
            efficiency_km_per_liter: None,
        }
    }
}

/// Full report as served by the API: aggregation, metadata and emissions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub vehicle: String,
    pub plate: String,
    pub imei: Option<String>,
    pub source: String,
    pub range_label: String,
    pub fuel_type: FuelCategory,
    pub efficiency_km_per_liter: f64,
    pub days: Vec<DailyMileage>,
    pub totals: PeriodTotals,
    pub emissions: crate::telemetry::emissions::EmissionEstimate,
}

/// Round to two decimal places, the precision used in every report.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Deserialize a field that may arrive as a JSON string, number or bool.
pub fn flexible_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(serde_json::Value::Bool(b)) => Some(b.to_string()),
        Some(other) => Some(other.to_string()),
    })
}

/// Deserialize a numeric field that may arrive as a number or numeric string.
/// Unparseable values become `None` rather than failing the whole payload.
pub fn flexible_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}
