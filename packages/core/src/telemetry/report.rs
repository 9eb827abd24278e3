//! Report assembly: turns an aggregated [`MileageReport`] into the
//! [`PeriodSummary`] served to clients.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::telemetry::emissions::estimate_emissions;
use crate::telemetry::provider::MileageRecord;
use crate::telemetry::types::{round2, MileageReport, PeriodSummary, VehicleProfile};

/// Where a report's samples come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportSource {
    /// Pushes stored in the local database.
    #[default]
    Local,
    /// History fetched live from the GPS provider.
    Provider,
}

impl ReportSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportSource::Local => "local",
            ReportSource::Provider => "provider",
        }
    }
}

impl fmt::Display for ReportSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportSource {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "local" | "db" => Ok(ReportSource::Local),
            "provider" | "gps" => Ok(ReportSource::Provider),
            other => Err(format!("Invalid source: {} (expected local or provider)", other)),
        }
    }
}

/// Identity of the vehicle a report was requested for.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportSubject {
    /// As given by the caller (plate or IMEI).
    pub vehicle: String,
    pub plate: String,
    pub imei: Option<String>,
    pub source: ReportSource,
}

pub fn range_label(start: NaiveDate, end: NaiveDate) -> String {
    format!("{} to {}", start.format("%Y-%m-%d"), end.format("%Y-%m-%d"))
}

/// Attach metadata and an emission estimate for the period's total fuel.
pub fn summarize(
    subject: ReportSubject,
    profile: &VehicleProfile,
    efficiency_km_per_liter: f64,
    report: MileageReport,
) -> PeriodSummary {
    let emissions = estimate_emissions(report.totals.total_fuel, profile.fuel_type);

    PeriodSummary {
        vehicle: subject.vehicle,
        plate: subject.plate,
        imei: subject.imei,
        source: subject.source.as_str().to_string(),
        range_label: range_label(report.start, report.end),
        fuel_type: profile.fuel_type,
        efficiency_km_per_liter,
        days: report.days,
        totals: report.totals,
        emissions,
    }
}

/// Sum of provider mileage rows (meters) in kilometers, rounded to 2 places.
/// Rows without a mileage value count as zero.
pub fn total_mileage_km(records: &[MileageRecord]) -> f64 {
    let meters: f64 = records.iter().filter_map(|r| r.mileage).sum();
    round2(meters / 1000.0)
}
