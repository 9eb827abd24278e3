//! In-memory [`TelemetryProvider`] for tests and offline runs.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::telemetry::provider::{
    HistoryRecord, MileageRecord, ProviderResult, ProviderVehicle, TelemetryProvider,
};
use crate::telemetry::ProviderError;

/// Serves canned vehicles, history and mileage. When an error is set every
/// call fails with a clone of it.
#[derive(Debug, Default)]
pub struct MockTelemetryProvider {
    vehicles: Vec<ProviderVehicle>,
    history: Vec<(String, HistoryRecord)>,
    mileage: Vec<(String, MileageRecord)>,
    error: Option<ProviderError>,
    calls: AtomicUsize,
}

impl MockTelemetryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vehicles(mut self, vehicles: Vec<ProviderVehicle>) -> Self {
        self.vehicles = vehicles;
        self
    }

    pub fn with_history(mut self, imei: &str, records: Vec<HistoryRecord>) -> Self {
        self.history
            .extend(records.into_iter().map(|record| (imei.to_string(), record)));
        self
    }

    pub fn with_mileage(mut self, imei: &str, records: Vec<MileageRecord>) -> Self {
        self.mileage
            .extend(records.into_iter().map(|record| (imei.to_string(), record)));
        self
    }

    pub fn with_error(mut self, error: ProviderError) -> Self {
        self.error = Some(error);
        self
    }

    /// Number of provider calls served so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record_call(&self) -> ProviderResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

fn on_days(date: Option<&str>, start: NaiveDate, end: NaiveDate) -> bool {
    date.and_then(|d| d.get(..10))
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .map(|d| d >= start && d <= end)
        .unwrap_or(false)
}

#[async_trait]
impl TelemetryProvider for MockTelemetryProvider {
    async fn list_vehicles(&self) -> ProviderResult<Vec<ProviderVehicle>> {
        self.record_call()?;
        Ok(self.vehicles.clone())
    }

    async fn fetch_history(
        &self,
        imei: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ProviderResult<Vec<HistoryRecord>> {
        self.record_call()?;
        Ok(self
            .history
            .iter()
            .filter(|(owner, record)| {
                owner == imei && on_days(record.timestamp.as_deref(), start, end)
            })
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn fetch_mileage(
        &self,
        imei: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ProviderResult<Vec<MileageRecord>> {
        self.record_call()?;
        Ok(self
            .mileage
            .iter()
            .filter(|(owner, record)| {
                owner == imei
                    && record
                        .date
                        .as_deref()
                        .map_or(true, |_| on_days(record.date.as_deref(), start, end))
            })
            .map(|(_, record)| record.clone())
            .collect())
    }

    fn provider_name(&self) -> &str {
        "mock"
    }
}
