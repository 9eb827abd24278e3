//! In-memory fleet snapshot.
//!
//! `FleetStore` holds the vehicle list returned by the most recent
//! successful provider poll. Each poll replaces the whole snapshot; a
//! failed poll leaves the previous one in place so the dashboard keeps
//! showing the last known state.
//!
//! Callers wrap it in `Arc<RwLock<FleetStore>>` so it can be shared between
//! the polling task and the Axum handlers.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::telemetry::position::{classify_position, PositionKind};
use crate::telemetry::provider::ProviderVehicle;

/// Vehicle counts derived from the latest snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FleetCounts {
    pub total: usize,
    pub moving: usize,
    /// Stopped or parked.
    pub stopped: usize,
}

#[derive(Debug, Default)]
pub struct FleetStore {
    vehicles: Vec<ProviderVehicle>,
    refreshed_at: Option<DateTime<Utc>>,
}

impl FleetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot with a freshly polled vehicle list.
    pub fn replace(&mut self, vehicles: Vec<ProviderVehicle>, refreshed_at: DateTime<Utc>) {
        self.vehicles = vehicles;
        self.refreshed_at = Some(refreshed_at);
    }

    pub fn vehicles(&self) -> &[ProviderVehicle] {
        &self.vehicles
    }

    /// When the snapshot was last replaced; `None` before the first poll.
    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    pub fn counts(&self) -> FleetCounts {
        let moving = self
            .vehicles
            .iter()
            .filter(|v| classify_position(v.engine_on(), v.speed) == PositionKind::Moving)
            .count();

        FleetCounts {
            total: self.vehicles.len(),
            moving,
            stopped: self.vehicles.len() - moving,
        }
    }

    pub fn find_by_imei(&self, imei: &str) -> Option<&ProviderVehicle> {
        self.vehicles
            .iter()
            .find(|v| v.imei.as_deref() == Some(imei))
    }

    pub fn find_by_plate(&self, plate: &str) -> Option<&ProviderVehicle> {
        self.vehicles
            .iter()
            .find(|v| v.plate.as_deref() == Some(plate))
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }
}
