//! Fuel efficiency policies
//!
//! Reports never hardcode km-per-liter figures; they ask an
//! [`EfficiencyPolicy`] chosen at startup from configuration.

use std::collections::HashMap;
use std::str::FromStr;

use crate::telemetry::types::{FuelCategory, VehicleProfile};

/// Efficiency used when nothing more specific is configured.
pub const DEFAULT_EFFICIENCY_KM_PER_LITER: f64 = 10.0;

/// Resolves the assumed fuel economy (km per liter) of a vehicle.
pub trait EfficiencyPolicy: Send + Sync {
    fn resolve_efficiency(&self, vehicle: &VehicleProfile) -> f64;

    fn policy_name(&self) -> &str;
}

/// Same constant for every vehicle.
#[derive(Debug, Clone)]
pub struct FixedEfficiency {
    km_per_liter: f64,
}

impl FixedEfficiency {
    pub fn new(km_per_liter: f64) -> Self {
        Self { km_per_liter }
    }
}

impl EfficiencyPolicy for FixedEfficiency {
    fn resolve_efficiency(&self, _vehicle: &VehicleProfile) -> f64 {
        self.km_per_liter
    }

    fn policy_name(&self) -> &str {
        "fixed"
    }
}

/// Lookup table keyed by fuel category.
#[derive(Debug, Clone)]
pub struct FuelTypeEfficiency {
    table: HashMap<FuelCategory, f64>,
    fallback: f64,
}

impl FuelTypeEfficiency {
    pub fn new(table: HashMap<FuelCategory, f64>, fallback: f64) -> Self {
        Self { table, fallback }
    }
}

impl Default for FuelTypeEfficiency {
    fn default() -> Self {
        let table = HashMap::from([
            (FuelCategory::Gasoline, DEFAULT_EFFICIENCY_KM_PER_LITER),
            (FuelCategory::Diesel, 8.0),
        ]);
        Self::new(table, DEFAULT_EFFICIENCY_KM_PER_LITER)
    }
}

impl EfficiencyPolicy for FuelTypeEfficiency {
    fn resolve_efficiency(&self, vehicle: &VehicleProfile) -> f64 {
        self.table
            .get(&vehicle.fuel_type)
            .copied()
            .unwrap_or(self.fallback)
    }

    fn policy_name(&self) -> &str {
        "fuel_type"
    }
}

/// Per-vehicle figure stored on the profile, falling back to another policy.
pub struct VehicleEfficiency {
    fallback: Box<dyn EfficiencyPolicy>,
}

impl VehicleEfficiency {
    pub fn new(fallback: Box<dyn EfficiencyPolicy>) -> Self {
        Self { fallback }
    }
}

impl EfficiencyPolicy for VehicleEfficiency {
    fn resolve_efficiency(&self, vehicle: &VehicleProfile) -> f64 {
        vehicle
            .efficiency_km_per_liter
            .filter(|value| value.is_finite() && *value > 0.0)
            .unwrap_or_else(|| self.fallback.resolve_efficiency(vehicle))
    }

    fn policy_name(&self) -> &str {
        "vehicle"
    }
}

/// Configuration key selecting which policy is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EfficiencyPolicyKind {
    Fixed,
    FuelType,
    Vehicle,
}

impl FromStr for EfficiencyPolicyKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "fixed" => Ok(Self::Fixed),
            "fuel_type" => Ok(Self::FuelType),
            "vehicle" => Ok(Self::Vehicle),
            other => Err(format!("Invalid EFFICIENCY_POLICY: {}", other)),
        }
    }
}

/// Build the configured policy. `default_km_per_liter` backs the fixed
/// policy and the gasoline entry of the fuel-type table.
pub fn build_policy(
    kind: EfficiencyPolicyKind,
    default_km_per_liter: f64,
) -> Box<dyn EfficiencyPolicy> {
    let table = || {
        let mut policy = FuelTypeEfficiency::default();
        policy.table.insert(FuelCategory::Gasoline, default_km_per_liter);
        policy.fallback = default_km_per_liter;
        policy
    };

    match kind {
        EfficiencyPolicyKind::Fixed => Box::new(FixedEfficiency::new(default_km_per_liter)),
        EfficiencyPolicyKind::FuelType => Box::new(table()),
        EfficiencyPolicyKind::Vehicle => Box::new(VehicleEfficiency::new(Box::new(table()))),
    }
}
