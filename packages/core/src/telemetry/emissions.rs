//! Greenhouse-gas estimate for a fuel volume.
//!
//! Energy content is `liters × density × net calorific value`, reported in
//! terajoules. Gas masses come from per-fuel emission factors (kg/TJ) and are
//! weighted into CO2-equivalent with fixed global-warming potentials.

use serde::{Deserialize, Serialize};

use crate::telemetry::types::FuelCategory;

/// Global-warming potential of methane relative to CO2.
pub const GWP_CH4: f64 = 28.0;
/// Global-warming potential of nitrous oxide relative to CO2.
pub const GWP_N2O: f64 = 265.0;

/// Physical and emission constants for one fuel category.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuelConstants {
    /// kg per liter
    pub density: f64,
    /// TJ per Gg (equivalently MJ per kg)
    pub net_calorific_value: f64,
    /// kg per TJ
    pub co2_factor: f64,
    pub ch4_factor: f64,
    pub n2o_factor: f64,
}

pub const GASOLINE: FuelConstants = FuelConstants {
    density: 0.74,
    net_calorific_value: 44.3,
    co2_factor: 69_300.0,
    ch4_factor: 33.0,
    n2o_factor: 3.2,
};

pub const DIESEL: FuelConstants = FuelConstants {
    density: 0.84,
    net_calorific_value: 43.0,
    co2_factor: 74_100.0,
    ch4_factor: 3.9,
    n2o_factor: 3.9,
};

pub fn constants_for(category: FuelCategory) -> FuelConstants {
    match category {
        FuelCategory::Gasoline => GASOLINE,
        FuelCategory::Diesel => DIESEL,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmissionEstimate {
    pub fuel_type: FuelCategory,
    pub liters: f64,
    pub energy_tj: f64,
    pub co2_kg: f64,
    pub ch4_kg: f64,
    pub n2o_kg: f64,
    pub ch4_co2e_kg: f64,
    pub n2o_co2e_kg: f64,
    pub total_co2e_kg: f64,
}

/// Estimate emissions for `liters` of the given fuel.
///
/// Negative or non-finite volumes are treated as zero.
pub fn estimate_emissions(liters: f64, category: FuelCategory) -> EmissionEstimate {
    let liters = if liters.is_finite() && liters > 0.0 { liters } else { 0.0 };
    let constants = constants_for(category);

    // kg -> Gg is 1e-6, and TJ/Gg * Gg = TJ
    let mass_kg = liters * constants.density;
    let energy_tj = mass_kg * 1e-6 * constants.net_calorific_value;

    let co2_kg = energy_tj * constants.co2_factor;
    let ch4_kg = energy_tj * constants.ch4_factor;
    let n2o_kg = energy_tj * constants.n2o_factor;
    let ch4_co2e_kg = ch4_kg * GWP_CH4;
    let n2o_co2e_kg = n2o_kg * GWP_N2O;

    EmissionEstimate {
        fuel_type: category,
        liters,
        energy_tj,
        co2_kg,
        ch4_kg,
        n2o_kg,
        ch4_co2e_kg,
        n2o_co2e_kg,
        total_co2e_kg: co2_kg + ch4_co2e_kg + n2o_co2e_kg,
    }
}
