//! Configuration for the mileage aggregator

use serde::{Deserialize, Serialize};

/// Noise thresholds applied while aggregating odometer readings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Deltas at or above this many kilometers are treated as device glitches.
    pub max_delta_km: f64,
    /// Speeds at or below this value count as idle and are left out of averages.
    pub min_speed: f64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            max_delta_km: 500.0,
            min_speed: 1.0,
        }
    }
}
