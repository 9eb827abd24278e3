//! Telemetry Module
//!
//! Mileage, fuel and emission reporting over raw odometer/speed readings,
//! plus the provider seam those readings come through.

pub mod aggregator;
pub mod config;
pub mod efficiency;
pub mod emissions;
pub mod error;
pub mod position;
pub mod provider;
pub mod report;
pub mod types;


pub use aggregator::aggregate;
pub use config::AggregatorConfig;
pub use efficiency::EfficiencyPolicy;
pub use emissions::{estimate_emissions, EmissionEstimate};
pub use error::ProviderError;
pub use provider::TelemetryProvider;
pub use report::{summarize, ReportSource, ReportSubject};
pub use types::*;
