use std::env;
use std::fmt;
use std::str::FromStr;

use crate::cli::Cli;
use crate::telemetry::efficiency::{EfficiencyPolicyKind, DEFAULT_EFFICIENCY_KM_PER_LITER};
use crate::telemetry::AggregatorConfig;

pub const DEFAULT_GPS_API_URL: &str = "https://portal.gps.id/backend/seen/public";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://fleet_telemetry.db";

#[derive(Clone)]
pub struct Config {
    pub gps_api_url: String,
    pub gps_username: String,
    pub gps_password: String,
    pub database_url: String,
    pub server_port: u16,
    pub poll_interval_seconds: u64,
    pub report_cache_ttl_seconds: u64,
    pub retention_days: i64,
    pub gps_max_retries: u32,
    pub efficiency_policy: EfficiencyPolicyKind,
    pub default_efficiency_km_per_liter: f64,
    pub aggregator: AggregatorConfig,
}

// Hand-written so the password never reaches the logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("gps_api_url", &self.gps_api_url)
            .field("gps_username", &self.gps_username)
            .field("gps_password", &"<redacted>")
            .field("database_url", &self.database_url)
            .field("server_port", &self.server_port)
            .field("poll_interval_seconds", &self.poll_interval_seconds)
            .field("report_cache_ttl_seconds", &self.report_cache_ttl_seconds)
            .field("retention_days", &self.retention_days)
            .field("gps_max_retries", &self.gps_max_retries)
            .field("efficiency_policy", &self.efficiency_policy)
            .field("default_efficiency_km_per_liter", &self.default_efficiency_km_per_liter)
            .field("aggregator", &self.aggregator)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from any key/value source. `from_env` passes the
    /// process environment; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let gps_username = lookup("GPS_USERNAME").ok_or("GPS_USERNAME is required")?;
        let gps_password = lookup("GPS_PASSWORD").ok_or("GPS_PASSWORD is required")?;

        let gps_api_url = lookup("GPS_API_URL")
            .unwrap_or_else(|| DEFAULT_GPS_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let efficiency_policy = match lookup("EFFICIENCY_POLICY") {
            Some(raw) => raw.parse::<EfficiencyPolicyKind>()?,
            None => EfficiencyPolicyKind::Fixed,
        };

        let defaults = AggregatorConfig::default();

        Ok(Self {
            gps_api_url,
            gps_username,
            gps_password,
            database_url,
            server_port: parse_or(&lookup, "SERVER_PORT", 8080)?,
            poll_interval_seconds: parse_or(&lookup, "POLL_INTERVAL_SECONDS", 300)?,
            report_cache_ttl_seconds: parse_or(&lookup, "REPORT_CACHE_TTL_SECONDS", 300)?,
            retention_days: parse_or(&lookup, "RETENTION_DAYS", 90)?,
            gps_max_retries: parse_or(&lookup, "GPS_MAX_RETRIES", 2)?,
            efficiency_policy,
            default_efficiency_km_per_liter: parse_or(
                &lookup,
                "DEFAULT_EFFICIENCY_KM_PER_LITER",
                DEFAULT_EFFICIENCY_KM_PER_LITER,
            )?,
            aggregator: AggregatorConfig {
                max_delta_km: parse_or(&lookup, "MAX_DELTA_KM", defaults.max_delta_km)?,
                min_speed: parse_or(&lookup, "MIN_SPEED_KMH", defaults.min_speed)?,
            },
        })
    }

    /// Command-line flags win over the environment.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(url) = &cli.gps_api_url {
            self.gps_api_url = url.trim_end_matches('/').to_string();
        }
        if let Some(url) = &cli.database_url {
            self.database_url = url.clone();
        }
        if let Some(port) = cli.port {
            self.server_port = port;
        }
        if let Some(interval) = cli.poll_interval {
            self.poll_interval_seconds = interval;
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, String>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| format!("{} must be a valid number", key)),
        None => Ok(default),
    }
}
