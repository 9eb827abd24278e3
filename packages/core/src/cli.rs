use clap::Parser;

/// Fleet telemetry dashboard CLI arguments
#[derive(Debug, Parser)]
#[command(
    name = "fleet-telemetry",
    version,
    about = "Mileage, fuel and emission reports for a GPS-tracked vehicle fleet"
)]
pub struct Cli {
    /// GPS provider API base URL
    #[arg(long)]
    pub gps_api_url: Option<String>,

    /// SQLite connection string for stored GPS pushes
    #[arg(long)]
    pub database_url: Option<String>,

    /// HTTP port to listen on
    #[arg(long)]
    pub port: Option<u16>,

    /// Vehicle polling interval in seconds
    #[arg(long)]
    pub poll_interval: Option<u64>,
}
