use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tokio::sync::RwLock;

use fleet_telemetry::api::{create_router, AppState};
use fleet_telemetry::cli::Cli;
use fleet_telemetry::config::Config;
use fleet_telemetry::db::create_pool;
use fleet_telemetry::error::AppError;
use fleet_telemetry::logging::init_logging;
use fleet_telemetry::metrics::AppMetrics;
use fleet_telemetry::repository::GpsRepository;
use fleet_telemetry::scheduler::{run_vehicle_polling, PollTargets};
use fleet_telemetry::services::gps_id::GpsIdClient;
use fleet_telemetry::store::FleetStore;
use fleet_telemetry::telemetry::efficiency::build_policy;
use fleet_telemetry::telemetry::TelemetryProvider;

#[tokio::main]
async fn main() {
    dotenv().ok();
    init_logging();

    let cli = Cli::parse();

    let mut config = Config::from_env()
        .map_err(AppError::Config)
        .unwrap_or_else(|err| {
            tracing::error!("{}", err);
            std::process::exit(1);
        });
    config.apply_cli(&cli);

    tracing::info!("Service started with config: {:?}", config);

    if let Err(err) = run(config).await {
        tracing::error!("{}", err);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), AppError> {
    let pool = create_pool(&config.database_url).await?;
    let repository = Arc::new(GpsRepository::new(pool));

    let provider: Arc<dyn TelemetryProvider + Send + Sync> = Arc::new(
        GpsIdClient::new(
            config.gps_api_url.clone(),
            config.gps_username.clone(),
            config.gps_password.clone(),
        )
        .with_retry(config.gps_max_retries, Duration::from_millis(500)),
    );

    let metrics = Arc::new(
        AppMetrics::new()
            .map_err(|err| AppError::Unknown(format!("Failed to register metrics: {}", err)))?,
    );
    let fleet_store = Arc::new(RwLock::new(FleetStore::new()));
    let efficiency = Arc::from(build_policy(
        config.efficiency_policy,
        config.default_efficiency_km_per_liter,
    ));

    tracing::info!(
        "Efficiency policy: {:?} (default {} km/l)",
        config.efficiency_policy,
        config.default_efficiency_km_per_liter
    );

    tokio::spawn(run_vehicle_polling(
        PollTargets {
            provider: provider.clone(),
            fleet_store: fleet_store.clone(),
            repository: repository.clone(),
            metrics: metrics.clone(),
            retention: chrono::Duration::days(config.retention_days),
        },
        config.poll_interval_seconds,
    ));

    let state = AppState::new(
        provider,
        repository,
        fleet_store,
        metrics,
        efficiency,
        config.aggregator,
        Duration::from_secs(config.report_cache_ttl_seconds),
    );
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|err| AppError::Network(format!("Failed to bind {}: {}", addr, err)))?;

    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Network(format!("Server error: {}", err)))?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
    }
    tracing::info!("Shutdown signal received");
}
