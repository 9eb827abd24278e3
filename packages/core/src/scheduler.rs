//! Vehicle polling scheduler.
//!
//! Drives the main polling loop: each tick fetches the vehicle list from
//! the GPS provider, replaces the fleet snapshot, and prunes stored pushes
//! that fell out of the retention window.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use tokio::signal;
use tokio::sync::RwLock;
use tokio::time;

use crate::metrics::AppMetrics;
use crate::repository::GpsRepository;
use crate::store::FleetStore;
use crate::telemetry::TelemetryProvider;

/// Everything one poll cycle touches.
#[derive(Clone)]
pub struct PollTargets {
    pub provider: Arc<dyn TelemetryProvider + Send + Sync>,
    pub fleet_store: Arc<RwLock<FleetStore>>,
    pub repository: Arc<GpsRepository>,
    pub metrics: Arc<AppMetrics>,
    /// Pushes received longer ago than this are deleted each tick.
    pub retention: ChronoDuration,
}

/// Run the vehicle polling loop.
///
/// Errors from the provider are logged and the loop continues; the previous
/// fleet snapshot stays in place until a poll succeeds.
///
/// Runs until `Ctrl+C` (SIGINT) is received.
pub async fn run_vehicle_polling(targets: PollTargets, poll_interval_seconds: u64) {
    let mut interval = time::interval(Duration::from_secs(poll_interval_seconds.max(1)));

    tracing::info!(
        "Vehicle polling started (provider: {}, interval: {}s)",
        targets.provider.provider_name(),
        poll_interval_seconds
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                poll_once(&targets).await;
            }

            _ = signal::ctrl_c() => {
                tracing::info!("Shutdown signal received. Stopping polling.");
                break;
            }
        }
    }

    tracing::info!("Vehicle polling stopped cleanly");
}

/// Execute a single poll cycle. Extracted for testability.
pub async fn poll_once(targets: &PollTargets) {
    targets.metrics.polls_total.inc();

    match targets.provider.list_vehicles().await {
        Ok(vehicles) => {
            let mut store = targets.fleet_store.write().await;
            store.replace(vehicles, Utc::now());
            let counts = store.counts();
            targets.metrics.vehicles_tracked.set(counts.total as f64);
            tracing::info!(
                "Fleet refreshed: {} vehicles ({} moving, {} stopped)",
                counts.total,
                counts.moving,
                counts.stopped
            );
        }
        Err(err) => {
            targets.metrics.poll_errors_total.inc();
            tracing::error!("Vehicle polling error, keeping previous snapshot: {}", err);
        }
    }

    let cutoff = Utc::now() - targets.retention;
    match targets.repository.prune_older_than(cutoff).await {
        Ok(0) => {}
        Ok(deleted) => {
            targets.metrics.pushes_pruned_total.inc_by(deleted as f64);
            tracing::info!("Pruned {} GPS pushes older than {}", deleted, cutoff.to_rfc3339());
        }
        Err(err) => tracing::error!("Failed to prune GPS pushes: {}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::db::create_pool;
    use crate::repository::GpsPush;
    use crate::services::mock_provider::MockTelemetryProvider;
    use crate::telemetry::provider::ProviderVehicle;
    use crate::telemetry::ProviderError;

    fn vehicle(imei: &str, speed: f64) -> ProviderVehicle {
        ProviderVehicle {
            imei: Some(imei.into()),
            plate: Some(format!("B {}", imei)),
            speed: Some(speed),
            engine: Some("ON".into()),
            lat: None,
            lon: None,
            updated_at: None,
        }
    }

    async fn make_targets(provider: MockTelemetryProvider) -> PollTargets {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        PollTargets {
            provider: Arc::new(provider),
            fleet_store: Arc::new(RwLock::new(FleetStore::new())),
            repository: Arc::new(GpsRepository::new(pool)),
            metrics: Arc::new(AppMetrics::new().unwrap()),
            retention: ChronoDuration::days(90),
        }
    }

    #[tokio::test]
    async fn poll_once_replaces_fleet_snapshot() {
        let provider = MockTelemetryProvider::new()
            .with_vehicles(vec![vehicle("1", 40.0), vehicle("2", 0.0)]);
        let targets = make_targets(provider).await;

        poll_once(&targets).await;

        let store = targets.fleet_store.read().await;
        assert_eq!(store.len(), 2);
        assert_eq!(store.counts().moving, 1);
        assert!((targets.metrics.vehicles_tracked.get() - 2.0).abs() < f64::EPSILON);
        assert!((targets.metrics.polls_total.get() - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn poll_once_on_provider_error_keeps_previous_snapshot() {
        let targets = make_targets(
            MockTelemetryProvider::new().with_error(ProviderError::ServiceUnavailable),
        )
        .await;
        targets
            .fleet_store
            .write()
            .await
            .replace(vec![vehicle("9", 10.0)], Utc::now());

        poll_once(&targets).await;

        assert_eq!(targets.fleet_store.read().await.len(), 1);
        assert!((targets.metrics.poll_errors_total.get() - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn poll_once_prunes_expired_pushes() {
        let targets = make_targets(MockTelemetryProvider::new()).await;
        let push = GpsPush {
            vehicle_number: Some("B 1".into()),
            ..GpsPush::default()
        };
        targets
            .repository
            .insert_push_at(&push, Utc::now() - ChronoDuration::days(120))
            .await
            .unwrap();
        targets.repository.insert_push(&push).await.unwrap();

        poll_once(&targets).await;

        assert_eq!(targets.repository.count_pushes().await.unwrap(), 1);
        assert!((targets.metrics.pushes_pruned_total.get() - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn two_poll_cycles_do_not_accumulate_vehicles() {
        let provider = MockTelemetryProvider::new().with_vehicles(vec![vehicle("1", 5.0)]);
        let targets = make_targets(provider).await;

        poll_once(&targets).await;
        poll_once(&targets).await;

        assert_eq!(targets.fleet_store.read().await.len(), 1);
        assert!((targets.metrics.polls_total.get() - 2.0).abs() < f64::EPSILON);
    }
}
