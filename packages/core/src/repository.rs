//! Database repository for GPS pushes and vehicle profiles.
//!
//! All SQLite read/write logic lives here. The ingest endpoint calls
//! [`GpsRepository::insert_push`], the scheduler calls
//! [`GpsRepository::prune_older_than`] to keep the table bounded, and the
//! report handlers read day-ranged samples back through
//! [`GpsRepository::samples_for_plate`].

use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::telemetry::types::{flexible_f64, flexible_string, FuelCategory, Sample, VehicleProfile};

/// Rows returned per page by [`GpsRepository::search`].
pub const RECORDS_PAGE_SIZE: i64 = 100;

/// A location push as posted by the GPS provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GpsPush {
    #[serde(rename = "VehicleId", deserialize_with = "flexible_string", default)]
    pub vehicle_id: Option<String>,
    #[serde(rename = "VehicleNumber", deserialize_with = "flexible_string", default)]
    pub vehicle_number: Option<String>,
    #[serde(rename = "DatetimeUTC", deserialize_with = "flexible_string", default)]
    pub datetime_utc: Option<String>,
    #[serde(rename = "GpsLocation", deserialize_with = "flexible_string", default)]
    pub gps_location: Option<String>,
    #[serde(rename = "Lon", deserialize_with = "flexible_f64", default)]
    pub lon: Option<f64>,
    #[serde(rename = "Lat", deserialize_with = "flexible_f64", default)]
    pub lat: Option<f64>,
    #[serde(rename = "Speed", deserialize_with = "flexible_f64", default)]
    pub speed: Option<f64>,
    #[serde(rename = "Direction", deserialize_with = "flexible_f64", default)]
    pub direction: Option<f64>,
    #[serde(rename = "Engine", deserialize_with = "flexible_string", default)]
    pub engine: Option<String>,
    #[serde(rename = "Odometer", deserialize_with = "flexible_f64", default)]
    pub odometer: Option<f64>,
    #[serde(rename = "Car_Status", deserialize_with = "flexible_string", default)]
    pub car_status: Option<String>,
    #[serde(rename = "VehicleType", deserialize_with = "flexible_string", default)]
    pub vehicle_type: Option<String>,
}

/// A stored push row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsRecord {
    pub id: i64,
    pub vehicle_id: Option<String>,
    pub vehicle_number: Option<String>,
    pub datetime_utc: Option<String>,
    pub gps_location: Option<String>,
    pub lon: Option<f64>,
    pub lat: Option<f64>,
    pub speed: Option<f64>,
    pub direction: Option<f64>,
    pub engine: Option<String>,
    pub odometer: Option<f64>,
    pub car_status: Option<String>,
    pub vehicle_type: Option<String>,
    pub received_at: String,
}

impl From<&GpsRecord> for Sample {
    fn from(record: &GpsRecord) -> Self {
        Sample {
            timestamp: record.datetime_utc.clone(),
            odometer: record.odometer,
            speed: record.speed,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ASC" => Ok(SortOrder::Asc),
            "DESC" => Ok(SortOrder::Desc),
            other => Err(format!("Invalid sort order: {}", other)),
        }
    }
}

/// Filters for browsing stored pushes. Empty strings count as absent.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub plate: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub sort: SortOrder,
    /// 1-based page number.
    pub page: i64,
}

impl RecordFilter {
    fn where_clause(&self) -> (String, Vec<String>) {
        let mut conditions = vec!["1=1"];
        let mut params = Vec::new();

        if let Some(plate) = non_empty(&self.plate) {
            conditions.push("vehicle_number = ?");
            params.push(plate.to_string());
        }
        if let Some(start) = non_empty(&self.start_time) {
            conditions.push("datetime_utc >= ?");
            params.push(start.to_string());
        }
        if let Some(end) = non_empty(&self.end_time) {
            conditions.push("datetime_utc <= ?");
            params.push(end.to_string());
        }

        (conditions.join(" AND "), params)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

const RECORD_COLUMNS: &str = "id, vehicle_id, vehicle_number, datetime_utc, gps_location, \
     lon, lat, speed, direction, engine, odometer, car_status, vehicle_type, received_at";

fn record_from_row(row: &SqliteRow) -> Option<GpsRecord> {
    Some(GpsRecord {
        id: row.try_get("id").ok()?,
        vehicle_id: row.try_get("vehicle_id").ok()?,
        vehicle_number: row.try_get("vehicle_number").ok()?,
        datetime_utc: row.try_get("datetime_utc").ok()?,
        gps_location: row.try_get("gps_location").ok()?,
        lon: row.try_get("lon").ok()?,
        lat: row.try_get("lat").ok()?,
        speed: row.try_get("speed").ok()?,
        direction: row.try_get("direction").ok()?,
        engine: row.try_get("engine").ok()?,
        odometer: row.try_get("odometer").ok()?,
        car_status: row.try_get("car_status").ok()?,
        vehicle_type: row.try_get("vehicle_type").ok()?,
        received_at: row.try_get("received_at").ok()?,
    })
}

fn sample_from_row(row: &SqliteRow) -> Option<Sample> {
    Some(Sample {
        timestamp: row.try_get("datetime_utc").ok()?,
        odometer: row.try_get("odometer").ok()?,
        speed: row.try_get("speed").ok()?,
    })
}

fn profile_from_row(row: &SqliteRow) -> Option<VehicleProfile> {
    let fuel_type: String = row.try_get("fuel_type").ok()?;
    Some(VehicleProfile {
        plate: row.try_get("plate").ok()?,
        imei: row.try_get("imei").ok()?,
        fuel_type: FuelCategory::from_str(&fuel_type).unwrap_or_default(),
        efficiency_km_per_liter: row.try_get("efficiency_km_per_liter").ok()?,
    })
}

/// Repository for reading and writing telemetry data to SQLite.
pub struct GpsRepository {
    pool: SqlitePool,
}

impl GpsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store one push stamped with the current time. Returns the new row id.
    pub async fn insert_push(&self, push: &GpsPush) -> Result<i64, sqlx::Error> {
        self.insert_push_at(push, Utc::now()).await
    }

    /// Store one push with an explicit receive time (RFC 3339).
    pub async fn insert_push_at(
        &self,
        push: &GpsPush,
        received_at: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO gps_data
             (vehicle_id, vehicle_number, datetime_utc, gps_location, lon, lat,
              speed, direction, engine, odometer, car_status, vehicle_type, received_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&push.vehicle_id)
        .bind(&push.vehicle_number)
        .bind(&push.datetime_utc)
        .bind(&push.gps_location)
        .bind(push.lon)
        .bind(push.lat)
        .bind(push.speed)
        .bind(push.direction)
        .bind(&push.engine)
        .bind(push.odometer)
        .bind(&push.car_status)
        .bind(&push.vehicle_type)
        .bind(received_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Cheap round-trip used by the health check.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Total number of stored pushes.
    pub async fn count_pushes(&self) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM gps_data")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("cnt").unwrap_or(0))
    }

    /// The `limit` most recent pushes by device time.
    pub async fn latest(&self, limit: i64) -> Result<Vec<GpsRecord>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM gps_data ORDER BY datetime_utc DESC, id DESC LIMIT ?",
            RECORD_COLUMNS
        );
        let rows = sqlx::query(&sql).bind(limit).fetch_all(&self.pool).await?;
        Ok(rows.iter().filter_map(record_from_row).collect())
    }

    /// Most recently received pushes that carry coordinates, newest first.
    pub async fn map_points(
        &self,
        plate: Option<&str>,
        limit: i64,
    ) -> Result<Vec<GpsRecord>, sqlx::Error> {
        let plate = plate.map(str::trim).filter(|p| !p.is_empty());
        let sql = format!(
            "SELECT {} FROM gps_data
             WHERE lat IS NOT NULL AND lon IS NOT NULL {}
             ORDER BY id DESC
             LIMIT ?",
            RECORD_COLUMNS,
            if plate.is_some() { "AND vehicle_number = ?" } else { "" }
        );

        let mut query = sqlx::query(&sql);
        if let Some(plate) = plate {
            query = query.bind(plate);
        }
        let rows = query.bind(limit).fetch_all(&self.pool).await?;
        Ok(rows.iter().filter_map(record_from_row).collect())
    }

    /// One page of pushes matching `filter`, ordered by device time.
    pub async fn search(&self, filter: &RecordFilter) -> Result<Vec<GpsRecord>, sqlx::Error> {
        let (where_clause, params) = filter.where_clause();
        let sql = format!(
            "SELECT {} FROM gps_data WHERE {} ORDER BY datetime_utc {}, id {} LIMIT ? OFFSET ?",
            RECORD_COLUMNS,
            where_clause,
            filter.sort.as_sql(),
            filter.sort.as_sql()
        );
        let offset = (filter.page.max(1) - 1) * RECORDS_PAGE_SIZE;

        let mut query = sqlx::query(&sql);
        for param in &params {
            query = query.bind(param);
        }
        let rows = query
            .bind(RECORDS_PAGE_SIZE)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().filter_map(record_from_row).collect())
    }

    /// Number of pushes matching `filter` across all pages.
    pub async fn count_matching(&self, filter: &RecordFilter) -> Result<i64, sqlx::Error> {
        let (where_clause, params) = filter.where_clause();
        let sql = format!("SELECT COUNT(*) AS cnt FROM gps_data WHERE {}", where_clause);

        let mut query = sqlx::query(&sql);
        for param in &params {
            query = query.bind(param);
        }
        let row = query.fetch_one(&self.pool).await?;
        Ok(row.try_get("cnt").unwrap_or(0))
    }

    /// Every plate that has at least one stored push, alphabetically.
    pub async fn distinct_plates(&self) -> Result<Vec<String>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT DISTINCT vehicle_number FROM gps_data
             WHERE vehicle_number IS NOT NULL
             ORDER BY vehicle_number",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .filter_map(|row| row.try_get::<String, _>("vehicle_number").ok())
            .collect())
    }

    /// Samples for one plate whose device time falls on `[start, end]`,
    /// preceded by the latest reading before `start` when one exists. That
    /// earlier reading only seeds the odometer baseline, so distance driven
    /// across midnight into the range is still counted.
    pub async fn samples_for_plate(
        &self,
        plate: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Sample>, sqlx::Error> {
        let seed = sqlx::query(
            "SELECT datetime_utc, odometer, speed FROM gps_data
             WHERE vehicle_number = ? AND datetime_utc < ? AND odometer IS NOT NULL
             ORDER BY datetime_utc DESC, id DESC
             LIMIT 1",
        )
        .bind(plate)
        .bind(start.to_string())
        .fetch_optional(&self.pool)
        .await?;

        let day_after_end = end + Duration::days(1);
        let rows = sqlx::query(
            "SELECT datetime_utc, odometer, speed FROM gps_data
             WHERE vehicle_number = ? AND datetime_utc >= ? AND datetime_utc < ?
             ORDER BY datetime_utc ASC, id ASC",
        )
        .bind(plate)
        .bind(start.to_string())
        .bind(day_after_end.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(seed.iter().chain(rows.iter()).filter_map(sample_from_row).collect())
    }

    /// Delete pushes received before `cutoff`. Returns the number of rows deleted.
    pub async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM gps_data WHERE received_at < ?")
            .bind(cutoff.to_rfc3339())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    // ---- Vehicle profiles ----

    /// Insert or replace the profile keyed by plate.
    pub async fn upsert_profile(&self, profile: &VehicleProfile) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO vehicle_profiles
                (plate, imei, fuel_type, efficiency_km_per_liter, updated_at)
             VALUES (?, ?, ?, ?, datetime('now'))
             ON CONFLICT(plate) DO UPDATE SET
                imei = excluded.imei,
                fuel_type = excluded.fuel_type,
                efficiency_km_per_liter = excluded.efficiency_km_per_liter,
                updated_at = excluded.updated_at",
        )
        .bind(&profile.plate)
        .bind(&profile.imei)
        .bind(profile.fuel_type.as_str())
        .bind(profile.efficiency_km_per_liter)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_profile(&self, plate: &str) -> Result<Option<VehicleProfile>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT plate, imei, fuel_type, efficiency_km_per_liter
             FROM vehicle_profiles WHERE plate = ?",
        )
        .bind(plate)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().and_then(profile_from_row))
    }

    pub async fn get_profile_by_imei(
        &self,
        imei: &str,
    ) -> Result<Option<VehicleProfile>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT plate, imei, fuel_type, efficiency_km_per_liter
             FROM vehicle_profiles WHERE imei = ?
             ORDER BY updated_at DESC LIMIT 1",
        )
        .bind(imei)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().and_then(profile_from_row))
    }

    pub async fn list_profiles(&self) -> Result<Vec<VehicleProfile>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT plate, imei, fuel_type, efficiency_km_per_liter
             FROM vehicle_profiles ORDER BY plate ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(profile_from_row).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::db::create_pool;

    async fn make_repo() -> GpsRepository {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        GpsRepository::new(pool)
    }

    fn make_push(plate: &str, datetime: &str, odometer: f64, speed: f64) -> GpsPush {
        GpsPush {
            vehicle_id: Some("42".into()),
            vehicle_number: Some(plate.into()),
            datetime_utc: Some(datetime.into()),
            lat: Some(-6.2),
            lon: Some(106.8),
            speed: Some(speed),
            engine: Some("ON".into()),
            odometer: Some(odometer),
            ..GpsPush::default()
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn push_accepts_provider_field_names_and_numeric_ids() {
        let push: GpsPush = serde_json::from_value(json!({
            "VehicleId": 1234,
            "VehicleNumber": "B 1234 XYZ",
            "DatetimeUTC": "2024-06-01 08:00:00",
            "Lat": "-6.2",
            "Lon": 106.8,
            "Speed": 35,
            "Engine": "ON",
            "Odometer": 120500,
            "Car_Status": "RUN"
        }))
        .unwrap();

        assert_eq!(push.vehicle_id.as_deref(), Some("1234"));
        assert_eq!(push.lat, Some(-6.2));
        assert_eq!(push.odometer, Some(120500.0));
        assert_eq!(push.car_status.as_deref(), Some("RUN"));
        assert!(push.direction.is_none());
    }

    #[test]
    fn sort_order_parses_case_insensitively() {
        assert_eq!("asc".parse::<SortOrder>(), Ok(SortOrder::Asc));
        assert_eq!("DESC".parse::<SortOrder>(), Ok(SortOrder::Desc));
        assert!("id; DROP TABLE gps_data".parse::<SortOrder>().is_err());
    }

    #[tokio::test]
    async fn insert_and_fetch_latest() {
        let repo = make_repo().await;
        repo.insert_push(&make_push("B 1", "2024-06-01 08:00:00", 1000.0, 10.0))
            .await
            .unwrap();
        repo.insert_push(&make_push("B 2", "2024-06-01 09:00:00", 2000.0, 0.0))
            .await
            .unwrap();

        let latest = repo.latest(5).await.unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].vehicle_number.as_deref(), Some("B 2"));
        assert_eq!(latest[1].odometer, Some(1000.0));
        assert_eq!(repo.count_pushes().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn search_filters_by_plate_and_time() {
        let repo = make_repo().await;
        for (plate, time) in [
            ("B 1", "2024-06-01 08:00:00"),
            ("B 1", "2024-06-02 08:00:00"),
            ("B 1", "2024-06-03 08:00:00"),
            ("B 2", "2024-06-02 08:00:00"),
        ] {
            repo.insert_push(&make_push(plate, time, 0.0, 0.0)).await.unwrap();
        }

        let filter = RecordFilter {
            plate: Some("B 1".into()),
            start_time: Some("2024-06-02 00:00:00".into()),
            end_time: Some("".into()),
            sort: SortOrder::Asc,
            page: 1,
        };
        let rows = repo.search(&filter).await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].datetime_utc.as_deref(), Some("2024-06-02 08:00:00"));
        assert_eq!(rows[1].datetime_utc.as_deref(), Some("2024-06-03 08:00:00"));
        assert_eq!(repo.count_matching(&filter).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn search_pages_through_results() {
        let repo = make_repo().await;
        for i in 0..(RECORDS_PAGE_SIZE + 5) {
            let time = format!("2024-06-01 {:02}:{:02}:00", i / 60, i % 60);
            repo.insert_push(&make_push("B 1", &time, i as f64, 0.0)).await.unwrap();
        }

        let mut filter = RecordFilter::default();
        assert_eq!(repo.search(&filter).await.unwrap().len() as i64, RECORDS_PAGE_SIZE);

        filter.page = 2;
        let second = repo.search(&filter).await.unwrap();
        assert_eq!(second.len(), 5);
        assert_eq!(second[0].odometer, Some(4.0));
    }

    #[tokio::test]
    async fn map_points_skip_rows_without_coordinates() {
        let repo = make_repo().await;
        repo.insert_push(&make_push("B 1", "2024-06-01 08:00:00", 0.0, 0.0))
            .await
            .unwrap();
        let mut no_coords = make_push("B 1", "2024-06-01 09:00:00", 0.0, 0.0);
        no_coords.lat = None;
        repo.insert_push(&no_coords).await.unwrap();
        repo.insert_push(&make_push("B 2", "2024-06-01 10:00:00", 0.0, 0.0))
            .await
            .unwrap();

        assert_eq!(repo.map_points(None, 50).await.unwrap().len(), 2);
        let only_b1 = repo.map_points(Some("B 1"), 50).await.unwrap();
        assert_eq!(only_b1.len(), 1);
        assert_eq!(only_b1[0].vehicle_number.as_deref(), Some("B 1"));
    }

    #[tokio::test]
    async fn distinct_plates_are_sorted() {
        let repo = make_repo().await;
        for plate in ["D 9", "B 1", "D 9"] {
            repo.insert_push(&make_push(plate, "2024-06-01 08:00:00", 0.0, 0.0))
                .await
                .unwrap();
        }
        assert_eq!(repo.distinct_plates().await.unwrap(), vec!["B 1", "D 9"]);
    }

    #[tokio::test]
    async fn samples_for_plate_cover_whole_days() {
        let repo = make_repo().await;
        for time in [
            "2024-05-31 23:59:59",
            "2024-06-01 00:00:00",
            "2024-06-02T23:59:59Z",
            "2024-06-03 00:00:00",
        ] {
            repo.insert_push(&make_push("B 1", time, 1000.0, 5.0)).await.unwrap();
        }
        repo.insert_push(&make_push("B 2", "2024-06-01 12:00:00", 0.0, 0.0))
            .await
            .unwrap();

        let samples = repo
            .samples_for_plate("B 1", date("2024-06-01"), date("2024-06-02"))
            .await
            .unwrap();

        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].timestamp.as_deref(), Some("2024-05-31 23:59:59"));
        assert_eq!(samples[1].timestamp.as_deref(), Some("2024-06-01 00:00:00"));
        assert_eq!(samples[2].timestamp.as_deref(), Some("2024-06-02T23:59:59Z"));
    }

    #[tokio::test]
    async fn samples_for_plate_seed_with_latest_earlier_reading() {
        let repo = make_repo().await;
        repo.insert_push(&make_push("B 1", "2024-05-30 10:00:00", 500.0, 0.0))
            .await
            .unwrap();
        repo.insert_push(&make_push("B 1", "2024-06-01 23:50:00", 1000.0, 30.0))
            .await
            .unwrap();
        let mut no_odometer = make_push("B 1", "2024-06-01 23:55:00", 0.0, 0.0);
        no_odometer.odometer = None;
        repo.insert_push(&no_odometer).await.unwrap();
        repo.insert_push(&make_push("B 1", "2024-06-02 00:10:00", 21000.0, 40.0))
            .await
            .unwrap();

        let samples = repo
            .samples_for_plate("B 1", date("2024-06-02"), date("2024-06-02"))
            .await
            .unwrap();

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].odometer, Some(1000.0));
        assert_eq!(samples[1].odometer, Some(21000.0));
    }

    #[tokio::test]
    async fn samples_for_plate_without_history_has_no_seed() {
        let repo = make_repo().await;
        repo.insert_push(&make_push("B 1", "2024-06-02 08:00:00", 1000.0, 5.0))
            .await
            .unwrap();

        let samples = repo
            .samples_for_plate("B 1", date("2024-06-02"), date("2024-06-02"))
            .await
            .unwrap();

        assert_eq!(samples.len(), 1);
    }

    #[tokio::test]
    async fn prune_older_than_removes_old_rows() {
        let repo = make_repo().await;
        let now = Utc::now();
        let push = make_push("B 1", "2024-06-01 08:00:00", 0.0, 0.0);
        repo.insert_push_at(&push, now - Duration::days(100)).await.unwrap();
        repo.insert_push_at(&push, now - Duration::days(10)).await.unwrap();
        repo.insert_push_at(&push, now).await.unwrap();

        let deleted = repo.prune_older_than(now - Duration::days(90)).await.unwrap();

        assert_eq!(deleted, 1);
        assert_eq!(repo.count_pushes().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn prune_returns_zero_when_nothing_to_prune() {
        let repo = make_repo().await;
        repo.insert_push(&make_push("B 1", "2024-06-01 08:00:00", 0.0, 0.0))
            .await
            .unwrap();
        let deleted = repo.prune_older_than(Utc::now() - Duration::hours(1)).await.unwrap();
        assert_eq!(deleted, 0);
    }

    #[tokio::test]
    async fn upsert_profile_inserts_then_updates() {
        let repo = make_repo().await;
        let mut profile = VehicleProfile {
            plate: "B 1".into(),
            imei: Some("359710000000001".into()),
            fuel_type: FuelCategory::Gasoline,
            efficiency_km_per_liter: None,
        };
        repo.upsert_profile(&profile).await.unwrap();

        profile.fuel_type = FuelCategory::Diesel;
        profile.efficiency_km_per_liter = Some(7.5);
        repo.upsert_profile(&profile).await.unwrap();

        let stored = repo.get_profile("B 1").await.unwrap().unwrap();
        assert_eq!(stored, profile);
        assert_eq!(repo.list_profiles().await.unwrap().len(), 1);

        let by_imei = repo.get_profile_by_imei("359710000000001").await.unwrap();
        assert_eq!(by_imei.map(|p| p.plate), Some("B 1".to_string()));
    }

    #[tokio::test]
    async fn missing_profile_is_none() {
        let repo = make_repo().await;
        assert!(repo.get_profile("nope").await.unwrap().is_none());
        assert!(repo.get_profile_by_imei("000").await.unwrap().is_none());
    }
}
