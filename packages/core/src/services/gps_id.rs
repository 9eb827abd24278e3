//! GPS.id backend client.
//!
//! Every endpoint wraps its payload as `{"message": {"data": ...}}`. Requests
//! carry a bearer token obtained from `/login` and cached for 55 minutes.
//! Network failures and 5xx responses are retried with exponential backoff
//! plus jitter; 401 drops the cached token so the next call logs in again.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use rand::Rng;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;

use crate::credentials::{token_lifetime, CredentialCache};
use crate::telemetry::provider::{
    HistoryRecord, MileageRecord, ProviderResult, ProviderVehicle, TelemetryProvider,
};
use crate::telemetry::ProviderError;

/// Rows requested per history page.
pub const HISTORY_PAGE_SIZE: u32 = 100;
/// History pages allowed per requested day: 6000 rows, one ping every 15 s.
pub const HISTORY_PAGES_PER_DAY: u32 = 60;
/// The mileage endpoint is queried in windows of at most this many days.
pub const MILEAGE_CHUNK_DAYS: i64 = 7;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    message: Option<EnvelopeMessage<T>>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeMessage<T> {
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    token: Option<String>,
}

#[derive(Clone)]
pub struct GpsIdClient {
    base_url: String,
    username: String,
    password: String,
    http: Client,
    credentials: Arc<Mutex<CredentialCache>>,
    max_retries: u32,
    base_backoff: Duration,
}

impl GpsIdClient {
    pub fn new(base_url: String, username: String, password: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            username,
            password,
            http: Client::new(),
            credentials: Arc::new(Mutex::new(CredentialCache::new())),
            max_retries: 2,
            base_backoff: Duration::from_millis(500),
        }
    }

    pub fn with_retry(mut self, max_retries: u32, base_backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.base_backoff = base_backoff;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Current bearer token, logging in when the cached one is missing or stale.
    pub async fn token(&self) -> ProviderResult<String> {
        // Held across the login so concurrent callers share one round-trip.
        let mut credentials = self.credentials.lock().await;
        let now = Utc::now();
        if let Some(token) = credentials.get(now) {
            return Ok(token);
        }

        let token = self.login().await?;
        credentials.set(token.clone(), now + token_lifetime());
        tracing::info!("Obtained new GPS provider token");
        Ok(token)
    }

    async fn login(&self) -> ProviderResult<String> {
        let request = self
            .http
            .post(format!("{}/login", self.base_url))
            .json(&json!({
                "username": self.username,
                "password": self.password,
            }));

        let response = self.send_with_retry(request).await?;
        let response = check_status(response)?;
        let login: Option<LoginData> = parse_envelope(response).await?;

        login
            .and_then(|data| data.token)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ProviderError::auth("Login response did not contain a token"))
    }

    async fn send_authorized<F>(&self, build: F) -> ProviderResult<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let token = self.token().await?;
        let request = build(&self.http).bearer_auth(&token);
        let response = self.send_with_retry(request).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            self.credentials.lock().await.invalidate();
            return Err(ProviderError::auth("GPS provider rejected the cached token"));
        }

        check_status(response)
    }

    async fn send_with_retry(&self, request: RequestBuilder) -> ProviderResult<Response> {
        let mut attempt: u32 = 0;
        loop {
            let pending = request
                .try_clone()
                .ok_or_else(|| ProviderError::network("Request body cannot be retried"))?;

            match pending.send().await {
                Ok(response)
                    if response.status().is_server_error() && attempt < self.max_retries =>
                {
                    tracing::warn!(
                        "GPS provider returned HTTP {} (attempt {}), retrying",
                        response.status(),
                        attempt + 1
                    );
                }
                Ok(response) => return Ok(response),
                Err(err) if attempt < self.max_retries => {
                    tracing::warn!(
                        "GPS provider request failed (attempt {}): {}",
                        attempt + 1,
                        err
                    );
                }
                Err(err) => return Err(ProviderError::network(err.to_string())),
            }

            attempt += 1;
            tokio::time::sleep(backoff_delay(self.base_backoff, attempt)).await;
        }
    }

    async fn fetch_history_page(
        &self,
        imei: &str,
        start: NaiveDate,
        end: NaiveDate,
        page: u32,
    ) -> ProviderResult<Vec<HistoryRecord>> {
        let url = format!("{}/report/history", self.base_url);
        let start_param = format!("{} 00:00:00", start);
        let end_param = format!("{} 23:59:59", end);
        let page_param = page.to_string();
        let per_page_param = HISTORY_PAGE_SIZE.to_string();

        let response = self
            .send_authorized(|http| {
                http.get(&url).query(&[
                    ("device", imei),
                    ("start", start_param.as_str()),
                    ("end", end_param.as_str()),
                    ("page", page_param.as_str()),
                    ("per_page", per_page_param.as_str()),
                ])
            })
            .await?;

        Ok(parse_envelope::<Vec<HistoryRecord>>(response)
            .await?
            .unwrap_or_default())
    }

    async fn fetch_mileage_chunk(
        &self,
        imei: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ProviderResult<Vec<MileageRecord>> {
        let url = format!("{}/data/mileage", self.base_url);
        let body = json!({
            "imei": imei,
            "start_date": start.to_string(),
            "end_date": end.to_string(),
        });

        let response = self
            .send_authorized(|http| http.post(&url).json(&body))
            .await?;

        Ok(parse_envelope::<Vec<MileageRecord>>(response)
            .await?
            .unwrap_or_default())
    }
}

#[async_trait]
impl TelemetryProvider for GpsIdClient {
    async fn list_vehicles(&self) -> ProviderResult<Vec<ProviderVehicle>> {
        let url = format!("{}/vehicle", self.base_url);
        let response = self.send_authorized(|http| http.get(&url)).await?;
        Ok(parse_envelope::<Vec<ProviderVehicle>>(response)
            .await?
            .unwrap_or_default())
    }

    async fn fetch_history(
        &self,
        imei: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ProviderResult<Vec<HistoryRecord>> {
        let max_pages = history_page_limit(start, end);
        let mut records = Vec::new();
        for page in 1..=max_pages {
            let batch = self.fetch_history_page(imei, start, end, page).await?;
            let short_page = batch.len() < HISTORY_PAGE_SIZE as usize;
            records.extend(batch);
            if short_page {
                return Ok(records);
            }
        }

        tracing::warn!("History for {} truncated at {} pages", imei, max_pages);
        Ok(records)
    }

    async fn fetch_mileage(
        &self,
        imei: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ProviderResult<Vec<MileageRecord>> {
        let mut records = Vec::new();
        for (chunk_start, chunk_end) in mileage_chunks(start, end) {
            records.extend(self.fetch_mileage_chunk(imei, chunk_start, chunk_end).await?);
        }
        Ok(records)
    }

    fn provider_name(&self) -> &str {
        "GPS.id"
    }
}

/// Page budget for a history request over `[start, end]`; at least one day.
pub fn history_page_limit(start: NaiveDate, end: NaiveDate) -> u32 {
    let days = ((end - start).num_days() + 1).clamp(1, u32::MAX as i64) as u32;
    days.saturating_mul(HISTORY_PAGES_PER_DAY)
}

/// Split `[start, end]` into consecutive windows of at most seven days.
pub fn mileage_chunks(start: NaiveDate, end: NaiveDate) -> Vec<(NaiveDate, NaiveDate)> {
    let mut chunks = Vec::new();
    let mut current = start;
    while current <= end {
        let chunk_end = (current + ChronoDuration::days(MILEAGE_CHUNK_DAYS - 1)).min(end);
        chunks.push((current, chunk_end));
        current = chunk_end + ChronoDuration::days(1);
    }
    chunks
}

fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exponential = base.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
    let jitter_ceiling = (base.as_millis() as u64 / 2).max(1);
    let jitter = rand::thread_rng().gen_range(0..=jitter_ceiling);
    exponential + Duration::from_millis(jitter)
}

fn check_status(response: Response) -> ProviderResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(match status {
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimitExceeded,
        StatusCode::SERVICE_UNAVAILABLE => ProviderError::ServiceUnavailable,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ProviderError::auth(format!("GPS provider returned HTTP {}", status))
        }
        _ => ProviderError::network(format!("GPS provider returned HTTP {}", status)),
    })
}

async fn parse_envelope<T: DeserializeOwned>(response: Response) -> ProviderResult<Option<T>> {
    let envelope = response.json::<Envelope<T>>().await.map_err(|err| {
        ProviderError::format(format!("Failed to parse provider response: {}", err))
    })?;
    Ok(envelope.message.and_then(|message| message.data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use wiremock::{
        matchers::{body_partial_json, header, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn wrap(data: Value) -> Value {
        json!({ "message": { "data": data } })
    }

    async fn mount_login(server: &MockServer, token: &str, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/login"))
            .and(body_partial_json(json!({ "username": "fleet" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(wrap(json!({ "token": token }))))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    fn client_for(server: &MockServer) -> GpsIdClient {
        GpsIdClient::new(server.uri(), "fleet".into(), "secret".into())
            .with_retry(1, Duration::from_millis(1))
    }

    #[test]
    fn mileage_chunks_cover_range_in_seven_day_windows() {
        let chunks = mileage_chunks(date("2024-06-01"), date("2024-06-15"));
        assert_eq!(
            chunks,
            vec![
                (date("2024-06-01"), date("2024-06-07")),
                (date("2024-06-08"), date("2024-06-14")),
                (date("2024-06-15"), date("2024-06-15")),
            ]
        );
    }

    #[test]
    fn history_page_limit_grows_with_range() {
        assert_eq!(
            history_page_limit(date("2024-06-01"), date("2024-06-01")),
            HISTORY_PAGES_PER_DAY
        );
        assert_eq!(
            history_page_limit(date("2024-06-01"), date("2024-06-07")),
            7 * HISTORY_PAGES_PER_DAY
        );
        assert_eq!(
            history_page_limit(date("2024-06-02"), date("2024-06-01")),
            HISTORY_PAGES_PER_DAY
        );
    }

    #[tokio::test]
    async fn history_stops_at_page_budget_for_range() {
        let server = MockServer::start().await;
        mount_login(&server, "tok-1", 1).await;

        let full_page: Vec<Value> = (0..HISTORY_PAGE_SIZE)
            .map(|i| json!({ "time": "2024-06-01 08:00:00", "odometer": i }))
            .collect();
        Mock::given(method("GET"))
            .and(path("/report/history"))
            .respond_with(ResponseTemplate::new(200).set_body_json(wrap(Value::Array(full_page))))
            .expect(u64::from(HISTORY_PAGES_PER_DAY))
            .mount(&server)
            .await;

        let records = client_for(&server)
            .fetch_history("359710000000001", date("2024-06-01"), date("2024-06-01"))
            .await
            .unwrap();

        assert_eq!(records.len(), (HISTORY_PAGES_PER_DAY * HISTORY_PAGE_SIZE) as usize);
    }

    #[tokio::test]
    async fn history_rows_carrying_both_field_names_parse() {
        let server = MockServer::start().await;
        mount_login(&server, "tok-1", 1).await;
        Mock::given(method("GET"))
            .and(path("/report/history"))
            .respond_with(ResponseTemplate::new(200).set_body_json(wrap(json!([{
                "time": "2024-06-01 08:00:00",
                "gps_time": "2024-06-01 08:00:01",
                "odometer": 1000,
                "mileage": 1000,
                "speed": 10
            }]))))
            .mount(&server)
            .await;

        let records = client_for(&server)
            .fetch_history("359710000000001", date("2024-06-01"), date("2024-06-01"))
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].timestamp.as_deref(), Some("2024-06-01 08:00:00"));
        assert_eq!(records[0].odometer, Some(1000.0));
    }

    #[test]
    fn mileage_chunks_empty_for_reversed_range() {
        assert!(mileage_chunks(date("2024-06-02"), date("2024-06-01")).is_empty());
    }

    #[tokio::test]
    async fn token_is_cached_across_requests() {
        let server = MockServer::start().await;
        mount_login(&server, "tok-1", 1).await;
        Mock::given(method("GET"))
            .and(path("/vehicle"))
            .and(header("authorization", "Bearer tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(wrap(json!([
                { "imei": "359710000000001", "plate": "B 1234 XYZ" },
                { "imei": 359710000000002u64 }
            ]))))
            .expect(2)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let first = client.list_vehicles().await.unwrap();
        let second = client.list_vehicles().await.unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(first[0].display_plate(), "B 1234 XYZ");
        assert_eq!(first[1].imei.as_deref(), Some("359710000000002"));
        assert_eq!(first[1].display_plate(), "-");
        assert_eq!(second.len(), 2);
    }

    #[tokio::test]
    async fn login_without_token_is_an_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(wrap(json!({}))))
            .mount(&server)
            .await;

        let err = client_for(&server).list_vehicles().await.unwrap_err();
        assert!(matches!(err, ProviderError::AuthError { .. }));
    }

    #[tokio::test]
    async fn unauthorized_response_forces_new_login() {
        let server = MockServer::start().await;
        mount_login(&server, "tok-1", 2).await;
        Mock::given(method("GET"))
            .and(path("/vehicle"))
            .respond_with(ResponseTemplate::new(401))
            .expect(2)
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(matches!(
            client.list_vehicles().await.unwrap_err(),
            ProviderError::AuthError { .. }
        ));
        assert!(client.list_vehicles().await.is_err());
    }

    #[tokio::test]
    async fn server_errors_are_retried_then_surfaced() {
        let server = MockServer::start().await;
        mount_login(&server, "tok-1", 1).await;
        Mock::given(method("GET"))
            .and(path("/vehicle"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let err = client_for(&server).list_vehicles().await.unwrap_err();
        assert!(matches!(err, ProviderError::ServiceUnavailable));
    }

    #[tokio::test]
    async fn history_pages_until_short_page() {
        let server = MockServer::start().await;
        mount_login(&server, "tok-1", 1).await;

        let full_page: Vec<Value> = (0..HISTORY_PAGE_SIZE)
            .map(|i| {
                json!({
                    "time": format!("2024-06-01 08:{:02}:00", i % 60),
                    "mileage": 1000 + i,
                    "speed": 30,
                })
            })
            .collect();
        Mock::given(method("GET"))
            .and(path("/report/history"))
            .and(query_param("device", "359710000000001"))
            .and(query_param("start", "2024-06-01 00:00:00"))
            .and(query_param("end", "2024-06-02 23:59:59"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(wrap(Value::Array(full_page))))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/report/history"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(wrap(json!([
                { "time": "2024-06-02 09:00:00", "mileage": "5000", "speed": "12.5" },
                { "time": "2024-06-02 10:00:00", "odometer": 6000 }
            ]))))
            .expect(1)
            .mount(&server)
            .await;

        let records = client_for(&server)
            .fetch_history("359710000000001", date("2024-06-01"), date("2024-06-02"))
            .await
            .unwrap();

        assert_eq!(records.len(), HISTORY_PAGE_SIZE as usize + 2);
        let last_two = &records[records.len() - 2..];
        assert_eq!(last_two[0].odometer, Some(5000.0));
        assert_eq!(last_two[0].speed, Some(12.5));
        assert_eq!(last_two[1].odometer, Some(6000.0));
    }

    #[tokio::test]
    async fn mileage_is_fetched_in_weekly_chunks() {
        let server = MockServer::start().await;
        mount_login(&server, "tok-1", 1).await;
        Mock::given(method("POST"))
            .and(path("/data/mileage"))
            .and(body_partial_json(json!({ "imei": "359710000000001" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(wrap(json!([{ "mileage": 1500 }]))),
            )
            .expect(2)
            .mount(&server)
            .await;

        let records = client_for(&server)
            .fetch_mileage("359710000000001", date("2024-06-01"), date("2024-06-14"))
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].mileage, Some(1500.0));
    }

    #[tokio::test]
    async fn missing_data_is_treated_as_empty() {
        let server = MockServer::start().await;
        mount_login(&server, "tok-1", 1).await;
        Mock::given(method("GET"))
            .and(path("/vehicle"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": {} })))
            .mount(&server)
            .await;

        let vehicles = client_for(&server).list_vehicles().await.unwrap();
        assert!(vehicles.is_empty());
    }
}
