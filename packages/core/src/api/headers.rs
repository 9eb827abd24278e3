//! Conditional-GET helpers for cached JSON reports.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};

/// Strong, quoted ETag derived from the serialized body.
pub fn compute_etag(body: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("\"{:016x}\"", hasher.finish())
}

/// `private, max-age=N`
pub fn cache_control(max_age_seconds: u64) -> HeaderValue {
    HeaderValue::from_str(&format!("private, max-age={}", max_age_seconds))
        .unwrap_or_else(|_| HeaderValue::from_static("no-cache"))
}

/// RFC 7231 IMF-fixdate.
pub fn http_date(timestamp: DateTime<Utc>) -> Option<HeaderValue> {
    HeaderValue::from_str(&timestamp.format("%a, %d %b %Y %H:%M:%S GMT").to_string()).ok()
}

/// True when `If-None-Match` lists `*` or `etag`. Weak validators (`W/"..."`)
/// compare equal to their strong form.
pub fn if_none_match_matches(headers: &HeaderMap, etag: &str) -> bool {
    headers
        .get_all(header::IF_NONE_MATCH)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| raw.split(','))
        .map(|tag| tag.trim())
        .map(|tag| tag.strip_prefix("W/").unwrap_or(tag))
        .any(|tag| tag == "*" || tag == etag)
}

/// A rendered JSON body together with its validators.
#[derive(Debug, Clone)]
pub struct CachedJson {
    pub body: Vec<u8>,
    pub etag: String,
    pub generated_at: DateTime<Utc>,
}

impl CachedJson {
    pub fn new(body: Vec<u8>, generated_at: DateTime<Utc>) -> Self {
        let etag = compute_etag(&body);
        Self {
            body,
            etag,
            generated_at,
        }
    }

    /// `304` when the client already holds this body, otherwise `200` with it.
    pub fn into_conditional_response(
        self,
        request_headers: &HeaderMap,
        max_age_seconds: u64,
    ) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(header::CACHE_CONTROL, cache_control(max_age_seconds));
        if let Ok(etag) = HeaderValue::from_str(&self.etag) {
            headers.insert(header::ETAG, etag);
        }
        if let Some(last_modified) = http_date(self.generated_at) {
            headers.insert(header::LAST_MODIFIED, last_modified);
        }

        if if_none_match_matches(request_headers, &self.etag) {
            return (StatusCode::NOT_MODIFIED, headers).into_response();
        }

        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        (StatusCode::OK, headers, Body::from(self.body)).into_response()
    }
}
