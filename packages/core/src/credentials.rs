//! Bearer-token cache for the GPS provider.
//!
//! The clock is always passed in, so expiry is testable without sleeping.

use chrono::{DateTime, Duration, Utc};

/// How long a freshly issued provider token is trusted.
pub fn token_lifetime() -> Duration {
    Duration::minutes(55)
}

#[derive(Debug, Default, Clone)]
pub struct CredentialCache {
    token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

impl CredentialCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token valid at `now`, if any.
    pub fn get(&self, now: DateTime<Utc>) -> Option<String> {
        match (&self.token, self.expires_at) {
            (Some(token), Some(expires_at)) if now < expires_at => Some(token.clone()),
            _ => None,
        }
    }

    pub fn set(&mut self, token: String, expires_at: DateTime<Utc>) {
        self.token = Some(token);
        self.expires_at = Some(expires_at);
    }

    pub fn invalidate(&mut self) {
        self.token = None;
        self.expires_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_cache_has_no_token() {
        assert!(CredentialCache::new().get(Utc::now()).is_none());
    }

    #[test]
    fn token_is_returned_until_expiry() {
        let now = Utc::now();
        let mut cache = CredentialCache::new();
        cache.set("abc".to_string(), now + token_lifetime());

        assert_eq!(cache.get(now).as_deref(), Some("abc"));
        assert_eq!(cache.get(now + Duration::minutes(54)).as_deref(), Some("abc"));
        assert!(cache.get(now + Duration::minutes(55)).is_none());
    }

    #[test]
    fn invalidate_drops_token() {
        let now = Utc::now();
        let mut cache = CredentialCache::new();
        cache.set("abc".to_string(), now + token_lifetime());
        cache.invalidate();

        assert!(cache.get(now).is_none());
    }
}
