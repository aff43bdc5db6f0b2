//! Tenants: resolved identity providers and their signing keys
//!
//! A [`Tenant`] is what a [`KeyMaterialProvider`](crate::KeyMaterialProvider)
//! returns for an issuer: the authoritative issuer string from the provider
//! metadata plus the current key set and its lifetime. Tenants are immutable. A refresh builds
//! a new `Tenant` and replaces the cache entry, so concurrent readers holding
//! an `Arc<Tenant>` never see a half-updated value.
//!
//! - [`cache`] - expiring per-issuer tenant cache
//! - [`coalesce`] - single-flight de-duplication of remote fetches
//! - [`resolver`] - issuer trust check + cache + coalesced fetch

pub mod cache;
pub mod coalesce;
pub mod resolver;

pub use cache::{CacheStats, TenantCache};
pub use coalesce::FetchCoalescer;
pub use resolver::TenantResolver;

use std::time::{Duration, SystemTime};

use jsonwebtoken::jwk::{Jwk, JwkSet};

/// A resolved identity provider
#[derive(Debug, Clone)]
pub struct Tenant {
    issuer: String,
    jwks_uri: Option<String>,
    keys: Vec<Jwk>,
    fetched_at: SystemTime,
    keys_ttl: Option<Duration>,
}

impl Tenant {
    /// Build a tenant from provider metadata and its key set
    ///
    /// `issuer` must be the issuer reported by the provider, not the URL the
    /// metadata was requested from.
    pub fn new(issuer: impl Into<String>, keys: JwkSet) -> Self {
        Self {
            issuer: issuer.into(),
            jwks_uri: None,
            keys: keys.keys,
            fetched_at: SystemTime::now(),
            keys_ttl: None,
        }
    }

    /// Limit how long the key set may be used after `fetched_at`
    ///
    /// Without a TTL the keys stay usable for as long as the tenant is cached.
    #[must_use]
    pub fn with_keys_ttl(mut self, ttl: Duration) -> Self {
        self.keys_ttl = Some(ttl);
        self
    }

    /// Record where the key set was retrieved from
    #[must_use]
    pub fn with_jwks_uri(mut self, jwks_uri: impl Into<String>) -> Self {
        self.jwks_uri = Some(jwks_uri.into());
        self
    }

    /// Authoritative issuer from the provider metadata
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// JWKS endpoint the keys came from, if known
    pub fn jwks_uri(&self) -> Option<&str> {
        self.jwks_uri.as_deref()
    }

    /// Signing keys in the order the provider published them
    pub fn keys(&self) -> &[Jwk] {
        &self.keys
    }

    /// First key whose `kid` equals `kid`
    pub fn find_key(&self, kid: &str) -> Option<&Jwk> {
        self.keys
            .iter()
            .find(|jwk| jwk.common.key_id.as_deref() == Some(kid))
    }

    /// When the provider was queried
    pub fn fetched_at(&self) -> SystemTime {
        self.fetched_at
    }

    /// Key set lifetime, if one was set
    pub fn keys_ttl(&self) -> Option<Duration> {
        self.keys_ttl
    }

    /// When the key set stops being usable
    pub fn expires_at(&self) -> Option<SystemTime> {
        self.keys_ttl
            .and_then(|ttl| self.fetched_at.checked_add(ttl))
    }

    /// Whether the key set must be fetched again before use
    pub fn keys_expired(&self) -> bool {
        let Some(ttl) = self.keys_ttl else {
            return false;
        };
        match SystemTime::now().duration_since(self.fetched_at) {
            Ok(age) => age >= ttl,
            // Clock went backwards
            Err(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn keys(kids: &[&str]) -> JwkSet {
        let keys: Vec<_> = kids
            .iter()
            .map(|kid| {
                json!({
                    "kty": "oct",
                    "kid": kid,
                    "alg": "HS256",
                    "k": "dGVuYW50LXNpZ25pbmctc2VjcmV0LWZvci1pbnRlZ3JhdGlvbi10ZXN0cy0wMDAx"
                })
            })
            .collect();
        serde_json::from_value(json!({ "keys": keys })).unwrap()
    }

    #[test]
    fn test_find_key_first_match_wins() {
        let tenant = Tenant::new("https://idp.example.com", keys(&["a", "b", "a"]));
        assert_eq!(tenant.keys().len(), 3);
        let found = tenant.find_key("a").unwrap();
        assert!(std::ptr::eq(found, &tenant.keys()[0]));
        assert!(tenant.find_key("c").is_none());
    }

    #[test]
    fn test_metadata_accessors() {
        let tenant = Tenant::new("https://idp.example.com", keys(&[]))
            .with_jwks_uri("https://idp.example.com/keys");
        assert_eq!(tenant.issuer(), "https://idp.example.com");
        assert_eq!(tenant.jwks_uri(), Some("https://idp.example.com/keys"));
        assert!(tenant.keys().is_empty());
        assert!(tenant.fetched_at() <= SystemTime::now());
        assert_eq!(tenant.expires_at(), None);
        assert!(!tenant.keys_expired());
    }

    #[test]
    fn test_keys_ttl() {
        let fresh = Tenant::new("https://idp.example.com", keys(&["a"]))
            .with_keys_ttl(Duration::from_secs(600));
        assert_eq!(fresh.keys_ttl(), Some(Duration::from_secs(600)));
        assert_eq!(
            fresh.expires_at(),
            Some(fresh.fetched_at() + Duration::from_secs(600))
        );
        assert!(!fresh.keys_expired());

        let stale = Tenant::new("https://idp.example.com", keys(&["a"]))
            .with_keys_ttl(Duration::ZERO);
        assert!(stale.keys_expired());
    }
}
