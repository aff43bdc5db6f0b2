//! Tenant resolution
//!
//! Turns a token's `iss` claim into a live [`Tenant`]:
//!
//! 1. Parse the claim as an absolute URL with a host
//! 2. Compare that host against the configured binding host
//! 3. Serve a live cache entry if there is one
//! 4. Otherwise fetch through the [`FetchCoalescer`], cache the result under
//!    the provider-reported issuer and return it
//!
//! The trust check runs before the cache and the network, so an untrusted
//! issuer never causes a remote call. Failed fetches are not cached.
//!
//! A cached tenant can outlive its key set. [`TenantResolver::current_keys`]
//! refetches a tenant whose keys have expired before a signature is checked.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use url::Url;

use super::{FetchCoalescer, Tenant, TenantCache};
use crate::config::ValidationOptions;
use crate::error::{ConfigError, SharedError, TokenError, UnverifiableReason};
use crate::provider::KeyMaterialProvider;

/// Resolves issuers to tenants with caching and coalesced fetches
pub struct TenantResolver {
    binding_host: String,
    cache: Arc<TenantCache>,
    coalescer: FetchCoalescer<Arc<Tenant>, SharedError>,
    provider: Arc<dyn KeyMaterialProvider>,
    keys_ttl: Duration,
}

impl std::fmt::Debug for TenantResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantResolver")
            .field("binding_host", &self.binding_host)
            .field("cache", &self.cache)
            .field("coalescer", &self.coalescer)
            .field("keys_ttl", &self.keys_ttl)
            .finish_non_exhaustive()
    }
}

impl TenantResolver {
    /// Create a resolver trusting the host of `options.issuer_binding_url`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the binding URL has no host.
    pub fn new(
        options: &ValidationOptions,
        provider: Arc<dyn KeyMaterialProvider>,
    ) -> Result<Self, ConfigError> {
        let binding_host = options
            .binding_host()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| ConfigError::Invalid {
                field: "issuer_binding_url",
                reason: format!("{} has no host", options.issuer_binding_url),
            })?
            .to_string();

        Ok(Self {
            binding_host,
            cache: Arc::new(TenantCache::new(options.tenant_cache_ttl)),
            coalescer: FetchCoalescer::new(),
            provider,
            keys_ttl: options.keys_ttl,
        })
    }

    /// Host every issuer must live on
    pub fn binding_host(&self) -> &str {
        &self.binding_host
    }

    /// The tenant cache
    pub fn cache(&self) -> &TenantCache {
        &self.cache
    }

    /// Resolve `issuer_claim` to a live tenant
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Unverifiable`] with
    /// - [`UnverifiableReason::BadIssuerUrl`] if the claim is not an absolute URL with a host
    /// - [`UnverifiableReason::UntrustedIssuer`] if its host differs from the binding host
    /// - [`UnverifiableReason::KeysetUnavailable`] if the provider fetch failed
    pub async fn resolve(&self, issuer_claim: &str) -> Result<Arc<Tenant>, TokenError> {
        let issuer_url = Url::parse(issuer_claim).map_err(|e| {
            debug!(issuer = issuer_claim, error = %e, "Issuer is not a URL");
            TokenError::unverifiable_with(UnverifiableReason::BadIssuerUrl, Arc::new(e))
        })?;

        let Some(host) = issuer_url.host_str() else {
            debug!(issuer = issuer_claim, "Issuer URL has no host");
            return Err(TokenError::unverifiable(UnverifiableReason::BadIssuerUrl));
        };

        if host != self.binding_host {
            warn!(
                issuer = issuer_claim,
                expected_host = %self.binding_host,
                "Rejecting token from untrusted issuer"
            );
            return Err(TokenError::unverifiable(UnverifiableReason::UntrustedIssuer));
        }

        if let Some((tenant, expires_at)) = self.cache.get_with_expiration(issuer_claim)
            && Instant::now() < expires_at
        {
            debug!(issuer = issuer_claim, "Tenant cache hit");
            return Ok(tenant);
        }
        debug!(issuer = issuer_claim, "Tenant cache miss");

        self.fetch(issuer_claim, issuer_url).await.map_err(|e| {
            warn!(issuer = issuer_claim, error = %e, "Failed to fetch tenant key set");
            TokenError::unverifiable_with(UnverifiableReason::KeysetUnavailable, e)
        })
    }

    /// Return `tenant` if its keys are still current, or refetch it
    ///
    /// The refreshed tenant replaces the cached one.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Unverifiable`] with
    /// [`UnverifiableReason::KeyFetchFailed`] if the refresh failed. The
    /// stale tenant stays cached until its own entry expires.
    pub async fn current_keys(&self, tenant: Arc<Tenant>) -> Result<Arc<Tenant>, TokenError> {
        if !tenant.keys_expired() {
            return Ok(tenant);
        }
        let issuer = tenant.issuer();
        debug!(issuer, "Tenant keys expired, refreshing");

        let issuer_url = Url::parse(issuer).map_err(|e| {
            warn!(issuer, error = %e, "Cannot refresh keys for issuer");
            TokenError::unverifiable_with(UnverifiableReason::KeyFetchFailed, Arc::new(e))
        })?;

        self.fetch(issuer, issuer_url).await.map_err(|e| {
            warn!(issuer, error = %e, "Failed to refresh tenant keys");
            TokenError::unverifiable_with(UnverifiableReason::KeyFetchFailed, e)
        })
    }

    /// Fetch through the coalescer and cache the result
    async fn fetch(&self, key: &str, issuer_url: Url) -> Result<Arc<Tenant>, SharedError> {
        let provider = Arc::clone(&self.provider);
        let cache = Arc::clone(&self.cache);
        let keys_ttl = self.keys_ttl;
        self.coalescer
            .run(key, move || async move {
                let mut tenant = provider
                    .fetch(&issuer_url)
                    .await
                    .map_err(|e| Arc::new(e) as SharedError)?;
                if tenant.keys_ttl().is_none() {
                    tenant = tenant.with_keys_ttl(keys_ttl);
                }
                let tenant = Arc::new(tenant);
                cache.set_default(tenant.issuer(), Arc::clone(&tenant));
                Ok(tenant)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use async_trait::async_trait;
    use jsonwebtoken::jwk::JwkSet;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    /// Returns a fixed issuer, or fails when `fail` is set
    struct StaticProvider {
        issuer: &'static str,
        fail: AtomicBool,
        calls: AtomicUsize,
    }

    impl StaticProvider {
        fn new(issuer: &'static str) -> Arc<Self> {
            Arc::new(Self {
                issuer,
                fail: AtomicBool::new(false),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                issuer: "",
                fail: AtomicBool::new(true),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl KeyMaterialProvider for StaticProvider {
        async fn fetch(&self, issuer: &Url) -> Result<Tenant, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(ProviderError::Status {
                    url: issuer.to_string(),
                    status: 503,
                });
            }
            Ok(Tenant::new(self.issuer, JwkSet { keys: vec![] }))
        }
    }

    fn options() -> ValidationOptions {
        ValidationOptions::new("svc-1", Url::parse("https://idp.example.com").unwrap())
    }

    #[tokio::test]
    async fn test_bad_issuer_url() {
        let provider = StaticProvider::new("https://idp.example.com");
        let resolver = TenantResolver::new(&options(), provider.clone()).unwrap();

        for issuer in ["", "idp.example.com", "not a url", "urn:example:idp"] {
            let err = resolver.resolve(issuer).await.unwrap_err();
            assert_eq!(
                err.unverifiable_reason(),
                Some(UnverifiableReason::BadIssuerUrl),
                "issuer {issuer:?}"
            );
        }
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_untrusted_issuer_never_reaches_provider() {
        let provider = StaticProvider::new("https://evil.example.com");
        let resolver = TenantResolver::new(&options(), provider.clone()).unwrap();

        let err = resolver
            .resolve("https://evil.example.com")
            .await
            .unwrap_err();
        assert_eq!(
            err.unverifiable_reason(),
            Some(UnverifiableReason::UntrustedIssuer)
        );
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_second_resolution_is_served_from_cache() {
        let provider = StaticProvider::new("https://idp.example.com");
        let resolver = TenantResolver::new(&options(), provider.clone()).unwrap();

        let first = resolver.resolve("https://idp.example.com").await.unwrap();
        let second = resolver.resolve("https://idp.example.com").await.unwrap();

        assert_eq!(provider.calls(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(resolver.cache().len(), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_triggers_refetch() {
        let provider = StaticProvider::new("https://idp.example.com");
        let resolver = TenantResolver::new(
            &options().with_tenant_cache_ttl(Duration::ZERO),
            provider.clone(),
        )
        .unwrap();

        let first = resolver.resolve("https://idp.example.com").await.unwrap();
        let second = resolver.resolve("https://idp.example.com").await.unwrap();

        assert_eq!(provider.calls(), 2);
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let provider = StaticProvider::failing();
        let resolver = TenantResolver::new(&options(), provider.clone()).unwrap();

        for _ in 0..2 {
            let err = resolver.resolve("https://idp.example.com").await.unwrap_err();
            assert_eq!(
                err.unverifiable_reason(),
                Some(UnverifiableReason::KeysetUnavailable)
            );
            assert!(err.is_retryable());
        }
        assert_eq!(provider.calls(), 2);
        assert!(resolver.cache().is_empty());
    }

    #[tokio::test]
    async fn test_cache_is_keyed_by_provider_issuer() {
        let provider = StaticProvider::new("https://idp.example.com/");
        let resolver = TenantResolver::new(&options(), provider.clone()).unwrap();

        let tenant = resolver.resolve("https://idp.example.com").await.unwrap();
        assert_eq!(tenant.issuer(), "https://idp.example.com/");
        assert!(resolver.cache().get("https://idp.example.com/").is_some());
        assert!(resolver.cache().get("https://idp.example.com").is_none());
    }

    #[tokio::test]
    async fn test_fetched_tenant_gets_default_keys_ttl() {
        let provider = StaticProvider::new("https://idp.example.com");
        let resolver = TenantResolver::new(
            &options().with_keys_ttl(Duration::from_secs(42)),
            provider.clone(),
        )
        .unwrap();

        let tenant = resolver.resolve("https://idp.example.com").await.unwrap();
        assert_eq!(tenant.keys_ttl(), Some(Duration::from_secs(42)));
        assert!(!tenant.keys_expired());

        let current = resolver.current_keys(Arc::clone(&tenant)).await.unwrap();
        assert!(Arc::ptr_eq(&tenant, &current));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_expired_keys_are_refreshed() {
        let provider = StaticProvider::new("https://idp.example.com");
        let resolver = TenantResolver::new(
            &options().with_keys_ttl(Duration::ZERO),
            provider.clone(),
        )
        .unwrap();

        let stale = resolver.resolve("https://idp.example.com").await.unwrap();
        assert!(stale.keys_expired());

        let fresh = resolver.current_keys(Arc::clone(&stale)).await.unwrap();
        assert!(!Arc::ptr_eq(&stale, &fresh));
        assert_eq!(provider.calls(), 2);
        let cached = resolver.cache().get("https://idp.example.com").unwrap();
        assert!(Arc::ptr_eq(&cached, &fresh));
    }

    #[tokio::test]
    async fn test_failed_key_refresh_is_key_fetch_failed() {
        let provider = StaticProvider::new("https://idp.example.com");
        let resolver = TenantResolver::new(
            &options().with_keys_ttl(Duration::ZERO),
            provider.clone(),
        )
        .unwrap();

        let stale = resolver.resolve("https://idp.example.com").await.unwrap();
        provider.fail.store(true, Ordering::SeqCst);

        let err = resolver.current_keys(stale).await.unwrap_err();
        assert_eq!(
            err.unverifiable_reason(),
            Some(UnverifiableReason::KeyFetchFailed)
        );
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.is_retryable());
        assert_eq!(provider.calls(), 2);
    }
}
