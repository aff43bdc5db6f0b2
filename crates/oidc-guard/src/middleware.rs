//! The validation pipeline
//!
//! [`AuthMiddleware`] owns the trust policy, the tenant cache and the key
//! provider for one service. [`AuthMiddleware::parse_and_validate_jwt`] runs
//! the stages strictly in order:
//!
//! ```text
//! decode -> resolve tenant -> validate claims -> verify signature -> valid
//! ```
//!
//! Before the signature stage, a tenant whose key set has expired is
//! refetched from its provider.
//!
//! The first failing stage ends the run with its error; later stages never
//! see a rejected token. The pipeline itself never retries.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::config::ValidationOptions;
use crate::error::{ConfigError, TokenError};
use crate::provider::{KeyMaterialProvider, OidcKeyProvider};
use crate::tenant::{CacheStats, TenantCache, TenantResolver};
use crate::token::Token;
use crate::{claims, signature};

/// Bearer token validator for one service
///
/// Cheap to share behind an [`Arc`]; every method takes `&self`.
#[derive(Debug)]
pub struct AuthMiddleware {
    options: Arc<ValidationOptions>,
    resolver: TenantResolver,
}

impl AuthMiddleware {
    /// Create a validator that discovers keys over OIDC
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the options are invalid or the HTTP client
    /// cannot be built.
    pub fn new(options: ValidationOptions) -> Result<Self, ConfigError> {
        options.validate()?;
        let provider = OidcKeyProvider::new(&options.http)?;
        Self::with_provider(options, Arc::new(provider))
    }

    /// Create a validator backed by a custom key material provider
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the options are invalid.
    pub fn with_provider(
        options: ValidationOptions,
        provider: Arc<dyn KeyMaterialProvider>,
    ) -> Result<Self, ConfigError> {
        options.validate()?;
        let resolver = TenantResolver::new(&options, provider)?;
        Ok(Self {
            options: Arc::new(options),
            resolver,
        })
    }

    /// The trust policy in effect
    pub fn options(&self) -> &ValidationOptions {
        &self.options
    }

    /// The tenant cache
    pub fn tenant_cache(&self) -> &TenantCache {
        self.resolver.cache()
    }

    /// Tenant cache statistics
    pub fn cache_stats(&self) -> CacheStats {
        self.resolver.cache().stats()
    }

    /// Drop expired tenants, returning how many were removed
    pub fn purge_expired_tenants(&self) -> usize {
        self.resolver.cache().purge_expired()
    }

    /// Decode, resolve, check and verify a compact JWT
    ///
    /// On success the returned token is marked valid and exposes its generic
    /// claim map through [`Token::claims_map`].
    ///
    /// # Errors
    ///
    /// Returns the [`TokenError`] of the first stage that rejected the token.
    #[instrument(level = "debug", skip_all)]
    pub async fn parse_and_validate_jwt(&self, raw: &str) -> Result<Token, TokenError> {
        let mut token = Token::decode_unverified(raw).inspect_err(|e| {
            debug!(error = %e, "Rejecting malformed token");
        })?;

        let issuer = token.claims().issuer();
        let tenant = self.resolver.resolve(issuer).await?;

        claims::validate(token.claims(), &tenant, &self.options).inspect_err(|e| {
            warn!(issuer = tenant.issuer(), error = %e, "Token claims rejected");
        })?;

        let tenant = self.resolver.current_keys(tenant).await?;
        signature::verify(&token, &tenant, &self.options)?;

        token.mark_valid();
        debug!(
            issuer = tenant.issuer(),
            subject = ?token.claims().sub,
            "Token validated"
        );
        Ok(token)
    }
}
