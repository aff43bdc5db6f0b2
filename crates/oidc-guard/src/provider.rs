//! Key material providers
//!
//! A [`KeyMaterialProvider`] turns an issuer URL into a [`Tenant`]: the
//! provider-reported issuer plus its current signing keys. The resolver only
//! ever talks to this trait, so tests and hosts with their own key
//! distribution can plug in a different source.
//!
//! [`OidcKeyProvider`] is the network implementation. It performs OpenID
//! Connect Discovery 1.0 and then fetches the advertised JWKS:
//!
//! 1. `GET {issuer}/.well-known/openid-configuration`
//! 2. `GET {jwks_uri}`
//!
//! Redirects are not followed, every request is bounded by the configured
//! timeout, and responses above the size limit are rejected before parsing.

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use url::Url;

use crate::config::HttpClientConfig;
use crate::error::ProviderError;
use crate::tenant::Tenant;

/// Well-known path of the OpenID Provider configuration document
pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// Source of tenant key material
#[async_trait]
pub trait KeyMaterialProvider: Send + Sync {
    /// Resolve `issuer` into a tenant with its current key set
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] if the metadata or keys cannot be retrieved.
    async fn fetch(&self, issuer: &Url) -> Result<Tenant, ProviderError>;
}

/// The subset of OpenID Provider Metadata needed to locate signing keys
#[derive(Debug, Clone, Deserialize)]
struct ProviderMetadata {
    issuer: String,
    jwks_uri: String,
}

/// OIDC discovery + JWKS provider
#[derive(Debug, Clone)]
pub struct OidcKeyProvider {
    client: reqwest::Client,
    config: HttpClientConfig,
}

impl OidcKeyProvider {
    /// Create a provider with its own HTTP client
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Client`] if the HTTP client cannot be built.
    pub fn new(config: &HttpClientConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(ProviderError::Client)?;

        Ok(Self::with_client(client, config.clone()))
    }

    /// Create a provider on top of an existing HTTP client
    ///
    /// The client's own timeout and redirect policy apply; the response size
    /// limit from `config` is still enforced.
    pub fn with_client(client: reqwest::Client, config: HttpClientConfig) -> Self {
        Self { client, config }
    }

    /// Discovery document URL for `issuer`
    ///
    /// The issuer path is kept, so `https://idp.example.com/tenant-a` maps to
    /// `https://idp.example.com/tenant-a/.well-known/openid-configuration`.
    pub fn discovery_url(issuer: &Url) -> Url {
        let mut url = issuer.clone();
        let path = format!("{}{DISCOVERY_PATH}", issuer.path().trim_end_matches('/'));
        url.set_path(&path);
        url.set_query(None);
        url.set_fragment(None);
        url
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ProviderError> {
        let response = self
            .client
            .get(url)
            .header(http::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|source| ProviderError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let limit = self.config.max_response_size;
        if let Some(content_length) = response.content_length()
            && content_length > limit as u64
        {
            return Err(ProviderError::ResponseTooLarge {
                url: url.to_string(),
                limit,
            });
        }

        let body = response.bytes().await.map_err(|source| ProviderError::Http {
            url: url.to_string(),
            source,
        })?;

        if body.len() > limit {
            return Err(ProviderError::ResponseTooLarge {
                url: url.to_string(),
                limit,
            });
        }

        serde_json::from_slice(&body).map_err(|source| ProviderError::InvalidJson {
            url: url.to_string(),
            source,
        })
    }
}

fn check_jwks_uri(uri: &str) -> Result<Url, ProviderError> {
    let parsed = Url::parse(uri).map_err(|e| ProviderError::InvalidJwksUri {
        uri: uri.to_string(),
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "https" | "http" => Ok(parsed),
        other => Err(ProviderError::InvalidJwksUri {
            uri: uri.to_string(),
            reason: format!("unsupported scheme {other:?}"),
        }),
    }
}

#[async_trait]
impl KeyMaterialProvider for OidcKeyProvider {
    async fn fetch(&self, issuer: &Url) -> Result<Tenant, ProviderError> {
        let discovery_url = Self::discovery_url(issuer);
        debug!(issuer = %issuer, url = %discovery_url, "Fetching OIDC discovery document");

        let metadata: ProviderMetadata = self.get_json(discovery_url.as_str()).await?;
        let jwks_uri = check_jwks_uri(&metadata.jwks_uri)?;

        debug!(issuer = %metadata.issuer, jwks_uri = %jwks_uri, "Fetching JWKS");
        let keys: JwkSet = self.get_json(jwks_uri.as_str()).await?;

        info!(
            issuer = %metadata.issuer,
            keys = keys.keys.len(),
            "Fetched tenant key set"
        );

        Ok(Tenant::new(metadata.issuer, keys).with_jwks_uri(jwks_uri.as_str()))
    }
}
