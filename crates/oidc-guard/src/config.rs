//! Validation options
//!
//! [`ValidationOptions`] is the process-wide trust policy: which audience this
//! service answers to, which identity provider host it trusts, how much clock
//! skew is tolerated and how long resolved tenants stay cached. It is set once
//! when the middleware is constructed and read-only afterwards.
//!
//! Options can be built in code or loaded from a file:
//!
//! ```rust,no_run
//! use oidc_guard::ValidationOptions;
//! use std::time::Duration;
//!
//! // In code
//! let options = ValidationOptions::new("svc-1", "https://idp.example.com".parse()?)
//!     .with_leeway(Duration::from_secs(30));
//!
//! // From a file, with OIDC_GUARD_* environment overrides
//! let options = ValidationOptions::from_file("oidc-guard.toml")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::path::Path;
use std::time::Duration;

use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

/// Environment variable prefix used by [`ValidationOptions::from_file`]
pub const ENV_PREFIX: &str = "OIDC_GUARD";

/// Trust policy for token validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationOptions {
    /// Audience this service accepts (its client identifier)
    pub audience: String,

    /// Trusted issuer binding URL. Only its host is compared against `iss`.
    pub issuer_binding_url: Url,

    /// Clock skew tolerance for `exp`/`nbf` (default: 60 seconds)
    #[serde(default = "default_leeway", with = "duration_secs")]
    pub leeway: Duration,

    /// How long a resolved tenant stays cached (default: 15 minutes)
    #[serde(default = "default_tenant_cache_ttl", with = "duration_secs")]
    pub tenant_cache_ttl: Duration,

    /// How long a fetched key set is used before it is fetched again, for
    /// tenants whose provider did not set their own (default: 10 minutes)
    #[serde(default = "default_keys_ttl", with = "duration_secs")]
    pub keys_ttl: Duration,

    /// Signature algorithms accepted from tenant keys (default: asymmetric only)
    #[serde(default = "default_allowed_algorithms")]
    pub allowed_algorithms: Vec<Algorithm>,

    /// HTTP settings for OIDC discovery and JWKS retrieval
    #[serde(default)]
    pub http: HttpClientConfig,
}

/// HTTP settings used by [`OidcKeyProvider`](crate::OidcKeyProvider)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpClientConfig {
    /// Request timeout (default: 10 seconds)
    #[serde(default = "default_request_timeout", with = "duration_secs")]
    pub request_timeout: Duration,

    /// Maximum accepted response size in bytes (default: 64 KiB)
    #[serde(default = "default_max_response_size")]
    pub max_response_size: usize,

    /// User agent for HTTP requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
            max_response_size: default_max_response_size(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_leeway() -> Duration {
    Duration::from_secs(60)
}

fn default_tenant_cache_ttl() -> Duration {
    Duration::from_secs(15 * 60)
}

fn default_keys_ttl() -> Duration {
    Duration::from_secs(10 * 60)
}

fn default_allowed_algorithms() -> Vec<Algorithm> {
    vec![
        Algorithm::ES256,
        Algorithm::ES384,
        Algorithm::RS256,
        Algorithm::RS384,
        Algorithm::RS512,
        Algorithm::PS256,
        Algorithm::PS384,
        Algorithm::PS512,
    ]
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_max_response_size() -> usize {
    64 * 1024
}

fn default_user_agent() -> String {
    format!("oidc-guard/{}", env!("CARGO_PKG_VERSION"))
}

impl ValidationOptions {
    /// Create options with default leeway, cache TTL, algorithms and HTTP settings
    pub fn new(audience: impl Into<String>, issuer_binding_url: Url) -> Self {
        Self {
            audience: audience.into(),
            issuer_binding_url,
            leeway: default_leeway(),
            tenant_cache_ttl: default_tenant_cache_ttl(),
            keys_ttl: default_keys_ttl(),
            allowed_algorithms: default_allowed_algorithms(),
            http: HttpClientConfig::default(),
        }
    }

    /// Set the clock skew tolerance
    #[must_use]
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    /// Set the tenant cache TTL
    #[must_use]
    pub fn with_tenant_cache_ttl(mut self, ttl: Duration) -> Self {
        self.tenant_cache_ttl = ttl;
        self
    }

    /// Set the key set lifetime
    #[must_use]
    pub fn with_keys_ttl(mut self, ttl: Duration) -> Self {
        self.keys_ttl = ttl;
        self
    }

    /// Replace the allowed signature algorithms
    ///
    /// # Security Warning
    ///
    /// Symmetric algorithms (HS*) only make sense when the provider's key set
    /// is private to you. Public JWKS endpoints should only publish asymmetric keys.
    #[must_use]
    pub fn with_algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.allowed_algorithms = algorithms;
        self
    }

    /// Replace the HTTP settings
    #[must_use]
    pub fn with_http(mut self, http: HttpClientConfig) -> Self {
        self.http = http;
        self
    }

    /// Hostname of the issuer binding URL
    pub fn binding_host(&self) -> Option<&str> {
        self.issuer_binding_url.host_str()
    }

    /// Check option invariants
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the audience is empty, the binding
    /// URL has no host, no algorithm is allowed, or the HTTP limits are zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.audience.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "audience",
                reason: "must not be empty".to_string(),
            });
        }
        if self.binding_host().is_none_or(str::is_empty) {
            return Err(ConfigError::Invalid {
                field: "issuer_binding_url",
                reason: format!("{} has no host", self.issuer_binding_url),
            });
        }
        if self.allowed_algorithms.is_empty() {
            return Err(ConfigError::Invalid {
                field: "allowed_algorithms",
                reason: "at least one algorithm is required".to_string(),
            });
        }
        if self.http.request_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                field: "http.request_timeout",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.http.max_response_size == 0 {
            return Err(ConfigError::Invalid {
                field: "http.max_response_size",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Load options from a file (TOML, YAML, or JSON)
    ///
    /// The format is picked from the file extension. Environment variables
    /// prefixed with `OIDC_GUARD_` override file settings, with `__` separating
    /// nested keys (e.g. `OIDC_GUARD_HTTP__REQUEST_TIMEOUT=5`).
    ///
    /// # Errors
    ///
    /// Returns an error if the file doesn't exist, has an unsupported
    /// extension, or contains invalid options.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_file_with_prefix(path, ENV_PREFIX)
    }

    /// Load options from a file with a custom environment prefix
    ///
    /// # Errors
    ///
    /// Same as [`ValidationOptions::from_file`].
    pub fn from_file_with_prefix(
        path: impl AsRef<Path>,
        env_prefix: &str,
    ) -> Result<Self, ConfigError> {
        use config::{Config, File, FileFormat};

        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let format = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => FileFormat::Toml,
            Some("yaml") | Some("yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => return Err(ConfigError::UnsupportedFormat),
        };

        let settings = Config::builder()
            .add_source(File::new(
                path.to_str().ok_or(ConfigError::UnsupportedFormat)?,
                format,
            ))
            .add_source(
                config::Environment::with_prefix(env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let options: Self = settings.try_deserialize()?;
        options.validate()?;
        Ok(options)
    }
}

/// Durations as whole seconds in configuration files
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
