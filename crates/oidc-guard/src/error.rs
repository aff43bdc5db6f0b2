//! Error types for token validation
//!
//! Every failure surfaced by [`AuthMiddleware::parse_and_validate_jwt`] is a
//! [`TokenError`]. The four variants separate *why* a token was rejected:
//!
//! | Variant | Meaning |
//! |---------|---------|
//! | [`TokenError::Malformed`] | Not a structurally valid JWT |
//! | [`TokenError::Unverifiable`] | Trust or key material problem, token could not be checked |
//! | [`TokenError::InvalidClaims`] | Claims present but rejected by policy |
//! | [`TokenError::InvalidSignature`] | Cryptographic mismatch |
//!
//! Lower-level causes (transport failures, JSON errors, crypto errors) are
//! attached through [`std::error::Error::source`], so both the domain reason
//! and the root cause stay inspectable.
//!
//! [`AuthMiddleware::parse_and_validate_jwt`]: crate::AuthMiddleware::parse_and_validate_jwt

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// A cause that can be handed to several callers at once.
///
/// Coalesced fetches deliver one outcome to every waiting caller, so the
/// underlying error must be shareable.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync>;

/// Token validation errors
#[derive(Debug, Error)]
pub enum TokenError {
    /// The token is not a decodable three-segment JWT
    #[error("malformed token: {reason}")]
    Malformed {
        /// What was wrong with the structure
        reason: String,
        /// Decoding error, if any
        #[source]
        source: Option<SharedError>,
    },

    /// The token could not be checked (trust, key availability, missing claim)
    #[error("unverifiable token: {reason}")]
    Unverifiable {
        /// Why verification was impossible
        reason: UnverifiableReason,
        /// Underlying transport or key error, if any
        #[source]
        source: Option<SharedError>,
    },

    /// Claim values are present but violate the configured policy
    #[error("invalid claims: {0}")]
    InvalidClaims(#[from] ClaimsError),

    /// The signature does not match the signed input
    #[error("invalid signature")]
    InvalidSignature(#[source] jsonwebtoken::errors::Error),
}

impl TokenError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
            source: None,
        }
    }

    pub(crate) fn malformed_with<E>(reason: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Malformed {
            reason: reason.into(),
            source: Some(Arc::new(source)),
        }
    }

    pub(crate) fn unverifiable(reason: UnverifiableReason) -> Self {
        Self::Unverifiable {
            reason,
            source: None,
        }
    }

    pub(crate) fn unverifiable_with(reason: UnverifiableReason, source: SharedError) -> Self {
        Self::Unverifiable {
            reason,
            source: Some(source),
        }
    }

    /// Coarse classification of this error
    pub fn kind(&self) -> TokenErrorKind {
        match self {
            Self::Malformed { .. } => TokenErrorKind::Malformed,
            Self::Unverifiable { .. } => TokenErrorKind::Unverifiable,
            Self::InvalidClaims(_) => TokenErrorKind::InvalidClaims,
            Self::InvalidSignature(_) => TokenErrorKind::InvalidSignature,
        }
    }

    /// The unverifiable reason, if this is an [`TokenError::Unverifiable`]
    pub fn unverifiable_reason(&self) -> Option<UnverifiableReason> {
        match self {
            Self::Unverifiable { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    /// The failed claim check, if this is an [`TokenError::InvalidClaims`]
    pub fn claims_error(&self) -> Option<&ClaimsError> {
        match self {
            Self::InvalidClaims(e) => Some(e),
            _ => None,
        }
    }

    /// Whether retrying the same token later could succeed.
    ///
    /// Only failed key set fetches qualify: failures are never cached, so
    /// the next attempt reaches the provider again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.unverifiable_reason(),
            Some(UnverifiableReason::KeysetUnavailable | UnverifiableReason::KeyFetchFailed)
        )
    }
}

/// Coarse error classes, one per [`TokenError`] variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenErrorKind {
    /// Structurally broken token
    Malformed,
    /// Trust or availability problem
    Unverifiable,
    /// Policy violation in claim values
    InvalidClaims,
    /// Cryptographic mismatch
    InvalidSignature,
}

/// Why a token could not be verified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnverifiableReason {
    /// `iss` is not an absolute URL with a host
    BadIssuerUrl,
    /// `iss` host differs from the configured binding host
    UntrustedIssuer,
    /// Discovery or JWKS retrieval failed
    KeysetUnavailable,
    /// Refreshing an expired key set failed
    KeyFetchFailed,
    /// The provider advertises zero keys
    NoKeys,
    /// The header `kid` matches none of the tenant's keys
    KidNotFound,
    /// No `kid` in the header and more than one key available
    AmbiguousKey,
    /// The token carries no `exp` claim
    MissingExp,
    /// The selected JWK cannot be turned into verification material
    UnusableKey,
    /// The key's algorithm is not in the configured allow-list
    DisallowedAlgorithm,
}

impl UnverifiableReason {
    /// Short human-readable description
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadIssuerUrl => "bad issuer URL",
            Self::UntrustedIssuer => "untrusted issuer",
            Self::KeysetUnavailable => "unable to build remote keyset",
            Self::KeyFetchFailed => "failed to fetch keys",
            Self::NoKeys => "no keys available",
            Self::KidNotFound => "kid not found",
            Self::AmbiguousKey => "ambiguous key, no kid",
            Self::MissingExp => "missing exp",
            Self::UnusableKey => "unusable key",
            Self::DisallowedAlgorithm => "algorithm not allowed",
        }
    }
}

impl fmt::Display for UnverifiableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A claim check that failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimsError {
    /// `exp` plus leeway lies in the past
    #[error("token expired at {expired_at} (now {now}, leeway {leeway_secs}s)")]
    Expired {
        /// The `exp` claim, seconds since the epoch
        expired_at: i64,
        /// Validation time, seconds since the epoch
        now: i64,
        /// Tolerated clock skew
        leeway_secs: u64,
    },

    /// `nbf` minus leeway lies in the future
    #[error("token not valid before {not_before} (now {now}, leeway {leeway_secs}s)")]
    NotYetValid {
        /// The `nbf` claim, seconds since the epoch
        not_before: i64,
        /// Validation time, seconds since the epoch
        now: i64,
        /// Tolerated clock skew
        leeway_secs: u64,
    },

    /// `aud` does not contain the configured audience
    #[error("audience mismatch: expected {expected}, got {actual:?}")]
    AudienceMismatch {
        /// Configured audience
        expected: String,
        /// Audiences present in the token
        actual: Vec<String>,
    },

    /// `iss` differs from the tenant's authoritative issuer
    #[error("issuer mismatch: expected {expected}, got {actual}")]
    IssuerMismatch {
        /// Issuer reported by the provider metadata
        expected: String,
        /// Issuer claimed by the token
        actual: String,
    },
}

/// Errors raised by a [`KeyMaterialProvider`](crate::KeyMaterialProvider)
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP request failed
    #[error("HTTP request to {url} failed: {source}")]
    Http {
        /// Requested URL
        url: String,
        /// Transport error
        #[source]
        source: reqwest::Error,
    },

    /// Non-success HTTP status
    #[error("{url} returned HTTP {status}")]
    Status {
        /// Requested URL
        url: String,
        /// Response status code
        status: u16,
    },

    /// Response size limit exceeded
    #[error("response from {url} exceeds {limit} bytes")]
    ResponseTooLarge {
        /// Requested URL
        url: String,
        /// Configured limit
        limit: usize,
    },

    /// Invalid JSON response
    #[error("invalid JSON from {url}: {source}")]
    InvalidJson {
        /// Requested URL
        url: String,
        /// Parse error
        #[source]
        source: serde_json::Error,
    },

    /// The discovery document points at an unusable JWKS location
    #[error("invalid jwks_uri {uri:?}: {reason}")]
    InvalidJwksUri {
        /// Value found in the discovery document
        uri: String,
        /// Why it was rejected
        reason: String,
    },

    /// HTTP client could not be built
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found
    #[error("configuration file not found: {0}")]
    FileNotFound(std::path::PathBuf),

    /// Unsupported file format
    #[error("unsupported configuration file format, use .toml, .yaml, .yml or .json")]
    UnsupportedFormat,

    /// Configuration parsing error
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] config::ConfigError),

    /// A value violates an option invariant
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        /// Offending option
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// The default key material provider could not be built
    #[error("failed to build key provider: {0}")]
    Provider(#[from] ProviderError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn unverifiable_display_uses_reason_text() {
        let err = TokenError::unverifiable(UnverifiableReason::KidNotFound);
        assert_eq!(err.to_string(), "unverifiable token: kid not found");
        assert_eq!(err.kind(), TokenErrorKind::Unverifiable);
        assert!(err.source().is_none());
    }

    #[test]
    fn cause_is_reachable_through_source_chain() {
        let cause: SharedError = Arc::new(ProviderError::Status {
            url: "https://idp.example.com/.well-known/openid-configuration".into(),
            status: 503,
        });
        let err = TokenError::unverifiable_with(UnverifiableReason::KeysetUnavailable, cause);

        let source = err.source().expect("cause attached");
        assert!(source.to_string().contains("HTTP 503"));
        assert!(err.is_retryable());
    }

    #[test]
    fn claims_error_converts_into_token_error() {
        let err: TokenError = ClaimsError::IssuerMismatch {
            expected: "https://a.example.com".into(),
            actual: "https://b.example.com".into(),
        }
        .into();

        assert_eq!(err.kind(), TokenErrorKind::InvalidClaims);
        assert!(matches!(
            err.claims_error(),
            Some(ClaimsError::IssuerMismatch { .. })
        ));
        assert!(!err.is_retryable());
    }

    #[test]
    fn reason_strings_are_stable() {
        assert_eq!(UnverifiableReason::BadIssuerUrl.as_str(), "bad issuer URL");
        assert_eq!(
            UnverifiableReason::AmbiguousKey.to_string(),
            "ambiguous key, no kid"
        );
        assert_eq!(UnverifiableReason::MissingExp.as_str(), "missing exp");
        assert_eq!(
            UnverifiableReason::KeyFetchFailed.to_string(),
            "failed to fetch keys"
        );
        assert!(TokenError::unverifiable(UnverifiableReason::KeyFetchFailed).is_retryable());
    }
}
