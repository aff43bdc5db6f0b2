//! # oidc-guard - OIDC Bearer Token Validation
//!
//! Validates OIDC-issued JSON Web Tokens presented to a service: the token
//! must come from a trusted identity provider, be unexpired, be meant for
//! this service and carry a signature made by one of the provider's keys.
//!
//! ## Pipeline
//!
//! [`AuthMiddleware::parse_and_validate_jwt`] runs four stages in order and
//! stops at the first failure:
//!
//! 1. **Decode** the compact token without verifying it ([`Token::decode_unverified`])
//! 2. **Resolve** the issuer to a [`Tenant`]: hostname trust check, per-issuer
//!    cache, and a single coalesced remote fetch on a miss
//! 3. **Validate claims**: `exp` (required), `nbf`, audience, issuer
//! 4. **Verify the signature** with the key selected by `kid`
//!
//! ## Architecture
//!
//! - [`token`] - Token, header and claim types, unverified decoder
//! - [`tenant`] - Tenants, the expiring tenant cache, fetch coalescing, resolution
//! - [`provider`] - Key material providers (OIDC discovery + JWKS)
//! - [`claims`] - Claim validation
//! - [`signature`] - Key selection and signature verification
//! - [`middleware`] - The validation pipeline
//! - [`config`] - Validation options, file and environment loading
//! - [`error`] - Error types
//! - `tower` - Tower layer/service for HTTP stacks (feature `middleware`)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use oidc_guard::{AuthMiddleware, ValidationOptions};
//!
//! # tokio_test::block_on(async {
//! let options = ValidationOptions::new("svc-1", "https://idp.example.com".parse()?);
//! let middleware = AuthMiddleware::new(options)?;
//!
//! # let raw = "eyJhbGciOi...";
//! match middleware.parse_and_validate_jwt(raw).await {
//!     Ok(token) => println!("Valid token for {:?}", token.claims().sub),
//!     Err(e) => println!("Rejected: {e}"),
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```
//!
//! ## Feature Flags
//!
//! - `middleware` (default) - Tower middleware support
//! - `tower` - Alias for `middleware`

#![cfg_attr(docsrs, feature(doc_cfg))]

// Submodules
pub mod claims;
pub mod config;
pub mod error;
pub mod middleware;
pub mod provider;
pub mod signature;
pub mod tenant;
pub mod token;

#[cfg(feature = "middleware")]
#[cfg_attr(docsrs, doc(cfg(feature = "middleware")))]
pub mod tower;

// Re-export the pipeline and its configuration
#[doc(inline)]
pub use config::{HttpClientConfig, ValidationOptions};
#[doc(inline)]
pub use middleware::AuthMiddleware;

// Re-export error types
#[doc(inline)]
pub use error::{
    ClaimsError, ConfigError, ProviderError, SharedError, TokenError, TokenErrorKind,
    UnverifiableReason,
};

// Re-export token and tenant types
#[doc(inline)]
pub use provider::{KeyMaterialProvider, OidcKeyProvider};
#[doc(inline)]
pub use tenant::{CacheStats, Tenant, TenantCache};
#[doc(inline)]
pub use token::{Audience, ClaimMap, OidcClaims, Token, TokenHeader};

// Key types used in the public API
pub use jsonwebtoken::Algorithm;
pub use jsonwebtoken::jwk::{Jwk, JwkSet};
