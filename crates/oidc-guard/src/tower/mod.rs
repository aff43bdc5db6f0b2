//! # Tower Middleware Integration
//!
//! Bearer token authentication for `http`-based Tower stacks (Axum,
//! tower-http, hyper services).
//!
//! - [`AuthLayer`] - wraps services with [`AuthService`]
//! - [`AuthService`] - extracts `Authorization: Bearer <token>`, runs
//!   [`AuthMiddleware::parse_and_validate_jwt`] and forwards on success
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tower::ServiceBuilder;
//! use oidc_guard::tower::AuthLayer;
//!
//! let service = ServiceBuilder::new()
//!     .layer(AuthLayer::new(middleware))
//!     .service(my_inner_service);
//! ```
//!
//! ## Request Extensions
//!
//! The validated [`Token`](crate::Token) is inserted into the request
//! extensions before the inner service is called:
//!
//! ```rust,ignore
//! if let Some(token) = req.extensions().get::<oidc_guard::Token>() {
//!     println!("Authenticated subject: {:?}", token.claims().sub);
//! }
//! ```
//!
//! Requests without a token, or with a rejected one, get `401 Unauthorized`
//! with a `WWW-Authenticate: Bearer` challenge; the inner service is not called.
//!
//! [`AuthMiddleware::parse_and_validate_jwt`]: crate::AuthMiddleware::parse_and_validate_jwt

mod layer;
mod service;

pub use layer::AuthLayer;
pub use service::{AuthService, AuthServiceFuture};

/// Configuration for the auth layer
#[derive(Debug, Clone)]
pub struct AuthLayerConfig {
    /// Let requests without a token through, without a `Token` extension.
    /// Requests with a rejected token are still refused.
    pub allow_anonymous: bool,
    /// Request paths that skip authentication (e.g. "/healthz")
    pub bypass_paths: Vec<String>,
    /// Header name to extract the token from (default: "Authorization")
    pub auth_header: String,
}

impl Default for AuthLayerConfig {
    fn default() -> Self {
        Self {
            allow_anonymous: false,
            bypass_paths: Vec::new(),
            auth_header: http::header::AUTHORIZATION.as_str().to_string(),
        }
    }
}

impl AuthLayerConfig {
    /// Create a new config that allows anonymous access
    #[must_use]
    pub fn allow_anonymous() -> Self {
        Self {
            allow_anonymous: true,
            ..Default::default()
        }
    }

    /// Add a path to the bypass list
    #[must_use]
    pub fn bypass_path(mut self, path: impl Into<String>) -> Self {
        self.bypass_paths.push(path.into());
        self
    }

    /// Set the authorization header name
    #[must_use]
    pub fn auth_header(mut self, header: impl Into<String>) -> Self {
        self.auth_header = header.into();
        self
    }

    /// Check if a request path should bypass authentication
    #[must_use]
    pub fn should_bypass(&self, path: &str) -> bool {
        self.bypass_paths.iter().any(|p| p == path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AuthLayerConfig::default();
        assert!(!config.allow_anonymous);
        assert!(config.bypass_paths.is_empty());
        assert_eq!(config.auth_header, "authorization");
    }

    #[test]
    fn test_allow_anonymous() {
        assert!(AuthLayerConfig::allow_anonymous().allow_anonymous);
    }

    #[test]
    fn test_should_bypass() {
        let config = AuthLayerConfig::default()
            .bypass_path("/healthz")
            .bypass_path("/ready");
        assert!(config.should_bypass("/healthz"));
        assert!(config.should_bypass("/ready"));
        assert!(!config.should_bypass("/api/orders"));
    }

    #[test]
    fn test_custom_header() {
        let config = AuthLayerConfig::default().auth_header("X-Auth-Token");
        assert_eq!(config.auth_header, "X-Auth-Token");
    }
}
