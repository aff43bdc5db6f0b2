//! Tower Layer implementation for authentication

use std::sync::Arc;
use tower::Layer;

use crate::AuthMiddleware;

use super::AuthLayerConfig;
use super::service::AuthService;

/// Tower Layer that adds bearer token authentication to services
///
/// # Example
///
/// ```rust,ignore
/// use tower::ServiceBuilder;
/// use oidc_guard::tower::AuthLayer;
///
/// let auth_layer = AuthLayer::new(middleware).bypass_path("/healthz");
///
/// let service = ServiceBuilder::new()
///     .layer(auth_layer)
///     .service(my_inner_service);
/// ```
#[derive(Debug, Clone)]
pub struct AuthLayer {
    validator: Arc<AuthMiddleware>,
    config: AuthLayerConfig,
}

impl AuthLayer {
    /// Create a new auth layer with default configuration
    pub fn new(validator: AuthMiddleware) -> Self {
        Self::from_arc(Arc::new(validator))
    }

    /// Create a new auth layer with custom configuration
    pub fn with_config(validator: AuthMiddleware, config: AuthLayerConfig) -> Self {
        Self::from_arc_with_config(Arc::new(validator), config)
    }

    /// Create a new auth layer from a shared validator
    pub fn from_arc(validator: Arc<AuthMiddleware>) -> Self {
        Self::from_arc_with_config(validator, AuthLayerConfig::default())
    }

    /// Create a new auth layer from a shared validator with custom configuration
    pub fn from_arc_with_config(validator: Arc<AuthMiddleware>, config: AuthLayerConfig) -> Self {
        Self { validator, config }
    }

    /// Allow requests without a token to pass through
    #[must_use]
    pub fn allow_anonymous(mut self) -> Self {
        self.config.allow_anonymous = true;
        self
    }

    /// Add a path that skips authentication
    #[must_use]
    pub fn bypass_path(mut self, path: impl Into<String>) -> Self {
        self.config.bypass_paths.push(path.into());
        self
    }

    /// The layer configuration
    pub fn config(&self) -> &AuthLayerConfig {
        &self.config
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService::new(inner, Arc::clone(&self.validator), self.config.clone())
    }
}
