//! Tower Service implementation for authentication
//!
//! [`AuthService`] implements `Service<http::Request<B>>`:
//! - Extracts the token from the configured header (`Bearer` scheme, case-insensitive)
//! - Validates it with [`AuthMiddleware::parse_and_validate_jwt`]
//! - Inserts the validated [`Token`] into the request extensions
//! - Answers `401 Unauthorized` itself when the token is missing or rejected
//!
//! Rejections are responses, not service errors, so the inner service's
//! error type passes through unchanged.

use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use http::header::{HeaderMap, HeaderValue, WWW_AUTHENTICATE};
use http::{Request, Response, StatusCode};
use tower_service::Service;
use tracing::debug;

use crate::AuthMiddleware;
use crate::token::Token;

use super::AuthLayerConfig;

/// Tower Service that performs bearer token authentication
#[derive(Debug, Clone)]
pub struct AuthService<S> {
    inner: S,
    validator: Arc<AuthMiddleware>,
    config: AuthLayerConfig,
}

impl<S> AuthService<S> {
    /// Create a new auth service
    pub fn new(inner: S, validator: Arc<AuthMiddleware>, config: AuthLayerConfig) -> Self {
        Self {
            inner,
            validator,
            config,
        }
    }

    /// Get a reference to the inner service
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Get a mutable reference to the inner service
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    fn extract_token(&self, headers: &HeaderMap) -> Option<String> {
        let value = headers.get(&self.config.auth_header)?.to_str().ok()?;
        let (scheme, token) = value.trim().split_once(' ')?;
        let token = token.trim();
        (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then(|| token.to_string())
    }
}

/// Future type for auth service responses
pub type AuthServiceFuture<T, E> = BoxFuture<'static, Result<T, E>>;

fn unauthorized<B: Default>(challenge: &'static str) -> Response<B> {
    let mut response = Response::new(B::default());
    *response.status_mut() = StatusCode::UNAUTHORIZED;
    response
        .headers_mut()
        .insert(WWW_AUTHENTICATE, HeaderValue::from_static(challenge));
    response
}

impl<S, B, ResBody> Service<Request<B>> for AuthService<S>
where
    S: Service<Request<B>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    B: Send + 'static,
    ResBody: Default + Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = AuthServiceFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        // The readied service goes into the future; a fresh clone stays behind
        let inner = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, inner);

        if self.config.should_bypass(req.uri().path()) {
            return Box::pin(async move { inner.call(req).await });
        }

        let token = self.extract_token(req.headers());
        let validator = Arc::clone(&self.validator);
        let allow_anonymous = self.config.allow_anonymous;

        Box::pin(async move {
            let Some(raw) = token else {
                if allow_anonymous {
                    return inner.call(req).await;
                }
                debug!(path = req.uri().path(), "No bearer token provided");
                return Ok(unauthorized("Bearer"));
            };

            match validator.parse_and_validate_jwt(&raw).await {
                Ok(token) => {
                    req.extensions_mut().insert::<Token>(token);
                    inner.call(req).await
                }
                Err(e) => {
                    debug!(path = req.uri().path(), kind = ?e.kind(), "Bearer token rejected");
                    Ok(unauthorized(r#"Bearer error="invalid_token""#))
                }
            }
        })
    }
}
