//! API key authentication middleware
//!
//! Resolves the caller's principal from the Authorization header. A valid
//! key attaches a `Principal` to request extensions; no key passes through
//! unauthenticated (generation still works, history is skipped); an invalid
//! key is rejected. With auth disabled every request gets an anonymous
//! principal, which is only sensible for local development.

use axum::{
    body::Body,
    http::{header::AUTHORIZATION, Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::future::BoxFuture;
use std::{
    collections::HashSet,
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Layer, Service};
use tracing::warn;

use crate::error::ErrorBody;
use crate::history::Principal;

/// Principal slot inserted into request extensions for every request that
/// passes the layer. `None` means anonymous.
#[derive(Debug, Clone)]
pub struct MaybePrincipal(pub Option<Principal>);

/// Authentication layer
#[derive(Clone)]
pub struct AuthLayer {
    api_keys: Arc<HashSet<String>>,
    enabled: bool,
}

impl AuthLayer {
    pub fn new(enabled: bool, api_keys: Vec<String>) -> Self {
        Self {
            api_keys: Arc::new(api_keys.into_iter().collect()),
            enabled,
        }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthMiddleware {
            inner,
            api_keys: self.api_keys.clone(),
            enabled: self.enabled,
        }
    }
}

/// Authentication middleware service
#[derive(Clone)]
pub struct AuthMiddleware<S> {
    inner: S,
    api_keys: Arc<HashSet<String>>,
    enabled: bool,
}

impl<S> Service<Request<Body>> for AuthMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Send + Clone + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<Body>) -> Self::Future {
        // Health checks never require a key
        if request.uri().path() == "/health" {
            request.extensions_mut().insert(MaybePrincipal(None));
            let future = self.inner.call(request);
            return Box::pin(async move { future.await });
        }

        if !self.enabled {
            request
                .extensions_mut()
                .insert(MaybePrincipal(Some(Principal::new("anonymous"))));
            let future = self.inner.call(request);
            return Box::pin(async move { future.await });
        }

        // Extract API key from Authorization header
        let provided = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .map(|h| h.trim_start_matches("Bearer ").to_string());

        match provided {
            Some(key) if self.api_keys.contains(&key) => {
                request
                    .extensions_mut()
                    .insert(MaybePrincipal(Some(Principal::new(key))));
                let future = self.inner.call(request);
                Box::pin(async move { future.await })
            }
            Some(_) => {
                warn!("Invalid API key provided");
                Box::pin(async move { Ok(create_auth_error_response("Invalid API key")) })
            }
            None => {
                // Anonymous callers are allowed through; history and
                // conversation endpoints enforce a principal themselves.
                request.extensions_mut().insert(MaybePrincipal(None));
                let future = self.inner.call(request);
                Box::pin(async move { future.await })
            }
        }
    }
}

fn create_auth_error_response(message: &str) -> Response {
    let body = ErrorBody {
        status_code: StatusCode::UNAUTHORIZED.as_u16(),
        error_code: "UNAUTHENTICATED".to_string(),
        message: message.to_string(),
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}
