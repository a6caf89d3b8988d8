//! Tower service for bearer-token enforcement

use std::task::{Context, Poll};

use axum::body::Body;
use http::Request;
use axum::response::{IntoResponse, Response};
use futures_util::future::BoxFuture;
use tower_service::Service;
use tracing::debug;
use warden_auth::{Access, AuthGateway};

use super::extract_bearer;
use crate::error::ApiError;
use crate::routes::policy_for;

/// Checks the caller's token according to the route table
///
/// Refusals are turned into responses here, so the error type is the
/// inner service's own.
#[derive(Debug, Clone)]
pub struct BearerService<S> {
    inner: S,
    gateway: AuthGateway,
}

impl<S> BearerService<S> {
    /// Wrap `inner`
    pub fn new(inner: S, gateway: AuthGateway) -> Self {
        Self { inner, gateway }
    }
}

impl<S> Service<Request<Body>> for BearerService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let (access, label) = policy_for(req.method(), req.uri().path());

        // The clone is unpolled; keep the ready one for this call
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        if access == Access::Public {
            return Box::pin(inner.call(req));
        }

        let token = extract_bearer(req.headers());
        let gateway = self.gateway.clone();

        Box::pin(async move {
            let Some(token) = token else {
                debug!(route = label, "Missing bearer token");
                return Ok(ApiError::Unauthorized.into_response());
            };

            if access == Access::Bearer {
                match gateway.authority().validate(token.as_str()).await {
                    Ok(verified) => {
                        req.extensions_mut().insert(verified);
                    }
                    Err(e) => {
                        return Ok(ApiError::from(gateway.reject(label, e)).into_response());
                    }
                }
            }

            req.extensions_mut().insert(token);
            inner.call(req).await
        })
    }
}
