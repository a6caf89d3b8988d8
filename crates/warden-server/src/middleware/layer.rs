//! Tower layer for bearer-token enforcement

use tower::Layer;
use warden_auth::AuthGateway;

use super::service::BearerService;

/// Wraps a service with [`BearerService`]
///
/// # Example
///
/// ```rust,ignore
/// let app = Router::new()
///     .route(routes::LOGOUT, post(handlers::logout))
///     .layer(BearerLayer::new(gateway.clone()));
/// ```
#[derive(Debug, Clone)]
pub struct BearerLayer {
    gateway: AuthGateway,
}

impl BearerLayer {
    /// Layer that checks tokens against `gateway`'s authority
    pub fn new(gateway: AuthGateway) -> Self {
        Self { gateway }
    }
}

impl<S> Layer<S> for BearerLayer {
    type Service = BearerService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        BearerService::new(inner, self.gateway.clone())
    }
}
