//! # warden-server
//!
//! HTTP front end for [`warden_auth`]: login, register, logout, refresh and
//! a profile endpoint, behind a bearer-token layer driven by a static
//! route table.
//!
//! ```rust,ignore
//! let config = ServerConfig::from_file("warden.toml")?;
//! let warden = Warden::from_config(config, Some("warden.toml".into()))?;
//! warden.serve(shutdown_signal()).await?;
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

pub use config::{ConfigError, ServerConfig};
pub use error::ApiError;
pub use logging::{LogOutput, LoggingConfig};
pub use middleware::{BearerLayer, BearerToken};
pub use server::{ServerError, Warden};
pub use state::AppState;

/// All routes with the bearer layer, body limit and request tracing
pub fn router(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .route(routes::LOGIN, post(handlers::login))
        .route(routes::REGISTER, post(handlers::register))
        .route(routes::LOGOUT, post(handlers::logout))
        .route(routes::REFRESH, post(handlers::refresh))
        .route(routes::ME, get(handlers::me))
        .route(routes::HEALTH, get(handlers::health))
        .fallback(handlers::not_found)
        .layer(BearerLayer::new(state.gateway.clone()))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
