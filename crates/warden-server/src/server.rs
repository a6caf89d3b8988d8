//! Server assembly and lifecycle

use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use warden_auth::{
    AuthError, AuthGateway, Clock, DirectoryError, MemoryBlocklist, MemoryUserDirectory,
    SystemClock,
};

use crate::config::{ConfigError, ServerConfig};
use crate::router;
use crate::state::AppState;

/// Failures while building or running the server
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Token authority could not be built or reloaded
    #[error("Token authority error: {0}")]
    Auth(#[from] AuthError),

    /// User directory could not be built
    #[error("User directory error: {0}")]
    Directory(#[from] DirectoryError),

    /// Socket failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// A configured token server
#[derive(Debug)]
pub struct Warden {
    config: ServerConfig,
    config_path: Option<PathBuf>,
    state: AppState,
    blocklist: Arc<MemoryBlocklist>,
}

impl Warden {
    /// Build the authority, blocklist and user directory from `config`
    ///
    /// `config_path` is re-read on key reload; without it reload reuses
    /// `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] if no usable key is configured or the
    /// directory cannot be set up.
    pub fn from_config(
        config: ServerConfig,
        config_path: Option<PathBuf>,
    ) -> Result<Self, ServerError> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let blocklist = Arc::new(MemoryBlocklist::with_clock(Arc::clone(&clock)));

        let authority = config
            .auth
            .authority_builder()?
            .blocklist(blocklist.clone())
            .clock(clock)
            .build()?;

        let directory = Arc::new(MemoryUserDirectory::new()?);
        let gateway = AuthGateway::new(authority, directory.clone(), directory);

        info!(
            keys = ?gateway.authority().keys().snapshot().kids(),
            ttl = config.auth.policy.ttl,
            refresh_ttl = config.auth.policy.refresh_ttl,
            revocation = config.auth.policy.revocation,
            "Token authority ready"
        );

        Ok(Self {
            config,
            config_path,
            state: AppState::new(gateway),
            blocklist,
        })
    }

    /// Effective configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Handler state
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Router with all routes and layers
    pub fn router(&self) -> Router {
        router(self.state.clone(), self.config.body_limit)
    }

    /// Re-read signing keys and publish them atomically
    ///
    /// An ephemeral key is never regenerated; reload is skipped and the
    /// current key ids are returned.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] if the file or a key fails to load. The
    /// current key set stays in place.
    pub fn reload_keys(&self) -> Result<Vec<String>, ServerError> {
        let auth = match &self.config_path {
            Some(path) => ServerConfig::from_file(path)?.auth,
            None => self.config.auth.clone(),
        };

        let authority = self.state.gateway.authority();
        if auth.keys.is_empty() {
            warn!("No configured keys to reload; keeping the current key set");
            return Ok(authority.keys().snapshot().kids());
        }

        let source = auth.key_source()?;
        Ok(authority.reload_keys(&source)?)
    }

    /// Serve until `shutdown` resolves
    ///
    /// Starts the blocklist purge task, and on Unix reloads keys on
    /// `SIGHUP`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the address cannot be bound.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.socket_addr()?;
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "Listening");

        let purge = self
            .blocklist
            .spawn_purge_task(Duration::from_secs(self.config.auth.purge_interval.max(1)));

        let app = self.router();
        let warden = Arc::new(self);
        let reload = spawn_reload_on_hangup(Arc::clone(&warden))?;

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await;

        purge.abort();
        if let Some(reload) = reload {
            reload.abort();
        }
        info!("Server stopped");
        Ok(result?)
    }
}

#[cfg(unix)]
fn spawn_reload_on_hangup(warden: Arc<Warden>) -> io::Result<Option<JoinHandle<()>>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangups = signal(SignalKind::hangup())?;
    Ok(Some(tokio::spawn(async move {
        while hangups.recv().await.is_some() {
            match warden.reload_keys() {
                Ok(keys) => info!(?keys, "Reloaded signing keys"),
                Err(e) => error!(error = %e, "Key reload failed; keeping the current key set"),
            }
        }
    })))
}

#[cfg(not(unix))]
fn spawn_reload_on_hangup(_warden: Arc<Warden>) -> io::Result<Option<JoinHandle<()>>> {
    Ok(None)
}
