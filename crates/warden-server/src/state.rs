//! Shared handler state

use warden_auth::AuthGateway;

/// State handed to every handler
#[derive(Debug, Clone)]
pub struct AppState {
    /// Upward operations
    pub gateway: AuthGateway,
}

impl AppState {
    /// State over `gateway`
    pub fn new(gateway: AuthGateway) -> Self {
        Self { gateway }
    }
}
