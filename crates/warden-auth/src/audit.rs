//! Structured audit logging for token and account events
//!
//! Every issuance, refresh, revocation and rejection is emitted as a
//! structured `tracing` event on the `warden::audit` target, so operators can
//! route the audit trail separately from diagnostic logs.
//!
//! ## Usage
//!
//! ```rust
//! use warden_auth::audit::{AuditLogger, AuthEvent};
//!
//! let logger = AuditLogger::new("accounts-api");
//!
//! logger.log(AuthEvent::LoginFailure {
//!     attempted_user: Some("alice@example.com".to_string()),
//!     reason: "invalid credentials".to_string(),
//! });
//! ```
//!
//! Rejection reasons are recorded here in full; they must never be echoed to
//! the client, which only ever sees a generic denial.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Audit logger for authentication events
#[derive(Debug, Clone)]
pub struct AuditLogger {
    /// Service name for event attribution
    service_name: String,
    /// Whether to hash user ids and token ids before logging
    hash_identifiers: bool,
}

impl AuditLogger {
    /// Create a new audit logger with the given service name
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            hash_identifiers: false,
        }
    }

    /// Create a privacy-focused audit logger that hashes identifiers
    pub fn privacy_focused(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            hash_identifiers: true,
        }
    }

    /// Builder method to configure identifier hashing
    pub fn with_identifier_hashing(mut self, hash: bool) -> Self {
        self.hash_identifiers = hash;
        self
    }

    /// Service name attached to every record
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Log an authentication event
    pub fn log(&self, event: AuthEvent) {
        let record = AuditRecord {
            id: Uuid::now_v7(),
            timestamp: SystemTime::now(),
            service: self.service_name.clone(),
            event,
        };

        match &record.event {
            AuthEvent::LoginSuccess { user_id } => {
                info!(
                    target: "warden::audit",
                    audit_id = %record.id,
                    event_type = "login_success",
                    user_id = %self.maybe_hash(user_id),
                    service = %self.service_name,
                    "Authentication successful"
                );
            }
            AuthEvent::LoginFailure {
                attempted_user,
                reason,
            } => {
                warn!(
                    target: "warden::audit",
                    audit_id = %record.id,
                    event_type = "login_failure",
                    attempted_user = ?attempted_user.as_ref().map(|u| self.maybe_hash(u)),
                    reason = %reason,
                    service = %self.service_name,
                    "Authentication failed"
                );
            }
            AuthEvent::UserRegistered { user_id } => {
                info!(
                    target: "warden::audit",
                    audit_id = %record.id,
                    event_type = "user_registered",
                    user_id = %self.maybe_hash(user_id),
                    service = %self.service_name,
                    "User registered"
                );
            }
            AuthEvent::TokenIssued {
                user_id,
                token_id,
                key_id,
                expires_in,
            } => {
                info!(
                    target: "warden::audit",
                    audit_id = %record.id,
                    event_type = "token_issued",
                    user_id = %self.maybe_hash(user_id),
                    token_id = %self.maybe_hash(token_id),
                    key_id = %key_id,
                    expires_in_secs = %expires_in,
                    service = %self.service_name,
                    "Token issued"
                );
            }
            AuthEvent::TokenRefreshed {
                user_id,
                previous_token_id,
                token_id,
            } => {
                info!(
                    target: "warden::audit",
                    audit_id = %record.id,
                    event_type = "token_refreshed",
                    user_id = %self.maybe_hash(user_id),
                    previous_token_id = %self.maybe_hash(previous_token_id),
                    token_id = %self.maybe_hash(token_id),
                    service = %self.service_name,
                    "Token refreshed"
                );
            }
            AuthEvent::TokenRevoked { token_id, reason } => {
                info!(
                    target: "warden::audit",
                    audit_id = %record.id,
                    event_type = "token_revoked",
                    token_id = %self.maybe_hash(token_id),
                    reason = %reason,
                    service = %self.service_name,
                    "Token revoked"
                );
            }
            AuthEvent::TokenRejected { reason, operation } => {
                warn!(
                    target: "warden::audit",
                    audit_id = %record.id,
                    event_type = "token_rejected",
                    reason = %reason,
                    operation = %operation,
                    service = %self.service_name,
                    "Token rejected"
                );
            }
            AuthEvent::RefreshReplay { user_id, token_id } => {
                error!(
                    target: "warden::audit",
                    audit_id = %record.id,
                    event_type = "refresh_replay",
                    user_id = %self.maybe_hash(user_id),
                    token_id = %self.maybe_hash(token_id),
                    service = %self.service_name,
                    "Refresh attempted with an already rotated token"
                );
            }
            AuthEvent::KeySetPublished { key_ids } => {
                info!(
                    target: "warden::audit",
                    audit_id = %record.id,
                    event_type = "key_set_published",
                    key_ids = ?key_ids,
                    service = %self.service_name,
                    "Signing key set published"
                );
            }
        }
    }

    fn maybe_hash(&self, value: &str) -> String {
        if self.hash_identifiers {
            let hash = blake3::hash(value.as_bytes());
            format!("b3:{}", &hash.to_hex()[..16])
        } else {
            value.to_string()
        }
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new("warden")
    }
}

/// Authentication event types for audit logging
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthEvent {
    /// Credentials verified
    LoginSuccess {
        /// Authenticated user id
        user_id: String,
    },

    /// Credentials rejected
    LoginFailure {
        /// Attempted user identifier (may be None for invalid requests)
        attempted_user: Option<String>,
        /// Failure reason (internal only)
        reason: String,
    },

    /// New account created
    UserRegistered {
        /// New user id
        user_id: String,
    },

    /// New token issued
    TokenIssued {
        /// Token subject
        user_id: String,
        /// Token identifier (not the token itself)
        token_id: String,
        /// Key that signed it
        key_id: String,
        /// Lifetime in seconds
        expires_in: u64,
    },

    /// Token exchanged for a new one
    TokenRefreshed {
        /// Token subject
        user_id: String,
        /// Identifier of the token that was presented
        previous_token_id: String,
        /// Identifier of the replacement
        token_id: String,
    },

    /// Token id added to the blocklist
    TokenRevoked {
        /// Token identifier
        token_id: String,
        /// Why (logout, rotation, operator)
        reason: String,
    },

    /// A presented token failed validation or refresh
    TokenRejected {
        /// Error kind, see [`crate::AuthError::kind`]
        reason: String,
        /// Which operation rejected it
        operation: String,
    },

    /// A refresh lost the rotation race, or replayed a rotated token
    RefreshReplay {
        /// Token subject
        user_id: String,
        /// The replayed token id
        token_id: String,
    },

    /// A new signing key snapshot went live
    KeySetPublished {
        /// Key ids in the new snapshot
        key_ids: Vec<String>,
    },
}

/// Complete audit record with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Unique record id (UUID v7, time-ordered)
    pub id: Uuid,
    /// When the event occurred
    pub timestamp: SystemTime,
    /// Emitting service
    pub service: String,
    /// The event
    pub event: AuthEvent,
}
