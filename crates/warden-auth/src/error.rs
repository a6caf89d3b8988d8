//! Error types for the token authority

use thiserror::Error;

/// Result type for token authority operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Everything that can go wrong while issuing, validating, refreshing or
/// revoking a token.
///
/// Per-request variants are expected outcomes and must be collapsed into one
/// generic denial before they reach an untrusted caller; see
/// [`AuthError::is_fatal`] for the ones that indicate a broken deployment.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The identity handed to `issue` cannot be embedded in a token
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    /// The presented token could not be parsed
    #[error("Malformed token: {0}")]
    Malformed(String),

    /// The token names a key that is not (or no longer) in the known key set
    #[error("Unknown signing key: {0}")]
    UnknownKey(String),

    /// The signature does not match the header and payload
    #[error("Token signature verification failed")]
    BadSignature,

    /// The token is past its expiry
    #[error("Token expired at {expired_at} (now {now})")]
    Expired {
        /// Expiry as unix seconds
        expired_at: u64,
        /// Evaluation time as unix seconds
        now: u64,
    },

    /// The token is too old to be exchanged for a new one
    #[error("Refresh window elapsed at {horizon} (now {now})")]
    RefreshWindowElapsed {
        /// End of the refresh window as unix seconds
        horizon: u64,
        /// Evaluation time as unix seconds
        now: u64,
    },

    /// The token id has been revoked (logout or refresh rotation)
    #[error("Token {0} has been revoked")]
    Revoked(String),

    /// No key is able to sign right now
    #[error("No signing key available: {0}")]
    KeyUnavailable(String),

    /// Invalid authority or key configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The blocklist store could not answer
    #[error("Blocklist store failure: {0}")]
    Blocklist(String),
}

impl AuthError {
    /// Whether this error means the service itself is misconfigured rather
    /// than the request being bad. Fatal errors should abort startup.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AuthError::KeyUnavailable(_) | AuthError::Configuration(_)
        )
    }

    /// Whether this error is an ordinary rejection of the presented
    /// credentials, safe to report as a generic "unauthorized".
    pub fn is_rejection(&self) -> bool {
        !self.is_fatal() && !matches!(self, AuthError::Blocklist(_))
    }

    /// Stable short name for logs and metrics labels
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::InvalidIdentity(_) => "invalid_identity",
            AuthError::Malformed(_) => "malformed",
            AuthError::UnknownKey(_) => "unknown_key",
            AuthError::BadSignature => "bad_signature",
            AuthError::Expired { .. } => "expired",
            AuthError::RefreshWindowElapsed { .. } => "refresh_window_elapsed",
            AuthError::Revoked(_) => "revoked",
            AuthError::KeyUnavailable(_) => "key_unavailable",
            AuthError::Configuration(_) => "configuration",
            AuthError::Blocklist(_) => "blocklist",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(error: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match error.kind() {
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => AuthError::BadSignature,
            ErrorKind::InvalidKeyFormat | ErrorKind::InvalidEcdsaKey => {
                AuthError::KeyUnavailable(error.to_string())
            }
            _ => AuthError::Malformed(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(AuthError::KeyUnavailable("none".into()).is_fatal());
        assert!(AuthError::Configuration("ttl".into()).is_fatal());
        assert!(!AuthError::BadSignature.is_fatal());

        assert!(AuthError::Revoked("abc".into()).is_rejection());
        assert!(AuthError::Expired { expired_at: 1, now: 2 }.is_rejection());
        assert!(!AuthError::Blocklist("down".into()).is_rejection());
        assert!(!AuthError::KeyUnavailable("none".into()).is_rejection());
    }

    #[test]
    fn test_error_kind_labels() {
        assert_eq!(AuthError::BadSignature.kind(), "bad_signature");
        assert_eq!(
            AuthError::RefreshWindowElapsed { horizon: 10, now: 11 }.kind(),
            "refresh_window_elapsed"
        );
        assert_eq!(AuthError::UnknownKey("k1".into()).kind(), "unknown_key");
    }

    #[test]
    fn test_error_display() {
        let error = AuthError::Expired {
            expired_at: 3600,
            now: 3601,
        };
        assert_eq!(error.to_string(), "Token expired at 3600 (now 3601)");
        assert_eq!(
            AuthError::BadSignature.to_string(),
            "Token signature verification failed"
        );
    }

    #[test]
    fn test_jsonwebtoken_error_conversion() {
        let error: AuthError =
            jsonwebtoken::errors::Error::from(jsonwebtoken::errors::ErrorKind::InvalidSignature)
                .into();
        assert_eq!(error, AuthError::BadSignature);

        let error: AuthError =
            jsonwebtoken::errors::Error::from(jsonwebtoken::errors::ErrorKind::InvalidToken).into();
        assert!(matches!(error, AuthError::Malformed(_)));
    }
}
