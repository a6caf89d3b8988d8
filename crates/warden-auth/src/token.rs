//! Token wire format and the values handed back to callers
//!
//! A token is a compact JWS. The payload carries the registered fields plus
//! the identity's claims flattened beside them:
//!
//! ```json
//! {"sub":"42","iat":0,"exp":3600,"jti":"6f1c...","orig_iat":0,"role":"admin"}
//! ```

use std::fmt;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::clock::from_unix_seconds;
use crate::identity::{Claims, Identity};

/// Signed payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct TokenClaims {
    pub sub: String,
    pub iat: u64,
    pub exp: u64,
    pub jti: String,
    /// When the refresh chain started; unchanged by refresh
    pub orig_iat: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(flatten)]
    pub claims: Claims,
}

impl TokenClaims {
    pub(crate) fn identity(&self) -> Identity {
        Identity::with_claims(self.sub.clone(), self.claims.clone())
    }
}

/// A freshly signed token
///
/// `Debug` leaves the token string out so it cannot end up in logs by
/// accident.
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedToken {
    token: String,
    subject: String,
    token_id: String,
    key_id: String,
    issued_at: SystemTime,
    expires_at: SystemTime,
}

impl IssuedToken {
    pub(crate) fn new(token: String, claims: &TokenClaims, key_id: &str) -> Self {
        Self {
            token,
            subject: claims.sub.clone(),
            token_id: claims.jti.clone(),
            key_id: key_id.to_string(),
            issued_at: from_unix_seconds(claims.iat),
            expires_at: from_unix_seconds(claims.exp),
        }
    }

    /// The bearer token to hand to the client
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Consume into the bearer token string
    pub fn into_token(self) -> String {
        self.token
    }

    /// Subject the token was issued for
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Unique id (`jti`)
    pub fn token_id(&self) -> &str {
        &self.token_id
    }

    /// Id of the signing key (`kid`)
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Issue time
    pub fn issued_at(&self) -> SystemTime {
        self.issued_at
    }

    /// Expiry time
    pub fn expires_at(&self) -> SystemTime {
        self.expires_at
    }

    /// Lifetime from issue to expiry
    pub fn expires_in(&self) -> Duration {
        self.expires_at
            .duration_since(self.issued_at)
            .unwrap_or_default()
    }
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken")
            .field("token", &"[REDACTED]")
            .field("subject", &self.subject)
            .field("token_id", &self.token_id)
            .field("key_id", &self.key_id)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// What a valid token asserts
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedToken {
    /// Subject and claims
    pub identity: Identity,
    /// Unique id (`jti`)
    pub token_id: String,
    /// Key that signed it
    pub key_id: String,
    /// Issue time
    pub issued_at: SystemTime,
    /// Expiry time
    pub expires_at: SystemTime,
    /// First issue time of the refresh chain
    pub session_started_at: SystemTime,
}

impl VerifiedToken {
    pub(crate) fn from_claims(claims: TokenClaims, key_id: String) -> Self {
        Self {
            identity: claims.identity(),
            token_id: claims.jti,
            key_id,
            issued_at: from_unix_seconds(claims.iat),
            expires_at: from_unix_seconds(claims.exp),
            session_started_at: from_unix_seconds(claims.orig_iat),
        }
    }

    /// Shortcut for `identity.subject()`
    pub fn subject(&self) -> &str {
        self.identity.subject()
    }
}
