//! Identities embedded in tokens

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// Payload field names owned by the token format. Custom claims may not use
/// them.
pub const RESERVED_CLAIMS: &[&str] = &["sub", "iat", "exp", "jti", "iss", "nbf", "aud", "orig_iat"];

/// A primitive claim value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaimValue {
    /// Boolean claim
    Bool(bool),
    /// Integer claim
    Integer(i64),
    /// Floating-point claim (must be finite)
    Float(f64),
    /// String claim
    String(String),
}

impl fmt::Display for ClaimValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClaimValue::Bool(value) => write!(f, "{value}"),
            ClaimValue::Integer(value) => write!(f, "{value}"),
            ClaimValue::Float(value) => write!(f, "{value}"),
            ClaimValue::String(value) => f.write_str(value),
        }
    }
}

impl From<bool> for ClaimValue {
    fn from(value: bool) -> Self {
        ClaimValue::Bool(value)
    }
}

impl From<i64> for ClaimValue {
    fn from(value: i64) -> Self {
        ClaimValue::Integer(value)
    }
}

impl From<i32> for ClaimValue {
    fn from(value: i32) -> Self {
        ClaimValue::Integer(i64::from(value))
    }
}

impl From<f64> for ClaimValue {
    fn from(value: f64) -> Self {
        ClaimValue::Float(value)
    }
}

impl From<&str> for ClaimValue {
    fn from(value: &str) -> Self {
        ClaimValue::String(value.to_string())
    }
}

impl From<String> for ClaimValue {
    fn from(value: String) -> Self {
        ClaimValue::String(value)
    }
}

/// Flat claim set, ordered so serialization is deterministic
pub type Claims = BTreeMap<String, ClaimValue>;

/// Who a token speaks for
///
/// The subject is an opaque application identifier (a user id); claims are
/// application facts carried alongside it. Both are fixed once a token is
/// issued.
///
/// ```
/// use warden_auth::Identity;
///
/// let identity = Identity::new("42").with_claim("role", "admin");
/// assert_eq!(identity.subject(), "42");
/// assert_eq!(identity.claim("role").map(ToString::to_string).as_deref(), Some("admin"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    subject: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    claims: Claims,
}

impl Identity {
    /// Identity with no claims
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            claims: Claims::new(),
        }
    }

    /// Identity with a full claim set
    pub fn with_claims(subject: impl Into<String>, claims: Claims) -> Self {
        Self {
            subject: subject.into(),
            claims,
        }
    }

    /// Add one claim
    pub fn with_claim(mut self, name: impl Into<String>, value: impl Into<ClaimValue>) -> Self {
        self.claims.insert(name.into(), value.into());
        self
    }

    /// The subject (user id)
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// All claims
    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    /// One claim by name
    pub fn claim(&self, name: &str) -> Option<&ClaimValue> {
        self.claims.get(name)
    }

    /// Check the identity can be embedded in a token
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidIdentity`] if the subject is blank, a claim
    /// name is empty or reserved, or a float claim is not finite.
    pub fn validate(&self) -> AuthResult<()> {
        if self.subject.trim().is_empty() {
            return Err(AuthError::InvalidIdentity(
                "subject must not be empty".to_string(),
            ));
        }

        for (name, value) in &self.claims {
            if name.is_empty() {
                return Err(AuthError::InvalidIdentity(
                    "claim names must not be empty".to_string(),
                ));
            }
            if RESERVED_CLAIMS.contains(&name.as_str()) {
                return Err(AuthError::InvalidIdentity(format!(
                    "claim '{name}' is reserved"
                )));
            }
            if let ClaimValue::Float(number) = value
                && !number.is_finite()
            {
                return Err(AuthError::InvalidIdentity(format!(
                    "claim '{name}' is not a finite number"
                )));
            }
        }

        Ok(())
    }
}
