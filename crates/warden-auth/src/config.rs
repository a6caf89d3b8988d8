//! Authority configuration
//!
//! Deserializable from any `serde` format. A typical TOML section:
//!
//! ```toml
//! [auth.policy]
//! ttl = 3600
//! refresh_ttl = 7200
//! issuer = "accounts.example.com"
//!
//! [[auth.keys]]
//! kid = "2026-01"
//! algorithm = "HS256"
//! secret = "c2hhcmVkLXNlY3JldC1vZi1hdC1sZWFzdC0zMi1ieXRlcw=="
//! secret_encoding = "base64"
//!
//! [[auth.keys]]
//! kid = "2026-07"
//! algorithm = "ES256"
//! private_key_path = "/etc/warden/es256.pem"
//! public_key_path = "/etc/warden/es256.pub.pem"
//! activates_at = "2026-07-01T00:00:00Z"
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use argon2::password_hash::rand_core::{OsRng, RngCore};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use jsonwebtoken::Algorithm;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::audit::AuditLogger;
use crate::authority::{TokenAuthority, TokenAuthorityBuilder, TokenPolicy};
use crate::error::{AuthError, AuthResult};
use crate::keys::{KeyRing, KeySource, SigningKey};

/// Everything needed to stand up a [`TokenAuthority`]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthorityConfig {
    /// Lifetimes and revocation switches
    pub policy: TokenPolicy,
    /// Signing and verification keys
    pub keys: Vec<KeyConfig>,
    /// Generate a throwaway HMAC key when `keys` is empty (development only)
    pub ephemeral_key: bool,
    /// Audit log settings
    pub audit: AuditConfig,
    /// Seconds between blocklist purges
    pub purge_interval: u64,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            policy: TokenPolicy::default(),
            keys: Vec::new(),
            ephemeral_key: false,
            audit: AuditConfig::default(),
            purge_interval: 60,
        }
    }
}

impl AuthorityConfig {
    /// Key source reading the configured keys
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if no keys are configured and
    /// `ephemeral_key` is off.
    pub fn key_source(&self) -> AuthResult<ConfigKeySource> {
        if !self.keys.is_empty() {
            return Ok(ConfigKeySource::new(self.keys.clone()));
        }
        if !self.ephemeral_key {
            return Err(AuthError::Configuration(
                "no signing keys configured (set auth.keys or enable auth.ephemeral_key)"
                    .to_string(),
            ));
        }

        warn!("No signing keys configured; generated an ephemeral key. Tokens will not survive a restart");
        Ok(ConfigKeySource::new(vec![KeyConfig::ephemeral()]))
    }

    /// Audit logger for the configured service name
    pub fn audit_logger(&self) -> AuditLogger {
        AuditLogger::new(self.audit.service_name.clone())
            .with_identifier_hashing(self.audit.hash_identifiers)
    }

    /// Builder with keys, policy and audit applied; the caller adds the
    /// blocklist and clock
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] for bad key entries or
    /// [`AuthError::KeyUnavailable`] if no key could be loaded.
    pub fn authority_builder(&self) -> AuthResult<TokenAuthorityBuilder> {
        let source = self.key_source()?;
        let ring = KeyRing::from_source(&source)?;
        Ok(TokenAuthority::builder()
            .keys(Arc::new(ring))
            .policy(self.policy.clone())
            .audit(self.audit_logger()))
    }
}

/// Audit log settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Service name attached to audit records
    pub service_name: String,
    /// Hash user and token ids before logging
    pub hash_identifiers: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            service_name: "warden".to_string(),
            hash_identifiers: false,
        }
    }
}

/// How an HMAC `secret` string is encoded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretEncoding {
    /// UTF-8 bytes as written
    #[default]
    Raw,
    /// Standard base64
    Base64,
}

/// One configured key
#[derive(Debug, Clone, Deserialize)]
pub struct KeyConfig {
    /// Key id written to token headers
    pub kid: String,
    /// Signature algorithm
    #[serde(default = "default_algorithm")]
    pub algorithm: Algorithm,
    /// HMAC secret (HS* only)
    #[serde(default, deserialize_with = "deserialize_optional_secret")]
    pub secret: Option<SecretString>,
    /// Encoding of `secret`
    #[serde(default)]
    pub secret_encoding: SecretEncoding,
    /// PEM private key (ES*/RS*/PS*); omit for a verification-only key
    #[serde(default)]
    pub private_key_path: Option<PathBuf>,
    /// PEM public key (ES*/RS*/PS*)
    #[serde(default)]
    pub public_key_path: Option<PathBuf>,
    /// Start of the signing window
    #[serde(default)]
    pub activates_at: Option<DateTime<Utc>>,
    /// End of the signing and verification window
    #[serde(default)]
    pub retires_at: Option<DateTime<Utc>>,
}

fn default_algorithm() -> Algorithm {
    Algorithm::HS256
}

// Custom deserialization for SecretString
fn deserialize_optional_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<String> = Deserialize::deserialize(deserializer)?;
    Ok(value.map(SecretString::new))
}

impl KeyConfig {
    /// HMAC key entry from a raw secret
    pub fn hmac(kid: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            kid: kid.into(),
            algorithm: Algorithm::HS256,
            secret: Some(SecretString::new(secret.into())),
            secret_encoding: SecretEncoding::Raw,
            private_key_path: None,
            public_key_path: None,
            activates_at: None,
            retires_at: None,
        }
    }

    /// HS256 key with 32 bytes from the OS CSPRNG that lives only as long
    /// as the process
    fn ephemeral() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);

        let mut key = Self::hmac(format!("ephemeral-{}", Uuid::new_v4().simple()), STANDARD.encode(bytes));
        key.secret_encoding = SecretEncoding::Base64;
        key
    }

    /// Turn the entry into a [`SigningKey`], reading PEM files if needed
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if required material is missing,
    /// unreadable or invalid.
    pub fn build(&self) -> AuthResult<SigningKey> {
        let key = match self.algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                let secret = self.secret.as_ref().ok_or_else(|| {
                    AuthError::Configuration(format!("key '{}': secret is required", self.kid))
                })?;
                let bytes = match self.secret_encoding {
                    SecretEncoding::Raw => secret.expose_secret().as_bytes().to_vec(),
                    SecretEncoding::Base64 => STANDARD
                        .decode(secret.expose_secret().trim())
                        .map_err(|e| {
                            AuthError::Configuration(format!(
                                "key '{}': secret is not valid base64: {e}",
                                self.kid
                            ))
                        })?,
                };
                SigningKey::hmac(self.kid.clone(), self.algorithm, &bytes)?
            }
            _ => {
                let public_path = self.public_key_path.as_deref().ok_or_else(|| {
                    AuthError::Configuration(format!(
                        "key '{}': public_key_path is required",
                        self.kid
                    ))
                })?;
                let public_pem = read_pem(&self.kid, public_path)?;
                let private_pem = self
                    .private_key_path
                    .as_deref()
                    .map(|path| read_pem(&self.kid, path))
                    .transpose()?;
                SigningKey::from_pem(
                    self.kid.clone(),
                    self.algorithm,
                    private_pem.as_deref(),
                    &public_pem,
                )?
            }
        };

        let key = match self.activates_at {
            Some(at) => key.activates_at(SystemTime::from(at)),
            None => key,
        };
        let key = match self.retires_at {
            Some(at) => key.retires_at(SystemTime::from(at)),
            None => key,
        };
        Ok(key)
    }
}

fn read_pem(kid: &str, path: &Path) -> AuthResult<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        AuthError::Configuration(format!("key '{kid}': cannot read {}: {e}", path.display()))
    })
}

/// Key source over configured entries
///
/// PEM files are read on every [`KeySource::load`], so a reload picks up
/// replaced files.
#[derive(Debug, Clone)]
pub struct ConfigKeySource {
    keys: Vec<KeyConfig>,
}

impl ConfigKeySource {
    /// Source over `keys`
    pub fn new(keys: Vec<KeyConfig>) -> Self {
        Self { keys }
    }
}

impl KeySource for ConfigKeySource {
    fn load(&self) -> AuthResult<Vec<SigningKey>> {
        self.keys.iter().map(KeyConfig::build).collect()
    }
}
