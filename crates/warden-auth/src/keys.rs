//! Signing keys, key set snapshots and atomic rotation
//!
//! Keys are never edited in place. Every change (rotation, retirement,
//! removal, reload) builds a new [`KeySet`] and swaps it into the
//! [`KeyRing`] in one step, so a concurrent validation sees either the old
//! snapshot or the new one, never a mixture.
//!
//! ```text
//!   activates_at                retires_at
//!        │◄──── may sign ─────────►│
//!        │◄──── may verify ───────►│   (signing also stops earlier once
//!                                      a newer key activates)
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

use arc_swap::ArcSwap;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use tracing::{debug, info};

use crate::error::{AuthError, AuthResult};

/// Shortest accepted HMAC secret, in bytes
pub const MIN_HMAC_SECRET_LEN: usize = 32;

/// One versioned key
///
/// Holds verification material always, and signing material unless the key
/// was loaded from a public key only.
#[derive(Clone)]
pub struct SigningKey {
    kid: String,
    algorithm: Algorithm,
    encoding: Option<EncodingKey>,
    decoding: DecodingKey,
    activates_at: SystemTime,
    retires_at: Option<SystemTime>,
}

// Key material stays out of logs
impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .field("can_sign", &self.encoding.is_some())
            .field("activates_at", &self.activates_at)
            .field("retires_at", &self.retires_at)
            .finish()
    }
}

impl SigningKey {
    /// Shared-secret key (HS256, HS384, HS512)
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] for a non-HMAC algorithm, an
    /// empty key id, or a secret shorter than [`MIN_HMAC_SECRET_LEN`].
    pub fn hmac(kid: impl Into<String>, algorithm: Algorithm, secret: &[u8]) -> AuthResult<Self> {
        let kid = checked_kid(kid.into())?;

        if !matches!(
            algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(AuthError::Configuration(format!(
                "key '{kid}': {algorithm:?} is not an HMAC algorithm"
            )));
        }
        if secret.len() < MIN_HMAC_SECRET_LEN {
            return Err(AuthError::Configuration(format!(
                "key '{kid}': secret is {} bytes, at least {MIN_HMAC_SECRET_LEN} required",
                secret.len()
            )));
        }

        Ok(Self {
            kid,
            algorithm,
            encoding: Some(EncodingKey::from_secret(secret)),
            decoding: DecodingKey::from_secret(secret),
            activates_at: SystemTime::UNIX_EPOCH,
            retires_at: None,
        })
    }

    /// Asymmetric key from PEM (ES256, ES384, RS*, PS*)
    ///
    /// Without `private_pem` the key can only verify.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if the algorithm is symmetric or
    /// either PEM document cannot be parsed for that algorithm family.
    pub fn from_pem(
        kid: impl Into<String>,
        algorithm: Algorithm,
        private_pem: Option<&[u8]>,
        public_pem: &[u8],
    ) -> AuthResult<Self> {
        let kid = checked_kid(kid.into())?;
        let bad_pem = |which: &str, e: jsonwebtoken::errors::Error| {
            AuthError::Configuration(format!("key '{kid}': invalid {which} PEM: {e}"))
        };

        let (encoding, decoding) = match algorithm {
            Algorithm::ES256 | Algorithm::ES384 => {
                let encoding = private_pem
                    .map(EncodingKey::from_ec_pem)
                    .transpose()
                    .map_err(|e| bad_pem("private", e))?;
                let decoding =
                    DecodingKey::from_ec_pem(public_pem).map_err(|e| bad_pem("public", e))?;
                (encoding, decoding)
            }
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => {
                let encoding = private_pem
                    .map(EncodingKey::from_rsa_pem)
                    .transpose()
                    .map_err(|e| bad_pem("private", e))?;
                let decoding =
                    DecodingKey::from_rsa_pem(public_pem).map_err(|e| bad_pem("public", e))?;
                (encoding, decoding)
            }
            other => {
                return Err(AuthError::Configuration(format!(
                    "key '{kid}': {other:?} is not supported for PEM keys"
                )));
            }
        };

        Ok(Self {
            kid,
            algorithm,
            encoding,
            decoding,
            activates_at: SystemTime::UNIX_EPOCH,
            retires_at: None,
        })
    }

    /// Set when the key starts signing
    pub fn activates_at(mut self, at: SystemTime) -> Self {
        self.activates_at = at;
        self
    }

    /// Set when the key stops signing and verifying
    pub fn retires_at(mut self, at: SystemTime) -> Self {
        self.retires_at = Some(at);
        self
    }

    /// Key id carried in token headers
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Signature algorithm
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Activation time
    pub fn activation(&self) -> SystemTime {
        self.activates_at
    }

    /// Retirement time, if scheduled
    pub fn retirement(&self) -> Option<SystemTime> {
        self.retires_at
    }

    /// Whether the key holds private material
    pub fn has_signing_material(&self) -> bool {
        self.encoding.is_some()
    }

    /// Inside the signing window with private material
    pub fn can_sign_at(&self, now: SystemTime) -> bool {
        self.encoding.is_some() && self.activates_at <= now && self.can_verify_at(now)
    }

    /// Not yet retired
    pub fn can_verify_at(&self, now: SystemTime) -> bool {
        self.retires_at.is_none_or(|retires_at| now < retires_at)
    }

    pub(crate) fn encoding_key(&self) -> Option<&EncodingKey> {
        self.encoding.as_ref()
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.decoding
    }
}

fn checked_kid(kid: String) -> AuthResult<String> {
    if kid.trim().is_empty() {
        return Err(AuthError::Configuration(
            "key id must not be empty".to_string(),
        ));
    }
    Ok(kid)
}

/// Immutable snapshot of the known keys
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    keys: BTreeMap<String, SigningKey>,
}

impl KeySet {
    /// Build a snapshot
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if two keys share a key id.
    pub fn new(keys: impl IntoIterator<Item = SigningKey>) -> AuthResult<Self> {
        let mut map = BTreeMap::new();
        for key in keys {
            let kid = key.kid.clone();
            if map.insert(kid.clone(), key).is_some() {
                return Err(AuthError::Configuration(format!(
                    "duplicate key id '{kid}'"
                )));
            }
        }
        Ok(Self { keys: map })
    }

    /// The key new tokens are signed with: the latest activation among keys
    /// whose signing window is open at `now`
    pub fn active_at(&self, now: SystemTime) -> Option<&SigningKey> {
        self.keys
            .values()
            .filter(|key| key.can_sign_at(now))
            .max_by_key(|key| key.activates_at)
    }

    /// The key that must verify a token carrying `kid`
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UnknownKey`] if the key is absent or retired.
    pub fn verifier(&self, kid: &str, now: SystemTime) -> AuthResult<&SigningKey> {
        match self.keys.get(kid) {
            Some(key) if key.can_verify_at(now) => Ok(key),
            Some(_) => Err(AuthError::UnknownKey(format!("key '{kid}' is retired"))),
            None => Err(AuthError::UnknownKey(format!("key '{kid}' is not known"))),
        }
    }

    /// Look up a key regardless of its window
    pub fn get(&self, kid: &str) -> Option<&SigningKey> {
        self.keys.get(kid)
    }

    /// Key ids in this snapshot, sorted
    pub fn kids(&self) -> Vec<String> {
        self.keys.keys().cloned().collect()
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the snapshot holds no keys
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn keys(&self) -> impl Iterator<Item = &SigningKey> {
        self.keys.values()
    }
}

/// Where key material comes from (config file, secret store, ...)
pub trait KeySource: Send + Sync + fmt::Debug {
    /// Load the complete current key list
    ///
    /// # Errors
    ///
    /// Returns an error if the key material cannot be read or parsed.
    fn load(&self) -> AuthResult<Vec<SigningKey>>;
}

/// A fixed list of already-built keys
#[derive(Debug, Clone, Default)]
pub struct StaticKeySource {
    keys: Vec<SigningKey>,
}

impl StaticKeySource {
    /// Wrap a key list
    pub fn new(keys: Vec<SigningKey>) -> Self {
        Self { keys }
    }
}

impl KeySource for StaticKeySource {
    fn load(&self) -> AuthResult<Vec<SigningKey>> {
        Ok(self.keys.clone())
    }
}

/// Process-wide holder of the current [`KeySet`]
///
/// Readers call [`KeyRing::snapshot`] and never block. Writers are
/// serialized among themselves and publish whole snapshots.
#[derive(Debug)]
pub struct KeyRing {
    current: ArcSwap<KeySet>,
    writer: Mutex<()>,
}

impl KeyRing {
    /// Ring over an initial snapshot
    pub fn new(initial: KeySet) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
            writer: Mutex::new(()),
        }
    }

    /// Load the initial snapshot from a source
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyUnavailable`] if the source yields no keys,
    /// or the source's own error.
    pub fn from_source(source: &dyn KeySource) -> AuthResult<Self> {
        let set = load_non_empty(source)?;
        info!(key_ids = ?set.kids(), "Loaded signing keys");
        Ok(Self::new(set))
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Arc<KeySet> {
        self.current.load_full()
    }

    /// Replace the snapshot wholesale
    pub fn publish(&self, set: KeySet) {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        debug!(key_ids = ?set.kids(), "Publishing key set");
        self.current.store(Arc::new(set));
    }

    /// Add a new key; it takes over signing once its activation time passes
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if the key id is already present.
    pub fn rotate(&self, key: SigningKey) -> AuthResult<Arc<KeySet>> {
        self.modify(|current| {
            let mut keys: Vec<SigningKey> = current.keys().cloned().collect();
            keys.push(key);
            KeySet::new(keys)
        })
    }

    /// Schedule (or bring forward) a key's retirement
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UnknownKey`] if no key has that id.
    pub fn retire(&self, kid: &str, at: SystemTime) -> AuthResult<Arc<KeySet>> {
        self.modify(|current| {
            if current.get(kid).is_none() {
                return Err(AuthError::UnknownKey(format!("key '{kid}' is not known")));
            }
            KeySet::new(current.keys().cloned().map(|key| {
                if key.kid == kid {
                    key.retires_at(at)
                } else {
                    key
                }
            }))
        })
    }

    /// Drop a key from the known set; its tokens stop validating
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UnknownKey`] if no key has that id.
    pub fn remove(&self, kid: &str) -> AuthResult<Arc<KeySet>> {
        self.modify(|current| {
            if current.get(kid).is_none() {
                return Err(AuthError::UnknownKey(format!("key '{kid}' is not known")));
            }
            KeySet::new(current.keys().filter(|key| key.kid != kid).cloned())
        })
    }

    /// Re-read the source and publish what it returns
    ///
    /// # Errors
    ///
    /// Returns the source's error or [`AuthError::KeyUnavailable`] for an
    /// empty result; the current snapshot is kept in either case.
    pub fn reload(&self, source: &dyn KeySource) -> AuthResult<Arc<KeySet>> {
        let set = load_non_empty(source)?;
        self.modify(move |_| Ok(set))
    }

    fn modify<F>(&self, build: F) -> AuthResult<Arc<KeySet>>
    where
        F: FnOnce(&KeySet) -> AuthResult<KeySet>,
    {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.current.load_full();
        let next = Arc::new(build(&current)?);
        debug!(key_ids = ?next.kids(), "Publishing key set");
        self.current.store(Arc::clone(&next));
        Ok(next)
    }
}

fn load_non_empty(source: &dyn KeySource) -> AuthResult<KeySet> {
    let set = KeySet::new(source.load()?)?;
    if set.is_empty() {
        return Err(AuthError::KeyUnavailable(
            "key source returned no keys".to_string(),
        ));
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::from_unix_seconds;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn key(kid: &str, activates: u64) -> SigningKey {
        SigningKey::hmac(kid, Algorithm::HS256, SECRET)
            .unwrap()
            .activates_at(from_unix_seconds(activates))
    }

    #[test]
    fn test_short_secret_rejected() {
        let err = SigningKey::hmac("k", Algorithm::HS256, b"short").unwrap_err();
        assert!(matches!(err, AuthError::Configuration(_)));
    }

    #[test]
    fn test_non_hmac_algorithm_rejected_for_secret() {
        assert!(SigningKey::hmac("k", Algorithm::ES256, SECRET).is_err());
    }

    #[test]
    fn test_empty_kid_rejected() {
        assert!(SigningKey::hmac(" ", Algorithm::HS256, SECRET).is_err());
    }

    #[test]
    fn test_invalid_pem_rejected() {
        let err =
            SigningKey::from_pem("k", Algorithm::ES256, None, b"not a pem").unwrap_err();
        assert!(matches!(err, AuthError::Configuration(_)));
    }

    #[test]
    fn test_duplicate_kid_rejected() {
        let err = KeySet::new(vec![key("a", 0), key("a", 10)]).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_active_key_is_latest_open_window() {
        let set = KeySet::new(vec![key("old", 0), key("new", 100), key("future", 1000)]).unwrap();

        assert_eq!(set.active_at(from_unix_seconds(50)).unwrap().kid(), "old");
        assert_eq!(set.active_at(from_unix_seconds(500)).unwrap().kid(), "new");
        assert_eq!(
            set.active_at(from_unix_seconds(5000)).unwrap().kid(),
            "future"
        );
    }

    #[test]
    fn test_retired_key_neither_signs_nor_verifies() {
        let set = KeySet::new(vec![
            key("only", 0).retires_at(from_unix_seconds(100)),
        ])
        .unwrap();

        assert!(set.active_at(from_unix_seconds(99)).is_some());
        assert!(set.active_at(from_unix_seconds(100)).is_none());
        assert!(set.verifier("only", from_unix_seconds(99)).is_ok());
        assert!(matches!(
            set.verifier("only", from_unix_seconds(100)),
            Err(AuthError::UnknownKey(_))
        ));
        assert!(matches!(
            set.verifier("missing", from_unix_seconds(0)),
            Err(AuthError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_ring_rotate_retire_remove() {
        let ring = KeyRing::new(KeySet::new(vec![key("k1", 0)]).unwrap());
        let before = ring.snapshot();

        ring.rotate(key("k2", 10)).unwrap();
        assert_eq!(ring.snapshot().kids(), vec!["k1", "k2"]);
        // Earlier snapshots are untouched
        assert_eq!(before.kids(), vec!["k1"]);

        ring.retire("k1", from_unix_seconds(20)).unwrap();
        assert_eq!(
            ring.snapshot().get("k1").unwrap().retirement(),
            Some(from_unix_seconds(20))
        );

        ring.remove("k1").unwrap();
        assert_eq!(ring.snapshot().kids(), vec!["k2"]);

        assert!(matches!(ring.remove("k1"), Err(AuthError::UnknownKey(_))));
        assert!(ring.rotate(key("k2", 30)).is_err());
        assert_eq!(ring.snapshot().kids(), vec!["k2"]);
    }

    #[test]
    fn test_ring_from_empty_source_is_unavailable() {
        let err = KeyRing::from_source(&StaticKeySource::default()).unwrap_err();
        assert!(matches!(err, AuthError::KeyUnavailable(_)));
    }

    #[test]
    fn test_reload_keeps_current_on_failure() {
        let ring = KeyRing::from_source(&StaticKeySource::new(vec![key("k1", 0)])).unwrap();
        assert!(ring.reload(&StaticKeySource::default()).is_err());
        assert_eq!(ring.snapshot().kids(), vec!["k1"]);

        ring.reload(&StaticKeySource::new(vec![key("k9", 0)])).unwrap();
        assert_eq!(ring.snapshot().kids(), vec!["k9"]);
    }
}
