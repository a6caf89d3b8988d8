//! In-memory user directory with Argon2id password hashes
//!
//! Good enough for development, tests and single-node demos. Password work
//! runs on tokio's blocking pool so it never stalls request tasks.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::gateway::{CredentialChecker, NewUser, UserProfile, UserRegistry};

/// User store failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// Email already registered
    #[error("Email address is already registered")]
    DuplicateEmail,

    /// Store cannot be reached
    #[error("User directory unavailable: {0}")]
    Unavailable(String),

    /// Hashing or verification could not run
    #[error("Password hashing failed: {0}")]
    Hashing(String),
}

#[derive(Debug, Clone)]
struct StoredUser {
    profile: UserProfile,
    password_hash: String,
}

/// Users keyed by lowercase email
pub struct MemoryUserDirectory {
    by_email: DashMap<String, StoredUser>,
    email_by_id: DashMap<String, String>,
    next_id: AtomicU64,
    hasher: Arc<Argon2<'static>>,
    // Compared against for unknown emails so both paths cost one verify
    dummy_hash: String,
}

impl fmt::Debug for MemoryUserDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryUserDirectory")
            .field("users", &self.by_email.len())
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}

impl MemoryUserDirectory {
    /// Directory with the default Argon2id parameters
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::Hashing`] if the hasher cannot be set up.
    pub fn new() -> Result<Self, DirectoryError> {
        Self::with_params(Params::default())
    }

    /// Directory with explicit Argon2id cost parameters
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::Hashing`] if the hasher cannot be set up.
    pub fn with_params(params: Params) -> Result<Self, DirectoryError> {
        let hasher = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let dummy_hash = hash_password(&hasher, &Uuid::new_v4().to_string())?;
        Ok(Self {
            by_email: DashMap::new(),
            email_by_id: DashMap::new(),
            next_id: AtomicU64::new(1),
            hasher: Arc::new(hasher),
            dummy_hash,
        })
    }

    /// Cheapest valid parameters; for tests only
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::Hashing`] if the hasher cannot be set up.
    pub fn for_tests() -> Result<Self, DirectoryError> {
        let params = Params::new(Params::MIN_M_COST, Params::MIN_T_COST, Params::MIN_P_COST, None)
            .map_err(|e| DirectoryError::Hashing(e.to_string()))?;
        Self::with_params(params)
    }

    /// Number of registered users
    pub fn len(&self) -> usize {
        self.by_email.len()
    }

    /// Whether no users are registered
    pub fn is_empty(&self) -> bool {
        self.by_email.is_empty()
    }

    async fn run_blocking<T, F>(&self, work: F) -> Result<T, DirectoryError>
    where
        T: Send + 'static,
        F: FnOnce(&Argon2<'static>) -> Result<T, DirectoryError> + Send + 'static,
    {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || work(&hasher))
            .await
            .map_err(|e| DirectoryError::Hashing(format!("hashing task failed: {e}")))?
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn hash_password(hasher: &Argon2<'_>, password: &str) -> Result<String, DirectoryError> {
    let salt = SaltString::generate(&mut OsRng);
    hasher
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| DirectoryError::Hashing(e.to_string()))
}

fn verify_password(hasher: &Argon2<'_>, password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| hasher.verify_password(password.as_bytes(), &parsed).is_ok())
        .unwrap_or(false)
}

#[async_trait]
impl CredentialChecker for MemoryUserDirectory {
    async fn verify(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Option<UserProfile>, DirectoryError> {
        let stored = self.by_email.get(&normalize_email(email)).map(|entry| entry.clone());
        let hash = stored
            .as_ref()
            .map_or_else(|| self.dummy_hash.clone(), |user| user.password_hash.clone());
        let password = password.clone();

        let matches = self
            .run_blocking(move |hasher| {
                Ok(verify_password(hasher, password.expose_secret(), &hash))
            })
            .await?;

        Ok(match stored {
            Some(user) if matches => Some(user.profile),
            _ => None,
        })
    }
}

#[async_trait]
impl UserRegistry for MemoryUserDirectory {
    async fn create(&self, user: &NewUser) -> Result<UserProfile, DirectoryError> {
        let key = normalize_email(&user.email);
        if self.by_email.contains_key(&key) {
            return Err(DirectoryError::DuplicateEmail);
        }

        let password = user.password.clone();
        let password_hash = self
            .run_blocking(move |hasher| hash_password(hasher, password.expose_secret()))
            .await?;

        // Hashing happened without a lock; the entry decides who wins
        match self.by_email.entry(key.clone()) {
            Entry::Occupied(_) => Err(DirectoryError::DuplicateEmail),
            Entry::Vacant(vacant) => {
                let now = Utc::now();
                let profile = UserProfile {
                    id: self.next_id.fetch_add(1, Ordering::SeqCst).to_string(),
                    name: user.name.clone(),
                    email: key.clone(),
                    created_at: now,
                    updated_at: now,
                };
                vacant.insert(StoredUser {
                    profile: profile.clone(),
                    password_hash,
                });
                self.email_by_id.insert(profile.id.clone(), key);
                debug!(user_id = %profile.id, "User created");
                Ok(profile)
            }
        }
    }

    async fn find(&self, user_id: &str) -> Result<Option<UserProfile>, DirectoryError> {
        let Some(email) = self.email_by_id.get(user_id).map(|entry| entry.clone()) else {
            return Ok(None);
        };
        Ok(self
            .by_email
            .get(&email)
            .map(|entry| entry.profile.clone()))
    }
}
