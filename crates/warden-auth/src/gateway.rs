//! Login, register, logout and refresh on top of the token authority
//!
//! The gateway is transport-agnostic: an HTTP layer (or anything else)
//! decodes requests into the types here, calls one operation, and renders
//! the [`AuthSession`] or [`GatewayError`] it gets back.
//!
//! Which operations need a token is fixed in [`Operation::access`]; the
//! transport consults that table before dispatching.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::audit::{AuditLogger, AuthEvent};
use crate::authority::TokenAuthority;
use crate::directory::DirectoryError;
use crate::error::AuthError;
use crate::identity::Identity;
use crate::token::{IssuedToken, VerifiedToken};

/// Longest accepted name and email, in characters
pub const MAX_FIELD_LEN: usize = 255;

/// Shortest accepted password, in characters
pub const MIN_PASSWORD_LEN: usize = 6;

/// Upward operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Exchange credentials for a token
    Login,
    /// Create an account and sign in
    Register,
    /// Revoke the presented token
    Logout,
    /// Exchange a token for a new one
    Refresh,
}

/// What a caller must present before an operation runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// No token needed
    Public,
    /// A token that passes full validation
    Bearer,
    /// A token is required but only checked by refresh itself, so an
    /// expired token inside its refresh window still gets through
    RefreshableBearer,
}

impl Operation {
    /// Every operation, in routing order
    pub const ALL: [Operation; 4] = [
        Operation::Login,
        Operation::Register,
        Operation::Logout,
        Operation::Refresh,
    ];

    /// Static access policy
    pub const fn access(self) -> Access {
        match self {
            Operation::Login | Operation::Register => Access::Public,
            Operation::Logout => Access::Bearer,
            Operation::Refresh => Access::RefreshableBearer,
        }
    }

    /// Label for logs and audit records
    pub const fn as_str(self) -> &'static str {
        match self {
            Operation::Login => "login",
            Operation::Register => "register",
            Operation::Logout => "logout",
            Operation::Refresh => "refresh",
        }
    }
}

/// Public view of an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Stable user id; becomes the token subject
    pub id: String,
    /// Display name
    pub name: String,
    /// Login email
    pub email: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    /// Identity embedded in this user's tokens
    pub fn identity(&self) -> Identity {
        Identity::new(self.id.clone())
    }
}

/// Account creation input, already validated
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Display name
    pub name: String,
    /// Login email
    pub email: String,
    /// Plain password; only the directory ever hashes it
    pub password: SecretString,
}

/// Checks a login attempt
#[async_trait]
pub trait CredentialChecker: Send + Sync + Debug {
    /// The matching profile, or `None` for unknown email or wrong password
    ///
    /// # Errors
    ///
    /// Returns a [`DirectoryError`] only when the check could not be made.
    async fn verify(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Option<UserProfile>, DirectoryError>;
}

/// Creates and looks up accounts
#[async_trait]
pub trait UserRegistry: Send + Sync + Debug {
    /// Persist a new account
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::DuplicateEmail`] if the email is taken.
    async fn create(&self, user: &NewUser) -> Result<UserProfile, DirectoryError>;

    /// Look an account up by id
    ///
    /// # Errors
    ///
    /// Returns a [`DirectoryError`] if the store cannot be reached.
    async fn find(&self, user_id: &str) -> Result<Option<UserProfile>, DirectoryError>;
}

// Custom deserialization for SecretString
fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Ok(SecretString::new(s))
}

fn empty_secret() -> SecretString {
    SecretString::new(String::new())
}

/// Login body
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    /// Account email
    #[serde(default)]
    pub email: String,
    /// Account password
    #[serde(default = "empty_secret", deserialize_with = "deserialize_secret")]
    pub password: SecretString,
}

/// Registration body
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Account email
    #[serde(default)]
    pub email: String,
    /// Account password
    #[serde(default = "empty_secret", deserialize_with = "deserialize_secret")]
    pub password: SecretString,
}

/// Per-field validation messages
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Outcome of a failed operation as the caller may see it
///
/// Every credential or token problem is [`GatewayError::Unauthorized`]; the
/// specific reason is logged, never returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Request fields failed validation
    #[error("The given data was invalid")]
    Validation(FieldErrors),

    /// Credentials or token rejected
    #[error("Unauthorized")]
    Unauthorized,

    /// A dependency (key ring, blocklist, user store) cannot serve requests
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Unexpected failure
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Successful login, register or refresh
#[derive(Debug, Clone)]
pub struct AuthSession {
    /// Token subject
    pub subject: String,
    /// Account profile; absent if it could not be looked up after refresh
    pub user: Option<UserProfile>,
    /// The new token
    pub token: IssuedToken,
}

impl AuthSession {
    /// Always "bearer"
    pub fn token_type(&self) -> &'static str {
        "bearer"
    }

    /// Token lifetime in seconds
    pub fn expires_in(&self) -> u64 {
        self.token.expires_in().as_secs()
    }
}

/// The four upward operations
#[derive(Debug, Clone)]
pub struct AuthGateway {
    authority: TokenAuthority,
    credentials: Arc<dyn CredentialChecker>,
    users: Arc<dyn UserRegistry>,
    audit: AuditLogger,
}

impl AuthGateway {
    /// Gateway over an authority and its collaborators
    pub fn new(
        authority: TokenAuthority,
        credentials: Arc<dyn CredentialChecker>,
        users: Arc<dyn UserRegistry>,
    ) -> Self {
        let audit = authority.audit().clone();
        Self {
            authority,
            credentials,
            users,
            audit,
        }
    }

    /// Underlying authority
    pub fn authority(&self) -> &TokenAuthority {
        &self.authority
    }

    /// Verify credentials and issue a token
    ///
    /// # Errors
    ///
    /// [`GatewayError::Validation`] for missing fields,
    /// [`GatewayError::Unauthorized`] for bad credentials.
    pub async fn login(&self, request: LoginRequest) -> Result<AuthSession, GatewayError> {
        let mut errors = FieldErrors::new();
        check_email(&mut errors, &request.email, false);
        check_required(&mut errors, "password", request.password.expose_secret());
        if !errors.is_empty() {
            return Err(GatewayError::Validation(errors));
        }

        let profile = self
            .credentials
            .verify(request.email.trim(), &request.password)
            .await
            .map_err(|e| directory_failure(Operation::Login.as_str(), &e))?;

        let Some(profile) = profile else {
            self.audit.log(AuthEvent::LoginFailure {
                attempted_user: Some(request.email.trim().to_string()),
                reason: "invalid credentials".to_string(),
            });
            return Err(GatewayError::Unauthorized);
        };

        let token = self
            .authority
            .issue(&profile.identity())
            .map_err(|e| self.reject(Operation::Login.as_str(), e))?;

        self.audit.log(AuthEvent::LoginSuccess {
            user_id: profile.id.clone(),
        });
        Ok(AuthSession {
            subject: profile.id.clone(),
            user: Some(profile),
            token,
        })
    }

    /// Validate, create the account, and issue its first token
    ///
    /// # Errors
    ///
    /// [`GatewayError::Validation`] for rule violations, including an email
    /// that is already registered.
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthSession, GatewayError> {
        let errors = validate_registration(&request);
        if !errors.is_empty() {
            return Err(GatewayError::Validation(errors));
        }

        let new_user = NewUser {
            name: request.name.trim().to_string(),
            email: request.email.trim().to_string(),
            password: request.password,
        };

        let profile = match self.users.create(&new_user).await {
            Ok(profile) => profile,
            Err(DirectoryError::DuplicateEmail) => {
                let mut errors = FieldErrors::new();
                push(&mut errors, "email", "The email has already been taken.");
                return Err(GatewayError::Validation(errors));
            }
            Err(e) => return Err(directory_failure(Operation::Register.as_str(), &e)),
        };

        self.audit.log(AuthEvent::UserRegistered {
            user_id: profile.id.clone(),
        });

        let token = self
            .authority
            .issue(&profile.identity())
            .map_err(|e| self.reject(Operation::Register.as_str(), e))?;

        Ok(AuthSession {
            subject: profile.id.clone(),
            user: Some(profile),
            token,
        })
    }

    /// Revoke a currently valid token
    ///
    /// # Errors
    ///
    /// [`GatewayError::Unauthorized`] if the token is not valid right now.
    pub async fn logout(&self, token: &str) -> Result<(), GatewayError> {
        let verified = self
            .authority
            .validate(token)
            .await
            .map_err(|e| self.reject(Operation::Logout.as_str(), e))?;

        self.authority
            .revoke_token(token)
            .await
            .map_err(|e| self.reject(Operation::Logout.as_str(), e))?;

        debug!(subject = %verified.subject(), "Logged out");
        Ok(())
    }

    /// Exchange a token for a new one
    ///
    /// # Errors
    ///
    /// [`GatewayError::Unauthorized`] for any refresh rejection.
    pub async fn refresh(&self, token: &str) -> Result<AuthSession, GatewayError> {
        let issued = self
            .authority
            .refresh(token)
            .await
            .map_err(|e| self.reject(Operation::Refresh.as_str(), e))?;

        // The old token is already rotated out; a lookup failure must not
        // lose the new one
        let subject = issued.subject().to_string();
        let user = match self.users.find(&subject).await {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "Profile lookup after refresh failed");
                None
            }
        };

        Ok(AuthSession {
            subject,
            user,
            token: issued,
        })
    }

    /// Profile for an already validated token
    ///
    /// # Errors
    ///
    /// [`GatewayError::Unavailable`] if the user store fails.
    pub async fn profile(&self, verified: &VerifiedToken) -> Result<Option<UserProfile>, GatewayError> {
        self.users
            .find(verified.subject())
            .await
            .map_err(|e| directory_failure("profile", &e))
    }

    /// Collapse an authority error into what the caller may see
    ///
    /// Rejections are audited with `operation` as the label.
    pub fn reject(&self, operation: &str, error: AuthError) -> GatewayError {
        if error.is_rejection() {
            self.audit.log(AuthEvent::TokenRejected {
                reason: error.kind().to_string(),
                operation: operation.to_string(),
            });
            return GatewayError::Unauthorized;
        }

        error!(
            operation,
            reason = error.kind(),
            error = %error,
            "Token authority failure"
        );
        match error {
            AuthError::KeyUnavailable(_) | AuthError::Blocklist(_) => {
                GatewayError::Unavailable(error.kind().to_string())
            }
            _ => GatewayError::Internal(error.kind().to_string()),
        }
    }
}

fn directory_failure(operation: &'static str, error: &DirectoryError) -> GatewayError {
    error!(operation, error = %error, "User directory failure");
    match error {
        DirectoryError::Unavailable(_) => GatewayError::Unavailable("user directory".to_string()),
        _ => GatewayError::Internal("user directory".to_string()),
    }
}

/// Apply the registration rules; empty result means valid
pub fn validate_registration(request: &RegisterRequest) -> FieldErrors {
    let mut errors = FieldErrors::new();

    let name = request.name.trim();
    if check_required(&mut errors, "name", name) && name.chars().count() > MAX_FIELD_LEN {
        push(
            &mut errors,
            "name",
            format!("The name field must not be greater than {MAX_FIELD_LEN} characters."),
        );
    }

    check_email(&mut errors, &request.email, true);

    let password = request.password.expose_secret();
    if check_required(&mut errors, "password", password)
        && password.chars().count() < MIN_PASSWORD_LEN
    {
        push(
            &mut errors,
            "password",
            format!("The password field must be at least {MIN_PASSWORD_LEN} characters."),
        );
    }

    errors
}

fn check_required(errors: &mut FieldErrors, field: &str, value: &str) -> bool {
    if value.trim().is_empty() {
        push(errors, field, format!("The {field} field is required."));
        return false;
    }
    true
}

fn check_email(errors: &mut FieldErrors, email: &str, enforce_length: bool) {
    let email = email.trim();
    if !check_required(errors, "email", email) {
        return;
    }
    if !is_well_formed_email(email) {
        push(errors, "email", "The email field must be a valid email address.");
    }
    if enforce_length && email.chars().count() > MAX_FIELD_LEN {
        push(
            errors,
            "email",
            format!("The email field must not be greater than {MAX_FIELD_LEN} characters."),
        );
    }
}

fn push(errors: &mut FieldErrors, field: &str, message: impl Into<String>) {
    errors
        .entry(field.to_string())
        .or_default()
        .push(message.into());
}

/// `local@domain.tld` with no whitespace and non-empty dot-separated labels
pub fn is_well_formed_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') || email.chars().any(char::is_whitespace) {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|label| !label.is_empty())
}
