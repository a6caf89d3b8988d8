//! # Warden Auth - Stateless Bearer-Token Authority
//!
//! Issues, validates, refreshes and revokes signed bearer tokens that assert
//! a user identity. Tokens are compact JWS documents signed with a versioned
//! key; the authority keeps no session state beyond a short-lived blocklist
//! of revoked token ids.
//!
//! ## Design Principles
//!
//! - **Explicit identity**: callers pass an [`Identity`] in and get a
//!   [`VerifiedToken`] out; there is no ambient "current user"
//! - **Snapshot keys**: rotation publishes a whole new [`KeySet`], readers
//!   never lock
//! - **Replay-safe refresh**: the presented token id is blocked with an
//!   atomic check-and-insert, so concurrent refreshes yield one winner
//! - **Opaque rejections**: every [`AuthError`] has a stable
//!   [`kind`](AuthError::kind) for logs and metrics, and the [`gateway`]
//!   collapses them into one "unauthorized" for callers
//!
//! ## Architecture
//!
//! - [`authority`] - [`TokenAuthority`] and its [`TokenPolicy`]
//! - [`keys`] - [`SigningKey`], [`KeySet`] snapshots, [`KeyRing`], [`KeySource`]
//! - [`blocklist`] - [`Blocklist`] trait and [`MemoryBlocklist`]
//! - [`token`] - wire payload, [`IssuedToken`], [`VerifiedToken`]
//! - [`identity`] - [`Identity`] and claim values
//! - [`clock`] - injectable [`Clock`]
//! - [`gateway`] - login / register / logout / refresh over collaborator traits
//! - [`directory`] - [`MemoryUserDirectory`] with Argon2id hashes
//! - [`config`] - serde configuration and the config-backed key source
//! - [`audit`] - structured audit events
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use jsonwebtoken::Algorithm;
//! use warden_auth::clock::ManualClock;
//! use warden_auth::{AuthError, Identity, KeyRing, KeySet, SigningKey, TokenAuthority};
//!
//! # tokio_test::block_on(async {
//! let clock = ManualClock::at_unix(0);
//! let key = SigningKey::hmac("2026-01", Algorithm::HS256, b"an-hmac-secret-of-at-least-32-bytes")?;
//! let authority = TokenAuthority::builder()
//!     .keys(Arc::new(KeyRing::new(KeySet::new([key])?)))
//!     .clock(Arc::new(clock.clone()))
//!     .build()?;
//!
//! let token = authority.issue(&Identity::new("42").with_claim("role", "admin"))?;
//! assert_eq!(authority.validate(token.token()).await?.subject(), "42");
//!
//! clock.advance(Duration::from_secs(3601));
//! assert!(matches!(
//!     authority.validate(token.token()).await,
//!     Err(AuthError::Expired { .. })
//! ));
//!
//! // Still inside the refresh window
//! let renewed = authority.refresh(token.token()).await?;
//! assert_ne!(renewed.token_id(), token.token_id());
//! # Ok::<(), AuthError>(())
//! # });
//! ```
//!
//! ## Feature Flags
//!
//! - `metrics` - counters and histograms for issue, validate, refresh and revoke

#![warn(missing_docs)]
#![warn(clippy::all)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod audit;
pub mod authority;
pub mod blocklist;
pub mod clock;
pub mod config;
pub mod directory;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod keys;
pub mod metrics;
pub mod token;

pub use audit::{AuditLogger, AuthEvent};
pub use authority::{TokenAuthority, TokenAuthorityBuilder, TokenPolicy};
pub use blocklist::{Blocklist, MemoryBlocklist};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AuthorityConfig, ConfigKeySource, KeyConfig};
pub use directory::{DirectoryError, MemoryUserDirectory};
pub use error::{AuthError, AuthResult};
pub use gateway::{
    Access, AuthGateway, AuthSession, CredentialChecker, GatewayError, LoginRequest, Operation,
    RegisterRequest, UserProfile, UserRegistry,
};
pub use identity::{ClaimValue, Claims, Identity};
pub use keys::{KeyRing, KeySet, KeySource, SigningKey, StaticKeySource};
pub use token::{IssuedToken, VerifiedToken};

// Re-export so callers can name algorithms without a direct dependency
pub use jsonwebtoken::Algorithm;
