//! The token authority: issue, validate, refresh and revoke
//!
//! # Architecture
//!
//! ```text
//!            ┌────────────────────────┐
//!  issue ───►│                        │──► KeyRing snapshot (sign)
//! validate ─►│     TokenAuthority     │──► KeyRing snapshot (verify)
//!  refresh ─►│  (TokenPolicy, Clock)  │──► Blocklist (rotate old jti)
//!  revoke ──►│                        │──► AuditLogger / metrics
//!            └────────────────────────┘
//! ```
//!
//! The authority holds no per-token state. Issue and validate read one key
//! snapshot and never block each other; only refresh rotation and revoke
//! write, and they write a single blocklist entry each.

use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::{Header, Validation, decode, decode_header, encode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::audit::{AuditLogger, AuthEvent};
use crate::blocklist::{Blocklist, MemoryBlocklist};
use crate::clock::{Clock, SystemClock};
use crate::error::{AuthError, AuthResult};
use crate::identity::Identity;
use crate::keys::{KeyRing, KeySource};
use crate::metrics;
use crate::token::{IssuedToken, TokenClaims, VerifiedToken};

/// Longest accepted policy duration: 100 years, in seconds
pub const MAX_POLICY_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// Lifetime and revocation policy
///
/// All durations are whole seconds and at most [`MAX_POLICY_SECS`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenPolicy {
    /// Token lifetime
    pub ttl: u64,
    /// How long after `iat` a token may still be exchanged by refresh
    pub refresh_ttl: u64,
    /// Tolerance applied to expiry and refresh checks
    pub leeway: u64,
    /// Issuer written to `iss` and required on validation
    pub issuer: Option<String>,
    /// Consult the blocklist; when off, logout and revoke are no-ops
    pub revocation: bool,
    /// Block the presented token id after a successful refresh
    pub rotate_on_refresh: bool,
    /// Absolute cap on a refresh chain, measured from the first issue
    pub max_session_lifetime: Option<u64>,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            ttl: 3600,
            refresh_ttl: 7200,
            leeway: 0,
            issuer: None,
            revocation: true,
            rotate_on_refresh: true,
            max_session_lifetime: None,
        }
    }
}

impl TokenPolicy {
    /// Check the policy is usable
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if `ttl` is zero, any duration
    /// exceeds [`MAX_POLICY_SECS`], `refresh_ttl` is shorter than `ttl`, or
    /// the issuer is blank.
    pub fn validate(&self) -> AuthResult<()> {
        let durations = [
            ("ttl", Some(self.ttl)),
            ("refresh_ttl", Some(self.refresh_ttl)),
            ("leeway", Some(self.leeway)),
            ("max_session_lifetime", self.max_session_lifetime),
        ];
        for (name, secs) in durations {
            if let Some(secs) = secs
                && secs > MAX_POLICY_SECS
            {
                return Err(AuthError::Configuration(format!(
                    "{name} ({secs}) must not exceed {MAX_POLICY_SECS} seconds"
                )));
            }
        }
        if self.ttl == 0 {
            return Err(AuthError::Configuration(
                "ttl must be greater than zero".to_string(),
            ));
        }
        if self.refresh_ttl < self.ttl {
            return Err(AuthError::Configuration(format!(
                "refresh_ttl ({}) must be at least ttl ({})",
                self.refresh_ttl, self.ttl
            )));
        }
        if self.issuer.as_deref().is_some_and(|iss| iss.trim().is_empty()) {
            return Err(AuthError::Configuration(
                "issuer must not be blank".to_string(),
            ));
        }
        Ok(())
    }

    /// Lifetime of a blocklist entry created by id alone
    pub fn grace_window(&self) -> Duration {
        Duration::from_secs(self.refresh_ttl.saturating_add(self.leeway))
    }
}

/// Issues, validates, refreshes and revokes bearer tokens
///
/// ```
/// use std::sync::Arc;
/// use jsonwebtoken::Algorithm;
/// use warden_auth::{Identity, KeyRing, KeySet, SigningKey, TokenAuthority};
///
/// # tokio_test::block_on(async {
/// let key = SigningKey::hmac("k1", Algorithm::HS256, &[7u8; 32])?;
/// let authority = TokenAuthority::builder()
///     .keys(Arc::new(KeyRing::new(KeySet::new([key])?)))
///     .build()?;
///
/// let issued = authority.issue(&Identity::new("42").with_claim("role", "admin"))?;
/// let verified = authority.validate(issued.token()).await?;
/// assert_eq!(verified.subject(), "42");
/// # Ok::<(), warden_auth::AuthError>(())
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct TokenAuthority {
    keys: Arc<KeyRing>,
    policy: TokenPolicy,
    blocklist: Arc<dyn Blocklist>,
    clock: Arc<dyn Clock>,
    audit: AuditLogger,
}

impl TokenAuthority {
    /// Start building an authority
    pub fn builder() -> TokenAuthorityBuilder {
        TokenAuthorityBuilder::default()
    }

    /// Effective policy
    pub fn policy(&self) -> &TokenPolicy {
        &self.policy
    }

    /// Shared key ring
    pub fn keys(&self) -> &Arc<KeyRing> {
        &self.keys
    }

    /// Shared blocklist
    pub fn blocklist(&self) -> &Arc<dyn Blocklist> {
        &self.blocklist
    }

    /// Injected clock
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Audit logger events are sent to
    pub fn audit(&self) -> &AuditLogger {
        &self.audit
    }

    /// Sign a new token for `identity`
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidIdentity`] if the identity cannot be
    /// embedded, or [`AuthError::KeyUnavailable`] if no key may sign now.
    pub fn issue(&self, identity: &Identity) -> AuthResult<IssuedToken> {
        identity.validate()?;
        let now = self.clock.unix_now();
        let issued = self.sign(identity, now, now)?;

        metrics::record_issued("issue");
        self.audit.log(AuthEvent::TokenIssued {
            user_id: identity.subject().to_string(),
            token_id: issued.token_id().to_string(),
            key_id: issued.key_id().to_string(),
            expires_in: issued.expires_in().as_secs(),
        });
        Ok(issued)
    }

    /// Check a presented token and return what it asserts
    ///
    /// Read-only; safe to call from any number of tasks at once.
    ///
    /// # Errors
    ///
    /// Returns the rejection kind: [`AuthError::Malformed`],
    /// [`AuthError::UnknownKey`], [`AuthError::BadSignature`],
    /// [`AuthError::Expired`] or [`AuthError::Revoked`]. A blocklist outage
    /// surfaces as [`AuthError::Blocklist`].
    pub async fn validate(&self, token: &str) -> AuthResult<VerifiedToken> {
        let started = Instant::now();
        let result = self.validate_inner(token).await;

        let reason = result.as_ref().map_or_else(AuthError::kind, |_| "ok");
        metrics::record_validation(reason, started.elapsed().as_secs_f64());
        if let Err(error) = &result {
            debug!(reason, error = %error, "Token validation failed");
        }
        result
    }

    async fn validate_inner(&self, token: &str) -> AuthResult<VerifiedToken> {
        let now = self.clock.unix_now();
        let (claims, key_id) = self.verify(token)?;

        let deadline = claims.exp.saturating_add(self.policy.leeway);
        if now > deadline {
            return Err(AuthError::Expired {
                expired_at: claims.exp,
                now,
            });
        }

        self.ensure_not_revoked(&claims.jti).await?;
        Ok(VerifiedToken::from_claims(claims, key_id))
    }

    /// Exchange a token for a new one with the same identity
    ///
    /// The presented token may be expired as long as it is still inside its
    /// refresh window. With rotation on, its id is blocked; if another
    /// refresh of the same token got there first, this one fails with
    /// [`AuthError::Revoked`] and its replacement is discarded.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::RefreshWindowElapsed`] past the horizon or the
    /// session cap, any verification failure of [`TokenAuthority::validate`]
    /// except expiry, or [`AuthError::KeyUnavailable`].
    pub async fn refresh(&self, token: &str) -> AuthResult<IssuedToken> {
        let result = self.refresh_inner(token).await;
        metrics::record_refresh(result.as_ref().map_or_else(AuthError::kind, |_| "ok"));
        if let Err(error) = &result {
            debug!(reason = error.kind(), error = %error, "Token refresh failed");
        }
        result
    }

    async fn refresh_inner(&self, token: &str) -> AuthResult<IssuedToken> {
        let now = self.clock.unix_now();
        let (claims, _) = self.verify(token)?;

        let horizon = self.refresh_horizon(&claims);
        if now > horizon {
            return Err(AuthError::RefreshWindowElapsed { horizon, now });
        }
        if let Some(max_lifetime) = self.policy.max_session_lifetime {
            let session_end = claims
                .orig_iat
                .saturating_add(max_lifetime)
                .saturating_add(self.policy.leeway);
            if now > session_end {
                return Err(AuthError::RefreshWindowElapsed {
                    horizon: session_end,
                    now,
                });
            }
        }

        self.ensure_not_revoked(&claims.jti).await?;

        let identity = claims.identity();
        let issued = self.sign(&identity, now, claims.orig_iat)?;

        if self.policy.revocation && self.policy.rotate_on_refresh {
            let ttl = Duration::from_secs(horizon.saturating_sub(now).max(1));
            if !self.blocklist.insert_if_absent(&claims.jti, ttl).await? {
                self.audit.log(AuthEvent::RefreshReplay {
                    user_id: claims.sub.clone(),
                    token_id: claims.jti.clone(),
                });
                return Err(AuthError::Revoked(claims.jti));
            }
            metrics::record_revocation("rotation");
        }

        metrics::record_issued("refresh");
        self.audit.log(AuthEvent::TokenRefreshed {
            user_id: claims.sub,
            previous_token_id: claims.jti,
            token_id: issued.token_id().to_string(),
        });
        Ok(issued)
    }

    /// Block a token id for the full grace window
    ///
    /// Returns whether this call added the entry; revoking twice is not an
    /// error. With revocation disabled this only logs a warning.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Malformed`] for an empty id or
    /// [`AuthError::Blocklist`] if the store fails.
    pub async fn revoke(&self, token_id: &str) -> AuthResult<bool> {
        if token_id.trim().is_empty() {
            return Err(AuthError::Malformed("token id must not be empty".to_string()));
        }
        self.block(token_id, self.policy.grace_window(), "explicit")
            .await
    }

    /// Verify a token (expiry ignored) and block its id until its refresh
    /// horizon
    ///
    /// A token already past its horizon is unusable anyway, so nothing is
    /// stored and `false` is returned.
    ///
    /// # Errors
    ///
    /// Returns the verification failure ([`AuthError::Malformed`],
    /// [`AuthError::UnknownKey`], [`AuthError::BadSignature`]) or
    /// [`AuthError::Blocklist`].
    pub async fn revoke_token(&self, token: &str) -> AuthResult<bool> {
        let now = self.clock.unix_now();
        let (claims, _) = self.verify(token)?;

        let horizon = self.refresh_horizon(&claims);
        if now > horizon {
            debug!("Token already past its refresh horizon, nothing to revoke");
            return Ok(false);
        }

        let ttl = Duration::from_secs(horizon.saturating_sub(now).max(1));
        self.block(&claims.jti, ttl, "bearer").await
    }

    /// Re-read `source`, publish it, and record the new key set
    ///
    /// # Errors
    ///
    /// Returns the source's error; the previous key set stays live.
    pub fn reload_keys(&self, source: &dyn KeySource) -> AuthResult<Vec<String>> {
        let set = self.keys.reload(source)?;
        let key_ids = set.kids();
        self.audit.log(AuthEvent::KeySetPublished {
            key_ids: key_ids.clone(),
        });
        Ok(key_ids)
    }

    async fn block(&self, token_id: &str, ttl: Duration, reason: &'static str) -> AuthResult<bool> {
        if !self.policy.revocation {
            warn!(reason, "Revocation is disabled; token stays valid until expiry");
            return Ok(false);
        }

        let inserted = self.blocklist.insert_if_absent(token_id, ttl).await?;
        if inserted {
            metrics::record_revocation(reason);
            self.audit.log(AuthEvent::TokenRevoked {
                token_id: token_id.to_string(),
                reason: reason.to_string(),
            });
        }
        Ok(inserted)
    }

    async fn ensure_not_revoked(&self, token_id: &str) -> AuthResult<()> {
        if self.policy.revocation && self.blocklist.contains(token_id).await? {
            return Err(AuthError::Revoked(token_id.to_string()));
        }
        Ok(())
    }

    fn refresh_horizon(&self, claims: &TokenClaims) -> u64 {
        claims
            .iat
            .saturating_add(self.policy.refresh_ttl)
            .saturating_add(self.policy.leeway)
    }

    fn sign(&self, identity: &Identity, now: u64, orig_iat: u64) -> AuthResult<IssuedToken> {
        let snapshot = self.keys.snapshot();
        let key = snapshot
            .active_at(self.clock.now())
            .ok_or_else(|| AuthError::KeyUnavailable("no key is inside its signing window".to_string()))?;
        let encoding_key = key.encoding_key().ok_or_else(|| {
            AuthError::KeyUnavailable(format!("key '{}' has no signing material", key.kid()))
        })?;

        let claims = TokenClaims {
            sub: identity.subject().to_string(),
            iat: now,
            exp: now.saturating_add(self.policy.ttl),
            jti: Uuid::new_v4().to_string(),
            orig_iat,
            iss: self.policy.issuer.clone(),
            claims: identity.claims().clone(),
        };

        let mut header = Header::new(key.algorithm());
        header.kid = Some(key.kid().to_string());

        let token = encode(&header, &claims, encoding_key).map_err(|e| {
            AuthError::KeyUnavailable(format!("signing with key '{}' failed: {e}", key.kid()))
        })?;

        debug!(
            subject = %claims.sub,
            key_id = %key.kid(),
            expires_at = claims.exp,
            "Token signed"
        );
        Ok(IssuedToken::new(token, &claims, key.kid()))
    }

    /// Structure, key and signature checks shared by every operation; no
    /// time or blocklist checks
    fn verify(&self, token: &str) -> AuthResult<(TokenClaims, String)> {
        let header = decode_header(token)
            .map_err(|e| AuthError::Malformed(format!("invalid token header: {e}")))?;
        let key_id = header
            .kid
            .ok_or_else(|| AuthError::Malformed("token header has no key id".to_string()))?;

        let snapshot = self.keys.snapshot();
        let key = snapshot.verifier(&key_id, self.clock.now())?;
        if header.alg != key.algorithm() {
            warn!(
                key_id = %key_id,
                presented = ?header.alg,
                expected = ?key.algorithm(),
                "Token algorithm does not match its key"
            );
            return Err(AuthError::BadSignature);
        }

        let mut validation = Validation::new(key.algorithm());
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<TokenClaims>(token, key.decoding_key(), &validation)?;
        let claims = data.claims;

        if claims.exp <= claims.iat {
            return Err(AuthError::Malformed(
                "token expires before it was issued".to_string(),
            ));
        }
        if let Some(expected) = &self.policy.issuer
            && claims.iss.as_deref() != Some(expected.as_str())
        {
            return Err(AuthError::Malformed(format!(
                "unexpected issuer {:?}",
                claims.iss
            )));
        }

        Ok((claims, key_id))
    }
}

/// Builder for [`TokenAuthority`]
#[derive(Debug, Default)]
pub struct TokenAuthorityBuilder {
    keys: Option<Arc<KeyRing>>,
    policy: TokenPolicy,
    blocklist: Option<Arc<dyn Blocklist>>,
    clock: Option<Arc<dyn Clock>>,
    audit: Option<AuditLogger>,
}

impl TokenAuthorityBuilder {
    /// Key ring to sign and verify with (required)
    pub fn keys(mut self, keys: Arc<KeyRing>) -> Self {
        self.keys = Some(keys);
        self
    }

    /// Lifetime and revocation policy
    pub fn policy(mut self, policy: TokenPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Blocklist store; defaults to a [`MemoryBlocklist`] on the same clock
    pub fn blocklist(mut self, blocklist: Arc<dyn Blocklist>) -> Self {
        self.blocklist = Some(blocklist);
        self
    }

    /// Time source; defaults to [`SystemClock`]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Audit logger; defaults to service name "warden"
    pub fn audit(mut self, audit: AuditLogger) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Build the authority
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if no key ring was given or the
    /// policy is invalid.
    pub fn build(self) -> AuthResult<TokenAuthority> {
        let keys = self
            .keys
            .ok_or_else(|| AuthError::Configuration("a key ring is required".to_string()))?;
        self.policy.validate()?;

        let clock: Arc<dyn Clock> = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let blocklist = self
            .blocklist
            .unwrap_or_else(|| Arc::new(MemoryBlocklist::with_clock(Arc::clone(&clock))));

        Ok(TokenAuthority {
            keys,
            policy: self.policy,
            blocklist,
            clock,
            audit: self.audit.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, from_unix_seconds};
    use crate::keys::{KeySet, SigningKey};
    use jsonwebtoken::Algorithm;

    fn authority_with(policy: TokenPolicy) -> (TokenAuthority, ManualClock) {
        let clock = ManualClock::at_unix(0);
        let key = SigningKey::hmac("k1", Algorithm::HS256, &[1u8; 32]).unwrap();
        let authority = TokenAuthority::builder()
            .keys(Arc::new(KeyRing::new(KeySet::new([key]).unwrap())))
            .policy(policy)
            .clock(Arc::new(clock.clone()))
            .build()
            .unwrap();
        (authority, clock)
    }

    fn authority() -> (TokenAuthority, ManualClock) {
        authority_with(TokenPolicy::default())
    }

    #[test]
    fn test_policy_validation() {
        assert!(TokenPolicy::default().validate().is_ok());
        let zero = TokenPolicy {
            ttl: 0,
            ..TokenPolicy::default()
        };
        assert!(matches!(zero.validate(), Err(AuthError::Configuration(_))));
        let short = TokenPolicy {
            ttl: 100,
            refresh_ttl: 50,
            ..TokenPolicy::default()
        };
        assert!(short.validate().is_err());
    }

    #[test]
    fn test_policy_rejects_durations_past_clock_range() {
        let huge = TokenPolicy {
            ttl: u64::MAX,
            refresh_ttl: u64::MAX,
            ..TokenPolicy::default()
        };
        assert!(matches!(huge.validate(), Err(AuthError::Configuration(_))));

        let key = SigningKey::hmac("k1", Algorithm::HS256, &[1u8; 32]).unwrap();
        let err = TokenAuthority::builder()
            .keys(Arc::new(KeyRing::new(KeySet::new([key]).unwrap())))
            .policy(TokenPolicy {
                refresh_ttl: u64::MAX,
                ..TokenPolicy::default()
            })
            .build()
            .unwrap_err();
        assert!(err.is_fatal());

        let leeway = TokenPolicy {
            leeway: MAX_POLICY_SECS + 1,
            ..TokenPolicy::default()
        };
        assert!(leeway.validate().is_err());
        let session = TokenPolicy {
            max_session_lifetime: Some(u64::MAX),
            ..TokenPolicy::default()
        };
        assert!(session.validate().is_err());
    }

    #[tokio::test]
    async fn test_longest_policy_issues_and_revokes() {
        let (authority, clock) = authority_with(TokenPolicy {
            ttl: MAX_POLICY_SECS,
            refresh_ttl: MAX_POLICY_SECS,
            leeway: MAX_POLICY_SECS,
            ..TokenPolicy::default()
        });
        clock.set_unix(1_700_000_000);

        let issued = authority.issue(&Identity::new("42")).unwrap();
        assert!(authority.validate(issued.token()).await.is_ok());
        assert!(authority.revoke(issued.token_id()).await.unwrap());
        assert!(matches!(
            authority.validate(issued.token()).await,
            Err(AuthError::Revoked(_))
        ));
    }

    #[test]
    fn test_builder_requires_keys() {
        let err = TokenAuthority::builder().build().unwrap_err();
        assert!(matches!(err, AuthError::Configuration(_)));
    }

    #[test]
    fn test_issue_sets_times_from_clock() {
        let (authority, clock) = authority();
        clock.set_unix(1_000);
        let issued = authority.issue(&Identity::new("42")).unwrap();
        assert_eq!(issued.issued_at(), from_unix_seconds(1_000));
        assert_eq!(issued.expires_at(), from_unix_seconds(4_600));
        assert_eq!(issued.key_id(), "k1");
    }

    #[test]
    fn test_issue_rejects_invalid_identity() {
        let (authority, _) = authority();
        assert!(matches!(
            authority.issue(&Identity::new(" ")),
            Err(AuthError::InvalidIdentity(_))
        ));
    }

    #[tokio::test]
    async fn test_expiry_boundary_respects_leeway() {
        let (authority, clock) = authority_with(TokenPolicy {
            leeway: 5,
            ..TokenPolicy::default()
        });
        let issued = authority.issue(&Identity::new("42")).unwrap();

        clock.set_unix(3605);
        assert!(authority.validate(issued.token()).await.is_ok());
        clock.set_unix(3606);
        assert!(matches!(
            authority.validate(issued.token()).await,
            Err(AuthError::Expired { expired_at: 3600, now: 3606 })
        ));
    }

    #[tokio::test]
    async fn test_issuer_mismatch_is_malformed() {
        let (issuer_a, _) = authority_with(TokenPolicy {
            issuer: Some("a".to_string()),
            ..TokenPolicy::default()
        });
        let (issuer_b, _) = authority_with(TokenPolicy {
            issuer: Some("b".to_string()),
            ..TokenPolicy::default()
        });
        let issued = issuer_a.issue(&Identity::new("42")).unwrap();
        assert!(matches!(
            issuer_b.validate(issued.token()).await,
            Err(AuthError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_session_cap_limits_refresh_chain() {
        let (authority, clock) = authority_with(TokenPolicy {
            max_session_lifetime: Some(5_000),
            ..TokenPolicy::default()
        });
        let first = authority.issue(&Identity::new("42")).unwrap();

        clock.set_unix(3_000);
        let second = authority.refresh(first.token()).await.unwrap();

        clock.set_unix(5_001);
        assert!(matches!(
            authority.refresh(second.token()).await,
            Err(AuthError::RefreshWindowElapsed { horizon: 5_000, now: 5_001 })
        ));
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let (authority, _) = authority();
        let issued = authority.issue(&Identity::new("42")).unwrap();

        assert!(authority.revoke(issued.token_id()).await.unwrap());
        assert!(!authority.revoke(issued.token_id()).await.unwrap());
        assert!(matches!(
            authority.validate(issued.token()).await,
            Err(AuthError::Revoked(_))
        ));
    }

    #[tokio::test]
    async fn test_revocation_disabled_is_stateless() {
        let (authority, _) = authority_with(TokenPolicy {
            revocation: false,
            ..TokenPolicy::default()
        });
        let issued = authority.issue(&Identity::new("42")).unwrap();

        assert!(!authority.revoke_token(issued.token()).await.unwrap());
        assert!(authority.validate(issued.token()).await.is_ok());

        // Without rotation the old token keeps working until it expires
        let refreshed = authority.refresh(issued.token()).await.unwrap();
        assert_ne!(refreshed.token_id(), issued.token_id());
        assert!(authority.validate(issued.token()).await.is_ok());
    }

    #[tokio::test]
    async fn test_revoke_token_past_horizon_stores_nothing() {
        let (authority, clock) = authority();
        let issued = authority.issue(&Identity::new("42")).unwrap();

        clock.set_unix(7_201);
        assert!(!authority.revoke_token(issued.token()).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_kid_is_malformed() {
        let (authority, _) = authority();
        let header = Header::new(Algorithm::HS256);
        let claims = serde_json::json!({"sub": "42", "iat": 0, "exp": 10, "jti": "x", "orig_iat": 0});
        let token = encode(&header, &claims, &jsonwebtoken::EncodingKey::from_secret(&[1u8; 32]))
            .unwrap();

        assert!(matches!(
            authority.validate(&token).await,
            Err(AuthError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_algorithm_mismatch_is_bad_signature() {
        let (authority, _) = authority();
        let mut header = Header::new(Algorithm::HS512);
        header.kid = Some("k1".to_string());
        let claims = serde_json::json!({"sub": "42", "iat": 0, "exp": 10, "jti": "x", "orig_iat": 0});
        let token = encode(&header, &claims, &jsonwebtoken::EncodingKey::from_secret(&[1u8; 32]))
            .unwrap();

        assert_eq!(
            authority.validate(&token).await.unwrap_err(),
            AuthError::BadSignature
        );
    }
}
