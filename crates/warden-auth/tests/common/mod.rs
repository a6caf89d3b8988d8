//! Shared fixtures for authority integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use warden_auth::clock::{ManualClock, from_unix_seconds};
use warden_auth::{
    Algorithm, AuthError, AuthResult, Blocklist, KeyRing, KeySet, SigningKey, TokenAuthority,
    TokenPolicy,
};

pub const HMAC_SECRET: &[u8] = b"integration-test-secret-0123456789abcdef";

pub const ES256_PRIVATE: &[u8] = include_bytes!("../fixtures/es256.pem");
pub const ES256_PUBLIC: &[u8] = include_bytes!("../fixtures/es256.pub.pem");

/// HS256 key active from the epoch
pub fn hmac_key(kid: &str) -> SigningKey {
    SigningKey::hmac(kid, Algorithm::HS256, HMAC_SECRET).expect("valid test key")
}

/// HS256 key with its own secret, active from `activates` (unix seconds)
pub fn hmac_key_from(kid: &str, secret: &[u8], activates: u64) -> SigningKey {
    SigningKey::hmac(kid, Algorithm::HS256, secret)
        .expect("valid test key")
        .activates_at(from_unix_seconds(activates))
}

/// ES256 key from the fixture pair
pub fn es256_key(kid: &str) -> SigningKey {
    SigningKey::from_pem(kid, Algorithm::ES256, Some(ES256_PRIVATE), ES256_PUBLIC)
        .expect("valid fixture PEM")
}

pub struct Harness {
    pub authority: TokenAuthority,
    pub clock: ManualClock,
    pub ring: Arc<KeyRing>,
}

/// Authority at unix time 0 with default policy and one HS256 key "k1"
pub fn harness() -> Harness {
    harness_with(TokenPolicy::default(), vec![hmac_key("k1")])
}

pub fn harness_with(policy: TokenPolicy, keys: Vec<SigningKey>) -> Harness {
    let clock = ManualClock::at_unix(0);
    let ring = Arc::new(KeyRing::new(KeySet::new(keys).expect("distinct key ids")));
    let authority = TokenAuthority::builder()
        .keys(Arc::clone(&ring))
        .policy(policy)
        .clock(Arc::new(clock.clone()))
        .build()
        .expect("valid authority");
    Harness {
        authority,
        clock,
        ring,
    }
}

/// Blocklist whose store is always unreachable
#[derive(Debug, Default)]
pub struct FailingBlocklist;

#[async_trait]
impl Blocklist for FailingBlocklist {
    async fn contains(&self, _token_id: &str) -> AuthResult<bool> {
        Err(AuthError::Blocklist("connection refused".to_string()))
    }

    async fn insert_if_absent(&self, _token_id: &str, _ttl: Duration) -> AuthResult<bool> {
        Err(AuthError::Blocklist("connection refused".to_string()))
    }

    async fn purge_expired(&self) -> AuthResult<usize> {
        Err(AuthError::Blocklist("connection refused".to_string()))
    }
}

/// Default harness backed by [`FailingBlocklist`]
pub fn harness_with_failing_blocklist() -> Harness {
    let clock = ManualClock::at_unix(0);
    let ring = Arc::new(KeyRing::new(
        KeySet::new(vec![hmac_key("k1")]).expect("distinct key ids"),
    ));
    let authority = TokenAuthority::builder()
        .keys(Arc::clone(&ring))
        .blocklist(Arc::new(FailingBlocklist))
        .clock(Arc::new(clock.clone()))
        .build()
        .expect("valid authority");
    Harness {
        authority,
        clock,
        ring,
    }
}
