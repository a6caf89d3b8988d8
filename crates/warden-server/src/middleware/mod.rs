//! Bearer-token middleware
//!
//! [`BearerLayer`] enforces the route table in [`crate::routes`]:
//!
//! - `Public` requests pass straight through
//! - `Bearer` requests must carry a token that validates; the
//!   [`VerifiedToken`](warden_auth::VerifiedToken) and the raw
//!   [`BearerToken`] are put into the request extensions
//! - `RefreshableBearer` requests must carry a token, which is passed on
//!   unchecked for the refresh handler to judge
//!
//! Every refusal is the same `401` body.

mod layer;
mod service;

use std::fmt;

use http::{HeaderMap, header};

pub use layer::BearerLayer;
pub use service::BearerService;

/// Raw token taken from the `Authorization` header
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    /// Token text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BearerToken").field(&"[REDACTED]").finish()
    }
}

/// Token from an `Authorization: Bearer <token>` header
///
/// The scheme is matched case-insensitively.
pub fn extract_bearer(headers: &HeaderMap) -> Option<BearerToken> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    Some(BearerToken(token.to_string()))
}
