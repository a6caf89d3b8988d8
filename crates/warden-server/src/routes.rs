//! Route table and access policy
//!
//! The bearer layer looks every request up here before any handler runs.
//! A route missing from [`ROUTE_POLICIES`] requires a valid token.

use http::Method;
use warden_auth::{Access, Operation};

/// `POST` credentials for a token
pub const LOGIN: &str = "/api/auth/login";
/// `POST` a new account
pub const REGISTER: &str = "/api/auth/register";
/// `POST` to revoke the presented token
pub const LOGOUT: &str = "/api/auth/logout";
/// `POST` to exchange the presented token
pub const REFRESH: &str = "/api/auth/refresh";
/// `GET` the caller's profile
pub const ME: &str = "/api/auth/me";
/// `GET` liveness probe
pub const HEALTH: &str = "/health";

/// One row of the access table
#[derive(Debug, Clone)]
pub struct RoutePolicy {
    /// HTTP method
    pub method: Method,
    /// Exact path
    pub path: &'static str,
    /// What the caller must present
    pub access: Access,
    /// Label used in logs and audit records
    pub label: &'static str,
}

impl RoutePolicy {
    const fn new(method: Method, path: &'static str, access: Access, label: &'static str) -> Self {
        Self {
            method,
            path,
            access,
            label,
        }
    }

    const fn operation(path: &'static str, operation: Operation) -> Self {
        Self::new(Method::POST, path, operation.access(), operation.as_str())
    }
}

/// Static access policy, consulted per request
pub static ROUTE_POLICIES: [RoutePolicy; 6] = [
    RoutePolicy::operation(LOGIN, Operation::Login),
    RoutePolicy::operation(REGISTER, Operation::Register),
    RoutePolicy::operation(LOGOUT, Operation::Logout),
    RoutePolicy::operation(REFRESH, Operation::Refresh),
    RoutePolicy::new(Method::GET, ME, Access::Bearer, "me"),
    RoutePolicy::new(Method::GET, HEALTH, Access::Public, "health"),
];

/// Label for requests that match no row
pub const UNLISTED: &str = "unlisted";

/// Access required for `method` on `path`, with its label
pub fn policy_for(method: &Method, path: &str) -> (Access, &'static str) {
    ROUTE_POLICIES
        .iter()
        .find(|p| p.path == path && p.method == *method)
        .map(|p| (p.access, p.label))
        .unwrap_or((Access::Bearer, UNLISTED))
}
