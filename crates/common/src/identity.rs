//! Caller identity propagated between services.
//!
//! The API gateway authenticates the caller once and forwards the result as
//! a fixed set of headers. Downstream services trust those headers only when
//! the request carries the gateway marker header; they must never accept
//! them directly from an external client.

use serde::{Deserialize, Serialize};

use crate::types::UserId;

/// Marker header set by the API gateway on every forwarded request.
pub const GATEWAY_HEADER: &str = "X-Forwarded-From-Gateway";

/// The full header set forwarded verbatim on every inter-service call.
///
/// This list is a hard contract shared with the gateway and every service;
/// renaming any entry breaks cross-service authentication.
pub const IDENTITY_HEADERS: [&str; 9] = [
    GATEWAY_HEADER,
    "X-User-ID",
    "X-User-Email",
    "X-User-Nome",
    "X-User-Is-Admin",
    "X-User-Is-Staff",
    "X-User-CPF",
    "X-User-Role",
    "Authorization",
];

/// Verbatim copy of the inbound identity headers, carried along so outgoing
/// service calls can forward them unchanged.
#[derive(Debug, Clone, Default)]
pub struct ForwardedIdentity {
    headers: Vec<(String, String)>,
}

impl ForwardedIdentity {
    /// Captures the identity headers from an inbound request.
    ///
    /// `lookup` returns the value of a named header, if present. Only the
    /// headers in [`IDENTITY_HEADERS`] are captured.
    pub fn capture<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let headers = IDENTITY_HEADERS
            .iter()
            .filter_map(|name| lookup(name).map(|value| (name.to_string(), value)))
            .collect();
        Self { headers }
    }

    /// Builds an identity from explicit header pairs. Intended for tests
    /// and service-internal calls.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        Self { headers: pairs }
    }

    /// Iterates over the captured header pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the value of a captured header.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns true if the request came through the gateway.
    pub fn from_gateway(&self) -> bool {
        self.get(GATEWAY_HEADER).is_some()
    }
}

/// The authenticated caller, decoded from the forwarded header set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
    pub is_staff: bool,
    pub cpf: String,
    pub role: String,
}

impl UserContext {
    /// Decodes the caller from a [`ForwardedIdentity`].
    ///
    /// Returns `None` when the gateway marker is missing or the user ID is
    /// absent/malformed; such requests must be rejected as unauthenticated.
    pub fn from_identity(identity: &ForwardedIdentity) -> Option<Self> {
        if !identity.from_gateway() {
            return None;
        }

        let id: i64 = identity.get("X-User-ID")?.parse().ok()?;

        Some(Self {
            id: UserId::new(id),
            name: identity.get("X-User-Nome").unwrap_or_default().to_string(),
            email: identity.get("X-User-Email").unwrap_or_default().to_string(),
            is_admin: flag(identity.get("X-User-Is-Admin")),
            is_staff: flag(identity.get("X-User-Is-Staff")),
            cpf: identity.get("X-User-CPF").unwrap_or_default().to_string(),
            role: identity.get("X-User-Role").unwrap_or_default().to_string(),
        })
    }

    /// Returns true if the caller may act on a resource owned by `owner`.
    pub fn can_access(&self, owner: UserId) -> bool {
        self.is_admin || self.id == owner
    }
}

fn flag(value: Option<&str>) -> bool {
    matches!(value, Some(v) if v.eq_ignore_ascii_case("true") || v == "1")
}
