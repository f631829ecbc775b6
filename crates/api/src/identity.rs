//! Caller extraction from forwarded gateway headers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::{ForwardedIdentity, UserContext};

use crate::error::ApiError;

/// The authenticated caller, extracted from the forwarded identity headers.
///
/// Rejects the request with 401 when the gateway marker is missing or the
/// user ID cannot be decoded. The raw header set is kept so handlers can
/// forward it on outgoing service calls.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user: UserContext,
    pub identity: ForwardedIdentity,
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let headers = parts.headers.clone();
        let identity = ForwardedIdentity::capture(|name| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(String::from)
        });

        let user = UserContext::from_identity(&identity).ok_or(ApiError::Unauthorized)?;
        Ok(Caller { user, identity })
    }
}

/// A caller that must be an admin. Rejects with 403 otherwise.
#[derive(Debug, Clone)]
pub struct AdminCaller(pub Caller);

impl<S> FromRequestParts<S> for AdminCaller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let caller = Caller::from_request_parts(parts, state).await?;
        if !caller.user.is_admin {
            return Err(ApiError::Forbidden);
        }
        Ok(AdminCaller(caller))
    }
}
