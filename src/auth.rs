//! Boundary with the authentication collaborator.
//!
//! Upstream middleware authenticates the caller and forwards the user id in
//! the `x-user-id` header; the core treats it as an opaque UUID.

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::errors::ServiceError;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Authenticated caller of the current request.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                ServiceError::Unauthenticated("missing authenticated user id".to_string())
            })?;

        let user_id = Uuid::parse_str(raw).map_err(|_| {
            ServiceError::Unauthenticated("malformed authenticated user id".to_string())
        })?;

        Ok(AuthUser(user_id))
    }
}
