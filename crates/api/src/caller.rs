//! Caller identity extraction.
//!
//! Authentication happens upstream; the gateway forwards the authenticated
//! user in the `x-user-id` header.

use std::str::FromStr;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::UserId;

use crate::error::ApiError;

/// Header carrying the authenticated user's id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated user making the request.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub UserId);

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized(format!("Missing {USER_ID_HEADER} header")))?;
        let value = value
            .to_str()
            .map_err(|_| ApiError::Unauthorized(format!("Invalid {USER_ID_HEADER} header")))?;
        let user_id = UserId::from_str(value.trim())
            .map_err(|e| ApiError::Unauthorized(format!("Invalid {USER_ID_HEADER} header: {e}")))?;
        Ok(Caller(user_id))
    }
}
