//! Request authentication
//!
//! [`RequestContext`] resolves the `Authorization` header into the calling
//! user. A request without the header is anonymous; a header that is present
//! but cannot be resolved to an active user is rejected outright.

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use tracing::{debug, error};

use crate::error::ApiError;
use crate::models::User;
use crate::policy::{self, Action};
use crate::state::AppState;

/// The caller of the current request
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub user: Option<User>,
}

impl RequestContext {
    /// Check the caller against the resource access policy
    pub fn authorize(&self, action: Action) -> Result<&Self, ApiError> {
        policy::authorize(self.user.as_ref(), action)?;
        Ok(self)
    }

    /// The authenticated user, or 401 for anonymous callers
    pub fn require_user(&self) -> Result<&User, ApiError> {
        self.user.as_ref().ok_or(ApiError::Unauthorized)
    }
}

/// Pull the token out of `Bearer <token>` or `Token <token>`
fn extract_token(value: &str) -> Option<&str> {
    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("Token "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for RequestContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(auth_header) = parts.headers.get(header::AUTHORIZATION) else {
            return Ok(Self::default());
        };

        let token = auth_header
            .to_str()
            .ok()
            .and_then(extract_token)
            .ok_or(ApiError::Unauthorized)?;

        let claims = state.jwt.validate(token).map_err(|e| {
            debug!("Failed to validate token: {}", e);
            ApiError::Unauthorized
        })?;

        let user = state
            .store
            .find_user_by_id(claims.sub)
            .await
            .map_err(|e| {
                error!("Failed to load token user: {}", e);
                ApiError::InternalServerError
            })?
            .filter(|user| user.is_active)
            .ok_or(ApiError::Unauthorized)?;

        Ok(Self { user: Some(user) })
    }
}
