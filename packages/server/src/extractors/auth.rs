use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;
use crate::state::AppState;
use crate::utils::admin_token;

/// Administrator identity extracted from `Authorization: Bearer <token>`.
///
/// Add this as a handler parameter to require a valid admin token. This is
/// the one boundary that rejects with a real 401/403 instead of the
/// HTTP-200 envelope.
pub struct AdminUser;

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::Unauthorized)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AppError::Unauthorized)?;

        let secret = &state.config.admin.token_secret;
        if secret.is_empty() || !admin_token::validate(secret, token) {
            return Err(AppError::Forbidden);
        }

        Ok(AdminUser)
    }
}
