/// Request authentication context
///
/// The HTTP layer turns an `Authorization: Bearer <token>` header into an
/// `AuthContext` and hands it to handlers through request extensions.

use super::jwt::{validate_access_token, JwtError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Authenticated caller of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    /// The signed-in user, used as `my_id` in directory operations
    pub user_id: Uuid,
}

/// Errors turning a header into an `AuthContext`
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No credentials were supplied
    #[error("Missing credentials")]
    MissingCredentials,

    /// Credentials were not in `Bearer <token>` form
    #[error("{0}")]
    InvalidFormat(String),

    /// The token did not validate
    #[error("{0}")]
    InvalidToken(String),
}

/// Validates an `Authorization` header value and extracts the caller
pub fn authenticate_bearer(header: Option<&str>, secret: &str) -> Result<AuthContext, AuthError> {
    let header = header.ok_or(AuthError::MissingCredentials)?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))?;

    let claims = validate_access_token(token, secret).map_err(|e| match e {
        JwtError::Expired => AuthError::InvalidToken("Token expired".to_string()),
        JwtError::InvalidIssuer => AuthError::InvalidToken("Invalid issuer".to_string()),
        other => AuthError::InvalidToken(format!("Invalid token: {}", other)),
    })?;

    Ok(AuthContext {
        user_id: claims.sub,
    })
}
