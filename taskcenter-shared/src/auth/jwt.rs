/// Session tokens for signed-in users
///
/// `Authenticate` only proves a name/password pair; the HTTP layer then hands
/// out an HS256 access token (24h) and refresh token (30d) whose subject is
/// the user id. The `typ` claim keeps the two from being interchangeable.
///
/// ```
/// use taskcenter_shared::auth::jwt::{issue_session, validate_access_token};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let secret = "a-secret-key-that-is-at-least-32-bytes";
/// let me = Uuid::new_v4();
///
/// let session = issue_session(me, secret)?;
/// assert_eq!(validate_access_token(&session.access_token, secret)?.sub, me);
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const ISSUER: &str = "taskcenter";

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to create token: {0}")]
    CreateError(String),

    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    #[error("Token has expired")]
    Expired,

    #[error("Invalid issuer")]
    InvalidIssuer,

    /// A refresh token where an access token belongs, or vice versa
    #[error("Expected {expected} token")]
    WrongType { expected: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn lifetime(self) -> Duration {
        match self {
            TokenType::Access => Duration::hours(24),
            TokenType::Refresh => Duration::days(30),
        }
    }

    fn name(self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: Uuid,
    pub iss: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub typ: TokenType,
}

impl Claims {
    /// Claims valid from now for `ttl`
    pub fn issue(user_id: Uuid, typ: TokenType, ttl: Duration) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: user_id,
            iss: ISSUER.to_string(),
            iat: now,
            nbf: now,
            exp: now + ttl.num_seconds(),
            typ,
        }
    }

    pub fn sign(&self, secret: &str) -> Result<String, JwtError> {
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(|e| JwtError::CreateError(e.to_string()))
    }

    /// Checks signature, issuer, `nbf` and `exp`, then the token type
    pub fn verify(token: &str, secret: &str, expected: TokenType) -> Result<Self, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        validation.validate_nbf = true;

        let claims = jsonwebtoken::decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            JwtErrorKind::ExpiredSignature => JwtError::Expired,
            JwtErrorKind::InvalidIssuer => JwtError::InvalidIssuer,
            _ => JwtError::ValidationError(e.to_string()),
        })?
        .claims;

        if claims.typ != expected {
            return Err(JwtError::WrongType {
                expected: expected.name(),
            });
        }
        Ok(claims)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

fn sign_new(user_id: Uuid, typ: TokenType, secret: &str) -> Result<String, JwtError> {
    Claims::issue(user_id, typ, typ.lifetime()).sign(secret)
}

pub fn issue_session(user_id: Uuid, secret: &str) -> Result<SessionTokens, JwtError> {
    Ok(SessionTokens {
        access_token: sign_new(user_id, TokenType::Access, secret)?,
        refresh_token: sign_new(user_id, TokenType::Refresh, secret)?,
    })
}

pub fn validate_access_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    Claims::verify(token, secret, TokenType::Access)
}

pub fn validate_refresh_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    Claims::verify(token, secret, TokenType::Refresh)
}

/// New access token for the subject of a valid refresh token
pub fn refresh_access_token(refresh_token: &str, secret: &str) -> Result<String, JwtError> {
    let claims = validate_refresh_token(refresh_token, secret)?;
    sign_new(claims.sub, TokenType::Access, secret)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    #[test]
    fn test_session_round_trip() {
        let me = Uuid::new_v4();
        let session = issue_session(me, SECRET).unwrap();

        let claims = validate_access_token(&session.access_token, SECRET).unwrap();
        assert_eq!(claims.sub, me);
        assert_eq!(claims.iss, "taskcenter");
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
    }

    #[test]
    fn test_other_secret_is_rejected() {
        let session = issue_session(Uuid::new_v4(), SECRET).unwrap();
        let result = validate_access_token(&session.access_token, "another-secret-key-also-32-bytes-long");
        assert!(matches!(result, Err(JwtError::ValidationError(_))));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let token = Claims::issue(Uuid::new_v4(), TokenType::Access, Duration::seconds(-120))
            .sign(SECRET)
            .unwrap();

        assert!(matches!(validate_access_token(&token, SECRET), Err(JwtError::Expired)));
    }

    #[test]
    fn test_token_types_do_not_mix() {
        let session = issue_session(Uuid::new_v4(), SECRET).unwrap();

        assert!(matches!(
            validate_access_token(&session.refresh_token, SECRET),
            Err(JwtError::WrongType { expected: "access" })
        ));
        assert!(matches!(
            validate_refresh_token(&session.access_token, SECRET),
            Err(JwtError::WrongType { expected: "refresh" })
        ));
    }

    #[test]
    fn test_refresh_issues_access_for_same_user() {
        let me = Uuid::new_v4();
        let session = issue_session(me, SECRET).unwrap();

        let access = refresh_access_token(&session.refresh_token, SECRET).unwrap();
        assert_eq!(validate_access_token(&access, SECRET).unwrap().sub, me);
    }
}
