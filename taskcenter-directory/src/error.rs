/// Error handling for the HTTP surface
///
/// Handlers return `ApiResult<T>`. Directory errors map to a status by their
/// [`ErrorKind`]; internal failures only ever expose their reference.
///
/// # Example
///
/// ```
/// use taskcenter_directory::error::{ApiError, ApiResult};
/// use axum::Json;
/// use serde_json::json;
///
/// async fn handler() -> ApiResult<Json<serde_json::Value>> {
///     Err(ApiError::NotFound("No such org".to_string()))
/// }
/// ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use taskcenter_shared::auth::context::AuthError;
use taskcenter_shared::auth::jwt::JwtError;

use crate::directory::{DirectoryError, ErrorKind};

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated, but not allowed here (also a wrong name or password)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// e.g. a name or email that is already taken
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The request would leave an account without an owner
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Validation failed: {} errors", .0.len())]
    ValidationError(Vec<ValidationErrorDetail>),

    /// Only the log reference leaves the server
    #[error("Internal error")]
    InternalError { reference: Option<String> },

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    pub field: String,
    pub message: String,
}

/// JSON body of every error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable code, see [`ApiError::code`]
    pub error: String,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) | ApiError::InvariantViolation(_) => StatusCode::CONFLICT,
            ApiError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::InvariantViolation(_) => "invariant_violation",
            ApiError::ValidationError(_) => "validation_error",
            ApiError::InternalError { .. } => "internal_error",
            ApiError::ServiceUnavailable(_) => "service_unavailable",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = self.code().to_string();
        let body = match self {
            ApiError::ValidationError(details) => ErrorResponse {
                error,
                message: "Request validation failed".to_string(),
                details: Some(details),
                reference: None,
            },
            ApiError::InternalError { reference } => ErrorResponse {
                error,
                message: "An internal error occurred".to_string(),
                details: None,
                reference,
            },
            ApiError::BadRequest(message)
            | ApiError::Unauthorized(message)
            | ApiError::Forbidden(message)
            | ApiError::NotFound(message)
            | ApiError::Conflict(message)
            | ApiError::InvariantViolation(message)
            | ApiError::ServiceUnavailable(message) => ErrorResponse {
                error,
                message,
                details: None,
                reference: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<DirectoryError> for ApiError {
    fn from(err: DirectoryError) -> Self {
        if let DirectoryError::Validation(v) = &err {
            return ApiError::ValidationError(vec![ValidationErrorDetail {
                field: v.param.clone(),
                message: v.to_string(),
            }]);
        }
        if matches!(err, DirectoryError::RegionGone) {
            return ApiError::ServiceUnavailable(err.to_string());
        }

        let message = err.to_string();
        match err.kind() {
            ErrorKind::Validation => ApiError::BadRequest(message),
            ErrorKind::NotFound => ApiError::NotFound(message),
            ErrorKind::Conflict => ApiError::Conflict(message),
            ErrorKind::Permission => ApiError::Forbidden(message),
            ErrorKind::InvariantViolation => ApiError::InvariantViolation(message),
            ErrorKind::Infrastructure => ApiError::InternalError {
                reference: err.error_ref().map(|r| r.to_string()),
            },
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials => ApiError::Unauthorized("Missing credentials".to_string()),
            AuthError::InvalidFormat(msg) => ApiError::BadRequest(msg),
            AuthError::InvalidToken(msg) => ApiError::Unauthorized(msg),
        }
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::CreateError(msg) => {
                tracing::error!("Token creation failed: {}", msg);
                ApiError::InternalError { reference: None }
            }
            JwtError::Expired => ApiError::Unauthorized("Token expired".to_string()),
            JwtError::InvalidIssuer => ApiError::Unauthorized("Invalid token issuer".to_string()),
            _ => ApiError::Unauthorized(format!("Invalid token: {}", err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::ErrorRef;
    use taskcenter_region::RegionRejection;
    use taskcenter_shared::validation::StringRule;

    fn status_of(err: DirectoryError) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn test_codes_follow_status() {
        let err = ApiError::InvariantViolation("last owner".to_string());
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "invariant_violation");
        assert_eq!(err.to_string(), "Invariant violation: last owner");

        let err = ApiError::InternalError { reference: None };
        assert_eq!(err.to_string(), "Internal error");
    }

    #[test]
    fn test_directory_error_statuses() {
        let rule = StringRule::new("name", 3, 50, &[]).unwrap();
        let invalid = rule.validate("a").unwrap_err();

        assert_eq!(status_of(invalid.into()), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status_of(DirectoryError::NoSuchOrg), StatusCode::NOT_FOUND);
        assert_eq!(status_of(DirectoryError::NameAlreadyInUse), StatusCode::CONFLICT);
        assert_eq!(status_of(DirectoryError::OnlyOwnerMember), StatusCode::CONFLICT);
        assert_eq!(status_of(DirectoryError::InvalidNameOrPwd), StatusCode::FORBIDDEN);
        assert_eq!(
            status_of(DirectoryError::Rejected(RegionRejection::InsufficientPermission)),
            StatusCode::FORBIDDEN
        );
        assert_eq!(status_of(DirectoryError::RegionGone), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            status_of(DirectoryError::Infrastructure(ErrorRef::new())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_internal_error_carries_reference_only() {
        let reference = ErrorRef::new();
        let response = ApiError::from(DirectoryError::CompensationFailed(reference)).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.message, "An internal error occurred");
        assert_eq!(body.reference, Some(reference.to_string()));
    }

    #[test]
    fn test_auth_errors() {
        assert_eq!(
            ApiError::from(AuthError::MissingCredentials).into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(AuthError::InvalidFormat("Expected Bearer token".to_string()))
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
    }
}
