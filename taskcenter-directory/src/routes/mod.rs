/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Registration, activation, login and password reset
/// - `me`: The signed-in user
/// - `users`: Public user lookups
/// - `orgs`: Org lifecycle and membership

pub mod auth;
pub mod health;
pub mod me;
pub mod orgs;
pub mod users;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{ApiError, ApiResult, ValidationErrorDetail};

/// Runs the request's `validator` rules
pub(crate) fn validate_request<T: Validate>(req: &T) -> ApiResult<()> {
    req.validate().map_err(|e| {
        let errors: Vec<ValidationErrorDetail> = e
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| ValidationErrorDetail {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Validation failed".to_string()),
                })
            })
            .collect();
        ApiError::ValidationError(errors)
    })
}

/// `?ids=a,b,c`
#[derive(Debug, Deserialize)]
pub struct IdsQuery {
    #[serde(default)]
    pub ids: String,
}

impl IdsQuery {
    pub fn parse(&self) -> ApiResult<Vec<Uuid>> {
        self.ids
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                Uuid::parse_str(s).map_err(|_| ApiError::BadRequest(format!("Invalid id: {}", s)))
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub search: String,

    #[serde(default)]
    pub limit: u64,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub offset: u64,

    #[serde(default)]
    pub limit: u64,
}

/// A page of results plus the total count
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

/// Response carrying the affected user id
#[derive(Debug, Serialize, Deserialize)]
pub struct UserIdResponse {
    pub user_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_query_parsing() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let query = IdsQuery {
            ids: format!("{a}, {b},"),
        };
        assert_eq!(query.parse().unwrap(), vec![a, b]);

        let empty = IdsQuery { ids: String::new() };
        assert!(empty.parse().unwrap().is_empty());

        let bad = IdsQuery {
            ids: "not-a-uuid".to_string(),
        };
        assert!(bad.parse().is_err());
    }
}
