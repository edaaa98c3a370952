/// Health check endpoint
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "database": "connected",
///   "schema_version": 20260301000002,
///   "regions": ["eu", "us"]
/// }
/// ```
///
/// `database` is `"not_configured"` when running on the memory backend.

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use taskcenter_shared::db::{migrations::schema_version, pool::health_check as db_health_check};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Application version
    pub version: String,

    /// Database status
    pub database: String,

    /// Applied migration version of the directory database
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<i64>,

    /// Configured regions
    pub regions: Vec<String>,
}

pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let (database_status, version) = match &state.db {
        Some(pool) => match db_health_check(pool).await {
            Ok(()) => ("connected", schema_version(pool).await.ok().flatten()),
            Err(_) => ("disconnected", None),
        },
        None => ("not_configured", None),
    };

    Ok(Json(HealthResponse {
        status: if database_status == "disconnected" {
            "degraded".to_string()
        } else {
            "healthy".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: database_status.to_string(),
        schema_version: version,
        regions: state.directory.get_regions(),
    }))
}

/// `GET /v1/regions`
pub async fn list_regions(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.directory.get_regions())
}
