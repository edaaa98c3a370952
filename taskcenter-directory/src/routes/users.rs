/// Public user lookups
///
/// - `GET /v1/users?ids=a,b`
/// - `GET /v1/users/search?search=al&limit=10`
///
/// Only the account view is returned, never an email address.

use crate::{
    app::AppState,
    error::ApiResult,
    routes::{IdsQuery, SearchQuery},
};
use axum::{
    extract::{Query, State},
    Json,
};
use taskcenter_shared::models::account::Account;

pub async fn get_users(State(state): State<AppState>, Query(query): Query<IdsQuery>) -> ApiResult<Json<Vec<Account>>> {
    let ids = query.parse()?;
    Ok(Json(state.directory.get_users(&ids).await?))
}

pub async fn search_users(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<Account>>> {
    Ok(Json(state.directory.search_users(&query.search, query.limit).await?))
}
