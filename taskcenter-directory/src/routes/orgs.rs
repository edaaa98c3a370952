/// Org endpoints
///
/// # Endpoints
///
/// - `POST /v1/orgs` - Create an org owned by the caller
/// - `GET /v1/orgs?ids=a,b` - Look up orgs
/// - `GET /v1/orgs/search?search=ac&limit=10`
/// - `DELETE /v1/orgs/:id` - Delete an org (owners only)
/// - `POST /v1/orgs/:id/name` - Rename an org (owners only)
/// - `GET /v1/orgs/:id/members?offset=&limit=` - List active members
/// - `POST /v1/orgs/:id/members` - Add members
/// - `POST /v1/orgs/:id/members/remove` - Remove members

use crate::{
    app::AppState,
    directory::NewMember,
    error::ApiResult,
    routes::{validate_request, IdsQuery, Page, PageQuery, SearchQuery},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use taskcenter_shared::auth::context::AuthContext;
use taskcenter_shared::models::account::Org;
use taskcenter_shared::models::member::AccountMember;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrgRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,

    #[validate(length(min = 1, message = "Region is required"))]
    pub region: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameOrgRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct AddMembersRequest {
    pub members: Vec<NewMember>,
}

#[derive(Debug, Deserialize)]
pub struct RemoveMembersRequest {
    pub ids: Vec<Uuid>,
}

/// Create an org
///
/// # Response
///
/// `201 Created` with the org record, its shard already assigned.
///
/// # Errors
///
/// - `404 Not Found`: Unknown region
/// - `409 Conflict`: Name already in use
/// - `500 Internal Server Error`: The region failed; the org was not kept
pub async fn create_org(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateOrgRequest>,
) -> ApiResult<(StatusCode, Json<Org>)> {
    validate_request(&req)?;
    let org = state
        .directory
        .create_org(auth.user_id, &req.name, &req.region)
        .await?;
    Ok((StatusCode::CREATED, Json(org)))
}

pub async fn get_orgs(State(state): State<AppState>, Query(query): Query<IdsQuery>) -> ApiResult<Json<Vec<Org>>> {
    let ids = query.parse()?;
    Ok(Json(state.directory.get_orgs(&ids).await?))
}

pub async fn search_orgs(State(state): State<AppState>, Query(query): Query<SearchQuery>) -> ApiResult<Json<Vec<Org>>> {
    Ok(Json(state.directory.search_orgs(&query.search, query.limit).await?))
}

pub async fn delete_org(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(org_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.directory.delete_org(auth.user_id, org_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn rename_org(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(org_id): Path<Uuid>,
    Json(req): Json<RenameOrgRequest>,
) -> ApiResult<StatusCode> {
    state
        .directory
        .rename_org(auth.user_id, org_id, &req.name)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_members(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(org_id): Path<Uuid>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Page<AccountMember>>> {
    let (items, total) = state
        .directory
        .get_org_members(auth.user_id, org_id, page.offset, page.limit)
        .await?;
    Ok(Json(Page { items, total }))
}

pub async fn add_members(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(org_id): Path<Uuid>,
    Json(req): Json<AddMembersRequest>,
) -> ApiResult<StatusCode> {
    state
        .directory
        .add_members(auth.user_id, org_id, &req.members)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Removing the last owner answers `409 Conflict`
pub async fn remove_members(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(org_id): Path<Uuid>,
    Json(req): Json<RemoveMembersRequest>,
) -> ApiResult<StatusCode> {
    state
        .directory
        .remove_members(auth.user_id, org_id, &req.ids)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
