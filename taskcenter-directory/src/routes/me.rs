/// Endpoints for the signed-in user
///
/// - `GET /v1/me`
/// - `DELETE /v1/me`
/// - `POST /v1/me/name`
/// - `POST /v1/me/email`
/// - `POST /v1/me/resend-email-confirmation`
/// - `POST /v1/me/pwd`
/// - `GET /v1/me/orgs?offset=&limit=`

use crate::{
    app::AppState,
    error::ApiResult,
    routes::{Page, PageQuery},
};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use taskcenter_shared::auth::context::AuthContext;
use taskcenter_shared::models::account::{Org, User};

#[derive(Debug, Deserialize)]
pub struct NameRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct PwdRequest {
    pub old_password: String,
    pub new_password: String,
}

pub async fn get_me(State(state): State<AppState>, Extension(auth): Extension<AuthContext>) -> ApiResult<Json<User>> {
    Ok(Json(state.directory.get_me(auth.user_id).await?))
}

/// Refused with `409 Conflict` while the user is the only owner of an org
pub async fn delete_me(State(state): State<AppState>, Extension(auth): Extension<AuthContext>) -> ApiResult<StatusCode> {
    state.directory.delete_me(auth.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn change_name(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<NameRequest>,
) -> ApiResult<StatusCode> {
    state.directory.change_my_name(auth.user_id, &req.name).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn change_email(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<EmailRequest>,
) -> ApiResult<StatusCode> {
    state.directory.change_my_email(auth.user_id, &req.email).await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn resend_email_confirmation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<StatusCode> {
    state
        .directory
        .resend_my_new_email_confirmation_email(auth.user_id)
        .await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn change_pwd(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<PwdRequest>,
) -> ApiResult<StatusCode> {
    state
        .directory
        .change_my_pwd(auth.user_id, &req.old_password, &req.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn my_orgs(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Page<Org>>> {
    let (items, total) = state
        .directory
        .get_my_orgs(auth.user_id, page.offset, page.limit)
        .await?;
    Ok(Json(Page { items, total }))
}
