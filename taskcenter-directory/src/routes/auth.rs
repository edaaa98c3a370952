/// Public account endpoints
///
/// # Endpoints
///
/// - `POST /v1/auth/register` - Register a new user
/// - `POST /v1/auth/resend-activation` - Resend the activation link
/// - `POST /v1/auth/activate` - Activate with the emailed code
/// - `POST /v1/auth/login` - Login and get tokens
/// - `POST /v1/auth/refresh` - Refresh access token
/// - `POST /v1/auth/confirm-email` - Confirm a pending email change
/// - `POST /v1/auth/reset-pwd` - Send a password reset link
/// - `POST /v1/auth/set-pwd` - Set a new password with the reset code
///
/// Register, resend-activation and reset-pwd answer `202 Accepted` whether or
/// not the email belongs to an account.

use crate::{
    app::AppState,
    error::ApiResult,
    routes::{validate_request, UserIdResponse},
};
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use taskcenter_shared::auth::jwt;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,

    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,

    pub password: String,

    #[validate(length(min = 1, message = "Region is required"))]
    pub region: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct EmailRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ActivateRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,

    #[validate(length(min = 1, message = "Code is required"))]
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub name: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: Uuid,

    /// Access token (24h)
    pub access_token: String,

    /// Refresh token (30d)
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    /// New access token (24h)
    pub access_token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ConfirmEmailRequest {
    #[validate(length(min = 1, message = "Current email is required"))]
    pub current_email: String,

    #[validate(length(min = 1, message = "New email is required"))]
    pub new_email: String,

    #[validate(length(min = 1, message = "Code is required"))]
    pub code: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetPwdRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,

    #[validate(length(min = 1, message = "Code is required"))]
    pub code: String,

    pub new_password: String,
}

pub async fn register(State(state): State<AppState>, Json(req): Json<RegisterRequest>) -> ApiResult<StatusCode> {
    validate_request(&req)?;
    state
        .directory
        .register(&req.name, &req.email, &req.password, &req.region)
        .await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn resend_activation(State(state): State<AppState>, Json(req): Json<EmailRequest>) -> ApiResult<StatusCode> {
    validate_request(&req)?;
    state.directory.resend_activation_email(&req.email).await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn activate(
    State(state): State<AppState>,
    Json(req): Json<ActivateRequest>,
) -> ApiResult<Json<UserIdResponse>> {
    validate_request(&req)?;
    let user_id = state.directory.activate(&req.email, &req.code).await?;
    Ok(Json(UserIdResponse { user_id }))
}

/// Login with name and password
///
/// # Errors
///
/// - `403 Forbidden`: Unknown name, wrong password, or not yet activated
pub async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> ApiResult<Json<LoginResponse>> {
    let user_id = state.directory.authenticate(&req.name, &req.password).await?;
    let tokens = jwt::issue_session(user_id, state.jwt_secret())?;

    tracing::info!(user_id = %user_id, "User logged in");

    Ok(Json(LoginResponse {
        user_id,
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
    }))
}

pub async fn refresh(State(state): State<AppState>, Json(req): Json<RefreshRequest>) -> ApiResult<Json<RefreshResponse>> {
    let access_token = jwt::refresh_access_token(&req.refresh_token, state.jwt_secret())?;
    Ok(Json(RefreshResponse { access_token }))
}

pub async fn confirm_email(
    State(state): State<AppState>,
    Json(req): Json<ConfirmEmailRequest>,
) -> ApiResult<Json<UserIdResponse>> {
    validate_request(&req)?;
    let user_id = state
        .directory
        .confirm_new_email(&req.current_email, &req.new_email, &req.code)
        .await?;
    Ok(Json(UserIdResponse { user_id }))
}

pub async fn reset_pwd(State(state): State<AppState>, Json(req): Json<EmailRequest>) -> ApiResult<StatusCode> {
    validate_request(&req)?;
    state.directory.reset_pwd(&req.email).await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn set_pwd(State(state): State<AppState>, Json(req): Json<SetPwdRequest>) -> ApiResult<Json<UserIdResponse>> {
    validate_request(&req)?;
    let user_id = state
        .directory
        .set_new_pwd_from_pwd_reset(&req.new_password, &req.email, &req.code)
        .await?;
    Ok(Json(UserIdResponse { user_id }))
}
