/// HTTP surface tests
///
/// Drive the full router (auth layer, error mapping, security headers)
/// against the in-memory directory.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use common::{email_for, TestContext, PWD};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn send(ctx: &TestContext, request: Request<Body>) -> Response {
    ctx.app().oneshot(request).await.unwrap()
}

fn post_json(uri: &str, auth: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(auth) = auth {
        builder = builder.header("authorization", auth);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(auth) = auth {
        builder = builder.header("authorization", auth);
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_json(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health_and_regions() {
    let ctx = TestContext::new();

    let response = send(&ctx, get("/health", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "not_configured");

    let response = send(&ctx, get("/v1/regions", None)).await;
    assert_eq!(body_json(response).await, json!(["eu", "us"]));
}

#[tokio::test]
async fn test_register_activate_login_flow() {
    let ctx = TestContext::new();
    let email = email_for("ali");

    let response = send(
        &ctx,
        post_json(
            "/v1/auth/register",
            None,
            json!({ "name": "ali", "email": email, "password": PWD, "region": "us" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let response = send(
        &ctx,
        post_json("/v1/auth/login", None, json!({ "name": "ali", "password": PWD })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let code = ctx.mailer.last_activation_code(&email).unwrap();
    let response = send(
        &ctx,
        post_json("/v1/auth/activate", None, json!({ "email": email, "code": code })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let user_id = body_json(response).await["user_id"].clone();

    let response = send(
        &ctx,
        post_json("/v1/auth/login", None, json!({ "name": "ali", "password": PWD })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let tokens = body_json(response).await;
    assert_eq!(tokens["user_id"], user_id);
    let access = format!("Bearer {}", tokens["access_token"].as_str().unwrap());

    let response = send(&ctx, get("/v1/me", Some(&access))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let me = body_json(response).await;
    assert_eq!(me["name"], "ali");
    assert_eq!(me["email"], email);

    let response = send(
        &ctx,
        post_json(
            "/v1/auth/refresh",
            None,
            json!({ "refresh_token": tokens["refresh_token"] }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_protected_routes_need_a_token() {
    let ctx = TestContext::new();

    let response = send(&ctx, get("/v1/me", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "unauthorized");

    let response = send(&ctx, get("/v1/me", Some("Token abc"))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(&ctx, get("/v1/orgs/search?search=acme", Some("Bearer not-a-jwt"))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_validation_errors_carry_details() {
    let ctx = TestContext::new();

    let response = send(
        &ctx,
        post_json(
            "/v1/auth/register",
            None,
            json!({ "name": "al", "email": "al@example.com", "password": PWD, "region": "us" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["details"][0]["field"], "name");

    let response = send(
        &ctx,
        post_json(
            "/v1/auth/register",
            None,
            json!({ "name": "", "email": "al@example.com", "password": PWD, "region": "us" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_org_lifecycle_over_http() {
    let ctx = TestContext::new();
    let ali = ctx.active_user("ali").await;
    let bob = ctx.active_user("bob").await;
    let ali_auth = ctx.auth_header(ali);
    let bob_auth = ctx.auth_header(bob);

    let response = send(
        &ctx,
        post_json("/v1/orgs", Some(&ali_auth), json!({ "name": "acme", "region": "us" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let org = body_json(response).await;
    let org_id = org["id"].as_str().unwrap().to_string();
    assert_ne!(org["shard"], -1);

    let response = send(
        &ctx,
        post_json("/v1/orgs", Some(&bob_auth), json!({ "name": "ACME", "region": "us" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = send(
        &ctx,
        post_json(
            &format!("/v1/orgs/{org_id}/members"),
            Some(&ali_auth),
            json!({ "members": [{ "id": bob, "role": "admin" }] }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(&ctx, get(&format!("/v1/orgs/{org_id}/members"), Some(&bob_auth))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["total"], 2);

    // Last owner
    let response = send(
        &ctx,
        post_json(
            &format!("/v1/orgs/{org_id}/members/remove"),
            Some(&ali_auth),
            json!({ "ids": [ali] }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["error"], "invariant_violation");

    let response = send(&ctx, get("/v1/me/orgs", Some(&bob_auth))).await;
    let page = body_json(response).await;
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["name"], "acme");

    let response = send(
        &ctx,
        Request::builder()
            .method("DELETE")
            .uri(format!("/v1/orgs/{org_id}"))
            .header("authorization", &bob_auth)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(
        &ctx,
        Request::builder()
            .method("DELETE")
            .uri(format!("/v1/orgs/{org_id}"))
            .header("authorization", &ali_auth)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(&ctx, get(&format!("/v1/orgs?ids={org_id}"), Some(&ali_auth))).await;
    assert_eq!(body_json(response).await, json!([]));
}

#[tokio::test]
async fn test_delete_me_blocked_for_only_owner() {
    let ctx = TestContext::new();
    let ali = ctx.active_user("ali").await;
    let auth = ctx.auth_header(ali);
    ctx.directory.create_org(ali, "acme", "eu").await.unwrap();

    let request = Request::builder()
        .method("DELETE")
        .uri("/v1/me")
        .header("authorization", &auth)
        .body(Body::empty())
        .unwrap();
    let response = send(&ctx, request).await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_user_lookups_hide_email() {
    let ctx = TestContext::new();
    let ali = ctx.active_user("ali").await;
    let auth = ctx.auth_header(ali);

    let response = send(&ctx, get(&format!("/v1/users?ids={ali}"), Some(&auth))).await;
    let users = body_json(response).await;
    assert_eq!(users[0]["name"], "ali");
    assert!(users[0].get("email").is_none());

    let response = send(&ctx, get("/v1/users?ids=nope", Some(&auth))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(&ctx, get("/v1/users/search?search=ali&limit=5", Some(&auth))).await;
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 1);
}
