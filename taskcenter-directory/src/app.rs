/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use taskcenter_directory::app::{build_router, AppState};
/// use taskcenter_directory::config::Config;
/// use taskcenter_directory::directory::AccountDirectoryApi;
///
/// # async fn example(directory: AccountDirectoryApi) -> anyhow::Result<()> {
/// let config = Config::load()?;
/// let state = AppState::new(Arc::new(directory), config, None);
/// let app = build_router(state);
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, directory::AccountDirectoryApi, error::ApiError};
use axum::{
    extract::{Request, State},
    http::{header, HeaderName, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use taskcenter_shared::auth::context::authenticate_bearer;
use tower_http::{
    cors::CorsLayer,
    set_header::SetResponseHeaderLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<AccountDirectoryApi>,

    pub config: Arc<Config>,

    /// Directory database, when running on the postgres backend
    pub db: Option<PgPool>,
}

impl AppState {
    pub fn new(directory: Arc<AccountDirectoryApi>, config: Config, db: Option<PgPool>) -> Self {
        Self {
            directory,
            config: Arc::new(config),
            db,
        }
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// ```text
/// /
/// ├── /health
/// └── /v1/
///     ├── GET /regions
///     ├── /auth/               (public)
///     ├── /me/                 (JWT)
///     ├── /users/              (JWT)
///     └── /orgs/               (JWT)
/// ```
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/resend-activation", post(routes::auth::resend_activation))
        .route("/activate", post(routes::auth::activate))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh))
        .route("/confirm-email", post(routes::auth::confirm_email))
        .route("/reset-pwd", post(routes::auth::reset_pwd))
        .route("/set-pwd", post(routes::auth::set_pwd));

    let me_routes = Router::new()
        .route("/", get(routes::me::get_me).delete(routes::me::delete_me))
        .route("/name", post(routes::me::change_name))
        .route("/email", post(routes::me::change_email))
        .route("/resend-email-confirmation", post(routes::me::resend_email_confirmation))
        .route("/pwd", post(routes::me::change_pwd))
        .route("/orgs", get(routes::me::my_orgs))
        .layer(axum::middleware::from_fn_with_state(state.clone(), jwt_auth_layer));

    let user_routes = Router::new()
        .route("/", get(routes::users::get_users))
        .route("/search", get(routes::users::search_users))
        .layer(axum::middleware::from_fn_with_state(state.clone(), jwt_auth_layer));

    let org_routes = Router::new()
        .route("/", post(routes::orgs::create_org).get(routes::orgs::get_orgs))
        .route("/search", get(routes::orgs::search_orgs))
        .route("/:id", axum::routing::delete(routes::orgs::delete_org))
        .route("/:id/name", post(routes::orgs::rename_org))
        .route(
            "/:id/members",
            get(routes::orgs::get_members).post(routes::orgs::add_members),
        )
        .route("/:id/members/remove", post(routes::orgs::remove_members))
        .layer(axum::middleware::from_fn_with_state(state.clone(), jwt_auth_layer));

    let v1_routes = Router::new()
        .route("/regions", get(routes::health::list_regions))
        .nest("/auth", auth_routes)
        .nest("/me", me_routes)
        .nest("/users", user_routes)
        .nest("/orgs", org_routes);

    let cors = if state.config.api.cors_origins.contains(&"*".to_string()) {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    let production = state.config.api.production;

    let router = Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(security_header("x-content-type-options", "nosniff"))
        .layer(security_header("x-frame-options", "DENY"))
        .layer(security_header("referrer-policy", "strict-origin-when-cross-origin"))
        .layer(security_header("content-security-policy", "default-src 'none'; frame-ancestors 'none'"));

    // HSTS only makes sense behind HTTPS
    let router = if production {
        router.layer(security_header(
            "strict-transport-security",
            "max-age=31536000; includeSubDomains",
        ))
    } else {
        router
    };

    router.with_state(state)
}

fn security_header(name: &'static str, value: &'static str) -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(HeaderName::from_static(name), HeaderValue::from_static(value))
}

/// JWT authentication middleware layer
///
/// Validates the `Authorization: Bearer` access token and injects an
/// `AuthContext` into request extensions.
async fn jwt_auth_layer(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response, ApiError> {
    let header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let auth_context = authenticate_bearer(header, state.jwt_secret())?;
    req.extensions_mut().insert(auth_context);

    Ok(next.run(req).await)
}
