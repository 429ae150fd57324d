//! Axum-based HTTP surface for the auth service.
//!
//! Request body size limits, request timeouts, and CORS are handled here by
//! the middleware stack; handlers decode bodies leniently (see
//! [`crate::auth::body`]) and map the service's error taxonomy to status
//! codes while keeping the `{success, message, ...}` body shape.

use crate::auth::body::{self, Body};
use crate::auth::error::AuthError;
use crate::auth::service::{AdminCredentials, AuthService};
use crate::auth::store::UserStore;
use crate::auth::token;
use crate::config::Config;
use anyhow::Result;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::{Map, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Maximum request body size (64KB) — prevents memory exhaustion
pub const MAX_BODY_SIZE: usize = 65_536;
/// Request timeout (30s)
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Shared state for all axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    /// Controls the `Secure` attribute on session cookies.
    pub production: bool,
}

/// Run the HTTP gateway.
pub async fn run_gateway(config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // A store that cannot open is fatal: serving without persistence would
    // accept registrations it cannot keep.
    let store = UserStore::open(&config.database_path)?;
    tracing::info!("User store initialized at {}", config.database_path.display());

    let admin = match (&config.admin_email, &config.admin_password) {
        (Some(email), Some(password)) => Some(AdminCredentials::new(email, password)),
        _ => {
            tracing::warn!("No admin identity configured — admin login will reject all attempts");
            None
        }
    };

    let service = AuthService::new(Arc::new(store), config.jwt_secret.as_bytes(), admin);
    let state = AppState {
        auth: Arc::new(service),
        production: config.production,
    };

    let app = router(state, &config.base_path);
    tracing::info!("Listening on {addr} — auth routes under {}", config.base_path);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the router: auth routes nested under `base_path`, plus `/health`.
fn router(state: AppState, base_path: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    let auth_routes = Router::new()
        .route("/register", post(handle_register))
        .route("/login", post(handle_login))
        .route("/admin/login", post(handle_admin_login))
        .route("/logout", post(handle_logout));

    Router::new()
        .route("/health", get(handle_health))
        .nest(base_path, auth_routes)
        .with_state(state)
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ))
}

// ══════════════════════════════════════════════════════════════════════════════
// AXUM HANDLERS
// ══════════════════════════════════════════════════════════════════════════════

/// GET /health — always public.
async fn handle_health() -> Response {
    json_response(StatusCode::OK, serde_json::json!({ "status": "ok" }))
}

/// POST /register — create an account and start a session.
async fn handle_register(State(state): State<AppState>, bytes: Bytes) -> Response {
    let fields = match normalized_fields(&bytes) {
        Ok(fields) => fields,
        Err(err) => return error_response(&err),
    };

    match state.auth.register(&fields).await {
        Ok(session) => {
            let cookie = token::session_cookie(&session.token, state.production);
            json_with_cookie(
                StatusCode::OK,
                cookie,
                serde_json::json!({
                    "success": true,
                    "message": "user registered successfully",
                    "user": session.user,
                    "token": session.token,
                }),
            )
        }
        Err(err) => error_response(&err),
    }
}

/// POST /login — authenticate and start a session.
async fn handle_login(State(state): State<AppState>, bytes: Bytes) -> Response {
    let fields = match normalized_fields(&bytes) {
        Ok(fields) => fields,
        Err(err) => return error_response(&err),
    };

    match state.auth.login(&fields).await {
        Ok(session) => {
            let cookie = token::session_cookie(&session.token, state.production);
            json_with_cookie(
                StatusCode::OK,
                cookie,
                serde_json::json!({
                    "success": true,
                    "message": "user logged in successfully",
                    "user": session.user,
                    "token": session.token,
                }),
            )
        }
        Err(err) => error_response(&err),
    }
}

/// POST /admin/login — authenticate the config-held admin identity.
async fn handle_admin_login(State(state): State<AppState>, bytes: Bytes) -> Response {
    let fields = match normalized_fields(&bytes) {
        Ok(fields) => fields,
        Err(err) => return error_response(&err),
    };

    match state.auth.admin_login(&fields) {
        Ok(admin_token) => {
            let cookie = token::session_cookie(&admin_token, state.production);
            json_with_cookie(
                StatusCode::OK,
                cookie,
                serde_json::json!({
                    "success": true,
                    "message": "admin logged in successfully",
                    "token": admin_token,
                }),
            )
        }
        Err(err) => error_response(&err),
    }
}

/// POST /logout — clear the session cookie.
///
/// Browsers only delete the cookie when the clearing attributes match the
/// ones used at issuance; [`token::clear_cookie`] mirrors them.
async fn handle_logout(State(state): State<AppState>) -> Response {
    json_with_cookie(
        StatusCode::OK,
        token::clear_cookie(state.production),
        serde_json::json!({
            "success": true,
            "message": "user logged out successfully",
        }),
    )
}

// ══════════════════════════════════════════════════════════════════════════════
// RESPONSE HELPERS
// ══════════════════════════════════════════════════════════════════════════════

/// Decode the raw body. An empty body is fine — validation reports the
/// missing fields — while malformed bytes get their own answer.
fn normalized_fields(bytes: &Bytes) -> Result<Map<String, Value>, AuthError> {
    match body::normalize(bytes) {
        Body::Fields(map) => Ok(map),
        Body::Empty => Ok(Map::new()),
        Body::Malformed => Err(AuthError::MalformedBody),
    }
}

fn json_response(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

fn json_with_cookie(status: StatusCode, cookie: String, body: Value) -> Response {
    (status, [(header::SET_COOKIE, cookie)], Json(body)).into_response()
}

/// Map an operation failure to its status code and client-facing body.
/// Fault sources are logged here and never serialized.
fn error_response(err: &AuthError) -> Response {
    if let AuthError::Fault { context, source } = err {
        tracing::error!("{context}: {source:#}");
    }

    let status = match err {
        AuthError::MissingFields | AuthError::MalformedBody => StatusCode::BAD_REQUEST,
        AuthError::EmailTaken => StatusCode::CONFLICT,
        AuthError::UnknownUser
        | AuthError::InvalidCredentials
        | AuthError::InvalidAdminCredentials => StatusCode::UNAUTHORIZED,
        AuthError::Fault { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };

    json_response(
        status,
        serde_json::json!({ "success": false, "message": err.to_string() }),
    )
}
