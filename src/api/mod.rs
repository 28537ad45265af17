//! HTTP surface.
//!
//! Axum router over shared `Arc` state. User endpoints read the
//! identity cookies issued by the auth layer in front of this service
//! (presence-checked only); admin and settlement endpoints are gated by
//! the shared admin secret passed as a query parameter or body field.

pub mod admin;
pub mod bets;
pub mod stats;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::{error, info};

use crate::data::FixtureSource;
use crate::llm::{BetVerifier, TipsDrafter};
use crate::notify::Notifier;
use crate::settlement::bankroll::{KellyConfig, Ledger};
use crate::settlement::reconciler::Reconciler;
use crate::store::{KvStore, StoreError};
use crate::types::Bet;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

pub struct ServiceState {
    pub store: Arc<dyn KvStore>,
    pub fixtures: Arc<dyn FixtureSource>,
    pub verifier: Arc<dyn BetVerifier>,
    pub drafter: Arc<dyn TipsDrafter>,
    pub notifier: Arc<dyn Notifier>,
    pub ledger: Ledger,
    pub kelly: KellyConfig,
    pub staking: crate::config::StakingConfig,
    pub admin_secret: SecretString,
}

pub type AppState = Arc<ServiceState>;

impl ServiceState {
    /// Settlement reconciler over this state's collaborators.
    pub fn reconciler(&self) -> Reconciler {
        Reconciler::new(
            self.store.clone(),
            self.fixtures.clone(),
            self.verifier.clone(),
            self.notifier.clone(),
            self.ledger.clone(),
        )
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Request-level errors mapped onto HTTP statuses with a JSON error
/// envelope.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid secret")]
    Forbidden,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Internal(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(e) => {
                error!(error = %format!("{e:#}"), "Request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = self.to_string();
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

// ---------------------------------------------------------------------------
// Auth helpers
// ---------------------------------------------------------------------------

/// Extract a cookie value from the request headers.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

/// Identify the calling user from the session cookies. The cookies are
/// issued and validated upstream; here their presence is the contract.
pub fn session_user(headers: &HeaderMap) -> Result<String, ApiError> {
    let session = cookie_value(headers, "session");
    let email = cookie_value(headers, "user_email");
    match (session, email) {
        (Some(session), Some(email)) if !session.is_empty() && !email.is_empty() => Ok(email),
        _ => Err(ApiError::Unauthorized),
    }
}

/// Gate an admin endpoint on the shared secret.
pub fn require_admin(state: &ServiceState, provided: Option<&str>) -> Result<(), ApiError> {
    match provided {
        Some(key) if key == state.admin_secret.expose_secret().as_str() => Ok(()),
        _ => Err(ApiError::Unauthorized),
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = tower_http::cors::CorsLayer::new()
        .allow_origin("*".parse::<HeaderValue>().unwrap())
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route(
            "/api/bets",
            get(bets::list_bets)
                .post(bets::place_bet)
                .patch(bets::update_bet)
                .delete(bets::delete_bet),
        )
        .route("/api/stake/suggest", get(bets::suggest_stake))
        .route("/api/stats", get(stats::get_record).post(stats::update_record))
        .route("/api/stats/bankroll", get(stats::bankroll_history))
        .route("/api/admin/draft", get(admin::get_draft))
        .route("/api/admin/draft/generate", post(admin::generate_draft))
        .route("/api/admin/publish", post(admin::publish_draft))
        .route("/api/cron/check-results", get(admin::check_results))
        .route("/health", get(health))
        .layer(cors)
        .with_state(state)
}

/// Serve the API until shutdown is requested.
pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;

    info!(port, "API listening on http://localhost:{port}");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received.");
        })
        .await
        .context("Server error")?;

    Ok(())
}

/// GET /health
async fn health() -> StatusCode {
    StatusCode::OK
}

/// Fetch a user's bet list, tolerating an absent key.
pub(crate) async fn load_user_bets(state: &ServiceState, email: &str) -> Result<Vec<Bet>> {
    Ok(crate::store::get_json(state.store.as_ref(), &crate::store::keys::user_bets(email))
        .await?
        .unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
