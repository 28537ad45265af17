//! Admin and settlement endpoints.
//!
//! The draft lifecycle: `generate` fetches real fixtures and asks the
//! drafter for a tips sheet, the administrator reviews it via `draft`,
//! and `publish` activates every pick as a pending marker for the
//! settlement pass. `check-results` is the settlement trigger called by
//! the external periodic invoker.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{require_admin, ApiError, AppState};
use crate::store::{get_json, keys, set_json, KvStore};
use crate::types::DailyTips;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AdminQuery {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DraftResponse {
    pub success: bool,
    pub draft: DailyTips,
}

#[derive(Debug, Serialize)]
pub struct GetDraftResponse {
    pub draft: Option<DailyTips>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    #[serde(default)]
    pub secret: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PublishResponse {
    pub success: bool,
    pub activated: usize,
}

#[derive(Debug, Serialize)]
pub struct CheckResultsResponse {
    pub success: bool,
    pub log: Vec<String>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/admin/draft/generate
pub async fn generate_draft(
    State(state): State<AppState>,
    Query(query): Query<AdminQuery>,
) -> Result<Json<DraftResponse>, ApiError> {
    require_admin(&state, query.key.as_deref())?;

    let date = match &query.date {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| ApiError::BadRequest(format!("Invalid date: {raw}")))?,
        None => Utc::now().date_naive(),
    };
    let day_one = date.format("%Y-%m-%d").to_string();
    let day_two = (date + Duration::days(1)).format("%Y-%m-%d").to_string();

    // Tips cover today's slate plus tomorrow's early kickoffs.
    let (mut fixtures, next_day) = futures::future::try_join(
        state.fixtures.fixtures_by_date(&day_one),
        state.fixtures.fixtures_by_date(&day_two),
    )
    .await?;
    fixtures.extend(next_day);

    let draft = state.drafter.draft_tips(&day_one, &fixtures).await?;
    set_json(state.store.as_ref(), keys::DAILY_DRAFT, &draft).await?;

    info!(
        date = %day_one,
        fixtures = fixtures.len(),
        picks = draft.all_picks().len(),
        "Daily draft generated"
    );

    Ok(Json(DraftResponse { success: true, draft }))
}

/// GET /api/admin/draft
pub async fn get_draft(
    State(state): State<AppState>,
    Query(query): Query<AdminQuery>,
) -> Result<Json<GetDraftResponse>, ApiError> {
    require_admin(&state, query.key.as_deref())?;

    let draft: Option<DailyTips> = get_json(state.store.as_ref(), keys::DAILY_DRAFT).await?;
    let message = draft.is_none().then(|| "No draft pending.".to_string());

    Ok(Json(GetDraftResponse { draft, message }))
}

/// POST /api/admin/publish
pub async fn publish_draft(
    State(state): State<AppState>,
    Json(req): Json<PublishRequest>,
) -> Result<Json<PublishResponse>, ApiError> {
    use secrecy::ExposeSecret;
    if req.secret.as_deref() != Some(state.admin_secret.expose_secret().as_str()) {
        return Err(ApiError::Forbidden);
    }

    let Some(draft) = get_json::<DailyTips>(state.store.as_ref(), keys::DAILY_DRAFT).await? else {
        return Err(ApiError::BadRequest("No draft to publish".to_string()));
    };

    // Activating a pick queues it for settlement; message delivery to
    // the channel is the publisher collaborator's job.
    let picks = draft.all_picks();
    for pick in &picks {
        set_json(
            state.store.as_ref(),
            &keys::pending_pick(pick.fixture_id),
            pick,
        )
        .await?;
    }
    let activated = picks.len();

    state.store.del(keys::DAILY_DRAFT).await?;
    state.store.incr(keys::STATS_TOTAL).await?;

    info!(activated, "Daily draft published");

    Ok(Json(PublishResponse { success: true, activated }))
}

/// GET /api/cron/check-results
pub async fn check_results(
    State(state): State<AppState>,
    Query(query): Query<AdminQuery>,
) -> Result<Json<CheckResultsResponse>, ApiError> {
    require_admin(&state, query.key.as_deref())?;

    let report = state.reconciler().run().await?;

    Ok(Json(CheckResultsResponse { success: true, log: report.log }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::{test_state, test_state_with};
    use crate::api::build_router;
    use crate::data::MockFixtureSource;
    use crate::llm::{MockBetVerifier, MockTipsDrafter};
    use crate::types::{Pick, Staking, StakingLabel};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use rust_decimal_macros::dec;
    use tower::ServiceExt;

    fn sample_pick(fixture_id: u64) -> Pick {
        Pick {
            fixture_id,
            teams: "Arsenal vs Chelsea".into(),
            league: "Premier League".into(),
            market: "Over 2.5".into(),
            selection: "Over 2.5".into(),
            odds: dec!(1.8),
            staking: Staking { percentage: dec!(3), label: StakingLabel::Standard },
            analysis: String::new(),
            is_vip: false,
        }
    }

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), 1_000_000).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_get_draft_requires_key() {
        let app = build_router(test_state());
        let resp = app
            .oneshot(Request::builder().uri("/api/admin/draft").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_get_draft_empty() {
        let app = build_router(test_state());
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/api/admin/draft?key=test-secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert!(json["draft"].is_null());
        assert_eq!(json["message"], "No draft pending.");
    }

    #[tokio::test]
    async fn test_publish_requires_secret() {
        let app = build_router(test_state());
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/admin/publish")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"secret": "wrong"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_publish_without_draft_is_rejected() {
        let app = build_router(test_state());
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/admin/publish")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"secret": "test-secret"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_publish_activates_pending_markers() {
        let state = test_state();
        let app = build_router(state.clone());

        let draft = DailyTips {
            global_analysis: "two picks".into(),
            vip_pick: Some(sample_pick(11)),
            free_picks: vec![sample_pick(22)],
        };
        set_json(state.store.as_ref(), keys::DAILY_DRAFT, &draft).await.unwrap();

        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/admin/publish")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"secret": "test-secret"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["activated"], 2);

        let markers = state.store.keys("pending_pick:*").await.unwrap();
        assert_eq!(markers.len(), 2);
        // Draft consumed.
        let draft: Option<DailyTips> =
            get_json(state.store.as_ref(), keys::DAILY_DRAFT).await.unwrap();
        assert!(draft.is_none());
    }

    #[tokio::test]
    async fn test_generate_draft_stores_result() {
        let mut fixtures = MockFixtureSource::new();
        fixtures.expect_fixtures_by_date().returning(|_| Ok(Vec::new()));
        let mut drafter = MockTipsDrafter::new();
        drafter
            .expect_draft_tips()
            .returning(|_, _| Ok(DailyTips::empty()));

        let state = test_state_with(fixtures, MockBetVerifier::new(), drafter);
        let app = build_router(state.clone());

        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/admin/draft/generate?key=test-secret&date=2026-08-07")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let stored: Option<DailyTips> =
            get_json(state.store.as_ref(), keys::DAILY_DRAFT).await.unwrap();
        assert!(stored.is_some());
    }

    #[tokio::test]
    async fn test_generate_draft_rejects_bad_date() {
        let app = build_router(test_state());
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/admin/draft/generate?key=test-secret&date=tomorrow")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_check_results_empty_store() {
        let app = build_router(test_state());
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/api/cron/check-results?key=test-secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["log"][0], "No pending bets to check.");
    }
}
