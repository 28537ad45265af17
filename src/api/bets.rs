//! User bet endpoints.
//!
//! Placement reserves the stake immediately: the bankroll is debited
//! when the bet is created, a win later credits `potential_win`, and
//! deleting a still-pending bet refunds the stake. The pending marker
//! written here is what queues the bet for the settlement pass.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::{load_user_bets, session_user, ApiError, AppState};
use crate::settlement::bankroll;
use crate::store::{keys, set_json, KvStore};
use crate::types::{Bet, BetStats, BetStatus, TicketType, VERIFIED_BY_MANUAL};

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct BetsResponse {
    pub success: bool,
    pub bets: Vec<Bet>,
    pub bankroll: Decimal,
    pub stats: BetStats,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceBetRequest {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub fixture_id: Option<u64>,
    #[serde(default)]
    pub home_team: Option<String>,
    #[serde(default)]
    pub away_team: Option<String>,
    #[serde(default)]
    pub market: Option<String>,
    #[serde(default)]
    pub selection: Option<String>,
    #[serde(default)]
    pub league: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub ticket_type: Option<TicketType>,
    #[serde(default)]
    pub odds: Option<Decimal>,
    #[serde(default)]
    pub stake: Option<Decimal>,
}

#[derive(Debug, Serialize)]
pub struct BetResponse {
    pub success: bool,
    pub bet: Bet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBetRequest {
    pub bet_id: String,
    pub status: BetStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteBetRequest {
    pub bet_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SuggestStakeQuery {
    pub probability: f64,
    pub odds: f64,
}

#[derive(Debug, Serialize)]
pub struct SuggestStakeResponse {
    pub success: bool,
    pub fraction: f64,
    pub stake: Decimal,
    pub bankroll: Decimal,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/bets
pub async fn list_bets(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<BetsResponse>, ApiError> {
    let email = session_user(&headers)?;

    let bets = load_user_bets(&state, &email).await?;
    let bankroll = state.ledger.balance(&keys::user_bankroll(&email)).await?;
    let stats = BetStats::from_bets(&bets);

    Ok(Json(BetsResponse { success: true, bets, bankroll, stats }))
}

/// POST /api/bets
pub async fn place_bet(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<PlaceBetRequest>,
) -> Result<Json<BetResponse>, ApiError> {
    let email = session_user(&headers)?;

    let home_team = non_empty(req.home_team).ok_or_else(incomplete)?;
    let away_team = non_empty(req.away_team).ok_or_else(incomplete)?;
    let market = non_empty(req.market).ok_or_else(incomplete)?;

    let odds = req.odds.unwrap_or(state.staking.default_odds);
    let stake = req.stake.unwrap_or(state.staking.default_stake);

    if odds < Decimal::ONE {
        return Err(ApiError::BadRequest("Odds must be at least 1.0".to_string()));
    }
    if stake <= Decimal::ZERO {
        return Err(ApiError::BadRequest("Stake must be positive".to_string()));
    }

    let bet = Bet {
        id: req.id.unwrap_or_else(|| format!("bet_{}", Uuid::new_v4())),
        user_email: email.clone(),
        fixture_id: req.fixture_id,
        home_team,
        away_team,
        league: req.league.unwrap_or_default(),
        date: req
            .date
            .unwrap_or_else(|| Utc::now().format("%Y-%m-%d").to_string()),
        ticket_type: req.ticket_type.unwrap_or_default(),
        market,
        selection: req.selection.unwrap_or_default(),
        odds,
        stake,
        potential_win: (stake * odds).round_dp(2),
        status: BetStatus::Pending,
        created_at: Utc::now(),
        settled_at: None,
        verified_by: None,
    };

    // Newest bet first, then the pending marker, then the reservation.
    let bets_key = keys::user_bets(&email);
    let mut bets = load_user_bets(&state, &email).await?;
    bets.insert(0, bet.clone());
    set_json(state.store.as_ref(), &bets_key, &bets).await?;

    set_json(state.store.as_ref(), &keys::pending_user_bet(&bet.id), &bet).await?;

    state
        .ledger
        .adjust(&keys::user_bankroll(&email), -bet.stake)
        .await?;

    info!(email = %email, bet_id = %bet.id, match_label = %bet.label(), "Bet placed");

    Ok(Json(BetResponse { success: true, bet }))
}

/// PATCH /api/bets
pub async fn update_bet(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<UpdateBetRequest>,
) -> Result<Json<BetResponse>, ApiError> {
    let email = session_user(&headers)?;

    let bets_key = keys::user_bets(&email);
    let mut bets = load_user_bets(&state, &email).await?;

    let Some(bet) = bets.iter_mut().find(|b| b.id == req.bet_id) else {
        return Err(ApiError::NotFound("Bet not found".to_string()));
    };

    let previous = bet.status;
    bet.status = req.status;
    if req.status == BetStatus::Pending {
        bet.settled_at = None;
        bet.verified_by = None;
    } else {
        bet.settled_at = Some(Utc::now());
        bet.verified_by = Some(VERIFIED_BY_MANUAL.to_string());
    }
    let updated = bet.clone();

    set_json(state.store.as_ref(), &bets_key, &bets).await?;

    // The ledger only moves on the pending -> settled transition.
    if previous == BetStatus::Pending && req.status != BetStatus::Pending {
        if req.status == BetStatus::Won {
            state
                .ledger
                .adjust(&keys::user_bankroll(&email), updated.potential_win)
                .await?;
        }
        state.store.del(&keys::pending_user_bet(&req.bet_id)).await?;
    }

    info!(email = %email, bet_id = %req.bet_id, status = %req.status, "Bet updated");

    Ok(Json(BetResponse { success: true, bet: updated }))
}

/// DELETE /api/bets
pub async fn delete_bet(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<DeleteBetRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let email = session_user(&headers)?;

    let bets_key = keys::user_bets(&email);
    let mut bets = load_user_bets(&state, &email).await?;

    let Some(index) = bets.iter().position(|b| b.id == req.bet_id) else {
        return Err(ApiError::NotFound("Bet not found".to_string()));
    };

    // A still-pending bet refunds its reserved stake.
    if bets[index].status == BetStatus::Pending {
        state
            .ledger
            .adjust(&keys::user_bankroll(&email), bets[index].stake)
            .await?;
        state.store.del(&keys::pending_user_bet(&req.bet_id)).await?;
    }

    bets.remove(index);
    set_json(state.store.as_ref(), &bets_key, &bets).await?;

    info!(email = %email, bet_id = %req.bet_id, "Bet deleted");

    Ok(Json(serde_json::json!({ "success": true })))
}

/// GET /api/stake/suggest
pub async fn suggest_stake(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SuggestStakeQuery>,
) -> Result<Json<SuggestStakeResponse>, ApiError> {
    let email = session_user(&headers)?;

    if !(0.0..=100.0).contains(&query.probability) {
        return Err(ApiError::BadRequest(
            "Probability must be between 0 and 100".to_string(),
        ));
    }
    if query.odds <= 1.0 {
        return Err(ApiError::BadRequest("Odds must be above 1.0".to_string()));
    }

    let bankroll = state.ledger.balance(&keys::user_bankroll(&email)).await?;
    let fraction = bankroll::kelly_fraction(query.probability, query.odds, &state.kelly);
    let stake = bankroll::suggest_stake(bankroll, query.probability, query.odds, &state.kelly);

    Ok(Json(SuggestStakeResponse { success: true, fraction, stake, bankroll }))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn incomplete() -> ApiError {
    ApiError::BadRequest("Incomplete bet data".to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
