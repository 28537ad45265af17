//! Public record and bankroll history endpoints.
//!
//! The win/total/streak record is displayed on the landing page and
//! maintained by the settlement pass (VIP counters) and by the
//! administrator (manual sets and increments).

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::admin::AdminQuery;
use super::{require_admin, ApiError, AppState};
use crate::store::{keys, KvStore};
use crate::types::BankrollPoint;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct VipRecord {
    pub wins: i64,
    pub total: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordResponse {
    pub success: bool,
    pub wins: i64,
    pub total: i64,
    pub streak: i64,
    pub vip: VipRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRecordRequest {
    #[serde(default)]
    pub wins: Option<i64>,
    #[serde(default)]
    pub total: Option<i64>,
    #[serde(default)]
    pub streak: Option<i64>,
    #[serde(default)]
    pub increment: Option<RecordIncrement>,
}

#[derive(Debug, Deserialize)]
pub struct RecordIncrement {
    #[serde(default)]
    pub wins: Option<i64>,
    #[serde(default)]
    pub total: Option<i64>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/stats
pub async fn get_record(State(state): State<AppState>) -> Result<Json<RecordResponse>, ApiError> {
    Ok(Json(read_record(state.store.as_ref()).await?))
}

/// POST /api/stats
pub async fn update_record(
    State(state): State<AppState>,
    Query(query): Query<AdminQuery>,
    Json(req): Json<UpdateRecordRequest>,
) -> Result<Json<RecordResponse>, ApiError> {
    require_admin(&state, query.key.as_deref())?;

    let store = state.store.as_ref();

    if let Some(wins) = req.wins {
        store.set(keys::STATS_WINS, &wins.to_string()).await?;
    }
    if let Some(total) = req.total {
        store.set(keys::STATS_TOTAL, &total.to_string()).await?;
    }
    if let Some(streak) = req.streak {
        store.set(keys::STATS_STREAK, &streak.to_string()).await?;
    }
    if let Some(increment) = &req.increment {
        if let Some(wins) = increment.wins {
            store.incr_by_float(keys::STATS_WINS, wins as f64).await?;
        }
        if let Some(total) = increment.total {
            store.incr_by_float(keys::STATS_TOTAL, total as f64).await?;
        }
    }

    store
        .set(keys::STATS_LAST_UPDATED, &Utc::now().to_rfc3339())
        .await?;

    Ok(Json(read_record(store).await?))
}

/// GET /api/stats/bankroll
///
/// History in chronological order. A store with no snapshots yet
/// answers with a single point at the starting balance.
pub async fn bankroll_history(
    State(state): State<AppState>,
) -> Result<Json<Vec<BankrollPoint>>, ApiError> {
    let history = state.ledger.history().await?;
    if !history.is_empty() {
        return Ok(Json(history));
    }

    Ok(Json(vec![BankrollPoint {
        date: Utc::now().format("%Y-%m-%d").to_string(),
        bankroll: state.ledger.initial(),
    }]))
}

async fn read_record(store: &dyn KvStore) -> Result<RecordResponse, ApiError> {
    Ok(RecordResponse {
        success: true,
        wins: read_counter(store, keys::STATS_WINS).await?,
        total: read_counter(store, keys::STATS_TOTAL).await?,
        streak: read_counter(store, keys::STATS_STREAK).await?,
        vip: VipRecord {
            wins: read_counter(store, keys::STATS_VIP_WINS).await?,
            total: read_counter(store, keys::STATS_VIP_TOTAL).await?,
        },
        last_updated: store.get(keys::STATS_LAST_UPDATED).await?,
    })
}

/// Counters are stored as numeric strings; anything unreadable counts
/// as zero.
async fn read_counter(store: &dyn KvStore, key: &str) -> Result<i64, ApiError> {
    Ok(store
        .get(key)
        .await?
        .and_then(|raw| raw.trim().parse::<f64>().ok())
        .map(|value| value as i64)
        .unwrap_or(0))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
