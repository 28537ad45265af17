//! Bankroll arithmetic.
//!
//! Two concerns share this module: the advisory fractional-Kelly stake
//! suggestion, and the `Ledger` that applies the reserve-at-placement
//! discipline to bankroll scalars in the store. Stakes are debited when
//! a bet is placed, `potential_win` is credited only on a win, and
//! deleting a still-pending bet refunds the stake.

use anyhow::{Context, Result};
use chrono::Utc;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::store::{keys, KvStore};
use crate::types::{d, BankrollPoint};

/// The bounded bankroll history keeps this many snapshots.
pub const HISTORY_LIMIT: i64 = 100;

// ---------------------------------------------------------------------------
// Kelly stake suggestion
// ---------------------------------------------------------------------------

/// Kelly sizing configuration.
#[derive(Debug, Clone)]
pub struct KellyConfig {
    /// Fractional Kelly multiplier (0.25 = quarter-Kelly). Lower = more conservative.
    pub multiplier: f64,
    /// Hard cap on the suggested stake as a fraction of bankroll.
    pub max_fraction: f64,
}

impl Default for KellyConfig {
    fn default() -> Self {
        Self {
            multiplier: 0.25,  // Quarter-Kelly: conservative
            max_fraction: 0.10, // Never suggest more than 10% of bankroll
        }
    }
}

/// Fractional Kelly stake suggestion as a fraction of bankroll.
///
/// Kelly formula: f* = (bp - q) / b with b = odds - 1, p the win
/// probability and q = 1 - p. The result is scaled by the multiplier
/// and clamped to [0, max_fraction]. Advisory only: nothing stops a
/// user from staking more.
pub fn kelly_fraction(probability_pct: f64, odds: f64, config: &KellyConfig) -> f64 {
    if odds <= 1.0 || !(0.0..=100.0).contains(&probability_pct) {
        return 0.0;
    }

    let b = odds - 1.0;
    let p = probability_pct / 100.0;
    let q = 1.0 - p;
    let kelly = (b * p - q) / b;

    (kelly * config.multiplier).clamp(0.0, config.max_fraction)
}

/// Suggested stake amount for a given bankroll, rounded to cents.
pub fn suggest_stake(
    bankroll: Decimal,
    probability_pct: f64,
    odds: f64,
    config: &KellyConfig,
) -> Decimal {
    let fraction = kelly_fraction(probability_pct, odds, config);
    (bankroll * d(fraction)).round_dp(2)
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Bankroll scalar access with first-touch initialisation.
///
/// Adjustments go through the store's atomic float increment rather
/// than read-modify-write, which narrows the race window between
/// overlapping settlement runs to the initialisation of a brand-new
/// key.
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn KvStore>,
    initial: Decimal,
}

impl Ledger {
    pub fn new(store: Arc<dyn KvStore>, initial: Decimal) -> Self {
        Self { store, initial }
    }

    pub fn initial(&self) -> Decimal {
        self.initial
    }

    /// Current balance of a bankroll key, defaulting to the initial
    /// balance when the key has never been written.
    pub async fn balance(&self, key: &str) -> Result<Decimal> {
        match self.store.get(key).await? {
            Some(raw) => {
                let parsed = Decimal::from_str(raw.trim())
                    .or_else(|_| raw.trim().parse::<f64>().map(d))
                    .with_context(|| format!("Unreadable bankroll value at {key}"))?;
                Ok(parsed)
            }
            None => Ok(self.initial),
        }
    }

    /// Apply a signed delta to a bankroll key and return the new
    /// balance. Initialises the key to the starting balance first if it
    /// has never been written.
    pub async fn adjust(&self, key: &str, delta: Decimal) -> Result<Decimal> {
        self.store.set_nx(key, &self.initial.to_string()).await?;

        let delta_f = delta
            .to_f64()
            .with_context(|| format!("Bankroll delta out of range: {delta}"))?;
        let new_balance = self.store.incr_by_float(key, delta_f).await?;

        debug!(key, %delta, new_balance, "Bankroll adjusted");
        Ok(d(new_balance))
    }

    /// Append a global-bankroll snapshot and trim the history to the
    /// most recent `HISTORY_LIMIT` entries.
    pub async fn snapshot_history(&self, balance: Decimal) -> Result<()> {
        let point = BankrollPoint {
            date: Utc::now().format("%Y-%m-%d").to_string(),
            bankroll: balance.round_dp(2),
        };
        let raw = serde_json::to_string(&point).context("Failed to serialise history point")?;

        self.store.lpush(keys::BANKROLL_HISTORY, &raw).await?;
        self.store
            .ltrim(keys::BANKROLL_HISTORY, 0, HISTORY_LIMIT - 1)
            .await?;
        Ok(())
    }

    /// Global bankroll history in chronological order. Entries are
    /// stored newest-first by `lpush`, hence the reverse. Corrupt
    /// entries are skipped.
    pub async fn history(&self) -> Result<Vec<BankrollPoint>> {
        let raw = self
            .store
            .lrange(keys::BANKROLL_HISTORY, 0, HISTORY_LIMIT - 1)
            .await?;

        let mut points: Vec<BankrollPoint> = raw
            .iter()
            .filter_map(|entry| match serde_json::from_str(entry) {
                Ok(point) => Some(point),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupt bankroll history entry");
                    None
                }
            })
            .collect();

        points.reverse();
        Ok(points)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
