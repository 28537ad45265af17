//! Settlement reconciliation.
//!
//! One pass drains both pending namespaces: system picks are graded
//! deterministically from the live fixture result, user bets through
//! the natural-language verifier. Each item commits independently; a
//! corrupt record or a failing provider call is logged and skipped so
//! one bad item never aborts its siblings. The global bankroll is
//! written once per pass, after the loop.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing::{info, warn};

use super::bankroll::Ledger;
use super::grader;
use crate::data::FixtureSource;
use crate::llm::BetVerifier;
use crate::notify::Notifier;
use crate::store::{get_json, keys, set_json, KvStore};
use crate::types::{Bet, BetOutcome, BetStatus, Pick, VERIFIED_BY_HEURISTIC};

// ---------------------------------------------------------------------------
// Settlement report
// ---------------------------------------------------------------------------

/// Summary of one reconciliation pass. The `log` lines are returned to
/// the settlement caller verbatim, failures included.
#[derive(Debug, Clone)]
pub struct SettlementReport {
    pub log: Vec<String>,
    pub system_settled: usize,
    pub user_settled: usize,
    pub total_profit: Decimal,
    /// New global bankroll, present only when the pass changed it.
    pub bankroll_after: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

pub struct Reconciler {
    store: Arc<dyn KvStore>,
    fixtures: Arc<dyn FixtureSource>,
    verifier: Arc<dyn BetVerifier>,
    notifier: Arc<dyn Notifier>,
    ledger: Ledger,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn KvStore>,
        fixtures: Arc<dyn FixtureSource>,
        verifier: Arc<dyn BetVerifier>,
        notifier: Arc<dyn Notifier>,
        ledger: Ledger,
    ) -> Self {
        Self { store, fixtures, verifier, notifier, ledger }
    }

    /// Run one reconciliation pass over every pending marker.
    pub async fn run(&self) -> Result<SettlementReport> {
        let mut log: Vec<String> = Vec::new();
        let mut total_profit = Decimal::ZERO;
        let mut system_settled = 0usize;
        let mut user_settled = 0usize;

        // Percentage staking applies against the bankroll at settlement
        // time. A negative stored balance falls back to the starting
        // balance for sizing.
        let mut staking_bankroll = self.ledger.balance(keys::GLOBAL_BANKROLL).await?;
        if staking_bankroll < Decimal::ZERO {
            staking_bankroll = self.ledger.initial();
        }

        // -- System picks ------------------------------------------------

        let pick_keys = self
            .store
            .keys(&keys::prefix_pattern(keys::PENDING_PICK_PREFIX))
            .await?;

        if !pick_keys.is_empty() {
            log.push(format!("--- System picks ({}) ---", pick_keys.len()));
        }

        for key in &pick_keys {
            match self.settle_pick(key, staking_bankroll, &mut log).await {
                Ok(Some(profit)) => {
                    total_profit += profit;
                    system_settled += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(key = %key, error = %format!("{e:#}"), "Failed to settle system pick");
                    log.push(format!("ERROR: {key}: {e:#}"));
                }
            }
        }

        // -- User bets ---------------------------------------------------

        let bet_keys = self
            .store
            .keys(&keys::prefix_pattern(keys::PENDING_USER_BET_PREFIX))
            .await?;

        if !bet_keys.is_empty() {
            log.push(format!("--- User bets ({}) ---", bet_keys.len()));
        }

        for key in &bet_keys {
            match self.settle_user_bet(key, &mut log).await {
                Ok(true) => user_settled += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(key = %key, error = %format!("{e:#}"), "Failed to settle user bet");
                    log.push(format!("ERROR: {key}: {e:#}"));
                }
            }
        }

        // -- Global bankroll commit ---------------------------------------

        let bankroll_after = if total_profit != Decimal::ZERO {
            let new_balance = self.ledger.adjust(keys::GLOBAL_BANKROLL, total_profit).await?;
            self.ledger.snapshot_history(new_balance).await?;
            log.push(format!("Global bankroll updated: {:.2}", new_balance));
            Some(new_balance)
        } else {
            None
        };

        if log.is_empty() {
            log.push("No pending bets to check.".to_string());
        }

        info!(
            system = system_settled,
            user = user_settled,
            profit = %total_profit.round_dp(2),
            "Settlement pass complete"
        );

        Ok(SettlementReport {
            log,
            system_settled,
            user_settled,
            total_profit,
            bankroll_after,
            timestamp: Utc::now(),
        })
    }

    /// Settle one system pick. Returns the signed profit when the pick
    /// resolved, `None` while it stays pending.
    async fn settle_pick(
        &self,
        key: &str,
        staking_bankroll: Decimal,
        log: &mut Vec<String>,
    ) -> Result<Option<Decimal>> {
        let Some(pick) = get_json::<Pick>(self.store.as_ref(), key).await? else {
            return Ok(None);
        };

        let Some(fixture) = self.fixtures.fixture_by_id(pick.fixture_id).await? else {
            // A permanently missing fixture would otherwise be retried
            // forever; drop it.
            log.push(format!(
                "Fixture not found for {} (id {}). Dropping pick.",
                pick.teams, pick.fixture_id
            ));
            self.store.del(key).await?;
            return Ok(None);
        };

        let outcome = grader::grade(&pick.market, &pick.selection, &fixture);
        if !outcome.is_settled() {
            return Ok(None);
        }

        let stake = (pick.staking.percentage / dec!(100)) * staking_bankroll;
        let profit = match outcome {
            BetOutcome::Won => stake * (pick.odds - Decimal::ONE),
            _ => -stake,
        };

        if pick.is_vip {
            self.store.incr(keys::STATS_VIP_TOTAL).await?;
            if outcome == BetOutcome::Won {
                self.store.incr(keys::STATS_VIP_WINS).await?;
            }
        }

        log.push(format!(
            "{}: {} | {} ({}{:.2})",
            outcome,
            pick.teams,
            pick.market,
            if profit >= Decimal::ZERO { "+" } else { "" },
            profit,
        ));

        self.store.del(key).await?;
        Ok(Some(profit))
    }

    /// Settle one user bet. Returns whether it resolved.
    async fn settle_user_bet(&self, key: &str, log: &mut Vec<String>) -> Result<bool> {
        let Some(bet) = get_json::<Bet>(self.store.as_ref(), key).await? else {
            return Ok(false);
        };

        let outcome = self.verifier.verify_bet(&bet).await?;
        let Some(status) = BetStatus::from_outcome(outcome) else {
            return Ok(false);
        };

        // Rewrite the settled bet inside the user's list.
        let bets_key = keys::user_bets(&bet.user_email);
        let mut bets: Vec<Bet> = get_json(self.store.as_ref(), &bets_key)
            .await?
            .unwrap_or_default();

        let settled_at = Utc::now();
        for stored in bets.iter_mut().filter(|b| b.id == bet.id) {
            stored.status = status;
            stored.settled_at = Some(settled_at);
            stored.verified_by = Some(VERIFIED_BY_HEURISTIC.to_string());
        }
        set_json(self.store.as_ref(), &bets_key, &bets).await?;

        // The stake was reserved at placement, so a loss needs no
        // further ledger change.
        let profit = match outcome {
            BetOutcome::Won => {
                self.ledger
                    .adjust(&keys::user_bankroll(&bet.user_email), bet.potential_win)
                    .await
                    .context("Failed to credit winnings")?;
                bet.potential_win - bet.stake
            }
            _ => -bet.stake,
        };

        log.push(format!(
            "{}: {} - {} ({}{:.2})",
            outcome,
            bet.user_email,
            bet.label(),
            if profit >= Decimal::ZERO { "+" } else { "" },
            profit,
        ));

        // Best effort: a failed notification never blocks settlement.
        if let Err(e) = self
            .notifier
            .bet_settled(&bet.user_email, &bet, outcome, profit)
            .await
        {
            warn!(bet_id = %bet.id, error = %e, "Push notification failed");
        }

        self.store.del(key).await?;
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
