//! Shared types for the TIPSTER service.
//!
//! These types form the data model used across all modules. The wire
//! format (camelCase JSON for bets, snake_case for picks) matches what
//! is stored in the key-value store, so changing a field name here is a
//! data migration.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Convert an `f64` into a `Decimal`, saturating to zero on overflow.
pub fn d(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Bet outcome and status
// ---------------------------------------------------------------------------

/// Three-state grading result shared by the structured and the
/// AI-verified grading paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BetOutcome {
    Won,
    Lost,
    Pending,
}

impl BetOutcome {
    /// Whether this outcome is terminal (the bet can be settled).
    pub fn is_settled(&self) -> bool {
        !matches!(self, BetOutcome::Pending)
    }
}

impl fmt::Display for BetOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetOutcome::Won => write!(f, "WON"),
            BetOutcome::Lost => write!(f, "LOST"),
            BetOutcome::Pending => write!(f, "PENDING"),
        }
    }
}

/// Stored lifecycle status of a bet. Starts `Pending` and transitions
/// exactly once to `Won` or `Lost`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetStatus {
    Pending,
    Won,
    Lost,
}

impl BetStatus {
    /// The stored status corresponding to a settled grading outcome.
    /// Returns `None` for `Pending` (no transition).
    pub fn from_outcome(outcome: BetOutcome) -> Option<Self> {
        match outcome {
            BetOutcome::Won => Some(BetStatus::Won),
            BetOutcome::Lost => Some(BetStatus::Lost),
            BetOutcome::Pending => None,
        }
    }
}

impl fmt::Display for BetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetStatus::Pending => write!(f, "pending"),
            BetStatus::Won => write!(f, "won"),
            BetStatus::Lost => write!(f, "lost"),
        }
    }
}

/// Ticket family a bet belongs to. `Safe` is the low-risk pick,
/// `Fun` the speculative one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketType {
    Safe,
    Fun,
}

impl Default for TicketType {
    fn default() -> Self {
        TicketType::Safe
    }
}

// ---------------------------------------------------------------------------
// User bet
// ---------------------------------------------------------------------------

/// Value recorded in `verified_by` when a bet was graded through the
/// natural-language verification path. Results from that path are
/// advisory, not authoritative.
pub const VERIFIED_BY_HEURISTIC: &str = "heuristic-ai";

/// Value recorded in `verified_by` for a manual status override.
pub const VERIFIED_BY_MANUAL: &str = "manual";

/// A user-placed wager against the virtual bankroll.
///
/// Descriptive fields are copied from the fixture at placement time and
/// immutable afterwards; only `status`, `settled_at` and `verified_by`
/// change, exactly once, at settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bet {
    pub id: String,
    pub user_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixture_id: Option<u64>,
    pub home_team: String,
    pub away_team: String,
    #[serde(default)]
    pub league: String,
    /// Match date as `YYYY-MM-DD`.
    pub date: String,
    #[serde(default)]
    pub ticket_type: TicketType,
    pub market: String,
    #[serde(default)]
    pub selection: String,
    pub odds: Decimal,
    pub stake: Decimal,
    /// `stake * odds`, fixed at placement.
    pub potential_win: Decimal,
    pub status: BetStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settled_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_by: Option<String>,
}

impl Bet {
    /// Realized profit of this bet. Zero while pending: the stake is
    /// reserved at placement, so a loss costs nothing further.
    pub fn profit(&self) -> Decimal {
        match self.status {
            BetStatus::Won => self.potential_win - self.stake,
            BetStatus::Lost => -self.stake,
            BetStatus::Pending => Decimal::ZERO,
        }
    }

    /// Short human-readable label used in settlement logs.
    pub fn label(&self) -> String {
        format!("{} vs {}", self.home_team, self.away_team)
    }
}

impl fmt::Display for Bet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} | {} {} @ {} (stake {}, returns {})",
            self.status,
            self.label(),
            self.market,
            self.selection,
            self.odds,
            self.stake,
            self.potential_win,
        )
    }
}

/// Aggregate statistics over a user's bet list, returned by the bets
/// listing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetStats {
    pub total: usize,
    pub won: usize,
    pub lost: usize,
    pub pending: usize,
    /// Win rate over resolved bets, as a whole percentage.
    pub win_rate: u32,
    pub profit: Decimal,
}

impl BetStats {
    pub fn from_bets(bets: &[Bet]) -> Self {
        let won = bets.iter().filter(|b| b.status == BetStatus::Won).count();
        let lost = bets.iter().filter(|b| b.status == BetStatus::Lost).count();
        let pending = bets.iter().filter(|b| b.status == BetStatus::Pending).count();
        let resolved = won + lost;
        let win_rate = if resolved > 0 {
            ((won as f64 / resolved as f64) * 100.0).round() as u32
        } else {
            0
        };
        let profit: Decimal = bets.iter().map(Bet::profit).sum();

        BetStats {
            total: bets.len(),
            won,
            lost,
            pending,
            win_rate,
            profit: profit.round_dp(2),
        }
    }
}

// ---------------------------------------------------------------------------
// System picks
// ---------------------------------------------------------------------------

/// Stake-sizing label attached to a system pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StakingLabel {
    Cautious,
    Standard,
    Confident,
}

impl fmt::Display for StakingLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StakingLabel::Cautious => write!(f, "cautious"),
            StakingLabel::Standard => write!(f, "standard"),
            StakingLabel::Confident => write!(f, "confident"),
        }
    }
}

/// Percentage-of-bankroll stake sizing chosen at pick-creation time.
/// The percentage is applied against the bankroll value at settlement
/// time, not at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Staking {
    pub percentage: Decimal,
    pub label: StakingLabel,
}

/// A house-curated recommendation, graded deterministically from
/// structured fixture data once the match finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pick {
    pub fixture_id: u64,
    /// Display label, e.g. "Arsenal vs Chelsea".
    pub teams: String,
    #[serde(default)]
    pub league: String,
    pub market: String,
    pub selection: String,
    pub odds: Decimal,
    pub staking: Staking,
    #[serde(default)]
    pub analysis: String,
    #[serde(default)]
    pub is_vip: bool,
}

/// The daily draft produced by the tips drafter and reviewed by the
/// administrator before publication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyTips {
    pub global_analysis: String,
    #[serde(default)]
    pub vip_pick: Option<Pick>,
    #[serde(default)]
    pub free_picks: Vec<Pick>,
}

impl DailyTips {
    /// Draft used when no real fixtures are available. Fixtures are
    /// never invented to fill the gap.
    pub fn empty() -> Self {
        DailyTips {
            global_analysis: "No fixtures scheduled in the covered leagues.".to_string(),
            vip_pick: None,
            free_picks: Vec::new(),
        }
    }

    /// All picks in the draft, VIP first.
    pub fn all_picks(&self) -> Vec<&Pick> {
        self.vip_pick.iter().chain(self.free_picks.iter()).collect()
    }
}

// ---------------------------------------------------------------------------
// Fixture snapshot
// ---------------------------------------------------------------------------

/// Normalized match status from the fixtures provider's short code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FixtureStatus {
    Scheduled,
    InPlay,
    Finished,
    FinishedExtraTime,
    FinishedPenalties,
    Postponed,
    Cancelled,
    Other(String),
}

impl FixtureStatus {
    /// Map the provider's short status code (`FT`, `NS`, `1H`...).
    pub fn from_short_code(code: &str) -> Self {
        match code {
            "FT" => FixtureStatus::Finished,
            "AET" => FixtureStatus::FinishedExtraTime,
            "PEN" => FixtureStatus::FinishedPenalties,
            "NS" | "TBD" => FixtureStatus::Scheduled,
            "1H" | "HT" | "2H" | "ET" | "BT" | "P" | "SUSP" | "INT" | "LIVE" => {
                FixtureStatus::InPlay
            }
            "PST" => FixtureStatus::Postponed,
            "CANC" | "ABD" | "AWD" | "WO" => FixtureStatus::Cancelled,
            other => FixtureStatus::Other(other.to_string()),
        }
    }

    /// Whether the match has a final result that can be graded.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FixtureStatus::Finished
                | FixtureStatus::FinishedExtraTime
                | FixtureStatus::FinishedPenalties
        )
    }
}

impl fmt::Display for FixtureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixtureStatus::Scheduled => write!(f, "scheduled"),
            FixtureStatus::InPlay => write!(f, "in play"),
            FixtureStatus::Finished => write!(f, "finished"),
            FixtureStatus::FinishedExtraTime => write!(f, "finished (aet)"),
            FixtureStatus::FinishedPenalties => write!(f, "finished (pens)"),
            FixtureStatus::Postponed => write!(f, "postponed"),
            FixtureStatus::Cancelled => write!(f, "cancelled"),
            FixtureStatus::Other(code) => write!(f, "{code}"),
        }
    }
}

/// Full-time result of a fixture, derived from the provider's winner
/// flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchResult {
    Home,
    Away,
    Draw,
}

/// Ephemeral view of a fixture fetched from the provider. Consumed by
/// the grader and the tips drafter, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureSnapshot {
    pub id: u64,
    pub league: String,
    pub home_team: String,
    pub away_team: String,
    #[serde(default)]
    pub kickoff: Option<DateTime<Utc>>,
    pub status: FixtureStatus,
    pub home_goals: u32,
    pub away_goals: u32,
    #[serde(default)]
    pub home_winner: Option<bool>,
    #[serde(default)]
    pub away_winner: Option<bool>,
}

impl FixtureSnapshot {
    pub fn total_goals(&self) -> u32 {
        self.home_goals + self.away_goals
    }

    /// Winner derived from the provider flags. Neither flag set means
    /// a draw.
    pub fn result(&self) -> MatchResult {
        if self.home_winner == Some(true) {
            MatchResult::Home
        } else if self.away_winner == Some(true) {
            MatchResult::Away
        } else {
            MatchResult::Draw
        }
    }
}

impl fmt::Display for FixtureSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} vs {} [{}] {}-{}",
            self.home_team, self.away_team, self.status, self.home_goals, self.away_goals,
        )
    }
}

// ---------------------------------------------------------------------------
// Bankroll history
// ---------------------------------------------------------------------------

/// One bankroll snapshot. The history list is bounded to the most
/// recent 100 entries and used purely for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankrollPoint {
    /// Snapshot date as `YYYY-MM-DD`.
    pub date: String,
    pub bankroll: Decimal,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
