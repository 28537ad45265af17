//! Outcome grading.
//!
//! Pure decision function: given a bet's market and selection and a
//! structured fixture result, decide WON, LOST or PENDING. No side
//! effects, no retries; the caller re-polls on a later pass while the
//! pending marker survives.

use crate::types::{BetOutcome, FixtureSnapshot, MatchResult};

// ---------------------------------------------------------------------------
// Market kinds
// ---------------------------------------------------------------------------

/// Closed set of market families the grader understands, parsed from
/// the human-entered market label. Labels come in both English and
/// French because historical picks carry both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketKind {
    BttsYes,
    BttsNo,
    Over25,
    Under25,
    DoubleChance,
    MatchWinner,
    /// Anything else. Graded with the 1-N-2 fallback rule, like an
    /// explicit match-winner market.
    Unrecognized,
}

impl MarketKind {
    pub fn parse(market: &str) -> Self {
        match market.trim().to_lowercase().as_str() {
            "btts oui" | "btts yes" | "les deux équipes marquent" | "les deux equipes marquent"
            | "both teams to score" => MarketKind::BttsYes,
            "btts non" | "btts no" => MarketKind::BttsNo,
            "over 2.5 buts" | "plus de 2.5 buts" | "over 2.5" | "over 2.5 goals" => {
                MarketKind::Over25
            }
            "under 2.5 buts" | "moins de 2.5 buts" | "under 2.5" | "under 2.5 goals" => {
                MarketKind::Under25
            }
            "double chance" => MarketKind::DoubleChance,
            "match winner" | "1n2" | "1x2" | "résultat du match" | "resultat du match" => {
                MarketKind::MatchWinner
            }
            _ => MarketKind::Unrecognized,
        }
    }
}

// ---------------------------------------------------------------------------
// Grading
// ---------------------------------------------------------------------------

/// Grade a market/selection pair against a fixture result.
///
/// A fixture whose status is not terminal (full time, after extra time
/// or on penalties) is PENDING regardless of the current score.
pub fn grade(market: &str, selection: &str, fixture: &FixtureSnapshot) -> BetOutcome {
    if !fixture.status.is_terminal() {
        return BetOutcome::Pending;
    }

    let home = fixture.home_goals;
    let away = fixture.away_goals;

    match MarketKind::parse(market) {
        MarketKind::BttsYes => won_if(home > 0 && away > 0),
        MarketKind::BttsNo => won_if(home == 0 || away == 0),
        MarketKind::Over25 => won_if(f64::from(home + away) > 2.5),
        MarketKind::Under25 => won_if(f64::from(home + away) < 2.5),
        MarketKind::DoubleChance => grade_double_chance(selection, fixture),
        MarketKind::MatchWinner | MarketKind::Unrecognized => {
            grade_match_winner(selection, fixture)
        }
    }
}

fn won_if(condition: bool) -> BetOutcome {
    if condition {
        BetOutcome::Won
    } else {
        BetOutcome::Lost
    }
}

fn grade_double_chance(selection: &str, fixture: &FixtureSnapshot) -> BetOutcome {
    let selection = selection.to_lowercase();
    let winner = fixture.result();

    if selection.contains("1x") || selection.contains(&fixture.home_team.to_lowercase()) {
        return won_if(matches!(winner, MatchResult::Home | MatchResult::Draw));
    }
    if selection.contains("x2") || selection.contains(&fixture.away_team.to_lowercase()) {
        return won_if(matches!(winner, MatchResult::Away | MatchResult::Draw));
    }

    // A selection that names neither side grades as a loss.
    BetOutcome::Lost
}

fn grade_match_winner(selection: &str, fixture: &FixtureSnapshot) -> BetOutcome {
    let selection = selection.to_lowercase();

    let won = match fixture.result() {
        MatchResult::Home => selection.contains(&fixture.home_team.to_lowercase()),
        MatchResult::Away => selection.contains(&fixture.away_team.to_lowercase()),
        MatchResult::Draw => selection.contains("draw") || selection.contains("nul"),
    };

    won_if(won)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
