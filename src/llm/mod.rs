//! LLM integration.
//!
//! Two seams, one per provider: `BetVerifier` asks a live-search model
//! whether a user bet won, and `TipsDrafter` produces the daily tips
//! draft from real fixtures. Both expect a strict JSON payload in the
//! reply and parse it defensively out of whatever text surrounds it.

pub mod groq;
pub mod perplexity;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{Bet, BetOutcome, DailyTips, FixtureSnapshot};

/// Natural-language verification of a user bet's outcome.
///
/// Results from this path are advisory. Implementations degrade to
/// `Pending` on any upstream or parse failure so the bet stays queued
/// for the next settlement pass.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BetVerifier: Send + Sync {
    async fn verify_bet(&self, bet: &Bet) -> Result<BetOutcome>;

    fn model_name(&self) -> &str;
}

/// Drafting of the daily tips from a list of real fixtures.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TipsDrafter: Send + Sync {
    async fn draft_tips(&self, date: &str, fixtures: &[FixtureSnapshot]) -> Result<DailyTips>;

    fn model_name(&self) -> &str;
}

/// Locate the first balanced JSON object inside arbitrary text.
///
/// Models are instructed to answer with bare JSON but routinely wrap it
/// in prose or code fences; this finds the `{...}` span by brace depth.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    for (offset, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
