//! Perplexity bet verification.
//!
//! Sends one live-search chat completion per bet and expects a strict
//! JSON verdict `{"result": "WON"|"LOST"|"PENDING"}`. Everything that
//! goes wrong on this path (missing key, transport error, unexpected
//! status, unparsable reply) degrades to `Pending`: the marker stays in
//! the queue and the next settlement pass retries.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{extract_json_object, BetVerifier};
use crate::types::{Bet, BetOutcome};

const PERPLEXITY_API_URL: &str = "https://api.perplexity.ai/chat/completions";
const DEFAULT_MODEL: &str = "sonar";
const DEFAULT_MAX_TOKENS: u32 = 100;

// ---------------------------------------------------------------------------
// API types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct Verdict {
    result: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct PerplexityVerifier {
    http: Client,
    api_key: Option<SecretString>,
    model: String,
    max_tokens: u32,
}

impl PerplexityVerifier {
    pub fn new(api_key: Option<String>, model: Option<String>, max_tokens: Option<u32>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .context("Failed to build Perplexity HTTP client")?;

        Ok(Self {
            http,
            api_key: api_key.map(SecretString::new),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        })
    }

    fn build_prompt(bet: &Bet) -> String {
        format!(
            "You are a sports betting settlement expert. Check whether this bet won or lost.\n\n\
             Match: {home} vs {away}\n\
             Match date: {date}\n\
             Market: {market}\n\
             Selection: {selection}\n\n\
             Search for the real final result of the match and decide.\n\
             IMPORTANT: Answer ONLY with valid JSON, no text before or after:\n\
             {{\"result\": \"WON\"}} if the bet won\n\
             {{\"result\": \"LOST\"}} if the bet lost\n\
             {{\"result\": \"PENDING\"}} if the match has not finished or you cannot find the result",
            home = bet.home_team,
            away = bet.away_team,
            date = bet.date,
            market = bet.market,
            selection = bet.selection,
        )
    }

    /// Parse a verdict out of the model reply. Anything unrecognised
    /// counts as `Pending`.
    fn parse_verdict(text: &str) -> BetOutcome {
        let Some(json) = extract_json_object(text) else {
            return BetOutcome::Pending;
        };
        let Ok(verdict) = serde_json::from_str::<Verdict>(json) else {
            return BetOutcome::Pending;
        };
        match verdict.result.as_str() {
            "WON" => BetOutcome::Won,
            "LOST" => BetOutcome::Lost,
            _ => BetOutcome::Pending,
        }
    }
}

#[async_trait]
impl BetVerifier for PerplexityVerifier {
    async fn verify_bet(&self, bet: &Bet) -> Result<BetOutcome> {
        let Some(api_key) = &self.api_key else {
            debug!(bet_id = %bet.id, "No verifier API key configured, leaving bet pending");
            return Ok(BetOutcome::Pending);
        };

        let request = ChatRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: 0.0,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: Self::build_prompt(bet),
            }],
        };

        let response = match self
            .http
            .post(PERPLEXITY_API_URL)
            .bearer_auth(api_key.expose_secret())
            .json(&request)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(bet_id = %bet.id, error = %e, "Verification request failed");
                return Ok(BetOutcome::Pending);
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(bet_id = %bet.id, status = %status, "Verifier answered with an error status");
            return Ok(BetOutcome::Pending);
        }

        let body: ChatResponse = match response.json().await {
            Ok(b) => b,
            Err(e) => {
                warn!(bet_id = %bet.id, error = %e, "Failed to parse verifier response");
                return Ok(BetOutcome::Pending);
            }
        };

        let content = body
            .choices
            .first()
            .and_then(|c| c.message.as_ref())
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        let outcome = Self::parse_verdict(content);
        debug!(
            bet_id = %bet.id,
            match_label = %bet.label(),
            outcome = %outcome,
            "Bet verified"
        );

        Ok(outcome)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
