//! Groq daily-tips drafting.
//!
//! Builds the daily draft from a list of real fixtures through the
//! OpenAI-compatible chat completions API. Unlike verification, a
//! drafting failure is surfaced to the caller: the administrator asked
//! for a draft and deserves the error.
//!
//! Zero-fabrication rule: only fixtures supplied in the prompt may
//! appear in the draft. Picks referencing unknown fixture ids are
//! dropped before the draft is returned.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

use super::{extract_json_object, TipsDrafter};
use crate::types::{DailyTips, FixtureSnapshot};

const GROQ_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
const DEFAULT_MAX_TOKENS: u32 = 1500;

/// At most this many fixtures are offered to the model per draft.
const MAX_FIXTURES_PER_PROMPT: usize = 12;

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

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct GroqDrafter {
    http: Client,
    api_key: Option<SecretString>,
    model: String,
    max_tokens: u32,
}

impl GroqDrafter {
    pub fn new(api_key: Option<String>, model: Option<String>, max_tokens: Option<u32>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .context("Failed to build Groq HTTP client")?;

        Ok(Self {
            http,
            api_key: api_key.map(SecretString::new),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        })
    }

    fn system_prompt() -> &'static str {
        "You are a professional sports betting analyst. You produce a daily tips \
         sheet as STRICT JSON with this exact shape:\n\
         {\"global_analysis\": string, \"vip_pick\": pick or null, \"free_picks\": [pick, ...]}\n\
         where a pick is {\"fixture_id\": number, \"teams\": string, \"league\": string, \
         \"market\": string, \"selection\": string, \"odds\": number, \
         \"staking\": {\"percentage\": number, \"label\": \"cautious\"|\"standard\"|\"confident\"}, \
         \"analysis\": string, \"is_vip\": boolean}.\n\
         Rules: use ONLY the fixtures listed in the user message, never invent a match; \
         at most one vip_pick and three free_picks; staking percentage between 1 and 5; \
         answer with the JSON object only."
    }

    fn build_user_prompt(date: &str, fixtures: &[FixtureSnapshot]) -> String {
        let mut prompt = format!("Fixtures for {date}:\n");
        for fixture in fixtures.iter().take(MAX_FIXTURES_PER_PROMPT) {
            prompt.push_str(&format!(
                "- fixture_id={} | {} vs {} | {}",
                fixture.id, fixture.home_team, fixture.away_team, fixture.league,
            ));
            if let Some(kickoff) = fixture.kickoff {
                prompt.push_str(&format!(" | kickoff {}", kickoff.format("%H:%M")));
            }
            prompt.push('\n');
        }
        prompt.push_str("\nProduce today's tips sheet as strict JSON.");
        prompt
    }

    /// Parse the model reply and drop any pick whose fixture id was not
    /// in the offered list.
    fn parse_draft(text: &str, offered: &HashSet<u64>) -> Result<DailyTips> {
        let json = extract_json_object(text)
            .context("No JSON object found in drafter response")?;
        let mut draft: DailyTips =
            serde_json::from_str(json).context("Drafter response did not match the tips shape")?;

        if let Some(pick) = &draft.vip_pick {
            if !offered.contains(&pick.fixture_id) {
                warn!(fixture_id = pick.fixture_id, "Dropping VIP pick for unknown fixture");
                draft.vip_pick = None;
            }
        }
        let before = draft.free_picks.len();
        draft.free_picks.retain(|pick| offered.contains(&pick.fixture_id));
        if draft.free_picks.len() < before {
            warn!(
                dropped = before - draft.free_picks.len(),
                "Dropped free picks referencing unknown fixtures"
            );
        }

        Ok(draft)
    }
}

#[async_trait]
impl TipsDrafter for GroqDrafter {
    async fn draft_tips(&self, date: &str, fixtures: &[FixtureSnapshot]) -> Result<DailyTips> {
        if fixtures.is_empty() {
            debug!(date, "No fixtures to draft from");
            return Ok(DailyTips::empty());
        }

        let Some(api_key) = &self.api_key else {
            bail!("Drafter API key not configured");
        };

        let request = ChatRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: 0.3,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: Self::system_prompt().to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: Self::build_user_prompt(date, fixtures),
                },
            ],
        };

        let response = self
            .http
            .post(GROQ_API_URL)
            .bearer_auth(api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .context("Drafting request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Drafter answered HTTP {status}: {body}");
        }

        let body: ChatResponse = response
            .json()
            .await
            .context("Failed to parse drafter response")?;

        let content = body
            .choices
            .first()
            .and_then(|c| c.message.as_ref())
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        let offered: HashSet<u64> = fixtures
            .iter()
            .take(MAX_FIXTURES_PER_PROMPT)
            .map(|f| f.id)
            .collect();
        let draft = Self::parse_draft(content, &offered)?;

        debug!(
            date,
            vip = draft.vip_pick.is_some(),
            free = draft.free_picks.len(),
            "Daily tips drafted"
        );

        Ok(draft)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FixtureStatus;

    fn fixture(id: u64) -> FixtureSnapshot {
        FixtureSnapshot {
            id,
            league: "Premier League".into(),
            home_team: "Arsenal".into(),
            away_team: "Chelsea".into(),
            kickoff: None,
            status: FixtureStatus::Scheduled,
            home_goals: 0,
            away_goals: 0,
            home_winner: None,
            away_winner: None,
        }
    }

    const DRAFT_REPLY: &str = r#"Here is the sheet:
```json
{
  "global_analysis": "Tight fixtures today.",
  "vip_pick": {
    "fixture_id": 1,
    "teams": "Arsenal vs Chelsea",
    "league": "Premier League",
    "market": "Double Chance",
    "selection": "1X",
    "odds": 1.35,
    "staking": {"percentage": 3, "label": "standard"},
    "analysis": "Home side unbeaten.",
    "is_vip": true
  },
  "free_picks": [
    {
      "fixture_id": 99,
      "teams": "Ghost vs Phantom",
      "league": "Nowhere",
      "market": "Over 2.5",
      "selection": "Over 2.5",
      "odds": 1.8,
      "staking": {"percentage": 2, "label": "cautious"},
      "analysis": "",
      "is_vip": false
    }
  ]
}
```"#;

    #[test]
    fn test_parse_draft_keeps_known_and_drops_unknown() {
        let offered: HashSet<u64> = [1, 2].into_iter().collect();
        let draft = GroqDrafter::parse_draft(DRAFT_REPLY, &offered).unwrap();
        assert!(draft.vip_pick.is_some());
        // fixture 99 was never offered, so the phantom pick is dropped
        assert!(draft.free_picks.is_empty());
        assert_eq!(draft.global_analysis, "Tight fixtures today.");
    }

    #[test]
    fn test_parse_draft_rejects_garbage() {
        let offered = HashSet::new();
        assert!(GroqDrafter::parse_draft("not json at all", &offered).is_err());
    }

    #[test]
    fn test_user_prompt_lists_fixture_ids() {
        let prompt = GroqDrafter::build_user_prompt("2026-08-07", &[fixture(42)]);
        assert!(prompt.contains("fixture_id=42"));
        assert!(prompt.contains("Arsenal vs Chelsea"));
        assert!(prompt.contains("2026-08-07"));
    }

    #[tokio::test]
    async fn test_empty_fixture_list_short_circuits() {
        let drafter = GroqDrafter::new(None, None, None).unwrap();
        let draft = drafter.draft_tips("2026-08-07", &[]).await.unwrap();
        assert!(draft.vip_pick.is_none());
        assert!(draft.free_picks.is_empty());
    }

    #[tokio::test]
    async fn test_missing_key_is_an_error_when_fixtures_exist() {
        let drafter = GroqDrafter::new(None, None, None).unwrap();
        let result = drafter.draft_tips("2026-08-07", &[fixture(1)]).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_default_model() {
        let drafter = GroqDrafter::new(None, None, None).unwrap();
        assert_eq!(drafter.model_name(), DEFAULT_MODEL);
    }
}
