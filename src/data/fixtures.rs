//! API-Football fixtures client.
//!
//! Uses the API-Sports football endpoint for fixtures and results.
//!
//! API: `https://v3.football.api-sports.io/`
//! Auth: `x-apisports-key` header. Free tier: 100 req/day.
//!
//! One best-effort call per lookup; the settlement loop re-polls on its
//! next pass, so there is no retry or backoff here.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use super::FixtureSource;
use crate::types::{FixtureSnapshot, FixtureStatus};

const API_BASE_URL: &str = "https://v3.football.api-sports.io";

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FixturesResponse {
    #[serde(default)]
    errors: serde_json::Value,
    #[serde(default)]
    response: Vec<FixtureEntry>,
}

impl FixturesResponse {
    /// The provider reports errors as a non-empty object (quota,
    /// bad parameters) while still answering HTTP 200.
    fn has_errors(&self) -> bool {
        self.errors.as_object().is_some_and(|m| !m.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct FixtureEntry {
    fixture: FixtureMeta,
    league: LeagueMeta,
    teams: TeamsMeta,
    goals: GoalsMeta,
}

#[derive(Debug, Deserialize)]
struct FixtureMeta {
    id: u64,
    #[serde(default)]
    date: Option<DateTime<Utc>>,
    status: StatusMeta,
}

#[derive(Debug, Deserialize)]
struct StatusMeta {
    #[serde(default)]
    short: String,
}

#[derive(Debug, Deserialize)]
struct LeagueMeta {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct TeamsMeta {
    home: TeamMeta,
    away: TeamMeta,
}

#[derive(Debug, Deserialize)]
struct TeamMeta {
    name: String,
    #[serde(default)]
    winner: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct GoalsMeta {
    #[serde(default)]
    home: Option<u32>,
    #[serde(default)]
    away: Option<u32>,
}

impl FixtureEntry {
    fn into_snapshot(self) -> FixtureSnapshot {
        FixtureSnapshot {
            id: self.fixture.id,
            league: self.league.name,
            home_team: self.teams.home.name,
            away_team: self.teams.away.name,
            kickoff: self.fixture.date,
            status: FixtureStatus::from_short_code(&self.fixture.status.short),
            // Goals are null until kickoff.
            home_goals: self.goals.home.unwrap_or(0),
            away_goals: self.goals.away.unwrap_or(0),
            home_winner: self.teams.home.winner,
            away_winner: self.teams.away.winner,
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct ApiFootballClient {
    http: Client,
    api_key: Option<SecretString>,
    league_ids: String,
    timezone: String,
}

impl ApiFootballClient {
    pub fn new(api_key: Option<String>, league_ids: String, timezone: String) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .user_agent("tipster/0.1.0")
            .build()
            .context("Failed to build fixtures HTTP client")?;

        Ok(Self {
            http,
            api_key: api_key.map(SecretString::new),
            league_ids,
            timezone,
        })
    }

    async fn fetch(&self, query: &[(&str, &str)]) -> Result<FixturesResponse> {
        let Some(api_key) = &self.api_key else {
            bail!("Fixtures API key not configured");
        };

        let response = self
            .http
            .get(format!("{API_BASE_URL}/fixtures"))
            .header("x-apisports-key", api_key.expose_secret())
            .query(query)
            .send()
            .await
            .context("Fixtures request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("Fixtures provider answered HTTP {status}");
        }

        let body: FixturesResponse = response
            .json()
            .await
            .context("Failed to parse fixtures response")?;

        if body.has_errors() {
            bail!("Fixtures provider reported errors: {}", body.errors);
        }

        Ok(body)
    }
}

#[async_trait]
impl FixtureSource for ApiFootballClient {
    async fn fixture_by_id(&self, id: u64) -> Result<Option<FixtureSnapshot>> {
        let id_str = id.to_string();
        let body = self.fetch(&[("id", id_str.as_str())]).await?;

        let snapshot = body
            .response
            .into_iter()
            .next()
            .map(FixtureEntry::into_snapshot);

        debug!(fixture_id = id, found = snapshot.is_some(), "Fixture lookup");
        Ok(snapshot)
    }

    async fn fixtures_by_date(&self, date: &str) -> Result<Vec<FixtureSnapshot>> {
        let body = self
            .fetch(&[
                ("date", date),
                ("league", self.league_ids.as_str()),
                ("timezone", self.timezone.as_str()),
            ])
            .await?;

        let fixtures: Vec<FixtureSnapshot> = body
            .response
            .into_iter()
            .map(FixtureEntry::into_snapshot)
            .collect();

        debug!(date, count = fixtures.len(), "Fixtures listed");
        Ok(fixtures)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
