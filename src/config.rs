//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (API keys, store tokens, the admin secret) are referenced by
//! env-var name in the config and resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub fixtures: FixturesConfig,
    pub llm: LlmConfig,
    pub staking: StakingConfig,
    pub notify: NotifyConfig,
    pub admin: AdminConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Env var holding the Upstash REST URL.
    pub url_env: String,
    /// Env var holding the Upstash REST token.
    pub token_env: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FixturesConfig {
    pub api_key_env: String,
    /// Dash-separated priority league ids passed to the provider.
    pub league_ids: String,
    pub timezone: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// Live-search model used to verify user bets.
    pub verifier_model: String,
    pub verifier_api_key_env: String,
    /// Chat model used to draft the daily tips.
    pub drafter_model: String,
    pub drafter_api_key_env: String,
    pub max_tokens: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StakingConfig {
    /// Starting balance for every bankroll on first access.
    pub initial_bankroll: Decimal,
    /// Fractional Kelly multiplier (0.25 = quarter-Kelly).
    pub kelly_multiplier: f64,
    /// Hard cap on the suggested stake as a fraction of bankroll.
    pub max_stake_fraction: f64,
    /// Stake applied when a placement request omits one.
    pub default_stake: Decimal,
    /// Odds applied when a placement request omits them.
    pub default_odds: Decimal,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotifyConfig {
    /// Base URL of the push-notification gateway. Absent means
    /// notifications are disabled (logged only).
    #[serde(default)]
    pub gateway_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AdminConfig {
    /// Env var holding the shared admin secret that gates the admin and
    /// settlement endpoints.
    pub secret_env: String,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
