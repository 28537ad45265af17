//! Push notification dispatch.
//!
//! The settlement loop tells users when a bet resolves. Delivery is the
//! job of an external gateway that owns the subscription records (and
//! purges dead ones on 410 responses); this module only posts the
//! payload and reports failure to the caller, which logs and moves on.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::debug;

use crate::types::{Bet, BetOutcome};

/// Relative URL users land on from a settlement notification.
const MY_BETS_URL: &str = "/my-bets";

/// Notification hook invoked after a user bet settles.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn bet_settled(
        &self,
        email: &str,
        bet: &Bet,
        outcome: BetOutcome,
        profit: Decimal,
    ) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Push gateway
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BetNotification<'a> {
    email: &'a str,
    title: &'a str,
    body: String,
    url: &'a str,
    bet_id: &'a str,
}

pub struct PushGateway {
    http: Client,
    base_url: String,
    secret: SecretString,
}

impl PushGateway {
    pub fn new(base_url: String, secret: String) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to build push gateway HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret: SecretString::new(secret),
        })
    }

    fn notification<'a>(
        email: &'a str,
        bet: &'a Bet,
        outcome: BetOutcome,
        profit: Decimal,
    ) -> BetNotification<'a> {
        let (title, body) = match outcome {
            BetOutcome::Won => (
                "Bet won!",
                format!("{} - {} (+{:.2})", bet.label(), bet.selection, profit),
            ),
            _ => ("Bet lost", format!("{} - {}", bet.label(), bet.selection)),
        };

        BetNotification {
            email,
            title,
            body,
            url: MY_BETS_URL,
            bet_id: &bet.id,
        }
    }
}

#[async_trait]
impl Notifier for PushGateway {
    async fn bet_settled(
        &self,
        email: &str,
        bet: &Bet,
        outcome: BetOutcome,
        profit: Decimal,
    ) -> Result<()> {
        let payload = Self::notification(email, bet, outcome, profit);

        let response = self
            .http
            .post(format!("{}/api/push/notify", self.base_url))
            .query(&[("key", self.secret.expose_secret())])
            .json(&payload)
            .send()
            .await
            .context("Push gateway request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("Push gateway answered HTTP {status}");
        }

        debug!(email, bet_id = %bet.id, "Push notification sent");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// No-op notifier
// ---------------------------------------------------------------------------

/// Used in dry-run mode and tests: settlements are logged, nobody is
/// notified.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn bet_settled(
        &self,
        email: &str,
        bet: &Bet,
        outcome: BetOutcome,
        _profit: Decimal,
    ) -> Result<()> {
        debug!(email, bet_id = %bet.id, outcome = %outcome, "Notification suppressed (no gateway)");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BetStatus, TicketType};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn sample_bet() -> Bet {
        Bet {
            id: "bet_9".into(),
            user_email: "user@example.com".into(),
            fixture_id: None,
            home_team: "Lens".into(),
            away_team: "Lille".into(),
            league: "Ligue 1".into(),
            date: "2026-08-01".into(),
            ticket_type: TicketType::Fun,
            market: "Over 2.5".into(),
            selection: "Over 2.5".into(),
            odds: dec!(2.0),
            stake: dec!(5),
            potential_win: dec!(10),
            status: BetStatus::Pending,
            created_at: Utc::now(),
            settled_at: None,
            verified_by: None,
        }
    }

    #[test]
    fn test_won_notification_mentions_profit() {
        let bet = sample_bet();
        let n = PushGateway::notification("user@example.com", &bet, BetOutcome::Won, dec!(5));
        assert_eq!(n.title, "Bet won!");
        assert!(n.body.contains("+5.00"));
        assert_eq!(n.bet_id, "bet_9");
    }

    #[test]
    fn test_lost_notification_omits_profit() {
        let bet = sample_bet();
        let n = PushGateway::notification("user@example.com", &bet, BetOutcome::Lost, dec!(-5));
        assert_eq!(n.title, "Bet lost");
        assert!(!n.body.contains("-5"));
    }

    #[test]
    fn test_notification_serializes_camel_case() {
        let bet = sample_bet();
        let n = PushGateway::notification("user@example.com", &bet, BetOutcome::Won, dec!(5));
        let json = serde_json::to_string(&n).unwrap();
        assert!(json.contains("betId"));
        assert!(json.contains("/my-bets"));
    }

    #[tokio::test]
    async fn test_noop_notifier_always_succeeds() {
        let bet = sample_bet();
        let result = NoopNotifier
            .bet_settled("user@example.com", &bet, BetOutcome::Won, dec!(5))
            .await;
        assert!(result.is_ok());
    }
}
