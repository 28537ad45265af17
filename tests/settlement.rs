//! End-to-end settlement scenarios against the in-memory store.
//!
//! Drives the real router and reconciler with stub collaborators: a
//! fixture source backed by a map, a scripted verifier, and a counting
//! notifier.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use secrecy::SecretString;
use tower::ServiceExt;

use tipster::api::{build_router, AppState, ServiceState};
use tipster::config::StakingConfig;
use tipster::data::FixtureSource;
use tipster::llm::{BetVerifier, TipsDrafter};
use tipster::notify::Notifier;
use tipster::settlement::bankroll::{KellyConfig, Ledger};
use tipster::store::memory::MemoryStore;
use tipster::store::{get_json, keys, set_json, KvStore};
use tipster::types::{
    Bet, BetOutcome, BetStatus, DailyTips, FixtureSnapshot, FixtureStatus, Pick, Staking,
    StakingLabel,
};

// ---------------------------------------------------------------------------
// Stub collaborators
// ---------------------------------------------------------------------------

/// Fixture source backed by a map of canned snapshots.
#[derive(Default)]
struct StubFixtures {
    fixtures: HashMap<u64, FixtureSnapshot>,
}

impl StubFixtures {
    fn with(mut self, fixture: FixtureSnapshot) -> Self {
        self.fixtures.insert(fixture.id, fixture);
        self
    }
}

#[async_trait]
impl FixtureSource for StubFixtures {
    async fn fixture_by_id(&self, id: u64) -> Result<Option<FixtureSnapshot>> {
        Ok(self.fixtures.get(&id).cloned())
    }

    async fn fixtures_by_date(&self, _date: &str) -> Result<Vec<FixtureSnapshot>> {
        Ok(self.fixtures.values().cloned().collect())
    }
}

/// Verifier that answers from a script keyed by bet id. Ids listed in
/// `failing` return an error instead.
#[derive(Default)]
struct ScriptedVerifier {
    outcomes: HashMap<String, BetOutcome>,
    failing: Vec<String>,
}

impl ScriptedVerifier {
    fn verdict(mut self, bet_id: &str, outcome: BetOutcome) -> Self {
        self.outcomes.insert(bet_id.to_string(), outcome);
        self
    }

    fn fails_on(mut self, bet_id: &str) -> Self {
        self.failing.push(bet_id.to_string());
        self
    }
}

#[async_trait]
impl BetVerifier for ScriptedVerifier {
    async fn verify_bet(&self, bet: &Bet) -> Result<BetOutcome> {
        if self.failing.contains(&bet.id) {
            return Err(anyhow!("verification unavailable for {}", bet.id));
        }
        Ok(*self.outcomes.get(&bet.id).unwrap_or(&BetOutcome::Pending))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Drafter that is never expected to be called.
struct UnusedDrafter;

#[async_trait]
impl TipsDrafter for UnusedDrafter {
    async fn draft_tips(&self, _date: &str, _fixtures: &[FixtureSnapshot]) -> Result<DailyTips> {
        Err(anyhow!("drafter should not be called in this test"))
    }

    fn model_name(&self) -> &str {
        "unused"
    }
}

/// Counts notifications instead of delivering them.
#[derive(Default)]
struct CountingNotifier {
    sent: AtomicUsize,
}

#[async_trait]
impl Notifier for CountingNotifier {
    async fn bet_settled(
        &self,
        _email: &str,
        _bet: &Bet,
        _outcome: BetOutcome,
        _profit: Decimal,
    ) -> Result<()> {
        self.sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

const USER_COOKIES: &str = "session=abc123; user_email=punter@example.com";
const USER_EMAIL: &str = "punter@example.com";

fn build_state(
    fixtures: StubFixtures,
    verifier: ScriptedVerifier,
    notifier: Arc<CountingNotifier>,
) -> AppState {
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());

    Arc::new(ServiceState {
        store: store.clone(),
        fixtures: Arc::new(fixtures),
        verifier: Arc::new(verifier),
        drafter: Arc::new(UnusedDrafter),
        notifier,
        ledger: Ledger::new(store, dec!(100)),
        kelly: KellyConfig::default(),
        staking: StakingConfig {
            initial_bankroll: dec!(100),
            kelly_multiplier: 0.25,
            max_stake_fraction: 0.10,
            default_stake: dec!(5),
            default_odds: dec!(1.5),
        },
        admin_secret: SecretString::new("integration-secret".into()),
    })
}

fn finished_fixture(id: u64, home_goals: u32, away_goals: u32) -> FixtureSnapshot {
    FixtureSnapshot {
        id,
        league: "Premier League".into(),
        home_team: "Arsenal".into(),
        away_team: "Chelsea".into(),
        kickoff: None,
        status: FixtureStatus::Finished,
        home_goals,
        away_goals,
        home_winner: Some(home_goals > away_goals),
        away_winner: Some(away_goals > home_goals),
    }
}

fn pick(fixture_id: u64, market: &str, odds: Decimal, pct: Decimal) -> Pick {
    Pick {
        fixture_id,
        teams: "Arsenal vs Chelsea".into(),
        league: "Premier League".into(),
        market: market.into(),
        selection: String::new(),
        odds,
        staking: Staking { percentage: pct, label: StakingLabel::Standard },
        analysis: String::new(),
        is_vip: false,
    }
}

async fn place_bet(state: &AppState, stake: f64, odds: f64) -> String {
    let body = serde_json::json!({
        "homeTeam": "Lens",
        "awayTeam": "Lille",
        "market": "Over 2.5",
        "selection": "Over 2.5",
        "odds": odds,
        "stake": stake,
    });
    let resp = build_router(state.clone())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/bets")
                .header("cookie", USER_COOKIES)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(resp.into_body(), 1_000_000).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    json["bet"]["id"].as_str().unwrap().to_string()
}

async fn delete_bet(state: &AppState, bet_id: &str) {
    let resp = build_router(state.clone())
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/bets")
                .header("cookie", USER_COOKIES)
                .header("content-type", "application/json")
                .body(Body::from(
                    serde_json::json!({ "betId": bet_id }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

async fn run_settlement(state: &AppState) -> serde_json::Value {
    let resp = build_router(state.clone())
        .oneshot(
            Request::builder()
                .uri("/api/cron/check-results?key=integration-secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(resp.into_body(), 1_000_000).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn user_balance(state: &AppState) -> Decimal {
    state
        .ledger
        .balance(&keys::user_bankroll(USER_EMAIL))
        .await
        .unwrap()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn bankroll_is_conserved_across_place_delete_and_win() {
    let notifier = Arc::new(CountingNotifier::default());
    let state = build_state(
        StubFixtures::default(),
        ScriptedVerifier::default(),
        notifier.clone(),
    );

    // Place bet A (stake 10 at odds 2.0) and delete it while pending.
    let bet_a = place_bet(&state, 10.0, 2.0).await;
    assert_eq!(user_balance(&state).await, dec!(90));
    delete_bet(&state, &bet_a).await;
    assert_eq!(user_balance(&state).await, dec!(100));

    // Place bet B (stake 5 at odds 3.0) and settle it as won.
    let bet_b = place_bet(&state, 5.0, 3.0).await;
    assert_eq!(user_balance(&state).await, dec!(95));

    // The store carries all state, so the verdict script can live in a
    // fresh composition over the same store.
    let verifying_state = Arc::new(ServiceState {
        store: state.store.clone(),
        fixtures: Arc::new(StubFixtures::default()),
        verifier: Arc::new(ScriptedVerifier::default().verdict(&bet_b, BetOutcome::Won)),
        drafter: Arc::new(UnusedDrafter),
        notifier: notifier.clone(),
        ledger: state.ledger.clone(),
        kelly: KellyConfig::default(),
        staking: state.staking.clone(),
        admin_secret: SecretString::new("integration-secret".into()),
    });
    run_settlement(&verifying_state).await;

    // B0 - 10 + 10 - 5 + 15 = B0 + 10.
    assert_eq!(user_balance(&verifying_state).await, dec!(110));
    assert_eq!(notifier.sent.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn mixed_settlement_pass_commits_bankroll_once() {
    let fixtures = StubFixtures::default()
        .with(finished_fixture(1, 3, 0)) // over 2.5: won
        .with(finished_fixture(2, 0, 0)); // over 2.5: lost
    let notifier = Arc::new(CountingNotifier::default());
    let state = build_state(fixtures, ScriptedVerifier::default(), notifier);

    // 5% at odds 2.0 wins +5, 10% loses -10: net -5 on a 100 bankroll.
    set_json(state.store.as_ref(), &keys::pending_pick(1), &pick(1, "Over 2.5 buts", dec!(2.0), dec!(5)))
        .await
        .unwrap();
    set_json(state.store.as_ref(), &keys::pending_pick(2), &pick(2, "Over 2.5 buts", dec!(1.8), dec!(10)))
        .await
        .unwrap();

    let json = run_settlement(&state).await;
    let log: Vec<String> = json["log"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();

    assert!(log.iter().any(|l| l.starts_with("WON")));
    assert!(log.iter().any(|l| l.starts_with("LOST")));
    assert!(log.iter().any(|l| l.contains("Global bankroll updated: 95")));

    assert_eq!(
        state.ledger.balance(keys::GLOBAL_BANKROLL).await.unwrap(),
        dec!(95)
    );
    // Exactly one history snapshot for the whole pass.
    assert_eq!(
        state
            .store
            .lrange(keys::BANKROLL_HISTORY, 0, -1)
            .await
            .unwrap()
            .len(),
        1
    );
    // Markers drained.
    assert!(state.store.keys("pending_pick:*").await.unwrap().is_empty());
}

#[tokio::test]
async fn second_settlement_pass_is_a_no_op() {
    let fixtures = StubFixtures::default().with(finished_fixture(1, 2, 1));
    let state = build_state(
        fixtures,
        ScriptedVerifier::default(),
        Arc::new(CountingNotifier::default()),
    );

    set_json(state.store.as_ref(), &keys::pending_pick(1), &pick(1, "Over 2.5 buts", dec!(2.0), dec!(5)))
        .await
        .unwrap();

    run_settlement(&state).await;
    let after_first = state.ledger.balance(keys::GLOBAL_BANKROLL).await.unwrap();

    let json = run_settlement(&state).await;
    let after_second = state.ledger.balance(keys::GLOBAL_BANKROLL).await.unwrap();

    assert_eq!(after_first, after_second);
    assert_eq!(json["log"][0], "No pending bets to check.");
}

#[tokio::test]
async fn failing_verification_spares_the_rest_of_the_batch() {
    let notifier = Arc::new(CountingNotifier::default());
    let verifier = ScriptedVerifier::default()
        .verdict("bet_a", BetOutcome::Won)
        .fails_on("bet_b")
        .verdict("bet_c", BetOutcome::Lost);
    let state = build_state(StubFixtures::default(), verifier, notifier.clone());

    for id in ["bet_a", "bet_b", "bet_c"] {
        let bet = Bet {
            id: id.into(),
            user_email: USER_EMAIL.into(),
            fixture_id: None,
            home_team: "Lens".into(),
            away_team: "Lille".into(),
            league: "Ligue 1".into(),
            date: "2026-08-01".into(),
            ticket_type: Default::default(),
            market: "Over 2.5".into(),
            selection: "Over 2.5".into(),
            odds: dec!(2.0),
            stake: dec!(5),
            potential_win: dec!(10),
            status: BetStatus::Pending,
            created_at: chrono::Utc::now(),
            settled_at: None,
            verified_by: None,
        };
        set_json(state.store.as_ref(), &keys::pending_user_bet(id), &bet)
            .await
            .unwrap();
        let list = vec![bet];
        set_json(state.store.as_ref(), &keys::user_bets(USER_EMAIL), &list)
            .await
            .unwrap();
    }

    let json = run_settlement(&state).await;
    assert_eq!(json["success"], true);

    let log = json["log"].to_string();
    assert!(log.contains("verification unavailable for bet_b"));

    // Settled markers are gone; the failing one is still queued.
    let remaining = state.store.keys("pending_user_bet:*").await.unwrap();
    assert_eq!(remaining, vec![keys::pending_user_bet("bet_b")]);

    // Two settlements, two notification attempts.
    assert_eq!(notifier.sent.load(Ordering::Relaxed), 2);
}

#[tokio::test]
async fn settled_user_bet_is_marked_as_ai_verified() {
    let verifier = ScriptedVerifier::default().verdict("bet_x", BetOutcome::Won);
    let state = build_state(
        StubFixtures::default(),
        verifier,
        Arc::new(CountingNotifier::default()),
    );

    let bet = Bet {
        id: "bet_x".into(),
        user_email: USER_EMAIL.into(),
        fixture_id: None,
        home_team: "Lens".into(),
        away_team: "Lille".into(),
        league: "Ligue 1".into(),
        date: "2026-08-01".into(),
        ticket_type: Default::default(),
        market: "Double Chance".into(),
        selection: "1X".into(),
        odds: dec!(1.5),
        stake: dec!(10),
        potential_win: dec!(15),
        status: BetStatus::Pending,
        created_at: chrono::Utc::now(),
        settled_at: None,
        verified_by: None,
    };
    set_json(state.store.as_ref(), &keys::pending_user_bet("bet_x"), &bet)
        .await
        .unwrap();
    let list = vec![bet];
    set_json(state.store.as_ref(), &keys::user_bets(USER_EMAIL), &list)
        .await
        .unwrap();

    run_settlement(&state).await;

    let bets: Vec<Bet> = get_json(state.store.as_ref(), &keys::user_bets(USER_EMAIL))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bets[0].status, BetStatus::Won);
    assert_eq!(bets[0].verified_by.as_deref(), Some("heuristic-ai"));
    assert!(bets[0].settled_at.is_some());
}
