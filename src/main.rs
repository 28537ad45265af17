//! TIPSTER: Football betting tips settlement service
//!
//! Entry point. Loads configuration, initialises structured logging,
//! wires the key-value store and the outbound clients, and serves the
//! HTTP API until shutdown.

use anyhow::Result;
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{info, warn};

use tipster::api::{self, ServiceState};
use tipster::config::AppConfig;
use tipster::data::fixtures::ApiFootballClient;
use tipster::data::FixtureSource;
use tipster::llm::groq::GroqDrafter;
use tipster::llm::perplexity::PerplexityVerifier;
use tipster::llm::{BetVerifier, TipsDrafter};
use tipster::notify::{Notifier, NoopNotifier, PushGateway};
use tipster::settlement::bankroll::{KellyConfig, Ledger};
use tipster::store::memory::MemoryStore;
use tipster::store::upstash::UpstashStore;
use tipster::store::KvStore;

const BANNER: &str = r#"
 _____ ___ ____  ____ _____ _____ ____
|_   _|_ _|  _ \/ ___|_   _| ____|  _ \
  | |  | || |_) \___ \ | | |  _| | |_) |
  | |  | ||  __/ ___) || | | |___|  _ <
  |_| |___|_|   |____/ |_| |_____|_| \_\

  Betting Tips Settlement Service
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Load configuration from TOML
    let cfg = AppConfig::load("config.toml")?;

    // Initialise structured logging
    init_logging();

    // Print startup banner
    println!("{BANNER}");
    info!(
        port = cfg.server.port,
        initial_bankroll = %cfg.staking.initial_bankroll,
        "TIPSTER starting up"
    );

    // -- Store -----------------------------------------------------------

    let store_url = std::env::var(&cfg.store.url_env).ok();
    let store_token = std::env::var(&cfg.store.token_env).ok();

    let store: Arc<dyn KvStore> = match (store_url, store_token) {
        (Some(url), Some(token)) => {
            info!("Using hosted key-value store");
            Arc::new(UpstashStore::new(url, token)?)
        }
        _ => {
            warn!("Store credentials missing, running with the in-memory store (dry-run)");
            Arc::new(MemoryStore::new())
        }
    };

    // -- Outbound clients -------------------------------------------------

    let fixtures_key = std::env::var(&cfg.fixtures.api_key_env).ok();
    if fixtures_key.is_none() {
        warn!("No fixtures API key configured, system picks cannot settle");
    }
    let fixtures: Arc<dyn FixtureSource> = Arc::new(ApiFootballClient::new(
        fixtures_key,
        cfg.fixtures.league_ids.clone(),
        cfg.fixtures.timezone.clone(),
    )?);

    let verifier_key = std::env::var(&cfg.llm.verifier_api_key_env).ok();
    if verifier_key.is_none() {
        warn!("No verifier API key configured, user bets stay pending");
    }
    let verifier: Arc<dyn BetVerifier> = Arc::new(PerplexityVerifier::new(
        verifier_key,
        Some(cfg.llm.verifier_model.clone()),
        Some(cfg.llm.max_tokens.min(100)),
    )?);

    let drafter_key = std::env::var(&cfg.llm.drafter_api_key_env).ok();
    let drafter: Arc<dyn TipsDrafter> = Arc::new(GroqDrafter::new(
        drafter_key,
        Some(cfg.llm.drafter_model.clone()),
        Some(cfg.llm.max_tokens),
    )?);

    // The admin secret gates settlement and draft management. Without
    // one in the environment the endpoints stay unreachable for this
    // run.
    let admin_secret = AppConfig::resolve_env(&cfg.admin.secret_env).unwrap_or_else(|_| {
        warn!(
            env = %cfg.admin.secret_env,
            "Admin secret not set, generating a random one for this run"
        );
        uuid::Uuid::new_v4().to_string()
    });

    let notifier: Arc<dyn Notifier> = match &cfg.notify.gateway_url {
        Some(url) => {
            info!(gateway = %url, "Push notifications enabled");
            Arc::new(PushGateway::new(url.clone(), admin_secret.clone())?)
        }
        None => {
            warn!("No push gateway configured, settlement notifications are logged only");
            Arc::new(NoopNotifier)
        }
    };

    // -- Shared state and server ------------------------------------------

    let ledger = Ledger::new(store.clone(), cfg.staking.initial_bankroll);
    let kelly = KellyConfig {
        multiplier: cfg.staking.kelly_multiplier,
        max_fraction: cfg.staking.max_stake_fraction,
    };

    let state = Arc::new(ServiceState {
        store,
        fixtures,
        verifier,
        drafter,
        notifier,
        ledger,
        kelly,
        staking: cfg.staking.clone(),
        admin_secret: SecretString::new(admin_secret),
    });

    api::serve(state, cfg.server.port).await?;

    info!("TIPSTER shut down cleanly.");
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tipster=info"));

    let json_logging = std::env::var("TIPSTER_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
