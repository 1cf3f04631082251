//! COINSENTRY — Crypto price alert and news notification bot
//!
//! Entry point. Loads configuration, initialises structured logging,
//! restores subscriptions from disk, re-registers the recurring jobs,
//! and runs the Telegram command loop with graceful shutdown.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use coinsentry::bot::{self, Bot};
use coinsentry::config::AppConfig;
use coinsentry::engine::{NotificationEngine, ThrottleGuard};
use coinsentry::providers::cryptocompare::CryptoCompareClient;
use coinsentry::sched::Scheduler;
use coinsentry::storage::JsonFileRepo;
use coinsentry::store::PreferenceStore;
use coinsentry::transport::callmebot::CallMeBotClient;
use coinsentry::transport::telegram::TelegramClient;

const BANNER: &str = r#"
  ____ ___ ___ _   _ ____  _____ _   _ _____ ____ __   __
 / ___/ _ \_ _| \ | / ___|| ____| \ | |_   _|  _ \\ \ / /
| |  | | | | ||  \| \___ \|  _| |  \| | | | | |_) |\ V /
| |__| |_| | || |\  |___) | |___| |\  | | | |  _ <  | |
 \____\___/___|_| \_|____/|_____|_| \_| |_| |_| \_\ |_|

  Crypto price alerts, drastic-change calls, and hot news
  v0.1.0 — Notification Bot
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = AppConfig::load_or_default("config.toml")?;

    init_logging();

    println!("{BANNER}");
    info!(
        bot_name = %cfg.bot.name,
        updates_interval_secs = cfg.schedule.updates_interval_secs,
        calls_interval_secs = cfg.schedule.calls_interval_secs,
        news_interval_secs = cfg.schedule.news_interval_secs,
        "COINSENTRY starting up"
    );

    // -- Restore subscriptions ------------------------------------------

    let repo = Arc::new(JsonFileRepo::new(Some(&cfg.bot.state_file)));
    let store = Arc::new(PreferenceStore::new(repo));
    let loaded = store.load().await?;
    info!(users = loaded, "Subscriptions restored");

    // -- Initialise components ------------------------------------------

    let bot_token = AppConfig::resolve_env(&cfg.telegram.bot_token_env)?;
    let telegram = Arc::new(TelegramClient::new(bot_token)?);

    let api_key = cfg
        .providers
        .cryptocompare_api_key_env
        .as_deref()
        .and_then(|env| std::env::var(env).ok());
    let cryptocompare = Arc::new(CryptoCompareClient::new(api_key)?);

    let callmebot = Arc::new(CallMeBotClient::new(
        cfg.callmebot.lang.clone(),
        cfg.callmebot.repeat,
    )?);

    let throttle = Arc::new(ThrottleGuard::new(
        cfg.alerts.change_threshold_pct,
        cfg.alerts.cooldown_secs,
    ));

    let engine = Arc::new(NotificationEngine::new(
        store.clone(),
        throttle,
        cryptocompare.clone(),
        cryptocompare,
        telegram.clone(),
        callmebot,
    ));

    let sched = Arc::new(Scheduler::new());
    let bot = Arc::new(Bot::new(
        store,
        engine,
        sched.clone(),
        telegram.clone(),
        cfg.schedule.clone(),
    ));

    // Resume the prior schedule: one job per persisted active
    // subscription per channel.
    let jobs = bot.register_startup_jobs();
    info!(jobs, "Resumed recurring jobs");

    // -- Command loop ---------------------------------------------------

    info!("Entering command loop. Press Ctrl+C to stop.");
    tokio::select! {
        _ = bot::poll_loop(bot, telegram, cfg.telegram.poll_timeout_secs) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received.");
        }
    }

    sched.shutdown();
    info!("COINSENTRY shut down cleanly.");
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("coinsentry=info"));

    let json_logging = std::env::var("COINSENTRY_LOG_JSON").is_ok();

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
