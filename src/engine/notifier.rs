//! Notification engine.
//!
//! Executed on each job tick: reads the watchlist from the preference
//! store, fetches price/news data through the provider ports, renders
//! the outbound text, and dispatches via the transport ports. The calls
//! channel additionally consults the throttle before dispatching, and a
//! single tick never places more than one call.

use anyhow::Result;
use chrono::{Local, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::engine::throttle::ThrottleGuard;
use crate::providers::{NewsProvider, PriceProvider};
use crate::store::PreferenceStore;
use crate::transport::{Caller, Messenger, SendOptions};
use crate::types::JobContext;

/// Headlines included in one news digest.
const NEWS_DIGEST_SIZE: usize = 5;

/// Characters MarkdownV2 treats as syntax; prefixed with a backslash.
const MARKDOWN_ESCAPED: &str = "]\\^$*._[()~`>+=|{}!#";

pub struct NotificationEngine {
    store: Arc<PreferenceStore>,
    throttle: Arc<ThrottleGuard>,
    prices: Arc<dyn PriceProvider>,
    news: Arc<dyn NewsProvider>,
    messenger: Arc<dyn Messenger>,
    caller: Arc<dyn Caller>,
}

impl NotificationEngine {
    pub fn new(
        store: Arc<PreferenceStore>,
        throttle: Arc<ThrottleGuard>,
        prices: Arc<dyn PriceProvider>,
        news: Arc<dyn NewsProvider>,
        messenger: Arc<dyn Messenger>,
        caller: Arc<dyn Caller>,
    ) -> Self {
        Self {
            store,
            throttle,
            prices,
            news,
            messenger,
            caller,
        }
    }

    /// Run one tick for the given job context. Failures are logged and
    /// swallowed: the next scheduled tick is the retry.
    pub async fn run_tick(&self, ctx: &JobContext) {
        let result = match ctx {
            JobContext::Updates { chat_id, username } => {
                self.updates_tick(*chat_id, username).await
            }
            JobContext::Calls { username } => self.calls_tick(username).await,
            JobContext::News { chat_id } => self.news_tick(*chat_id).await,
        };
        if let Err(e) = result {
            warn!(channel = %ctx.channel(), target = %ctx.target(), error = %e, "Tick failed");
        }
    }

    // -- Updates channel -------------------------------------------------

    /// Render the price digest for a user's watchlist.
    ///
    /// Symbols the provider doesn't resolve are simply absent — partial
    /// results degrade to a shorter message, never an error.
    pub async fn price_digest(&self, username: &str) -> Result<String> {
        let watchlist = self.store.watchlist(username)?;
        let snapshots = self.prices.fetch_multi(&watchlist).await?;

        let mut message = format!("⌚ Timestamp: {}\n\n", current_time());
        for symbol in &watchlist {
            let Some(snap) = snapshots.get(symbol) else {
                continue;
            };
            let hour_arrow = if snap.change_hour > 0.0 { "📈" } else { "📉" };
            let day_arrow = if snap.change_day > 0.0 { "📈" } else { "📉" };
            message.push_str(&format!(
                "🪙 Coin: {}\n🚀 Price: ${}\n{} Hour Change: {:.3}%\n{} Day Change: {:.3}%\n\n",
                snap.symbol,
                format_usd(snap.price),
                hour_arrow,
                snap.change_hour,
                day_arrow,
                snap.change_day,
            ));
        }
        Ok(message)
    }

    pub async fn updates_tick(&self, chat_id: i64, username: &str) -> Result<()> {
        let message = self.price_digest(username).await?;
        self.messenger
            .send_message(chat_id, &message, &SendOptions::default())
            .await
    }

    // -- Calls channel ---------------------------------------------------

    /// Check the user's watchlist for a drastic 24h move and place at
    /// most one call.
    ///
    /// Symbols are walked in watchlist order; the first one the throttle
    /// approves gets the call and ends the tick, so simultaneous
    /// qualifying moves on several coins still produce a single call. A
    /// dispatch failure is logged but the cooldown stays armed — the
    /// decision, not the delivery, consumes the alert.
    pub async fn calls_tick(&self, username: &str) -> Result<()> {
        let watchlist = self.store.watchlist(username)?;
        let snapshots = self.prices.fetch_multi(&watchlist).await?;
        let now = Utc::now().timestamp();

        for symbol in &watchlist {
            let Some(snap) = snapshots.get(symbol) else {
                continue;
            };
            if !self.throttle.evaluate(symbol, snap.change_day, now) {
                continue;
            }

            let direction = if snap.change_day > 0.0 { "increased" } else { "decreased" };
            let text = format!(
                "{} has {} in price by {:.3} percent today",
                symbol, direction, snap.change_day,
            );
            info!(user = username, %symbol, change = snap.change_day, "Placing alert call");
            if let Err(e) = self.caller.place_call(username, &text).await {
                warn!(user = username, %symbol, error = %e, "Call dispatch failed");
            }
            return Ok(());
        }
        Ok(())
    }

    // -- News channel ----------------------------------------------------

    /// Render the news digest: the top headlines as a timestamped
    /// MarkdownV2 list of title+link.
    pub async fn news_digest(&self) -> Result<String> {
        let articles = self.news.fetch_latest().await?;

        let mut message = format!("🗞️ Your news at: {}\n\n", current_time());
        for article in articles.iter().take(NEWS_DIGEST_SIZE) {
            message.push_str(&format!(
                "➡️ [{}]({})\n\n",
                escape_markdown(&article.title),
                article.url,
            ));
        }
        Ok(message)
    }

    pub async fn news_tick(&self, chat_id: i64) -> Result<()> {
        let message = self.news_digest().await?;
        self.messenger
            .send_message(chat_id, &message, &SendOptions::markdown_no_preview())
            .await
    }
}

/// Wall-clock timestamp used in digest headers.
fn current_time() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

/// Format a USD amount with thousands separators and two decimals.
fn format_usd(amount: f64) -> String {
    let formatted = format!("{amount:.2}");
    let (int_part, frac_part) = formatted.split_once('.').unwrap_or((&formatted, "00"));
    let (sign, digits) = match int_part.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", int_part),
    };

    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("{sign}{grouped}.{frac_part}")
}

/// Escape a headline for Telegram MarkdownV2.
///
/// Matches the original bot's translation table, including its quirk of
/// turning spaces and hyphens into escaped hyphens.
fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 2);
    for c in text.chars() {
        match c {
            ' ' | '-' => out.push_str("\\-"),
            c if MARKDOWN_ESCAPED.contains(c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
