//! Shared types for the COINSENTRY bot.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that store, scheduler, engine,
//! and transport modules can depend on them without circular references.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// A notification channel a user can subscribe to independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Periodic price digests for the user's watchlist.
    Updates,
    /// Voice-call alerts on drastic 24h price moves.
    Calls,
    /// Periodic headline digests.
    News,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Updates => write!(f, "updates"),
            Channel::Calls => write!(f, "calls"),
            Channel::News => write!(f, "news"),
        }
    }
}

impl Channel {
    /// All channels, in the order startup registration walks them.
    pub const ALL: [Channel; 3] = [Channel::Updates, Channel::Calls, Channel::News];
}

// ---------------------------------------------------------------------------
// UserSubscription
// ---------------------------------------------------------------------------

/// Default watchlist assigned on first contact.
pub const DEFAULT_WATCHLIST: [&str; 3] = ["BTC", "ADA", "DOGE"];

/// A user's subscription row: watchlist plus per-channel opt-in flags.
///
/// Unique per username. Created on `/start` with the default watchlist
/// and all flags false; never deleted at runtime. The watchlist is an
/// ordered, duplicate-free list — the call check walks it in order and
/// fires on the first qualifying symbol, so order is part of behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserSubscription {
    pub username: String,
    /// Telegram chat to deliver messages to.
    pub chat_id: i64,
    pub watchlist: Vec<String>,
    pub updates: bool,
    pub calls: bool,
    pub news: bool,
}

impl UserSubscription {
    /// A fresh subscription with the default watchlist and no channels on.
    pub fn new(username: &str, chat_id: i64) -> Self {
        Self {
            username: username.to_string(),
            chat_id,
            watchlist: DEFAULT_WATCHLIST.iter().map(|s| s.to_string()).collect(),
            updates: false,
            calls: false,
            news: false,
        }
    }

    /// Whether the given channel flag is set.
    pub fn is_subscribed(&self, channel: Channel) -> bool {
        match channel {
            Channel::Updates => self.updates,
            Channel::Calls => self.calls,
            Channel::News => self.news,
        }
    }

    pub fn set_channel(&mut self, channel: Channel, value: bool) {
        match channel {
            Channel::Updates => self.updates = value,
            Channel::Calls => self.calls = value,
            Channel::News => self.news = value,
        }
    }
}

impl fmt::Display for UserSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "@{} (chat {}) [{}] updates={} calls={} news={}",
            self.username,
            self.chat_id,
            self.watchlist.join(","),
            self.updates,
            self.calls,
            self.news,
        )
    }
}

// ---------------------------------------------------------------------------
// PriceSnapshot
// ---------------------------------------------------------------------------

/// Point-in-time price data for one symbol. Produced per tick from the
/// price provider, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSnapshot {
    pub symbol: String,
    /// Spot price in USD.
    pub price: f64,
    /// Percent change over the last hour.
    pub change_hour: f64,
    /// Percent change over the last 24 hours.
    pub change_day: f64,
}

impl fmt::Display for PriceSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: ${:.2} (1h {:+.3}% | 24h {:+.3}%)",
            self.symbol, self.price, self.change_hour, self.change_day,
        )
    }
}

// ---------------------------------------------------------------------------
// NewsArticle
// ---------------------------------------------------------------------------

/// A headline from the news provider, already ordered newest-first.
#[derive(Debug, Clone, PartialEq)]
pub struct NewsArticle {
    pub title: String,
    pub url: String,
}

// ---------------------------------------------------------------------------
// Job context
// ---------------------------------------------------------------------------

/// Per-channel payload carried by a recurring job: exactly the fields that
/// channel's handler needs, as a tagged variant rather than loose values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobContext {
    Updates { chat_id: i64, username: String },
    Calls { username: String },
    News { chat_id: i64 },
}

impl JobContext {
    pub fn channel(&self) -> Channel {
        match self {
            JobContext::Updates { .. } => Channel::Updates,
            JobContext::Calls { .. } => Channel::Calls,
            JobContext::News { .. } => Channel::News,
        }
    }

    /// The scheduler key this context registers under.
    ///
    /// Updates and calls jobs are keyed by username; news jobs by chat id
    /// (a chat receives one news digest regardless of who enabled it).
    pub fn target(&self) -> String {
        match self {
            JobContext::Updates { username, .. } => username.clone(),
            JobContext::Calls { username } => username.clone(),
            JobContext::News { chat_id } => chat_id.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for COINSENTRY.
#[derive(Debug, thiserror::Error)]
pub enum SentryError {
    #[error("job already registered for {channel}/{target}")]
    AlreadyRegistered { channel: Channel, target: String },

    #[error("unknown user: {0}")]
    UnknownUser(String),

    #[error("provider error ({provider}): {message}")]
    Provider { provider: String, message: String },

    #[error("transport error ({transport}): {message}")]
    Transport { transport: String, message: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
