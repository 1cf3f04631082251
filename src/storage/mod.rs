//! Persistence layer.
//!
//! Defines the `SubscriptionRepo` port the preference store writes
//! through, plus two implementations: a whole-map JSON file (the
//! production backend — one document per user, rewritten on every
//! mutation) and an in-memory repo for tests.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

use crate::lock;
use crate::types::{Channel, UserSubscription};

// ---------------------------------------------------------------------------
// Port
// ---------------------------------------------------------------------------

/// Abstraction over the durable subscription backend.
///
/// Each mutation is a small delta so a document-store backend can map it
/// onto a partial update ($addToSet / $pull / $set) rather than a full
/// row rewrite.
#[async_trait]
pub trait SubscriptionRepo: Send + Sync {
    /// All persisted subscriptions, in stable order.
    async fn get_all(&self) -> Result<Vec<UserSubscription>>;

    /// Insert or fully replace one subscription row.
    async fn upsert(&self, sub: &UserSubscription) -> Result<()>;

    /// Append a symbol to the user's watchlist.
    async fn add_coin(&self, username: &str, symbol: &str) -> Result<()>;

    /// Remove a symbol from the user's watchlist.
    async fn remove_coin(&self, username: &str, symbol: &str) -> Result<()>;

    /// Set one channel flag.
    async fn set_flag(&self, username: &str, channel: Channel, value: bool) -> Result<()>;
}

// ---------------------------------------------------------------------------
// JSON file repo
// ---------------------------------------------------------------------------

/// Default subscription store path.
const DEFAULT_STATE_FILE: &str = "coinsentry_users.json";

/// File-backed repo: the full username → subscription map as one pretty
/// JSON document, read-modify-written under an internal lock. A missing
/// file means no users yet (fresh start).
pub struct JsonFileRepo {
    path: String,
    // Serializes read-modify-write cycles; fs access itself is blocking
    // but small (one document per user).
    io: Mutex<()>,
}

impl JsonFileRepo {
    pub fn new(path: Option<&str>) -> Self {
        Self {
            path: path.unwrap_or(DEFAULT_STATE_FILE).to_string(),
            io: Mutex::new(()),
        }
    }

    fn read_map(&self) -> Result<HashMap<String, UserSubscription>> {
        if !Path::new(&self.path).exists() {
            info!(path = %self.path, "No subscription file found, starting fresh");
            return Ok(HashMap::new());
        }
        let json = std::fs::read_to_string(&self.path)
            .context(format!("Failed to read subscriptions from {}", self.path))?;
        let map: HashMap<String, UserSubscription> = serde_json::from_str(&json)
            .context(format!("Failed to parse subscriptions from {}", self.path))?;
        Ok(map)
    }

    fn write_map(&self, map: &HashMap<String, UserSubscription>) -> Result<()> {
        let json = serde_json::to_string_pretty(map)
            .context("Failed to serialise subscription map")?;
        std::fs::write(&self.path, &json)
            .context(format!("Failed to write subscriptions to {}", self.path))?;
        debug!(path = %self.path, users = map.len(), "Subscriptions saved");
        Ok(())
    }

    fn mutate<F>(&self, username: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut UserSubscription),
    {
        let _guard = lock(&self.io);
        let mut map = self.read_map()?;
        let sub = map
            .get_mut(username)
            .with_context(|| format!("No persisted subscription for {username}"))?;
        f(sub);
        self.write_map(&map)
    }

    /// Delete the store file (for testing or reset).
    pub fn delete(&self) -> Result<()> {
        if Path::new(&self.path).exists() {
            std::fs::remove_file(&self.path)
                .context(format!("Failed to delete subscription file {}", self.path))?;
        }
        Ok(())
    }
}

#[async_trait]
impl SubscriptionRepo for JsonFileRepo {
    async fn get_all(&self) -> Result<Vec<UserSubscription>> {
        let _guard = lock(&self.io);
        let map = self.read_map()?;
        let mut subs: Vec<UserSubscription> = map.into_values().collect();
        // HashMap order is arbitrary; keep the load order deterministic.
        subs.sort_by(|a, b| a.username.cmp(&b.username));
        info!(users = subs.len(), path = %self.path, "Subscriptions loaded from disk");
        Ok(subs)
    }

    async fn upsert(&self, sub: &UserSubscription) -> Result<()> {
        let _guard = lock(&self.io);
        let mut map = self.read_map()?;
        map.insert(sub.username.clone(), sub.clone());
        self.write_map(&map)
    }

    async fn add_coin(&self, username: &str, symbol: &str) -> Result<()> {
        self.mutate(username, |sub| {
            if !sub.watchlist.iter().any(|s| s == symbol) {
                sub.watchlist.push(symbol.to_string());
            }
        })
    }

    async fn remove_coin(&self, username: &str, symbol: &str) -> Result<()> {
        self.mutate(username, |sub| {
            sub.watchlist.retain(|s| s != symbol);
        })
    }

    async fn set_flag(&self, username: &str, channel: Channel, value: bool) -> Result<()> {
        self.mutate(username, |sub| sub.set_channel(channel, value))
    }
}

// ---------------------------------------------------------------------------
// In-memory repo
// ---------------------------------------------------------------------------

/// In-memory `SubscriptionRepo` for tests and offline runs. Can be told
/// to fail so store rollback paths are exercisable.
#[derive(Default)]
pub struct MemoryRepo {
    map: Mutex<HashMap<String, UserSubscription>>,
    fail_writes: Mutex<bool>,
}

impl MemoryRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed with subscriptions (restart simulations).
    pub fn seeded(subs: Vec<UserSubscription>) -> Self {
        let repo = Self::new();
        {
            let mut map = lock(&repo.map);
            for sub in subs {
                map.insert(sub.username.clone(), sub);
            }
        }
        repo
    }

    /// Make every subsequent write fail.
    pub fn set_fail_writes(&self, fail: bool) {
        *lock(&self.fail_writes) = fail;
    }

    pub fn get(&self, username: &str) -> Option<UserSubscription> {
        lock(&self.map).get(username).cloned()
    }

    fn check_writable(&self) -> Result<()> {
        if *lock(&self.fail_writes) {
            anyhow::bail!("memory repo: writes disabled");
        }
        Ok(())
    }
}

#[async_trait]
impl SubscriptionRepo for MemoryRepo {
    async fn get_all(&self) -> Result<Vec<UserSubscription>> {
        let mut subs: Vec<UserSubscription> = lock(&self.map).values().cloned().collect();
        subs.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(subs)
    }

    async fn upsert(&self, sub: &UserSubscription) -> Result<()> {
        self.check_writable()?;
        lock(&self.map).insert(sub.username.clone(), sub.clone());
        Ok(())
    }

    async fn add_coin(&self, username: &str, symbol: &str) -> Result<()> {
        self.check_writable()?;
        let mut map = lock(&self.map);
        let sub = map
            .get_mut(username)
            .with_context(|| format!("No persisted subscription for {username}"))?;
        if !sub.watchlist.iter().any(|s| s == symbol) {
            sub.watchlist.push(symbol.to_string());
        }
        Ok(())
    }

    async fn remove_coin(&self, username: &str, symbol: &str) -> Result<()> {
        self.check_writable()?;
        let mut map = lock(&self.map);
        let sub = map
            .get_mut(username)
            .with_context(|| format!("No persisted subscription for {username}"))?;
        sub.watchlist.retain(|s| s != symbol);
        Ok(())
    }

    async fn set_flag(&self, username: &str, channel: Channel, value: bool) -> Result<()> {
        self.check_writable()?;
        let mut map = lock(&self.map);
        let sub = map
            .get_mut(username)
            .with_context(|| format!("No persisted subscription for {username}"))?;
        sub.set_channel(channel, value);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
