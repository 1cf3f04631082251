//! Preference store.
//!
//! In-memory source of truth for who is subscribed to what, mirrored to
//! the persistence port on every mutation. The map lock is never held
//! across an await: mutations are applied in memory first, then
//! persisted, and rolled back if the persist fails so memory and disk
//! never silently diverge.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::lock;
use crate::storage::SubscriptionRepo;
use crate::types::{Channel, SentryError, UserSubscription};

pub struct PreferenceStore {
    users: Mutex<HashMap<String, UserSubscription>>,
    repo: Arc<dyn SubscriptionRepo>,
}

impl PreferenceStore {
    pub fn new(repo: Arc<dyn SubscriptionRepo>) -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
            repo,
        }
    }

    /// Populate the in-memory map from the persistence port.
    ///
    /// Idempotent: entries already present are left untouched, so a
    /// re-invocation never duplicates or clobbers live state.
    pub async fn load(&self) -> Result<usize> {
        let subs = self.repo.get_all().await.context("Failed to load subscriptions")?;
        let mut users = lock(&self.users);
        let mut added = 0;
        for sub in subs {
            if !users.contains_key(&sub.username) {
                users.insert(sub.username.clone(), sub);
                added += 1;
            }
        }
        info!(loaded = added, total = users.len(), "Preference store loaded");
        Ok(added)
    }

    /// Create a subscription row with the default watchlist if absent.
    /// No-op when the user already exists.
    pub async fn add_user(&self, username: &str, chat_id: i64) -> Result<()> {
        let sub = {
            let mut users = lock(&self.users);
            if users.contains_key(username) {
                return Ok(());
            }
            let sub = UserSubscription::new(username, chat_id);
            users.insert(username.to_string(), sub.clone());
            sub
        };

        if let Err(e) = self.repo.upsert(&sub).await {
            lock(&self.users).remove(username);
            warn!(user = username, error = %e, "Failed to persist new user, rolled back");
            return Err(e);
        }
        info!(user = username, chat_id, "User registered");
        Ok(())
    }

    /// Append a symbol to the user's watchlist.
    ///
    /// Returns true iff the symbol was absent and is now tracked. Symbol
    /// validity is not checked here: an unknown ticker just never
    /// resolves to a price snapshot later.
    pub async fn add_coin(&self, symbol: &str, username: &str) -> Result<bool> {
        let symbol = symbol.to_uppercase();
        {
            let mut users = lock(&self.users);
            let sub = users
                .get_mut(username)
                .ok_or_else(|| SentryError::UnknownUser(username.to_string()))?;
            if sub.watchlist.iter().any(|s| *s == symbol) {
                return Ok(false);
            }
            sub.watchlist.push(symbol.clone());
        }

        if let Err(e) = self.repo.add_coin(username, &symbol).await {
            if let Some(sub) = lock(&self.users).get_mut(username) {
                sub.watchlist.retain(|s| *s != symbol);
            }
            warn!(user = username, %symbol, error = %e, "Failed to persist coin add, rolled back");
            return Err(e);
        }
        debug!(user = username, %symbol, "Coin added to watchlist");
        Ok(true)
    }

    /// Remove a symbol from the user's watchlist.
    ///
    /// Returns true iff the symbol was present and is now gone.
    pub async fn remove_coin(&self, symbol: &str, username: &str) -> Result<bool> {
        let symbol = symbol.to_uppercase();
        let restore_at = {
            let mut users = lock(&self.users);
            let sub = users
                .get_mut(username)
                .ok_or_else(|| SentryError::UnknownUser(username.to_string()))?;
            match sub.watchlist.iter().position(|s| *s == symbol) {
                None => return Ok(false),
                Some(idx) => {
                    sub.watchlist.remove(idx);
                    idx
                }
            }
        };

        if let Err(e) = self.repo.remove_coin(username, &symbol).await {
            if let Some(sub) = lock(&self.users).get_mut(username) {
                let at = restore_at.min(sub.watchlist.len());
                sub.watchlist.insert(at, symbol.clone());
            }
            warn!(user = username, %symbol, error = %e, "Failed to persist coin removal, rolled back");
            return Err(e);
        }
        debug!(user = username, %symbol, "Coin removed from watchlist");
        Ok(true)
    }

    /// Set a channel flag.
    ///
    /// Returns true iff the flag was false and is now set; false means
    /// the user is already subscribed and nothing was mutated or
    /// persisted.
    pub async fn set_flag(&self, channel: Channel, username: &str) -> Result<bool> {
        {
            let mut users = lock(&self.users);
            let sub = users
                .get_mut(username)
                .ok_or_else(|| SentryError::UnknownUser(username.to_string()))?;
            if sub.is_subscribed(channel) {
                return Ok(false);
            }
            sub.set_channel(channel, true);
        }

        if let Err(e) = self.repo.set_flag(username, channel, true).await {
            if let Some(sub) = lock(&self.users).get_mut(username) {
                sub.set_channel(channel, false);
            }
            warn!(user = username, %channel, error = %e, "Failed to persist flag, rolled back");
            return Err(e);
        }
        info!(user = username, %channel, "Channel subscribed");
        Ok(true)
    }

    /// Clear a channel flag. Counterpart of `set_flag` for unsubscribe.
    pub async fn clear_flag(&self, channel: Channel, username: &str) -> Result<bool> {
        {
            let mut users = lock(&self.users);
            let sub = users
                .get_mut(username)
                .ok_or_else(|| SentryError::UnknownUser(username.to_string()))?;
            if !sub.is_subscribed(channel) {
                return Ok(false);
            }
            sub.set_channel(channel, false);
        }

        if let Err(e) = self.repo.set_flag(username, channel, false).await {
            if let Some(sub) = lock(&self.users).get_mut(username) {
                sub.set_channel(channel, true);
            }
            warn!(user = username, %channel, error = %e, "Failed to persist flag clear, rolled back");
            return Err(e);
        }
        info!(user = username, %channel, "Channel unsubscribed");
        Ok(true)
    }

    // -- Read accessors --------------------------------------------------

    pub fn contains(&self, username: &str) -> bool {
        lock(&self.users).contains_key(username)
    }

    /// The user's watchlist, in tracked order.
    pub fn watchlist(&self, username: &str) -> Result<Vec<String>> {
        lock(&self.users)
            .get(username)
            .map(|sub| sub.watchlist.clone())
            .ok_or_else(|| SentryError::UnknownUser(username.to_string()).into())
    }

    pub fn chat_id(&self, username: &str) -> Result<i64> {
        lock(&self.users)
            .get(username)
            .map(|sub| sub.chat_id)
            .ok_or_else(|| SentryError::UnknownUser(username.to_string()).into())
    }

    /// A point-in-time copy of every subscription (startup registration).
    pub fn snapshot_all(&self) -> Vec<UserSubscription> {
        let mut subs: Vec<UserSubscription> = lock(&self.users).values().cloned().collect();
        subs.sort_by(|a, b| a.username.cmp(&b.username));
        subs
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
