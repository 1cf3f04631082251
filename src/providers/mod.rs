//! Market data providers.
//!
//! Defines the price and news ports the notification engine consumes.
//! The production implementation for both is CryptoCompare.

pub mod cryptocompare;

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

use crate::types::{NewsArticle, PriceSnapshot};

/// Abstraction over the spot-price feed.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Fetch snapshots for the given symbols, keyed by symbol.
    ///
    /// Partial and empty results are valid: a symbol the provider does
    /// not know is simply absent from the map, never an error.
    async fn fetch_multi(&self, symbols: &[String]) -> Result<HashMap<String, PriceSnapshot>>;
}

/// Abstraction over the headline feed.
#[async_trait]
pub trait NewsProvider: Send + Sync {
    /// Latest articles, newest first.
    async fn fetch_latest(&self) -> Result<Vec<NewsArticle>>;
}
