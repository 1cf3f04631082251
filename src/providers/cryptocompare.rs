//! CryptoCompare integration: prices and news.
//!
//! API docs: https://min-api.cryptocompare.com/documentation
//! Base URL: https://min-api.cryptocompare.com
//! Auth: optional API key via `api_key` query param (free tier works
//! unauthenticated at this bot's request volume).

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use super::{NewsProvider, PriceProvider};
use crate::types::{NewsArticle, PriceSnapshot};

const BASE_URL: &str = "https://min-api.cryptocompare.com";
const PROVIDER_NAME: &str = "cryptocompare";

/// Quote currency all prices are requested in.
const QUOTE_CURRENCY: &str = "USD";

// ---------------------------------------------------------------------------
// API response types (CryptoCompare JSON → Rust)
// ---------------------------------------------------------------------------

/// `/data/pricemultifull` — only the RAW block is needed; the DISPLAY
/// block duplicates it as preformatted strings.
#[derive(Debug, Deserialize)]
struct PriceMultiFullResponse {
    #[serde(default, rename = "RAW")]
    raw: HashMap<String, HashMap<String, RawQuote>>,
}

#[derive(Debug, Deserialize)]
struct RawQuote {
    #[serde(default, rename = "PRICE")]
    price: f64,
    #[serde(default, rename = "CHANGEPCTHOUR")]
    change_pct_hour: f64,
    #[serde(default, rename = "CHANGEPCT24HOUR")]
    change_pct_day: f64,
}

/// `/data/v2/news/` — articles under `Data`, newest first.
#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(default, rename = "Data")]
    data: Vec<NewsItem>,
}

#[derive(Debug, Deserialize)]
struct NewsItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// CryptoCompare client serving both the price and news ports.
pub struct CryptoCompareClient {
    http: Client,
    base_url: String,
    /// Optional API key appended to price requests.
    api_key: Option<String>,
}

impl CryptoCompareClient {
    pub fn new(api_key: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("COINSENTRY/0.1.0 (crypto-alert-bot)")
            .build()
            .context("Failed to build HTTP client for CryptoCompare")?;

        Ok(Self {
            http,
            base_url: BASE_URL.to_string(),
            api_key,
        })
    }

    /// Point the client at a different base URL (test servers).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T> {
        debug!(url = %url, "Fetching from CryptoCompare");

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .context("CryptoCompare API request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("{PROVIDER_NAME} API error {status}: {body}");
        }

        resp.json::<T>()
            .await
            .context("Failed to parse CryptoCompare response")
    }

    fn snapshots_from(resp: PriceMultiFullResponse) -> HashMap<String, PriceSnapshot> {
        resp.raw
            .into_iter()
            .filter_map(|(symbol, quotes)| {
                let quote = quotes.get(QUOTE_CURRENCY)?;
                Some((
                    symbol.clone(),
                    PriceSnapshot {
                        symbol,
                        price: quote.price,
                        change_hour: quote.change_pct_hour,
                        change_day: quote.change_pct_day,
                    },
                ))
            })
            .collect()
    }
}

#[async_trait]
impl PriceProvider for CryptoCompareClient {
    async fn fetch_multi(&self, symbols: &[String]) -> Result<HashMap<String, PriceSnapshot>> {
        if symbols.is_empty() {
            return Ok(HashMap::new());
        }

        let mut url = format!(
            "{}/data/pricemultifull?fsyms={}&tsyms={}",
            self.base_url,
            urlencoding::encode(&symbols.join(",")),
            QUOTE_CURRENCY,
        );
        if let Some(ref key) = self.api_key {
            url.push_str(&format!("&api_key={}", urlencoding::encode(key)));
        }

        let resp: PriceMultiFullResponse = self.get_json(&url).await?;
        let snapshots = Self::snapshots_from(resp);
        debug!(
            requested = symbols.len(),
            resolved = snapshots.len(),
            "Price snapshots fetched"
        );
        Ok(snapshots)
    }
}

#[async_trait]
impl NewsProvider for CryptoCompareClient {
    async fn fetch_latest(&self) -> Result<Vec<NewsArticle>> {
        let url = format!("{}/data/v2/news/?lang=EN", self.base_url);
        let resp: NewsResponse = self.get_json(&url).await?;

        let articles: Vec<NewsArticle> = resp
            .data
            .into_iter()
            .filter(|item| !item.title.is_empty() && !item.url.is_empty())
            .map(|item| NewsArticle {
                title: item.title,
                url: item.url,
            })
            .collect();
        debug!(count = articles.len(), "News articles fetched");
        Ok(articles)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
