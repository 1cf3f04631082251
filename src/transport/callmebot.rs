//! CallMeBot voice-call integration.
//!
//! API docs: https://www.callmebot.com/blog/
//! Base URL: http://api.callmebot.com/start.php
//! Auth: none — the user authorizes the bot once from their own
//! Telegram account; calls are addressed by @username.
//! Rate limit: roughly one call per user per 65 seconds, which is why
//! the calls channel ticks at 81s.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::Caller;

const BASE_URL: &str = "http://api.callmebot.com";
const TRANSPORT_NAME: &str = "callmebot";

/// CallMeBot text-to-speech calling client.
pub struct CallMeBotClient {
    http: Client,
    base_url: String,
    /// Text-to-speech voice, e.g. "en-US-Standard-E".
    lang: String,
    /// How many times the text is repeated during the call.
    repeat: u32,
}

impl CallMeBotClient {
    pub fn new(lang: String, repeat: u32) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("COINSENTRY/0.1.0 (crypto-alert-bot)")
            .build()
            .context("Failed to build HTTP client for CallMeBot")?;

        Ok(Self {
            http,
            base_url: BASE_URL.to_string(),
            lang,
            repeat,
        })
    }

    /// Point the client at a different base URL (test servers).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn call_url(&self, username: &str, text: &str) -> String {
        format!(
            "{}/start.php?user={}&text={}&lang={}&rpt={}",
            self.base_url,
            urlencoding::encode(&format!("@{username}")),
            urlencoding::encode(text),
            urlencoding::encode(&self.lang),
            self.repeat,
        )
    }
}

#[async_trait]
impl Caller for CallMeBotClient {
    async fn place_call(&self, username: &str, text: &str) -> Result<()> {
        let url = self.call_url(username, text);
        debug!(user = username, "Placing voice call");

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .context("CallMeBot request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("{TRANSPORT_NAME} API error {status}: {body}");
        }

        debug!(user = username, "Voice call accepted");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
