//! Telegram Bot API integration.
//!
//! API docs: https://core.telegram.org/bots/api
//! Base URL: https://api.telegram.org/bot{token}
//! Auth: bot token in the URL path.
//!
//! Outbound: `sendMessage` (the `Messenger` port). Inbound: `getUpdates`
//! long polling, consumed by the command loop in the bot module.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{Messenger, SendOptions};

const BASE_URL: &str = "https://api.telegram.org";
const TRANSPORT_NAME: &str = "telegram";

// ---------------------------------------------------------------------------
// API response types (Telegram JSON → Rust)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    #[serde(default)]
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

/// One inbound update. We only deserialize the fields the command loop
/// needs; everything else Telegram sends is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    #[serde(default)]
    pub username: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Telegram Bot API client.
pub struct TelegramClient {
    http: Client,
    base_url: String,
    token: String,
}

impl TelegramClient {
    pub fn new(token: String) -> Result<Self> {
        let http = Client::builder()
            // Long polls block server-side up to the poll timeout; give
            // the client comfortably more than that.
            .timeout(std::time::Duration::from_secs(90))
            .user_agent("COINSENTRY/0.1.0 (crypto-alert-bot)")
            .build()
            .context("Failed to build HTTP client for Telegram")?;

        Ok(Self {
            http,
            base_url: BASE_URL.to_string(),
            token,
        })
    }

    /// Point the client at a different base URL (test servers).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    async fn call<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T> {
        let resp = self
            .http
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Telegram {method} request failed"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("{TRANSPORT_NAME} API error {status}: {body}");
        }

        let api: ApiResponse<T> = resp
            .json()
            .await
            .with_context(|| format!("Failed to parse Telegram {method} response"))?;

        if !api.ok {
            anyhow::bail!(
                "{TRANSPORT_NAME} {method} rejected: {}",
                api.description.unwrap_or_else(|| "no description".to_string())
            );
        }
        api.result
            .with_context(|| format!("Telegram {method} response missing result"))
    }

    /// Long-poll for inbound updates past `offset`.
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>> {
        let updates: Vec<Update> = self
            .call(
                "getUpdates",
                json!({
                    "offset": offset,
                    "timeout": timeout_secs,
                    "allowed_updates": ["message"],
                }),
            )
            .await?;
        if !updates.is_empty() {
            debug!(count = updates.len(), "Telegram updates received");
        }
        Ok(updates)
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send_message(&self, chat_id: i64, text: &str, opts: &SendOptions) -> Result<()> {
        let mut body = json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(ref mode) = opts.parse_mode {
            body["parse_mode"] = json!(mode);
        }
        if opts.disable_web_page_preview {
            body["disable_web_page_preview"] = json!(true);
        }

        let _sent: serde_json::Value = self.call("sendMessage", body).await?;
        debug!(chat_id, chars = text.len(), "Message sent");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_update() {
        let json = r#"{
            "ok": true,
            "result": [{
                "update_id": 873,
                "message": {
                    "message_id": 5,
                    "from": {"id": 1, "is_bot": false, "username": "alice"},
                    "chat": {"id": 1001, "type": "private"},
                    "date": 1700000000,
                    "text": "/add ETH"
                }
            }]
        }"#;
        let api: ApiResponse<Vec<Update>> = serde_json::from_str(json).unwrap();
        assert!(api.ok);
        let updates = api.result.unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].update_id, 873);

        let msg = updates[0].message.as_ref().unwrap();
        assert_eq!(msg.chat.id, 1001);
        assert_eq!(msg.from.as_ref().unwrap().username.as_deref(), Some("alice"));
        assert_eq!(msg.text.as_deref(), Some("/add ETH"));
    }

    #[test]
    fn test_parse_update_without_username() {
        // Users without a public @username still produce valid updates.
        let json = r#"{
            "update_id": 874,
            "message": {
                "chat": {"id": 2002},
                "from": {"id": 2, "is_bot": false},
                "text": "/start"
            }
        }"#;
        let update: Update = serde_json::from_str(json).unwrap();
        assert!(update.message.unwrap().from.unwrap().username.is_none());
    }

    #[test]
    fn test_method_url_embeds_token() {
        let client = TelegramClient::new("123:abc".to_string()).unwrap();
        assert_eq!(
            client.method_url("sendMessage"),
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
    }

    #[test]
    fn test_error_response_shape() {
        let json = r#"{"ok": false, "description": "Unauthorized"}"#;
        let api: ApiResponse<Vec<Update>> = serde_json::from_str(json).unwrap();
        assert!(!api.ok);
        assert_eq!(api.description.as_deref(), Some("Unauthorized"));
    }
}
