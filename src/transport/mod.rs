//! Outbound transports.
//!
//! Defines the `Messenger` and `Caller` ports the engine dispatches
//! through, and provides implementations for:
//! - Telegram Bot API — chat messages (and inbound command polling)
//! - CallMeBot — text-to-speech voice calls
//!
//! Delivery is best-effort: the core logs failures and moves on, it
//! never branches on delivery outcome.

pub mod callmebot;
pub mod telegram;

use anyhow::Result;
use async_trait::async_trait;

/// Formatting options attached to an outbound message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Telegram parse mode, e.g. "html" or "MarkdownV2".
    pub parse_mode: Option<String>,
    pub disable_web_page_preview: bool,
}

impl SendOptions {
    /// Options used for news digests: MarkdownV2 links, no link preview.
    pub fn markdown_no_preview() -> Self {
        Self {
            parse_mode: Some("MarkdownV2".to_string()),
            disable_web_page_preview: true,
        }
    }

    pub fn html() -> Self {
        Self {
            parse_mode: Some("html".to_string()),
            disable_web_page_preview: false,
        }
    }
}

/// Abstraction over the chat message transport.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str, opts: &SendOptions) -> Result<()>;
}

/// Abstraction over the voice-call transport.
#[async_trait]
pub trait Caller: Send + Sync {
    async fn place_call(&self, username: &str, text: &str) -> Result<()>;
}
