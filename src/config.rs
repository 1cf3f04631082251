//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (bot token, API keys) are referenced by env-var name in the
//! config and resolved at runtime via `std::env::var`. Every section has
//! defaults matching the original deployment, so tests and in-memory
//! setups can run without a file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub bot: BotConfig,
    pub telegram: TelegramConfig,
    pub callmebot: CallMeBotConfig,
    pub providers: ProvidersConfig,
    pub schedule: ScheduleConfig,
    pub alerts: AlertsConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BotConfig {
    pub name: String,
    /// Path of the JSON subscription store.
    pub state_file: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: "COINSENTRY-001".to_string(),
            state_file: "coinsentry_users.json".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TelegramConfig {
    /// Env var holding the Bot API token.
    pub bot_token_env: String,
    /// Long-poll timeout for getUpdates, in seconds.
    pub poll_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token_env: "BOT_API".to_string(),
            poll_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CallMeBotConfig {
    /// Voice used for text-to-speech on the call.
    pub lang: String,
    /// How many times the message is repeated during the call.
    pub repeat: u32,
}

impl Default for CallMeBotConfig {
    fn default() -> Self {
        Self {
            lang: "en-US-Standard-E".to_string(),
            repeat: 2,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Env var holding the CryptoCompare API key. Optional — the free
    /// tier works unauthenticated at low volume.
    pub cryptocompare_api_key_env: Option<String>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            cryptocompare_api_key_env: Some("API_KEY".to_string()),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Price digest interval (2h in the original deployment).
    pub updates_interval_secs: u64,
    /// Drastic-change check interval (81s — CallMeBot rate requirement).
    pub calls_interval_secs: u64,
    /// News digest interval (4 times a day).
    pub news_interval_secs: u64,
    /// Delay before the first tick of a newly registered job.
    pub first_delay_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            updates_interval_secs: 7200,
            calls_interval_secs: 81,
            news_interval_secs: 21_600,
            first_delay_secs: 1,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AlertsConfig {
    /// Absolute 24h percent change that qualifies for a call.
    pub change_threshold_pct: f64,
    /// Minimum seconds between two calls for the same symbol.
    pub cooldown_secs: i64,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            change_threshold_pct: 9.0,
            cooldown_secs: 86_400,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Load from a TOML file if it exists; defaults otherwise.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if std::path::Path::new(path).exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_original_deployment() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.schedule.updates_interval_secs, 7200);
        assert_eq!(cfg.schedule.calls_interval_secs, 81);
        assert_eq!(cfg.schedule.news_interval_secs, 21_600);
        assert_eq!(cfg.schedule.first_delay_secs, 1);
        assert_eq!(cfg.alerts.change_threshold_pct, 9.0);
        assert_eq!(cfg.alerts.cooldown_secs, 86_400);
        assert_eq!(cfg.callmebot.repeat, 2);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [schedule]
            updates_interval_secs = 60

            [bot]
            name = "COINSENTRY-TEST"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.bot.name, "COINSENTRY-TEST");
        assert_eq!(cfg.schedule.updates_interval_secs, 60);
        // Untouched sections keep their defaults.
        assert_eq!(cfg.schedule.calls_interval_secs, 81);
        assert_eq!(cfg.alerts.cooldown_secs, 86_400);
    }

    #[test]
    fn test_load_missing_file_falls_back() {
        let cfg = AppConfig::load_or_default("definitely_not_here.toml").unwrap();
        assert_eq!(cfg.bot.name, "COINSENTRY-001");
    }
}
