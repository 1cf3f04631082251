//! Bot surface: inbound commands and job wiring.
//!
//! Sits between the Telegram update stream and the core. Every command
//! maps 1:1 onto a preference-store or scheduler operation; the reply
//! strings follow the original deployment. The core itself never sees a
//! command — only store mutations and registered jobs.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::ScheduleConfig;
use crate::engine::NotificationEngine;
use crate::sched::Scheduler;
use crate::store::PreferenceStore;
use crate::transport::telegram::{TelegramClient, Update};
use crate::transport::{Messenger, SendOptions};
use crate::types::{Channel, JobContext};

const WELCOME_TEXT: &str = "Welcome to CoinSentry!! I will update you on the latest prices for selected \
cryptocurrencies and alert you when significant price changes occur! I will \
also send you some hot news at certain times in the day!\n\n\
▶️ Type /add <i>currency name</i> to add currencies to watchlist\n\
▶️ Type /remove <i>currency name</i> to remove currencies from watchlist\n\
▶️ Type /updates to receive updates for the currencies in your watchlist\n\
▶️ Type /news to receive news updates 4 times in the day\n\
▶️ Type /call to receive a call if one of the currencies in your watchlist \
experiences a price change of ±9% in 24h\n\
▶️ Type /stop <i>updates|call|news</i> to turn a subscription off\n\n\
Initial currencies in watchlist are: BTC, ADA, DOGE";

// ---------------------------------------------------------------------------
// Command parsing
// ---------------------------------------------------------------------------

/// An inbound command, parsed from raw message text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Add(Vec<String>),
    Remove(Vec<String>),
    Updates,
    Call,
    News,
    Stop(Option<Channel>),
}

/// Parse a message into a command. Non-commands and unknown commands
/// return None and are ignored.
pub fn parse_command(text: &str) -> Option<Command> {
    let mut words = text.split_whitespace();
    let head = words.next()?;
    if !head.starts_with('/') {
        return None;
    }
    // "/add@CoinSentryBot" arrives in group chats.
    let name = head[1..].split('@').next().unwrap_or("");
    let args: Vec<String> = words.map(|w| w.to_string()).collect();

    match name {
        "start" => Some(Command::Start),
        "add" => Some(Command::Add(args)),
        "remove" => Some(Command::Remove(args)),
        "updates" => Some(Command::Updates),
        "call" => Some(Command::Call),
        "news" => Some(Command::News),
        "stop" => Some(Command::Stop(match args.first().map(String::as_str) {
            Some("updates") => Some(Channel::Updates),
            Some("call") | Some("calls") => Some(Channel::Calls),
            Some("news") => Some(Channel::News),
            _ => None,
        })),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Bot
// ---------------------------------------------------------------------------

pub struct Bot {
    store: Arc<PreferenceStore>,
    engine: Arc<NotificationEngine>,
    sched: Arc<Scheduler>,
    messenger: Arc<dyn Messenger>,
    schedule: ScheduleConfig,
}

impl Bot {
    pub fn new(
        store: Arc<PreferenceStore>,
        engine: Arc<NotificationEngine>,
        sched: Arc<Scheduler>,
        messenger: Arc<dyn Messenger>,
        schedule: ScheduleConfig,
    ) -> Self {
        Self {
            store,
            engine,
            sched,
            messenger,
            schedule,
        }
    }

    /// Re-establish one recurring job per persisted active subscription
    /// per channel, so a restart resumes the prior schedule without
    /// users re-subscribing. Returns the number of jobs registered.
    pub fn register_startup_jobs(&self) -> usize {
        let mut registered = 0;
        for sub in self.store.snapshot_all() {
            for channel in Channel::ALL {
                if !sub.is_subscribed(channel) {
                    continue;
                }
                let ctx = self.job_context(channel, &sub.username, sub.chat_id);
                match self.register_job(ctx) {
                    Ok(()) => registered += 1,
                    // Two users sharing a chat both have news=true; one
                    // job per chat is the intended shape.
                    Err(e) => debug!(error = %e, "Startup job already covered"),
                }
            }
        }
        info!(jobs = registered, "Startup jobs registered");
        registered
    }

    /// Handle one inbound update end to end (parse, mutate, reply).
    pub async fn handle_update(&self, update: &Update) {
        let Some(message) = &update.message else { return };
        let Some(text) = &message.text else { return };
        let Some(username) = message.from.as_ref().and_then(|u| u.username.clone()) else {
            debug!(chat_id = message.chat.id, "Ignoring message without username");
            return;
        };
        let Some(command) = parse_command(text) else { return };

        if let Err(e) = self.handle_command(&username, message.chat.id, command).await {
            error!(user = %username, error = %e, "Command handling failed");
        }
    }

    pub async fn handle_command(
        &self,
        username: &str,
        chat_id: i64,
        command: Command,
    ) -> Result<()> {
        // Any command from a new user creates their row first, so /add
        // before /start works the same as after it.
        self.store.add_user(username, chat_id).await?;

        match command {
            Command::Start => {
                self.reply_with(chat_id, WELCOME_TEXT, &SendOptions::html()).await;
            }
            Command::Add(coins) if coins.is_empty() => {
                self.reply(chat_id, "🤔 What currency do you want to add to watchlist?").await;
            }
            Command::Add(coins) => {
                for coin in coins {
                    let added = self.store.add_coin(&coin, username).await.unwrap_or(false);
                    let reply = if added {
                        format!("✅ Successfully added {coin} to list of currencies")
                    } else {
                        format!("❌ Failed to add {coin} to list of currencies. Check coin name")
                    };
                    self.reply(chat_id, &reply).await;
                }
            }
            Command::Remove(coins) if coins.is_empty() => {
                self.reply(chat_id, "🤔 What currency do you want to remove from watchlist?").await;
            }
            Command::Remove(coins) => {
                for coin in coins {
                    let removed = self.store.remove_coin(&coin, username).await.unwrap_or(false);
                    let reply = if removed {
                        format!("✅ Successfully removed {coin} from list of currencies")
                    } else {
                        format!("❌ Failed to remove {coin} from list of currencies. Check coin name")
                    };
                    self.reply(chat_id, &reply).await;
                }
            }
            Command::Updates => {
                self.subscribe(
                    Channel::Updates,
                    username,
                    chat_id,
                    "✅ You will now be updated on the latest prices of your selected crypto",
                )
                .await?;
            }
            Command::Call => {
                self.subscribe(
                    Channel::Calls,
                    username,
                    chat_id,
                    "✅ You will now get calls if there is a drastic change in price in one of your selected crypto",
                )
                .await?;
            }
            Command::News => {
                self.subscribe(
                    Channel::News,
                    username,
                    chat_id,
                    "✅ You will now get news updates 4 times a day",
                )
                .await?;
            }
            Command::Stop(None) => {
                self.reply(chat_id, "🤔 What do you want to stop? Try /stop updates, /stop call or /stop news").await;
            }
            Command::Stop(Some(channel)) => {
                self.unsubscribe(channel, username, chat_id).await?;
            }
        }
        Ok(())
    }

    /// Subscribe a user to a channel: flip the flag, register the job.
    ///
    /// A duplicate subscribe is an expected condition, not an error: the
    /// flag stays untouched, zero additional jobs are registered, and
    /// the user is told they are already on the list.
    async fn subscribe(
        &self,
        channel: Channel,
        username: &str,
        chat_id: i64,
        confirmation: &str,
    ) -> Result<()> {
        let newly_set = self.store.set_flag(channel, username).await?;
        if !newly_set {
            self.reply(
                chat_id,
                &format!("❌ You are already subscribed to the {channel} list"),
            )
            .await;
            return Ok(());
        }

        let ctx = self.job_context(channel, username, chat_id);
        if let Err(e) = self.register_job(ctx) {
            // Flag was clear but a job holds the key (e.g. another user
            // already drives this chat's news job). The subscription
            // itself is valid, so confirm it.
            warn!(user = username, %channel, error = %e, "Job already registered for key");
        }
        self.reply(chat_id, confirmation).await;
        Ok(())
    }

    async fn unsubscribe(&self, channel: Channel, username: &str, chat_id: i64) -> Result<()> {
        let was_set = self.store.clear_flag(channel, username).await?;
        if !was_set {
            self.reply(
                chat_id,
                &format!("❌ You are not subscribed to the {channel} list"),
            )
            .await;
            return Ok(());
        }

        let ctx = self.job_context(channel, username, chat_id);
        self.sched.deregister(channel, &ctx.target());
        self.reply(
            chat_id,
            &format!("✅ You will no longer receive {channel} notifications"),
        )
        .await;
        Ok(())
    }

    fn job_context(&self, channel: Channel, username: &str, chat_id: i64) -> JobContext {
        match channel {
            Channel::Updates => JobContext::Updates {
                chat_id,
                username: username.to_string(),
            },
            Channel::Calls => JobContext::Calls {
                username: username.to_string(),
            },
            Channel::News => JobContext::News { chat_id },
        }
    }

    fn interval_for(&self, channel: Channel) -> Duration {
        let secs = match channel {
            Channel::Updates => self.schedule.updates_interval_secs,
            Channel::Calls => self.schedule.calls_interval_secs,
            Channel::News => self.schedule.news_interval_secs,
        };
        Duration::from_secs(secs)
    }

    fn register_job(&self, ctx: JobContext) -> Result<()> {
        let channel = ctx.channel();
        let target = ctx.target();
        let engine = self.engine.clone();
        self.sched.register_recurring(
            channel,
            &target,
            self.interval_for(channel),
            Duration::from_secs(self.schedule.first_delay_secs),
            move || {
                let engine = engine.clone();
                let ctx = ctx.clone();
                async move { engine.run_tick(&ctx).await }
            },
        )?;
        Ok(())
    }

    async fn reply(&self, chat_id: i64, text: &str) {
        self.reply_with(chat_id, text, &SendOptions::default()).await;
    }

    async fn reply_with(&self, chat_id: i64, text: &str, opts: &SendOptions) {
        if let Err(e) = self.messenger.send_message(chat_id, text, opts).await {
            warn!(chat_id, error = %e, "Failed to send reply");
        }
    }
}

// ---------------------------------------------------------------------------
// Poll loop
// ---------------------------------------------------------------------------

/// Drive the bot from Telegram long polling until the task is cancelled.
/// Transport errors back off briefly and retry — the loop never exits on
/// its own.
pub async fn poll_loop(bot: Arc<Bot>, telegram: Arc<TelegramClient>, poll_timeout_secs: u64) {
    let mut offset: i64 = 0;
    loop {
        match telegram.get_updates(offset, poll_timeout_secs).await {
            Ok(updates) => {
                for update in &updates {
                    offset = offset.max(update.update_id + 1);
                    bot.handle_update(update).await;
                }
            }
            Err(e) => {
                warn!(error = %e, "getUpdates failed, backing off");
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
