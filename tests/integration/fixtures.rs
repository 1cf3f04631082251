//! Deterministic test doubles for the bot's ports.
//!
//! All state is in-memory and controllable from test code: scripted
//! prices and headlines, recording transports, and a seeded repo come
//! together into a fully wired bot with no network dependencies.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use coinsentry::bot::Bot;
use coinsentry::config::ScheduleConfig;
use coinsentry::engine::{NotificationEngine, ThrottleGuard};
use coinsentry::providers::{NewsProvider, PriceProvider};
use coinsentry::sched::Scheduler;
use coinsentry::storage::MemoryRepo;
use coinsentry::store::PreferenceStore;
use coinsentry::transport::{Caller, Messenger, SendOptions};
use coinsentry::types::{NewsArticle, PriceSnapshot, UserSubscription};

// ---------------------------------------------------------------------------
// Scripted providers
// ---------------------------------------------------------------------------

/// Price provider returning whatever snapshots the test scripted.
#[derive(Default)]
pub struct ScriptedPrices {
    snapshots: Mutex<HashMap<String, PriceSnapshot>>,
}

impl ScriptedPrices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script one symbol's snapshot.
    pub fn set(&self, symbol: &str, price: f64, change_hour: f64, change_day: f64) {
        self.snapshots.lock().unwrap().insert(
            symbol.to_string(),
            PriceSnapshot {
                symbol: symbol.to_string(),
                price,
                change_hour,
                change_day,
            },
        );
    }
}

#[async_trait]
impl PriceProvider for ScriptedPrices {
    async fn fetch_multi(&self, symbols: &[String]) -> Result<HashMap<String, PriceSnapshot>> {
        let all = self.snapshots.lock().unwrap();
        Ok(symbols
            .iter()
            .filter_map(|s| all.get(s).cloned().map(|snap| (s.clone(), snap)))
            .collect())
    }
}

/// News provider returning a fixed headline list.
#[derive(Default)]
pub struct ScriptedNews {
    articles: Mutex<Vec<NewsArticle>>,
}

impl ScriptedNews {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_headlines(&self, titles: &[&str]) {
        let mut articles = self.articles.lock().unwrap();
        *articles = titles
            .iter()
            .enumerate()
            .map(|(i, title)| NewsArticle {
                title: title.to_string(),
                url: format!("https://example.com/{i}"),
            })
            .collect();
    }
}

#[async_trait]
impl NewsProvider for ScriptedNews {
    async fn fetch_latest(&self) -> Result<Vec<NewsArticle>> {
        Ok(self.articles.lock().unwrap().clone())
    }
}

// ---------------------------------------------------------------------------
// Recording transports
// ---------------------------------------------------------------------------

/// Messenger that records everything it is asked to send.
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<(i64, String, SendOptions)>>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(i64, String, SendOptions)> {
        self.sent.lock().unwrap().clone()
    }

    /// Messages delivered to one chat.
    pub fn texts_for(&self, chat_id: i64) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _, _)| *id == chat_id)
            .map(|(_, text, _)| text.clone())
            .collect()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_message(&self, chat_id: i64, text: &str, opts: &SendOptions) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((chat_id, text.to_string(), opts.clone()));
        Ok(())
    }
}

/// Caller that records calls and can be told to fail.
#[derive(Default)]
pub struct RecordingCaller {
    calls: Mutex<Vec<(String, String)>>,
    fail: Mutex<bool>,
}

impl RecordingCaller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_fail(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }
}

#[async_trait]
impl Caller for RecordingCaller {
    async fn place_call(&self, username: &str, text: &str) -> Result<()> {
        let fail = *self.fail.lock().unwrap();
        self.calls
            .lock()
            .unwrap()
            .push((username.to_string(), text.to_string()));
        if fail {
            anyhow::bail!("scripted call failure");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Wired-up bot
// ---------------------------------------------------------------------------

/// Everything a scenario needs, wired the way main() wires production.
pub struct TestBot {
    pub bot: Arc<Bot>,
    pub store: Arc<PreferenceStore>,
    pub sched: Arc<Scheduler>,
    pub prices: Arc<ScriptedPrices>,
    pub news: Arc<ScriptedNews>,
    pub messenger: Arc<RecordingMessenger>,
    pub caller: Arc<RecordingCaller>,
}

/// Fast schedule so paused-clock tests advance seconds, not hours.
pub fn fast_schedule() -> ScheduleConfig {
    ScheduleConfig {
        updates_interval_secs: 10,
        calls_interval_secs: 5,
        news_interval_secs: 20,
        first_delay_secs: 1,
    }
}

pub fn build_bot(seed: Vec<UserSubscription>, schedule: ScheduleConfig) -> TestBot {
    let store = Arc::new(PreferenceStore::new(Arc::new(MemoryRepo::seeded(seed))));
    let prices = Arc::new(ScriptedPrices::new());
    let news = Arc::new(ScriptedNews::new());
    let messenger = Arc::new(RecordingMessenger::new());
    let caller = Arc::new(RecordingCaller::new());
    let sched = Arc::new(Scheduler::new());

    let engine = Arc::new(NotificationEngine::new(
        store.clone(),
        Arc::new(ThrottleGuard::new(9.0, 86_400)),
        prices.clone(),
        news.clone(),
        messenger.clone(),
        caller.clone(),
    ));
    let bot = Arc::new(Bot::new(
        store.clone(),
        engine,
        sched.clone(),
        messenger.clone(),
        schedule,
    ));

    TestBot {
        bot,
        store,
        sched,
        prices,
        news,
        messenger,
        caller,
    }
}
