//! End-to-end scenarios: subscribe → scheduled ticks → dispatch, restart
//! recovery, and call throttling through the fully wired bot.

use coinsentry::bot::Command;
use coinsentry::types::{Channel, UserSubscription};
use std::time::Duration;

use crate::fixtures::{build_bot, fast_schedule};

#[tokio::test(start_paused = true)]
async fn subscribe_updates_dispatches_digests_on_schedule() {
    let tb = build_bot(vec![], fast_schedule());
    tb.prices.set("BTC", 64_123.45, -0.3, 2.5);

    tb.bot.handle_command("alice", 1001, Command::Updates).await.unwrap();
    assert!(tb.sched.is_registered(Channel::Updates, "alice"));

    // Confirmation reply arrives immediately.
    let confirmations = tb.messenger.texts_for(1001);
    assert_eq!(confirmations.len(), 1);
    assert!(confirmations[0].starts_with("✅ You will now be updated"));

    // First tick lands after first_delay.
    tokio::time::sleep(Duration::from_secs(2)).await;
    let texts = tb.messenger.texts_for(1001);
    assert_eq!(texts.len(), 2);
    assert!(texts[1].starts_with("⌚ Timestamp: "));
    assert!(texts[1].contains("🪙 Coin: BTC"));
    assert!(texts[1].contains("🚀 Price: $64,123.45"));

    // One more digest per interval.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(tb.messenger.texts_for(1001).len(), 3);
}

#[tokio::test(start_paused = true)]
async fn duplicate_subscribe_declined_without_extra_jobs() {
    let tb = build_bot(vec![], fast_schedule());

    tb.bot.handle_command("alice", 1001, Command::Call).await.unwrap();
    tb.bot.handle_command("alice", 1001, Command::Call).await.unwrap();

    assert_eq!(tb.sched.active_jobs(), 1);
    let texts = tb.messenger.texts_for(1001);
    assert_eq!(
        texts.last().unwrap(),
        "❌ You are already subscribed to the calls list"
    );
}

#[tokio::test(start_paused = true)]
async fn restart_with_three_persisted_subscriptions_resumes_three_jobs() {
    // One persisted subscription per channel.
    let mut alice = UserSubscription::new("alice", 1);
    alice.updates = true;
    let mut bob = UserSubscription::new("bob", 2);
    bob.calls = true;
    let mut carol = UserSubscription::new("carol", 3);
    carol.news = true;

    let tb = build_bot(vec![alice, bob, carol], fast_schedule());
    tb.store.load().await.unwrap();

    assert_eq!(tb.bot.register_startup_jobs(), 3);
    assert_eq!(tb.sched.active_jobs(), 3);
    assert!(tb.sched.is_registered(Channel::Updates, "alice"));
    assert!(tb.sched.is_registered(Channel::Calls, "bob"));
    assert!(tb.sched.is_registered(Channel::News, "3"));

    // Registering again must not duplicate anything.
    assert_eq!(tb.bot.register_startup_jobs(), 0);
    assert_eq!(tb.sched.active_jobs(), 3);
}

#[tokio::test(start_paused = true)]
async fn qualifying_move_places_one_call_then_cooldown_holds() {
    let tb = build_bot(vec![], fast_schedule());
    tb.prices.set("BTC", 64_000.0, 0.5, 12.0);
    tb.prices.set("ADA", 0.44, 0.1, 14.0);

    tb.bot.handle_command("alice", 1001, Command::Call).await.unwrap();

    // Both BTC and ADA qualify; first watchlist entry wins, once.
    tokio::time::sleep(Duration::from_secs(2)).await;
    let calls = tb.caller.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "alice");
    assert!(calls[0].1.starts_with("BTC has increased in price by 12.000"));

    // Later ticks inside the cooldown stay quiet. (The throttle runs on
    // wall-clock time, and this whole test takes well under 24h.)
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(tb.caller.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_call_dispatch_consumes_the_cooldown() {
    let tb = build_bot(vec![], fast_schedule());
    tb.prices.set("BTC", 64_000.0, 0.5, -11.0);
    tb.caller.set_fail(true);

    tb.bot.handle_command("alice", 1001, Command::Call).await.unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;

    // The failed attempt happened and armed the cooldown.
    assert_eq!(tb.caller.calls().len(), 1);
    assert!(tb.caller.calls()[0].1.starts_with("BTC has decreased"));

    tb.caller.set_fail(false);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(tb.caller.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn throttle_is_shared_across_users() {
    let tb = build_bot(vec![], fast_schedule());
    tb.prices.set("BTC", 64_000.0, 0.5, 12.0);

    tb.bot.handle_command("alice", 1001, Command::Call).await.unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(tb.caller.calls().len(), 1);

    // Bob subscribes after alice's alert: BTC is in global cooldown, so
    // his ticks stay silent.
    tb.bot.handle_command("bob", 2002, Command::Call).await.unwrap();
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(tb.caller.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn news_subscription_delivers_top_headlines_as_markdown() {
    let tb = build_bot(vec![], fast_schedule());
    tb.news.set_headlines(&[
        "Bitcoin rallies",
        "ETH upgrade ships",
        "Third",
        "Fourth",
        "Fifth",
        "Sixth never shows",
    ]);

    tb.bot.handle_command("alice", 1001, Command::News).await.unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;

    let sent = tb.messenger.sent();
    let (_, digest, opts) = sent
        .iter()
        .find(|(_, text, _)| text.starts_with("🗞️ Your news at: "))
        .expect("news digest delivered");
    assert!(digest.contains("[Bitcoin\\-rallies](https://example.com/0)"));
    assert!(digest.contains("Fifth"));
    assert!(!digest.contains("Sixth"));
    assert_eq!(opts.parse_mode.as_deref(), Some("MarkdownV2"));
    assert!(opts.disable_web_page_preview);
}

#[tokio::test(start_paused = true)]
async fn stop_halts_future_ticks() {
    let tb = build_bot(vec![], fast_schedule());
    tb.prices.set("BTC", 64_000.0, 0.5, 1.0);

    tb.bot.handle_command("alice", 1001, Command::Updates).await.unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;
    let digests_before = tb
        .messenger
        .texts_for(1001)
        .iter()
        .filter(|t| t.starts_with("⌚"))
        .count();
    assert!(digests_before >= 1);

    tb.bot
        .handle_command("alice", 1001, Command::Stop(Some(Channel::Updates)))
        .await
        .unwrap();
    assert!(!tb.sched.is_registered(Channel::Updates, "alice"));

    tokio::time::sleep(Duration::from_secs(60)).await;
    let digests_after = tb
        .messenger
        .texts_for(1001)
        .iter()
        .filter(|t| t.starts_with("⌚"))
        .count();
    assert_eq!(digests_after, digests_before);
}

#[tokio::test(start_paused = true)]
async fn provider_outage_degrades_to_skipped_tick() {
    // No snapshots scripted at all: the digest is header-only and the
    // calls channel stays silent, but nothing crashes and the jobs
    // keep running.
    let tb = build_bot(vec![], fast_schedule());

    tb.bot.handle_command("alice", 1001, Command::Updates).await.unwrap();
    tb.bot.handle_command("alice", 1001, Command::Call).await.unwrap();

    tokio::time::sleep(Duration::from_secs(12)).await;
    assert!(tb.caller.calls().is_empty());
    let digests: Vec<String> = tb
        .messenger
        .texts_for(1001)
        .into_iter()
        .filter(|t| t.starts_with("⌚"))
        .collect();
    assert!(!digests.is_empty());
    assert!(!digests[0].contains("🪙"));

    // Prices coming back are picked up on the next tick.
    tb.prices.set("BTC", 100.0, 1.0, 1.0);
    tokio::time::sleep(Duration::from_secs(10)).await;
    let texts = tb.messenger.texts_for(1001);
    assert!(texts.last().unwrap().contains("🪙 Coin: BTC"));
}
