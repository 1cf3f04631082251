//! COINSENTRY — Crypto price alert and news notification bot
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod bot;
pub mod config;
pub mod engine;
pub mod providers;
pub mod sched;
pub mod storage;
pub mod store;
pub mod transport;
pub mod types;

/// Acquire a mutex guard, recovering from poisoning — a panicked holder
/// leaves our maps in a usable state, so poison is not propagated.
pub(crate) fn lock<T>(m: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}
