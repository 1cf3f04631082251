//! Recurring-job scheduler.
//!
//! Process-wide registry of timer-driven jobs keyed by (channel, target).
//! Each job runs on its own tokio task — handlers for different jobs may
//! overlap in wall-clock time — and holds an abortable handle so
//! deregistering guarantees no further ticks (an in-flight tick is
//! allowed to complete).

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::lock;
use crate::types::{Channel, SentryError};

type JobKey = (Channel, String);

#[derive(Default)]
pub struct Scheduler {
    jobs: Mutex<HashMap<JobKey, JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a recurring job for (channel, target).
    ///
    /// The handler future is built and awaited once per tick: first after
    /// `first_delay`, then every `interval`. Fails with
    /// `SentryError::AlreadyRegistered` if an active job already holds the
    /// key, which is what keeps a repeated subscribe from double-firing
    /// notifications.
    pub fn register_recurring<F, Fut>(
        &self,
        channel: Channel,
        target: &str,
        interval: Duration,
        first_delay: Duration,
        handler: F,
    ) -> Result<(), SentryError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let key = (channel, target.to_string());
        let mut jobs = lock(&self.jobs);

        if let Some(existing) = jobs.get(&key) {
            if !existing.is_finished() {
                return Err(SentryError::AlreadyRegistered {
                    channel,
                    target: target.to_string(),
                });
            }
        }

        let task_channel = channel;
        let task_target = target.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(first_delay).await;
            let mut ticker = tokio::time::interval(interval);
            loop {
                // First tick completes immediately, so the first handler
                // run lands right after first_delay.
                ticker.tick().await;
                debug!(channel = %task_channel, target = %task_target, "Job tick");
                handler().await;
            }
        });

        jobs.insert(key, handle);
        info!(
            %channel,
            target,
            interval_secs = interval.as_secs(),
            first_delay_secs = first_delay.as_secs(),
            "Recurring job registered"
        );
        Ok(())
    }

    /// Remove a job so no further ticks fire.
    ///
    /// Returns true if a job was registered under the key.
    pub fn deregister(&self, channel: Channel, target: &str) -> bool {
        let key = (channel, target.to_string());
        match lock(&self.jobs).remove(&key) {
            Some(handle) => {
                handle.abort();
                info!(%channel, target, "Recurring job deregistered");
                true
            }
            None => false,
        }
    }

    /// Whether an active job holds (channel, target).
    pub fn is_registered(&self, channel: Channel, target: &str) -> bool {
        let key = (channel, target.to_string());
        lock(&self.jobs)
            .get(&key)
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Number of active jobs.
    pub fn active_jobs(&self) -> usize {
        lock(&self.jobs).values().filter(|h| !h.is_finished()).count()
    }

    /// Abort every job (process shutdown).
    pub fn shutdown(&self) {
        let mut jobs = lock(&self.jobs);
        let count = jobs.len();
        for (_, handle) in jobs.drain() {
            handle.abort();
        }
        info!(jobs = count, "Scheduler shut down");
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
