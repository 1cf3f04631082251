//! Call throttle.
//!
//! Keeps the last-alert timestamp per symbol and enforces the cooldown
//! window between voice alerts. The table is global across all users:
//! once any user's tick fires an alert for a symbol, the symbol is in
//! cooldown for everyone. That mirrors the original product behavior
//! and is flagged as an open product question, not changed here.

use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

use crate::lock;

pub struct ThrottleGuard {
    /// symbol → epoch seconds of the last alert.
    last_alert: Mutex<HashMap<String, i64>>,
    /// Absolute 24h percent change that qualifies for an alert.
    threshold_pct: f64,
    /// Minimum elapsed seconds before a symbol re-arms.
    cooldown_secs: i64,
}

impl ThrottleGuard {
    pub fn new(threshold_pct: f64, cooldown_secs: i64) -> Self {
        Self {
            last_alert: Mutex::new(HashMap::new()),
            threshold_pct,
            cooldown_secs,
        }
    }

    /// Decide whether an alert should fire for `symbol` right `now`.
    ///
    /// Returns true when the move qualifies (|day_change| at or beyond
    /// the threshold) and the symbol is not in cooldown: never alerted,
    /// or last alerted strictly more than `cooldown_secs` ago. Returning
    /// true records `now` as the symbol's last alert — the cooldown arms
    /// on the decision itself, so a failed downstream dispatch does not
    /// re-qualify the symbol.
    pub fn evaluate(&self, symbol: &str, day_change: f64, now: i64) -> bool {
        if day_change < self.threshold_pct && day_change > -self.threshold_pct {
            return false;
        }

        let mut last_alert = lock(&self.last_alert);
        if let Some(&last) = last_alert.get(symbol) {
            if now - last <= self.cooldown_secs {
                debug!(
                    symbol,
                    since_last = now - last,
                    "Qualifying move suppressed by cooldown"
                );
                return false;
            }
        }
        last_alert.insert(symbol.to_string(), now);
        debug!(symbol, day_change, "Alert armed");
        true
    }

    /// Number of symbols with a recorded alert.
    pub fn tracked_symbols(&self) -> usize {
        lock(&self.last_alert).len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
