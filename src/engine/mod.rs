//! Core engine — the per-tick fetch → render → dispatch pipeline.

pub mod notifier;
pub mod throttle;

pub use notifier::NotificationEngine;
pub use throttle::ThrottleGuard;
