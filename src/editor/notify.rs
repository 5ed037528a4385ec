//! Transient toast notifications.
//!
//! Every failure path in the editor ends here or in an in-place validation
//! message; nothing fails silently and nothing takes down the event loop.
//! Toasts expire after a fixed interval and retention is bounded.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{error, info};

/// Default time a toast stays visible
const DEFAULT_TTL: Duration = Duration::from_secs(4);

/// Maximum number of retained toasts
const MAX_TOASTS: usize = 8;

/// Severity of a toast
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyLevel {
    Info,
    Success,
    Error,
}

/// One transient message shown to the user
#[derive(Debug, Clone)]
pub struct Notification {
    pub level: NotifyLevel,
    pub text: String,
    pub posted: Instant,
}

/// Shared handle to the notification queue. Cloneable so background tasks
/// can post status toasts alongside the controller.
#[derive(Clone)]
pub struct Notifier {
    inner: Arc<Mutex<VecDeque<Notification>>>,
    ttl: Duration,
}

impl Notifier {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::new())),
            ttl: DEFAULT_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn info(&self, text: impl Into<String>) {
        self.push(NotifyLevel::Info, text.into());
    }

    pub fn success(&self, text: impl Into<String>) {
        self.push(NotifyLevel::Success, text.into());
    }

    pub fn error(&self, text: impl Into<String>) {
        self.push(NotifyLevel::Error, text.into());
    }

    fn push(&self, level: NotifyLevel, text: String) {
        match level {
            NotifyLevel::Error => error!("{}", text),
            _ => info!("{}", text),
        }

        let mut queue = self.inner.lock();
        queue.push_back(Notification {
            level,
            text,
            posted: Instant::now(),
        });
        while queue.len() > MAX_TOASTS {
            queue.pop_front();
        }
    }

    /// Currently visible toasts, oldest first. Expired entries are pruned.
    pub fn active(&self) -> Vec<Notification> {
        let now = Instant::now();
        let mut queue = self.inner.lock();
        queue.retain(|toast| now.duration_since(toast.posted) < self.ttl);
        queue.iter().cloned().collect()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toasts_in_order() {
        let notifier = Notifier::new();
        notifier.info("channel connected");
        notifier.error("update failed");

        let active = notifier.active();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].level, NotifyLevel::Info);
        assert_eq!(active[1].level, NotifyLevel::Error);
        assert_eq!(active[1].text, "update failed");
    }

    #[test]
    fn test_expired_toasts_are_pruned() {
        let notifier = Notifier::new().with_ttl(Duration::from_millis(0));
        notifier.info("blink and you miss it");

        assert!(notifier.active().is_empty());
    }

    #[test]
    fn test_retention_is_bounded() {
        let notifier = Notifier::new();
        for i in 0..20 {
            notifier.info(format!("toast {}", i));
        }

        let active = notifier.active();
        assert_eq!(active.len(), MAX_TOASTS);
        assert_eq!(active[0].text, "toast 12");
    }
}
