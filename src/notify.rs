//! User-facing notifications
//!
//! The session reports outcomes through a [`Notifier`]. Delivery is
//! fire-and-forget: nothing the notifier does feeds back into the session.

use serde::Serialize;
use std::sync::Mutex;
use std::time::Duration;

use crate::types::Severity;

/// How long a notification stays visible unless stated otherwise
pub const DEFAULT_DURATION: Duration = Duration::from_millis(3000);

/// Notification collaborator
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, severity: Severity, duration: Duration);
}

/// A delivered notification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub message: String,
    pub severity: Severity,
    pub duration_ms: u64,
}

/// Routes notifications into the tracing subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, message: &str, severity: Severity, duration: Duration) {
        let duration_ms = duration.as_millis() as u64;
        match severity {
            Severity::Error => tracing::error!(duration_ms, "{}", message),
            Severity::Warning => tracing::warn!(duration_ms, "{}", message),
            Severity::Info | Severity::Success => {
                tracing::info!(severity = severity.as_str(), duration_ms, "{}", message)
            }
        }
    }
}

/// Keeps every notification in memory, in delivery order.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    log: Mutex<Vec<Notification>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.log
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn last(&self) -> Option<Notification> {
        self.notifications().pop()
    }

    /// Remove and return everything delivered so far
    pub fn drain(&self) -> Vec<Notification> {
        std::mem::take(
            &mut *self
                .log
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, message: &str, severity: Severity, duration: Duration) {
        self.log
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Notification {
                message: message.to_string(),
                severity,
                duration_ms: duration.as_millis() as u64,
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_memory_notifier_keeps_order() {
        let notifier = MemoryNotifier::new();
        notifier.notify("first", Severity::Info, DEFAULT_DURATION);
        notifier.notify("second", Severity::Error, Duration::from_millis(500));

        assert_eq!(
            notifier.notifications(),
            vec![
                Notification {
                    message: "first".to_string(),
                    severity: Severity::Info,
                    duration_ms: 3000,
                },
                Notification {
                    message: "second".to_string(),
                    severity: Severity::Error,
                    duration_ms: 500,
                },
            ]
        );
    }

    #[test]
    fn test_drain_empties_log() {
        let notifier = MemoryNotifier::new();
        notifier.notify("one", Severity::Success, DEFAULT_DURATION);

        assert_eq!(notifier.drain().len(), 1);
        assert!(notifier.notifications().is_empty());
        assert_eq!(notifier.last(), None);
    }
}
