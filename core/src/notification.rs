//! User-facing notification side channel.
//!
//! Notifications are fire-and-forget: the core never consumes a return value
//! from the sink. Sinks are injected through the environment rather than
//! reached as global state.

use serde::{Deserialize, Serialize};

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    /// Work has started and has not settled yet
    Loading,
    /// Work completed successfully
    Success,
    /// Work failed
    Error,
}

/// A notification as delivered to a sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Severity
    pub kind: NotificationKind,
    /// Message shown to the user
    pub message: String,
}

impl Notification {
    /// Create a notification.
    #[must_use]
    pub fn new(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Receives user-facing feedback.
pub trait NotificationSink: Send + Sync {
    /// Report a success.
    fn success(&self, message: &str);

    /// Report a failure.
    fn error(&self, message: &str);

    /// Report that work has started.
    ///
    /// Sinks without a loading indicator can ignore it.
    fn loading(&self, message: &str) {
        let _ = message;
    }

    /// Deliver a notification by kind.
    fn notify(&self, notification: &Notification) {
        match notification.kind {
            NotificationKind::Loading => self.loading(&notification.message),
            NotificationKind::Success => self.success(&notification.message),
            NotificationKind::Error => self.error(&notification.message),
        }
    }
}

/// Messages for a promise-style notification: one while the work runs, then
/// one for the outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromiseMessages {
    /// Shown when the work starts
    pub loading: String,
    /// Shown when the work succeeds
    pub success: String,
    /// Shown when the work fails; `{error}` is replaced with the failure message
    pub error: String,
}

impl PromiseMessages {
    /// Create a message set.
    #[must_use]
    pub fn new(
        loading: impl Into<String>,
        success: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            loading: loading.into(),
            success: success.into(),
            error: error.into(),
        }
    }

    /// Error message with the failure substituted in.
    #[must_use]
    pub fn error_for(&self, failure: &str) -> String {
        self.error.replace("{error}", failure)
    }
}

/// Sink that drops every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentSink;

impl NotificationSink for SilentSink {
    fn success(&self, _message: &str) {}

    fn error(&self, _message: &str) {}
}
