//! Notification sinks and the promise-style helper.

use composable_forms_core::notification::{
    Notification, NotificationKind, NotificationSink, PromiseMessages,
};
use std::future::Future;
use tokio::sync::mpsc;

/// Report `loading`, await `fut`, then report `success` or `error`.
///
/// The outcome is passed through untouched; the sink never influences it.
pub async fn promise<S, F, T, E>(sink: &S, fut: F, messages: &PromiseMessages) -> Result<T, E>
where
    S: NotificationSink + ?Sized,
    F: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    sink.loading(&messages.loading);

    let result = fut.await;
    match &result {
        Ok(_) => sink.success(&messages.success),
        Err(error) => sink.error(&messages.error_for(&error.to_string())),
    }

    result
}

/// Sink that writes notifications to the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn success(&self, message: &str) {
        tracing::info!(kind = "success", "{message}");
    }

    fn error(&self, message: &str) {
        tracing::warn!(kind = "error", "{message}");
    }

    fn loading(&self, message: &str) {
        tracing::debug!(kind = "loading", "{message}");
    }
}

/// Sink that forwards notifications into an unbounded channel.
///
/// Useful when a UI loop drains notifications on its own schedule. Sending
/// never blocks; notifications are dropped once the receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<Notification>,
}

impl ChannelSink {
    /// Create a sink and the receiver that drains it.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    fn push(&self, kind: NotificationKind, message: &str) {
        if self.sender.send(Notification::new(kind, message)).is_err() {
            tracing::trace!("Notification receiver dropped");
        }
    }
}

impl NotificationSink for ChannelSink {
    fn success(&self, message: &str) {
        self.push(NotificationKind::Success, message);
    }

    fn error(&self, message: &str) {
        self.push(NotificationKind::Error, message);
    }

    fn loading(&self, message: &str) {
        self.push(NotificationKind::Loading, message);
    }
}
