//! A subscribable value.
//!
//! [`StateCell`] wraps a `tokio::sync::watch` channel: writers replace or
//! modify the value, and every subscriber is woken after each write. Cloning
//! a cell yields another handle to the same value.

use std::sync::Arc;
use tokio::sync::watch;

/// Shared, observable value.
#[derive(Debug)]
pub struct StateCell<T> {
    sender: Arc<watch::Sender<T>>,
}

impl<T> Clone for StateCell<T> {
    fn clone(&self) -> Self {
        Self {
            sender: Arc::clone(&self.sender),
        }
    }
}

impl<T: Clone> StateCell<T> {
    /// Create a cell holding `initial`.
    #[must_use]
    pub fn new(initial: T) -> Self {
        let (sender, _) = watch::channel(initial);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Snapshot of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.sender.borrow().clone()
    }

    /// Replace the value and notify subscribers.
    pub fn set(&self, value: T) {
        self.sender.send_replace(value);
    }

    /// Modify the value in place and notify subscribers.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut T),
    {
        self.sender.send_modify(f);
    }

    /// Modify the value only if `f` returns `true`; subscribers are notified
    /// only in that case.
    pub fn update_if<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut T) -> bool,
    {
        self.sender.send_if_modified(f)
    }

    /// Subscribe to changes.
    ///
    /// The receiver starts with the current value marked as seen.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<T: Clone + Default> Default for StateCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code can use unwrap
mod tests {
    use super::*;

    #[test]
    fn set_and_get() {
        let cell = StateCell::new(1);
        cell.set(2);
        assert_eq!(cell.get(), 2);
    }

    #[test]
    fn clones_share_the_value() {
        let cell = StateCell::new(String::from("a"));
        let other = cell.clone();
        other.update(|s| s.push('b'));
        assert_eq!(cell.get(), "ab");
    }

    #[tokio::test]
    async fn subscribers_are_notified_on_each_write() {
        let cell = StateCell::new(0u32);
        let mut rx = cell.subscribe();
        assert_eq!(cell.subscriber_count(), 1);

        cell.set(1);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 1);

        cell.update(|v| *v += 1);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 2);
    }

    #[test]
    fn update_if_skips_notification_when_unchanged() {
        let cell = StateCell::new(5);
        let rx = cell.subscribe();

        assert!(!cell.update_if(|_| false));
        assert!(!rx.has_changed().unwrap());

        assert!(cell.update_if(|v| {
            *v = 6;
            true
        }));
        assert!(rx.has_changed().unwrap());
        assert_eq!(cell.get(), 6);
    }
}
