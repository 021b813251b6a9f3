//! Single-slot change listener

use std::fmt;

/// Callback type invoked after every observable change
pub type ChangeListener = Box<dyn FnMut() + Send>;

/// Holds the caller's listener and counts invocations.
///
/// The listener runs synchronously, after the map already reflects the
/// change. A panicking listener unwinds through the triggering call.
#[derive(Default)]
pub struct ChangeNotifier {
    listener: Option<ChangeListener>,
    notifications: u64,
}

impl ChangeNotifier {
    pub fn new(listener: Option<ChangeListener>) -> Self {
        Self {
            listener,
            notifications: 0,
        }
    }

    /// Build a notifier around a plain closure
    pub fn from_fn<F>(listener: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        Self::new(Some(Box::new(listener)))
    }

    pub fn notify(&mut self) {
        self.notifications += 1;
        if let Some(listener) = self.listener.as_mut() {
            listener();
        }
    }

    /// Number of changes notified so far, counted even without a listener
    pub fn notifications(&self) -> u64 {
        self.notifications
    }

    pub fn has_listener(&self) -> bool {
        self.listener.is_some()
    }
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("has_listener", &self.has_listener())
            .field("notifications", &self.notifications)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_invokes_listener_each_time() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut notifier = ChangeNotifier::from_fn(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        notifier.notify();
        notifier.notify();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(notifier.notifications(), 2);
    }

    #[test]
    fn test_without_listener_still_counts() {
        let mut notifier = ChangeNotifier::default();
        assert!(!notifier.has_listener());
        notifier.notify();
        assert_eq!(notifier.notifications(), 1);
    }
}
