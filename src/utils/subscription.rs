//! Token-based subscriber registry
//!
//! Subscriptions are revoked by the token returned at registration time,
//! never by handler identity, so duplicate handlers are unambiguous and a
//! forgotten handle cannot silently keep a subscription alive under a
//! different one.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU64, Ordering},
};

/// Opaque handle identifying one subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(u64);

/// Shared handler type stored by the registry
type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// An ordered registry of event handlers
///
/// Handlers are invoked in registration order, once per emitted event. The
/// handler list is snapshotted before dispatch, so handlers may subscribe or
/// unsubscribe re-entrantly without deadlocking.
///
/// # Example
/// ```
/// use voxline::utils::subscription::Subscribers;
/// use std::sync::{Arc, Mutex};
///
/// let subscribers: Subscribers<String> = Subscribers::new();
/// let seen = Arc::new(Mutex::new(Vec::new()));
///
/// let seen_clone = Arc::clone(&seen);
/// let token = subscribers.add(move |e: &String| {
///     seen_clone.lock().unwrap().push(e.clone());
/// });
///
/// subscribers.emit(&"hello".to_string());
/// assert_eq!(seen.lock().unwrap().len(), 1);
///
/// assert!(subscribers.remove(token));
/// ```
pub struct Subscribers<E> {
    handlers: Mutex<Vec<(u64, Handler<E>)>>,
    next_id: AtomicU64,
}

impl<E> Subscribers<E> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            handlers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a handler and return its revocation token
    pub fn add(&self, handler: impl Fn(&E) + Send + Sync + 'static) -> SubscriptionToken {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers.lock().unwrap().push((id, Arc::new(handler)));
        SubscriptionToken(id)
    }

    /// Revoke a subscription
    ///
    /// Returns `false` if the token was already revoked.
    pub fn remove(&self, token: SubscriptionToken) -> bool {
        let mut handlers = self.handlers.lock().unwrap();
        let before = handlers.len();
        handlers.retain(|(id, _)| *id != token.0);
        handlers.len() != before
    }

    /// Invoke every registered handler with `event`, in registration order
    pub fn emit(&self, event: &E) {
        let snapshot: Vec<Handler<E>> = self
            .handlers
            .lock()
            .unwrap()
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();

        for handler in snapshot {
            handler(event);
        }
    }

    /// Number of live subscriptions
    pub fn len(&self) -> usize {
        self.handlers.lock().unwrap().len()
    }

    /// Whether no subscriptions are registered
    pub fn is_empty(&self) -> bool {
        self.handlers.lock().unwrap().is_empty()
    }
}

impl<E> Default for Subscribers<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[test]
    fn test_emit_reaches_all_handlers_in_order() {
        let subscribers: Subscribers<u32> = Subscribers::new();
        let order = Arc::new(StdMutex::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let order = Arc::clone(&order);
            subscribers.add(move |_: &u32| order.lock().unwrap().push(tag));
        }

        subscribers.emit(&1);

        assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_remove_by_token() {
        let subscribers: Subscribers<u32> = Subscribers::new();
        let count = Arc::new(StdMutex::new(0usize));

        let count_clone = Arc::clone(&count);
        let token = subscribers.add(move |_: &u32| {
            *count_clone.lock().unwrap() += 1;
        });

        subscribers.emit(&1);
        assert!(subscribers.remove(token));
        subscribers.emit(&2);

        assert_eq!(*count.lock().unwrap(), 1);
        // Double removal is a no-op
        assert!(!subscribers.remove(token));
    }

    #[test]
    fn test_duplicate_handlers_have_distinct_tokens() {
        let subscribers: Subscribers<u32> = Subscribers::new();
        let count = Arc::new(StdMutex::new(0usize));

        let make = |count: Arc<StdMutex<usize>>| {
            move |_: &u32| {
                *count.lock().unwrap() += 1;
            }
        };

        let t1 = subscribers.add(make(Arc::clone(&count)));
        let t2 = subscribers.add(make(Arc::clone(&count)));
        assert_ne!(t1, t2);

        // Removing one leaves the other live
        subscribers.remove(t1);
        subscribers.emit(&1);
        assert_eq!(*count.lock().unwrap(), 1);
        assert_eq!(subscribers.len(), 1);
    }

    #[test]
    fn test_reentrant_unsubscribe_does_not_deadlock() {
        let subscribers: Arc<Subscribers<u32>> = Arc::new(Subscribers::new());
        let token_slot: Arc<StdMutex<Option<SubscriptionToken>>> =
            Arc::new(StdMutex::new(None));

        let subs = Arc::clone(&subscribers);
        let slot = Arc::clone(&token_slot);
        let token = subscribers.add(move |_: &u32| {
            if let Some(token) = slot.lock().unwrap().take() {
                subs.remove(token);
            }
        });
        *token_slot.lock().unwrap() = Some(token);

        subscribers.emit(&1);
        assert!(subscribers.is_empty());
    }
}
