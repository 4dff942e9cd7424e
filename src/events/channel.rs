//! # Topic-keyed publish/subscribe channel.
//!
//! [`Channel`] delivers a payload to every callback registered for a topic,
//! synchronously and in registration order.
//!
//! ## Rules
//! - **Snapshot dispatch**: the subscriber list is copied before any callback runs,
//!   so subscribing/unsubscribing from inside a callback only affects later publishes.
//! - **Isolation**: a panicking callback is caught and logged; delivery continues
//!   with the remaining subscribers.
//! - **Per-topic order only**: there is no ordering guarantee across topics.
//! - **Wildcard**: callbacks on [`ALL_TOPICS`] run after the topic's own subscribers.
//!
//! ```text
//! publish(topic, &payload)
//!     ├─► lock ─► snapshot [cb1, cb2, once3] ─► drop once3 from list ─► unlock
//!     ├─► cb1(&payload)
//!     ├─► cb2(&payload)   (panic → tracing::error, continue)
//!     └─► once3(&payload)
//! ```

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::error::panic_message;

/// Topic that receives every published payload.
pub const ALL_TOPICS: &str = "*";

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Entry<T> {
    id: u64,
    once: bool,
    callback: Callback<T>,
}

struct Inner<T> {
    topics: HashMap<String, Vec<Entry<T>>>,
    next_id: u64,
}

impl<T> Inner<T> {
    fn remove(&mut self, topic: &str, id: u64) -> bool {
        let Some(list) = self.topics.get_mut(topic) else {
            return false;
        };
        let before = list.len();
        list.retain(|e| e.id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            self.topics.remove(topic);
        }
        removed
    }

    /// Copies the callbacks for `topic`, dropping `once` entries from the live list.
    fn snapshot(&mut self, topic: &str) -> Vec<Callback<T>> {
        let Some(list) = self.topics.get_mut(topic) else {
            return Vec::new();
        };
        let callbacks = list.iter().map(|e| Arc::clone(&e.callback)).collect();
        list.retain(|e| !e.once);
        if list.is_empty() {
            self.topics.remove(topic);
        }
        callbacks
    }
}

/// Synchronous publish/subscribe channel keyed by topic.
///
/// Cheap to clone: clones share the same subscriber table.
pub struct Channel<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Channel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let topics = self.lock().topics.len();
        f.debug_struct("Channel").field("topics", &topics).finish()
    }
}

impl<T> Channel<T> {
    /// Creates an empty channel.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                topics: HashMap::new(),
                next_id: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of callbacks currently registered for `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.lock().topics.get(topic).map_or(0, Vec::len)
    }

    /// Drops every subscriber of `topic`, or of all topics when `None`.
    pub fn clear(&self, topic: Option<&str>) {
        let mut inner = self.lock();
        match topic {
            Some(t) => {
                inner.topics.remove(t);
            }
            None => inner.topics.clear(),
        }
    }
}

impl<T: 'static> Channel<T> {
    /// Registers `callback` for `topic`.
    ///
    /// Dropping the returned [`Subscription`] keeps the callback registered;
    /// call [`Subscription::unsubscribe`] to remove it.
    pub fn subscribe<F>(&self, topic: impl Into<String>, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.add(topic.into(), Arc::new(callback), false)
    }

    /// Registers `callback` for `topic`; it is removed after its first delivery.
    pub fn subscribe_once<F>(&self, topic: impl Into<String>, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.add(topic.into(), Arc::new(callback), true)
    }

    /// Registers `callback` for every topic.
    pub fn subscribe_all<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.add(ALL_TOPICS.to_string(), Arc::new(callback), false)
    }

    fn add(&self, topic: String, callback: Callback<T>, once: bool) -> Subscription {
        let id = {
            let mut inner = self.lock();
            let id = inner.next_id;
            inner.next_id += 1;
            inner
                .topics
                .entry(topic.clone())
                .or_default()
                .push(Entry { id, once, callback });
            id
        };

        let weak: Weak<Mutex<Inner<T>>> = Arc::downgrade(&self.inner);
        Subscription {
            remove: Some(Box::new(move || {
                let Some(inner) = weak.upgrade() else {
                    return false;
                };
                let mut inner = inner.lock().unwrap_or_else(PoisonError::into_inner);
                inner.remove(&topic, id)
            })),
        }
    }

    /// Invokes every callback of `topic` (then the wildcard ones) with `payload`.
    ///
    /// Returns the number of callbacks that ran to completion.
    pub fn publish(&self, topic: &str, payload: &T) -> usize {
        let (direct, wildcard) = {
            let mut inner = self.lock();
            let direct = inner.snapshot(topic);
            let wildcard = if topic == ALL_TOPICS {
                Vec::new()
            } else {
                inner.snapshot(ALL_TOPICS)
            };
            (direct, wildcard)
        };

        let mut delivered = 0;
        for cb in direct.iter().chain(wildcard.iter()) {
            match panic::catch_unwind(AssertUnwindSafe(|| cb(payload))) {
                Ok(()) => delivered += 1,
                Err(payload) => {
                    tracing::error!(
                        topic,
                        panic = %panic_message(payload.as_ref()),
                        "event subscriber panicked"
                    );
                }
            }
        }
        delivered
    }
}

/// Handle returned by `subscribe*` calls.
///
/// Invoking [`unsubscribe`](Subscription::unsubscribe) removes the callback.
pub struct Subscription {
    remove: Option<Box<dyn FnOnce() -> bool + Send + Sync>>,
}

impl Subscription {
    /// Removes the callback. Returns `false` if it was already gone
    /// (for example a `subscribe_once` callback that already fired).
    pub fn unsubscribe(mut self) -> bool {
        self.remove.take().is_some_and(|remove| remove())
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.remove.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recorder() -> (Arc<Mutex<Vec<String>>>, Channel<u32>) {
        (Arc::new(Mutex::new(Vec::new())), Channel::new())
    }

    #[test]
    fn delivers_in_registration_order() {
        let (log, ch) = recorder();
        for name in ["a", "b", "c"] {
            let log = Arc::clone(&log);
            ch.subscribe("t", move |v: &u32| log.lock().unwrap().push(format!("{name}{v}")));
        }
        assert_eq!(ch.publish("t", &7), 3);
        assert_eq!(*log.lock().unwrap(), vec!["a7", "b7", "c7"]);
    }

    #[test]
    fn panicking_subscriber_does_not_stop_delivery() {
        let (log, ch) = recorder();
        ch.subscribe("t", |_: &u32| panic!("bad subscriber"));
        let l = Arc::clone(&log);
        ch.subscribe("t", move |_: &u32| l.lock().unwrap().push("after".into()));

        assert_eq!(ch.publish("t", &1), 1);
        assert_eq!(*log.lock().unwrap(), vec!["after"]);
    }

    #[test]
    fn subscribe_during_dispatch_waits_for_next_publish() {
        let ch: Channel<u32> = Channel::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let inner_ch = ch.clone();
        let inner_hits = Arc::clone(&hits);
        ch.subscribe_once("t", move |_: &u32| {
            let h = Arc::clone(&inner_hits);
            inner_ch.subscribe("t", move |_: &u32| {
                h.fetch_add(1, Ordering::SeqCst);
            });
        });

        ch.publish("t", &1);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        ch.publish("t", &2);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn once_and_unsubscribe() {
        let ch: Channel<u32> = Channel::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let h = Arc::clone(&hits);
        let once = ch.subscribe_once("t", move |_: &u32| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        ch.publish("t", &1);
        ch.publish("t", &2);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!once.unsubscribe());

        let h = Arc::clone(&hits);
        let sub = ch.subscribe("t", move |_: &u32| {
            h.fetch_add(10, Ordering::SeqCst);
        });
        assert_eq!(ch.subscriber_count("t"), 1);
        assert!(sub.unsubscribe());
        ch.publish("t", &3);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(ch.subscriber_count("t"), 0);
    }

    #[test]
    fn wildcard_sees_every_topic() {
        let (log, ch) = recorder();
        let l = Arc::clone(&log);
        ch.subscribe_all(move |v: &u32| l.lock().unwrap().push(format!("all{v}")));
        ch.publish("x", &1);
        ch.publish("y", &2);
        assert_eq!(*log.lock().unwrap(), vec!["all1", "all2"]);
    }
}
