//! Topic-scoped publish/subscribe used to route UI events to the session
//! waiting for them.
//!
//! Every live subscription on a topic receives every publish on that topic,
//! in registration order. The subscription's scope is recorded for logging
//! only: callbacks compare [`Delivery::actor_id`] against the user they serve
//! and drop foreign events themselves.

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// UI events a session can wait for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    EditNameRequested,
    NameSubmitted,
    Cancelled,
    Confirmed,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::EditNameRequested => "edit-name-requested",
            Topic::NameSubmitted => "name-submitted",
            Topic::Cancelled => "cancelled",
            Topic::Confirmed => "confirmed",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One published event as seen by a callback.
#[derive(Debug, Clone)]
pub struct Delivery<E> {
    pub topic: Topic,
    /// User whose action produced the event.
    pub actor_id: String,
    pub payload: E,
}

/// Registration token returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    id: u64,
    topic: Topic,
    scope: String,
}

impl SubscriptionHandle {
    pub fn topic(&self) -> Topic {
        self.topic
    }
}

type Callback<E> = Arc<dyn Fn(Delivery<E>) -> BoxFuture<'static, ()> + Send + Sync>;

struct Subscription<E> {
    handle: SubscriptionHandle,
    callback: Callback<E>,
}

/// In-memory event bus. Nothing survives a restart.
pub struct EventBus<E> {
    next_id: AtomicU64,
    subscriptions: Mutex<Vec<Subscription<E>>>,
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            subscriptions: Mutex::new(Vec::new()),
        }
    }
}

impl<E: Clone + Send + 'static> EventBus<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for every publish on `topic`.
    pub fn subscribe<F, Fut>(
        &self,
        topic: Topic,
        scope: impl Into<String>,
        callback: F,
    ) -> SubscriptionHandle
    where
        F: Fn(Delivery<E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = SubscriptionHandle {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            topic,
            scope: scope.into(),
        };
        let callback: Callback<E> = Arc::new(move |delivery| callback(delivery).boxed());
        self.subscriptions.lock().push(Subscription {
            handle: handle.clone(),
            callback,
        });
        debug!(topic = %topic, scope = %handle.scope, "Subscribed");
        handle
    }

    /// Remove a subscription. Returns whether it was still registered;
    /// removing twice is a no-op.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        let mut subscriptions = self.subscriptions.lock();
        let before = subscriptions.len();
        subscriptions.retain(|s| s.handle.id != handle.id);
        before != subscriptions.len()
    }

    /// Whether `handle` is still registered.
    pub fn is_live(&self, handle: &SubscriptionHandle) -> bool {
        self.subscriptions
            .lock()
            .iter()
            .any(|s| s.handle.id == handle.id)
    }

    /// Number of registered subscriptions.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.subscriptions.lock().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.lock().is_empty()
    }

    /// Deliver `payload` to every live subscription on `topic`, one after the
    /// other. Returns the number of callbacks invoked.
    pub async fn publish(&self, topic: Topic, actor_id: &str, payload: E) -> usize {
        let targets: Vec<(SubscriptionHandle, Callback<E>)> = self
            .subscriptions
            .lock()
            .iter()
            .filter(|s| s.handle.topic == topic)
            .map(|s| (s.handle.clone(), Arc::clone(&s.callback)))
            .collect();

        let mut delivered = 0;
        for (handle, callback) in targets {
            // An earlier callback may have torn this one down.
            if !self.is_live(&handle) {
                continue;
            }
            callback(Delivery {
                topic,
                actor_id: actor_id.to_string(),
                payload: payload.clone(),
            })
            .await;
            delivered += 1;
        }
        debug!(topic = %topic, actor_id = %actor_id, delivered, "Published");
        delivered
    }
}
