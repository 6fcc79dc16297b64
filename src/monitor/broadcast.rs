//! Live event fan-out to connected observers.
//!
//! Each subscriber owns a bounded queue. Publishing never blocks: when a
//! subscriber falls behind and its queue is full, its oldest queued message is
//! dropped. There is no replay for late joiners.

use super::types::LiveMessage;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::Notify;

/// Default per-subscriber queue length.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

pub type SubscriberId = u64;

struct SubscriberQueue {
    messages: Mutex<VecDeque<LiveMessage>>,
    notify: Notify,
    closed: AtomicBool,
    dropped: AtomicU64,
    capacity: usize,
}

impl SubscriberQueue {
    fn new(capacity: usize) -> Self {
        Self {
            messages: Mutex::new(VecDeque::with_capacity(capacity.min(64))),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
            capacity,
        }
    }

    /// Enqueue, dropping the oldest message when full. Returns false if a
    /// message was dropped.
    fn push(&self, message: LiveMessage) -> bool {
        let mut dropped_one = false;
        {
            let mut messages = lock(&self.messages);
            if messages.len() >= self.capacity {
                messages.pop_front();
                dropped_one = true;
            }
            messages.push_back(message);
        }
        if dropped_one {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        self.notify.notify_one();
        !dropped_one
    }

    fn pop(&self) -> Option<LiveMessage> {
        lock(&self.messages).pop_front()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

struct Registry {
    subscribers: Mutex<HashMap<SubscriberId, Arc<SubscriberQueue>>>,
    next_id: AtomicU64,
    queue_capacity: usize,
}

impl Registry {
    fn remove(&self, id: SubscriberId) -> bool {
        match lock(&self.subscribers).remove(&id) {
            Some(queue) => {
                queue.close();
                true
            }
            None => false,
        }
    }
}

/// Publish/subscribe registry for [`LiveMessage`]s.
#[derive(Clone)]
pub struct LiveBroadcaster {
    registry: Arc<Registry>,
}

impl LiveBroadcaster {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            registry: Arc::new(Registry {
                subscribers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                queue_capacity: queue_capacity.max(1),
            }),
        }
    }

    /// Register a subscriber with an empty queue.
    pub fn subscribe(&self) -> Subscription {
        self.register::<fn() -> LiveMessage>(None)
    }

    /// Register a subscriber whose first message is produced by `initial`.
    ///
    /// `initial` runs while the registry is locked, so no broadcast can land
    /// in the new queue ahead of it.
    pub fn subscribe_with<F>(&self, initial: F) -> Subscription
    where
        F: FnOnce() -> LiveMessage,
    {
        self.register(Some(initial))
    }

    fn register<F>(&self, initial: Option<F>) -> Subscription
    where
        F: FnOnce() -> LiveMessage,
    {
        let queue = Arc::new(SubscriberQueue::new(self.registry.queue_capacity));
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);

        {
            let mut subscribers = lock(&self.registry.subscribers);
            if let Some(initial) = initial {
                queue.push(initial());
            }
            subscribers.insert(id, Arc::clone(&queue));
        }

        tracing::debug!(subscriber_id = id, "Live subscriber registered");

        Subscription {
            id,
            queue,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Remove a subscriber. Its pending `recv` returns `None` once drained.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.registry.remove(id);
        if removed {
            tracing::debug!(subscriber_id = id, "Live subscriber removed");
        }
        removed
    }

    /// Deliver `message` to every open subscriber. Returns how many received it.
    pub fn broadcast(&self, message: LiveMessage) -> usize {
        self.publish_with(|| {}, message)
    }

    /// Run `record` and deliver `message` under the registry lock.
    ///
    /// A subscriber registered through [`subscribe_with`](Self::subscribe_with)
    /// sees the effect of `record` either in its initial message or as the
    /// live `message`, never both. Concurrent publishers are delivered in the
    /// order their `record` calls ran.
    pub fn publish_with<F>(&self, record: F, message: LiveMessage) -> usize
    where
        F: FnOnce(),
    {
        let mut subscribers = lock(&self.registry.subscribers);
        record();
        subscribers.retain(|_, queue| !queue.is_closed());

        let mut dropped = 0u64;
        for queue in subscribers.values() {
            if !queue.push(message.clone()) {
                dropped += 1;
            }
        }
        if dropped > 0 {
            tracing::debug!(kind = message.kind(), dropped, "Slow subscribers dropped oldest message");
            metrics::counter!("insight_broadcast_dropped_total").increment(dropped);
        }
        subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.registry.subscribers)
            .values()
            .filter(|q| !q.is_closed())
            .count()
    }
}

impl Default for LiveBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

/// Receiving end for one subscriber. Dropping it unsubscribes.
pub struct Subscription {
    id: SubscriberId,
    queue: Arc<SubscriberQueue>,
    registry: Weak<Registry>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next message, waiting if none is queued. `None` after unsubscribe.
    pub async fn recv(&mut self) -> Option<LiveMessage> {
        loop {
            if let Some(message) = self.queue.pop() {
                return Some(message);
            }
            if self.queue.is_closed() {
                return None;
            }
            self.queue.notify.notified().await;
        }
    }

    /// Next message if one is already queued.
    pub fn try_recv(&mut self) -> Option<LiveMessage> {
        self.queue.pop()
    }

    /// Messages discarded because this subscriber fell behind.
    pub fn dropped(&self) -> u64 {
        self.queue.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.queue.close();
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::types::{ErrorEvent, RequestEvent};
    use std::time::Duration;

    fn request(path: &str) -> LiveMessage {
        LiveMessage::Request(RequestEvent::new("GET", path, 200, 1))
    }

    fn path_of(message: &LiveMessage) -> &str {
        match message {
            LiveMessage::Request(r) => &r.path,
            LiveMessage::Error(e) => &e.path,
            LiveMessage::Analytics(_) => "analytics",
        }
    }

    #[tokio::test]
    async fn test_broadcast_preserves_order_per_subscriber() {
        let broadcaster = LiveBroadcaster::default();
        let mut a = broadcaster.subscribe();
        let mut b = broadcaster.subscribe();

        for i in 0..5 {
            assert_eq!(broadcaster.broadcast(request(&format!("/{}", i))), 2);
        }

        for sub in [&mut a, &mut b] {
            for i in 0..5 {
                let msg = sub.recv().await.unwrap();
                assert_eq!(path_of(&msg), format!("/{}", i));
            }
            assert!(sub.try_recv().is_none());
        }
    }

    #[tokio::test]
    async fn test_initial_message_comes_first() {
        let broadcaster = LiveBroadcaster::default();
        broadcaster.broadcast(request("/before"));

        let mut sub = broadcaster.subscribe_with(|| LiveMessage::Error(ErrorEvent::new("/init", "x")));
        broadcaster.broadcast(request("/after"));

        assert_eq!(path_of(&sub.recv().await.unwrap()), "/init");
        assert_eq!(path_of(&sub.recv().await.unwrap()), "/after");
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_full_queue_drops_oldest() {
        let broadcaster = LiveBroadcaster::new(3);
        let mut sub = broadcaster.subscribe();

        for i in 0..5 {
            broadcaster.broadcast(request(&format!("/{}", i)));
        }

        assert_eq!(sub.dropped(), 2);
        let received: Vec<String> = std::iter::from_fn(|| sub.try_recv())
            .map(|m| path_of(&m).to_string())
            .collect();
        assert_eq!(received, vec!["/2", "/3", "/4"]);
    }

    #[tokio::test]
    async fn test_unsubscribe_ends_stream() {
        let broadcaster = LiveBroadcaster::default();
        let mut sub = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 1);

        assert!(broadcaster.unsubscribe(sub.id()));
        assert!(!broadcaster.unsubscribe(sub.id()));
        assert_eq!(broadcaster.broadcast(request("/ignored")), 0);
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_dropped_subscription_is_pruned() {
        let broadcaster = LiveBroadcaster::default();
        let sub = broadcaster.subscribe();
        let _keep = broadcaster.subscribe();
        drop(sub);

        assert_eq!(broadcaster.subscriber_count(), 1);
        assert_eq!(broadcaster.broadcast(request("/x")), 1);
    }

    #[test]
    fn test_publish_with_runs_record_before_delivery() {
        let broadcaster = LiveBroadcaster::default();
        let mut sub = broadcaster.subscribe();
        let recorded = std::sync::atomic::AtomicBool::new(false);

        let delivered = broadcaster.publish_with(
            || recorded.store(true, Ordering::SeqCst),
            request("/recorded"),
        );

        assert_eq!(delivered, 1);
        assert!(recorded.load(Ordering::SeqCst));
        assert_eq!(path_of(&sub.try_recv().unwrap()), "/recorded");
    }

    #[tokio::test]
    async fn test_recv_wakes_on_broadcast() {
        let broadcaster = LiveBroadcaster::default();
        let mut sub = broadcaster.subscribe();

        let publisher = broadcaster.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            publisher.broadcast(request("/late"));
        });

        let msg = tokio::time::timeout(Duration::from_secs(2), sub.recv())
            .await
            .expect("recv should wake")
            .unwrap();
        assert_eq!(path_of(&msg), "/late");
    }
}
