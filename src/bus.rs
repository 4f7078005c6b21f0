//! Progress bus: fan-out of job events to any number of subscribers
//!
//! Subscribers register either for a single job or for every job. Delivery is
//! unbounded per subscriber so a slow consumer never blocks a transfer; when a
//! subscriber's backlog crosses the configured threshold a warning is logged.
//!
//! Events are not replayed. A subscriber attached after a job terminated sees
//! nothing for it; use [`Downloader::query`](crate::Downloader::query) for
//! after-the-fact state.

use crate::types::{Event, JobId};
use futures::Stream;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Which events a subscription receives
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Topic {
    /// Every event on the bus
    All,
    /// Only events for one job
    Job(JobId),
}

impl Topic {
    fn matches(&self, event: &Event) -> bool {
        match self {
            Topic::All => true,
            Topic::Job(id) => event.job_id() == id,
        }
    }
}

struct Subscriber {
    topic: Topic,
    tx: mpsc::UnboundedSender<Event>,
    backlog: Arc<AtomicUsize>,
}

struct BusInner {
    subscribers: Mutex<HashMap<u64, Subscriber>>,
    next_id: AtomicU64,
    backlog_warn_threshold: usize,
}

impl BusInner {
    fn remove(&self, id: u64) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.remove(&id);
        }
    }
}

/// Broadcast channel for job events (cloneable, clones share subscribers)
#[derive(Clone)]
pub struct ProgressBus {
    inner: Arc<BusInner>,
}

impl ProgressBus {
    /// Create an empty bus
    pub fn new(backlog_warn_threshold: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                subscribers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
                backlog_warn_threshold: backlog_warn_threshold.max(1),
            }),
        }
    }

    /// Deliver an event to every matching subscriber
    ///
    /// Never blocks on consumers. Subscribers whose receiving half is gone are
    /// pruned here.
    pub fn publish(&self, event: Event) {
        let Ok(mut subscribers) = self.inner.subscribers.lock() else {
            tracing::error!("progress bus lock poisoned, dropping event");
            return;
        };

        let threshold = self.inner.backlog_warn_threshold;
        subscribers.retain(|sub_id, sub| {
            if !sub.topic.matches(&event) {
                return !sub.tx.is_closed();
            }

            if sub.tx.send(event.clone()).is_err() {
                return false;
            }

            let pending = sub.backlog.fetch_add(1, Ordering::Relaxed) + 1;
            if pending % threshold == 0 {
                tracing::warn!(
                    subscriber = sub_id,
                    pending,
                    job_id = %event.job_id(),
                    "progress subscriber is falling behind"
                );
            }
            true
        });
    }

    /// Subscribe to a topic
    pub fn subscribe(&self, topic: Topic) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        let backlog = Arc::new(AtomicUsize::new(0));

        if let Ok(mut subscribers) = self.inner.subscribers.lock() {
            subscribers.insert(
                id,
                Subscriber {
                    topic: topic.clone(),
                    tx,
                    backlog: backlog.clone(),
                },
            );
        }

        tracing::debug!(subscriber = id, ?topic, "progress subscriber attached");

        Subscription {
            id,
            topic,
            rx,
            backlog,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Subscribe to every job
    pub fn subscribe_all(&self) -> Subscription {
        self.subscribe(Topic::All)
    }

    /// Subscribe to a single job
    pub fn subscribe_job(&self, id: JobId) -> Subscription {
        self.subscribe(Topic::Job(id))
    }

    /// Number of attached subscribers
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .lock()
            .map(|subscribers| subscribers.len())
            .unwrap_or(0)
    }
}

/// Receiving half of a bus subscription
///
/// Detaches from the bus when dropped, so every exit path (including a consumer task
/// being aborted) releases it. Also usable as a [`Stream`].
pub struct Subscription {
    id: u64,
    topic: Topic,
    rx: mpsc::UnboundedReceiver<Event>,
    backlog: Arc<AtomicUsize>,
    bus: Weak<BusInner>,
}

impl Subscription {
    /// Wait for the next event; `None` once the bus is gone
    pub async fn recv(&mut self) -> Option<Event> {
        let event = self.rx.recv().await;
        if event.is_some() {
            self.backlog.fetch_sub(1, Ordering::Relaxed);
        }
        event
    }

    /// Next event if one is already queued
    pub fn try_recv(&mut self) -> Option<Event> {
        let event = self.rx.try_recv().ok();
        if event.is_some() {
            self.backlog.fetch_sub(1, Ordering::Relaxed);
        }
        event
    }

    /// The topic this subscription was created with
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Detach from the bus
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Stream for Subscription {
    type Item = Event;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let polled = this.rx.poll_recv(cx);
        if let Poll::Ready(Some(_)) = &polled {
            this.backlog.fetch_sub(1, Ordering::Relaxed);
        }
        polled
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.remove(self.id);
            tracing::debug!(subscriber = self.id, "progress subscriber detached");
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn progress(id: &str, pct: f32) -> Event {
        Event::DownloadProgress {
            id: JobId::from(id),
            progress: Some(pct),
            downloaded_bytes: pct as u64,
            total_bytes: Some(100),
        }
    }

    #[tokio::test]
    async fn job_subscriber_only_sees_its_job() {
        let bus = ProgressBus::new(1000);
        let mut sub = bus.subscribe_job(JobId::from("a"));

        bus.publish(progress("b", 10.0));
        bus.publish(progress("a", 20.0));

        assert_eq!(sub.recv().await, Some(progress("a", 20.0)));
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn wildcard_subscriber_sees_everything_in_order() {
        let bus = ProgressBus::new(1000);
        let mut sub = bus.subscribe_all();

        for pct in [1.0, 2.0, 3.0] {
            bus.publish(progress("a", pct));
            bus.publish(progress("b", pct));
        }

        let mut a_seen = Vec::new();
        while let Some(event) = sub.try_recv() {
            if event.job_id().as_str() == "a" {
                a_seen.push(event);
            }
        }
        assert_eq!(
            a_seen,
            vec![progress("a", 1.0), progress("a", 2.0), progress("a", 3.0)]
        );
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_a_no_op() {
        let bus = ProgressBus::new(1000);
        bus.publish(progress("a", 1.0));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn dropping_a_subscription_detaches_it() {
        let bus = ProgressBus::new(1000);
        let sub = bus.subscribe_all();
        let other = bus.subscribe_job(JobId::from("x"));
        assert_eq!(bus.subscriber_count(), 2);

        sub.unsubscribe();
        assert_eq!(bus.subscriber_count(), 1);

        drop(other);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn aborted_consumer_task_releases_subscription() {
        let bus = ProgressBus::new(1000);
        let mut sub = bus.subscribe_all();

        let handle = tokio::spawn(async move {
            // Never receives anything; aborted below
            sub.recv().await
        });
        tokio::task::yield_now().await;
        handle.abort();
        let _ = handle.await;

        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn slow_subscriber_does_not_block_publisher() {
        let bus = ProgressBus::new(10);
        let mut sub = bus.subscribe_all();

        for i in 0..500 {
            bus.publish(progress("a", i as f32));
        }

        let mut count = 0;
        while sub.try_recv().is_some() {
            count += 1;
        }
        assert_eq!(count, 500);
    }

    #[tokio::test]
    async fn subscription_works_as_stream() {
        let bus = ProgressBus::new(1000);
        let sub = bus.subscribe_job(JobId::from("a"));

        bus.publish(progress("a", 5.0));
        bus.publish(Event::DownloadCancelled {
            id: JobId::from("a"),
        });

        let events: Vec<Event> = sub.take(2).collect().await;
        assert_eq!(events.len(), 2);
        assert!(events[1].is_terminal());
    }

    #[tokio::test]
    async fn recv_returns_none_after_bus_is_dropped() {
        let bus = ProgressBus::new(1000);
        let mut sub = bus.subscribe_all();
        drop(bus);
        assert_eq!(sub.recv().await, None);
    }
}
