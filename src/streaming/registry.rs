//! Trace Registry
//!
//! Routes streamed search events to every subscriber of a trace id.
//! Several consumers (a panel, a debug console) may watch the same trace;
//! each event is broadcast to all of them. Each trace also holds the abort
//! handle of its in-flight request so it can be cancelled.

use futures_util::future::AbortHandle;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::events::{StreamEvent, TraceId};

/// Unique identifier for a subscription
pub type SubscriptionId = String;

/// Per-trace state: subscribers and the in-flight request
#[derive(Default)]
struct TraceChannel {
    subscribers: HashMap<SubscriptionId, mpsc::UnboundedSender<StreamEvent>>,
    abort: Option<AbortHandle>,
}

/// Registry of trace channels
///
/// Cloning shares the same registry.
#[derive(Clone, Default)]
pub struct TraceRegistry {
    channels: Arc<RwLock<HashMap<TraceId, TraceChannel>>>,
}

impl TraceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<TraceId, TraceChannel>> {
        self.channels.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<TraceId, TraceChannel>> {
        self.channels.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribe to a trace, creating it if needed
    pub fn subscribe(&self, trace_id: &str) -> Subscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = Uuid::new_v4().to_string();

        self.write()
            .entry(trace_id.to_string())
            .or_default()
            .subscribers
            .insert(id.clone(), sender);

        tracing::debug!(trace_id = %trace_id, subscription = %id, "Subscribed to trace");

        Subscription {
            id,
            trace_id: trace_id.to_string(),
            receiver,
            registry: self.clone(),
        }
    }

    /// Remove a subscription; returns whether it existed
    pub fn unsubscribe(&self, trace_id: &str, id: &str) -> bool {
        let mut channels = self.write();
        let Some(channel) = channels.get_mut(trace_id) else {
            return false;
        };

        let removed = channel.subscribers.remove(id).is_some();

        // Clean up idle trace entries
        if channel.subscribers.is_empty() && channel.abort.is_none() {
            channels.remove(trace_id);
        }

        if removed {
            tracing::debug!(trace_id = %trace_id, subscription = %id, "Unsubscribed from trace");
        }
        removed
    }

    /// Record the in-flight request for a trace
    ///
    /// A request already registered under the same trace is aborted first.
    pub fn begin(&self, trace_id: &str, abort: AbortHandle) {
        let previous = self
            .write()
            .entry(trace_id.to_string())
            .or_default()
            .abort
            .replace(abort);

        if let Some(previous) = previous {
            tracing::debug!(trace_id = %trace_id, "Aborting previous request for trace");
            previous.abort();
        }
    }

    /// Deliver an event to every subscriber of a trace
    ///
    /// Returns the number of subscribers reached. Subscribers whose receiver
    /// is gone are pruned.
    pub fn publish(&self, trace_id: &str, event: StreamEvent) -> usize {
        let mut channels = self.write();
        let Some(channel) = channels.get_mut(trace_id) else {
            return 0;
        };

        channel
            .subscribers
            .retain(|_, sender| sender.send(event.clone()).is_ok());
        let sent_count = channel.subscribers.len();

        if sent_count > 0 {
            tracing::trace!(trace_id = %trace_id, subscribers = sent_count, "Published event");
        }
        sent_count
    }

    /// Mark the in-flight request finished and notify subscribers
    ///
    /// The trace is dropped when nobody is left to hear about it.
    pub fn complete(&self, trace_id: &str) -> usize {
        let mut channels = self.write();
        let Some(channel) = channels.get_mut(trace_id) else {
            return 0;
        };

        channel.abort = None;
        channel
            .subscribers
            .retain(|_, sender| sender.send(StreamEvent::Complete).is_ok());
        let sent_count = channel.subscribers.len();

        if sent_count == 0 {
            channels.remove(trace_id);
            tracing::debug!(trace_id = %trace_id, "Completed trace has no subscribers, removing");
        }
        sent_count
    }

    /// Tell subscribers to drop what they accumulated
    pub fn reset(&self, trace_id: &str) -> usize {
        self.publish(trace_id, StreamEvent::Reset)
    }

    /// Abort the in-flight request and close the trace
    ///
    /// Every current subscriber receives exactly one `Cancelled`, after which
    /// its receiver yields `None`. Returns whether the trace existed.
    pub fn cancel(&self, trace_id: &str) -> bool {
        let Some(channel) = self.write().remove(trace_id) else {
            return false;
        };

        if let Some(abort) = channel.abort {
            abort.abort();
        }

        for sender in channel.subscribers.values() {
            let _ = sender.send(StreamEvent::Cancelled);
        }

        tracing::debug!(
            trace_id = %trace_id,
            subscribers = channel.subscribers.len(),
            "Cancelled trace"
        );
        true
    }

    /// A request is currently registered for the trace
    pub fn is_in_flight(&self, trace_id: &str) -> bool {
        self.read()
            .get(trace_id)
            .map(|channel| channel.abort.is_some())
            .unwrap_or(false)
    }

    pub fn subscriber_count(&self, trace_id: &str) -> usize {
        self.read()
            .get(trace_id)
            .map(|channel| channel.subscribers.len())
            .unwrap_or(0)
    }

    pub fn trace_count(&self) -> usize {
        self.read().len()
    }
}

/// A live subscription to one trace
///
/// Dropping the subscription unsubscribes it.
pub struct Subscription {
    id: SubscriptionId,
    trace_id: TraceId,
    receiver: mpsc::UnboundedReceiver<StreamEvent>,
    registry: TraceRegistry,
}

impl Subscription {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Wait for the next event; `None` once the trace is closed
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.receiver.recv().await
    }

    /// Next event if one is already queued
    pub fn try_recv(&mut self) -> Option<StreamEvent> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.unsubscribe(&self.trace_id, &self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::future::{AbortHandle, Abortable};
    use serde_json::json;

    #[test]
    fn test_subscribe_unsubscribe() {
        let registry = TraceRegistry::new();
        let sub = registry.subscribe("t1");
        assert_eq!(registry.subscriber_count("t1"), 1);

        let id = sub.id().to_string();
        drop(sub);
        assert_eq!(registry.subscriber_count("t1"), 0);
        assert_eq!(registry.trace_count(), 0);
        assert!(!registry.unsubscribe("t1", &id));
    }

    #[test]
    fn test_broadcast_to_all_subscribers() {
        let registry = TraceRegistry::new();
        let mut panel = registry.subscribe("t1");
        let mut console = registry.subscribe("t1");
        let mut other = registry.subscribe("t2");

        let sent = registry.publish("t1", StreamEvent::Data(json!({"n": 1})));
        assert_eq!(sent, 2);

        assert_eq!(panel.try_recv(), Some(StreamEvent::Data(json!({"n": 1}))));
        assert_eq!(console.try_recv(), Some(StreamEvent::Data(json!({"n": 1}))));
        assert_eq!(other.try_recv(), None);
    }

    #[test]
    fn test_publish_unknown_trace() {
        let registry = TraceRegistry::new();
        assert_eq!(registry.publish("missing", StreamEvent::Complete), 0);
    }

    #[tokio::test]
    async fn test_cancel_notifies_once_and_closes() {
        let registry = TraceRegistry::new();
        let mut a = registry.subscribe("t1");
        let mut b = registry.subscribe("t1");

        assert!(registry.cancel("t1"));
        assert!(!registry.cancel("t1"));

        assert_eq!(a.recv().await, Some(StreamEvent::Cancelled));
        assert_eq!(a.recv().await, None);
        assert_eq!(b.recv().await, Some(StreamEvent::Cancelled));
        assert_eq!(b.recv().await, None);
        assert_eq!(registry.trace_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_aborts_in_flight() {
        let registry = TraceRegistry::new();
        let _sub = registry.subscribe("t1");

        let (handle, registration) = AbortHandle::new_pair();
        registry.begin("t1", handle);
        assert!(registry.is_in_flight("t1"));

        let request = Abortable::new(std::future::pending::<()>(), registration);
        registry.cancel("t1");
        assert!(request.await.is_err());
    }

    #[tokio::test]
    async fn test_begin_aborts_previous() {
        let registry = TraceRegistry::new();

        let (first, first_reg) = AbortHandle::new_pair();
        let (second, second_reg) = AbortHandle::new_pair();
        registry.begin("t1", first);
        registry.begin("t1", second);

        assert!(Abortable::new(std::future::pending::<()>(), first_reg).await.is_err());

        registry.complete("t1");
        assert!(!registry.is_in_flight("t1"));
        let still_running = Abortable::new(std::future::ready(7), second_reg);
        assert_eq!(still_running.await.ok(), Some(7));
    }

    #[test]
    fn test_complete_without_subscribers_removes_trace() {
        let registry = TraceRegistry::new();
        for i in 0..100 {
            let trace_id = format!("t{}", i);
            let (handle, _registration) = AbortHandle::new_pair();
            registry.begin(&trace_id, handle);
            assert_eq!(registry.complete(&trace_id), 0);
        }
        assert_eq!(registry.trace_count(), 0);
        assert_eq!(registry.complete("missing"), 0);
    }

    #[test]
    fn test_complete_after_subscriber_left_removes_trace() {
        let registry = TraceRegistry::new();
        let sub = registry.subscribe("t1");
        let (handle, _registration) = AbortHandle::new_pair();
        registry.begin("t1", handle);

        drop(sub);
        // still held open by the in-flight request
        assert_eq!(registry.trace_count(), 1);

        registry.complete("t1");
        assert_eq!(registry.trace_count(), 0);
    }

    #[test]
    fn test_complete_keeps_watched_trace() {
        let registry = TraceRegistry::new();
        let mut sub = registry.subscribe("t1");
        let (handle, _registration) = AbortHandle::new_pair();
        registry.begin("t1", handle);

        assert_eq!(registry.complete("t1"), 1);
        assert_eq!(sub.try_recv(), Some(StreamEvent::Complete));
        assert_eq!(registry.trace_count(), 1);
        assert!(!registry.is_in_flight("t1"));
    }

    #[test]
    fn test_closed_receiver_pruned() {
        let registry = TraceRegistry::new();
        let _keep = registry.subscribe("t1");

        let (dead, receiver) = mpsc::unbounded_channel();
        drop(receiver);
        registry
            .write()
            .get_mut("t1")
            .unwrap()
            .subscribers
            .insert("dead".to_string(), dead);
        assert_eq!(registry.subscriber_count("t1"), 2);

        assert_eq!(registry.publish("t1", StreamEvent::Reset), 1);
        assert_eq!(registry.subscriber_count("t1"), 1);
    }
}
