//! One logical search across repeated requests

use crate::streaming::{new_trace_id, Subscription, TraceId, TraceRegistry};

/// Tracks the trace of the latest request for one search
///
/// Starting a new request cancels the previous one, so a stale response can
/// never land after a newer one. Dropping the session cancels whatever is
/// still running.
pub struct SearchSession {
    registry: TraceRegistry,
    current: Option<TraceId>,
}

impl SearchSession {
    pub fn new(registry: TraceRegistry) -> Self {
        Self {
            registry,
            current: None,
        }
    }

    pub fn registry(&self) -> &TraceRegistry {
        &self.registry
    }

    /// Trace id of the latest request, if any
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Cancel the previous request and allocate a trace for the next one
    pub fn start(&mut self) -> TraceId {
        self.cancel();

        let trace_id = new_trace_id();
        tracing::debug!(trace_id = %trace_id, "Starting search request");
        self.current = Some(trace_id.clone());
        trace_id
    }

    /// Start a request and subscribe to it in one step
    pub fn start_subscribed(&mut self) -> (TraceId, Subscription) {
        let trace_id = self.start();
        let subscription = self.registry.subscribe(&trace_id);
        (trace_id, subscription)
    }

    /// Cancel the latest request; returns whether one was tracked
    pub fn cancel(&mut self) -> bool {
        match self.current.take() {
            Some(previous) => {
                self.registry.cancel(&previous);
                true
            }
            None => false,
        }
    }
}

impl Drop for SearchSession {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::StreamEvent;

    #[tokio::test]
    async fn test_new_request_cancels_previous() {
        let mut session = SearchSession::new(TraceRegistry::new());
        let (first, mut first_sub) = session.start_subscribed();
        let (second, mut second_sub) = session.start_subscribed();

        assert_ne!(first, second);
        assert_eq!(session.current(), Some(second.as_str()));
        assert_eq!(first_sub.recv().await, Some(StreamEvent::Cancelled));
        assert_eq!(first_sub.recv().await, None);

        session.registry().publish(&second, StreamEvent::Complete);
        assert_eq!(second_sub.try_recv(), Some(StreamEvent::Complete));
    }

    #[test]
    fn test_drop_cancels() {
        let registry = TraceRegistry::new();
        let mut sub = {
            let mut session = SearchSession::new(registry.clone());
            let (_, sub) = session.start_subscribed();
            sub
        };

        assert_eq!(sub.try_recv(), Some(StreamEvent::Cancelled));
        assert_eq!(registry.trace_count(), 0);
    }

    #[test]
    fn test_cancel_without_request() {
        let mut session = SearchSession::new(TraceRegistry::new());
        assert!(!session.cancel());
        session.start();
        assert!(session.cancel());
        assert_eq!(session.current(), None);
    }
}
