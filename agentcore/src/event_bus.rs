//! Per-thread event fan-out (§4.11 "stream events update the assistant
//! message"; §6 external interfaces): every [`stream_event::Envelope`] an
//! `AgentLoop` produces is published here, and any number of UI subscribers
//! (a websocket handler, a CLI renderer, a test harness) can listen to one
//! thread's stream independently of how many other threads are running.

use dashmap::DashMap;
use tokio::sync::broadcast;

use stream_event::Envelope;

const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Broadcasts [`Envelope`]s to every subscriber of a thread; channels are
/// created lazily on first publish or subscribe and dropped once the last
/// sender and all receivers go away.
pub struct EventBus {
    channels: DashMap<String, broadcast::Sender<Envelope>>,
    capacity: usize,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
            capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity,
        }
    }

    fn sender_for(&self, thread_id: &str) -> broadcast::Sender<Envelope> {
        self.channels
            .entry(thread_id.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Publishes an event to every current subscriber of `envelope.thread_id`.
    /// A no-op (not an error) if nobody is currently subscribed.
    pub fn publish(&self, envelope: Envelope) {
        let sender = self.sender_for(&envelope.thread_id);
        let _ = sender.send(envelope);
    }

    /// Subscribes to a thread's event stream; receives only events published
    /// after this call.
    pub fn subscribe(&self, thread_id: &str) -> broadcast::Receiver<Envelope> {
        self.sender_for(thread_id).subscribe()
    }

    /// Drops the channel for a thread once its run is over, so an idle thread
    /// doesn't keep a broadcast sender alive forever.
    pub fn close(&self, thread_id: &str) {
        self.channels.remove(thread_id);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stream_event::StreamEvent;

    fn envelope(thread_id: &str, event_id: u64) -> Envelope {
        Envelope {
            thread_id: thread_id.to_string(),
            event_id,
            event: StreamEvent::text("hi"),
        }
    }

    #[tokio::test]
    async fn subscriber_receives_events_published_after_subscribing() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe("thread-1");
        bus.publish(envelope("thread-1", 1));
        let received = receiver.recv().await.unwrap();
        assert_eq!(received.event_id, 1);
    }

    #[tokio::test]
    async fn subscribers_on_different_threads_are_isolated() {
        let bus = EventBus::new();
        let mut a = bus.subscribe("thread-a");
        let mut b = bus.subscribe("thread-b");
        bus.publish(envelope("thread-a", 1));
        assert_eq!(a.recv().await.unwrap().thread_id, "thread-a");
        assert!(b.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::new();
        bus.publish(envelope("thread-1", 1));
    }

    #[tokio::test]
    async fn close_drops_the_channel_for_a_thread() {
        let bus = EventBus::new();
        let _receiver = bus.subscribe("thread-1");
        bus.close("thread-1");
        assert!(bus.channels.get("thread-1").is_none());
    }
}
