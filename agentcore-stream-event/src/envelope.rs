//! Envelope: tags a [`StreamEvent`] with the thread it belongs to and a
//! monotonically increasing sequence number, for fan-out over the EventBus.

use crate::event::StreamEvent;
use serde::Serialize;

/// A [`StreamEvent`] tagged with its thread and position in that thread's stream.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub thread_id: String,
    pub event_id: u64,
    #[serde(flatten)]
    pub event: StreamEvent,
}

/// Per-thread sequence counter. One instance lives for the lifetime of a single
/// LLM call; `next` stamps each event with the next `event_id` before it is
/// published to the EventBus.
pub struct EnvelopeState {
    pub thread_id: String,
    next_event_id: u64,
}

impl EnvelopeState {
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            next_event_id: 1,
        }
    }

    /// Wraps `event` in an [`Envelope`], stamping it with this thread's next
    /// sequence number.
    pub fn next(&mut self, event: StreamEvent) -> Envelope {
        let event_id = self.next_event_id;
        self.next_event_id += 1;
        Envelope {
            thread_id: self.thread_id.clone(),
            event_id,
            event,
        }
    }
}

/// Serializes an event into an envelope and renders it to JSON in one step.
pub fn to_json(
    event: StreamEvent,
    state: &mut EnvelopeState,
) -> Result<serde_json::Value, serde_json::Error> {
    serde_json::to_value(state.next(event))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_increase_monotonically() {
        let mut state = EnvelopeState::new("thread-1");
        let a = state.next(StreamEvent::text("a"));
        let b = state.next(StreamEvent::text("b"));
        assert_eq!(a.event_id, 1);
        assert_eq!(b.event_id, 2);
        assert_eq!(a.thread_id, "thread-1");
    }

    #[test]
    fn to_json_flattens_event_fields_alongside_envelope() {
        let mut state = EnvelopeState::new("thread-1");
        let value = to_json(StreamEvent::text("hi"), &mut state).unwrap();
        assert_eq!(value["threadId"], "thread-1");
        assert_eq!(value["eventId"], 1);
        assert_eq!(value["type"], "text");
        assert_eq!(value["delta"], "hi");
    }
}
