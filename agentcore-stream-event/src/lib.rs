//! The normalized stream event wire protocol: event type + payload + envelope.
//!
//! Provider adapters (OpenAI/Anthropic/Gemini/custom) each translate their own
//! vendor-specific streaming shape into [`StreamEvent`], the one type the rest of
//! the core (conversation store, EventBus, UI) ever has to understand. This crate
//! has no dependency on the rest of the workspace so it can be shared by anything
//! that needs to speak the wire format without pulling in the agent loop.

pub mod envelope;
pub mod event;

pub use envelope::{to_json, Envelope, EnvelopeState};
pub use event::{ReasoningPhase, StreamEvent, TokenUsage, ToolCall};
