//! Streamed search plumbing
//!
//! - **Decoder**: line framing for NDJSON and SSE response bodies
//! - **Events**: what subscribers of a trace receive
//! - **Registry**: trace id to subscriber routing, with cancellation

mod decoder;
mod events;
mod registry;

pub use decoder::{LineDecoder, StreamMessage, DONE_MARKER};
pub use events::{new_trace_id, truncate_message, StreamEvent, TraceId, MAX_ERROR_MESSAGE_LEN};
pub use registry::{Subscription, SubscriptionId, TraceRegistry};
