//! Search backend transport
//!
//! - **SearchClient**: `_search`, `_search_stream`, `_search_values_stream`
//!   and streamed PromQL range queries over HTTP
//! - **SearchSession**: keeps only the latest request of a search alive
//!
//! Streamed responses are not returned directly. Each decoded chunk is
//! published to the [`TraceRegistry`](crate::streaming::TraceRegistry) under
//! the request's trace id.

mod error;
mod search;
mod session;

pub use error::{ClientError, ClientResult};
pub use search::{SearchClient, StreamOutcome};
pub use session::SearchSession;
