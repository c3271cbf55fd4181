//! # Logscope
//!
//! Search query construction and result merging for a log and metrics
//! observability backend.
//!
//! ## Features
//!
//! - **Query building**: UI selections become a paginated `_search` request
//!   with an optional histogram aggregation
//! - **SQL rewriting**: LIMIT/OFFSET extraction, WHERE inspection and
//!   aggregation detection on parsed SQL
//! - **Histogram intervals**: bucket width chosen from the time range
//! - **Streaming**: NDJSON/SSE responses fanned out to subscribers per trace
//! - **PromQL merging**: bounded incremental merge of range-query chunks
//!
//! ## Modules
//!
//! - [`search`]: request builder and the `functions | filter` syntax
//! - [`sql`]: SQL parser adapter
//! - [`histogram`]: interval selection and bucket accumulation
//! - [`promql`]: range-query types and the chunk merger
//! - [`streaming`]: line decoding and the trace registry
//! - [`client`]: HTTP transport
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use logscope::{Config, QueryBuilder, ResultBuffer, SearchClient, SearchMeta, SearchState, Timestamps};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_default();
//!     let client = SearchClient::new(config.api.clone())?;
//!     let builder = QueryBuilder::new(config.search.clone());
//!
//!     let mut state = SearchState::new(&["logs"], "status=500", Timestamps::new(0, 3_600_000_000));
//!     let mut meta = SearchMeta::default();
//!     let mut buffer = ResultBuffer::new();
//!
//!     let envelope = builder.build(&mut state, &mut meta, &mut buffer)?;
//!     let response = client.search(&config.api.org, &envelope).await?;
//!     buffer.extend(&response);
//!
//!     println!("{} of {} hits", buffer.hits.len(), buffer.total);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod dashboard;
pub mod histogram;
pub mod promql;
pub mod search;
pub mod sql;
pub mod streaming;

// Re-export top-level types for convenience
pub use search::{
    parse_query_params, ParsedQueryParams, QueryBuilder, QueryError, QueryResult, ResultBuffer,
    SearchEnvelope, SearchMeta, SearchRequest, SearchResponse, SearchState, SqlMode, StreamSchema,
    TimeBound, Timestamps,
};

pub use histogram::{select_interval, HistogramAccumulator, HistogramBucket, HistogramInterval};

pub use promql::{MergeStats, RangeQueryRequest, RangeQueryResult, SeriesMerger, TimeSeries};

pub use streaming::{new_trace_id, LineDecoder, StreamEvent, StreamMessage, Subscription, TraceId, TraceRegistry};

pub use client::{ClientError, ClientResult, SearchClient, SearchSession, StreamOutcome};

pub use cache::OrgCache;

pub use dashboard::{VariableLoadContext, VariableScope, VariableScopeKey};

pub use config::{ApiConfig, Config, ConfigError, LoggingConfig, SearchConfig};
