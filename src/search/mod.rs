//! Log search request construction
//!
//! - **Builder**: UI state → backend search request
//! - **Simple**: the `functions | filter` query syntax
//! - **Request**: wire types for `_search` and `_search_stream`
//! - **State**: caller-owned search state, metadata and result buffer
//!
//! # Example
//!
//! ```rust
//! use logscope::config::SearchConfig;
//! use logscope::search::{QueryBuilder, ResultBuffer, SearchMeta, SearchState, Timestamps};
//!
//! let builder = QueryBuilder::new(SearchConfig::default());
//! let mut state = SearchState::new(&["logs"], "status=200", Timestamps::new(0, 600_000_000));
//! let mut meta = SearchMeta::default();
//! let mut buffer = ResultBuffer::new();
//!
//! let envelope = builder.build(&mut state, &mut meta, &mut buffer).unwrap();
//! assert_eq!(envelope.query.sql, "SELECT * FROM \"logs\" WHERE status = 200");
//! ```

mod builder;
mod error;
mod request;
mod simple;
mod state;

pub use builder::{
    parse_query_params, QueryBuilder, BASE64_ENCODING, HISTOGRAM_TEMPLATE, SQL_TEMPLATE,
};
pub use error::{QueryError, QueryResult};
pub use request::{
    ParsedQueryParams, ResponseAggs, SearchAggs, SearchEnvelope, SearchRequest, SearchResponse,
    SqlMode, StreamSchema, TimeBound, Timestamps,
};
pub use simple::{normalize_operators, parse_simple_query, SimpleQuery};
pub use state::{ResultBuffer, SearchMeta, SearchState};
