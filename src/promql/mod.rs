//! PromQL range query results
//!
//! - **Types**: series, chunk envelope and request body
//! - **Merger**: bounded, incremental merge of streamed chunks

mod merger;
mod types;

pub use merger::{MergeStats, SeriesMerger};
pub use types::{RangeQueryRequest, RangeQueryResult, SamplePair, TimeSeries};
