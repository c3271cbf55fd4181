//! Histogram support for log search
//!
//! - **Interval**: pick bucket width and label format from a time range
//! - **Buckets**: sum histogram aggregation rows across partial responses

mod buckets;
mod interval;

pub use buckets::{HistogramAccumulator, HistogramBucket, HISTOGRAM_COUNT, HISTOGRAM_KEY};
pub use interval::{select_interval, HistogramInterval};
