//! Caller-owned search state
//!
//! `SearchState` is the input the builder reads (and writes its error message
//! into); `SearchMeta` and `ResultBuffer` are updated as a side effect of a
//! successful build and of incoming responses.

use serde_json::Value;

use super::request::{ParsedQueryParams, SearchResponse, StreamSchema, Timestamps};
use crate::histogram::{HistogramAccumulator, HistogramInterval};

/// UI selections for one log search
#[derive(Debug, Clone)]
pub struct SearchState {
    pub selected_streams: Vec<String>,
    pub query: String,
    pub sql_mode: bool,
    pub timestamps: Timestamps,
    /// 1-based page number
    pub current_page: u32,
    pub rows_per_page: i64,
    pub quick_mode: bool,
    pub regions: Vec<String>,
    pub clusters: Vec<String>,
    /// Schemas for the selected streams, used by multi-stream validation
    pub stream_schemas: Vec<StreamSchema>,
    /// Last build failure, empty after a successful build
    pub error_message: String,
}

impl SearchState {
    pub fn new(streams: &[&str], query: impl Into<String>, timestamps: Timestamps) -> Self {
        Self {
            selected_streams: streams.iter().map(|s| s.to_string()).collect(),
            query: query.into(),
            sql_mode: false,
            timestamps,
            current_page: 1,
            rows_per_page: 50,
            quick_mode: false,
            regions: Vec::new(),
            clusters: Vec::new(),
            stream_schemas: Vec::new(),
            error_message: String::new(),
        }
    }

    pub fn sql_mode(mut self, enabled: bool) -> Self {
        self.sql_mode = enabled;
        self
    }

    pub fn page(mut self, current_page: u32, rows_per_page: i64) -> Self {
        self.current_page = current_page;
        self.rows_per_page = rows_per_page;
        self
    }

    pub fn schema(mut self, schema: StreamSchema) -> Self {
        self.stream_schemas.push(schema);
        self
    }

    /// Offset of the first row of the current page; `None` on overflow
    pub fn page_from(&self) -> Option<i64> {
        i64::from(self.current_page.max(1) - 1).checked_mul(self.rows_per_page.max(0))
    }
}

/// Metadata derived from the last successful build
#[derive(Debug, Clone, Default)]
pub struct SearchMeta {
    pub histogram_interval: Option<HistogramInterval>,
    pub parsed: Option<ParsedQueryParams>,
}

/// Rows and histogram buckets accumulated across pages and partitions
#[derive(Debug, Clone, Default)]
pub struct ResultBuffer {
    pub hits: Vec<Value>,
    pub total: i64,
    pub histogram: HistogramAccumulator,
}

impl ResultBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the rows and histogram buckets of a response
    pub fn extend(&mut self, response: &SearchResponse) {
        self.hits.extend(response.hits.iter().cloned());
        self.total = self.total.max(response.total);
        if let Some(aggs) = &response.aggs {
            self.histogram.add_rows(&aggs.histogram);
        }
    }

    pub fn clear(&mut self) {
        self.hits.clear();
        self.total = 0;
        self.histogram.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty() && self.histogram.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::request::ResponseAggs;
    use serde_json::json;

    #[test]
    fn test_page_from() {
        let state = SearchState::new(&["logs"], "", Timestamps::new(0, 1));
        assert_eq!(state.page_from(), Some(0));
        assert_eq!(state.clone().page(3, 25).page_from(), Some(50));
        assert_eq!(state.clone().page(0, 25).page_from(), Some(0));
        assert_eq!(state.page(u32::MAX, i64::MAX).page_from(), None);
    }

    #[test]
    fn test_result_buffer() {
        let mut buffer = ResultBuffer::new();
        buffer.extend(&SearchResponse {
            hits: vec![json!({"a": 1}), json!({"a": 2})],
            total: 10,
            aggs: Some(ResponseAggs {
                histogram: vec![json!({"zo_sql_key": "k", "zo_sql_num": 2})],
            }),
            ..Default::default()
        });

        assert_eq!(buffer.hits.len(), 2);
        assert_eq!(buffer.total, 10);
        assert_eq!(buffer.histogram.total(), 2);

        buffer.clear();
        assert!(buffer.is_empty());
    }
}
