//! Histogram bucket accumulation
//!
//! Partitioned and streamed searches return the histogram aggregation in
//! pieces. Each piece is a list of `{zo_sql_key, zo_sql_num}` rows; pieces for
//! the same key are summed.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Column holding the bucket key in histogram rows
pub const HISTOGRAM_KEY: &str = "zo_sql_key";
/// Column holding the bucket count in histogram rows
pub const HISTOGRAM_COUNT: &str = "zo_sql_num";

/// One histogram bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistogramBucket {
    pub zo_sql_key: String,
    pub zo_sql_num: i64,
}

/// Running sum of histogram buckets across partial responses
#[derive(Debug, Clone, Default)]
pub struct HistogramAccumulator {
    buckets: BTreeMap<String, i64>,
    skipped: usize,
}

impl HistogramAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a page of raw histogram rows
    ///
    /// Rows without a string key or an integer count are skipped and counted.
    pub fn add_rows(&mut self, rows: &[Value]) {
        for row in rows {
            let key = row.get(HISTOGRAM_KEY).and_then(Value::as_str);
            let count = row.get(HISTOGRAM_COUNT).and_then(Value::as_i64);
            match (key, count) {
                (Some(key), Some(count)) => {
                    *self.buckets.entry(key.to_string()).or_insert(0) += count;
                }
                _ => self.skipped += 1,
            }
        }

        if self.skipped > 0 {
            tracing::debug!(skipped = self.skipped, "Skipped malformed histogram rows");
        }
    }

    /// Total count across all buckets
    pub fn total(&self) -> i64 {
        self.buckets.values().sum()
    }

    /// Number of malformed rows seen so far
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
        self.skipped = 0;
    }

    /// Buckets ordered by key
    pub fn buckets(&self) -> Vec<HistogramBucket> {
        self.buckets
            .iter()
            .map(|(key, count)| HistogramBucket {
                zo_sql_key: key.clone(),
                zo_sql_num: *count,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sum_per_key() {
        let mut acc = HistogramAccumulator::new();
        acc.add_rows(&[
            json!({"zo_sql_key": "2024-01-01T00:00:10", "zo_sql_num": 3}),
            json!({"zo_sql_key": "2024-01-01T00:00:00", "zo_sql_num": 1}),
        ]);
        acc.add_rows(&[json!({"zo_sql_key": "2024-01-01T00:00:10", "zo_sql_num": 4})]);

        let buckets = acc.buckets();
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].zo_sql_key, "2024-01-01T00:00:00");
        assert_eq!(buckets[0].zo_sql_num, 1);
        assert_eq!(buckets[1].zo_sql_num, 7);
        assert_eq!(acc.total(), 8);
    }

    #[test]
    fn test_malformed_rows_skipped() {
        let mut acc = HistogramAccumulator::new();
        acc.add_rows(&[
            json!({"zo_sql_key": "a"}),
            json!({"zo_sql_num": 2}),
            json!({"zo_sql_key": "b", "zo_sql_num": 2}),
        ]);

        assert_eq!(acc.skipped(), 2);
        assert_eq!(acc.total(), 2);

        acc.clear();
        assert!(acc.is_empty());
        assert_eq!(acc.skipped(), 0);
    }
}
