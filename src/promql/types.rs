//! PromQL range query wire types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// `[timestamp_seconds, "value"]` as returned by range queries
pub type SamplePair = (f64, String);

/// One time series of a range query result
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TimeSeries {
    #[serde(default)]
    pub metric: BTreeMap<String, String>,
    #[serde(default)]
    pub values: Vec<SamplePair>,
}

impl TimeSeries {
    pub fn new<I, K, V>(labels: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            metric: labels
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            values: Vec::new(),
        }
    }

    /// Builder method: append a sample
    pub fn sample(mut self, timestamp: f64, value: impl Into<String>) -> Self {
        self.values.push((timestamp, value.into()));
        self
    }

    /// Canonical label-set key: sorted `key=value` pairs joined by `,`
    pub fn signature(&self) -> String {
        self.metric
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// One chunk (or the merged whole) of a range query response
///
/// Fields other than `result` (for example `resultType` or
/// `streaming_aggs`) are carried through untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RangeQueryResult {
    #[serde(default)]
    pub result: Vec<TimeSeries>,
    #[serde(flatten)]
    pub meta: Map<String, Value>,
}

impl RangeQueryResult {
    pub fn new(result: Vec<TimeSeries>) -> Self {
        Self {
            result,
            meta: Map::new(),
        }
    }

    /// Number of samples across all series
    pub fn point_count(&self) -> usize {
        self.result.iter().map(|series| series.values.len()).sum()
    }
}

/// Body posted to the range query endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeQueryRequest {
    pub org_identifier: String,
    pub query: String,
    /// Microseconds since the epoch
    pub start_time: i64,
    /// Microseconds since the epoch
    pub end_time: i64,
    /// Resolution step, e.g. `"15s"`; backend default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
}
