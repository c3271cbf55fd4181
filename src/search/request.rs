//! Search request and response wire types

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// How the backend should interpret `sql`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlMode {
    #[default]
    Full,
    Context,
}

/// The `query` object of a search request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub sql: String,
    pub sql_mode: SqlMode,
    /// Microseconds since the epoch
    pub start_time: i64,
    /// Microseconds since the epoch
    pub end_time: i64,
    pub from: i64,
    pub size: i64,
    pub quick_mode: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub regions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clusters: Vec<String>,
}

/// Aggregations requested alongside the hits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchAggs {
    pub histogram: String,
}

/// Complete body posted to the search endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchEnvelope {
    pub query: SearchRequest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggs: Option<SearchAggs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
}

/// Pieces extracted from the user's query text
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedQueryParams {
    /// Extra projections, prefixed with `,` when present
    pub query_functions: String,
    pub where_clause: String,
    /// Zero when the query has no LIMIT
    pub limit: i64,
    pub offset: i64,
    /// Query text after comment stripping and LIMIT removal
    pub query: String,
}

/// A timestamp as supplied by a date picker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeBound {
    /// Microseconds since the epoch
    Micros(i64),
    /// Digits (microseconds), an RFC 3339 date, or `"Invalid Date"`
    Text(String),
}

impl TimeBound {
    /// Literal a date picker emits for an unparseable date
    pub const INVALID_DATE: &'static str = "Invalid Date";

    /// Resolve to microseconds, or `None` if the bound is invalid
    pub fn to_micros(&self) -> Option<i64> {
        match self {
            TimeBound::Micros(us) => Some(*us),
            TimeBound::Text(text) => {
                let text = text.trim();
                if text == Self::INVALID_DATE || text.is_empty() {
                    return None;
                }
                if let Ok(us) = text.parse::<i64>() {
                    return Some(us);
                }
                DateTime::parse_from_rfc3339(text)
                    .ok()
                    .map(|dt| dt.timestamp_micros())
            }
        }
    }
}

impl From<i64> for TimeBound {
    fn from(us: i64) -> Self {
        TimeBound::Micros(us)
    }
}

impl From<&str> for TimeBound {
    fn from(text: &str) -> Self {
        TimeBound::Text(text.to_string())
    }
}

/// Start and end of the selected time range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamps {
    pub start_time: TimeBound,
    pub end_time: TimeBound,
}

impl Timestamps {
    pub fn new(start_time: impl Into<TimeBound>, end_time: impl Into<TimeBound>) -> Self {
        Self {
            start_time: start_time.into(),
            end_time: end_time.into(),
        }
    }
}

/// Field names known for a stream
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreamSchema {
    pub name: String,
    #[serde(default)]
    pub fields: BTreeSet<String>,
}

impl StreamSchema {
    pub fn new<I, S>(name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains(field)
    }
}

/// Histogram rows returned under `aggs`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseAggs {
    #[serde(default)]
    pub histogram: Vec<Value>,
}

/// Body of a `_search` response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub hits: Vec<Value>,
    #[serde(default)]
    pub total: i64,
    #[serde(default)]
    pub scan_size: f64,
    #[serde(default)]
    pub took: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggs: Option<ResponseAggs>,
}
