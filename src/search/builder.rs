//! Search request builder
//!
//! Turns a [`SearchState`] into the [`SearchEnvelope`] posted to the search
//! endpoints. Build failures are written into `SearchState::error_message`
//! as well as returned, so a caller can render the message next to the query
//! editor without matching on the error.

use base64::Engine;
use std::collections::BTreeSet;

use super::error::{QueryError, QueryResult};
use super::request::{
    ParsedQueryParams, SearchAggs, SearchEnvelope, SearchRequest, SqlMode, StreamSchema,
};
use super::simple::parse_simple_query;
use super::state::{ResultBuffer, SearchMeta, SearchState};
use crate::config::SearchConfig;
use crate::histogram::{select_interval, HistogramInterval};
use crate::sql;

/// Statement template for simple-mode queries, one per stream
pub const SQL_TEMPLATE: &str = "SELECT *[QUERY_FUNCTIONS] FROM \"[INDEX_NAME]\" [WHERE_CLAUSE]";

/// Histogram aggregation evaluated over the search result
pub const HISTOGRAM_TEMPLATE: &str = "SELECT histogram([TIMESTAMP_COLUMN], '[INTERVAL]') AS zo_sql_key, count(*) AS zo_sql_num FROM query GROUP BY zo_sql_key ORDER BY zo_sql_key";

/// Joins per-stream statements when several streams are selected
const STREAM_UNION: &str = " UNION ALL BY NAME ";

/// Value of `encoding` when `sql` is base64-encoded
pub const BASE64_ENCODING: &str = "base64";

/// Extract functions, filter, LIMIT and OFFSET from query text
pub fn parse_query_params(query: &str, sql_mode: bool) -> QueryResult<ParsedQueryParams> {
    if sql_mode {
        Ok(parse_sql_params(query)?.params)
    } else {
        let simple = parse_simple_query(query);
        Ok(ParsedQueryParams {
            query_functions: simple.query_functions(),
            where_clause: simple.filter,
            limit: 0,
            offset: 0,
            query: sql::strip_comment_lines(query),
        })
    }
}

/// Result of SQL-mode parsing
struct SqlParams {
    params: ParsedQueryParams,
    /// The LIMIT as written, `Some(0)` included
    limit: Option<i64>,
    /// No aggregation, DISTINCT or LIMIT
    histogram_eligible: bool,
}

fn parse_sql_params(query: &str) -> QueryResult<SqlParams> {
    let mut statements = sql::parse(query)
        .ok_or_else(|| QueryError::InvalidSql("query could not be parsed".to_string()))?;
    if statements.is_empty() {
        return Err(QueryError::InvalidSql("query is empty".to_string()));
    }

    let histogram_eligible = !sql::has_aggregation(&statements)
        && !sql::has_distinct(&statements)
        && !sql::has_limit(&statements);

    let (limit, offset) = sql::take_limit_offset(&mut statements);

    let params = ParsedQueryParams {
        query_functions: String::new(),
        where_clause: sql::where_clause(&statements).unwrap_or_default(),
        limit: limit.unwrap_or(0),
        offset: offset.unwrap_or(0),
        query: sql::unparse(&statements),
    };

    Ok(SqlParams {
        params,
        limit,
        histogram_eligible,
    })
}

/// Builds search request envelopes from UI state
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    config: SearchConfig,
}

impl QueryBuilder {
    pub fn new(config: SearchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Build a request envelope
    ///
    /// On success `meta` receives the histogram interval and parsed params;
    /// a LIMITed SQL query also clears `buffer`. On failure
    /// `state.error_message` holds the reason.
    pub fn build(
        &self,
        state: &mut SearchState,
        meta: &mut SearchMeta,
        buffer: &mut ResultBuffer,
    ) -> QueryResult<SearchEnvelope> {
        match self.try_build(state, meta, buffer) {
            Ok(envelope) => {
                state.error_message.clear();
                Ok(envelope)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Search request rejected");
                state.error_message = e.to_string();
                Err(e)
            }
        }
    }

    fn try_build(
        &self,
        state: &SearchState,
        meta: &mut SearchMeta,
        buffer: &mut ResultBuffer,
    ) -> QueryResult<SearchEnvelope> {
        let (start_time, end_time) = validate_time_range(state)?;
        let interval = select_interval(start_time, end_time);
        let page_from = state.page_from().ok_or_else(page_out_of_range)?;
        let rows_per_page = state.rows_per_page.max(0);

        let (sql, params, from, size, with_histogram) = if state.sql_mode {
            let SqlParams {
                params,
                limit,
                histogram_eligible,
            } = parse_sql_params(&state.query)?;

            let from = params
                .offset
                .checked_add(page_from)
                .ok_or_else(page_out_of_range)?;
            let size = match limit {
                Some(limit) => {
                    buffer.clear();
                    let remaining = limit.saturating_sub(page_from);
                    remaining.clamp(0, rows_per_page)
                }
                None => rows_per_page,
            };

            (params.query.clone(), params, from, size, histogram_eligible)
        } else {
            if state.selected_streams.is_empty() {
                return Err(QueryError::Validation("Select a stream to search".to_string()));
            }

            let params = parse_query_params(&state.query, false)?;

            if state.selected_streams.len() > 1 && !params.where_clause.is_empty() {
                validate_stream_fields(
                    &state.selected_streams,
                    &params.where_clause,
                    &state.stream_schemas,
                )?;
            }

            let sql = state
                .selected_streams
                .iter()
                .map(|stream| render_stream_sql(stream, &params))
                .collect::<Vec<_>>()
                .join(STREAM_UNION);

            (sql, params, page_from, rows_per_page, true)
        };

        let histogram = with_histogram.then(|| self.histogram_sql(&interval));

        let mut envelope = SearchEnvelope {
            query: SearchRequest {
                sql,
                sql_mode: SqlMode::Full,
                start_time,
                end_time,
                from,
                size,
                quick_mode: state.quick_mode || self.config.quick_mode,
                regions: state.regions.clone(),
                clusters: state.clusters.clone(),
            },
            aggs: histogram.map(|histogram| SearchAggs { histogram }),
            encoding: None,
        };

        if self.config.base64_encoding {
            encode_envelope(&mut envelope);
        }

        tracing::debug!(
            streams = ?state.selected_streams,
            sql_mode = state.sql_mode,
            interval = %interval.interval,
            from,
            size,
            "Built search request"
        );

        meta.histogram_interval = Some(interval);
        meta.parsed = Some(params);

        Ok(envelope)
    }

    /// Histogram aggregation SQL for an interval
    pub fn histogram_sql(&self, interval: &HistogramInterval) -> String {
        HISTOGRAM_TEMPLATE
            .replace("[TIMESTAMP_COLUMN]", &self.config.timestamp_column)
            .replace("[INTERVAL]", &interval.interval)
    }
}

fn page_out_of_range() -> QueryError {
    QueryError::Validation("Page offset is out of range".to_string())
}

fn validate_time_range(state: &SearchState) -> QueryResult<(i64, i64)> {
    let start = state
        .timestamps
        .start_time
        .to_micros()
        .ok_or_else(|| QueryError::Validation("Start time is invalid".to_string()))?;
    let end = state
        .timestamps
        .end_time
        .to_micros()
        .ok_or_else(|| QueryError::Validation("End time is invalid".to_string()))?;

    if start > end {
        return Err(QueryError::Validation(
            "Start time cannot be after end time".to_string(),
        ));
    }

    Ok((start, end))
}

fn render_stream_sql(stream: &str, params: &ParsedQueryParams) -> String {
    let where_clause = if params.where_clause.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", params.where_clause)
    };

    SQL_TEMPLATE
        .replace("[QUERY_FUNCTIONS]", &params.query_functions)
        .replace("[INDEX_NAME]", stream)
        .replace("[WHERE_CLAUSE]", &where_clause)
        .trim_end()
        .to_string()
}

/// Every field referenced by the filter must exist in every stream
fn validate_stream_fields(
    streams: &[String],
    where_clause: &str,
    schemas: &[StreamSchema],
) -> QueryResult<()> {
    let fields = sql::filter_fields(where_clause)
        .ok_or_else(|| QueryError::Validation(format!("Malformed filter: {}", where_clause)))?;

    let mut offending = Vec::new();
    let mut missing = BTreeSet::new();

    for stream in streams {
        let schema = schemas.iter().find(|schema| &schema.name == stream);
        let absent: Vec<&String> = fields
            .iter()
            .filter(|field| !schema.is_some_and(|schema| schema.has_field(field)))
            .collect();

        if !absent.is_empty() {
            offending.push(stream.clone());
            missing.extend(absent.into_iter().cloned());
        }
    }

    if offending.is_empty() {
        Ok(())
    } else {
        Err(QueryError::MultiStreamFilter {
            streams: offending,
            fields: missing.into_iter().collect(),
        })
    }
}

fn encode_envelope(envelope: &mut SearchEnvelope) {
    let engine = base64::engine::general_purpose::STANDARD;
    envelope.query.sql = engine.encode(&envelope.query.sql);
    if let Some(aggs) = envelope.aggs.as_mut() {
        aggs.histogram = engine.encode(&aggs.histogram);
    }
    envelope.encoding = Some(BASE64_ENCODING.to_string());
}
