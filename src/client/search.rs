//! Search backend REST client
//!
//! Plain searches return one JSON body. Streamed searches are read
//! incrementally and every decoded chunk is published to the trace's
//! subscribers as it arrives.

use futures_util::future::{AbortHandle, Abortable};
use futures_util::StreamExt;
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use super::error::{ClientError, ClientResult};
use crate::config::ApiConfig;
use crate::promql::{RangeQueryRequest, RangeQueryResult, SeriesMerger};
use crate::search::{SearchEnvelope, SearchResponse, StreamSchema};
use crate::streaming::{
    new_trace_id, truncate_message, LineDecoder, StreamEvent, StreamMessage, TraceRegistry,
};

/// Endpoint paths below `/api/{org}/`
const SEARCH_PATH: &str = "_search";
const SEARCH_STREAM_PATH: &str = "_search_stream";
const SEARCH_VALUES_STREAM_PATH: &str = "_search_values_stream";
const RANGE_QUERY_PATH: &str = "prometheus/api/v1/query_range";
const STREAMS_PATH: &str = "streams";

/// How a streamed request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The body was read to the end or to `[[DONE]]`
    Completed,
    /// The request was aborted through the registry
    Aborted,
}

/// Client for the search and metrics endpoints
#[derive(Debug, Clone)]
pub struct SearchClient {
    client: Client,
    config: ApiConfig,
}

impl SearchClient {
    pub fn new(config: ApiConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn url(&self, org: &str, path: &str) -> String {
        format!(
            "{}/api/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(org),
            path
        )
    }

    fn post(&self, url: &str) -> RequestBuilder {
        self.authorize(self.client.post(url))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.username {
            Some(username) => request.basic_auth(username, self.config.password.as_deref()),
            None => request,
        }
    }

    /// Run a search and return the whole response
    pub async fn search(&self, org: &str, envelope: &SearchEnvelope) -> ClientResult<SearchResponse> {
        let url = self.url(org, SEARCH_PATH);
        tracing::debug!(org = %org, sql = %envelope.query.sql, "Sending search request");

        let response = self.post(&url).json(envelope).send().await?;
        let bytes = check_status(response).await?.bytes().await?;

        let result: SearchResponse =
            serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))?;

        tracing::debug!(
            org = %org,
            hits = result.hits.len(),
            total = result.total,
            took = result.took,
            "Search completed"
        );
        Ok(result)
    }

    /// Fetch the field names of a stream
    pub async fn stream_schema(&self, org: &str, stream: &str) -> ClientResult<StreamSchema> {
        let path = format!("{}/{}/schema", STREAMS_PATH, urlencoding::encode(stream));
        let url = self.url(org, &path);

        let response = self.authorize(self.client.get(&url)).send().await?;
        let bytes = check_status(response).await?.bytes().await?;
        let body: Value =
            serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))?;

        let fields = body
            .get("schema")
            .and_then(Value::as_array)
            .ok_or_else(|| ClientError::Decode("schema response has no `schema` array".to_string()))?
            .iter()
            .filter_map(|field| field.get("name").and_then(Value::as_str));

        let schema = StreamSchema::new(stream, fields);
        tracing::debug!(org = %org, stream = %stream, fields = schema.fields.len(), "Fetched stream schema");
        Ok(schema)
    }

    /// Stream a search, publishing each partial result under `trace_id`
    pub async fn search_stream(
        &self,
        org: &str,
        envelope: &SearchEnvelope,
        trace_id: &str,
        registry: &TraceRegistry,
    ) -> ClientResult<StreamOutcome> {
        let url = self.url(org, SEARCH_STREAM_PATH);
        self.stream_to(&url, envelope, trace_id, registry).await
    }

    /// Stream distinct field values, publishing each chunk under `trace_id`
    pub async fn search_values_stream(
        &self,
        org: &str,
        body: &Value,
        trace_id: &str,
        registry: &TraceRegistry,
    ) -> ClientResult<StreamOutcome> {
        let url = self.url(org, SEARCH_VALUES_STREAM_PATH);
        self.stream_to(&url, body, trace_id, registry).await
    }

    /// Stream a PromQL range query, publishing each chunk under `trace_id`
    pub async fn range_query_stream(
        &self,
        org: &str,
        request: &RangeQueryRequest,
        trace_id: &str,
        registry: &TraceRegistry,
    ) -> ClientResult<StreamOutcome> {
        let url = self.url(org, RANGE_QUERY_PATH);
        self.stream_to(&url, request, trace_id, registry).await
    }

    /// Run a range query to completion and merge its chunks
    ///
    /// At most `max_series` distinct series are kept.
    pub async fn collect_range_query(
        &self,
        org: &str,
        request: &RangeQueryRequest,
        max_series: usize,
    ) -> ClientResult<RangeQueryResult> {
        let registry = TraceRegistry::new();
        let trace_id = new_trace_id();
        let mut subscription = registry.subscribe(&trace_id);
        let mut merger = SeriesMerger::new(max_series);

        let request_fut = self.range_query_stream(org, request, &trace_id, &registry);
        let merge_fut = async {
            while let Some(event) = subscription.recv().await {
                match event {
                    StreamEvent::Data(value) => match range_chunk(value) {
                        Ok(chunk) => merger.merge(&chunk),
                        Err(e) => tracing::warn!(error = %e, "Skipping undecodable range chunk"),
                    },
                    StreamEvent::Reset => merger.reset(),
                    StreamEvent::Error { .. } => {}
                    StreamEvent::Complete | StreamEvent::Cancelled => break,
                }
            }
        };

        let (outcome, ()) = tokio::join!(request_fut, merge_fut);
        if outcome? == StreamOutcome::Aborted {
            return Err(ClientError::Aborted);
        }

        tracing::info!(trace_id = %trace_id, stats = %merger.stats(), "Range query merged");
        Ok(merger.finish())
    }

    /// Drive one streamed request under `trace_id`
    ///
    /// A previous request under the same trace is aborted. Failures are
    /// published as a truncated `Error` followed by `Complete` and also
    /// returned. An abort is not an error.
    async fn stream_to<B>(
        &self,
        url: &str,
        body: &B,
        trace_id: &str,
        registry: &TraceRegistry,
    ) -> ClientResult<StreamOutcome>
    where
        B: Serialize + ?Sized,
    {
        let (abort, registration) = AbortHandle::new_pair();
        registry.begin(trace_id, abort);

        let pump = self.pump(url, body, trace_id, registry);
        match Abortable::new(pump, registration).await {
            Ok(Ok(chunks)) => {
                tracing::debug!(trace_id = %trace_id, chunks, "Stream completed");
                registry.complete(trace_id);
                Ok(StreamOutcome::Completed)
            }
            Ok(Err(e)) => {
                tracing::warn!(trace_id = %trace_id, error = %e, "Stream failed");
                registry.publish(trace_id, StreamEvent::error(e.code(), e.to_string()));
                registry.complete(trace_id);
                Err(e)
            }
            Err(_) => {
                tracing::debug!(trace_id = %trace_id, "Stream aborted");
                Ok(StreamOutcome::Aborted)
            }
        }
    }

    /// Read a streamed body, returning the number of chunks published
    async fn pump<B>(
        &self,
        url: &str,
        body: &B,
        trace_id: &str,
        registry: &TraceRegistry,
    ) -> ClientResult<usize>
    where
        B: Serialize + ?Sized,
    {
        let response = self.post(url).json(body).send().await?;
        let response = check_status(response).await?;

        let mut decoder = LineDecoder::new();
        let mut stream = response.bytes_stream();
        let mut chunks = 0;

        while let Some(bytes) = stream.next().await {
            for message in decoder.push(&bytes?) {
                if !dispatch(message, trace_id, registry, &mut chunks)? {
                    return Ok(chunks);
                }
            }
        }

        if let Some(message) = decoder.finish() {
            dispatch(message, trace_id, registry, &mut chunks)?;
        }
        if decoder.malformed() > 0 {
            tracing::warn!(trace_id = %trace_id, malformed = decoder.malformed(), "Stream had malformed lines");
        }
        Ok(chunks)
    }
}

/// Publish one decoded message; `false` once the stream is done
fn dispatch(
    message: StreamMessage,
    trace_id: &str,
    registry: &TraceRegistry,
    chunks: &mut usize,
) -> ClientResult<bool> {
    match message {
        StreamMessage::Chunk(value) => {
            *chunks += 1;
            registry.publish(trace_id, StreamEvent::Data(value));
            Ok(true)
        }
        StreamMessage::Error { code, message } => Err(ClientError::Backend { code, message }),
        StreamMessage::Done => Ok(false),
    }
}

/// Turn a non-2xx response into `ClientError::Backend`
async fn check_status(response: Response) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let body = serde_json::from_str::<Value>(&text).ok();

    let code = body
        .as_ref()
        .and_then(|b| b.get("code"))
        .and_then(Value::as_i64)
        .unwrap_or_else(|| i64::from(status.as_u16()));
    let message = body
        .as_ref()
        .and_then(|b| b.get("message").or_else(|| b.get("error")))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or(text);

    Err(ClientError::Backend {
        code,
        message: truncate_message(&message),
    })
}

/// Decode a range chunk, unwrapping a Prometheus-style `data` envelope
fn range_chunk(value: Value) -> serde_json::Result<RangeQueryResult> {
    match value {
        Value::Object(mut object) if object.get("data").map_or(false, Value::is_object) => {
            let data = object.remove("data").unwrap_or_default();
            serde_json::from_value(data)
        }
        other => serde_json::from_value(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client(base_url: &str) -> SearchClient {
        SearchClient::new(ApiConfig {
            base_url: base_url.to_string(),
            ..ApiConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_url_encodes_org() {
        let client = client("http://localhost:5080/");
        assert_eq!(
            client.url("my org", SEARCH_PATH),
            "http://localhost:5080/api/my%20org/_search"
        );
        assert_eq!(
            client.url("default", RANGE_QUERY_PATH),
            "http://localhost:5080/api/default/prometheus/api/v1/query_range"
        );
    }

    #[test]
    fn test_range_chunk_shapes() {
        let bare = range_chunk(json!({
            "resultType": "matrix",
            "result": [{"metric": {"job": "a"}, "values": [[1.0, "1"]]}]
        }))
        .unwrap();
        assert_eq!(bare.result.len(), 1);

        let wrapped = range_chunk(json!({
            "status": "success",
            "data": {"result": [{"metric": {"job": "a"}, "values": []}]}
        }))
        .unwrap();
        assert_eq!(wrapped.result.len(), 1);
        assert!(!wrapped.meta.contains_key("status"));
    }

    #[test]
    fn test_dispatch() {
        let registry = TraceRegistry::new();
        let mut sub = registry.subscribe("t");
        let mut chunks = 0;

        assert!(dispatch(StreamMessage::Chunk(json!({"a": 1})), "t", &registry, &mut chunks).unwrap());
        assert_eq!(chunks, 1);
        assert_eq!(sub.try_recv(), Some(StreamEvent::Data(json!({"a": 1}))));

        assert!(!dispatch(StreamMessage::Done, "t", &registry, &mut chunks).unwrap());

        let err = dispatch(
            StreamMessage::Error {
                code: 500,
                message: "boom".to_string(),
            },
            "t",
            &registry,
            &mut chunks,
        )
        .unwrap_err();
        assert!(matches!(err, ClientError::Backend { code: 500, .. }));
    }
}
