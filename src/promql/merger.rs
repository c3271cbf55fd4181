//! Streamed range-query chunk merger
//!
//! Chunks arrive in order on one stream. Each may repeat series already seen
//! (their samples are appended) or introduce new ones (kept until
//! `max_series` distinct series exist, dropped afterwards). Lookup is a hash
//! of the series signature, so merging stays linear in the number of
//! incoming series.

use serde_json::Map;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::types::{RangeQueryResult, TimeSeries};

/// Counters describing a merge, for diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub chunks: usize,
    pub series_received: usize,
    pub series_retained: usize,
    pub series_dropped: usize,
    pub points_appended: usize,
    pub elapsed: Duration,
}

impl std::fmt::Display for MergeStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} chunks, {} series received, {} retained, {} points in {:?}",
            self.chunks,
            self.series_received,
            self.series_retained,
            self.points_appended,
            self.elapsed
        )
    }
}

/// Incremental merger for one range query
#[derive(Debug)]
pub struct SeriesMerger {
    max_series: usize,
    index: HashMap<String, usize>,
    series: Vec<TimeSeries>,
    meta: Map<String, serde_json::Value>,
    stats: MergeStats,
    started: Option<Instant>,
}

impl SeriesMerger {
    pub fn new(max_series: usize) -> Self {
        Self {
            max_series,
            index: HashMap::new(),
            series: Vec::new(),
            meta: Map::new(),
            stats: MergeStats::default(),
            started: None,
        }
    }

    pub fn max_series(&self) -> usize {
        self.max_series
    }

    /// Fold a chunk into the accumulated result
    ///
    /// Only the incoming series are touched. Read the merged state through
    /// [`result`](Self::result), or clone it out with [`snapshot`](Self::snapshot).
    pub fn merge(&mut self, chunk: &RangeQueryResult) {
        let started = *self.started.get_or_insert_with(Instant::now);

        if self.stats.chunks == 0 && chunk.result.len() > self.max_series {
            tracing::warn!(
                received = chunk.result.len(),
                max_series = self.max_series,
                "Range query returned more series than allowed, truncating"
            );
        }

        self.stats.chunks += 1;
        self.stats.series_received += chunk.result.len();

        for incoming in &chunk.result {
            let signature = incoming.signature();

            if let Some(&idx) = self.index.get(&signature) {
                self.series[idx].values.extend(incoming.values.iter().cloned());
                self.stats.points_appended += incoming.values.len();
            } else if self.series.len() < self.max_series {
                self.index.insert(signature, self.series.len());
                self.series.push(incoming.clone());
                self.stats.points_appended += incoming.values.len();
            } else {
                self.stats.series_dropped += 1;
            }
        }

        self.meta = chunk.meta.clone();
        self.stats.series_retained = self.series.len();
        self.stats.elapsed = started.elapsed();

        tracing::trace!(
            chunk = self.stats.chunks,
            series = self.series.len(),
            "Merged range query chunk"
        );
    }

    /// Borrowed view of the merged series and the latest chunk's metadata
    pub fn result(&self) -> (&[TimeSeries], &Map<String, serde_json::Value>) {
        (&self.series, &self.meta)
    }

    /// Owned copy of the merged result
    pub fn snapshot(&self) -> RangeQueryResult {
        RangeQueryResult {
            result: self.series.clone(),
            meta: self.meta.clone(),
        }
    }

    /// Take the merged result, leaving the merger as if newly created
    ///
    /// Stats are reset too; read [`stats`](Self::stats) before calling this.
    pub fn finish(&mut self) -> RangeQueryResult {
        let result = RangeQueryResult {
            result: std::mem::take(&mut self.series),
            meta: std::mem::take(&mut self.meta),
        };
        self.reset();
        result
    }

    pub fn stats(&self) -> &MergeStats {
        &self.stats
    }

    pub fn series_count(&self) -> usize {
        self.series.len()
    }

    /// Forget everything, e.g. when a new query is issued
    pub fn reset(&mut self) {
        self.index.clear();
        self.series.clear();
        self.meta.clear();
        self.stats = MergeStats::default();
        self.started = None;
    }
}
