//! Histogram interval selection
//!
//! Maps the width of a search time range to the bucket size used by the
//! histogram aggregation and the date format used for its x-axis labels.

use serde::{Deserialize, Serialize};

const SECOND_US: i64 = 1_000_000;
const MINUTE_US: i64 = 60 * SECOND_US;
const HOUR_US: i64 = 60 * MINUTE_US;
const DAY_US: i64 = 24 * HOUR_US;

/// Bucket width and label format for a histogram
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramInterval {
    /// Duration literal understood by the backend `histogram()` function
    pub interval: String,
    /// Date format pattern for bucket labels
    pub key_format: String,
}

impl HistogramInterval {
    fn new(interval: &str, key_format: &str) -> Self {
        Self {
            interval: interval.to_string(),
            key_format: key_format.to_string(),
        }
    }

    /// Bucket width in microseconds
    ///
    /// Returns `None` if the interval literal is not `<n> <unit>`.
    pub fn bucket_micros(&self) -> Option<i64> {
        let (count, unit) = self.interval.split_once(' ')?;
        let count: i64 = count.trim().parse().ok()?;
        let unit_us = match unit.trim().trim_end_matches('s') {
            "second" => SECOND_US,
            "minute" => MINUTE_US,
            "hour" => HOUR_US,
            "day" => DAY_US,
            _ => return None,
        };
        Some(count * unit_us)
    }
}

/// Range thresholds in increasing order; the last one reached wins.
const THRESHOLDS: &[(i64, &str, Option<&str>)] = &[
    (30 * MINUTE_US, "15 second", None),
    (HOUR_US, "30 second", None),
    (2 * HOUR_US, "1 minute", Some("MM-DD HH:mm")),
    (6 * HOUR_US, "5 minute", None),
    (DAY_US, "30 minute", None),
    (7 * DAY_US, "1 hour", None),
    (30 * DAY_US, "1 day", Some("YYYY-MM-DD")),
];

/// Select the histogram interval for a time range given in microseconds
pub fn select_interval(start_micros: i64, end_micros: i64) -> HistogramInterval {
    let range = end_micros.saturating_sub(start_micros);

    let mut interval = "10 second";
    let mut key_format = "HH:mm:ss";

    for &(threshold, bucket, format) in THRESHOLDS {
        if range >= threshold {
            interval = bucket;
            if let Some(format) = format {
                key_format = format;
            }
        }
    }

    HistogramInterval::new(interval, key_format)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interval_for(range: i64) -> HistogramInterval {
        select_interval(0, range)
    }

    #[test]
    fn test_short_range() {
        let interval = interval_for(10 * MINUTE_US);
        assert_eq!(interval.interval, "10 second");
        assert_eq!(interval.key_format, "HH:mm:ss");
    }

    #[test]
    fn test_threshold_table() {
        let cases = [
            (30 * MINUTE_US, "15 second", "HH:mm:ss"),
            (HOUR_US, "30 second", "HH:mm:ss"),
            (2 * HOUR_US, "1 minute", "MM-DD HH:mm"),
            (6 * HOUR_US, "5 minute", "MM-DD HH:mm"),
            (25 * HOUR_US, "30 minute", "MM-DD HH:mm"),
            (7 * DAY_US, "1 hour", "MM-DD HH:mm"),
            (30 * DAY_US, "1 day", "YYYY-MM-DD"),
            (365 * DAY_US, "1 day", "YYYY-MM-DD"),
        ];

        for (range, expected, format) in cases {
            let interval = interval_for(range);
            assert_eq!(interval.interval, expected, "range {}", range);
            assert_eq!(interval.key_format, format, "range {}", range);
        }
    }

    #[test]
    fn test_just_below_threshold() {
        assert_eq!(interval_for(30 * MINUTE_US - 1).interval, "10 second");
        assert_eq!(interval_for(2 * HOUR_US - 1).interval, "30 second");
        assert_eq!(interval_for(2 * HOUR_US - 1).key_format, "HH:mm:ss");
    }

    #[test]
    fn test_monotonic() {
        let mut previous = 0;
        let mut range = SECOND_US;
        while range < 400 * DAY_US {
            let bucket = interval_for(range).bucket_micros().unwrap();
            assert!(bucket >= previous, "bucket shrank at range {}", range);
            previous = bucket;
            range += 17 * MINUTE_US;
        }
    }

    #[test]
    fn test_inverted_range_is_finest() {
        assert_eq!(select_interval(100, 0).interval, "10 second");
    }

    #[test]
    fn test_bucket_micros() {
        assert_eq!(HistogramInterval::new("15 second", "").bucket_micros(), Some(15 * SECOND_US));
        assert_eq!(HistogramInterval::new("2 hours", "").bucket_micros(), Some(2 * HOUR_US));
        assert_eq!(HistogramInterval::new("1 day", "").bucket_micros(), Some(DAY_US));
        assert_eq!(HistogramInterval::new("bogus", "").bucket_micros(), None);
    }
}
