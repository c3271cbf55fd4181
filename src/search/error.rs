//! Search request construction errors

use thiserror::Error;

/// Reasons a search request could not be built
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Bad time range or malformed filter
    #[error("Validation error: {0}")]
    Validation(String),

    /// The SQL parser rejected the query or produced no statement
    #[error("Invalid SQL: {0}")]
    InvalidSql(String),

    /// Filter fields do not exist in every selected stream
    #[error(
        "Filter fields [{}] are missing from streams: {}",
        .fields.join(", "),
        .streams.join(", ")
    )]
    MultiStreamFilter {
        /// Streams lacking at least one filter field
        streams: Vec<String>,
        /// Fields missing from those streams
        fields: Vec<String>,
    },
}

/// Result type for search request construction
pub type QueryResult<T> = Result<T, QueryError>;
