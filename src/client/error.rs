//! Transport errors

use thiserror::Error;

use crate::search::QueryError;

/// Reasons a backend call failed
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// The request was cancelled on purpose
    #[error("Request aborted")]
    Aborted,

    /// Non-2xx response or an error envelope inside a stream
    #[error("Backend error {code}: {message}")]
    Backend { code: i64, message: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error(transparent)]
    Query(#[from] QueryError),
}

impl ClientError {
    /// Numeric code forwarded to stream subscribers
    pub fn code(&self) -> i64 {
        match self {
            ClientError::Network(e) => e.status().map(|s| i64::from(s.as_u16())).unwrap_or(0),
            ClientError::Backend { code, .. } => *code,
            ClientError::Query(_) => 400,
            ClientError::Aborted | ClientError::Decode(_) => 0,
        }
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
