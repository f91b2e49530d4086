//! Feed client error types.

/// Errors that can occur while fetching a feed.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// HTTP request failed (network error, timeout, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned an error status
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Response body exceeds the configured limit
    #[error("response too large: {size} bytes (max {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    /// Failed to parse a JSON snapshot
    #[error("JSON parse error: {message}")]
    Json { message: String },

    /// Failed to decode a GTFS-RT message
    #[error("protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),
}
