//! Stopping pattern error types.

/// A stopping pattern that is malformed, or doesn't fit its stop list.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("pattern has no stops")]
    Empty,

    #[error("pattern index {index} is outside a stop list of {len} stops")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("pattern index {index} is not after the previous stop")]
    NotIncreasing { index: usize },

    #[error("pattern must start and end at a served stop, but index {index} is express")]
    ExpressEnd { index: usize },

    #[error("origin index {origin} is after terminus index {terminus}")]
    OriginAfterTerminus { origin: usize, terminus: usize },
}
