//! Error types for metric-builder.

use thiserror::Error;

/// Why a metric name was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidNameReason {
    /// The name has zero length.
    #[error("metric name is empty")]
    Empty,

    /// The name is longer than the configured maximum.
    #[error("metric name is {len} bytes, exceeding the limit of {max}")]
    TooLong { len: usize, max: usize },

    /// The name contains a double quote.
    #[error("metric name contains a double quote")]
    ContainsQuote,
}

/// Why a label was left out of a metric.
///
/// Skips are recoverable: the builder logs the reason and keeps going.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("empty label name")]
    EmptyName,

    #[error("label name is {len} bytes, exceeding the limit of {max}")]
    NameTooLong { len: usize, max: usize },

    #[error("empty label value")]
    EmptyValue,

    #[error("label value is {len} bytes, exceeding the limit of {max}")]
    ValueTooLong { len: usize, max: usize },

    /// The value's `Display` implementation returned an error.
    #[error("label value failed to format")]
    FormatFailed,
}

/// Errors raised by structural misuse of a [`MetricBuilder`](crate::MetricBuilder)
/// or by loading configuration.
///
/// Data-quality problems on labels never surface here: those labels are skipped
/// and reported through `tracing`.
#[derive(Debug, Error)]
pub enum MetricError {
    /// The metric name failed validation.
    #[error("invalid metric name {name:?}: {reason}")]
    InvalidName {
        name: String,
        reason: InvalidNameReason,
    },

    /// A name was already committed on this builder.
    #[error("metric name already set to {name:?}")]
    AlreadySet { name: String },

    /// A label was added before any metric name.
    #[error("can't add a label to a builder with no metric name")]
    NoName,

    /// Error extracting configuration from figment.
    #[error("configuration error: {0}")]
    Config(#[from] Box<figment::Error>),
}

impl MetricError {
    pub(crate) fn invalid_name(name: &str, reason: InvalidNameReason) -> Self {
        Self::InvalidName {
            name: name.to_owned(),
            reason,
        }
    }
}

/// Result type alias for metric-builder operations.
pub type Result<T> = std::result::Result<T, MetricError>;
