//! # metric-builder
//!
//! **Low-allocation construction of Prometheus-style metric identifiers**
//!
//! Builds strings of the form `name{label1="value1",label2="value2"}` into a
//! single reusable byte buffer, without intermediate strings per label.
//!
//! ## Features
//!
//! - **Pooled Buffers**: builders draw their buffer from a lock-free [`BufferPool`]
//!   and return it when rendered or dropped
//! - **Typed Labels**: strings, booleans, integers, floats, errors and any `Display`
//!   value are formatted straight into the buffer
//! - **Lenient Labels**: empty or oversize label names and values are logged and
//!   skipped, the rest of the metric still renders
//! - **Strict Names**: an invalid metric name is an error, never a malformed metric
//! - **Flexible Configuration**: limits and pool sizing via files (TOML/YAML/JSON),
//!   environment variables, code, or CLI arguments
//! - **Self Metrics**: pool usage exposed as Prometheus counters
//!
//! ## Quick Start
//!
//! ```ignore
//! use metric_builder::metric;
//!
//! let name = metric("cassandra_query_count")?
//!     .label("cluster", "guava")
//!     .label("host", "1.2.3.4")
//!     .label_int("shard", 3)
//!     .label_error(&err)
//!     .render();
//! ```
//!
//! `label` copies its value verbatim and is meant for values known to be clean.
//! Use `label_escaped` (or the error and `Display` helpers, which escape by
//! default) for anything that may contain `"`, `\` or a newline.
//!
//! ## Configuration
//!
//! ```ignore
//! use metric_builder::ConfigLoader;
//!
//! let pool = ConfigLoader::new()
//!     .file("metrics.toml")
//!     .env_prefix("METRIC")
//!     .build_pool()?;
//! ```
//!
//! ### Config File Example (TOML)
//!
//! ```toml
//! pool_capacity = 512
//! buffer_capacity = 128
//!
//! [limits]
//! max_name_len = 200
//! max_label_value_len = 256
//! ```
//!
//! ### Environment Variables
//!
//! With `.env_prefix("METRIC")`:
//! - `METRIC_POOL_CAPACITY=512`
//! - `METRIC_LIMITS__MAX_LABEL_VALUE_LEN=256`

use std::sync::OnceLock;

pub mod builder;
pub mod compose;
pub mod config;
pub mod error;
pub mod metrics;
pub mod pool;
pub mod value;

pub use builder::{BuilderOption, MetricBuilder};
pub use compose::{compose, compose_in, Label};
pub use config::{BuilderConfig, ConfigLoader, Limits, MetricArgs};
pub use error::{InvalidNameReason, MetricError, Result, SkipReason};
pub use metrics::BuilderMetrics;
pub use pool::BufferPool;
pub use value::{escape, LabelValue};

static DEFAULT_POOL: OnceLock<BufferPool> = OnceLock::new();

/// The process-wide pool used by [`metric`] and [`compose`].
///
/// Created with default configuration on first use.
pub fn default_pool() -> &'static BufferPool {
    DEFAULT_POOL.get_or_init(BufferPool::new)
}

/// Install `pool` as the process-wide default.
///
/// Returns the pool back if a default was already installed or used.
pub fn set_default_pool(pool: BufferPool) -> std::result::Result<(), BufferPool> {
    DEFAULT_POOL.set(pool)
}

/// Start a metric named `name` on a buffer from the default pool.
///
/// # Errors
///
/// Returns [`MetricError::InvalidName`] if the name is empty, too long, or
/// contains a double quote.
///
/// # Example
///
/// ```ignore
/// let metric = metric_builder::metric("api_http_requests_total")?
///     .label("method", "GET")
///     .render();
/// ```
pub fn metric(name: &str) -> Result<MetricBuilder> {
    default_pool().metric(name)
}

/// Like [`metric`], applying `options` before the name is validated.
///
/// # Example
///
/// ```ignore
/// use metric_builder::BuilderOption;
///
/// let metric = metric_builder::metric_with("m", &[BuilderOption::MaxLabelValueLen(64)])?
///     .label_escaped("query", sql)
///     .render();
/// ```
pub fn metric_with(name: &str, options: &[BuilderOption]) -> Result<MetricBuilder> {
    default_pool().metric_with(name, options)
}
