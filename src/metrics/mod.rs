//! Self-observability for buffer pools.
//!
//! Every [`BufferPool`](crate::BufferPool) owns a [`BuilderMetrics`] whose
//! counters are always updated (plain atomic ops) and can optionally be
//! registered into a Prometheus registry for scraping.
//!
//! # Available Metrics
//!
//! ## Gauges (current values)
//!
//! - `metric_builder_idle_buffers` - Buffers idle in the pool
//!
//! ## Counters (cumulative)
//!
//! - `metric_builder_buffers_acquired_total` - Buffers handed out
//! - `metric_builder_buffers_allocated_total` - Acquisitions that allocated
//! - `metric_builder_buffers_released_total` - Buffers returned to the pool
//! - `metric_builder_buffers_discarded_total` - Released buffers dropped
//! - `metric_builder_labels_skipped_total` - Labels skipped by pooled builders
//! - `metric_builder_metrics_rendered_total` - Metrics rendered by pooled builders
//!
//! # Example
//!
//! ```ignore
//! use prometheus::Registry;
//! use metric_builder::BufferPool;
//!
//! let registry = Registry::new();
//! let pool = BufferPool::new();
//! pool.metrics().register(&registry)?;
//! ```

mod prometheus;

pub use prometheus::BuilderMetrics;
