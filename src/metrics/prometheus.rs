//! Prometheus counters for buffer pool and builder observability.
//!
//! Counters work standalone without a Registry; registration is only needed
//! for exposition (scraping).

use prometheus::{IntCounter, IntGauge, Opts, Registry};

/// Prometheus metrics for a [`BufferPool`](crate::BufferPool) and its builders.
///
/// Clones share the same underlying counters.
#[derive(Clone)]
pub struct BuilderMetrics {
    // === Gauges (current values) ===
    /// Buffers currently idle in the pool
    pub idle_buffers: IntGauge,

    // === Counters (cumulative) ===
    /// Buffers handed out by `acquire`
    pub buffers_acquired: IntCounter,

    /// Acquisitions that had to allocate because no buffer was idle
    pub buffers_allocated: IntCounter,

    /// Buffers returned to the idle set
    pub buffers_released: IntCounter,

    /// Released buffers dropped because the pool was full or the buffer too large
    pub buffers_discarded: IntCounter,

    /// Labels skipped for being empty or oversize
    pub labels_skipped: IntCounter,

    /// Metrics rendered by pooled builders
    pub metrics_rendered: IntCounter,
}

impl Default for BuilderMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn int_counter(prefix: &str, name: &str, help: &str) -> IntCounter {
    IntCounter::with_opts(Opts::new(format!("{prefix}_{name}"), help))
        .expect("metric creation should not fail")
}

impl BuilderMetrics {
    /// Create metrics with default prefix "metric_builder".
    pub fn new() -> Self {
        Self::with_prefix("metric_builder")
    }

    /// Create metrics with a custom prefix.
    ///
    /// Metric names will be `{prefix}_buffers_acquired_total`, etc.
    /// The prefix is sanitized to be a valid Prometheus metric name: hyphens and other
    /// invalid characters are replaced with underscores.
    pub fn with_prefix(prefix: &str) -> Self {
        let prefix = sanitize_prefix(prefix);
        Self {
            idle_buffers: IntGauge::with_opts(Opts::new(
                format!("{prefix}_idle_buffers"),
                "Buffers currently idle in the pool",
            ))
            .expect("metric creation should not fail"),

            buffers_acquired: int_counter(
                &prefix,
                "buffers_acquired_total",
                "Buffers handed out by the pool",
            ),
            buffers_allocated: int_counter(
                &prefix,
                "buffers_allocated_total",
                "Acquisitions that allocated a new buffer",
            ),
            buffers_released: int_counter(
                &prefix,
                "buffers_released_total",
                "Buffers returned to the pool",
            ),
            buffers_discarded: int_counter(
                &prefix,
                "buffers_discarded_total",
                "Released buffers dropped instead of pooled",
            ),
            labels_skipped: int_counter(
                &prefix,
                "labels_skipped_total",
                "Labels skipped for being empty or oversize",
            ),
            metrics_rendered: int_counter(
                &prefix,
                "metrics_rendered_total",
                "Metrics rendered by pooled builders",
            ),
        }
    }

    /// Register all metrics with a Registry for exposition.
    ///
    /// # Errors
    ///
    /// Returns an error if any metric fails to register (e.g., duplicate names).
    pub fn register(&self, registry: &Registry) -> Result<(), prometheus::Error> {
        registry.register(Box::new(self.idle_buffers.clone()))?;
        registry.register(Box::new(self.buffers_acquired.clone()))?;
        registry.register(Box::new(self.buffers_allocated.clone()))?;
        registry.register(Box::new(self.buffers_released.clone()))?;
        registry.register(Box::new(self.buffers_discarded.clone()))?;
        registry.register(Box::new(self.labels_skipped.clone()))?;
        registry.register(Box::new(self.metrics_rendered.clone()))?;
        Ok(())
    }

    /// Record an acquisition, `allocated` when no idle buffer was available.
    #[inline]
    pub(crate) fn record_acquire(&self, allocated: bool) {
        self.buffers_acquired.inc();
        if allocated {
            self.buffers_allocated.inc();
        } else {
            self.idle_buffers.dec();
        }
    }

    /// Record a release, `retained` when the buffer went back to the idle set.
    #[inline]
    pub(crate) fn record_release(&self, retained: bool) {
        if retained {
            self.buffers_released.inc();
            self.idle_buffers.inc();
        } else {
            self.buffers_discarded.inc();
        }
    }

    #[inline]
    pub(crate) fn record_shrink(&self, dropped: usize) {
        self.idle_buffers.sub(dropped as i64);
    }

    #[inline]
    pub(crate) fn record_skip(&self) {
        self.labels_skipped.inc();
    }

    #[inline]
    pub(crate) fn record_render(&self) {
        self.metrics_rendered.inc();
    }
}

/// Replace characters that are invalid in a Prometheus metric name.
///
/// Valid chars: `[a-zA-Z_:]` for the first char, `[a-zA-Z0-9_:]` for the rest.
fn sanitize_prefix(prefix: &str) -> String {
    prefix
        .chars()
        .enumerate()
        .map(|(i, c)| {
            let valid = if i == 0 {
                c.is_ascii_alphabetic() || c == '_' || c == ':'
            } else {
                c.is_ascii_alphanumeric() || c == '_' || c == ':'
            };
            if valid {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl std::fmt::Debug for BuilderMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuilderMetrics")
            .field("idle_buffers", &self.idle_buffers.get())
            .field("buffers_acquired", &self.buffers_acquired.get())
            .field("buffers_allocated", &self.buffers_allocated.get())
            .field("labels_skipped", &self.labels_skipped.get())
            .finish()
    }
}
