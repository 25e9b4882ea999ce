//! One-shot metric composition from a list of labels.
//!
//! [`compose`] builds a whole metric in one call, with conditional labels
//! expressed as `Option<Label>`:
//!
//! ```ignore
//! use metric_builder::{compose, Label};
//!
//! let metric = compose(
//!     "api_http_requests_total",
//!     [
//!         Some(Label::string("method", "GET")),
//!         Label::display_quoted("error", &err).when(failed),
//!         Label::uint("retries", retries).when_with(|| retries > 0),
//!     ],
//! )?;
//! ```

use std::fmt;

use crate::error::Result;
use crate::pool::BufferPool;
use crate::value::LabelValue;

/// A label ready to be appended to a metric.
#[derive(Debug, Clone, Copy)]
pub struct Label<'a> {
    /// Label name, validated when the label is appended.
    pub name: &'a str,
    /// Value formatted between the quotes.
    pub value: LabelValue<'a>,
    /// Escape `"`, `\` and newline in the rendered value.
    pub escape: bool,
}

impl<'a> Label<'a> {
    /// A label of any supported value type.
    pub fn new(name: &'a str, value: impl Into<LabelValue<'a>>, escape: bool) -> Self {
        Self {
            name,
            value: value.into(),
            escape,
        }
    }

    /// A string label copied verbatim.
    pub fn string(name: &'a str, value: &'a str) -> Self {
        Self::new(name, value, false)
    }

    /// A string label with the value escaped.
    pub fn quoted(name: &'a str, value: &'a str) -> Self {
        Self::new(name, value, true)
    }

    /// A boolean label, rendered `true` or `false`.
    pub fn bool(name: &'a str, value: bool) -> Self {
        Self::new(name, value, false)
    }

    /// A signed integer label.
    pub fn int(name: &'a str, value: i64) -> Self {
        Self::new(name, value, false)
    }

    /// An unsigned integer label.
    pub fn uint(name: &'a str, value: u64) -> Self {
        Self::new(name, value, false)
    }

    /// An `f64` label in shortest round-trip form.
    pub fn float(name: &'a str, value: f64) -> Self {
        Self::new(name, value, false)
    }

    /// A label holding the `Display` output of `value`, verbatim.
    pub fn display(name: &'a str, value: &'a dyn fmt::Display) -> Self {
        Self::new(name, LabelValue::Display(value), false)
    }

    /// Like [`display`](Self::display), escaping the output.
    pub fn display_quoted(name: &'a str, value: &'a dyn fmt::Display) -> Self {
        Self::new(name, LabelValue::Display(value), true)
    }

    /// An `error` label with the message escaped.
    pub fn error(err: &'a dyn fmt::Display) -> Self {
        Self::display_quoted(crate::builder::ERROR_LABEL_NAME, err)
    }

    /// Keep the label only if `cond` holds.
    pub fn when(self, cond: bool) -> Option<Self> {
        cond.then_some(self)
    }

    /// Keep the label only if `cond` returns `true`. `cond` runs once.
    pub fn when_with<F: FnOnce() -> bool>(self, cond: F) -> Option<Self> {
        cond().then_some(self)
    }
}

/// Compose a metric using the process-wide default pool.
///
/// Labels render in iteration order; `None` entries are left out and invalid
/// labels are skipped the same way [`MetricBuilder`](crate::MetricBuilder) skips them.
///
/// # Errors
///
/// Returns [`MetricError::InvalidName`](crate::MetricError::InvalidName) if
/// `name` fails validation.
pub fn compose<'l, I>(name: &str, labels: I) -> Result<String>
where
    I: IntoIterator,
    I::Item: Into<Option<Label<'l>>>,
{
    compose_in(crate::default_pool(), name, labels)
}

/// Like [`compose`], drawing the buffer from `pool`.
pub fn compose_in<'l, I>(pool: &BufferPool, name: &str, labels: I) -> Result<String>
where
    I: IntoIterator,
    I::Item: Into<Option<Label<'l>>>,
{
    Ok(pool.metric(name)?.labels(labels).render())
}
