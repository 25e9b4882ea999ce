//! Incremental builder for metric identifiers.
//!
//! A [`MetricBuilder`] accumulates `name{label="value",...}` into a single
//! byte buffer. It moves through three states:
//!
//! ```text
//! Empty --set_name--> Named --label--> Labeled --label--> Labeled
//!   |                   |                 |
//!   +-------------------+-----render------+--> (consumed)
//! ```
//!
//! Structural misuse (a second name, a label before any name) is a bug at the
//! call site and fails loudly. Bad label data (empty or oversize names and
//! values) is logged through `tracing` and skipped, so the rest of the metric
//! still renders.

use std::fmt;
use std::io;
use std::mem;

use tracing::warn;

use crate::compose::Label;
use crate::config::{Limits, DEFAULT_BUFFER_CAPACITY};
use crate::error::{InvalidNameReason, MetricError, Result, SkipReason};
use crate::pool::BufferPool;
use crate::value::{LabelValue, ValueWriter};

/// Label name used by [`MetricBuilder::label_error`].
pub const ERROR_LABEL_NAME: &str = "error";

/// Per-build overrides applied by [`MetricBuilder::set_name_with`].
///
/// A length of zero disables the corresponding check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderOption {
    MaxNameLen(usize),
    MaxLabelNameLen(usize),
    MaxLabelValueLen(usize),
    /// Replace all limits at once.
    Limits(Limits),
}

impl BuilderOption {
    fn apply(self, limits: &mut Limits) {
        match self {
            BuilderOption::MaxNameLen(len) => limits.max_name_len = len,
            BuilderOption::MaxLabelNameLen(len) => limits.max_label_name_len = len,
            BuilderOption::MaxLabelValueLen(len) => limits.max_label_value_len = len,
            BuilderOption::Limits(all) => *limits = all,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Empty,
    Named,
    Labeled,
}

/// Builds one metric string per build episode.
///
/// The builder owns its buffer exclusively and is not `Clone`. Terminal
/// operations ([`render`](Self::render), [`append_to`](Self::append_to),
/// [`write_to`](Self::write_to)) consume it; a pooled builder hands its
/// buffer back to the pool when it is consumed or dropped.
///
/// # Examples
///
/// ```ignore
/// use metric_builder::MetricBuilder;
///
/// let metric = MetricBuilder::new()
///     .set_name("cassandra_query_count")?
///     .label("cluster", "guava")
///     .label("host", "1.2.3.4")
///     .render();
/// assert_eq!(metric, r#"cassandra_query_count{cluster="guava",host="1.2.3.4"}"#);
/// ```
pub struct MetricBuilder {
    buf: Vec<u8>,
    state: State,
    name_len: usize,
    limits: Limits,
    /// Limits restored by `reset`.
    base_limits: Limits,
    pool: Option<BufferPool>,
}

impl Default for MetricBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricBuilder {
    /// Create an unpooled builder with default limits.
    pub fn new() -> Self {
        Self::with_limits(Limits::default())
    }

    /// Create an unpooled builder with the given limits.
    pub fn with_limits(limits: Limits) -> Self {
        Self {
            buf: Vec::with_capacity(DEFAULT_BUFFER_CAPACITY),
            state: State::Empty,
            name_len: 0,
            limits,
            base_limits: limits,
            pool: None,
        }
    }

    pub(crate) fn pooled(pool: BufferPool) -> Self {
        let limits = pool.limits();
        Self {
            buf: pool.acquire(),
            state: State::Empty,
            name_len: 0,
            limits,
            base_limits: limits,
            pool: Some(pool),
        }
    }

    /// Commit the metric name.
    ///
    /// # Errors
    ///
    /// - [`MetricError::AlreadySet`] if a name was committed since the last reset.
    /// - [`MetricError::InvalidName`] if the name is empty, longer than the
    ///   name limit, or contains a double quote.
    ///
    /// On error the builder is dropped and nothing is written.
    pub fn set_name(self, name: &str) -> Result<Self> {
        self.set_name_with(name, &[])
    }

    /// Apply `options`, then commit the metric name.
    ///
    /// Options stay in effect until the builder is reset.
    pub fn set_name_with(mut self, name: &str, options: &[BuilderOption]) -> Result<Self> {
        if self.state != State::Empty {
            return Err(MetricError::AlreadySet {
                name: self.name().unwrap_or_default().to_owned(),
            });
        }
        for option in options {
            option.apply(&mut self.limits);
        }
        validate_name(name, self.limits.max_name_len)
            .map_err(|reason| MetricError::invalid_name(name, reason))?;

        self.buf.extend_from_slice(name.as_bytes());
        self.name_len = name.len();
        self.state = State::Named;
        Ok(self)
    }

    /// Append a string label, escaping the value when `escape` is set.
    ///
    /// Without escaping the value is copied as is, which is only correct for
    /// values known to contain no `"`, `\` or newline.
    ///
    /// # Panics
    ///
    /// Panics if no metric name has been set. Use
    /// [`try_add_label`](Self::try_add_label) to get an error instead.
    pub fn add_label(mut self, name: &str, value: &str, escape: bool) -> Self {
        self.push_label(name, LabelValue::Str(value), escape);
        self
    }

    /// Append a string label, copying the value verbatim.
    pub fn label(self, name: &str, value: &str) -> Self {
        self.add_label(name, value, false)
    }

    /// Append a string label, escaping quotes, backslashes and newlines.
    pub fn label_escaped(self, name: &str, value: &str) -> Self {
        self.add_label(name, value, true)
    }

    /// Append a label of any supported value type.
    ///
    /// String values go through verbatim.
    pub fn label_value<'v>(mut self, name: &str, value: impl Into<LabelValue<'v>>) -> Self {
        self.push_label(name, value.into(), false);
        self
    }

    /// Like [`add_label`](Self::add_label) for any value type, returning
    /// [`MetricError::NoName`] instead of panicking.
    pub fn try_add_label<'v>(
        mut self,
        name: &str,
        value: impl Into<LabelValue<'v>>,
        escape: bool,
    ) -> Result<Self> {
        if self.state == State::Empty {
            return Err(MetricError::NoName);
        }
        self.push_label(name, value.into(), escape);
        Ok(self)
    }

    /// Append a boolean label, rendered `true` or `false`.
    pub fn label_bool(self, name: &str, value: bool) -> Self {
        self.label_value(name, value)
    }

    /// Append a signed integer label in base 10.
    pub fn label_int(self, name: &str, value: i64) -> Self {
        self.label_value(name, value)
    }

    /// Append an unsigned integer label in base 10.
    pub fn label_uint(self, name: &str, value: u64) -> Self {
        self.label_value(name, value)
    }

    /// Append an `f32` label in its shortest round-trip decimal form.
    ///
    /// The value is formatted as `f32`, so `0.1f32` renders `0.1` rather than
    /// the `0.10000000149011612` a widening to `f64` would give.
    pub fn label_f32(self, name: &str, value: f32) -> Self {
        self.label_value(name, value)
    }

    /// Append an `f64` label in its shortest round-trip decimal form.
    pub fn label_f64(self, name: &str, value: f64) -> Self {
        self.label_value(name, value)
    }

    /// Append a label whose value is the `Display` output of `value`, verbatim.
    ///
    /// The value is formatted straight into the buffer; if it turns out empty
    /// or too long it is rolled back and the label skipped.
    pub fn label_display<D: fmt::Display + ?Sized>(mut self, name: &str, value: &D) -> Self {
        self.push_label(name, LabelValue::Display(&value), false);
        self
    }

    /// Like [`label_display`](Self::label_display), escaping the output.
    pub fn label_display_escaped<D: fmt::Display + ?Sized>(
        mut self,
        name: &str,
        value: &D,
    ) -> Self {
        self.push_label(name, LabelValue::Display(&value), true);
        self
    }

    /// Append `err` under the `error` label, escaped.
    pub fn label_error<E: std::error::Error + ?Sized>(self, err: &E) -> Self {
        self.label_named_error(ERROR_LABEL_NAME, err)
    }

    /// Append `err` under `name`, escaped.
    pub fn label_named_error<E: std::error::Error + ?Sized>(mut self, name: &str, err: &E) -> Self {
        self.push_label(name, LabelValue::Display(&err), true);
        self
    }

    /// Append `err` under `name` without escaping, for errors with known-clean messages.
    pub fn label_named_error_verbatim<E: std::error::Error + ?Sized>(
        mut self,
        name: &str,
        err: &E,
    ) -> Self {
        self.push_label(name, LabelValue::Display(&err), false);
        self
    }

    /// Append the error of `result` under the `error` label, escaped.
    ///
    /// No-op for `Ok`.
    pub fn label_if_err<T, E: fmt::Display>(self, result: &std::result::Result<T, E>) -> Self {
        match result {
            Ok(_) => self,
            Err(err) => self.label_display_escaped(ERROR_LABEL_NAME, err),
        }
    }

    /// Append a label if `value` is present, verbatim.
    pub fn label_opt<'v, V: Into<LabelValue<'v>>>(self, name: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.label_value(name, value),
            None => self,
        }
    }

    /// Append `err` under the `error` label if present, escaped.
    pub fn label_opt_error<E: std::error::Error + ?Sized>(self, err: Option<&E>) -> Self {
        match err {
            Some(err) => self.label_error(err),
            None => self,
        }
    }

    /// Append a prepared [`Label`].
    pub fn label_entry(mut self, label: Label<'_>) -> Self {
        self.push_label(label.name, label.value, label.escape);
        self
    }

    /// Append every label in order, skipping `None` entries.
    pub fn labels<'l, I>(self, labels: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Option<Label<'l>>>,
    {
        labels
            .into_iter()
            .filter_map(Into::into)
            .fold(self, MetricBuilder::label_entry)
    }

    /// Return the builder to its empty state, keeping its buffer.
    ///
    /// Limits changed through options revert to those the builder started with.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.state = State::Empty;
        self.name_len = 0;
        self.limits = self.base_limits;
    }

    /// Render the metric into an owned string.
    ///
    /// Returns an empty string if no name was set.
    pub fn render(mut self) -> String {
        if !self.close() {
            return String::new();
        }
        match self.pool {
            // The buffer goes back to the pool on drop, so copy out of it.
            Some(_) => String::from_utf8_lossy(&self.buf).into_owned(),
            None => into_string(mem::take(&mut self.buf)),
        }
    }

    /// Append the rendered metric to `dst`.
    ///
    /// Appends nothing if no name was set.
    pub fn append_to(mut self, dst: &mut Vec<u8>) {
        if self.close() {
            dst.extend_from_slice(&self.buf);
        }
    }

    /// Write the rendered metric to `w`, returning the number of bytes written.
    ///
    /// # Errors
    ///
    /// Propagates any error from the writer.
    pub fn write_to<W: io::Write + ?Sized>(mut self, w: &mut W) -> io::Result<usize> {
        if !self.close() {
            return Ok(0);
        }
        w.write_all(&self.buf)?;
        Ok(self.buf.len())
    }

    /// Length in bytes of the metric as it would render now.
    pub fn len(&self) -> usize {
        match self.state {
            State::Labeled => self.buf.len() + 1,
            _ => self.buf.len(),
        }
    }

    /// Returns `true` if no name has been set.
    pub fn is_empty(&self) -> bool {
        self.state == State::Empty
    }

    /// The committed metric name, if any.
    pub fn name(&self) -> Option<&str> {
        if self.state == State::Empty {
            return None;
        }
        std::str::from_utf8(&self.buf[..self.name_len]).ok()
    }

    /// Limits currently in effect.
    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Returns `true` if the buffer came from a pool.
    pub fn is_pooled(&self) -> bool {
        self.pool.is_some()
    }

    /// Finish the buffer content. Returns `false` if there is nothing to render.
    fn close(&mut self) -> bool {
        match self.state {
            State::Empty => return false,
            State::Named => {}
            State::Labeled => self.buf.push(b'}'),
        }
        if let Some(pool) = &self.pool {
            pool.metrics().record_render();
        }
        true
    }

    fn push_label(&mut self, name: &str, value: LabelValue<'_>, escape: bool) {
        if self.state == State::Empty {
            panic!("{}", MetricError::NoName);
        }
        if let Err(reason) = self.check_label_name(name) {
            self.skip(name, None, reason);
            return;
        }
        if let Some(len) = value.known_len() {
            if let Err(reason) = self.check_label_value(len) {
                self.skip(name, Some(&value), reason);
                return;
            }
        }

        let mark = self.buf.len();
        self.buf
            .push(if self.state == State::Labeled { b',' } else { b'{' });
        self.buf.extend_from_slice(name.as_bytes());
        self.buf.extend_from_slice(b"=\"");
        let start = self.buf.len();

        let mut w = ValueWriter::new(&mut self.buf, escape);
        let formatted = value.write_to(&mut w);
        let raw_len = w.raw_len();

        let checked = match formatted {
            Ok(()) => self.check_label_value(raw_len),
            Err(_) => Err(SkipReason::FormatFailed),
        };
        if let Err(reason) = checked {
            let written = String::from_utf8_lossy(&self.buf[start..]).into_owned();
            self.buf.truncate(mark);
            self.skip(name, Some(&written), reason);
            return;
        }

        self.buf.push(b'"');
        self.state = State::Labeled;
    }

    fn check_label_name(&self, name: &str) -> std::result::Result<(), SkipReason> {
        let max = self.limits.max_label_name_len;
        if name.is_empty() {
            Err(SkipReason::EmptyName)
        } else if Limits::exceeds(max, name.len()) {
            Err(SkipReason::NameTooLong {
                len: name.len(),
                max,
            })
        } else {
            Ok(())
        }
    }

    fn check_label_value(&self, len: usize) -> std::result::Result<(), SkipReason> {
        let max = self.limits.max_label_value_len;
        if len == 0 {
            Err(SkipReason::EmptyValue)
        } else if Limits::exceeds(max, len) {
            Err(SkipReason::ValueTooLong { len, max })
        } else {
            Ok(())
        }
    }

    fn skip(&self, label: &str, value: Option<&dyn fmt::Display>, reason: SkipReason) {
        let metric = String::from_utf8_lossy(&self.buf);
        match value {
            Some(value) => warn!(%metric, label, %value, %reason, "skipping label"),
            None => warn!(%metric, label, %reason, "skipping label"),
        }
        if let Some(pool) = &self.pool {
            pool.metrics().record_skip();
        }
    }
}

impl Drop for MetricBuilder {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.release(mem::take(&mut self.buf));
        }
    }
}

impl fmt::Debug for MetricBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricBuilder")
            .field("buf", &String::from_utf8_lossy(&self.buf))
            .field("state", &self.state)
            .field("limits", &self.limits)
            .field("pooled", &self.pool.is_some())
            .finish()
    }
}

fn validate_name(name: &str, max: usize) -> std::result::Result<(), InvalidNameReason> {
    if name.is_empty() {
        return Err(InvalidNameReason::Empty);
    }
    if Limits::exceeds(max, name.len()) {
        return Err(InvalidNameReason::TooLong {
            len: name.len(),
            max,
        });
    }
    if name.as_bytes().contains(&b'"') {
        return Err(InvalidNameReason::ContainsQuote);
    }
    Ok(())
}

// Every write appends whole `&str`s or ASCII bytes, so this never takes the lossy path.
fn into_string(buf: Vec<u8>) -> String {
    String::from_utf8(buf).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}
