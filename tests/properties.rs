//! Property tests for rendering, escaping and skipping.

use metric_builder::{escape, BufferPool, Limits, MetricBuilder, MetricError};
use proptest::prelude::*;

/// Undo Prometheus text-format escaping.
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn label_name() -> impl Strategy<Value = String> {
    "[a-z_][a-z0-9_]{0,15}"
}

fn clean_value() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ./:_-]{1,32}"
}

fn expected(name: &str, labels: &[(String, String)]) -> String {
    if labels.is_empty() {
        return name.to_string();
    }
    let pairs: Vec<String> = labels.iter().map(|(k, v)| format!(r#"{k}="{v}""#)).collect();
    format!("{name}{{{}}}", pairs.join(","))
}

proptest! {
    #[test]
    fn prop_render_preserves_label_order(
        name in "[a-z_][a-z0-9_]{0,31}",
        labels in prop::collection::vec((label_name(), clean_value()), 0..8),
    ) {
        let pool = BufferPool::with_capacity(2);
        let rendered = labels
            .iter()
            .fold(pool.metric(&name).unwrap(), |b, (k, v)| b.label(k, v))
            .render();
        prop_assert_eq!(rendered, expected(&name, &labels));
    }

    #[test]
    fn prop_empty_entries_absent(
        labels in prop::collection::vec(
            (prop_oneof![Just(String::new()), label_name()], prop_oneof![Just(String::new()), clean_value()]),
            0..10,
        ),
    ) {
        let rendered = labels
            .iter()
            .fold(MetricBuilder::new().set_name("m").unwrap(), |b, (k, v)| b.label(k, v))
            .render();
        let kept: Vec<(String, String)> = labels
            .into_iter()
            .filter(|(k, v)| !k.is_empty() && !v.is_empty())
            .collect();
        prop_assert_eq!(rendered, expected("m", &kept));
    }

    #[test]
    fn prop_escaping_clean_value_is_verbatim(value in "[^\"\\\\\n]{1,64}") {
        let escaped = MetricBuilder::new().set_name("m").unwrap().label_escaped("v", &value).render();
        let verbatim = MetricBuilder::new().set_name("m").unwrap().label("v", &value).render();
        prop_assert_eq!(escaped, verbatim);
    }

    #[test]
    fn prop_escape_round_trip(value in "[ -~\n]{0,64}") {
        let escaped = escape(&value);
        prop_assert!(!escaped.contains('\n'));
        prop_assert_eq!(unescape(&escaped), value);
    }

    #[test]
    fn prop_escaped_value_never_closes_early(value in "[ -~]{1,64}") {
        let rendered = MetricBuilder::with_limits(Limits::unlimited())
            .set_name("m")
            .unwrap()
            .label_escaped("v", &value)
            .render();
        let inner = &rendered[r#"m{v=""#.len()..rendered.len() - 2];
        prop_assert_eq!(unescape(inner), value);
    }

    #[test]
    fn prop_oversize_name_rejected(extra in 1usize..64) {
        let name = "n".repeat(Limits::default().max_name_len + extra);
        let err = BufferPool::with_capacity(1).metric(&name).unwrap_err();
        let is_invalid = matches!(err, MetricError::InvalidName { .. });
        prop_assert!(is_invalid);
    }

    #[test]
    fn prop_oversize_labels_skipped(
        name_extra in 1usize..32,
        value_extra in 1usize..32,
    ) {
        let limits = Limits::default();
        let long_name = "k".repeat(limits.max_label_name_len + name_extra);
        let long_value = "v".repeat(limits.max_label_value_len + value_extra);
        let rendered = MetricBuilder::new()
            .set_name("m")
            .unwrap()
            .label(&long_name, "v")
            .label("k", &long_value)
            .label("ok", "1")
            .render();
        prop_assert_eq!(rendered, r#"m{ok="1"}"#);
    }
}

#[test]
fn test_unescape_helper() {
    assert_eq!(unescape(r#"a\"b\\c\nd"#), "a\"b\\c\nd");
}
