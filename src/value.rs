//! Typed label values and the helpers that format them into a buffer.
//!
//! Every label value is written between double quotes. Strings are copied
//! verbatim or escaped; other types are formatted to their canonical text:
//!
//! | type | rendering |
//! |------|-----------|
//! | `bool` | `true` / `false` |
//! | integers | base 10, sign kept for signed types |
//! | floats | shortest round-trip decimal, never exponential; `NaN`, `+Inf`, `-Inf` |
//! | `Display` | whatever `fmt` writes |

use std::borrow::Cow;
use std::fmt;

/// A label value, dispatched once when the builder formats it.
#[derive(Clone, Copy)]
pub enum LabelValue<'a> {
    Str(&'a str),
    Bool(bool),
    Int(i128),
    Uint(u128),
    F32(f32),
    F64(f64),
    /// Any value with a textual representation, including errors.
    Display(&'a dyn fmt::Display),
}

impl LabelValue<'_> {
    /// Byte length of the unescaped value when it is known without formatting.
    pub(crate) fn known_len(&self) -> Option<usize> {
        match self {
            LabelValue::Str(s) => Some(s.len()),
            _ => None,
        }
    }

    /// Write the unquoted, unescaped textual form of the value.
    pub(crate) fn write_to<W: fmt::Write>(&self, w: &mut W) -> fmt::Result {
        match *self {
            LabelValue::Str(s) => w.write_str(s),
            LabelValue::Bool(b) => w.write_str(if b { "true" } else { "false" }),
            LabelValue::Int(i) => write!(w, "{i}"),
            LabelValue::Uint(u) => write!(w, "{u}"),
            // f32 is printed as f32 so 0.1f32 renders "0.1", not its widened digits
            LabelValue::F32(f) => match non_finite(f64::from(f)) {
                Some(s) => w.write_str(s),
                None => write!(w, "{f}"),
            },
            LabelValue::F64(f) => match non_finite(f) {
                Some(s) => w.write_str(s),
                None => write!(w, "{f}"),
            },
            LabelValue::Display(d) => write!(w, "{d}"),
        }
    }
}

fn non_finite(f: f64) -> Option<&'static str> {
    if f.is_nan() {
        Some("NaN")
    } else if f == f64::INFINITY {
        Some("+Inf")
    } else if f == f64::NEG_INFINITY {
        Some("-Inf")
    } else {
        None
    }
}

impl fmt::Debug for LabelValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelValue::Str(s) => f.debug_tuple("Str").field(s).finish(),
            LabelValue::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            LabelValue::Int(i) => f.debug_tuple("Int").field(i).finish(),
            LabelValue::Uint(u) => f.debug_tuple("Uint").field(u).finish(),
            LabelValue::F32(v) => f.debug_tuple("F32").field(v).finish(),
            LabelValue::F64(v) => f.debug_tuple("F64").field(v).finish(),
            LabelValue::Display(d) => f.debug_tuple("Display").field(&d.to_string()).finish(),
        }
    }
}

impl fmt::Display for LabelValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_to(f)
    }
}

impl<'a> From<&'a str> for LabelValue<'a> {
    fn from(value: &'a str) -> Self {
        LabelValue::Str(value)
    }
}

impl<'a> From<&'a String> for LabelValue<'a> {
    fn from(value: &'a String) -> Self {
        LabelValue::Str(value.as_str())
    }
}

impl From<bool> for LabelValue<'_> {
    fn from(value: bool) -> Self {
        LabelValue::Bool(value)
    }
}

impl From<f32> for LabelValue<'_> {
    fn from(value: f32) -> Self {
        LabelValue::F32(value)
    }
}

impl From<f64> for LabelValue<'_> {
    fn from(value: f64) -> Self {
        LabelValue::F64(value)
    }
}

macro_rules! impl_from_int {
    ($variant:ident, $wide:ty: $($ty:ty),+) => {
        $(
            impl From<$ty> for LabelValue<'_> {
                fn from(value: $ty) -> Self {
                    LabelValue::$variant(value as $wide)
                }
            }
        )+
    };
}

impl_from_int!(Int, i128: i8, i16, i32, i64, i128, isize);
impl_from_int!(Uint, u128: u8, u16, u32, u64, u128, usize);

/// `fmt::Write` adapter appending to a byte buffer, escaping on request.
///
/// Tracks how many bytes of unescaped text went through it so callers can
/// validate the value length after formatting.
pub(crate) struct ValueWriter<'a> {
    buf: &'a mut Vec<u8>,
    escape: bool,
    raw_len: usize,
}

impl<'a> ValueWriter<'a> {
    pub(crate) fn new(buf: &'a mut Vec<u8>, escape: bool) -> Self {
        Self {
            buf,
            escape,
            raw_len: 0,
        }
    }

    /// Bytes of unescaped text written so far.
    pub(crate) fn raw_len(&self) -> usize {
        self.raw_len
    }
}

impl fmt::Write for ValueWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.raw_len += s.len();
        if self.escape {
            escape_into(self.buf, s);
        } else {
            self.buf.extend_from_slice(s.as_bytes());
        }
        Ok(())
    }
}

#[inline]
fn needs_escape(b: u8) -> bool {
    matches!(b, b'"' | b'\\' | b'\n')
}

/// Append `s` to `dst`, escaping `"`, `\` and newline the way the Prometheus
/// text format expects.
///
/// Unescaped runs are copied in bulk, so a value without special characters
/// costs a single scan and a single copy.
pub fn escape_into(dst: &mut Vec<u8>, s: &str) {
    let bytes = s.as_bytes();
    let mut start = 0;
    for (i, &b) in bytes.iter().enumerate() {
        if !needs_escape(b) {
            continue;
        }
        dst.extend_from_slice(&bytes[start..i]);
        match b {
            b'\n' => dst.extend_from_slice(b"\\n"),
            _ => {
                dst.push(b'\\');
                dst.push(b);
            }
        }
        start = i + 1;
    }
    dst.extend_from_slice(&bytes[start..]);
}

/// Escape `s` into a new string, borrowing when nothing needs escaping.
pub fn escape(s: &str) -> Cow<'_, str> {
    if !s.bytes().any(needs_escape) {
        return Cow::Borrowed(s);
    }
    let mut buf = Vec::with_capacity(s.len() + 8);
    escape_into(&mut buf, s);
    // Only ASCII bytes were inserted, on ASCII boundaries.
    Cow::Owned(String::from_utf8_lossy(&buf).into_owned())
}

/// Render a value to a `String` the way a builder would, without quotes.
pub fn format_value(value: LabelValue<'_>, escape: bool) -> String {
    let mut buf = Vec::new();
    let mut w = ValueWriter::new(&mut buf, escape);
    // Writing into a Vec can't fail; a failing Display impl leaves what it wrote.
    let _ = value.write_to(&mut w);
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Write;

    fn render(value: impl for<'a> Into<LabelValue<'a>>) -> String {
        format_value(value.into(), false)
    }

    #[test]
    fn test_bool() {
        assert_eq!(render(true), "true");
        assert_eq!(render(false), "false");
    }

    #[test]
    fn test_integers() {
        assert_eq!(render(0u8), "0");
        assert_eq!(render(-42i64), "-42");
        assert_eq!(render(i8::MIN), "-128");
        assert_eq!(render(u64::MAX), "18446744073709551615");
        assert_eq!(render(i128::MIN), "-170141183460469231731687303715884105728");
        assert_eq!(render(usize::MAX), usize::MAX.to_string());
        assert_eq!(render(-7isize), "-7");
    }

    #[test]
    fn test_floats() {
        assert_eq!(render(1234.456789f64), "1234.456789");
        assert_eq!(render(66.7f64), "66.7");
        assert_eq!(render(1.0f64), "1");
        assert_eq!(render(0.1f32), "0.1");
        assert_eq!(render(-0.5f32), "-0.5");
        assert_eq!(render(1e21f64), "1000000000000000000000");
        assert_eq!(render(1e-7f64), "0.0000001");
        assert_eq!(render(0.1f64 + 0.2f64), "0.30000000000000004");
    }

    #[test]
    fn test_non_finite_floats() {
        assert_eq!(render(f64::NAN), "NaN");
        assert_eq!(render(f64::INFINITY), "+Inf");
        assert_eq!(render(f32::NEG_INFINITY), "-Inf");
    }

    #[test]
    fn test_display() {
        let addr = std::net::Ipv4Addr::new(1, 2, 3, 4);
        assert_eq!(format_value(LabelValue::Display(&addr), false), "1.2.3.4");
    }

    #[test]
    fn test_escape_quotes() {
        assert_eq!(
            escape(r#"something went "horribly" wrong"#),
            r#"something went \"horribly\" wrong"#
        );
        assert_eq!(escape(r"C:\path"), r"C:\\path");
        assert_eq!(escape("two\nlines"), r"two\nlines");
    }

    #[test]
    fn test_escape_borrows_when_clean() {
        assert!(matches!(escape("plain/value"), Cow::Borrowed("plain/value")));
    }

    #[test]
    fn test_escape_keeps_multibyte() {
        assert_eq!(escape("héllo \"wörld\""), "héllo \\\"wörld\\\"");
    }

    #[test]
    fn test_writer_counts_raw_bytes() {
        let mut buf = Vec::new();
        let mut w = ValueWriter::new(&mut buf, true);
        w.write_str(r#"a"b"#).unwrap();
        assert_eq!(w.raw_len(), 3);
        assert_eq!(buf, br#"a\"b"#);
    }

    #[test]
    fn test_known_len() {
        assert_eq!(LabelValue::from("abc").known_len(), Some(3));
        assert_eq!(LabelValue::from(12u8).known_len(), None);
    }
}
