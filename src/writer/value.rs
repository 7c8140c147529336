//! Values that can be written as attribute values or text.

use std::borrow::Cow;
use std::fmt::Write as _;

/// A value with a textual form, written through the escaping of the
/// current context.
///
/// `None` values have no textual form: writing an attribute with such a
/// value emits nothing.
pub trait MarkupValue {
    /// Appends the textual form to `out`. Returns `false` if there is none.
    fn format_into(&self, out: &mut String) -> bool;
}

impl MarkupValue for str {
    fn format_into(&self, out: &mut String) -> bool {
        out.push_str(self);
        true
    }
}

impl MarkupValue for String {
    fn format_into(&self, out: &mut String) -> bool {
        out.push_str(self);
        true
    }
}

impl MarkupValue for Cow<'_, str> {
    fn format_into(&self, out: &mut String) -> bool {
        out.push_str(self);
        true
    }
}

impl MarkupValue for char {
    fn format_into(&self, out: &mut String) -> bool {
        out.push(*self);
        true
    }
}

impl MarkupValue for bool {
    fn format_into(&self, out: &mut String) -> bool {
        out.push_str(if *self { "true" } else { "false" });
        true
    }
}

macro_rules! integer_value {
    ($($ty:ty),*) => {
        $(
            impl MarkupValue for $ty {
                fn format_into(&self, out: &mut String) -> bool {
                    let _ = write!(out, "{self}");
                    true
                }
            }
        )*
    };
}

integer_value!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

impl MarkupValue for f64 {
    fn format_into(&self, out: &mut String) -> bool {
        push_number(out, *self);
        true
    }
}

impl MarkupValue for f32 {
    fn format_into(&self, out: &mut String) -> bool {
        if self.is_finite() {
            // Display gives the shortest form that reads back as the same f32.
            let _ = write!(out, "{}", if *self == 0.0 { 0.0 } else { *self });
        } else {
            push_number(out, f64::from(*self));
        }
        true
    }
}

impl<T: MarkupValue + ?Sized> MarkupValue for &T {
    fn format_into(&self, out: &mut String) -> bool {
        (**self).format_into(out)
    }
}

impl<T: MarkupValue> MarkupValue for Option<T> {
    fn format_into(&self, out: &mut String) -> bool {
        match self {
            Some(value) => value.format_into(out),
            None => false,
        }
    }
}

/// Appends `value` the way JavaScript prints numbers: integral values
/// without a fraction, `NaN`, `Infinity` and `-Infinity` for non-finite
/// values, and no negative zero.
pub(crate) fn push_number(out: &mut String, value: f64) {
    if value.is_nan() {
        out.push_str("NaN");
    } else if value.is_infinite() {
        out.push_str(if value > 0.0 { "Infinity" } else { "-Infinity" });
    } else {
        let value = if value == 0.0 { 0.0 } else { value };
        let mut buffer = ryu_js::Buffer::new();
        out.push_str(buffer.format_finite(value));
    }
}

/// A script literal: `null`, a boolean, a number or a string.
///
/// Strings are written as quoted and escaped script string literals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScriptLiteral<'a> {
    Null,
    Bool(bool),
    Int(i64),
    Number(f64),
    Str(&'a str),
}

impl<'a> From<&'a str> for ScriptLiteral<'a> {
    fn from(value: &'a str) -> Self {
        ScriptLiteral::Str(value)
    }
}

impl<'a> From<&'a String> for ScriptLiteral<'a> {
    fn from(value: &'a String) -> Self {
        ScriptLiteral::Str(value)
    }
}

impl<'a> From<Option<&'a str>> for ScriptLiteral<'a> {
    fn from(value: Option<&'a str>) -> Self {
        value.map_or(ScriptLiteral::Null, ScriptLiteral::Str)
    }
}

impl From<bool> for ScriptLiteral<'_> {
    fn from(value: bool) -> Self {
        ScriptLiteral::Bool(value)
    }
}

impl From<i32> for ScriptLiteral<'_> {
    fn from(value: i32) -> Self {
        ScriptLiteral::Int(value.into())
    }
}

impl From<i64> for ScriptLiteral<'_> {
    fn from(value: i64) -> Self {
        ScriptLiteral::Int(value)
    }
}

impl From<f64> for ScriptLiteral<'_> {
    fn from(value: f64) -> Self {
        ScriptLiteral::Number(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text<V: MarkupValue>(value: V) -> Option<String> {
        let mut out = String::new();
        value.format_into(&mut out).then_some(out)
    }

    #[test]
    fn test_scalars() {
        assert_eq!(text(true).as_deref(), Some("true"));
        assert_eq!(text('x').as_deref(), Some("x"));
        assert_eq!(text(-99i64).as_deref(), Some("-99"));
        assert_eq!(text("gnirtS").as_deref(), Some("gnirtS"));
    }

    #[test]
    fn test_none_has_no_text() {
        assert_eq!(text(None::<&str>), None);
        assert_eq!(text(Some(1u8)).as_deref(), Some("1"));
    }

    #[test]
    fn test_floats_trim_trailing_zeros() {
        assert_eq!(text(42.0f64).as_deref(), Some("42"));
        assert_eq!(text(42.13f64).as_deref(), Some("42.13"));
        assert_eq!(text(42.0f32).as_deref(), Some("42"));
        assert_eq!(text(42.13f32).as_deref(), Some("42.13"));
        assert_eq!(text(-0.0f64).as_deref(), Some("0"));
    }

    #[test]
    fn test_non_finite_numbers() {
        assert_eq!(text(f64::NAN).as_deref(), Some("NaN"));
        assert_eq!(text(f64::INFINITY).as_deref(), Some("Infinity"));
        assert_eq!(text(f32::NEG_INFINITY).as_deref(), Some("-Infinity"));
    }

    #[test]
    fn test_script_literal_conversions() {
        assert_eq!(ScriptLiteral::from(None::<&str>), ScriptLiteral::Null);
        assert_eq!(ScriptLiteral::from("x"), ScriptLiteral::Str("x"));
        assert_eq!(ScriptLiteral::from(42i64), ScriptLiteral::Int(42));
    }
}
