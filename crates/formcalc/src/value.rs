use std::cmp::Ordering;
use std::fmt;

use serde_json::Value as JsonValue;

/// JSON numbers with a magnitude below this are written as integers when integral.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// A scalar script value.
///
/// Scripts mix numbers, strings and booleans freely; every operator coerces its operands
/// with the loose rules below instead of failing:
///
/// - numbers: booleans are `1`/`0`, strings use their longest leading decimal prefix
///   (`"12abc"` is `12`, `"abc"` is `0`);
/// - strings: integral numbers drop their fraction (`42.0` is `"42"`), `true` is `"1"` and
///   `false` is `""`;
/// - truthiness: `false`, `0`, `""` and `"0"` are falsy, everything else is truthy.
#[derive(Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    Number(f64),
    String(String),
}

impl Default for Value {
    fn default() -> Self {
        Self::Number(0.0)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(v) => write!(f, "Boolean({v})"),
            Self::Number(v) => write!(f, "Number({v})"),
            Self::String(v) => write!(f, "String({v:?})"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

impl Value {
    pub fn empty_string() -> Self {
        Self::String(String::new())
    }

    /// JSON form of the value. Integral numbers become JSON integers and non-finite
    /// numbers become `null`.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Boolean(b) => JsonValue::Bool(*b),
            Self::String(s) => JsonValue::String(s.clone()),
            Self::Number(v) if v.fract() == 0.0 && v.abs() < MAX_SAFE_INTEGER => {
                JsonValue::from(*v as i64)
            }
            Self::Number(v) => {
                serde_json::Number::from_f64(*v).map_or(JsonValue::Null, JsonValue::Number)
            }
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Boolean(v) => *v,
            Self::Number(v) => *v != 0.0,
            Self::String(v) => !v.is_empty() && v != "0",
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Self::Boolean(v) => {
                if *v {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Number(v) => *v,
            Self::String(s) => parse_float_prefix(s),
        }
    }

    pub fn to_string_lossy(&self) -> String {
        match self {
            Self::Boolean(true) => "1".to_string(),
            Self::Boolean(false) => String::new(),
            Self::Number(v) => format_number(*v),
            Self::String(v) => v.clone(),
        }
    }

    /// Numeric view used by comparisons: numbers and fully numeric strings only.
    fn as_numeric(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::String(s) => numeric_string_value(s),
            Self::Boolean(_) => None,
        }
    }

    /// Loose ordering between two scalars. `None` means the values are unordered (NaN).
    pub fn loose_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Boolean(_), _) | (_, Self::Boolean(_)) => {
                Some(self.is_truthy().cmp(&other.is_truthy()))
            }
            (Self::Number(a), Self::Number(b)) => a.partial_cmp(b),
            (Self::Number(a), Self::String(s)) => match numeric_string_value(s) {
                Some(b) => a.partial_cmp(&b),
                None => Some(format_number(*a).as_str().cmp(s.as_str())),
            },
            (Self::String(s), Self::Number(b)) => match numeric_string_value(s) {
                Some(a) => a.partial_cmp(b),
                None => Some(s.as_str().cmp(format_number(*b).as_str())),
            },
            (Self::String(a), Self::String(b)) => match (self.as_numeric(), other.as_numeric()) {
                (Some(x), Some(y)) => x.partial_cmp(&y),
                _ => Some(a.as_str().cmp(b.as_str())),
            },
        }
    }

    pub fn loose_eq(&self, other: &Self) -> bool {
        self.loose_cmp(other) == Some(Ordering::Equal)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Number(value as f64)
    }
}

pub(crate) fn format_number(v: f64) -> String {
    if v.is_nan() {
        return "NAN".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "INF" } else { "-INF" }.to_string();
    }
    let mut s = format!("{v}");
    if s.ends_with(".0") {
        s.truncate(s.len() - 2);
    }
    s
}

/// Length in bytes of the longest decimal number at the start of `s`
/// (`[+-]? digits? ('.' digits?)? ([eE][+-]?digits)?`, at least one mantissa digit).
fn decimal_prefix_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut i = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i += 1;
    }

    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let mut digits = i - int_start;

    if i < bytes.len() && bytes[i] == b'.' {
        let frac_start = i + 1;
        let mut j = frac_start;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if digits > 0 || j > frac_start {
            digits += j - frac_start;
            i = j;
        }
    }

    if digits == 0 {
        return 0;
    }

    if i < bytes.len() && matches!(bytes[i], b'e' | b'E') {
        let mut j = i + 1;
        if j < bytes.len() && matches!(bytes[j], b'+' | b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }

    i
}

fn trim_numeric_whitespace(s: &str) -> &str {
    s.trim_matches(|c: char| matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0B' | '\x0C'))
}

/// Permissive text-to-float conversion: leading whitespace is skipped, the longest leading
/// decimal prefix is converted, and anything without one yields `0`.
pub fn parse_float_prefix(s: &str) -> f64 {
    let s = s.trim_start_matches(|c: char| matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0B' | '\x0C'));
    let len = decimal_prefix_len(s);
    if len == 0 {
        return 0.0;
    }
    s[..len].parse::<f64>().unwrap_or(0.0)
}

/// Value of a string that is entirely a decimal number (surrounding whitespace allowed).
fn numeric_string_value(s: &str) -> Option<f64> {
    let trimmed = trim_numeric_whitespace(s);
    let len = decimal_prefix_len(trimmed);
    if len == 0 || len != trimmed.len() {
        return None;
    }
    trimmed.parse::<f64>().ok()
}
