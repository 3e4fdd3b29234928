//! Typed scalar values and the string-to-scalar coercion rules.
//!
//! Coercion never fails: any token that cannot be read as the requested
//! type becomes [`Scalar::Null`], so one truncated value cannot abort the
//! parse of an otherwise valid report.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Tolerance used when narrowing a parsed float to an integer.
pub const INT_TOLERANCE: f64 = 1e-9;

/// Tokens treated as "no value" by the numeric coercions (case-insensitive).
const NA_TOKENS: [&str; 4] = ["", "NA", "N/A", "NULL"];

/// A single typed value taken from a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
    Null,
}

/// The declared type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeTag {
    Int,
    Float,
    Bool,
    String,
}

impl TypeTag {
    pub fn is_numeric(self) -> bool {
        matches!(self, TypeTag::Int | TypeTag::Float)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::Int => write!(f, "int"),
            TypeTag::Float => write!(f, "float"),
            TypeTag::Bool => write!(f, "bool"),
            TypeTag::String => write!(f, "string"),
        }
    }
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Numeric view of the value. Booleans and strings are not numbers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(v) => Some(*v as f64),
            Scalar::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Integer view of the value; floats qualify only when integral.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Int(v) => Some(*v),
            Scalar::Float(v) => narrow_to_int(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(v) => write!(f, "{}", v),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::String(s) => write!(f, "{}", s),
            Scalar::Null => write!(f, "NA"),
        }
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::String(v.to_string())
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Scalar::Null)
    }
}

/// True for the tokens that numeric fields read as "no value".
pub fn is_na_token(raw: &str) -> bool {
    let t = raw.trim();
    NA_TOKENS.iter().any(|na| t.eq_ignore_ascii_case(na))
}

/// Round `v` to an integer when it is integral within [`INT_TOLERANCE`]
/// and inside the `i64` range.
pub fn narrow_to_int(v: f64) -> Option<i64> {
    if !v.is_finite() {
        return None;
    }
    let rounded = v.round();
    if (v - rounded).abs() > INT_TOLERANCE {
        return None;
    }
    if rounded < i64::MIN as f64 || rounded > i64::MAX as f64 {
        return None;
    }
    Some(rounded as i64)
}

fn parse_number(raw: &str) -> Option<f64> {
    let v: f64 = raw.parse().ok()?;
    v.is_finite().then_some(v)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" | "on" => Some(true),
        "false" | "0" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

/// Convert a raw token to a scalar of the requested type.
///
/// * Numeric: NA tokens and unparseable or non-finite values become `Null`.
///   An `Int` target yields `Int` only when the value is integral, otherwise
///   the parsed `Float` is kept.
/// * `Bool`: accepts true/1/yes/y/on and false/0/no/n/off.
/// * `String`: the trimmed token, never `Null`.
pub fn coerce(raw: &str, target: TypeTag) -> Scalar {
    let token = raw.trim();
    match target {
        TypeTag::Int | TypeTag::Float => {
            if is_na_token(token) {
                return Scalar::Null;
            }
            if target == TypeTag::Int {
                if let Ok(v) = token.parse::<i64>() {
                    return Scalar::Int(v);
                }
            }
            match parse_number(token) {
                Some(v) if target == TypeTag::Int => match narrow_to_int(v) {
                    Some(i) => Scalar::Int(i),
                    None => Scalar::Float(v),
                },
                Some(v) => Scalar::Float(v),
                None => Scalar::Null,
            }
        }
        TypeTag::Bool => parse_bool(token).map(Scalar::Bool).unwrap_or(Scalar::Null),
        TypeTag::String => Scalar::String(token.to_string()),
    }
}

/// Best-effort coercion for keys with no declared type: float, then string.
pub fn coerce_untyped(raw: &str) -> Scalar {
    let token = raw.trim();
    if token.is_empty() {
        return Scalar::Null;
    }
    match parse_number(token) {
        Some(v) => Scalar::Float(v),
        None => Scalar::String(token.to_string()),
    }
}
