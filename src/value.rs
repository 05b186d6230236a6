use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Scan target selected for a column from its backend-reported type.
///
/// `Opaque` is the fallback for types we have no static mapping for: the
/// value is decoded from its own representation, or kept as raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Boolean,
    Integer,
    Float,
    Decimal,
    Text,
    Date,
    Timestamp,
    Opaque,
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Decimal => "decimal",
            Self::Text => "text",
            Self::Date => "date",
            Self::Timestamp => "timestamp",
            Self::Opaque => "opaque",
        };
        f.write_str(name)
    }
}

/// One decoded column value.
///
/// Consumers that need numbers (moving averages and the like) should go
/// through [`Scalar::as_f64`] rather than assuming a variant.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Scalar {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Date(NaiveDate),
    /// Wall-clock timestamp, normalised to UTC when the backend knows the zone.
    Timestamp(NaiveDateTime),
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("cannot decode {found} value as {kind}")]
    Mismatch { kind: ScalarKind, found: &'static str },
    #[error("invalid {kind} literal {text:?}")]
    Invalid { kind: ScalarKind, text: String },
    #[error("value is not valid UTF-8")]
    Utf8,
}

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

/// Parse the timestamp spellings databases commonly emit as text.
///
/// Zoned forms (RFC 3339, `+00:00` suffixes) are converted to UTC.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let s = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.naive_utc());
    }
    for fmt in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ts);
        }
    }
    parse_plain_date(s).and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Parse a calendar date. A timestamp is only accepted at midnight, so a
/// time of day is never dropped.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let s = text.trim();
    parse_plain_date(s).or_else(|| {
        parse_timestamp(s)
            .filter(|ts| ts.date().and_hms_opt(0, 0, 0) == Some(*ts))
            .map(|ts| ts.date())
    })
}

fn parse_plain_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y/%m/%d"))
        .ok()
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "y" | "yes" | "on" => Some(true),
        "0" | "f" | "false" | "n" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Scalar {
    /// Decode a textual column value into the variant `kind` asks for.
    ///
    /// `Opaque` columns keep the text as-is.
    pub fn parse(kind: ScalarKind, text: &str) -> Result<Self, ValueError> {
        let invalid = || ValueError::Invalid {
            kind,
            text: text.to_string(),
        };
        let trimmed = text.trim();
        match kind {
            ScalarKind::Boolean => parse_bool(trimmed).map(Self::Bool).ok_or_else(invalid),
            ScalarKind::Integer => trimmed.parse().map(Self::Int).map_err(|_| invalid()),
            ScalarKind::Float => trimmed.parse().map(Self::Float).map_err(|_| invalid()),
            ScalarKind::Decimal => Decimal::from_str(trimmed)
                .or_else(|_| Decimal::from_scientific(trimmed))
                .map(Self::Decimal)
                .map_err(|_| invalid()),
            ScalarKind::Date => parse_date(trimmed).map(Self::Date).ok_or_else(invalid),
            ScalarKind::Timestamp => parse_timestamp(trimmed)
                .map(Self::Timestamp)
                .ok_or_else(invalid),
            ScalarKind::Text | ScalarKind::Opaque => Ok(Self::Text(text.to_string())),
        }
    }

    /// Decode raw column bytes: UTF-8 text goes through [`Scalar::parse`],
    /// anything else is only acceptable for `Opaque` columns.
    pub fn parse_bytes(kind: ScalarKind, bytes: &[u8]) -> Result<Self, ValueError> {
        match std::str::from_utf8(bytes) {
            Ok(text) => Self::parse(kind, text),
            Err(_) if kind == ScalarKind::Opaque => Ok(Self::Bytes(bytes.to_vec())),
            Err(_) => Err(ValueError::Utf8),
        }
    }

    /// Interpret an integer as `kind`. Dates and timestamps read it as Unix seconds.
    pub fn from_i64(kind: ScalarKind, v: i64) -> Result<Self, ValueError> {
        let invalid = || ValueError::Invalid {
            kind,
            text: v.to_string(),
        };
        match kind {
            ScalarKind::Integer | ScalarKind::Opaque => Ok(Self::Int(v)),
            ScalarKind::Float => Ok(Self::Float(v as f64)),
            ScalarKind::Decimal => Ok(Self::Decimal(Decimal::from(v))),
            ScalarKind::Boolean => Ok(Self::Bool(v != 0)),
            ScalarKind::Text => Ok(Self::Text(v.to_string())),
            ScalarKind::Timestamp => DateTime::from_timestamp(v, 0)
                .map(|dt| Self::Timestamp(dt.naive_utc()))
                .ok_or_else(invalid),
            ScalarKind::Date => DateTime::from_timestamp(v, 0)
                .map(|dt| Self::Date(dt.date_naive()))
                .ok_or_else(invalid),
        }
    }

    /// Interpret a float as `kind`. Integer targets reject fractional values.
    pub fn from_f64(kind: ScalarKind, v: f64) -> Result<Self, ValueError> {
        match kind {
            ScalarKind::Float | ScalarKind::Opaque => Ok(Self::Float(v)),
            ScalarKind::Decimal => Decimal::from_f64_retain(v)
                .map(Self::Decimal)
                .ok_or(ValueError::Invalid {
                    kind,
                    text: v.to_string(),
                }),
            ScalarKind::Text => Ok(Self::Text(v.to_string())),
            // i64::MAX as f64 rounds up to 2^63, hence the exclusive bound
            ScalarKind::Integer if v.fract() == 0.0 && v.is_finite() => {
                if v >= i64::MIN as f64 && v < i64::MAX as f64 {
                    Ok(Self::Int(v as i64))
                } else {
                    Err(ValueError::Invalid {
                        kind,
                        text: v.to_string(),
                    })
                }
            }
            _ => Err(ValueError::Mismatch {
                kind,
                found: "float",
            }),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Decimal(d) => d.to_f64(),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Decimal(_) => "decimal",
            Self::Text(_) => "text",
            Self::Date(_) => "date",
            Self::Timestamp(_) => "timestamp",
            Self::Bytes(_) => "bytes",
        }
    }
}

/// Human-legible rendering; this is what ends up as an X-axis label.
impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Decimal(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%.f")),
            Self::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
        }
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(v) => serializer.serialize_bool(*v),
            Self::Int(v) => serializer.serialize_i64(*v),
            Self::Float(v) => serializer.serialize_f64(*v),
            Self::Decimal(d) => match d.to_f64() {
                Some(v) => serializer.serialize_f64(v),
                None => serializer.collect_str(d),
            },
            _ => serializer.collect_str(self),
        }
    }
}
