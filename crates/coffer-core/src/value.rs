//! The closed set of values a cache entry can hold.

use crate::NumericOpFailure;
use chrono::{DateTime, SecondsFormat, Utc};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// A cached scalar value.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue {
    /// UTF-8 text.
    String(String),
    /// Arbitrary bytes.
    Bytes(Vec<u8>),
    /// Signed integer of any width.
    Int(i64),
    /// Unsigned integer of any width.
    UInt(u64),
    /// Floating point number.
    Float(f64),
    /// Boolean flag.
    Bool(bool),
    /// Point in time, always UTC.
    Timestamp(DateTime<Utc>),
}

/// Variant tag of a [`CacheValue`], used where the variant has to be
/// persisted next to its wire encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    String,
    Bytes,
    Int,
    UInt,
    Float,
    Bool,
    Timestamp,
}

impl ValueKind {
    /// Returns the tag's stable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Bytes => "bytes",
            Self::Int => "int",
            Self::UInt => "uint",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Timestamp => "timestamp",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(Self::String),
            "bytes" => Ok(Self::Bytes),
            "int" => Ok(Self::Int),
            "uint" => Ok(Self::UInt),
            "float" => Ok(Self::Float),
            "bool" => Ok(Self::Bool),
            "timestamp" => Ok(Self::Timestamp),
            other => Err(format!("unknown value kind '{other}'")),
        }
    }
}

impl CacheValue {
    /// Returns the variant tag.
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::String(_) => ValueKind::String,
            Self::Bytes(_) => ValueKind::Bytes,
            Self::Int(_) => ValueKind::Int,
            Self::UInt(_) => ValueKind::UInt,
            Self::Float(_) => ValueKind::Float,
            Self::Bool(_) => ValueKind::Bool,
            Self::Timestamp(_) => ValueKind::Timestamp,
        }
    }

    /// Returns the variant's name, as used in scan errors.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Returns the string payload, if this is a `String`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Renders the value in its textual wire form.
    ///
    /// Returns `None` only for byte payloads that are not valid UTF-8.
    #[must_use]
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::String(s) => Some(Cow::Borrowed(s)),
            Self::Bytes(b) => std::str::from_utf8(b).ok().map(Cow::Borrowed),
            Self::Int(v) => Some(Cow::Owned(v.to_string())),
            Self::UInt(v) => Some(Cow::Owned(v.to_string())),
            Self::Float(v) => Some(Cow::Owned(v.to_string())),
            Self::Bool(v) => Some(Cow::Borrowed(if *v { "1" } else { "0" })),
            Self::Timestamp(v) => Some(Cow::Owned(v.to_rfc3339_opts(SecondsFormat::AutoSi, true))),
        }
    }

    /// Encodes the value for a text-oriented backend.
    #[must_use]
    pub fn to_wire(&self) -> Vec<u8> {
        match self {
            Self::Bytes(b) => b.clone(),
            // Every other variant has a UTF-8 rendering.
            other => other
                .as_text()
                .map(|text| text.into_owned().into_bytes())
                .unwrap_or_default(),
        }
    }

    /// Decodes a wire payload back into the variant named by `kind`.
    ///
    /// Returns `None` when the payload is not a valid encoding of `kind`.
    #[must_use]
    pub fn from_wire(kind: ValueKind, payload: &[u8]) -> Option<Self> {
        let text = || std::str::from_utf8(payload).ok();
        match kind {
            ValueKind::Bytes => Some(Self::Bytes(payload.to_vec())),
            ValueKind::String => text().map(|t| Self::String(t.to_string())),
            ValueKind::Int => text()?.parse().ok().map(Self::Int),
            ValueKind::UInt => text()?.parse().ok().map(Self::UInt),
            ValueKind::Float => text()?.parse().ok().map(Self::Float),
            ValueKind::Bool => parse_bool(text()?).map(Self::Bool),
            ValueKind::Timestamp => parse_timestamp(text()?).map(Self::Timestamp),
        }
    }

    /// Wraps raw bytes read from a text backend, preferring `String` when the
    /// payload is valid UTF-8.
    #[must_use]
    pub fn from_raw(payload: Vec<u8>) -> Self {
        match String::from_utf8(payload) {
            Ok(s) => Self::String(s),
            Err(e) => Self::Bytes(e.into_bytes()),
        }
    }

    /// Returns the value adjusted by `delta`.
    ///
    /// Integers are checked against their range. Floats add the step. Text
    /// payloads holding a decimal integer are adjusted and stay textual, the
    /// way a text backend treats them.
    pub fn adjusted(&self, delta: i64) -> Result<Self, NumericOpFailure> {
        match self {
            Self::Int(v) => v.checked_add(delta).map(Self::Int).ok_or(NumericOpFailure::Overflow),
            Self::UInt(v) => {
                let adjusted = if delta >= 0 {
                    v.checked_add(delta.unsigned_abs())
                } else {
                    v.checked_sub(delta.unsigned_abs())
                };
                adjusted.map(Self::UInt).ok_or(NumericOpFailure::Overflow)
            }
            #[allow(clippy::cast_precision_loss)]
            Self::Float(v) => Ok(Self::Float(v + delta as f64)),
            Self::String(s) => adjust_text(s, delta).map(Self::String),
            Self::Bytes(b) => {
                let text = std::str::from_utf8(b).map_err(|_| NumericOpFailure::NotNumeric)?;
                adjust_text(text, delta).map(|s| Self::Bytes(s.into_bytes()))
            }
            Self::Bool(_) | Self::Timestamp(_) => Err(NumericOpFailure::NotNumeric),
        }
    }
}

/// Turns a decrement step into the delta passed to [`CacheValue::adjusted`].
pub fn decrement_delta(step: i64) -> Result<i64, NumericOpFailure> {
    step.checked_neg().ok_or(NumericOpFailure::Overflow)
}

fn adjust_text(text: &str, delta: i64) -> Result<String, NumericOpFailure> {
    let current: i64 = text.parse().map_err(|_| NumericOpFailure::NotNumeric)?;
    current
        .checked_add(delta)
        .map(|v| v.to_string())
        .ok_or(NumericOpFailure::Overflow)
}

/// Parses a boolean the way text protocols spell it.
pub(crate) fn parse_bool(text: &str) -> Option<bool> {
    match text {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

pub(crate) fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

macro_rules! from_signed {
    ($($t:ty),*) => {
        $(
            impl From<$t> for CacheValue {
                fn from(value: $t) -> Self {
                    Self::Int(i64::from(value))
                }
            }
        )*
    };
}

macro_rules! from_unsigned {
    ($($t:ty),*) => {
        $(
            impl From<$t> for CacheValue {
                fn from(value: $t) -> Self {
                    Self::UInt(u64::from(value))
                }
            }
        )*
    };
}

from_signed!(i8, i16, i32, i64);
from_unsigned!(u8, u16, u32, u64);

impl From<isize> for CacheValue {
    fn from(value: isize) -> Self {
        // isize is at most 64 bits on every supported target.
        Self::Int(value as i64)
    }
}

impl From<usize> for CacheValue {
    fn from(value: usize) -> Self {
        Self::UInt(value as u64)
    }
}

impl From<f32> for CacheValue {
    fn from(value: f32) -> Self {
        Self::Float(f64::from(value))
    }
}

impl From<f64> for CacheValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for CacheValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for CacheValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for CacheValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&String> for CacheValue {
    fn from(value: &String) -> Self {
        Self::String(value.clone())
    }
}

impl From<Vec<u8>> for CacheValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<&[u8]> for CacheValue {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(value.to_vec())
    }
}

impl From<DateTime<Utc>> for CacheValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}
