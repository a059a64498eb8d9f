//! Coercion of cached values into typed destinations.
//!
//! A value converts directly when its variant already matches the target.
//! Otherwise it is rendered in its wire form and parsed as the target, so a
//! value read back as text from a remote backend coerces exactly like the
//! typed value kept by an in-process backend.

use crate::value::{parse_bool, parse_timestamp};
use crate::{CacheValue, ScanError};
use chrono::{DateTime, Utc};
use std::str::FromStr;

/// A type a cached value can be scanned into.
///
/// Only types implementing this trait are accepted by `get_scan`, so an
/// unsupported destination is rejected at compile time.
pub trait Scan: Sized + Send {
    /// Name used in mismatch errors.
    const TYPE_NAME: &'static str;

    /// Coerces `value` into `Self`.
    fn scan(value: &CacheValue) -> Result<Self, ScanError>;
}

fn mismatch<T: Scan>(value: &CacheValue) -> ScanError {
    ScanError::mismatch(T::TYPE_NAME, value.kind_name())
}

fn parse_text<T: FromStr>(value: &CacheValue) -> Option<T> {
    value.as_text()?.parse().ok()
}

macro_rules! scan_integer {
    ($($t:ty => $name:literal),* $(,)?) => {
        $(
            impl Scan for $t {
                const TYPE_NAME: &'static str = $name;

                fn scan(value: &CacheValue) -> Result<Self, ScanError> {
                    let converted = match value {
                        CacheValue::Int(v) => <$t>::try_from(*v).ok(),
                        CacheValue::UInt(v) => <$t>::try_from(*v).ok(),
                        other => parse_text(other),
                    };
                    converted.ok_or_else(|| mismatch::<Self>(value))
                }
            }
        )*
    };
}

scan_integer!(
    i8 => "i8",
    i16 => "i16",
    i32 => "i32",
    i64 => "i64",
    isize => "isize",
    u8 => "u8",
    u16 => "u16",
    u32 => "u32",
    u64 => "u64",
    usize => "usize",
);

impl Scan for f64 {
    const TYPE_NAME: &'static str = "f64";

    fn scan(value: &CacheValue) -> Result<Self, ScanError> {
        match value {
            CacheValue::Float(v) => Ok(*v),
            other => parse_text(other).ok_or_else(|| mismatch::<Self>(value)),
        }
    }
}

impl Scan for f32 {
    const TYPE_NAME: &'static str = "f32";

    #[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
    fn scan(value: &CacheValue) -> Result<Self, ScanError> {
        let wide = f64::scan(value).map_err(|_| mismatch::<Self>(value))?;
        let narrow = wide as f32;
        if wide.is_nan() || f64::from(narrow) == wide {
            Ok(narrow)
        } else {
            Err(mismatch::<Self>(value))
        }
    }
}

impl Scan for bool {
    const TYPE_NAME: &'static str = "bool";

    fn scan(value: &CacheValue) -> Result<Self, ScanError> {
        match value {
            CacheValue::Bool(v) => Ok(*v),
            other => other
                .as_text()
                .and_then(|text| parse_bool(&text))
                .ok_or_else(|| mismatch::<Self>(value)),
        }
    }
}

impl Scan for String {
    const TYPE_NAME: &'static str = "string";

    fn scan(value: &CacheValue) -> Result<Self, ScanError> {
        value
            .as_text()
            .map(std::borrow::Cow::into_owned)
            .ok_or_else(|| mismatch::<Self>(value))
    }
}

impl Scan for Vec<u8> {
    const TYPE_NAME: &'static str = "bytes";

    fn scan(value: &CacheValue) -> Result<Self, ScanError> {
        Ok(value.to_wire())
    }
}

impl Scan for DateTime<Utc> {
    const TYPE_NAME: &'static str = "timestamp";

    fn scan(value: &CacheValue) -> Result<Self, ScanError> {
        match value {
            CacheValue::Timestamp(v) => Ok(*v),
            other => other
                .as_text()
                .and_then(|text| parse_timestamp(&text))
                .ok_or_else(|| mismatch::<Self>(value)),
        }
    }
}

impl Scan for CacheValue {
    const TYPE_NAME: &'static str = "value";

    fn scan(value: &CacheValue) -> Result<Self, ScanError> {
        Ok(value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    /// Scans both the typed value and its wire text, as a text backend would
    /// return it, and checks they agree.
    fn scan_both<T: Scan + PartialEq + std::fmt::Debug>(value: CacheValue) -> Result<T, ScanError> {
        let typed = T::scan(&value);
        let text = T::scan(&CacheValue::from_raw(value.to_wire()));
        assert_eq!(
            typed.is_ok(),
            text.is_ok(),
            "typed and wire scans disagree for {value:?}"
        );
        if let (Ok(a), Ok(b)) = (&typed, &text) {
            assert_eq!(a, b);
        }
        typed
    }

    #[test]
    fn test_scan_integers() {
        assert_eq!(scan_both::<i64>(CacheValue::Int(-5)), Ok(-5));
        assert_eq!(scan_both::<u8>(CacheValue::UInt(255)), Ok(255));
        assert_eq!(scan_both::<i32>(CacheValue::UInt(7)), Ok(7));
        assert_eq!(scan_both::<u16>(CacheValue::from("65535")), Ok(65535));
        assert_eq!(scan_both::<i64>(CacheValue::Float(3.0)), Ok(3));
    }

    #[test]
    fn test_scan_integer_out_of_range_is_rejected() {
        assert_eq!(
            scan_both::<i8>(CacheValue::Int(300)),
            Err(ScanError::mismatch("i8", "int"))
        );
        assert!(scan_both::<u32>(CacheValue::Int(-1)).is_err());
        assert!(scan_both::<i64>(CacheValue::Float(1.5)).is_err());
        assert!(scan_both::<i64>(CacheValue::from("alice")).is_err());
    }

    #[test]
    fn test_scan_floats() {
        assert_eq!(scan_both::<f64>(CacheValue::Float(0.25)), Ok(0.25));
        assert_eq!(scan_both::<f64>(CacheValue::Int(42)), Ok(42.0));
        assert_eq!(scan_both::<f32>(CacheValue::from(1.5f32)), Ok(1.5));
        assert!(scan_both::<f32>(CacheValue::Float(1e300)).is_err());
        assert!(scan_both::<f32>(CacheValue::Float(f64::INFINITY)).is_ok());
        assert!(f32::scan(&CacheValue::Float(f64::NAN)).unwrap().is_nan());
    }

    #[test]
    fn test_scan_f32_rejects_inexact_narrowing() {
        assert_eq!(
            f32::scan(&CacheValue::Float(0.1)),
            Err(ScanError::mismatch("f32", "float"))
        );
        assert!(f32::scan(&CacheValue::from("0.1")).is_err());
        assert_eq!(scan_both::<f32>(CacheValue::Float(0.375)), Ok(0.375));
    }

    #[test]
    fn test_scan_bool() {
        assert_eq!(scan_both::<bool>(CacheValue::Bool(true)), Ok(true));
        assert_eq!(scan_both::<bool>(CacheValue::from("false")), Ok(false));
        assert_eq!(scan_both::<bool>(CacheValue::Int(1)), Ok(true));
        assert!(scan_both::<bool>(CacheValue::Int(2)).is_err());
    }

    #[test]
    fn test_scan_text_and_bytes() {
        assert_eq!(scan_both::<String>(CacheValue::from("alice")), Ok("alice".to_string()));
        assert_eq!(scan_both::<String>(CacheValue::Int(42)), Ok("42".to_string()));
        assert_eq!(
            String::scan(&CacheValue::Bytes(vec![0xff])),
            Err(ScanError::mismatch("string", "bytes"))
        );
        assert_eq!(
            Vec::<u8>::scan(&CacheValue::from("ab")),
            Ok(b"ab".to_vec())
        );
    }

    #[test]
    fn test_scan_timestamp() {
        let ts = Utc.with_ymd_and_hms(2023, 11, 5, 8, 0, 0).unwrap();
        assert_eq!(scan_both::<DateTime<Utc>>(CacheValue::from(ts)), Ok(ts));
        assert_eq!(
            DateTime::<Utc>::scan(&CacheValue::from("2023-11-05T09:00:00+01:00")),
            Ok(ts)
        );
        assert!(scan_both::<DateTime<Utc>>(CacheValue::Bool(true)).is_err());
    }
}
