use chrono::{DateTime, NaiveDate, Utc};
use derive_more::From;
use serde::{Deserialize, Serialize};

/// Value type declared by the server for a remote config.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "camelCase")]
pub enum ValueType {
    /// `"true"` is `true`, anything else is `false`.
    Boolean,
    /// An ISO-8601 date.
    Date,
    /// An ISO-8601 instant.
    DateTime,
    /// A JSON document.
    Json,
    /// A number.
    Number,
    /// Plain text.
    Text,
    /// Any type this SDK version does not know about. Values are passed through as text.
    #[serde(other)]
    Unknown,
}

/// A resolved remote config value.
///
/// Values are type-erased: the type is chosen by the server (for fresh values) or by the caller
/// (for defaults). Callers are responsible for requesting a name with a consistent default type.
#[derive(Debug, Serialize, PartialEq, From, Clone)]
#[serde(untagged)]
pub enum ConfigValue {
    /// A boolean value. Feature toggles are always booleans.
    Boolean(bool),
    /// A number. Non-numeric server values become NaN.
    Number(f64),
    /// A text value.
    Text(String),
    /// An arbitrary JSON value.
    Json(serde_json::Value),
    /// A date or instant, in UTC.
    DateTime(DateTime<Utc>),
    /// Server sent a `date`/`dateTime` value that is not a valid instant.
    #[from(ignore)]
    InvalidDate,
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<i32> for ConfigValue {
    fn from(value: i32) -> Self {
        Self::Number(value.into())
    }
}

#[allow(missing_docs)]
impl ConfigValue {
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            ConfigValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            ConfigValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            ConfigValue::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Returns `None` for [`ConfigValue::InvalidDate`] as well as for non-date values.
    pub fn as_date_time(&self) -> Option<DateTime<Utc>> {
        match self {
            ConfigValue::DateTime(d) => Some(*d),
            _ => None,
        }
    }
}

impl ValueType {
    /// Convert a raw server value into a typed value.
    ///
    /// Never fails except for malformed `json` values.
    pub fn parse(self, raw: &str) -> serde_json::Result<ConfigValue> {
        let value = match self {
            ValueType::Boolean => ConfigValue::Boolean(raw == "true"),
            ValueType::Date | ValueType::DateTime => {
                parse_date(raw).map_or(ConfigValue::InvalidDate, ConfigValue::DateTime)
            }
            ValueType::Json => ConfigValue::Json(serde_json::from_str(raw)?),
            ValueType::Number => ConfigValue::Number(parse_number(raw)),
            ValueType::Text | ValueType::Unknown => ConfigValue::Text(raw.to_owned()),
        };
        Ok(value)
    }
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Some(date.with_timezone(&Utc));
    }
    // Date-only values denote UTC midnight.
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|date| date.and_utc())
}

/// Numeric coercion. Returns NaN for anything that is not a number.
fn parse_number(raw: &str) -> f64 {
    let raw = raw.trim();
    if raw.is_empty() {
        return 0.0;
    }

    let radix = match raw.get(..2) {
        Some("0x" | "0X") => Some(16),
        Some("0o" | "0O") => Some(8),
        Some("0b" | "0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        return u64::from_str_radix(&raw[2..], radix).map_or(f64::NAN, |n| n as f64);
    }

    match raw {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }

    // Rust also accepts "inf" and "NaN" spellings, which are not numbers here.
    if raw.bytes().any(|b| b.is_ascii_alphabetic() && b != b'e' && b != b'E') {
        return f64::NAN;
    }
    raw.parse().unwrap_or(f64::NAN)
}
