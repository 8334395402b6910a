//! Evaluation context: user or system attributes the server uses to pick config variants.
use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use derive_more::From;
use serde::{Serialize, Serializer};

/// A single attribute value of the evaluation context.
///
/// Conveniently implements `From` conversions for strings, numbers, booleans, and dates.
///
/// ```
/// # use tweakship::AttributeValue;
/// let string_attr: AttributeValue = "example".into();
/// let number_attr: AttributeValue = 42.0.into();
/// let bool_attr: AttributeValue = true.into();
/// ```
#[derive(Debug, Serialize, PartialEq, From, Clone)]
#[serde(untagged)]
pub enum AttributeValue {
    /// A string value.
    String(String),
    /// A numerical value.
    Number(f64),
    /// A boolean value.
    Boolean(bool),
    /// A date. Sent to the server as an ISO-8601 UTC string.
    Date(#[serde(serialize_with = "serialize_iso_date")] DateTime<Utc>),
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        Self::Number(value.into())
    }
}

impl AttributeValue {
    /// Convert dates to their wire (string) form, leaving other values as-is.
    fn normalize(self) -> AttributeValue {
        match self {
            AttributeValue::Date(date) => AttributeValue::String(to_iso_string(&date)),
            other => other,
        }
    }
}

/// `2020-11-08T23:10:20.000Z`
fn to_iso_string(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn serialize_iso_date<S: Serializer>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&to_iso_string(date))
}

/// Raw context entry: a single attribute value or a list of them.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextValue {
    /// A scalar value. Normalized into a single-element list.
    Single(AttributeValue),
    /// Multiple values for the same attribute.
    Multiple(Vec<AttributeValue>),
}

macro_rules! impl_from_scalar {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for ContextValue {
                fn from(value: $ty) -> Self {
                    ContextValue::Single(value.into())
                }
            }
        )*
    };
}

impl_from_scalar!(AttributeValue, String, &str, f64, i32, bool, DateTime<Utc>);

impl<T: Into<AttributeValue>> From<Vec<T>> for ContextValue {
    fn from(values: Vec<T>) -> Self {
        ContextValue::Multiple(values.into_iter().map(Into::into).collect())
    }
}

impl ContextValue {
    fn into_values(self) -> Vec<AttributeValue> {
        match self {
            ContextValue::Single(value) => vec![value.normalize()],
            ContextValue::Multiple(values) => {
                values.into_iter().map(AttributeValue::normalize).collect()
            }
        }
    }
}

/// Normalized evaluation context, as sent to the server.
///
/// Every attribute maps to an ordered list of values; dates are already converted to ISO-8601
/// UTC strings.
///
/// ```
/// # use tweakship::{ContextValue, EvaluationContext};
/// let context: EvaluationContext = [
///     ("plan", ContextValue::from("premium")),
///     ("groups", vec!["beta", "staff"].into()),
/// ]
/// .into_iter()
/// .collect();
/// assert_eq!(context.get("plan").map(|v| v.len()), Some(1));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EvaluationContext(HashMap<String, Vec<AttributeValue>>);

impl EvaluationContext {
    /// Values of the attribute `name`, if set.
    pub fn get(&self, name: &str) -> Option<&[AttributeValue]> {
        self.0.get(name).map(Vec::as_slice)
    }

    /// Number of attributes in the context.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no attributes are set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for EvaluationContext
where
    K: Into<String>,
    V: Into<ContextValue>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        EvaluationContext(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into().into_values()))
                .collect(),
        )
    }
}
